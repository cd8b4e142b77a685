// Roost - A modular content management system built with Rust
// Copyright (C) 2025 Roost Project Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Module catalog and the install/uninstall routines behind it.

use anyhow::{anyhow, Context, Result};
use sqlx::SqlitePool;
use std::path::Path;

use crate::query::QueryBuilder;
use crate::repositories::ModuleRepository;

/// Everything the CMS knows about a compiled-in module.
#[derive(Debug)]
pub struct ModuleManifest {
    pub dir: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub author: &'static str,
    pub version: &'static str,
    pub icon: &'static str,
    /// Core modules cannot be uninstalled.
    pub core: bool,
    schema: &'static [&'static str],
    tables: &'static [&'static str],
    seed: &'static [&'static str],
    settings: &'static [(&'static str, &'static str)],
    /// Whether the module keeps files under `uploads/<dir>`.
    pub uploads: bool,
}

const VERSION: &str = env!("CARGO_PKG_VERSION");

const CORE_SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS settings (
        id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
        module TEXT NOT NULL,
        field TEXT NOT NULL,
        value TEXT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS sessions (
        id TEXT NOT NULL PRIMARY KEY,
        data TEXT NOT NULL DEFAULT '{}',
        expires_at INTEGER NOT NULL,
        created_at INTEGER NOT NULL
    )"#,
];

const MODULES_SCHEMA: &str = r#"CREATE TABLE IF NOT EXISTS modules (
    id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
    dir TEXT NOT NULL UNIQUE,
    sequence INTEGER NOT NULL DEFAULT 0
)"#;

/// Installed, in this order, on a fresh database.
pub const BASIC_MODULES: &[&str] = &[
    "dashboard",
    "pages",
    "blog",
    "galleries",
    "snippets",
    "pagelist",
    "events",
    "events_registration",
    "members",
    "twitch",
    "sitemap",
    "users",
    "settings",
];

static CATALOG: &[ModuleManifest] = &[
    ModuleManifest {
        dir: "dashboard",
        name: "Dashboard",
        description: "Overview of the site content.",
        author: "Roost",
        version: VERSION,
        icon: "home",
        core: true,
        schema: &[],
        tables: &[],
        seed: &[],
        settings: &[],
        uploads: false,
    },
    ModuleManifest {
        dir: "pages",
        name: "Pages",
        description: "Static pages of the site.",
        author: "Roost",
        version: VERSION,
        icon: "file",
        core: true,
        schema: &[r#"CREATE TABLE IF NOT EXISTS pages (
            id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            slug TEXT NOT NULL,
            "desc" TEXT NULL,
            lang TEXT NOT NULL,
            template TEXT NOT NULL DEFAULT 'index.html',
            date INTEGER NOT NULL,
            content TEXT NOT NULL DEFAULT '',
            markdown INTEGER NOT NULL DEFAULT 0
        )"#],
        tables: &["pages"],
        seed: &[
            r#"INSERT INTO pages (title, slug, "desc", lang, template, date, content, markdown)
               VALUES ('404', '404', 'Not found', 'en_english', 'index.html', strftime('%s','now'),
                       '<p>Sorry, this page does not exist.</p>', 0)"#,
        ],
        settings: &[],
        uploads: true,
    },
    ModuleManifest {
        dir: "blog",
        name: "Blog",
        description: "Posts with tags, covers and an RSS feed.",
        author: "Roost",
        version: VERSION,
        icon: "pencil-square",
        core: false,
        schema: &[
            r#"CREATE TABLE IF NOT EXISTS blog (
                id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                slug TEXT NOT NULL,
                content TEXT NOT NULL,
                intro TEXT NULL,
                cover_photo TEXT NULL,
                status INTEGER NOT NULL DEFAULT 0,
                lang TEXT NOT NULL,
                markdown INTEGER NOT NULL DEFAULT 0,
                comments INTEGER NOT NULL DEFAULT 1,
                published_at INTEGER NOT NULL DEFAULT 0,
                updated_at INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            )"#,
            r#"CREATE TABLE IF NOT EXISTS blog_tags (
                id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                slug TEXT NOT NULL
            )"#,
            r#"CREATE TABLE IF NOT EXISTS blog_tags_relationship (
                blog_id INTEGER NOT NULL,
                tag_id INTEGER NOT NULL,
                PRIMARY KEY (blog_id, tag_id)
            )"#,
        ],
        tables: &["blog", "blog_tags", "blog_tags_relationship"],
        seed: &[],
        settings: &[
            ("title", "Blog"),
            ("desc", ""),
            ("dateformat", "%b %d, %Y"),
            ("perpage", "5"),
            ("latestPostsCount", "5"),
            ("slug", "blog"),
        ],
        uploads: true,
    },
    ModuleManifest {
        dir: "galleries",
        name: "Galleries",
        description: "Image galleries embeddable in any content.",
        author: "Roost",
        version: VERSION,
        icon: "camera",
        core: false,
        schema: &[
            r#"CREATE TABLE IF NOT EXISTS galleries (
                id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                slug TEXT NOT NULL,
                img_per_page INTEGER NOT NULL DEFAULT 0,
                sort TEXT NOT NULL DEFAULT 'DESC'
            )"#,
            r#"CREATE TABLE IF NOT EXISTS galleries_items (
                id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
                gallery INTEGER NOT NULL,
                src TEXT NOT NULL,
                title TEXT NULL,
                "desc" TEXT NULL
            )"#,
        ],
        tables: &["galleries", "galleries_items"],
        seed: &[],
        settings: &[],
        uploads: true,
    },
    ModuleManifest {
        dir: "snippets",
        name: "Snippets",
        description: "Reusable content blocks in several languages.",
        author: "Roost",
        version: VERSION,
        icon: "puzzle-piece",
        core: false,
        schema: &[r#"CREATE TABLE IF NOT EXISTS snippets (
            id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            slug TEXT NOT NULL,
            content TEXT NOT NULL DEFAULT ''
        )"#],
        tables: &["snippets"],
        seed: &[],
        settings: &[],
        uploads: false,
    },
    ModuleManifest {
        dir: "pagelist",
        name: "Page lists",
        description: "Pages grouped under one listing page.",
        author: "Roost",
        version: VERSION,
        icon: "copy",
        core: false,
        schema: &[
            r#"CREATE TABLE IF NOT EXISTS pagelist (
                id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT NULL,
                content TEXT NULL,
                lang TEXT NOT NULL,
                markdown INTEGER NOT NULL DEFAULT 0,
                template TEXT NOT NULL,
                slug TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )"#,
            r#"CREATE TABLE IF NOT EXISTS pagelist_pages (
                pagelist INTEGER NOT NULL,
                page INTEGER NOT NULL,
                picture TEXT NULL,
                position INTEGER NOT NULL,
                PRIMARY KEY (pagelist, page)
            )"#,
        ],
        tables: &["pagelist", "pagelist_pages"],
        seed: &[],
        settings: &[],
        uploads: true,
    },
    ModuleManifest {
        dir: "events",
        name: "Events",
        description: "Event calendar with Horaro schedules and iCal feeds.",
        author: "Roost",
        version: VERSION,
        icon: "calendar",
        core: false,
        schema: &[
            r#"CREATE TABLE IF NOT EXISTS events (
                id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                start_at INTEGER NOT NULL,
                end_at INTEGER NOT NULL,
                description TEXT NULL,
                picture TEXT NULL,
                building_name TEXT NULL,
                building_address TEXT NULL,
                latitude REAL NULL,
                longitude REAL NULL,
                channel_name TEXT NULL,
                horaro_event_id TEXT NULL,
                horaro_schedule_id TEXT NULL,
                lang TEXT NOT NULL,
                markdown INTEGER NOT NULL DEFAULT 0,
                group_id INTEGER NULL,
                registration INTEGER NOT NULL DEFAULT 0,
                updated_at INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                published_at INTEGER NOT NULL DEFAULT 0
            )"#,
            r#"CREATE TABLE IF NOT EXISTS events_groups (
                id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
                lang TEXT NOT NULL,
                name TEXT NOT NULL,
                color TEXT NULL,
                textColor TEXT NULL
            )"#,
        ],
        tables: &["events", "events_groups"],
        seed: &[],
        settings: &[("slug", "planning"), ("event_slug", "event")],
        uploads: true,
    },
    ModuleManifest {
        dir: "events_registration",
        name: "Event registration",
        description: "Runner submissions for upcoming events.",
        author: "Roost",
        version: VERSION,
        icon: "clipboard",
        core: false,
        schema: &[r#"CREATE TABLE IF NOT EXISTS events_registration (
            id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
            runner_name TEXT NOT NULL,
            game_name TEXT NOT NULL,
            game_category TEXT NOT NULL,
            estimated_time INTEGER NOT NULL,
            race INTEGER NOT NULL DEFAULT 0,
            race_opponents TEXT NULL,
            event_id INTEGER NULL,
            status INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            comment TEXT NULL
        )"#],
        tables: &["events_registration"],
        seed: &[],
        settings: &[("slug", "register"), ("description", "")],
        uploads: false,
    },
    ModuleManifest {
        dir: "members",
        name: "Members",
        description: "Team members with roles and Twitch channels.",
        author: "Roost",
        version: VERSION,
        icon: "address-card",
        core: false,
        schema: &[r#"CREATE TABLE IF NOT EXISTS members_sta (
            id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            role TEXT NULL,
            description TEXT NULL,
            picture TEXT NULL,
            twitch_handle TEXT NULL,
            status INTEGER NOT NULL DEFAULT 0,
            lang TEXT NOT NULL,
            markdown INTEGER NOT NULL DEFAULT 0
        )"#],
        tables: &["members_sta"],
        seed: &[],
        settings: &[("slug", "members")],
        uploads: true,
    },
    ModuleManifest {
        dir: "twitch",
        name: "Twitch",
        description: "Live status of a Twitch channel.",
        author: "Roost",
        version: VERSION,
        icon: "twitch",
        core: false,
        schema: &[],
        tables: &[],
        seed: &[],
        settings: &[("channel_name", ""), ("client_id", ""), ("client_secret", "")],
        uploads: false,
    },
    ModuleManifest {
        dir: "sitemap",
        name: "Sitemap",
        description: "sitemap.xml and search engine indexing.",
        author: "Roost",
        version: VERSION,
        icon: "sitemap",
        core: false,
        schema: &[],
        tables: &[],
        seed: &[],
        settings: &[("noindex", "0")],
        uploads: false,
    },
    ModuleManifest {
        dir: "users",
        name: "Users",
        description: "Administrator accounts and access rights.",
        author: "Roost",
        version: VERSION,
        icon: "user",
        core: true,
        schema: &[
            r#"CREATE TABLE IF NOT EXISTS users (
                id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                fullname TEXT NULL,
                description TEXT NULL,
                password TEXT NOT NULL,
                avatar TEXT NULL,
                email TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'admin',
                access TEXT NOT NULL DEFAULT 'all',
                status INTEGER NOT NULL DEFAULT 0
            )"#,
            r#"CREATE TABLE IF NOT EXISTS remember_me (
                id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
                token TEXT NOT NULL,
                user_id INTEGER NOT NULL,
                expiry INTEGER NOT NULL
            )"#,
            r#"CREATE TABLE IF NOT EXISTS login_attempts (
                ip TEXT NOT NULL PRIMARY KEY,
                attempts INTEGER NOT NULL DEFAULT 0,
                expires INTEGER NOT NULL DEFAULT 0
            )"#,
        ],
        tables: &["users", "remember_me", "login_attempts"],
        seed: &[],
        settings: &[],
        uploads: true,
    },
    ModuleManifest {
        dir: "settings",
        name: "Settings",
        description: "General site settings.",
        author: "Roost",
        version: VERSION,
        icon: "wrench",
        core: true,
        schema: &[],
        tables: &[],
        seed: &[],
        settings: &[
            ("title", "Roost"),
            ("description", "A site built with Roost"),
            ("keywords", "cms,roost"),
            ("footer", "Powered by Roost"),
            ("homepage", "blog"),
            ("timezone", "UTC"),
            ("theme", "default"),
            ("editor", "wysiwyg"),
            ("lang_site", "en_english"),
            ("lang_admin", "en_english"),
            ("version", VERSION),
            ("update_check", "0"),
            ("update_version", "0"),
            ("favicon", ""),
        ],
        uploads: true,
    },
];

pub fn catalog() -> &'static [ModuleManifest] {
    CATALOG
}

pub fn manifest(dir: &str) -> Option<&'static ModuleManifest> {
    CATALOG.iter().find(|m| m.dir == dir)
}

impl ModuleManifest {
    /// Create tables, seed rows and default settings. Existing settings
    /// keep their values.
    pub async fn install(&self, pool: &SqlitePool, uploads_dir: Option<&Path>) -> Result<()> {
        for statement in self.schema {
            sqlx::query(statement)
                .execute(pool)
                .await
                .with_context(|| format!("Failed to create tables for module {}", self.dir))?;
        }
        for statement in self.seed {
            sqlx::query(statement)
                .execute(pool)
                .await
                .with_context(|| format!("Failed to seed module {}", self.dir))?;
        }
        for (field, value) in self.settings {
            let exists = QueryBuilder::table("settings")
                .where_eq("module", self.dir)
                .where_eq("field", *field)
                .count(pool)
                .await?;
            if exists == 0 {
                QueryBuilder::table("settings")
                    .insert(
                        pool,
                        &[
                            ("module", self.dir.into()),
                            ("field", (*field).into()),
                            ("value", (*value).into()),
                        ],
                    )
                    .await?;
            }
        }
        if let (true, Some(uploads)) = (self.uploads, uploads_dir) {
            let dir = uploads.join(self.dir);
            tokio::fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        tracing::info!("Installed module {}", self.dir);
        Ok(())
    }

    /// Drop tables, settings and uploaded files of the module.
    pub async fn uninstall(&self, pool: &SqlitePool, uploads_dir: Option<&Path>) -> Result<()> {
        if self.core {
            return Err(anyhow!("Module {} cannot be uninstalled", self.dir));
        }
        for table in self.tables {
            sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
                .execute(pool)
                .await
                .with_context(|| format!("Failed to drop table {}", table))?;
        }
        sqlx::query("DELETE FROM settings WHERE module = ?")
            .bind(self.dir)
            .execute(pool)
            .await
            .context("Failed to delete module settings")?;
        if let (true, Some(uploads)) = (self.uploads, uploads_dir) {
            let dir = uploads.join(self.dir);
            if dir.exists() {
                tokio::fs::remove_dir_all(&dir)
                    .await
                    .with_context(|| format!("Failed to remove {}", dir.display()))?;
            }
        }
        tracing::info!("Uninstalled module {}", self.dir);
        Ok(())
    }
}

async fn table_exists(pool: &SqlitePool, table: &str) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(table)
            .fetch_one(pool)
            .await
            .context("Failed to inspect schema")?;
    Ok(count > 0)
}

/// Install the basic modules when the database has no `modules` table.
/// Returns whether an install ran.
pub async fn fresh_install(pool: &SqlitePool, uploads_dir: Option<&Path>) -> Result<bool> {
    if table_exists(pool, "modules").await? {
        return Ok(false);
    }
    tracing::info!("No modules table found, running fresh install");

    for statement in CORE_SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .context("Failed to create core tables")?;
    }
    for dir in BASIC_MODULES {
        let manifest = manifest(dir).ok_or_else(|| anyhow!("Unknown basic module {}", dir))?;
        manifest.install(pool, uploads_dir).await?;
    }

    sqlx::query(MODULES_SCHEMA)
        .execute(pool)
        .await
        .context("Failed to create modules table")?;
    let modules = ModuleRepository::new(pool.clone());
    for (sequence, dir) in BASIC_MODULES.iter().enumerate() {
        modules.insert(dir, sequence as i64).await?;
    }
    Ok(true)
}

/// Install one module on a running site and append it to the navigation.
pub async fn install_module(pool: &SqlitePool, dir: &str, uploads_dir: Option<&Path>) -> Result<()> {
    let manifest = manifest(dir).ok_or_else(|| anyhow!("Unknown module {}", dir))?;
    let modules = ModuleRepository::new(pool.clone());
    if modules.has(dir).await? {
        return Err(anyhow!("Module {} is already installed", dir));
    }
    manifest.install(pool, uploads_dir).await?;
    modules.append(dir).await?;
    Ok(())
}

pub async fn uninstall_module(pool: &SqlitePool, dir: &str, uploads_dir: Option<&Path>) -> Result<()> {
    let manifest = manifest(dir).ok_or_else(|| anyhow!("Unknown module {}", dir))?;
    let modules = ModuleRepository::new(pool.clone());
    if !modules.has(dir).await? {
        return Err(anyhow!("Module {} is not installed", dir));
    }
    manifest.uninstall(pool, uploads_dir).await?;
    modules.remove(dir).await?;
    Ok(())
}
