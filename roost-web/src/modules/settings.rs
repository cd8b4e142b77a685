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

//! General settings, themes, languages, navigation order and the update
//! check.

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use roost_core::utils::text::compare_versions;
use roost_db::install::manifest;
use roost_db::repositories::{ModuleRepository, PageRepository};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;
use tera::Context;

use crate::config::Config;
use crate::core::Core;
use crate::form::FormData;
use crate::modules::helpers;
use crate::modules::{blog, events, events_registration, members};
use crate::modules::{AdminModule, AdminRequest, NavItem, Output};
use crate::uploads;

pub const MODULE: &str = "settings";

/// Seconds between two automatic update checks.
const UPDATE_INTERVAL: i64 = 6 * 3600;

/// Fields of the general form. Only the favicon may stay empty.
const GENERAL_FIELDS: &[&str] = &[
    "title",
    "description",
    "keywords",
    "footer",
    "homepage",
    "timezone",
    "lang_site",
    "lang_admin",
    "editor",
    "theme",
];

const EDITORS: &[&str] = &["wysiwyg", "html"];

#[derive(Debug, Serialize)]
struct HomepageChoice {
    slug: String,
    title: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ThemeInfo {
    #[serde(default)]
    dir: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    author: String,
    #[serde(skip_deserializing)]
    active: bool,
    #[serde(skip_deserializing)]
    activate_url: String,
}

#[derive(Debug, Serialize)]
struct ModuleEntry {
    dir: String,
    name: String,
    icon: String,
    up_url: Option<String>,
    down_url: Option<String>,
}

/// Latest release as published by the update feed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Release {
    pub version: String,
    #[serde(default)]
    pub changelog: String,
}

pub async fn fetch_release(http: &reqwest::Client, url: &str) -> Result<Release> {
    http.get(url)
        .send()
        .await
        .context("Failed to reach the update feed")?
        .error_for_status()
        .context("Update feed answered with an error")?
        .json()
        .await
        .context("Invalid update feed")
}

/// Whether a newer release than the running one is known. Asks the feed
/// when the last check is older than six hours, or when `force` is set.
/// An empty `update_feed_url` turns the check off.
pub async fn check_update(core: &mut Core, force: bool) -> Result<bool> {
    let now = Utc::now().timestamp();
    let last: i64 = core.setting(MODULE, "update_check").parse().unwrap_or(0);
    let feed_configured = !core.config().update_feed_url.is_empty();
    if feed_configured && (force || now - last > UPDATE_INTERVAL) {
        let mut values = vec![("update_check", now.to_string())];
        match fetch_release(&core.state.http, &core.config().update_feed_url).await {
            Ok(release) => {
                tracing::info!("Update feed reports version {}", release.version);
                values.push(("update_version", release.version));
                values.push(("update_changelog", release.changelog));
            }
            Err(e) => tracing::warn!("Update check failed: {:#}", e),
        }
        core.settings.update_many(MODULE, &values).await?;
    }
    Ok(update_available(
        &core.setting(MODULE, "update_version"),
        &core.setting(MODULE, "version"),
    ))
}

pub fn update_available(latest: &str, current: &str) -> bool {
    compare_versions(latest, current) == Ordering::Greater
}

fn list_themes(templates_dir: &Path, active: &str) -> Result<Vec<ThemeInfo>> {
    let root = templates_dir.join("themes");
    let mut themes = Vec::new();
    if !root.exists() {
        return Ok(themes);
    }
    for entry in std::fs::read_dir(&root).with_context(|| format!("Failed to read {}", root.display()))? {
        let path = entry?.path();
        let Some(dir) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        if !path.is_dir() {
            continue;
        }
        let mut theme = std::fs::read_to_string(path.join("manifest.json"))
            .ok()
            .and_then(|raw| serde_json::from_str::<ThemeInfo>(&raw).ok())
            .unwrap_or_default();
        if theme.name.is_empty() {
            theme.name = dir.clone();
        }
        theme.active = dir == active;
        theme.dir = dir;
        themes.push(theme);
    }
    themes.sort_by(|a, b| a.dir.cmp(&b.dir));
    Ok(themes)
}

pub struct SettingsAdmin;

impl SettingsAdmin {
    /// Pages of the site language and the module entry points.
    async fn homepage_choices(&self, core: &Core) -> Result<Vec<HomepageChoice>> {
        let lang = core.setting(MODULE, "lang_site");
        let mut choices: Vec<HomepageChoice> = PageRepository::new(core.db().clone())
            .list(Some(&lang))
            .await?
            .into_iter()
            .filter(|p| !p.is_error_page())
            .map(|p| HomepageChoice { slug: p.slug, title: p.title })
            .collect();
        let modules = ModuleRepository::new(core.db().clone());
        let entries = [
            (blog::MODULE, blog::blog_slug(core)),
            (events::MODULE, events::base_slug(core)),
            (events_registration::MODULE, events_registration::base_slug(core)),
            (members::MODULE, members::base_slug(core)),
        ];
        for (module, slug) in entries {
            if modules.has(module).await? {
                let title = manifest(module).map(|m| m.name).unwrap_or(module);
                choices.push(HomepageChoice {
                    title: format!("{} (/{})", title, slug),
                    slug,
                });
            }
        }
        Ok(choices)
    }

    async fn general(&self, core: &mut Core) -> Result<Output> {
        let mut settings = core.settings.module(MODULE).cloned().unwrap_or_default();
        for (key, value) in core.take_form() {
            if let Some(value) = value.as_str() {
                settings.insert(key, value.to_string());
            }
        }
        let favicon = core.setting(MODULE, "favicon");
        let timezones: Vec<&str> = chrono_tz::TZ_VARIANTS.iter().map(|tz| tz.name()).collect();

        let mut ctx = Context::new();
        ctx.insert("settings", &settings);
        ctx.insert("homepages", &self.homepage_choices(core).await?);
        ctx.insert("timezones", &timezones);
        ctx.insert("languages", &helpers::languages(core));
        ctx.insert("themes", &list_themes(Path::new(&core.config().templates_dir), &core.setting(MODULE, "theme"))?);
        ctx.insert("editors", EDITORS);
        ctx.insert("favicon_url", &(!favicon.is_empty()).then(|| Config::upload_url(MODULE, &favicon)));
        ctx.insert("delete_favicon_url", &core.admin_url("settings/delete_favicon"));
        ctx.insert("save_url", &core.admin_url("settings/general"));
        helpers::view(core, "modules/settings/admin/general.html", ctx)
    }

    async fn save_general(&self, core: &mut Core, form: &FormData) -> Result<Output> {
        let back = "settings/general";
        let mut values: Vec<(&str, String)> = Vec::new();
        for field in GENERAL_FIELDS.iter().copied() {
            let value = form.text(field);
            if value.is_empty() {
                let text = core.lang_text("general", "fill_inputs");
                return Ok(helpers::reject(core, form, text, back));
            }
            values.push((field, value));
        }
        let get = |field: &str| form.text(field);
        let valid = get("timezone").parse::<Tz>().is_ok()
            && core.state.lang.is_active(&get("lang_site"))
            && core.state.lang.is_active(&get("lang_admin"))
            && EDITORS.contains(&get("editor").as_str())
            && Path::new(&core.config().templates_dir)
                .join("themes")
                .join(get("theme"))
                .is_dir();
        if !valid {
            let text = core.lang_text(MODULE, "save_settings_failure");
            return Ok(helpers::reject(core, form, text, back));
        }

        if let Some(file) = form.file("favicon") {
            let is_ico = Path::new(&file.filename)
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("ico"));
            if !is_ico {
                let text = core.lang_text(MODULE, "favicon_wrong_type");
                return Ok(helpers::reject(core, form, text, back));
            }
            let dir = uploads::module_dir(&core.config().uploads_path(), MODULE)?;
            let name = format!("favicon-{}.ico", Utc::now().timestamp());
            std::fs::write(dir.join(&name), &file.bytes).context("Failed to store favicon")?;
            let old = core.setting(MODULE, "favicon");
            if !old.is_empty() {
                uploads::remove_file(&dir, &old)?;
            }
            values.push(("favicon", name));
        }

        core.settings.update_many(MODULE, &values).await?;
        tracing::info!("General settings saved");
        let text = core.lang_text(MODULE, "save_settings_success");
        Ok(helpers::success(core, text, back))
    }

    async fn delete_favicon(&self, core: &mut Core) -> Result<Output> {
        let favicon = core.setting(MODULE, "favicon");
        if !favicon.is_empty() {
            uploads::remove_file(&core.uploads_dir(MODULE), &favicon)?;
            core.settings.update_many(MODULE, &[("favicon", String::new())]).await?;
        }
        let text = core.lang_text(MODULE, "favicon_deleted");
        Ok(helpers::success(core, text, "settings/general"))
    }

    async fn theme(&self, core: &mut Core, request: &AdminRequest) -> Result<Output> {
        let templates_dir = core.config().templates_dir.clone();
        let mut themes = list_themes(Path::new(&templates_dir), &core.setting(MODULE, "theme"))?;
        if let Some(dir) = request.param(0) {
            if !themes.iter().any(|t| t.dir == dir) {
                return Ok(Output::NotFound);
            }
            core.settings.update_many(MODULE, &[("theme", dir.to_string())]).await?;
            let text = core.lang_text(MODULE, "theme_changed");
            return Ok(helpers::success(core, text, "settings/theme"));
        }
        for theme in &mut themes {
            theme.activate_url = core.admin_url(&format!("settings/theme/{}", theme.dir));
        }
        let mut ctx = Context::new();
        ctx.insert("themes", &themes);
        helpers::view(core, "modules/settings/admin/themes.html", ctx)
    }

    async fn languages(&self, core: &mut Core) -> Result<Output> {
        let site = core.setting(MODULE, "lang_site");
        let admin = core.setting(MODULE, "lang_admin");
        let langs: Vec<serde_json::Value> = core
            .state
            .lang
            .available()?
            .into_iter()
            .map(|l| {
                let action = if l.active { "deactivate" } else { "activate" };
                serde_json::json!({
                    "code": l.code,
                    "name": l.name,
                    "prefix": l.prefix,
                    "active": l.active,
                    "locked": l.code == site || l.code == admin,
                    "toggle_url": core.admin_url(&format!("settings/{}/{}", action, l.code)),
                })
            })
            .collect();
        let mut ctx = Context::new();
        ctx.insert("langs", &langs);
        helpers::view(core, "modules/settings/admin/languages.html", ctx)
    }

    async fn toggle_language(&self, core: &mut Core, code: &str, active: bool) -> Result<Output> {
        let back = "settings/languages";
        let in_use = code == core.setting(MODULE, "lang_site") || code == core.setting(MODULE, "lang_admin");
        if !active && in_use {
            let text = core.lang_text(MODULE, "lang_deactivate_failure");
            return Ok(helpers::failure(core, text, back));
        }
        if let Err(e) = core.state.lang.set_active(code, active) {
            tracing::warn!("Language {} not switched: {:#}", code, e);
            let key = if active { "lang_activate_failure" } else { "lang_deactivate_failure" };
            let text = core.lang_text(MODULE, key);
            return Ok(helpers::failure(core, text, back));
        }
        let key = if active { "lang_activate_success" } else { "lang_deactivate_success" };
        let text = core.lang_text(MODULE, key);
        Ok(helpers::success(core, text, back))
    }

    async fn modules(&self, core: &mut Core) -> Result<Output> {
        let dirs = ModuleRepository::new(core.db().clone()).list().await?;
        let last = dirs.len().saturating_sub(1);
        let entries: Vec<ModuleEntry> = dirs
            .iter()
            .enumerate()
            .map(|(i, dir)| {
                let info = manifest(dir);
                ModuleEntry {
                    dir: dir.clone(),
                    name: info.map(|m| m.name.to_string()).unwrap_or_else(|| dir.clone()),
                    icon: info.map(|m| m.icon.to_string()).unwrap_or_default(),
                    up_url: (i > 0).then(|| core.admin_url(&format!("settings/move/{}/up", dir))),
                    down_url: (i < last).then(|| core.admin_url(&format!("settings/move/{}/down", dir))),
                }
            })
            .collect();
        let mut ctx = Context::new();
        ctx.insert("modules", &entries);
        helpers::view(core, "modules/settings/admin/modules.html", ctx)
    }

    async fn move_module(&self, core: &mut Core, dir: &str, direction: &str) -> Result<Output> {
        let up = match direction {
            "up" => true,
            "down" => false,
            _ => return Ok(Output::NotFound),
        };
        if ModuleRepository::new(core.db().clone()).move_module(dir, up).await? {
            let text = core.lang_text(MODULE, "order_saved");
            Ok(helpers::success(core, text, "settings/modules"))
        } else {
            Ok(helpers::redirect(core, "settings/modules"))
        }
    }

    async fn updates(&self, core: &mut Core, request: &AdminRequest) -> Result<Output> {
        if request.query("reset").is_some() {
            core.settings
                .update_many(
                    MODULE,
                    &[
                        ("update_check", "0".to_string()),
                        ("update_version", "0".to_string()),
                        ("update_changelog", String::new()),
                    ],
                )
                .await?;
        }
        let available = check_update(core, request.is_post()).await?;
        let checked = core
            .setting(MODULE, "update_check")
            .parse::<i64>()
            .ok()
            .filter(|t| *t > 0)
            .and_then(|t| chrono::DateTime::from_timestamp(t, 0))
            .map(|t| core.format_date(t, "%Y-%m-%d %H:%M"));

        let mut ctx = Context::new();
        ctx.insert("version", &core.setting(MODULE, "version"));
        ctx.insert("update_version", &core.setting(MODULE, "update_version"));
        ctx.insert("changelog", &core.setting(MODULE, "update_changelog"));
        ctx.insert("available", &available);
        ctx.insert("checked", &checked);
        ctx.insert("check_url", &core.admin_url("settings/updates"));
        helpers::view(core, "modules/settings/admin/updates.html", ctx)
    }
}

#[async_trait]
impl AdminModule for SettingsAdmin {
    fn name(&self) -> &'static str {
        MODULE
    }

    fn navigation(&self, core: &Core) -> Vec<NavItem> {
        vec![
            NavItem::new(core.lang_text(MODULE, "general"), "general"),
            NavItem::new(core.lang_text(MODULE, "theme"), "theme"),
            NavItem::new(core.lang_text(MODULE, "languages"), "languages"),
            NavItem::new(core.lang_text(MODULE, "modules"), "modules"),
            NavItem::new(core.lang_text(MODULE, "updates"), "updates"),
        ]
    }

    async fn dispatch(&self, core: &mut Core, request: AdminRequest) -> Result<Output> {
        match (request.action.as_str(), request.param(0), request.param(1)) {
            ("general" | "manage", _, _) if request.is_post() => self.save_general(core, &request.form).await,
            ("general" | "manage", _, _) => self.general(core).await,
            ("delete_favicon", _, _) => self.delete_favicon(core).await,
            ("theme", _, _) => self.theme(core, &request).await,
            ("languages", _, _) => self.languages(core).await,
            ("activate", Some(code), _) => self.toggle_language(core, code, true).await,
            ("deactivate", Some(code), _) => self.toggle_language(core, code, false).await,
            ("modules", _, _) => self.modules(core).await,
            ("move", Some(dir), Some(direction)) => self.move_module(core, dir, direction).await,
            ("updates", _, _) => self.updates(core, &request).await,
            _ => Ok(Output::NotFound),
        }
    }
}
