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

use anyhow::Result;
use async_trait::async_trait;
use roost_core::models::user::Access;
use roost_db::install::manifest;
use roost_db::repositories::{BlogRepository, ModuleRepository};
use roost_db::QueryBuilder;
use serde::Serialize;
use tera::Context;

use crate::core::Core;
use crate::modules::{blog, events_registration, helpers, settings};
use crate::modules::{AdminModule, AdminRequest, NavItem, Output};

pub const MODULE: &str = "dashboard";

const RECENT_POSTS: i64 = 5;

/// Table counted for each module on the dashboard.
const CONTENT_TABLES: &[(&str, &str)] = &[
    ("pages", "pages"),
    ("blog", "blog"),
    ("galleries", "galleries"),
    ("snippets", "snippets"),
    ("pagelist", "pagelist"),
    ("events", "events"),
    ("events_registration", "events_registration"),
    ("members", "members_sta"),
    ("users", "users"),
];

#[derive(Debug, Serialize)]
struct ModuleCard {
    dir: String,
    name: String,
    description: String,
    icon: String,
    url: String,
    count: Option<i64>,
}

#[derive(Debug, Serialize)]
struct RecentPost {
    title: String,
    date: String,
    edit_url: String,
}

pub struct DashboardAdmin;

impl DashboardAdmin {
    async fn cards(&self, core: &Core, access: &Access) -> Result<Vec<ModuleCard>> {
        let mut cards = Vec::new();
        for dir in ModuleRepository::new(core.db().clone()).list().await? {
            if dir == MODULE || !access.allows(&dir) {
                continue;
            }
            let count = match CONTENT_TABLES.iter().find(|(module, _)| *module == dir) {
                Some((_, table)) => Some(QueryBuilder::table(table).count(core.db()).await?),
                None => None,
            };
            let info = manifest(&dir);
            cards.push(ModuleCard {
                name: info.map(|m| m.name.to_string()).unwrap_or_else(|| dir.clone()),
                description: info.map(|m| m.description.to_string()).unwrap_or_default(),
                icon: info.map(|m| m.icon.to_string()).unwrap_or_default(),
                url: core.admin_url(&dir),
                count,
                dir,
            });
        }
        Ok(cards)
    }

    async fn main(&self, core: &mut Core) -> Result<Output> {
        let access = core
            .user
            .as_ref()
            .map(|u| u.effective_access())
            .unwrap_or_else(|| Access::Modules(vec![MODULE.to_string()]));
        let cards = self.cards(core, &access).await?;
        let has = |dir: &str| cards.iter().any(|c| c.dir == dir);

        let mut recent = Vec::new();
        if has(blog::MODULE) {
            for post in BlogRepository::new(core.db().clone()).list_all(RECENT_POSTS, 0).await? {
                recent.push(RecentPost {
                    date: core.format_date(post.published_at, "%Y-%m-%d"),
                    edit_url: core.admin_url(&format!("blog/edit/{}", post.id.unwrap_or_default())),
                    title: post.title,
                });
            }
        }

        let pending = if has(events_registration::MODULE) {
            Some(
                QueryBuilder::table("events_registration")
                    .where_eq("status", 0)
                    .count(core.db())
                    .await?,
            )
        } else {
            None
        };

        let update = if access == Access::All && has(settings::MODULE) {
            settings::check_update(core, false)
                .await?
                .then(|| core.setting(settings::MODULE, "update_version"))
        } else {
            None
        };

        let mut ctx = Context::new();
        ctx.insert("modules", &cards);
        ctx.insert("recent_posts", &recent);
        ctx.insert("pending_registrations", &pending);
        ctx.insert("registrations_url", &core.admin_url("events_registration/manage"));
        ctx.insert("update_version", &update);
        ctx.insert("updates_url", &core.admin_url("settings/updates"));
        helpers::view(core, "modules/dashboard/admin/main.html", ctx)
    }
}

#[async_trait]
impl AdminModule for DashboardAdmin {
    fn name(&self) -> &'static str {
        MODULE
    }

    fn navigation(&self, core: &Core) -> Vec<NavItem> {
        vec![NavItem::new(core.lang_text(MODULE, "main"), "main")]
    }

    async fn dispatch(&self, core: &mut Core, request: AdminRequest) -> Result<Output> {
        match request.action.as_str() {
            "main" | "manage" => self.main(core).await,
            _ => Ok(Output::NotFound),
        }
    }
}
