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
use tera::Context;

use super::MODULE;
use crate::core::Core;
use crate::modules::helpers;
use crate::modules::{AdminModule, AdminRequest, NavItem, Output};

pub struct SitemapAdmin;

impl SitemapAdmin {
    async fn settings(&self, core: &mut Core, request: &AdminRequest) -> Result<Output> {
        if request.is_post() {
            let noindex = if request.form.checked("noindex") { "1" } else { "0" };
            core.settings.update_many(MODULE, &[("noindex", noindex.to_string())]).await?;
            let text = core.lang_text("general", "settings_saved");
            return Ok(helpers::success(core, text, "sitemap/settings"));
        }
        let mut ctx = Context::new();
        ctx.insert("noindex", &(core.setting(MODULE, "noindex") == "1"));
        ctx.insert("sitemap_url", &core.absolute_url("sitemap.xml"));
        ctx.insert("save_url", &core.admin_url("sitemap/settings"));
        helpers::view(core, "modules/sitemap/admin/settings.html", ctx)
    }
}

#[async_trait]
impl AdminModule for SitemapAdmin {
    fn name(&self) -> &'static str {
        MODULE
    }

    fn navigation(&self, core: &Core) -> Vec<NavItem> {
        vec![NavItem::new(core.lang_text("general", "settings"), "settings")]
    }

    async fn dispatch(&self, core: &mut Core, request: AdminRequest) -> Result<Output> {
        match request.action.as_str() {
            "settings" | "manage" => self.settings(core, &request).await,
            _ => Ok(Output::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::FormData;
    use crate::test_helpers::admin_core;

    #[tokio::test]
    async fn test_noindex_toggle() {
        let (mut core, _dirs) = admin_core().await;
        let on = AdminRequest::post("settings", &[], FormData::from_pairs([("noindex", "on")]));
        SitemapAdmin.dispatch(&mut core, on).await.unwrap();
        assert_eq!(core.setting(MODULE, "noindex"), "1");

        let off = AdminRequest::post("settings", &[], FormData::default());
        SitemapAdmin.dispatch(&mut core, off).await.unwrap();
        assert_eq!(core.setting(MODULE, "noindex"), "0");
    }
}
