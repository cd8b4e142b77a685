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

pub struct TwitchAdmin;

impl TwitchAdmin {
    async fn settings(&self, core: &mut Core, request: &AdminRequest) -> Result<Output> {
        if request.is_post() {
            let values = [
                ("channel_name", request.form.text("channel_name")),
                ("client_id", request.form.text("client_id")),
                ("client_secret", request.form.text("client_secret")),
            ];
            core.settings.update_many(MODULE, &values).await?;
            core.state.twitch.clear_cache().await;
            let text = core.lang_text("general", "settings_saved");
            return Ok(helpers::success(core, text, "twitch/settings"));
        }
        let mut ctx = Context::new();
        ctx.insert("twitch", &core.settings.module(MODULE).cloned().unwrap_or_default());
        ctx.insert("save_url", &core.admin_url("twitch/settings"));
        helpers::view(core, "modules/twitch/admin/settings.html", ctx)
    }
}

#[async_trait]
impl AdminModule for TwitchAdmin {
    fn name(&self) -> &'static str {
        MODULE
    }

    fn navigation(&self, core: &Core) -> Vec<NavItem> {
        vec![NavItem::new(core.lang_text("general", "settings"), "settings")]
    }

    async fn dispatch(&self, core: &mut Core, request: AdminRequest) -> Result<Output> {
        match request.action.as_str() {
            "settings" => self.settings(core, &request).await,
            _ => Ok(Output::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::FormData;
    use crate::test_helpers::admin_core;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_saving_settings_clears_status_cache() {
        let (mut core, _dirs) = admin_core().await;
        let handles = ["live".to_string()];
        core.state.twitch.prime(&handles, &["live"]).await;

        let form = FormData::from_pairs([
            ("channel_name", "live"),
            ("client_id", " id "),
            ("client_secret", "secret"),
        ]);
        TwitchAdmin
            .dispatch(&mut core, AdminRequest::post("settings", &[], form))
            .await
            .unwrap();
        assert_eq!(core.setting(MODULE, "client_id"), "id");
        assert!(!core.state.twitch.is_cached(&handles).await);
    }
}
