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
use serde::Serialize;
use tera::Context;

use super::{TwitchCredentials, MODULE};
use crate::core::Core;
use crate::modules::SiteModule;

#[derive(Debug, Default, Serialize)]
struct TwitchVars {
    online: bool,
    embed: String,
    channel: String,
}

/// Credentials from the module settings, if configured.
pub fn credentials(core: &Core) -> Option<TwitchCredentials> {
    TwitchCredentials::new(&core.setting(MODULE, "client_id"), &core.setting(MODULE, "client_secret"))
}

/// Lowercased handles among `handles` that are live right now.
pub async fn online_channels(core: &Core, handles: &[String]) -> Vec<String> {
    match credentials(core) {
        Some(credentials) => core.state.twitch.online_channels(&credentials, handles).await,
        None => Vec::new(),
    }
}

pub struct TwitchSite;

#[async_trait]
impl SiteModule for TwitchSite {
    fn name(&self) -> &'static str {
        MODULE
    }

    async fn init(&self, core: &mut Core) -> Result<()> {
        let channel = core.setting(MODULE, "channel_name").trim().to_string();
        let mut vars = TwitchVars {
            channel: channel.clone(),
            ..Default::default()
        };
        if !channel.is_empty() && !online_channels(core, &[channel.clone()]).await.is_empty() {
            let parent = url::Url::parse(&core.base_url)
                .ok()
                .and_then(|u| u.host_str().map(str::to_string))
                .unwrap_or_else(|| "localhost".to_string());
            let mut ctx = Context::new();
            ctx.insert("channel_name", &channel);
            ctx.insert("parent_domain", &parent);
            vars.online = true;
            vars.embed = core.draw(&core.theme_template("twitch_embed.html"), ctx)?;
        }
        core.assign(MODULE, &vars);
        Ok(())
    }
}
