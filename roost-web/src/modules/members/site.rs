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
use roost_core::models::member::Member;
use roost_db::repositories::MemberRepository;
use serde::Serialize;
use std::collections::HashSet;

use super::{base_slug, picture_url, MODULE};
use crate::core::Core;
use crate::form::FormData;
use crate::markdown::render_body;
use crate::modules::twitch::site::online_channels;
use crate::modules::{Output, SiteModule, SiteRoute};

#[derive(Debug, Serialize)]
struct MemberView {
    id: i64,
    name: String,
    role: String,
    description: String,
    picture: String,
    twitch_handle: Option<String>,
    online: bool,
}

pub struct MembersSite;

impl MembersSite {
    async fn index(&self, core: &mut Core) -> Result<Output> {
        let members = MemberRepository::new(core.db().clone())
            .list_active(&core.lang_code)
            .await?;
        let handles: Vec<String> = members.iter().filter_map(Member::twitch_key).collect();
        let online: HashSet<String> = online_channels(core, &handles).await.into_iter().collect();

        let views: Vec<MemberView> = members
            .into_iter()
            .map(|member| MemberView {
                id: member.id.unwrap_or_default(),
                online: member.twitch_key().is_some_and(|key| online.contains(&key)),
                picture: picture_url(&member),
                description: render_body(member.description.as_deref().unwrap_or_default(), member.markdown),
                role: member.role.unwrap_or_default(),
                twitch_handle: member.twitch_handle,
                name: member.name,
            })
            .collect();

        core.add_css("/static/css/members.css");
        core.assign("page_title", &core.lang_text(MODULE, "title"));
        core.assign("page_desc", &core.lang_text(MODULE, "desc"));
        core.assign("members", &views);
        Ok(Output::Page("members.html".to_string()))
    }
}

#[async_trait]
impl SiteModule for MembersSite {
    fn name(&self) -> &'static str {
        MODULE
    }

    fn routes(&self, core: &mut Core) -> Result<()> {
        let slug = base_slug(core);
        core.router.route(&slug, SiteRoute::new(MODULE, "index"))?;
        Ok(())
    }

    async fn handle(
        &self,
        core: &mut Core,
        action: &'static str,
        _params: Vec<String>,
        _form: &FormData,
    ) -> Result<Output> {
        match action {
            "index" => self.index(core).await,
            _ => Ok(Output::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::twitch;
    use crate::test_helpers::test_core;
    use pretty_assertions::assert_eq;

    fn member(name: &str, role: Option<&str>, handle: Option<&str>, active: bool) -> Member {
        Member {
            id: None,
            name: name.to_string(),
            role: role.map(str::to_string),
            description: Some("**Runner**".to_string()),
            picture: None,
            twitch_handle: handle.map(str::to_string),
            active,
            lang: "en_english".to_string(),
            markdown: true,
        }
    }

    #[tokio::test]
    async fn test_listing_orders_and_flags_live_members() {
        let (mut core, _dirs) = test_core().await;
        for (field, value) in [("client_id", "id"), ("client_secret", "secret")] {
            core.settings.set_field(twitch::MODULE, field, value).await.unwrap();
        }
        let repo = MemberRepository::new(core.db().clone());
        repo.create(&member("Zed", None, Some("ZedRuns"), true)).await.unwrap();
        repo.create(&member("Amy", Some("President"), Some("amyplays"), true)).await.unwrap();
        repo.create(&member("Old", Some("Founder"), None, false)).await.unwrap();
        core.state
            .twitch
            .prime(&["zedruns".to_string(), "amyplays".to_string()], &["ZedRuns"])
            .await;

        let out = MembersSite.handle(&mut core, "index", vec![], &FormData::default()).await.unwrap();
        assert!(matches!(out, Output::Page(ref t) if t == "members.html"));
        let ctx = core.base_context();
        let members = ctx.get("members").unwrap().as_array().unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0]["name"], "Amy");
        assert_eq!(members[0]["online"], false);
        assert_eq!(members[1]["name"], "Zed");
        assert_eq!(members[1]["online"], true);
        assert!(members[1]["description"].as_str().unwrap().contains("<strong>Runner</strong>"));
        assert_eq!(members[1]["picture"], "/static/img/default-member.svg");
    }
}
