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
use roost_db::repositories::SnippetRepository;

use super::{MODULE, TAG};
use crate::core::Core;
use crate::modules::SiteModule;

pub struct SnippetsSite;

#[async_trait]
impl SiteModule for SnippetsSite {
    fn name(&self) -> &'static str {
        MODULE
    }

    async fn init(&self, core: &mut Core) -> Result<()> {
        let snippets = SnippetRepository::new(core.db().clone()).list().await?;
        for snippet in snippets {
            let text = snippet.content.for_lang(&core.lang_code).to_string();
            core.set_tag(TAG, &snippet.slug, text);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::test_core;
    use pretty_assertions::assert_eq;
    use roost_core::models::snippet::{LocalizedContent, Snippet};

    #[tokio::test]
    async fn test_tags_follow_current_language() {
        let (mut core, _dirs) = test_core().await;
        SnippetRepository::new(core.db().clone())
            .create(&Snippet {
                id: None,
                name: "Footer".into(),
                slug: "footer".into(),
                content: LocalizedContent::parse("{lang: fr_french}Bonjour{/lang}{lang: en_english}Hello{/lang}"),
            })
            .await
            .unwrap();

        SnippetsSite.init(&mut core).await.unwrap();
        assert_eq!(core.expand_tags("{$snippet.footer}!"), "Hello!");

        core.set_language("pl_polski");
        SnippetsSite.init(&mut core).await.unwrap();
        assert_eq!(core.tag(TAG, "footer"), Some("Bonjour"));
    }
}
