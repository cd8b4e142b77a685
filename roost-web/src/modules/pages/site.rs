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
use roost_db::repositories::PageRepository;

use super::{show_page, MODULE};
use crate::core::Core;
use crate::form::FormData;
use crate::modules::{Output, SiteModule, SiteRoute};

pub struct PagesSite;

impl PagesSite {
    async fn page(&self, core: &mut Core, slug: &str) -> Result<Output> {
        let page = PageRepository::new(core.db().clone())
            .find_by_slug(slug, &core.lang_code)
            .await?;
        match page {
            Some(page) => Ok(Output::Page(show_page(core, &page))),
            None => Ok(Output::NotFound),
        }
    }
}

#[async_trait]
impl SiteModule for PagesSite {
    fn name(&self) -> &'static str {
        MODULE
    }

    async fn init(&self, core: &mut Core) -> Result<()> {
        if core.path.is_empty() {
            let homepage = core.setting("settings", "homepage");
            if !homepage.trim().is_empty() {
                core.router.change_route(&homepage);
            }
        }
        Ok(())
    }

    fn routes(&self, core: &mut Core) -> Result<()> {
        core.router.fallback("(:str)", SiteRoute::new(MODULE, "page"))?;
        Ok(())
    }

    async fn handle(
        &self,
        core: &mut Core,
        action: &'static str,
        params: Vec<String>,
        _form: &FormData,
    ) -> Result<Output> {
        match (action, params.as_slice()) {
            ("page", [slug]) => self.page(core, slug).await,
            _ => Ok(Output::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::pages::not_found;
    use crate::test_helpers::test_core;
    use pretty_assertions::assert_eq;
    use roost_core::models::page::Page;

    async fn add_page(core: &Core, slug: &str, lang: &str) {
        let mut page = Page::new(format!("Title {}", slug), slug.to_string(), lang.to_string());
        page.content = "*hello*".to_string();
        page.markdown = true;
        PageRepository::new(core.db().clone()).create(&page).await.unwrap();
    }

    #[tokio::test]
    async fn test_page_by_slug_and_language() {
        let (mut core, _dirs) = test_core().await;
        add_page(&core, "about", "en_english").await;
        add_page(&core, "a-propos", "fr_french").await;

        let out = PagesSite
            .handle(&mut core, "page", vec!["about".into()], &FormData::default())
            .await
            .unwrap();
        assert!(matches!(out, Output::Page(ref t) if t == "index.html"));
        let ctx = core.base_context();
        assert_eq!(ctx.get("page_title").unwrap(), "Title about");
        assert!(ctx.get("page").unwrap()["content"].as_str().unwrap().contains("<em>hello</em>"));

        let out = PagesSite
            .handle(&mut core, "page", vec!["a-propos".into()], &FormData::default())
            .await
            .unwrap();
        assert!(matches!(out, Output::NotFound));

        core.set_language("fr_french");
        let out = PagesSite
            .handle(&mut core, "page", vec!["a-propos".into()], &FormData::default())
            .await
            .unwrap();
        assert!(matches!(out, Output::Page(_)));
    }

    #[tokio::test]
    async fn test_homepage_rewrites_empty_path() {
        let (mut core, _dirs) = test_core().await;
        PagesSite.init(&mut core).await.unwrap();
        assert_eq!(core.router.rewritten(), Some("blog"));
    }

    #[tokio::test]
    async fn test_not_found_uses_seeded_page() {
        let (mut core, _dirs) = test_core().await;
        let template = not_found(&mut core).await.unwrap();
        assert_eq!(template, "index.html");
        assert_eq!(core.base_context().get("page_title").unwrap(), "404");
    }
}
