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
use roost_core::models::page::Page;
use roost_core::models::pagelist::link_summary;
use roost_db::repositories::PagelistRepository;
use serde::Serialize;

use super::MODULE;
use crate::core::Core;
use crate::form::FormData;
use crate::markdown::render_body;
use crate::modules::pages::page_url;
use crate::modules::{Output, SiteModule, SiteRoute};

#[derive(Debug, Serialize)]
struct ListView {
    id: i64,
    title: String,
    description: String,
    content: String,
    slug: String,
}

#[derive(Debug, Serialize)]
struct SubpageView {
    id: i64,
    title: String,
    slug: String,
    summary: String,
    picture: Option<String>,
    url: String,
}

pub struct PagelistSite;

impl PagelistSite {
    async fn show(&self, core: &mut Core, slug: &str) -> Result<Output> {
        let repo = PagelistRepository::new(core.db().clone());
        let Some(list) = repo.find_by_slug(slug, &core.lang_code).await? else {
            return Ok(Output::NotFound);
        };
        let id = list.id.unwrap_or_default();
        let subpages: Vec<SubpageView> = repo
            .links(id)
            .await?
            .into_iter()
            .map(|linked| {
                let page = Page::new(linked.title.clone(), linked.slug.clone(), linked.lang.clone());
                SubpageView {
                    id: linked.link.page,
                    summary: link_summary(linked.desc.as_deref().unwrap_or_default()),
                    picture: linked.link.picture,
                    url: page_url(core, &page),
                    title: linked.title,
                    slug: linked.slug,
                }
            })
            .collect();

        let view = ListView {
            id,
            content: render_body(list.content.as_deref().unwrap_or_default(), list.markdown),
            description: list.description.unwrap_or_default(),
            title: list.title,
            slug: list.slug,
        };
        core.assign("page_title", &view.title);
        core.assign("page_desc", &view.description);
        core.assign("page", &view);
        core.assign("subpages", &subpages);
        Ok(Output::Page(list.template))
    }

    /// The slug of a literal list route is the last segment of the routed path.
    fn routed_slug(core: &Core) -> String {
        let path = core.router.rewritten().unwrap_or(&core.path);
        path.rsplit('/').next().unwrap_or_default().to_string()
    }
}

#[async_trait]
impl SiteModule for PagelistSite {
    fn name(&self) -> &'static str {
        MODULE
    }

    /// List slugs live in the database, so their routes are added here.
    async fn init(&self, core: &mut Core) -> Result<()> {
        let lists = PagelistRepository::new(core.db().clone()).list(None).await?;
        let mut slugs: Vec<String> = lists.into_iter().map(|l| l.slug).collect();
        slugs.sort();
        slugs.dedup();
        for slug in slugs {
            core.router.route(&slug, SiteRoute::new(MODULE, "list"))?;
        }
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
            ("list", []) => {
                let slug = Self::routed_slug(core);
                self.show(core, &slug).await
            }
            _ => Ok(Output::NotFound),
        }
    }
}
