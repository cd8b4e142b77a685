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

//! Static pages, the homepage redirection and the 404 page.

pub mod admin;
pub mod site;

use anyhow::Result;
use roost_core::models::page::Page;
use roost_db::repositories::PageRepository;
use serde::Serialize;

use crate::core::Core;
use crate::markdown::render_body;

pub const MODULE: &str = "pages";
pub const NOT_FOUND_SLUG: &str = "404";

#[derive(Debug, Clone, Serialize)]
pub struct PageView {
    pub id: Option<i64>,
    pub title: String,
    pub slug: String,
    pub desc: String,
    pub content: String,
    pub date: String,
    pub url: String,
}

/// Site link of a page in its own language.
pub fn page_url(core: &Core, page: &Page) -> String {
    let site_lang = core.setting("settings", "lang_site");
    if page.lang == site_lang {
        core.url(&page.slug)
    } else {
        core.url(&format!(
            "{}/{}",
            roost_core::utils::text::lang_prefix(&page.lang),
            page.slug
        ))
    }
}

pub fn page_view(core: &Core, page: &Page) -> PageView {
    PageView {
        id: page.id,
        title: page.title.clone(),
        slug: page.slug.clone(),
        desc: page.desc.clone().unwrap_or_default(),
        content: render_body(&page.content, page.markdown),
        date: core.format_date(page.date, "%Y-%m-%d"),
        url: page_url(core, page),
    }
}

/// Assign a page for its theme template and return the template name.
pub fn show_page(core: &mut Core, page: &Page) -> String {
    let view = page_view(core, page);
    core.assign("page_title", &view.title);
    core.assign("page_desc", &view.desc);
    core.assign("page", &view);
    page.template.clone()
}

/// Prepare the not-found page of the current language, falling back to the
/// site language. Returns the template to render.
pub async fn not_found(core: &mut Core) -> Result<String> {
    let repo = PageRepository::new(core.db().clone());
    let mut page = repo.find_by_slug(NOT_FOUND_SLUG, &core.lang_code).await?;
    if page.is_none() {
        let site_lang = core.setting("settings", "lang_site");
        page = repo.find_by_slug(NOT_FOUND_SLUG, &site_lang).await?;
    }
    let page = page.unwrap_or_else(|| {
        let mut page = Page::new(
            core.lang_text("general", "not_found"),
            NOT_FOUND_SLUG.to_string(),
            core.lang_code.clone(),
        );
        page.content = format!("<p>{}</p>", core.lang_text("general", "not_found_desc"));
        page
    });
    Ok(show_page(core, &page))
}
