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
use roost_core::utils::create_slug;
use roost_core::Pagination;
use roost_db::repositories::PageRepository;
use serde::Serialize;
use tera::Context;

use super::{page_url, MODULE};
use crate::core::Core;
use crate::form::FormData;
use crate::modules::helpers::{self, input_datetime, parse_datetime};
use crate::modules::{AdminModule, AdminRequest, NavItem, Output};

const PER_PAGE: i64 = 10;

#[derive(Debug, Serialize)]
struct PageRow {
    id: i64,
    title: String,
    slug: String,
    date: String,
    view_url: String,
    edit_url: String,
    delete_url: String,
}

pub struct PagesAdmin;

impl PagesAdmin {
    fn repo(core: &Core) -> PageRepository {
        PageRepository::new(core.db().clone())
    }

    async fn manage(&self, core: &mut Core, request: &AdminRequest) -> Result<Output> {
        let lang = helpers::content_lang(core, MODULE, request);
        let repo = Self::repo(core);
        let total = repo.count(Some(&lang)).await?;
        let pagination = Pagination::new(request.page(0), total, PER_PAGE, core.admin_url("pages/manage/%d"));
        let pages = repo.list_paginated(&lang, PER_PAGE, pagination.offset()).await?;
        let rows: Vec<PageRow> = pages
            .iter()
            .map(|page| {
                let id = page.id.unwrap_or_default();
                PageRow {
                    id,
                    title: page.title.clone(),
                    slug: page.slug.clone(),
                    date: core.format_date(page.date, "%Y-%m-%d %H:%M"),
                    view_url: page_url(core, page),
                    edit_url: core.admin_url(&format!("pages/edit/{}", id)),
                    delete_url: core.admin_url(&format!("pages/delete/{}", id)),
                }
            })
            .collect();

        let mut ctx = Context::new();
        ctx.insert("pages", &rows);
        ctx.insert("pagination", &pagination.nav());
        ctx.insert("lang_filter", &lang);
        ctx.insert("languages", &helpers::languages(core));
        ctx.insert("add_url", &core.admin_url("pages/add"));
        helpers::view(core, "modules/pages/admin/manage.html", ctx)
    }

    async fn form(&self, core: &mut Core, id: Option<i64>) -> Result<Output> {
        let page = match id {
            Some(id) => match Self::repo(core).find_by_id(id).await? {
                Some(page) => Some(page),
                None => return Ok(helpers::redirect(core, "pages/manage")),
            },
            None => None,
        };
        let form = core.take_form();
        let date = page.as_ref().map(|p| p.date).unwrap_or_else(|| core.now());

        let mut ctx = Context::new();
        ctx.insert("form", &form);
        ctx.insert("date", &input_datetime(core, date));
        ctx.insert("templates", &core.theme_templates());
        ctx.insert("languages", &helpers::languages(core));
        ctx.insert("site_lang", &core.setting("settings", "lang_site"));
        ctx.insert("editor", &core.setting("settings", "editor"));
        ctx.insert("upload_url", &core.admin_url("pages/editor_upload"));
        let save_path = match id {
            Some(id) => format!("pages/save/{}", id),
            None => "pages/save".to_string(),
        };
        ctx.insert("save_url", &core.admin_url(&save_path));
        if let Some(page) = &page {
            ctx.insert("view_url", &page_url(core, page));
        }
        ctx.insert("page", &page);
        helpers::view(core, "modules/pages/admin/form.html", ctx)
    }

    async fn save(&self, core: &mut Core, id: Option<i64>, form: &FormData) -> Result<Output> {
        let repo = Self::repo(core);
        let back = match id {
            Some(id) => format!("pages/edit/{}", id),
            None => "pages/add".to_string(),
        };

        let title = form.text("title");
        let lang = form.text("lang");
        let template = form.text("template");
        if title.is_empty() || template.is_empty() || !core.state.lang.is_active(&lang) {
            let text = core.lang_text("general", "fill_inputs");
            return Ok(helpers::reject(core, form, text, &back));
        }
        let slug = create_slug(&form.optional("slug").unwrap_or_else(|| title.clone()));
        if slug.is_empty() {
            let text = core.lang_text("general", "wrong_slug");
            return Ok(helpers::reject(core, form, text, &back));
        }
        if repo.slug_taken(&slug, &lang, id).await? {
            let text = core.lang_text(MODULE, "page_exists");
            return Ok(helpers::reject(core, form, text, &back));
        }

        let mut page = match id {
            Some(id) => match repo.find_by_id(id).await? {
                Some(page) => page,
                None => return Ok(Output::NotFound),
            },
            None => Page::new(String::new(), String::new(), String::new()),
        };
        page.title = title;
        page.slug = slug;
        page.lang = lang;
        page.template = template;
        page.desc = form.optional("desc");
        page.content = form.get("content").unwrap_or_default().to_string();
        page.markdown = form.checked("markdown");
        page.date = parse_datetime(core, &form.text("date")).unwrap_or_else(|| core.now());

        let id = match page.id {
            Some(id) => {
                repo.update(&page).await?;
                id
            }
            None => repo.create(&page).await?,
        };
        tracing::info!("Saved page {} ({})", id, page.slug);
        let text = core.lang_text(MODULE, "save_success");
        Ok(helpers::success(core, text, &format!("pages/edit/{}", id)))
    }

    async fn delete(&self, core: &mut Core, id: i64) -> Result<Output> {
        let repo = Self::repo(core);
        if repo.find_by_id(id).await?.is_none() {
            let text = core.lang_text(MODULE, "delete_failure");
            return Ok(helpers::failure(core, text, "pages/manage"));
        }
        repo.delete(id).await?;
        let text = core.lang_text(MODULE, "delete_success");
        Ok(helpers::success(core, text, "pages/manage"))
    }
}

#[async_trait]
impl AdminModule for PagesAdmin {
    fn name(&self) -> &'static str {
        MODULE
    }

    fn navigation(&self, core: &Core) -> Vec<NavItem> {
        vec![
            NavItem::new(core.lang_text("general", "manage"), "manage"),
            NavItem::new(core.lang_text(MODULE, "add_new"), "add"),
        ]
    }

    async fn dispatch(&self, core: &mut Core, request: AdminRequest) -> Result<Output> {
        match (request.action.as_str(), request.id(0)) {
            ("manage", _) => self.manage(core, &request).await,
            ("add", _) => self.form(core, None).await,
            ("edit", Some(id)) => self.form(core, Some(id)).await,
            ("save", id) if request.is_post() => self.save(core, id, &request.form).await,
            ("delete", Some(id)) => self.delete(core, id).await,
            ("editor_upload", _) if request.is_post() => helpers::editor_upload(core, MODULE, &request.form),
            _ => Ok(Output::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::admin_core;
    use pretty_assertions::assert_eq;

    fn page_form(title: &str, slug: &str) -> FormData {
        FormData::from_pairs([
            ("title", title),
            ("slug", slug),
            ("lang", "en_english"),
            ("template", "index.html"),
            ("content", "<p>Body</p>"),
            ("date", ""),
        ])
    }

    #[tokio::test]
    async fn test_save_creates_and_refuses_duplicate_slug() {
        let (mut core, _dirs) = admin_core().await;
        let out = PagesAdmin
            .dispatch(&mut core, AdminRequest::post("save", &[], page_form("About us", "")))
            .await
            .unwrap();
        assert!(matches!(out, Output::Redirect(ref url) if url.contains("pages/edit/")));
        let repo = PagesAdmin::repo(&core);
        let page = repo.find_by_slug("about-us", "en_english").await.unwrap().unwrap();
        assert_eq!(page.title, "About us");

        PagesAdmin
            .dispatch(&mut core, AdminRequest::post("save", &[], page_form("Other", "about-us")))
            .await
            .unwrap();
        assert_eq!(
            core.session.data.failure.as_deref(),
            Some(core.lang_text(MODULE, "page_exists").as_str())
        );
        assert_eq!(repo.count(Some("en_english")).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_missing_title_is_rejected() {
        let (mut core, _dirs) = admin_core().await;
        PagesAdmin
            .dispatch(&mut core, AdminRequest::post("save", &[], page_form("", "x")))
            .await
            .unwrap();
        assert!(core.session.data.failure.is_some());
        assert_eq!(core.session.data.form.as_ref().unwrap()["slug"], "x");
    }

    #[tokio::test]
    async fn test_manage_and_delete() {
        let (mut core, _dirs) = admin_core().await;
        let out = PagesAdmin
            .dispatch(&mut core, AdminRequest::get("manage", &[]))
            .await
            .unwrap();
        assert!(matches!(out, Output::Html(ref html) if html.contains("404")));

        PagesAdmin
            .dispatch(&mut core, AdminRequest::get("delete", &["1"]))
            .await
            .unwrap();
        assert_eq!(PagesAdmin::repo(&core).count(None).await.unwrap(), 0);
    }
}
