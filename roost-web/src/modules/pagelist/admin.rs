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
use chrono::Utc;
use roost_core::models::pagelist::{MoveDirection, Pagelist};
use roost_core::utils::create_slug;
use roost_core::utils::text::truncate;
use roost_db::repositories::{PageRepository, PagelistRepository};
use serde::Serialize;
use tera::Context;

use super::MODULE;
use crate::core::Core;
use crate::form::FormData;
use crate::modules::helpers;
use crate::modules::pages::page_url;
use crate::modules::{AdminModule, AdminRequest, NavItem, Output};

#[derive(Debug, Serialize)]
struct LinkRow {
    page: i64,
    title: String,
    picture: Option<String>,
    view_url: String,
    up_url: String,
    down_url: String,
    edit_url: String,
    delete_url: String,
}

#[derive(Debug, Serialize)]
struct ListRow {
    id: i64,
    title: String,
    slug: String,
    description: String,
    view_url: String,
    edit_url: String,
    delete_url: String,
    links: Vec<LinkRow>,
}

#[derive(Debug, Serialize)]
struct Choice {
    id: i64,
    title: String,
    selected: bool,
}

pub struct PagelistAdmin;

impl PagelistAdmin {
    fn repo(core: &Core) -> PagelistRepository {
        PagelistRepository::new(core.db().clone())
    }

    fn list_url(core: &Core, list: &Pagelist) -> String {
        if list.lang == core.setting("settings", "lang_site") {
            core.url(&list.slug)
        } else {
            core.url(&format!(
                "{}/{}",
                roost_core::utils::text::lang_prefix(&list.lang),
                list.slug
            ))
        }
    }

    async fn manage(&self, core: &mut Core, request: &AdminRequest) -> Result<Output> {
        let lang = helpers::content_lang(core, MODULE, request);
        let repo = Self::repo(core);
        let mut rows = Vec::new();
        for list in repo.list(Some(&lang)).await? {
            let id = list.id.unwrap_or_default();
            let links = repo
                .links(id)
                .await?
                .into_iter()
                .map(|linked| {
                    let page = linked.link.page;
                    let target = format!("{}/{}", id, page);
                    let mut view = roost_core::models::page::Page::new(
                        linked.title.clone(),
                        linked.slug.clone(),
                        linked.lang.clone(),
                    );
                    view.id = Some(page);
                    LinkRow {
                        page,
                        view_url: page_url(core, &view),
                        up_url: core.admin_url(&format!("pagelist/move/up/{}", target)),
                        down_url: core.admin_url(&format!("pagelist/move/down/{}", target)),
                        edit_url: core.admin_url(&format!("pagelist/edit_link/{}", target)),
                        delete_url: core.admin_url(&format!("pagelist/delete_link/{}", target)),
                        title: linked.title,
                        picture: linked.link.picture,
                    }
                })
                .collect();
            rows.push(ListRow {
                id,
                view_url: Self::list_url(core, &list),
                edit_url: core.admin_url(&format!("pagelist/edit/{}", id)),
                delete_url: core.admin_url(&format!("pagelist/delete/{}", id)),
                description: truncate(list.description.as_deref().unwrap_or_default(), 48, "..."),
                title: list.title,
                slug: list.slug,
                links,
            });
        }

        let mut ctx = Context::new();
        ctx.insert("lists", &rows);
        ctx.insert("lang_filter", &lang);
        ctx.insert("languages", &helpers::languages(core));
        ctx.insert("add_url", &core.admin_url("pagelist/add"));
        ctx.insert("add_link_url", &core.admin_url(&format!("pagelist/add_link?lang={}", lang)));
        helpers::view(core, "modules/pagelist/admin/manage.html", ctx)
    }

    async fn form(&self, core: &mut Core, id: Option<i64>) -> Result<Output> {
        let list = match id {
            Some(id) => match Self::repo(core).find_by_id(id).await? {
                Some(list) => Some(list),
                None => return Ok(helpers::redirect(core, "pagelist/manage")),
            },
            None => None,
        };
        let mut ctx = Context::new();
        ctx.insert("form", &core.take_form());
        ctx.insert("templates", &core.theme_templates());
        ctx.insert("languages", &helpers::languages(core));
        ctx.insert("site_lang", &core.setting("settings", "lang_site"));
        ctx.insert("editor", &core.setting("settings", "editor"));
        ctx.insert("upload_url", &core.admin_url("pagelist/editor_upload"));
        ctx.insert("manage_url", &core.admin_url("pagelist/manage"));
        let save_path = match id {
            Some(id) => format!("pagelist/save/{}", id),
            None => "pagelist/save".to_string(),
        };
        ctx.insert("save_url", &core.admin_url(&save_path));
        ctx.insert("list", &list);
        helpers::view(core, "modules/pagelist/admin/form.html", ctx)
    }

    async fn save(&self, core: &mut Core, id: Option<i64>, form: &FormData) -> Result<Output> {
        let repo = Self::repo(core);
        let back = match id {
            Some(id) => format!("pagelist/edit/{}", id),
            None => "pagelist/add".to_string(),
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

        let list = Pagelist {
            id,
            title,
            description: form.optional("description"),
            content: form.optional("content"),
            lang,
            markdown: form.checked("markdown"),
            template,
            slug,
            updated_at: Utc::now(),
        };
        let id = match id {
            Some(id) => {
                if repo.find_by_id(id).await?.is_none() {
                    return Ok(Output::NotFound);
                }
                repo.update(&list).await?;
                id
            }
            None => repo.create(&list).await?,
        };
        let text = core.lang_text(MODULE, "save_success");
        Ok(helpers::success(core, text, &format!("pagelist/edit/{}", id)))
    }

    async fn delete(&self, core: &mut Core, id: i64) -> Result<Output> {
        let repo = Self::repo(core);
        if repo.find_by_id(id).await?.is_none() {
            let text = core.lang_text(MODULE, "delete_failure");
            return Ok(helpers::failure(core, text, "pagelist/manage"));
        }
        repo.delete(id).await?;
        let text = core.lang_text(MODULE, "delete_success");
        Ok(helpers::success(core, text, "pagelist/manage"))
    }

    async fn link_form(&self, core: &mut Core, request: &AdminRequest, link: Option<(i64, i64)>) -> Result<Output> {
        let mut picture = None;
        let mut link_lang = None;
        if let Some((list, page)) = link {
            match Self::repo(core).find_link(list, page).await? {
                Some(found) => {
                    picture = found.link.picture;
                    link_lang = Some(found.lang);
                }
                None => return Ok(helpers::redirect(core, "pagelist/manage")),
            }
        }
        let lang = match link_lang {
            Some(lang) => lang,
            None => request
                .query("lang")
                .filter(|l| core.state.lang.is_active(l))
                .map(str::to_string)
                .unwrap_or_else(|| core.setting("settings", "lang_site")),
        };
        let form = core.take_form();
        let chosen = |key: &str, current: Option<i64>| {
            form.get(key)
                .and_then(|v| v.as_str())
                .and_then(|v| v.parse::<i64>().ok())
                .or(current)
        };
        let chosen_list = chosen("pagelist", link.map(|l| l.0));
        let chosen_page = chosen("page", link.map(|l| l.1));

        let lists: Vec<Choice> = Self::repo(core)
            .list(Some(&lang))
            .await?
            .into_iter()
            .map(|l| Choice {
                selected: l.id == chosen_list,
                id: l.id.unwrap_or_default(),
                title: l.title,
            })
            .collect();
        let pages: Vec<Choice> = PageRepository::new(core.db().clone())
            .list(Some(&lang))
            .await?
            .into_iter()
            .map(|p| Choice {
                selected: p.id == chosen_page,
                id: p.id.unwrap_or_default(),
                title: p.title,
            })
            .collect();

        let mut ctx = Context::new();
        ctx.insert("lists", &lists);
        ctx.insert("pages", &pages);
        ctx.insert("picture", &picture);
        ctx.insert("lock_edit", &link.is_some());
        ctx.insert("lang_filter", &lang);
        ctx.insert("languages", &helpers::languages(core));
        ctx.insert("save_url", &core.admin_url("pagelist/save_link"));
        ctx.insert("manage_url", &core.admin_url("pagelist/manage"));
        helpers::view(core, "modules/pagelist/admin/link.html", ctx)
    }

    async fn save_link(&self, core: &mut Core, form: &FormData) -> Result<Output> {
        let repo = Self::repo(core);
        let (Some(list), Some(page)) = (form.int("pagelist"), form.int("page")) else {
            let text = core.lang_text("general", "fill_inputs");
            return Ok(helpers::reject(core, form, text, "pagelist/add_link"));
        };
        if repo.find_by_id(list).await?.is_none()
            || PageRepository::new(core.db().clone()).find_by_id(page).await?.is_none()
        {
            let text = core.lang_text("general", "fill_inputs");
            return Ok(helpers::reject(core, form, text, "pagelist/add_link"));
        }
        let picture = form.optional("picture");
        if picture.is_none() && repo.find_link(list, page).await?.is_some() {
            repo.clear_link_picture(list, page).await?;
        } else {
            repo.save_link(list, page, picture.as_deref()).await?;
        }
        let text = core.lang_text(MODULE, "save_link_success");
        Ok(helpers::success(core, text, "pagelist/manage"))
    }

    async fn move_link(&self, core: &mut Core, request: &AdminRequest) -> Result<Output> {
        let direction = request.param(0).and_then(MoveDirection::parse);
        let moved = match (direction, request.id(1), request.id(2)) {
            (Some(direction), Some(list), Some(page)) => {
                Self::repo(core).move_link(list, page, direction).await?
            }
            _ => false,
        };
        if moved {
            let text = core.lang_text(MODULE, "move_link_success");
            Ok(helpers::success(core, text, "pagelist/manage"))
        } else {
            let text = core.lang_text(MODULE, "move_link_failure");
            Ok(helpers::failure(core, text, "pagelist/manage"))
        }
    }

    async fn delete_link(&self, core: &mut Core, list: i64, page: i64) -> Result<Output> {
        match Self::repo(core).delete_link(list, page).await? {
            Some(_) => {
                let text = core.lang_text(MODULE, "delete_link_success");
                Ok(helpers::success(core, text, "pagelist/manage"))
            }
            None => {
                let text = core.lang_text(MODULE, "delete_link_failure");
                Ok(helpers::failure(core, text, "pagelist/manage"))
            }
        }
    }
}

#[async_trait]
impl AdminModule for PagelistAdmin {
    fn name(&self) -> &'static str {
        MODULE
    }

    fn navigation(&self, core: &Core) -> Vec<NavItem> {
        vec![
            NavItem::new(core.lang_text("general", "manage"), "manage"),
            NavItem::new(core.lang_text(MODULE, "add_new"), "add"),
            NavItem::new(core.lang_text(MODULE, "add_new_link"), "add_link"),
        ]
    }

    async fn dispatch(&self, core: &mut Core, request: AdminRequest) -> Result<Output> {
        match (request.action.as_str(), request.id(0), request.id(1)) {
            ("manage", _, _) => self.manage(core, &request).await,
            ("add", _, _) => self.form(core, None).await,
            ("edit", Some(id), _) => self.form(core, Some(id)).await,
            ("save", id, _) if request.is_post() => self.save(core, id, &request.form).await,
            ("delete", Some(id), _) => self.delete(core, id).await,
            ("add_link", _, _) => self.link_form(core, &request, None).await,
            ("edit_link", Some(list), Some(page)) => self.link_form(core, &request, Some((list, page))).await,
            ("save_link", _, _) if request.is_post() => self.save_link(core, &request.form).await,
            ("move", _, _) => self.move_link(core, &request).await,
            ("delete_link", Some(list), Some(page)) => self.delete_link(core, list, page).await,
            ("editor_upload", _, _) if request.is_post() => helpers::editor_upload(core, MODULE, &request.form),
            _ => Ok(Output::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::admin_core;
    use pretty_assertions::assert_eq;
    use roost_core::models::page::Page;

    fn list_form(title: &str) -> FormData {
        FormData::from_pairs([
            ("title", title),
            ("slug", ""),
            ("lang", "en_english"),
            ("template", "pagelist.html"),
            ("description", "Lists"),
        ])
    }

    async fn add_pages(core: &Core, n: usize) -> Vec<i64> {
        let repo = PageRepository::new(core.db().clone());
        let mut ids = Vec::new();
        for i in 0..n {
            let page = Page::new(format!("P{}", i), format!("p{}", i), "en_english".into());
            ids.push(repo.create(&page).await.unwrap());
        }
        ids
    }

    #[tokio::test]
    async fn test_list_slug_unique_per_language() {
        let (mut core, _dirs) = admin_core().await;
        PagelistAdmin
            .dispatch(&mut core, AdminRequest::post("save", &[], list_form("Our Guides")))
            .await
            .unwrap();
        let repo = PagelistAdmin::repo(&core);
        assert!(repo.find_by_slug("our-guides", "en_english").await.unwrap().is_some());

        PagelistAdmin
            .dispatch(&mut core, AdminRequest::post("save", &[], list_form("Our guides")))
            .await
            .unwrap();
        assert_eq!(
            core.session.data.failure.as_deref(),
            Some(core.lang_text(MODULE, "page_exists").as_str())
        );
        assert_eq!(repo.list(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_links_append_move_and_delete() {
        let (mut core, _dirs) = admin_core().await;
        PagelistAdmin
            .dispatch(&mut core, AdminRequest::post("save", &[], list_form("Guides")))
            .await
            .unwrap();
        let pages = add_pages(&core, 3).await;
        for page in &pages {
            let page = page.to_string();
            let form = FormData::from_pairs([("pagelist", "1"), ("page", page.as_str()), ("picture", "")]);
            PagelistAdmin
                .dispatch(&mut core, AdminRequest::post("save_link", &[], form))
                .await
                .unwrap();
        }
        let repo = PagelistAdmin::repo(&core);
        let order = |links: Vec<roost_db::repositories::LinkedPage>| {
            links.into_iter().map(|l| (l.link.page, l.link.position)).collect::<Vec<_>>()
        };
        assert_eq!(order(repo.links(1).await.unwrap()), vec![(pages[0], 0), (pages[1], 1), (pages[2], 2)]);

        // A second save of an existing link only touches its picture.
        let page = pages[0].to_string();
        let form = FormData::from_pairs([("pagelist", "1"), ("page", page.as_str()), ("picture", "/p.png")]);
        PagelistAdmin
            .dispatch(&mut core, AdminRequest::post("save_link", &[], form))
            .await
            .unwrap();
        let first = repo.find_link(1, pages[0]).await.unwrap().unwrap();
        assert_eq!((first.link.position, first.link.picture.as_deref()), (0, Some("/p.png")));

        let last = pages[2].to_string();
        PagelistAdmin
            .dispatch(&mut core, AdminRequest::get("move", &["up", "1", &last]))
            .await
            .unwrap();
        assert_eq!(order(repo.links(1).await.unwrap()), vec![(pages[0], 0), (pages[2], 1), (pages[1], 2)]);

        PagelistAdmin
            .dispatch(&mut core, AdminRequest::get("move", &["down", "1", &pages[1].to_string()]))
            .await
            .unwrap();
        assert_eq!(
            core.session.data.failure.as_deref(),
            Some(core.lang_text(MODULE, "move_link_failure").as_str())
        );

        PagelistAdmin
            .dispatch(&mut core, AdminRequest::get("delete_link", &["1", &pages[0].to_string()]))
            .await
            .unwrap();
        assert_eq!(order(repo.links(1).await.unwrap()), vec![(pages[2], 0), (pages[1], 1)]);
    }

    #[tokio::test]
    async fn test_manage_lists_links() {
        let (mut core, _dirs) = admin_core().await;
        PagelistAdmin
            .dispatch(&mut core, AdminRequest::post("save", &[], list_form("Guides")))
            .await
            .unwrap();
        let pages = add_pages(&core, 1).await;
        PagelistAdmin::repo(&core).save_link(1, pages[0], None).await.unwrap();
        let out = PagelistAdmin
            .dispatch(&mut core, AdminRequest::get("manage", &[]))
            .await
            .unwrap();
        assert!(matches!(out, Output::Html(ref html) if html.contains("P0") && html.contains("pagelist/move/up/1/")));
    }
}
