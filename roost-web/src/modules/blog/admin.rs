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
use roost_core::models::blog::{parse_tag_list, BlogPost, PostStatus};
use roost_core::utils::create_slug;
use roost_core::Pagination;
use roost_db::repositories::BlogRepository;
use serde::Serialize;
use tera::Context;

use super::{cover_url, default_cover, post_url, MODULE};
use crate::core::Core;
use crate::form::FormData;
use crate::modules::helpers::{self, input_datetime, parse_datetime};
use crate::modules::{AdminModule, AdminRequest, NavItem, Output};
use crate::uploads;

const PER_PAGE: i64 = 10;

#[derive(Debug, Serialize)]
struct PostRow {
    id: i64,
    title: String,
    url: String,
    status: PostStatus,
    lang: String,
    date: String,
    edit_url: String,
    delete_url: String,
}

pub struct BlogAdmin;

impl BlogAdmin {
    fn repo(core: &Core) -> BlogRepository {
        BlogRepository::new(core.db().clone())
    }

    async fn manage(&self, core: &mut Core, page: i64) -> Result<Output> {
        let repo = Self::repo(core);
        let total = repo.count().await?;
        let pagination = Pagination::new(page, total, PER_PAGE, core.admin_url("blog/manage/%d"));
        let rows = repo
            .list_all(PER_PAGE, pagination.offset())
            .await?
            .into_iter()
            .map(|post| {
                let id = post.id.unwrap_or_default();
                PostRow {
                    id,
                    url: post_url(core, &post.slug),
                    date: core.format_date(post.published_at, "%Y-%m-%d %H:%M"),
                    edit_url: core.admin_url(&format!("blog/edit/{}", id)),
                    delete_url: core.admin_url(&format!("blog/delete/{}", id)),
                    title: post.title,
                    status: post.status,
                    lang: post.lang,
                }
            })
            .collect::<Vec<_>>();

        let mut ctx = Context::new();
        ctx.insert("posts", &rows);
        ctx.insert("pagination", &pagination.nav());
        ctx.insert("add_url", &core.admin_url("blog/add"));
        helpers::view(core, "modules/blog/admin/manage.html", ctx)
    }

    async fn form(&self, core: &mut Core, id: Option<i64>) -> Result<Output> {
        let repo = Self::repo(core);
        let post = match id {
            Some(id) => match repo.find_by_id(id).await? {
                Some(post) => Some(post),
                None => return Ok(Output::NotFound),
            },
            None => None,
        };
        let tags = match post.as_ref().and_then(|p| p.id) {
            Some(id) => repo
                .tags_for_post(id)
                .await?
                .into_iter()
                .map(|t| t.name)
                .collect::<Vec<_>>()
                .join(", "),
            None => String::new(),
        };
        let published_at = input_datetime(
            core,
            post.as_ref().map(|p| p.published_at).unwrap_or_else(|| core.now()),
        );
        let save_path = match id {
            Some(id) => format!("blog/save/{}", id),
            None => "blog/save".to_string(),
        };

        let mut ctx = Context::new();
        ctx.insert("form", &core.take_form());
        ctx.insert("tags", &tags);
        ctx.insert("published_at", &published_at);
        ctx.insert("languages", &helpers::languages(core));
        ctx.insert("site_lang", &core.setting("settings", "lang_site"));
        ctx.insert(
            "statuses",
            &[
                (PostStatus::Draft.as_i64(), core.lang_text(MODULE, "status_draft")),
                (PostStatus::Hidden.as_i64(), core.lang_text(MODULE, "status_hidden")),
                (PostStatus::Published.as_i64(), core.lang_text(MODULE, "status_published")),
            ],
        );
        if let Some(post) = &post {
            ctx.insert("status", &post.status.as_i64());
            ctx.insert("cover_url", &post.cover_photo.as_ref().map(|_| cover_url(core, post)));
            if let Some(id) = post.id {
                ctx.insert("delete_cover_url", &core.admin_url(&format!("blog/delete_cover/{}", id)));
                ctx.insert("view_url", &post_url(core, &post.slug));
            }
        }
        ctx.insert("post", &post);
        ctx.insert("save_url", &core.admin_url(&save_path));
        ctx.insert("editor", &core.setting("settings", "editor"));
        helpers::view(core, "modules/blog/admin/form.html", ctx)
    }

    async fn save(&self, core: &mut Core, id: Option<i64>, form: &FormData) -> Result<Output> {
        let repo = Self::repo(core);
        let back = match id {
            Some(id) => format!("blog/edit/{}", id),
            None => "blog/add".to_string(),
        };

        let title = form.text("title");
        let content = form.get("content").unwrap_or_default().to_string();
        if title.is_empty() || content.trim().is_empty() {
            let text = core.lang_text("general", "fill_inputs");
            return Ok(helpers::reject(core, form, text, &back));
        }
        let slug = create_slug(&form.optional("slug").unwrap_or_else(|| title.clone()));
        if slug.is_empty() {
            let text = core.lang_text("general", "wrong_slug");
            return Ok(helpers::reject(core, form, text, &back));
        }
        if repo.slug_taken(&slug, id).await? {
            let text = core.lang_text(MODULE, "slug_taken");
            return Ok(helpers::reject(core, form, text, &back));
        }
        let Some(user_id) = core.user_id() else {
            return Ok(Output::NotFound);
        };

        let mut post = match id {
            Some(id) => match repo.find_by_id(id).await? {
                Some(post) => post,
                None => return Ok(Output::NotFound),
            },
            None => BlogPost::new(user_id, String::new(), String::new(), String::new(), String::new()),
        };
        let lang = form.text("lang");
        post.title = title;
        post.slug = slug;
        post.content = content;
        post.intro = form.optional("intro");
        post.status = PostStatus::from_i64(form.int("status").unwrap_or_default());
        post.lang = if core.state.lang.is_active(&lang) {
            lang
        } else {
            core.setting("settings", "lang_site")
        };
        post.markdown = form.checked("markdown");
        post.comments = form.checked("comments");
        post.published_at = parse_datetime(core, &form.text("published_at")).unwrap_or_else(|| core.now());
        post.updated_at = core.now();

        let id = match post.id {
            Some(id) => {
                repo.update(&post).await?;
                id
            }
            None => repo.create(&post).await?,
        };
        repo.set_tags(id, &parse_tag_list(&form.text("tags"))).await?;

        if let Some(file) = form.file("cover_photo") {
            let dir = uploads::module_dir(&core.config().uploads_path(), MODULE)?;
            match uploads::save_picture(&dir, &file.filename, Some(&post.slug), &file.bytes) {
                Ok(name) => {
                    if let Some(old) = post.cover_photo.as_deref() {
                        uploads::remove_file(&dir, old)?;
                    }
                    repo.set_cover(id, Some(&name)).await?;
                }
                Err(e) => {
                    tracing::warn!("Cover upload refused: {:#}", e);
                    let text = core.lang_text(MODULE, "cover_error");
                    return Ok(helpers::failure(core, text, &format!("blog/edit/{}", id)));
                }
            }
        }

        tracing::info!("Saved blog post {} ({})", id, post.slug);
        let text = core.lang_text(MODULE, "save_success");
        Ok(helpers::success(core, text, &format!("blog/edit/{}", id)))
    }

    async fn delete_cover(&self, core: &mut Core, id: i64) -> Result<Output> {
        let repo = Self::repo(core);
        let Some(post) = repo.find_by_id(id).await? else {
            return Ok(Output::NotFound);
        };
        if let Some(cover) = post.cover_photo.as_deref() {
            uploads::remove_file(&core.uploads_dir(MODULE), cover)?;
            repo.set_cover(id, None).await?;
        }
        let text = core.lang_text(MODULE, "cover_deleted");
        Ok(helpers::success(core, text, &format!("blog/edit/{}", id)))
    }

    async fn delete(&self, core: &mut Core, id: i64) -> Result<Output> {
        let repo = Self::repo(core);
        let Some(post) = repo.find_by_id(id).await? else {
            return Ok(Output::NotFound);
        };
        if let Some(cover) = post.cover_photo.as_deref() {
            uploads::remove_file(&core.uploads_dir(MODULE), cover)?;
        }
        repo.delete(id).await?;
        tracing::info!("Deleted blog post {}", id);
        let text = core.lang_text(MODULE, "delete_success");
        Ok(helpers::success(core, text, "blog/manage"))
    }

    async fn settings(&self, core: &mut Core, request: &AdminRequest) -> Result<Output> {
        if !request.is_post() {
            let mut ctx = Context::new();
            ctx.insert("blog", &core.settings.module(MODULE).cloned().unwrap_or_default());
            ctx.insert("default_cover", &default_cover(core));
            ctx.insert("save_url", &core.admin_url("blog/settings"));
            return helpers::view(core, "modules/blog/admin/settings.html", ctx);
        }

        let form = &request.form;
        let slug = create_slug(&form.text("slug"));
        let per_page = form.int("perpage").filter(|n| *n > 0).unwrap_or(5);
        let latest = form.int("latestPostsCount").filter(|n| *n >= 0).unwrap_or(5);
        let mut values = vec![
            ("title", form.text("title")),
            ("desc", form.text("desc")),
            ("dateformat", form.optional("dateformat").unwrap_or_else(|| "%b %d, %Y".to_string())),
            ("perpage", per_page.to_string()),
            ("latestPostsCount", latest.to_string()),
            ("slug", if slug.is_empty() { MODULE.to_string() } else { slug }),
        ];

        if let Some(file) = form.file("default_cover") {
            let dir = uploads::module_dir(&core.config().uploads_path(), MODULE)?;
            match uploads::save_picture(&dir, &file.filename, Some("default-cover"), &file.bytes) {
                Ok(name) => {
                    let old = core.setting(MODULE, "default_cover");
                    if !old.is_empty() {
                        uploads::remove_file(&dir, &old)?;
                    }
                    values.push(("default_cover", name));
                }
                Err(e) => {
                    tracing::warn!("Default cover refused: {:#}", e);
                    let text = core.lang_text(MODULE, "cover_error");
                    return Ok(helpers::failure(core, text, "blog/settings"));
                }
            }
        }

        core.settings.update_many(MODULE, &values).await?;
        let text = core.lang_text("general", "settings_saved");
        Ok(helpers::success(core, text, "blog/settings"))
    }
}

#[async_trait]
impl AdminModule for BlogAdmin {
    fn name(&self) -> &'static str {
        MODULE
    }

    fn navigation(&self, core: &Core) -> Vec<NavItem> {
        vec![
            NavItem::new(core.lang_text(MODULE, "manage"), "manage"),
            NavItem::new(core.lang_text(MODULE, "add_new"), "add"),
            NavItem::new(core.lang_text("general", "settings"), "settings"),
        ]
    }

    async fn dispatch(&self, core: &mut Core, request: AdminRequest) -> Result<Output> {
        match request.action.as_str() {
            "manage" => self.manage(core, request.page(0)).await,
            "add" => self.form(core, None).await,
            "edit" => match request.id(0) {
                Some(id) => self.form(core, Some(id)).await,
                None => Ok(Output::NotFound),
            },
            "save" if request.is_post() => self.save(core, request.id(0), &request.form).await,
            "delete_cover" => match request.id(0) {
                Some(id) => self.delete_cover(core, id).await,
                None => Ok(Output::NotFound),
            },
            "delete" => match request.id(0) {
                Some(id) => self.delete(core, id).await,
                None => Ok(Output::NotFound),
            },
            "settings" => self.settings(core, &request).await,
            _ => Ok(Output::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{admin_core, png_bytes};
    use pretty_assertions::assert_eq;

    fn post_form(title: &str, slug: &str) -> FormData {
        FormData::from_pairs([
            ("title", title),
            ("slug", slug),
            ("content", "Some **content**"),
            ("status", "2"),
            ("lang", "en_english"),
            ("markdown", "1"),
            ("tags", "Rust, web, rust"),
            ("published_at", "2024-05-01T10:00"),
        ])
    }

    #[tokio::test]
    async fn test_save_creates_post_with_tags() {
        let (mut core, _dirs) = admin_core().await;
        let out = BlogAdmin
            .dispatch(&mut core, AdminRequest::post("save", &[], post_form("Hello world", "")))
            .await
            .unwrap();
        assert!(matches!(out, Output::Redirect(ref url) if url.starts_with("/admin/blog/edit/")));

        let repo = BlogRepository::new(core.db().clone());
        let post = repo.find_by_slug("hello-world").await.unwrap().unwrap();
        assert_eq!(post.status, PostStatus::Published);
        assert!(post.markdown);
        assert_eq!(post.published_at.timestamp(), 1_714_557_600);
        let tags: Vec<String> = repo
            .tags_for_post(post.id.unwrap())
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(tags, vec!["Rust".to_string(), "web".to_string()]);
    }

    #[tokio::test]
    async fn test_save_rejects_missing_title_and_duplicate_slug() {
        let (mut core, _dirs) = admin_core().await;
        let out = BlogAdmin
            .dispatch(&mut core, AdminRequest::post("save", &[], post_form("", "")))
            .await
            .unwrap();
        assert!(matches!(out, Output::Redirect(ref url) if url.contains("blog/add")));
        assert!(core.session.data.failure.is_some());
        assert_eq!(core.take_form()["status"], "2");

        BlogAdmin
            .dispatch(&mut core, AdminRequest::post("save", &[], post_form("One", "same")))
            .await
            .unwrap();
        core.take_notify();
        BlogAdmin
            .dispatch(&mut core, AdminRequest::post("save", &[], post_form("Two", "same")))
            .await
            .unwrap();
        assert!(core.session.data.failure.is_some());
        assert_eq!(BlogRepository::new(core.db().clone()).count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cover_upload_and_delete() {
        let (mut core, dirs) = admin_core().await;
        let form = post_form("Covered", "covered").with_file("cover_photo", "photo.png", png_bytes(20, 10));
        BlogAdmin
            .dispatch(&mut core, AdminRequest::post("save", &[], form))
            .await
            .unwrap();
        let repo = BlogRepository::new(core.db().clone());
        let post = repo.find_by_slug("covered").await.unwrap().unwrap();
        let cover = post.cover_photo.clone().unwrap();
        assert!(cover.starts_with("covered-"));
        assert!(dirs.uploads().join("blog").join(&cover).exists());

        let id = post.id.unwrap().to_string();
        BlogAdmin
            .dispatch(&mut core, AdminRequest::get("delete_cover", &[&id]))
            .await
            .unwrap();
        assert!(repo.find_by_id(post.id.unwrap()).await.unwrap().unwrap().cover_photo.is_none());
        assert!(!dirs.uploads().join("blog").join(&cover).exists());
    }

    #[tokio::test]
    async fn test_delete_and_manage() {
        let (mut core, _dirs) = admin_core().await;
        BlogAdmin
            .dispatch(&mut core, AdminRequest::post("save", &[], post_form("Gone", "gone")))
            .await
            .unwrap();
        let out = BlogAdmin
            .dispatch(&mut core, AdminRequest::get("manage", &[]))
            .await
            .unwrap();
        assert!(matches!(out, Output::Html(ref html) if html.contains("Gone")));

        let id = BlogRepository::new(core.db().clone())
            .find_by_slug("gone")
            .await
            .unwrap()
            .unwrap()
            .id
            .unwrap();
        BlogAdmin
            .dispatch(&mut core, AdminRequest::get("delete", &[&id.to_string()]))
            .await
            .unwrap();
        assert_eq!(BlogRepository::new(core.db().clone()).count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_settings_fall_back_to_defaults() {
        let (mut core, _dirs) = admin_core().await;
        let form = FormData::from_pairs([
            ("title", "News"),
            ("desc", ""),
            ("dateformat", ""),
            ("perpage", "0"),
            ("latestPostsCount", "3"),
            ("slug", "My News"),
        ]);
        BlogAdmin
            .dispatch(&mut core, AdminRequest::post("settings", &[], form))
            .await
            .unwrap();
        assert_eq!(core.setting(MODULE, "slug"), "my-news");
        assert_eq!(core.setting(MODULE, "perpage"), "5");
        assert_eq!(core.setting(MODULE, "dateformat"), "%b %d, %Y");
        assert_eq!(core.setting(MODULE, "latestPostsCount"), "3");
    }
}
