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

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use roost_core::models::gallery::{format_byte_size, SortOrder, GALLERY_ITEMS_PER_PAGE};
use roost_core::utils::slug::create_slug;
use roost_core::Pagination;
use roost_db::repositories::GalleryRepository;
use serde::Serialize;
use std::fs;
use tera::Context;

use super::{gallery_dir, ItemView, MODULE, TAG};
use crate::core::{no_parse, Core};
use crate::form::FormData;
use crate::modules::helpers;
use crate::modules::{AdminModule, AdminRequest, NavItem, Output};
use crate::uploads;

#[derive(Debug, Serialize)]
struct GalleryRow {
    id: i64,
    name: String,
    slug: String,
    tag: String,
    items: i64,
    edit_url: String,
    delete_url: String,
}

#[derive(Debug, Serialize)]
struct ImageRow {
    #[serde(flatten)]
    item: ItemView,
    delete_url: String,
}

pub struct GalleriesAdmin;

impl GalleriesAdmin {
    fn repo(core: &Core) -> GalleryRepository {
        GalleryRepository::new(core.db().clone())
    }

    async fn manage(&self, core: &mut Core) -> Result<Output> {
        let repo = Self::repo(core);
        let mut rows = Vec::new();
        for gallery in repo.list().await? {
            let id = gallery.id.unwrap_or_default();
            rows.push(GalleryRow {
                id,
                tag: no_parse(&format!("{{${}.{}}}", TAG, gallery.slug)),
                items: repo.count_items(id).await?,
                edit_url: core.admin_url(&format!("galleries/edit/{}", id)),
                delete_url: core.admin_url(&format!("galleries/delete/{}", id)),
                name: gallery.name,
                slug: gallery.slug,
            });
        }
        let mut ctx = Context::new();
        ctx.insert("galleries", &rows);
        ctx.insert("add_url", &core.admin_url("galleries/add"));
        helpers::view(core, "modules/galleries/admin/manage.html", ctx)
    }

    async fn add(&self, core: &mut Core, form: &FormData) -> Result<Output> {
        let name = form.text("name");
        if name.is_empty() {
            let text = core.lang_text("general", "fill_inputs");
            return Ok(helpers::failure(core, text, "galleries/manage"));
        }
        let slug = create_slug(&name);
        let repo = Self::repo(core);
        if slug.is_empty() || repo.slug_taken(&slug).await? {
            let text = core.lang_text(MODULE, "gallery_already_exists");
            return Ok(helpers::failure(core, text, "galleries/manage"));
        }
        let id = repo.create(&name, &slug).await?;
        let dir = gallery_dir(core, id);
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {:?}", dir))?;
        tracing::info!("Created gallery {} ({})", id, slug);
        let text = core.lang_text(MODULE, "add_gallery_success");
        Ok(helpers::success(core, text, &format!("galleries/edit/{}", id)))
    }

    async fn delete(&self, core: &mut Core, id: i64) -> Result<Output> {
        if Self::repo(core).find_by_id(id).await?.is_none() {
            return Ok(Output::NotFound);
        }
        Self::repo(core).delete(id).await?;
        let dir = gallery_dir(core, id);
        if dir.exists() {
            fs::remove_dir_all(&dir).with_context(|| format!("Failed to remove {:?}", dir))?;
        }
        let text = core.lang_text(MODULE, "delete_gallery_success");
        Ok(helpers::success(core, text, "galleries/manage"))
    }

    async fn edit(&self, core: &mut Core, id: i64, page: i64) -> Result<Output> {
        let repo = Self::repo(core);
        let Some(gallery) = repo.find_by_id(id).await? else {
            return Ok(Output::NotFound);
        };
        let total = repo.count_items(id).await?;
        let pagination = Pagination::new(
            page,
            total,
            GALLERY_ITEMS_PER_PAGE,
            core.admin_url(&format!("galleries/edit/{}/%d", id)),
        );
        let items: Vec<ImageRow> = repo
            .items(&gallery, Some(GALLERY_ITEMS_PER_PAGE), pagination.offset())
            .await?
            .iter()
            .map(|item| ImageRow {
                item: ItemView::new(item),
                delete_url: core.admin_url(&format!("galleries/delete_image/{}", item.id.unwrap_or_default())),
            })
            .collect();

        let upload_limit = format_byte_size(core.config().max_upload_size as u64);
        let mut ctx = Context::new();
        ctx.insert("gallery", &gallery);
        ctx.insert("images", &items);
        ctx.insert("pagination", &pagination.nav());
        ctx.insert("page", &pagination.current());
        ctx.insert("upload_limit", &upload_limit);
        ctx.insert("settings_url", &core.admin_url(&format!("galleries/save_settings/{}", id)));
        ctx.insert("upload_url", &core.admin_url(&format!("galleries/upload/{}", id)));
        ctx.insert(
            "images_url",
            &core.admin_url(&format!("galleries/save_images/{}/{}", id, pagination.current())),
        );
        helpers::view(core, "modules/galleries/admin/edit.html", ctx)
    }

    async fn save_settings(&self, core: &mut Core, id: i64, form: &FormData) -> Result<Output> {
        let repo = Self::repo(core);
        let Some(mut gallery) = repo.find_by_id(id).await? else {
            return Ok(Output::NotFound);
        };
        let back = format!("galleries/edit/{}", id);
        let name = form.text("name");
        let slug = create_slug(&name);
        if name.is_empty() || slug.is_empty() || form.text("sort").is_empty() {
            let text = core.lang_text("general", "fill_inputs");
            return Ok(helpers::failure(core, text, &back));
        }
        if slug != gallery.slug && repo.slug_taken(&slug).await? {
            let text = core.lang_text(MODULE, "gallery_already_exists");
            return Ok(helpers::failure(core, text, &back));
        }
        gallery.name = name;
        gallery.slug = slug;
        gallery.sort = SortOrder::parse(&form.text("sort"));
        gallery.img_per_page = form.int("img_per_page").unwrap_or_default().max(0);
        repo.update(&gallery).await?;
        let text = core.lang_text("general", "settings_saved");
        Ok(helpers::success(core, text, &back))
    }

    async fn save_images(&self, core: &mut Core, id: i64, page: i64, form: &FormData) -> Result<Output> {
        let repo = Self::repo(core);
        let mut saved = false;
        for item_id in form.ids("img") {
            let title = form.optional(&format!("title_{}", item_id));
            let desc = form.optional(&format!("desc_{}", item_id));
            saved |= repo.update_item(item_id, title.as_deref(), desc.as_deref()).await?;
        }
        let back = format!("galleries/edit/{}/{}", id, page);
        if saved {
            let text = core.lang_text("general", "settings_saved");
            return Ok(helpers::success(core, text, &back));
        }
        Ok(helpers::redirect(core, &back))
    }

    async fn upload(&self, core: &mut Core, id: i64, form: &FormData) -> Result<Output> {
        let repo = Self::repo(core);
        if repo.find_by_id(id).await?.is_none() {
            return Ok(Output::NotFound);
        }
        let back = format!("galleries/edit/{}", id);
        let files = form.files("files");
        if files.is_empty() {
            let text = core.lang_text(MODULE, "no_files");
            return Ok(helpers::failure(core, text, &back));
        }

        let dir = gallery_dir(core, id);
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {:?}", dir))?;
        let mut added = 0;
        let mut refused = 0;
        for file in files {
            match uploads::save_gallery_image(&dir, &file.filename, &file.bytes) {
                Ok(src) => {
                    repo.add_item(id, &src, None).await?;
                    added += 1;
                }
                Err(e) => {
                    tracing::warn!("Gallery upload {} refused: {:#}", file.filename, e);
                    refused += 1;
                }
            }
        }
        tracing::info!("Added {} images to gallery {}", added, id);

        if refused > 0 {
            let text = format!("{} (jpg, png, gif, webp)", core.lang_text(MODULE, "wrong_extension"));
            return Ok(helpers::failure(core, text, &back));
        }
        let text = core.lang_text(MODULE, "add_images_success");
        Ok(helpers::success(core, text, &back))
    }

    async fn delete_image(&self, core: &mut Core, id: i64) -> Result<Output> {
        let repo = Self::repo(core);
        let Some(item) = repo.find_item(id).await? else {
            let text = core.lang_text(MODULE, "image_doesnt_exists");
            return Ok(helpers::failure(core, text, "galleries/manage"));
        };
        repo.delete_item(id).await?;
        let dir = gallery_dir(core, item.gallery);
        for file in item.src.paths() {
            uploads::remove_file(&dir, file)?;
        }
        let text = core.lang_text(MODULE, "delete_image_success");
        Ok(helpers::success(core, text, &format!("galleries/edit/{}", item.gallery)))
    }
}

#[async_trait]
impl AdminModule for GalleriesAdmin {
    fn name(&self) -> &'static str {
        MODULE
    }

    fn navigation(&self, core: &Core) -> Vec<NavItem> {
        vec![NavItem::new(core.lang_text("general", "manage"), "manage")]
    }

    async fn dispatch(&self, core: &mut Core, request: AdminRequest) -> Result<Output> {
        let id = request.id(0);
        match (request.action.as_str(), id) {
            ("manage", _) => self.manage(core).await,
            ("add", _) if request.is_post() => self.add(core, &request.form).await,
            ("delete", Some(id)) => self.delete(core, id).await,
            ("edit", Some(id)) => self.edit(core, id, request.page(1)).await,
            ("save_settings", Some(id)) if request.is_post() => self.save_settings(core, id, &request.form).await,
            ("save_images", Some(id)) if request.is_post() => {
                self.save_images(core, id, request.page(1), &request.form).await
            }
            ("upload", Some(id)) if request.is_post() => self.upload(core, id, &request.form).await,
            ("delete_image", Some(id)) => self.delete_image(core, id).await,
            _ => Ok(Output::NotFound),
        }
    }
}
