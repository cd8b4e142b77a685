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
use roost_core::models::member::{Member, PORTRAIT_SIZE};
use roost_core::utils::text::strip_tags;
use roost_core::Pagination;
use roost_db::repositories::MemberRepository;
use serde::Serialize;
use tera::Context;

use super::{picture_url, MODULE};
use crate::core::Core;
use crate::form::FormData;
use crate::modules::helpers;
use crate::modules::{AdminModule, AdminRequest, NavItem, Output};
use crate::uploads;

const PER_PAGE: i64 = 10;
const EXCERPT_CHARS: usize = 30;

#[derive(Debug, Serialize)]
struct MemberRow {
    id: i64,
    name: String,
    role: String,
    excerpt: String,
    active: bool,
    picture: String,
    edit_url: String,
    delete_url: String,
}

fn excerpt(description: &str) -> String {
    let text = strip_tags(description);
    if text.chars().count() > EXCERPT_CHARS {
        format!("{} ...", text.chars().take(EXCERPT_CHARS).collect::<String>())
    } else {
        text
    }
}

pub struct MembersAdmin;

impl MembersAdmin {
    fn repo(core: &Core) -> MemberRepository {
        MemberRepository::new(core.db().clone())
    }

    async fn manage(&self, core: &mut Core, request: &AdminRequest) -> Result<Output> {
        let lang = helpers::content_lang(core, MODULE, request);
        let members = Self::repo(core).list(&lang).await?;
        let pagination = Pagination::new(
            request.page(0),
            members.len() as i64,
            PER_PAGE,
            core.admin_url("members/manage/%d"),
        );
        let rows: Vec<MemberRow> = members
            .iter()
            .skip(pagination.offset() as usize)
            .take(PER_PAGE as usize)
            .map(|member| {
                let id = member.id.unwrap_or_default();
                MemberRow {
                    id,
                    name: member.name.clone(),
                    role: member.role.clone().unwrap_or_default(),
                    excerpt: excerpt(member.description.as_deref().unwrap_or_default()),
                    active: member.active,
                    picture: picture_url(member),
                    edit_url: core.admin_url(&format!("members/edit/{}", id)),
                    delete_url: core.admin_url(&format!("members/delete/{}", id)),
                }
            })
            .collect();

        let mut ctx = Context::new();
        ctx.insert("members", &rows);
        ctx.insert("pagination", &pagination.nav());
        ctx.insert("lang_filter", &lang);
        ctx.insert("languages", &helpers::languages(core));
        ctx.insert("add_url", &core.admin_url("members/add"));
        helpers::view(core, "modules/members/admin/manage.html", ctx)
    }

    async fn form(&self, core: &mut Core, id: Option<i64>) -> Result<Output> {
        let member = match id {
            Some(id) => match Self::repo(core).find_by_id(id).await? {
                Some(member) => Some(member),
                None => return Ok(helpers::redirect(core, "members/manage")),
            },
            None => None,
        };
        let mut ctx = Context::new();
        ctx.insert("form", &core.take_form());
        ctx.insert(
            "picture_url",
            &member.as_ref().map(picture_url).unwrap_or_else(|| super::DEFAULT_PICTURE.to_string()),
        );
        ctx.insert("has_picture", &member.as_ref().is_some_and(|m| m.picture.is_some()));
        ctx.insert("languages", &helpers::languages(core));
        ctx.insert("site_lang", &core.setting("settings", "lang_site"));
        ctx.insert("editor", &core.setting("settings", "editor"));
        ctx.insert("upload_url", &core.admin_url("members/editor_upload"));
        ctx.insert("manage_url", &core.admin_url("members/manage"));
        let save_path = match id {
            Some(id) => {
                ctx.insert("delete_picture_url", &core.admin_url(&format!("members/delete_picture/{}", id)));
                format!("members/save/{}", id)
            }
            None => "members/save".to_string(),
        };
        ctx.insert("save_url", &core.admin_url(&save_path));
        ctx.insert("member", &member);
        helpers::view(core, "modules/members/admin/form.html", ctx)
    }

    async fn save(&self, core: &mut Core, id: Option<i64>, form: &FormData) -> Result<Output> {
        let repo = Self::repo(core);
        let back = match id {
            Some(id) => format!("members/edit/{}", id),
            None => "members/add".to_string(),
        };
        let name = form.text("name");
        let lang = form.text("lang");
        let description = form.text("description");
        if name.is_empty() || description.is_empty() || !core.state.lang.is_active(&lang) {
            let text = core.lang_text("general", "fill_inputs");
            return Ok(helpers::reject(core, form, text, &back));
        }
        let twitch_handle = form.optional("twitch_handle");

        let mut member = match id {
            Some(id) => match repo.find_by_id(id).await? {
                Some(member) => member,
                None => return Ok(Output::NotFound),
            },
            None => {
                if repo.duplicate_exists(&lang, &name, None).await? {
                    let text = core.lang_text(MODULE, "member_exists_name");
                    return Ok(helpers::reject(core, form, text, &back));
                }
                if twitch_handle.is_some() && repo.duplicate_exists(&lang, "", twitch_handle.as_deref()).await? {
                    let text = core.lang_text(MODULE, "member_exists_twitch");
                    return Ok(helpers::reject(core, form, text, &back));
                }
                Member {
                    id: None,
                    name: String::new(),
                    role: None,
                    description: None,
                    picture: None,
                    twitch_handle: None,
                    active: false,
                    lang: String::new(),
                    markdown: false,
                }
            }
        };
        member.name = name;
        member.role = form.optional("role");
        member.description = Some(description);
        member.twitch_handle = twitch_handle;
        member.active = form.checked("status");
        member.lang = lang;
        member.markdown = form.checked("markdown");

        let id = match member.id {
            Some(id) => {
                repo.update(&member).await?;
                id
            }
            None => repo.create(&member).await?,
        };

        if let Some(file) = form.file("picture") {
            let dir = uploads::module_dir(&core.config().uploads_path(), MODULE)?;
            let stored = uploads::save_picture(&dir, &file.filename, Some(&member.name), &file.bytes)
                .and_then(|name| uploads::crop_square(&dir.join(&name), PORTRAIT_SIZE).map(|_| name));
            match stored {
                Ok(picture) => {
                    if let Some(old) = member.picture.as_deref() {
                        uploads::remove_file(&dir, old)?;
                    }
                    repo.set_picture(id, Some(&picture)).await?;
                }
                Err(e) => {
                    tracing::warn!("Member picture refused: {:#}", e);
                    let text = core.lang_text(MODULE, "picture_error");
                    return Ok(helpers::failure(core, text, &format!("members/edit/{}", id)));
                }
            }
        }

        tracing::info!("Saved member {} ({})", id, member.name);
        let text = core.lang_text(MODULE, "save_success");
        Ok(helpers::success(core, text, &format!("members/edit/{}", id)))
    }

    async fn delete(&self, core: &mut Core, id: i64) -> Result<Output> {
        match Self::repo(core).delete(id).await? {
            Some(member) => {
                if let Some(picture) = member.picture.as_deref() {
                    uploads::remove_file(&core.uploads_dir(MODULE), picture)?;
                }
                let text = core.lang_text(MODULE, "delete_success");
                Ok(helpers::success(core, text, "members/manage"))
            }
            None => {
                let text = core.lang_text(MODULE, "delete_failure");
                Ok(helpers::failure(core, text, "members/manage"))
            }
        }
    }

    async fn delete_picture(&self, core: &mut Core, id: i64) -> Result<Output> {
        let repo = Self::repo(core);
        let Some(member) = repo.find_by_id(id).await? else {
            return Ok(Output::NotFound);
        };
        if let Some(picture) = member.picture.as_deref() {
            uploads::remove_file(&core.uploads_dir(MODULE), picture)?;
            repo.set_picture(id, None).await?;
        }
        let text = core.lang_text(MODULE, "picture_deleted");
        Ok(helpers::success(core, text, &format!("members/edit/{}", id)))
    }

    async fn settings(&self, core: &mut Core, request: &AdminRequest) -> Result<Output> {
        if request.is_post() {
            let slug = request.form.text("slug");
            let slug = slug.trim_start_matches('/');
            let slug = if slug.is_empty() { "members" } else { slug };
            core.settings.update_many(MODULE, &[("slug", slug.to_string())]).await?;
            let text = core.lang_text("general", "settings_saved");
            return Ok(helpers::success(core, text, "members/settings"));
        }
        let mut ctx = Context::new();
        ctx.insert("members", &core.settings.module(MODULE).cloned().unwrap_or_default());
        ctx.insert("save_url", &core.admin_url("members/settings"));
        helpers::view(core, "modules/members/admin/settings.html", ctx)
    }
}

#[async_trait]
impl AdminModule for MembersAdmin {
    fn name(&self) -> &'static str {
        MODULE
    }

    fn navigation(&self, core: &Core) -> Vec<NavItem> {
        vec![
            NavItem::new(core.lang_text("general", "manage"), "manage"),
            NavItem::new(core.lang_text(MODULE, "add_new"), "add"),
            NavItem::new(core.lang_text("general", "settings"), "settings"),
        ]
    }

    async fn dispatch(&self, core: &mut Core, request: AdminRequest) -> Result<Output> {
        match (request.action.as_str(), request.id(0)) {
            ("manage", _) => self.manage(core, &request).await,
            ("add", _) => self.form(core, None).await,
            ("edit", Some(id)) => self.form(core, Some(id)).await,
            ("save", id) if request.is_post() => self.save(core, id, &request.form).await,
            ("delete", Some(id)) => self.delete(core, id).await,
            ("delete_picture", Some(id)) => self.delete_picture(core, id).await,
            ("editor_upload", _) if request.is_post() => helpers::editor_upload(core, MODULE, &request.form),
            ("settings", _) => self.settings(core, &request).await,
            _ => Ok(Output::NotFound),
        }
    }
}
