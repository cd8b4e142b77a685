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
use roost_core::models::event::{parse_horaro_url, Event, EventGroup};
use roost_core::Pagination;
use roost_db::repositories::EventRepository;
use serde::Serialize;
use tera::Context;

use super::{event_url, picture_url, MODULE};
use crate::core::Core;
use crate::form::FormData;
use crate::modules::helpers::{self, input_datetime, parse_datetime};
use crate::modules::{AdminModule, AdminRequest, NavItem, Output};
use crate::uploads;

const PER_PAGE: i64 = 10;
const LIST_DATE_FORMAT: &str = "%d-%m-%Y %H:%M";

#[derive(Debug, Serialize)]
struct EventRow {
    id: i64,
    name: String,
    lang: String,
    start_at: String,
    end_at: String,
    published_at: String,
    edit_url: String,
    view_url: String,
}

#[derive(Debug, Serialize)]
struct GroupRow {
    #[serde(flatten)]
    group: EventGroup,
    edit_url: String,
}

pub struct EventsAdmin;

impl EventsAdmin {
    fn repo(core: &Core) -> EventRepository {
        EventRepository::new(core.db().clone())
    }

    async fn manage(&self, core: &mut Core, request: &AdminRequest) -> Result<Output> {
        let repo = Self::repo(core);
        if request.is_post() && request.form.has("delete") {
            let ids = request.form.ids("event-list");
            if !ids.is_empty() {
                let pictures = repo.delete_many(&ids).await?;
                let dir = core.uploads_dir(MODULE);
                for picture in &pictures {
                    uploads::remove_file(&dir, picture)?;
                }
                tracing::info!("Deleted {} events", ids.len());
                let text = core.lang_text(MODULE, "delete_success");
                return Ok(helpers::success(core, text, "events/manage"));
            }
        }

        let total = repo.count().await?;
        let pagination = Pagination::new(request.page(0), total, PER_PAGE, core.admin_url("events/manage/%d"));
        let rows: Vec<EventRow> = repo
            .list_all(PER_PAGE, pagination.offset())
            .await?
            .into_iter()
            .map(|event| {
                let id = event.id.unwrap_or_default();
                EventRow {
                    id,
                    start_at: core.format_date(event.start_at, LIST_DATE_FORMAT),
                    end_at: core.format_date(event.end_at, LIST_DATE_FORMAT),
                    published_at: core.format_date(event.published_at, LIST_DATE_FORMAT),
                    edit_url: core.admin_url(&format!("events/edit/{}", id)),
                    view_url: event_url(core, id),
                    name: event.name,
                    lang: event.lang,
                }
            })
            .collect();

        let mut ctx = Context::new();
        ctx.insert("events", &rows);
        ctx.insert("event_count", &total);
        ctx.insert("pagination", &pagination.nav());
        ctx.insert("add_url", &core.admin_url("events/add"));
        ctx.insert("delete_url", &core.admin_url("events/manage"));
        helpers::view(core, "modules/events/admin/manage.html", ctx)
    }

    async fn form(&self, core: &mut Core, id: Option<i64>) -> Result<Output> {
        let repo = Self::repo(core);
        let event = match id {
            Some(id) => match repo.find_by_id(id).await? {
                Some(event) => Some(event),
                None => return Ok(Output::NotFound),
            },
            None => None,
        };
        let now = core.now();
        let mut ctx = Context::new();
        ctx.insert("form", &core.take_form());
        let (start_at, end_at, published_at) = match &event {
            Some(e) => (
                input_datetime(core, e.start_at),
                input_datetime(core, e.end_at),
                input_datetime(core, e.published_at),
            ),
            None => (String::new(), String::new(), input_datetime(core, now)),
        };
        ctx.insert("start_at", &start_at);
        ctx.insert("end_at", &end_at);
        ctx.insert("published_at", &published_at);
        ctx.insert("horaro_url", &event.as_ref().and_then(Event::horaro_url));
        ctx.insert("picture_url", &event.as_ref().and_then(picture_url));
        ctx.insert("groups", &repo.list_groups(None).await?);
        ctx.insert("languages", &helpers::languages(core));
        ctx.insert("site_lang", &core.setting("settings", "lang_site"));
        ctx.insert("editor", &core.setting("settings", "editor"));
        let save_path = match id {
            Some(id) => {
                ctx.insert("delete_picture_url", &core.admin_url(&format!("events/delete_picture/{}", id)));
                ctx.insert("view_url", &event_url(core, id));
                format!("events/save/{}", id)
            }
            None => "events/save".to_string(),
        };
        ctx.insert("save_url", &core.admin_url(&save_path));
        ctx.insert("upload_url", &core.admin_url("events/editor_upload"));
        ctx.insert("event", &event);
        helpers::view(core, "modules/events/admin/form.html", ctx)
    }

    async fn save(&self, core: &mut Core, id: Option<i64>, form: &FormData) -> Result<Output> {
        let repo = Self::repo(core);
        let back = match id {
            Some(id) => format!("events/edit/{}", id),
            None => "events/add".to_string(),
        };

        let name = form.text("name");
        let description = form.text("description");
        let start = parse_datetime(core, &form.text("start_at"));
        let end = parse_datetime(core, &form.text("end_at"));
        let (Some(start), Some(end)) = (start, end) else {
            let text = core.lang_text("general", "fill_inputs");
            return Ok(helpers::reject(core, form, text, &back));
        };
        if name.is_empty() || description.is_empty() {
            let text = core.lang_text("general", "fill_inputs");
            return Ok(helpers::reject(core, form, text, &back));
        }
        if end < start {
            let text = core.lang_text(MODULE, "end_before_start");
            return Ok(helpers::reject(core, form, text, &back));
        }

        let mut event = match id {
            Some(id) => match repo.find_by_id(id).await? {
                Some(event) => event,
                None => return Ok(Output::NotFound),
            },
            None => Event::new(String::new(), start, end, String::new()),
        };
        let lang = form.text("lang");
        event.name = name;
        event.description = Some(description);
        event.start_at = start;
        event.end_at = end;
        event.published_at = parse_datetime(core, &form.text("published_at")).unwrap_or_else(|| core.now());
        event.building_name = form.optional("building_name");
        event.building_address = form.optional("building_address");
        event.latitude = form.float("latitude");
        event.longitude = form.float("longitude");
        event.channel_name = form.optional("channel_name");
        event.group_id = form.int("group_id").filter(|g| *g > 0);
        event.markdown = form.checked("markdown");
        event.registration = form.checked("registration");
        event.lang = if core.state.lang.is_active(&lang) {
            lang
        } else {
            core.setting("settings", "lang_site")
        };
        match form.optional("horaro_url") {
            Some(url) => match parse_horaro_url(&url) {
                Some((event_id, schedule_id)) => {
                    event.horaro_event_id = Some(event_id);
                    event.horaro_schedule_id = Some(schedule_id);
                }
                None => {
                    let text = core.lang_text(MODULE, "horaro_url_invalid");
                    return Ok(helpers::reject(core, form, text, &back));
                }
            },
            None => {
                event.horaro_event_id = None;
                event.horaro_schedule_id = None;
            }
        }
        event.updated_at = core.now();

        let id = match event.id {
            Some(id) => {
                repo.update(&event).await?;
                id
            }
            None => repo.create(&event).await?,
        };

        if let Some(file) = form.file("picture") {
            let dir = uploads::module_dir(&core.config().uploads_path(), MODULE)?;
            match uploads::save_picture(&dir, &file.filename, Some(&event.name), &file.bytes) {
                Ok(picture) => {
                    if let Some(old) = event.picture.as_deref() {
                        uploads::remove_file(&dir, old)?;
                    }
                    repo.set_picture(id, Some(&picture)).await?;
                }
                Err(e) => {
                    tracing::warn!("Event picture refused: {:#}", e);
                    let text = core.lang_text(MODULE, "picture_error");
                    return Ok(helpers::failure(core, text, &format!("events/edit/{}", id)));
                }
            }
        }

        tracing::info!("Saved event {} ({})", id, event.name);
        let text = core.lang_text(MODULE, "save_success");
        Ok(helpers::success(core, text, &format!("events/edit/{}", id)))
    }

    async fn delete_picture(&self, core: &mut Core, id: i64) -> Result<Output> {
        let repo = Self::repo(core);
        let Some(event) = repo.find_by_id(id).await? else {
            return Ok(Output::NotFound);
        };
        if let Some(picture) = event.picture.as_deref() {
            uploads::remove_file(&core.uploads_dir(MODULE), picture)?;
            repo.set_picture(id, None).await?;
        }
        let text = core.lang_text(MODULE, "picture_deleted");
        Ok(helpers::success(core, text, &format!("events/edit/{}", id)))
    }

    async fn manage_groups(&self, core: &mut Core, request: &AdminRequest) -> Result<Output> {
        let repo = Self::repo(core);
        if request.is_post() && request.form.has("delete") {
            let ids = request.form.ids("group-list");
            for id in &ids {
                repo.delete_group(*id).await?;
            }
            if !ids.is_empty() {
                let text = core.lang_text(MODULE, "delete_group_success");
                return Ok(helpers::success(core, text, "events/manage_groups"));
            }
        }

        let lang = helpers::content_lang(core, MODULE, request);
        let groups: Vec<GroupRow> = repo
            .list_groups(Some(&lang))
            .await?
            .into_iter()
            .map(|group| GroupRow {
                edit_url: core.admin_url(&format!("events/edit_group/{}", group.id.unwrap_or_default())),
                group,
            })
            .collect();

        let mut ctx = Context::new();
        ctx.insert("groups", &groups);
        ctx.insert("lang_filter", &lang);
        ctx.insert("languages", &helpers::languages(core));
        ctx.insert("add_url", &core.admin_url("events/add_group"));
        ctx.insert("delete_url", &core.admin_url("events/manage_groups"));
        helpers::view(core, "modules/events/admin/groups.html", ctx)
    }

    async fn group_form(&self, core: &mut Core, id: Option<i64>) -> Result<Output> {
        let group = match id {
            Some(id) => match Self::repo(core).find_group(id).await? {
                Some(group) => Some(group),
                None => return Ok(Output::NotFound),
            },
            None => None,
        };
        let save_path = match id {
            Some(id) => format!("events/save_group/{}", id),
            None => "events/save_group".to_string(),
        };
        let mut ctx = Context::new();
        ctx.insert("form", &core.take_form());
        ctx.insert("group", &group);
        ctx.insert("languages", &helpers::languages(core));
        ctx.insert("site_lang", &core.setting("settings", "lang_site"));
        ctx.insert("save_url", &core.admin_url(&save_path));
        helpers::view(core, "modules/events/admin/group_form.html", ctx)
    }

    async fn save_group(&self, core: &mut Core, id: Option<i64>, form: &FormData) -> Result<Output> {
        let back = match id {
            Some(id) => format!("events/edit_group/{}", id),
            None => "events/add_group".to_string(),
        };
        let name = form.text("name");
        let color = form.text("color");
        if name.is_empty() || color.is_empty() {
            let text = core.lang_text("general", "fill_inputs");
            return Ok(helpers::reject(core, form, text, &back));
        }
        let lang = form.text("lang");
        let group = EventGroup {
            id,
            lang: if core.state.lang.is_active(&lang) {
                lang
            } else {
                core.setting("settings", "lang_site")
            },
            name,
            color: Some(color),
            text_color: form.optional("textColor"),
        };
        let id = Self::repo(core).save_group(&group).await?;
        let text = core.lang_text(MODULE, "save_success");
        Ok(helpers::success(core, text, &format!("events/edit_group/{}", id)))
    }

    async fn settings(&self, core: &mut Core, request: &AdminRequest) -> Result<Output> {
        if !request.is_post() {
            let mut ctx = Context::new();
            ctx.insert("events", &core.settings.module(MODULE).cloned().unwrap_or_default());
            ctx.insert("save_url", &core.admin_url("events/settings"));
            return helpers::view(core, "modules/events/admin/settings.html", ctx);
        }
        let clean = |field: &str, default: &str| {
            let value = request.form.text(field);
            let value = value.trim_matches('/');
            if value.is_empty() {
                default.to_string()
            } else {
                value.to_string()
            }
        };
        let values = [
            ("slug", clean("slug", "planning")),
            ("event_slug", clean("event_slug", "event")),
        ];
        core.settings.update_many(MODULE, &values).await?;
        let text = core.lang_text("general", "settings_saved");
        Ok(helpers::success(core, text, "events/settings"))
    }
}

#[async_trait]
impl AdminModule for EventsAdmin {
    fn name(&self) -> &'static str {
        MODULE
    }

    fn navigation(&self, core: &Core) -> Vec<NavItem> {
        vec![
            NavItem::new(core.lang_text("general", "manage"), "manage"),
            NavItem::new(core.lang_text(MODULE, "add_new"), "add"),
            NavItem::new(core.lang_text(MODULE, "manage_groups"), "manage_groups"),
            NavItem::new(core.lang_text(MODULE, "add_group"), "add_group"),
            NavItem::new(core.lang_text("general", "settings"), "settings"),
        ]
    }

    async fn dispatch(&self, core: &mut Core, request: AdminRequest) -> Result<Output> {
        match request.action.as_str() {
            "manage" => self.manage(core, &request).await,
            "add" => self.form(core, None).await,
            "edit" => match request.id(0) {
                Some(id) => self.form(core, Some(id)).await,
                None => Ok(Output::NotFound),
            },
            "save" if request.is_post() => self.save(core, request.id(0), &request.form).await,
            "delete_picture" => match request.id(0) {
                Some(id) => self.delete_picture(core, id).await,
                None => Ok(Output::NotFound),
            },
            "manage_groups" => self.manage_groups(core, &request).await,
            "add_group" => self.group_form(core, None).await,
            "edit_group" => match request.id(0) {
                Some(id) => self.group_form(core, Some(id)).await,
                None => Ok(Output::NotFound),
            },
            "save_group" if request.is_post() => self.save_group(core, request.id(0), &request.form).await,
            "editor_upload" if request.is_post() => helpers::editor_upload(core, MODULE, &request.form),
            "settings" => self.settings(core, &request).await,
            _ => Ok(Output::NotFound),
        }
    }
}
