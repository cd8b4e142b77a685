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
use roost_core::models::registration::{duration_from_parts, estimated_time_text, parse_event_choice, RegistrationStatus};
use roost_core::Pagination;
use roost_db::repositories::{EventFilter, EventRepository, RegistrationListing, RegistrationRepository};
use serde::Serialize;
use tera::Context;

use super::{EventChoice, MODULE};
use crate::core::Core;
use crate::form::FormData;
use crate::modules::helpers;
use crate::modules::{AdminModule, AdminRequest, NavItem, Output};

const PER_PAGE: i64 = 10;
const CSV_HEADER: [&str; 8] = [
    "runner_name",
    "event_name",
    "game_name",
    "game_category",
    "estimated_time",
    "race",
    "race_opponents",
    "comment",
];

#[derive(Debug, Serialize)]
struct RegistrationRow {
    id: i64,
    runner_name: String,
    game_name: String,
    game_category: String,
    estimated_time: String,
    race: String,
    race_opponents: String,
    status: i64,
    event: String,
    created_at: String,
    edit_url: String,
}

pub struct RegistrationAdmin;

/// Event column text: name and start date, a placeholder for a deleted
/// event, `-` when none was chosen.
fn event_label(core: &Core, listing: &RegistrationListing) -> String {
    match (listing.registration.event_id, &listing.event_name, listing.event_start) {
        (None, _, _) => "-".to_string(),
        (Some(_), Some(name), Some(start)) => format!("{} ({})", name, core.format_date(start, "%d-%m-%Y")),
        (Some(_), _, _) => core.lang_text(MODULE, "deleted_event"),
    }
}

fn yes_no(core: &Core, value: bool) -> String {
    core.lang_text("general", if value { "say_yes" } else { "say_no" })
}

/// CSV document of the given registrations.
fn csv_export(core: &Core, listings: &[RegistrationListing]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for listing in listings {
        let registration = &listing.registration;
        let estimated_time = estimated_time_text(registration.estimated_time);
        let race = yes_no(core, registration.race);
        writer.write_record([
            registration.runner_name.as_str(),
            listing.event_name.as_deref().unwrap_or_default(),
            registration.game_name.as_str(),
            registration.game_category.as_str(),
            estimated_time.as_str(),
            race.as_str(),
            registration.race_opponents.as_deref().unwrap_or_default(),
            registration.comment.as_deref().unwrap_or_default(),
        ])?;
    }
    writer.into_inner().context("Failed to finish CSV export")
}

fn csv_output(body: Vec<u8>) -> Output {
    Output::Raw {
        content_type: "text/csv; charset=utf-8",
        body,
        filename: Some("export.csv".to_string()),
    }
}

impl RegistrationAdmin {
    fn repo(core: &Core) -> RegistrationRepository {
        RegistrationRepository::new(core.db().clone())
    }

    /// Events of `lang` taking registrations, plus `keep` if given so an
    /// edited registration still shows its event.
    async fn event_choices(core: &Core, lang: &str, keep: Option<i64>) -> Result<Vec<EventChoice>> {
        let events = EventRepository::new(core.db().clone()).all().await?;
        Ok(events
            .iter()
            .filter(|e| (e.lang == lang && e.registration) || (keep.is_some() && e.id == keep))
            .map(|e| EventChoice::new(core, e))
            .collect())
    }

    async fn manage(&self, core: &mut Core, request: &AdminRequest) -> Result<Output> {
        let repo = Self::repo(core);
        if request.is_post() {
            let ids = request.form.ids("registration-list");
            if request.form.has("delete") && !ids.is_empty() {
                let deleted = repo.delete_many(&ids).await?;
                tracing::info!("Deleted {} registrations", deleted);
                let key = if deleted as usize == ids.len() {
                    "delete_success"
                } else {
                    "delete_failure"
                };
                let text = core.lang_text(MODULE, key);
                return Ok(if deleted as usize == ids.len() {
                    helpers::success(core, text, "events_registration/manage")
                } else {
                    helpers::failure(core, text, "events_registration/manage")
                });
            }
            if request.form.has("export") && !ids.is_empty() {
                let listings = repo.export(EventFilter::All, Some(&ids)).await?;
                return Ok(csv_output(csv_export(core, &listings)?));
            }
        }

        let filter = EventFilter::parse(request.query("event").unwrap_or_default());
        let total = repo.count(filter).await?;
        let pattern = match request.query("event") {
            Some(event) => format!("{}&event={}", core.admin_url("events_registration/manage/%d"), event),
            None => core.admin_url("events_registration/manage/%d"),
        };
        let pagination = Pagination::new(request.page(0), total, PER_PAGE, pattern);
        let rows: Vec<RegistrationRow> = repo
            .list(filter, PER_PAGE, pagination.offset())
            .await?
            .iter()
            .map(|listing| {
                let registration = &listing.registration;
                let id = registration.id.unwrap_or_default();
                RegistrationRow {
                    id,
                    runner_name: registration.runner_name.clone(),
                    game_name: registration.game_name.clone(),
                    game_category: registration.game_category.clone(),
                    estimated_time: estimated_time_text(registration.estimated_time),
                    race: yes_no(core, registration.race),
                    race_opponents: registration.race_opponents.clone().unwrap_or_default(),
                    status: registration.status.as_i64(),
                    event: event_label(core, listing),
                    created_at: core.format_date(registration.created_at, "%d-%m-%Y %H:%M:%S"),
                    edit_url: core.admin_url(&format!("events_registration/edit/{}", id)),
                }
            })
            .collect();

        let lang = helpers::content_lang(core, "events", request);
        let mut ctx = Context::new();
        ctx.insert("registrations", &rows);
        ctx.insert("registration_count", &total);
        ctx.insert("pagination", &pagination.nav());
        ctx.insert("events", &Self::event_choices(core, &lang, None).await?);
        ctx.insert("event_filter", &request.query("event").unwrap_or_default());
        ctx.insert("manage_url", &core.admin_url("events_registration/manage"));
        ctx.insert("export_url", &core.admin_url("events_registration/export"));
        helpers::view(core, "modules/events_registration/admin/manage.html", ctx)
    }

    async fn edit(&self, core: &mut Core, id: i64, request: &AdminRequest) -> Result<Output> {
        let Some(listing) = Self::repo(core).find_by_id(id).await? else {
            return Ok(Output::NotFound);
        };
        let lang = helpers::content_lang(core, "events", request);
        let registration = &listing.registration;
        let duration = registration.estimated_time;
        let mut ctx = Context::new();
        ctx.insert("form", &core.take_form());
        ctx.insert("registration", registration);
        ctx.insert("estimated_time_text", &estimated_time_text(duration));
        ctx.insert("hours", &(duration / 3600));
        ctx.insert("minutes", &((duration / 60) % 60));
        ctx.insert("seconds", &(duration % 60));
        ctx.insert("status", &registration.status.as_i64());
        ctx.insert("events", &Self::event_choices(core, &lang, registration.event_id).await?);
        ctx.insert("save_url", &core.admin_url(&format!("events_registration/save/{}", id)));
        ctx.insert("manage_url", &core.admin_url("events_registration/manage"));
        helpers::view(core, "modules/events_registration/admin/form.html", ctx)
    }

    async fn save(&self, core: &mut Core, id: i64, form: &FormData) -> Result<Output> {
        let repo = Self::repo(core);
        let Some(listing) = repo.find_by_id(id).await? else {
            return Ok(Output::NotFound);
        };
        let back = format!("events_registration/edit/{}", id);
        let estimated_time = duration_from_parts(
            form.int("hours").unwrap_or_default(),
            form.int("minutes").unwrap_or_default(),
            form.int("seconds").unwrap_or_default(),
        )
        .unwrap_or_default();
        let mut registration = listing.registration;
        match (
            form.optional("runner_name"),
            form.optional("game_name"),
            form.optional("game_category"),
        ) {
            (Some(runner), Some(game), Some(category)) if estimated_time > 0 => {
                registration.runner_name = runner;
                registration.game_name = game;
                registration.game_category = category;
            }
            _ => {
                let text = core.lang_text("general", "fill_inputs");
                return Ok(helpers::reject(core, form, text, &back));
            }
        }
        registration.estimated_time = estimated_time;
        registration.race = form.checked("race");
        registration.race_opponents = form.optional("race_opponents");
        registration.event_id = parse_event_choice(&form.text("event"));
        registration.comment = form.optional("comment");
        registration.status = RegistrationStatus::from_i64(form.int("status").unwrap_or_default());
        repo.update(&registration).await?;

        let text = core.lang_text(MODULE, "save_success");
        Ok(helpers::success(core, text, &back))
    }

    /// Export every registration of one event, of none, or all of them.
    async fn export(&self, core: &mut Core, request: &AdminRequest) -> Result<Output> {
        if request.is_post() {
            let filter = EventFilter::parse(&request.form.text("event"));
            let listings = Self::repo(core).export(filter, None).await?;
            return Ok(csv_output(csv_export(core, &listings)?));
        }
        let lang = helpers::content_lang(core, "events", request);
        let mut ctx = Context::new();
        ctx.insert("events", &Self::event_choices(core, &lang, None).await?);
        ctx.insert("export_url", &core.admin_url("events_registration/export"));
        helpers::view(core, "modules/events_registration/admin/export.html", ctx)
    }

    async fn settings(&self, core: &mut Core, request: &AdminRequest) -> Result<Output> {
        if request.is_post() {
            let slug = request.form.text("slug");
            let slug = slug.trim_start_matches('/');
            let values = [
                ("slug", if slug.is_empty() { "register".to_string() } else { slug.to_string() }),
                ("description", request.form.text("description")),
            ];
            core.settings.update_many(MODULE, &values).await?;
            let text = core.lang_text("general", "settings_saved");
            return Ok(helpers::success(core, text, "events_registration/settings"));
        }
        let mut ctx = Context::new();
        ctx.insert("registration", &core.settings.module(MODULE).cloned().unwrap_or_default());
        ctx.insert("editor", &core.setting("settings", "editor"));
        ctx.insert("save_url", &core.admin_url("events_registration/settings"));
        helpers::view(core, "modules/events_registration/admin/settings.html", ctx)
    }
}

#[async_trait]
impl AdminModule for RegistrationAdmin {
    fn name(&self) -> &'static str {
        MODULE
    }

    fn navigation(&self, core: &Core) -> Vec<NavItem> {
        vec![
            NavItem::new(core.lang_text("general", "manage"), "manage"),
            NavItem::new(core.lang_text(MODULE, "export"), "export"),
            NavItem::new(core.lang_text("general", "settings"), "settings"),
        ]
    }

    async fn dispatch(&self, core: &mut Core, request: AdminRequest) -> Result<Output> {
        match request.action.as_str() {
            "manage" => self.manage(core, &request).await,
            "edit" => match request.id(0) {
                Some(id) => self.edit(core, id, &request).await,
                None => Ok(Output::NotFound),
            },
            "save" if request.is_post() => match request.id(0) {
                Some(id) => self.save(core, id, &request.form).await,
                None => Ok(Output::NotFound),
            },
            "export" => self.export(core, &request).await,
            "settings" => self.settings(core, &request).await,
            _ => Ok(Output::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::admin_core;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use roost_core::models::event::Event;
    use roost_core::models::registration::Registration;

    async fn seed(core: &Core) -> i64 {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 18, 0, 0).unwrap();
        let mut event = Event::new("Summer Relay".into(), start, start, "en_english".into());
        event.registration = true;
        let event_id = EventRepository::new(core.db().clone()).create(&event).await.unwrap();

        let repo = RegistrationRepository::new(core.db().clone());
        for (runner, event) in [("Ada", Some(event_id)), ("Bob", None)] {
            repo.create(&Registration {
                id: None,
                runner_name: runner.to_string(),
                game_name: "Celeste".to_string(),
                game_category: "Any%, glitchless".to_string(),
                estimated_time: 3909,
                race: runner == "Ada",
                race_opponents: None,
                event_id: event,
                status: RegistrationStatus::Pending,
                comment: Some("Hi".to_string()),
                created_at: start,
            })
            .await
            .unwrap();
        }
        event_id
    }

    fn csv_body(out: Output) -> String {
        match out {
            Output::Raw { body, filename, content_type } => {
                assert_eq!(filename.as_deref(), Some("export.csv"));
                assert!(content_type.starts_with("text/csv"));
                String::from_utf8(body).unwrap()
            }
            _ => panic!("expected a CSV download"),
        }
    }

    #[tokio::test]
    async fn test_export_without_event() {
        let (mut core, _dirs) = admin_core().await;
        seed(&core).await;
        let form = FormData::from_pairs([("event", "-1")]);
        let out = RegistrationAdmin
            .dispatch(&mut core, AdminRequest::post("export", &[], form))
            .await
            .unwrap();
        let body = csv_body(out);
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(
            lines[0],
            "runner_name,event_name,game_name,game_category,estimated_time,race,race_opponents,comment"
        );
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "Bob,,Celeste,\"Any%, glitchless\",01h 05m 09s,No,,Hi");
    }

    #[tokio::test]
    async fn test_export_selected_rows() {
        let (mut core, _dirs) = admin_core().await;
        seed(&core).await;
        let form = FormData::from_pairs([("export", "1"), ("registration-list[]", "1")]);
        let out = RegistrationAdmin
            .dispatch(&mut core, AdminRequest::post("manage", &[], form))
            .await
            .unwrap();
        let body = csv_body(out);
        assert!(body.lines().nth(1).unwrap().starts_with("Ada,Summer Relay,"));
        assert!(body.contains(",Yes,"));
    }

    #[tokio::test]
    async fn test_manage_filters_and_labels_events() {
        let (mut core, _dirs) = admin_core().await;
        let event_id = seed(&core).await;
        let mut request = AdminRequest::get("manage", &[]);
        request.query.insert("event".to_string(), event_id.to_string());
        let out = RegistrationAdmin.dispatch(&mut core, request).await.unwrap();
        match out {
            Output::Html(html) => {
                assert!(html.contains("Summer Relay (01-06-2024)"));
                assert!(!html.contains("Bob"));
            }
            _ => panic!("expected the listing"),
        }
    }

    #[tokio::test]
    async fn test_save_updates_status_and_duration() {
        let (mut core, _dirs) = admin_core().await;
        seed(&core).await;
        let form = FormData::from_pairs([
            ("runner_name", "Bob"),
            ("game_name", "Celeste"),
            ("game_category", "100%"),
            ("hours", "2"),
            ("minutes", "0"),
            ("seconds", "0"),
            ("event", "-1"),
            ("status", "1"),
        ]);
        RegistrationAdmin
            .dispatch(&mut core, AdminRequest::post("save", &["2"], form))
            .await
            .unwrap();
        let saved = RegistrationRepository::new(core.db().clone())
            .find_by_id(2)
            .await
            .unwrap()
            .unwrap()
            .registration;
        assert_eq!(saved.status, RegistrationStatus::Accepted);
        assert_eq!(saved.estimated_time, 7200);
        assert_eq!(saved.game_category, "100%");
    }

    #[tokio::test]
    async fn test_mass_delete() {
        let (mut core, _dirs) = admin_core().await;
        seed(&core).await;
        let form = FormData::from_pairs([
            ("delete", "1"),
            ("registration-list[]", "1"),
            ("registration-list[]", "2"),
        ]);
        RegistrationAdmin
            .dispatch(&mut core, AdminRequest::post("manage", &[], form))
            .await
            .unwrap();
        let repo = RegistrationRepository::new(core.db().clone());
        assert_eq!(repo.count(EventFilter::All).await.unwrap(), 0);
        assert!(core.session.data.success.is_some());
    }
}
