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
use roost_core::models::registration::{duration_from_parts, parse_event_choice, Registration, RegistrationStatus};
use roost_db::repositories::{EventRepository, RegistrationRepository};

use super::{base_slug, EventChoice, MODULE};
use crate::core::{Core, Location};
use crate::form::FormData;
use crate::modules::{Output, SiteModule, SiteRoute};
use roost_core::models::notification::Notification;

const AUTOCOMPLETE: &str = "https://cdn.jsdelivr.net/npm/@tarekraafat/autocomplete.js@7.2.0/dist";

pub struct RegistrationSite;

impl RegistrationSite {
    /// Build a registration from the public form, `None` when a required
    /// field is missing.
    fn registration_from_form(form: &FormData, now: chrono::DateTime<chrono::Utc>) -> Option<Registration> {
        let runner_name = form.optional("runner_name")?;
        let game_name = form.optional("game_name")?;
        let game_category = form.optional("game_category")?;
        let estimated_time = duration_from_parts(
            form.int("hours").unwrap_or_default(),
            form.int("minutes").unwrap_or_default(),
            form.int("seconds").unwrap_or_default(),
        )?;
        if estimated_time == 0 {
            return None;
        }
        Some(Registration {
            id: None,
            runner_name,
            game_name,
            game_category,
            estimated_time,
            race: form.checked("race"),
            race_opponents: form.optional("race_opponents"),
            event_id: parse_event_choice(&form.text("event")),
            status: RegistrationStatus::Pending,
            comment: form.optional("comment"),
            created_at: now,
        })
    }

    async fn submit(&self, core: &mut Core, form: &FormData) -> Result<Output> {
        let target = core.url(&format!("{}{}", core.url_prefix(), base_slug(core)));
        let Some(registration) = Self::registration_from_form(form, core.now()) else {
            let text = core.lang_text(MODULE, "empty_inputs");
            core.notify(Notification::failure(text));
            core.keep_form(form);
            return Ok(Output::Redirect(target));
        };

        let repo = RegistrationRepository::new(core.db().clone());
        match repo.create(&registration).await {
            Ok(id) => {
                tracing::info!("New registration {} from {}", id, registration.runner_name);
                let text = core.lang_text(MODULE, "send_success");
                core.notify(Notification::success(text));
            }
            Err(e) => {
                tracing::error!("Failed to save registration: {:#}", e);
                let text = core.lang_text(MODULE, "save_failure");
                core.notify(Notification::failure(text));
                core.keep_form(form);
            }
        }
        Ok(Output::Redirect(target))
    }

    async fn index(&self, core: &mut Core) -> Result<Output> {
        let events: Vec<EventChoice> = EventRepository::new(core.db().clone())
            .open_for_registration(&core.lang_code, core.now())
            .await?
            .iter()
            .map(|event| EventChoice::new(core, event))
            .collect();

        core.add_css("/static/css/events_registration.css");
        core.add_css(&format!("{}/css/autoComplete.min.css", AUTOCOMPLETE));
        core.add_js(&format!("{}/js/autoComplete.min.js", AUTOCOMPLETE), Location::Footer);
        core.add_js("/static/js/events_registration.js", Location::Footer);

        let form = core.take_form();
        let locale = core.lang_prefix().to_string();
        core.assign("page_title", &core.lang_text(MODULE, "title"));
        core.assign("page_desc", &core.lang_text(MODULE, "desc"));
        core.assign("description", &core.setting(MODULE, "description"));
        core.assign("locale", &locale);
        core.assign("time_zone", &core.timezone().name());
        core.assign("events", &events);
        core.assign("form", &form);
        Ok(Output::Page("register.html".to_string()))
    }
}

#[async_trait]
impl SiteModule for RegistrationSite {
    fn name(&self) -> &'static str {
        MODULE
    }

    fn routes(&self, core: &mut Core) -> Result<()> {
        let slug = base_slug(core);
        core.router.route(&slug, SiteRoute::new(MODULE, "index"))?;
        Ok(())
    }

    async fn handle(
        &self,
        core: &mut Core,
        action: &'static str,
        _params: Vec<String>,
        form: &FormData,
    ) -> Result<Output> {
        match action {
            "index" if form.has("send-registration") => self.submit(core, form).await,
            "index" => self.index(core).await,
            _ => Ok(Output::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::test_core;
    use chrono::{Duration, Utc};
    use pretty_assertions::assert_eq;
    use roost_core::models::event::Event;
    use roost_db::repositories::EventFilter;

    fn submission(event: &str) -> FormData {
        FormData::from_pairs([
            ("send-registration", "1"),
            ("runner_name", "Ada"),
            ("game_name", "Celeste"),
            ("game_category", "Any%"),
            ("hours", "0"),
            ("minutes", "32"),
            ("seconds", "5"),
            ("race", "1"),
            ("race_opponents", "Bob"),
            ("event", event),
        ])
    }

    #[tokio::test]
    async fn test_submission_is_saved() {
        let (mut core, _dirs) = test_core().await;
        let out = RegistrationSite
            .handle(&mut core, "index", vec![], &submission("-1"))
            .await
            .unwrap();
        assert!(matches!(out, Output::Redirect(ref url) if url == "/register"));
        assert!(core.session.data.success.is_some());

        let repo = RegistrationRepository::new(core.db().clone());
        let saved = repo.list(EventFilter::NoEvent, 10, 0).await.unwrap();
        assert_eq!(saved.len(), 1);
        let registration = &saved[0].registration;
        assert_eq!(registration.estimated_time, 32 * 60 + 5);
        assert_eq!(registration.event_id, None);
        assert!(registration.race);
        assert_eq!(registration.status, RegistrationStatus::Pending);
    }

    #[tokio::test]
    async fn test_missing_duration_is_refused() {
        let (mut core, _dirs) = test_core().await;
        let form = FormData::from_pairs([
            ("send-registration", "1"),
            ("runner_name", "Ada"),
            ("game_name", "Celeste"),
            ("game_category", "Any%"),
        ]);
        RegistrationSite.handle(&mut core, "index", vec![], &form).await.unwrap();
        assert!(core.session.data.failure.is_some());
        assert_eq!(core.session.data.form.as_ref().unwrap()["runner_name"], "Ada");
        let repo = RegistrationRepository::new(core.db().clone());
        assert_eq!(repo.count(EventFilter::All).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_oversized_duration_is_refused() {
        let (mut core, _dirs) = test_core().await;
        let form = FormData::from_pairs([
            ("send-registration", "1"),
            ("runner_name", "Ada"),
            ("game_name", "Celeste"),
            ("game_category", "Any%"),
            ("hours", "9000000000000000"),
        ]);
        let out = RegistrationSite.handle(&mut core, "index", vec![], &form).await.unwrap();
        assert!(matches!(out, Output::Redirect(ref url) if url == "/register"));
        assert!(core.session.data.failure.is_some());
        let repo = RegistrationRepository::new(core.db().clone());
        assert_eq!(repo.count(EventFilter::All).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_form_lists_open_events() {
        let (mut core, _dirs) = test_core().await;
        let repo = EventRepository::new(core.db().clone());
        let now = Utc::now();
        let mut open = Event::new("Open".into(), now + Duration::days(3), now + Duration::days(4), "en_english".into());
        open.registration = true;
        repo.create(&open).await.unwrap();
        let mut past = Event::new("Past".into(), now - Duration::days(4), now - Duration::days(3), "en_english".into());
        past.registration = true;
        repo.create(&past).await.unwrap();
        let closed = Event::new("Closed".into(), now + Duration::days(3), now + Duration::days(4), "en_english".into());
        repo.create(&closed).await.unwrap();

        let out = RegistrationSite
            .handle(&mut core, "index", vec![], &FormData::default())
            .await
            .unwrap();
        assert!(matches!(out, Output::Page(ref t) if t == "register.html"));
        let ctx = core.base_context();
        let events = ctx.get("events").unwrap().as_array().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["name"], "Open");
    }

    #[tokio::test]
    async fn test_route_follows_slug() {
        let (mut core, _dirs) = test_core().await;
        core.settings.set_field(MODULE, "slug", "/signup").await.unwrap();
        RegistrationSite.routes(&mut core).unwrap();
        assert!(core.router.dispatch("signup").is_some());
        assert!(core.router.dispatch("register").is_none());
    }
}
