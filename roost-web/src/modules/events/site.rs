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
use chrono::{DateTime, TimeZone, Utc};
use roost_core::models::event::{Event, HoraroSchedule};
use roost_core::models::notification::Notification;
use roost_core::utils::text::{markdown_links_to_html, strip_tags};
use roost_db::repositories::EventRepository;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use super::horaro::HoraroClient;
use super::ical::{Calendar, CalendarEvent};
use super::{base_slug, event_ical_url, event_slug, event_url, picture_url, ICAL_NAME, MODULE};
use crate::core::Core;
use crate::form::FormData;
use crate::markdown::render_body;
use crate::modules::{Output, SiteModule, SiteRoute};
use crate::uploads::ImageFormat;

/// Horaro schedules show their first three columns only.
const SCHEDULE_COLUMNS: usize = 3;
const SOURCE_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Serialize)]
struct UpcomingEvent {
    id: i64,
    name: String,
    url: String,
    start_at: i64,
    start_at_short: String,
}

/// A line of the schedule table: either a day header or a run.
#[derive(Debug, Default, Serialize, PartialEq)]
struct ScheduleRow {
    text: Option<String>,
    columns: Vec<String>,
    start: String,
    end: String,
}

#[derive(Debug, Serialize)]
struct EventView {
    id: i64,
    name: String,
    start: String,
    start_raw: i64,
    end_raw: i64,
    description: String,
    picture: Option<String>,
    building_name: Option<String>,
    building_address: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    has_map: bool,
    horaro_name: Option<String>,
    horaro_start: Option<String>,
    website: Option<String>,
    channel_name: Option<String>,
    ical_url: String,
    columns: Vec<String>,
    items: Vec<ScheduleRow>,
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn timestamp(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0).single().unwrap_or_default()
}

/// Turn Horaro items into table rows, inserting a header on each new day.
fn schedule_rows(core: &Core, schedule: &HoraroSchedule) -> Vec<ScheduleRow> {
    let date_format = core.lang_text(MODULE, "date_format");
    let time_format = core.lang_text(MODULE, "time_format");
    let day_format = core.lang_text(MODULE, "day_format");

    let mut rows = Vec::new();
    let mut current_day: Option<String> = None;
    for item in &schedule.items {
        let start = timestamp(item.scheduled_t);
        let day = core.format_date(start, &date_format);
        if current_day.as_deref() != Some(day.as_str()) {
            rows.push(ScheduleRow {
                text: Some(capitalize(&core.format_date(start, &day_format))),
                ..Default::default()
            });
            current_day = Some(day);
        }
        rows.push(ScheduleRow {
            text: None,
            columns: item
                .data
                .iter()
                .take(SCHEDULE_COLUMNS)
                .map(|cell| markdown_links_to_html(cell.as_deref().unwrap_or_default()))
                .collect(),
            start: core.format_date(start, &time_format),
            end: core.format_date(timestamp(item.ends_at()), &time_format),
        });
    }
    rows
}

pub struct EventsSite;

impl EventsSite {
    fn repo(core: &Core) -> EventRepository {
        EventRepository::new(core.db().clone())
    }

    async fn index(&self, core: &mut Core) -> Result<Output> {
        let base = base_slug(core);
        core.add_css("/static/css/events.css");
        core.assign("page_title", &core.lang_text(MODULE, "title"));
        core.assign("page_desc", &core.lang_text(MODULE, "desc"));
        let locale = core.lang_prefix().to_string();
        core.assign("locale", &locale);
        core.assign("time_zone", &core.timezone().name());
        core.assign(
            "sources_url",
            &core.url(&format!("{}{}/sources.json", core.url_prefix(), base)),
        );
        core.assign(
            "ical_all_href",
            &core.url(&format!("{}{}/{}.ics", core.url_prefix(), base, ICAL_NAME)),
        );
        Ok(Output::Page("events.html".to_string()))
    }

    /// Calendar sources, one per group of the current language, plus the
    /// events without a group.
    async fn sources(&self, core: &Core) -> Result<Value> {
        let repo = Self::repo(core);
        let events = repo.list_public(&core.lang_code, core.now()).await?;

        let mut by_group: BTreeMap<Option<i64>, Vec<Value>> = BTreeMap::new();
        for event in &events {
            let id = event.id.unwrap_or_default();
            by_group.entry(event.group_id).or_default().push(json!({
                "id": id,
                "title": event.name,
                "start": core.format_date(event.start_at, SOURCE_DATE_FORMAT),
                "end": core.format_date(event.end_at, SOURCE_DATE_FORMAT),
                "url": event_url(core, id),
                "display": "block",
            }));
        }

        let mut sources = Vec::new();
        for group in repo.list_groups(Some(&core.lang_code)).await? {
            sources.push(json!({
                "events": by_group.remove(&group.id).unwrap_or_default(),
                "color": group.color,
                "textColor": group.text_color,
            }));
        }
        let ungrouped: Vec<Value> = by_group.into_values().flatten().collect();
        if !ungrouped.is_empty() {
            sources.push(json!({ "events": ungrouped }));
        }
        Ok(Value::Array(sources))
    }

    async fn event(&self, core: &mut Core, id: i64) -> Result<Output> {
        let Some(event) = Self::repo(core).find_public(id, &core.lang_code, core.now()).await? else {
            return Ok(Output::NotFound);
        };

        let schedule = match (event.horaro_event_id.as_deref(), event.horaro_schedule_id.as_deref()) {
            (Some(e), Some(s)) if !e.is_empty() && !s.is_empty() => {
                let schedule = HoraroClient::new(core.state.http.clone()).schedule(e, s).await;
                if schedule.is_none() {
                    let text = core.lang_text(MODULE, "schedule_not_available");
                    core.notify(Notification::failure(text));
                }
                schedule
            }
            _ => None,
        };
        let schedule = schedule.unwrap_or_default();

        let datetime_format = core.lang_text(MODULE, "datetime_format");
        let view = EventView {
            id,
            name: event.name.clone(),
            start: core.format_date(event.start_at, &datetime_format),
            start_raw: event.start_at.timestamp(),
            end_raw: event.end_at.timestamp(),
            description: render_body(event.description.as_deref().unwrap_or_default(), event.markdown),
            picture: picture_url(&event),
            building_name: event.building_name.clone(),
            building_address: event.building_address.clone(),
            latitude: event.latitude,
            longitude: event.longitude,
            has_map: event.has_location(),
            horaro_name: schedule.name.clone(),
            horaro_start: schedule.start.as_deref().and_then(|s| {
                DateTime::parse_from_rfc3339(s)
                    .ok()
                    .map(|d| core.format_date(d.with_timezone(&Utc), &core.lang_text(MODULE, "date_format")))
            }),
            website: schedule.website.clone(),
            channel_name: schedule.twitch.clone().or_else(|| event.channel_name.clone()),
            ical_url: match event.horaro_url() {
                Some(url) => format!("{}.ical", url),
                None => event_ical_url(core, id),
            },
            columns: schedule.columns.iter().take(SCHEDULE_COLUMNS).cloned().collect(),
            items: schedule_rows(core, &schedule),
        };

        core.add_css("/static/css/events.css");
        core.assign("page_title", &view.name);
        core.assign(
            "page_desc",
            &format!("{} {}", core.lang_text(MODULE, "event_start"), view.start),
        );
        core.assign("calendar_url", &core.url(&format!("{}{}", core.url_prefix(), base_slug(core))));
        core.assign("time_zone", &core.timezone().name());
        core.assign("event", &view);
        Ok(Output::Page("event.html".to_string()))
    }

    fn calendar_event(&self, core: &Core, event: &Event) -> CalendarEvent {
        let id = event.id.unwrap_or_default();
        let host = url::Url::parse(&core.base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "localhost".to_string());
        let location = [event.building_address.as_deref(), event.building_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        CalendarEvent {
            uid: format!("event-{}@{}", id, host),
            summary: event.name.clone(),
            description: event
                .description
                .as_deref()
                .map(|d| strip_tags(&render_body(d, event.markdown)).trim().to_string()),
            start: event.start_at,
            end: event.end_at,
            location: Some(location).filter(|l| !l.is_empty()),
            geo: event
                .has_location()
                .then(|| (event.latitude.unwrap_or_default(), event.longitude.unwrap_or_default())),
            url: Some(core.absolute_url(&event_url(core, id))),
            attachment: event.picture.as_deref().and_then(|p| {
                let mime = ImageFormat::from_filename(p)?.mime_type();
                picture_url(event).map(|url| (core.absolute_url(&url), mime))
            }),
        }
    }

    fn ical_output(&self, core: &Core, calendar: Calendar) -> Output {
        Output::Raw {
            content_type: "text/calendar; charset=utf-8",
            body: calendar.render(core.now()).into_bytes(),
            filename: Some(format!("{}.ics", ICAL_NAME)),
        }
    }

    async fn ical(&self, core: &mut Core, id: i64) -> Result<Output> {
        let Some(event) = Self::repo(core).find_public(id, &core.lang_code, core.now()).await? else {
            return Ok(Output::NotFound);
        };
        if let Some(url) = event.horaro_url() {
            return Ok(Output::Redirect(format!("{}.ical", url)));
        }
        let mut calendar = Calendar::new(event.name.clone());
        calendar.push(self.calendar_event(core, &event));
        Ok(self.ical_output(core, calendar))
    }

    /// Upcoming events of the current language. Events with a Horaro
    /// schedule are left to Horaro's own feed.
    async fn ical_all(&self, core: &mut Core) -> Result<Output> {
        let events = Self::repo(core).upcoming(&core.lang_code, core.now()).await?;
        if events.is_empty() {
            return Ok(Output::NotFound);
        }
        let mut calendar = Calendar::new(core.setting("settings", "title"));
        for event in events.iter().filter(|e| e.horaro_url().is_none()) {
            calendar.push(self.calendar_event(core, event));
        }
        Ok(self.ical_output(core, calendar))
    }
}

#[async_trait]
impl SiteModule for EventsSite {
    fn name(&self) -> &'static str {
        MODULE
    }

    async fn init(&self, core: &mut Core) -> Result<()> {
        let short_format = core.lang_text(MODULE, "date_format_short");
        let upcoming: Vec<UpcomingEvent> = Self::repo(core)
            .upcoming(&core.lang_code, core.now())
            .await?
            .into_iter()
            .map(|event| {
                let id = event.id.unwrap_or_default();
                UpcomingEvent {
                    id,
                    url: event_url(core, id),
                    start_at: event.start_at.timestamp(),
                    start_at_short: core.format_date(event.start_at, &short_format),
                    name: event.name,
                }
            })
            .collect();
        core.assign("events_base_slug", &base_slug(core));
        core.assign("events_event_slug", &event_slug(core));
        core.assign("upcoming_events", &upcoming);
        Ok(())
    }

    fn routes(&self, core: &mut Core) -> Result<()> {
        let base = base_slug(core);
        let event = format!("{}/{}", base, event_slug(core));
        let routes = [
            (base.clone(), "index"),
            (format!("{}/sources.json", base), "sources"),
            (format!("{}/{}.ics", base, ICAL_NAME), "ical_all"),
            (format!("{}/(:str)/{}.ics", event, ICAL_NAME), "ical"),
            (format!("{}/(:str)", event), "event"),
        ];
        for (pattern, action) in routes {
            core.router.route(&pattern, SiteRoute::new(MODULE, action))?;
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
        let id = params.first().and_then(|p| p.parse::<i64>().ok());
        match (action, id) {
            ("index", _) => self.index(core).await,
            ("sources", _) => Ok(Output::Json(self.sources(core).await?)),
            ("ical_all", _) => self.ical_all(core).await,
            ("ical", Some(id)) => self.ical(core, id).await,
            ("event", Some(id)) => self.event(core, id).await,
            _ => Ok(Output::NotFound),
        }
    }
}
