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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

pub const HORARO_BASE_URL: &str = "https://horaro.org";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: Option<i64>,
    pub name: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub description: Option<String>,
    pub picture: Option<String>,
    pub building_name: Option<String>,
    pub building_address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub channel_name: Option<String>,
    pub horaro_event_id: Option<String>,
    pub horaro_schedule_id: Option<String>,
    pub lang: String,
    pub markdown: bool,
    pub group_id: Option<i64>,
    /// Whether the registration form offers this event.
    pub registration: bool,
    pub published_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn new(name: String, start_at: DateTime<Utc>, end_at: DateTime<Utc>, lang: String) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            name,
            start_at,
            end_at,
            description: None,
            picture: None,
            building_name: None,
            building_address: None,
            latitude: None,
            longitude: None,
            channel_name: None,
            horaro_event_id: None,
            horaro_schedule_id: None,
            lang,
            markdown: false,
            group_id: None,
            registration: false,
            published_at: now,
            updated_at: now,
            created_at: now,
        }
    }

    /// Public schedule page of the linked Horaro schedule.
    pub fn horaro_url(&self) -> Option<String> {
        match (
            self.horaro_event_id.as_deref(),
            self.horaro_schedule_id.as_deref(),
        ) {
            (Some(event), Some(schedule)) if !event.is_empty() && !schedule.is_empty() => {
                Some(format!("{}/{}/{}", HORARO_BASE_URL, event, schedule))
            }
            _ => None,
        }
    }

    pub fn has_location(&self) -> bool {
        matches!((self.latitude, self.longitude), (Some(lat), Some(lon)) if lat != 0.0 && lon != 0.0)
    }

    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.end_at >= now && self.published_at <= now
    }
}

/// Calendar category with its display colours.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventGroup {
    pub id: Option<i64>,
    pub lang: String,
    pub name: String,
    pub color: Option<String>,
    #[serde(rename = "textColor")]
    pub text_color: Option<String>,
}

/// Extract `(event, schedule)` from a Horaro schedule URL such as
/// `https://horaro.org/my-event/day-one`.
pub fn parse_horaro_url(raw: &str) -> Option<(String, String)> {
    let url = Url::parse(raw.trim()).ok()?;
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    let event = segments.next()?.to_string();
    let schedule = segments.next()?.to_string();
    Some((event, schedule))
}

/// Schedule document returned by the Horaro API.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct HoraroSchedule {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub twitch: Option<String>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub items: Vec<HoraroItem>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct HoraroItem {
    pub scheduled_t: i64,
    pub length_t: i64,
    #[serde(default)]
    pub data: Vec<Option<String>>,
}

impl HoraroItem {
    pub fn ends_at(&self) -> i64 {
        self.scheduled_t + self.length_t
    }
}
