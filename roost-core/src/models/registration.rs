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

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum RegistrationStatus {
    #[default]
    Pending,
    Accepted,
    Refused,
}

impl RegistrationStatus {
    pub fn from_i64(value: i64) -> Self {
        match value {
            1 => RegistrationStatus::Accepted,
            2 => RegistrationStatus::Refused,
            _ => RegistrationStatus::Pending,
        }
    }

    pub fn as_i64(self) -> i64 {
        match self {
            RegistrationStatus::Pending => 0,
            RegistrationStatus::Accepted => 1,
            RegistrationStatus::Refused => 2,
        }
    }
}

/// A runner's submission for an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Registration {
    pub id: Option<i64>,
    pub runner_name: String,
    pub game_name: String,
    pub game_category: String,
    /// Estimated run duration in seconds.
    pub estimated_time: i64,
    pub race: bool,
    pub race_opponents: Option<String>,
    pub event_id: Option<i64>,
    pub status: RegistrationStatus,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Render a duration in seconds as `01h 05m 09s`.
pub fn estimated_time_text(duration: i64) -> String {
    let duration = duration.max(0);
    format!(
        "{:02}h {:02}m {:02}s",
        duration / 3600,
        (duration / 60) % 60,
        duration % 60
    )
}

/// Combine the hours/minutes/seconds inputs of the registration form.
/// Negative parts count as zero; `None` when the total overflows.
pub fn duration_from_parts(hours: i64, minutes: i64, seconds: i64) -> Option<i64> {
    hours
        .max(0)
        .checked_mul(3600)?
        .checked_add(minutes.max(0).checked_mul(60)?)?
        .checked_add(seconds.max(0))
}

/// Event selector value where `-1` stands for "no event".
pub fn parse_event_choice(raw: &str) -> Option<i64> {
    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Some(id),
        _ => None,
    }
}
