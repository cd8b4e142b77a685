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

//! Runner submissions for events.

pub mod admin;
pub mod site;

use roost_core::models::event::Event;
use serde::Serialize;

use crate::core::Core;

pub const MODULE: &str = "events_registration";

/// Registration page path, `register` by default.
pub fn base_slug(core: &Core) -> String {
    let value = core.setting(MODULE, "slug");
    let value = value.trim().trim_start_matches('/');
    if value.is_empty() {
        "register".to_string()
    } else {
        value.to_string()
    }
}

/// An event offered in the registration selectors.
#[derive(Debug, Serialize)]
pub struct EventChoice {
    pub id: i64,
    pub name: String,
    pub start_at: String,
    pub end_at: String,
}

impl EventChoice {
    pub fn new(core: &Core, event: &Event) -> Self {
        EventChoice {
            id: event.id.unwrap_or_default(),
            name: event.name.clone(),
            start_at: core.format_date(event.start_at, "%d-%m-%Y"),
            end_at: core.format_date(event.end_at, "%d-%m-%Y"),
        }
    }
}
