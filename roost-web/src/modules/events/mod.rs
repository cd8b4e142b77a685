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

//! Event calendar with Horaro schedules and iCal exports.

pub mod admin;
pub mod horaro;
pub mod ical;
pub mod site;

use roost_core::models::event::Event;

use crate::config::Config;
use crate::core::Core;

pub const MODULE: &str = "events";
pub const ICAL_NAME: &str = "cal";

fn slug_setting(core: &Core, field: &str, default: &str) -> String {
    let value = core.setting(MODULE, field);
    let value = value.trim().trim_matches('/');
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

/// Calendar page path, `planning` by default.
pub fn base_slug(core: &Core) -> String {
    slug_setting(core, "slug", "planning")
}

pub fn event_slug(core: &Core) -> String {
    slug_setting(core, "event_slug", "event")
}

pub fn event_url(core: &Core, id: i64) -> String {
    core.url(&format!(
        "{}{}/{}/{}",
        core.url_prefix(),
        base_slug(core),
        event_slug(core),
        id
    ))
}

pub fn event_ical_url(core: &Core, id: i64) -> String {
    format!("{}/{}.ics", event_url(core, id), ICAL_NAME)
}

pub fn picture_url(event: &Event) -> Option<String> {
    event
        .picture
        .as_deref()
        .filter(|p| !p.is_empty())
        .map(|p| Config::upload_url(MODULE, p))
}
