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

//! Team member directory with live Twitch flags.

pub mod admin;
pub mod site;

use roost_core::models::member::Member;

use crate::config::Config;
use crate::core::Core;

pub const MODULE: &str = "members";
pub const DEFAULT_PICTURE: &str = "/static/img/default-member.svg";

pub fn base_slug(core: &Core) -> String {
    let value = core.setting(MODULE, "slug");
    let value = value.trim().trim_start_matches('/');
    if value.is_empty() {
        "members".to_string()
    } else {
        value.to_string()
    }
}

pub fn picture_url(member: &Member) -> String {
    match member.picture.as_deref().filter(|p| !p.is_empty()) {
        Some(picture) => Config::upload_url(MODULE, picture),
        None => DEFAULT_PICTURE.to_string(),
    }
}
