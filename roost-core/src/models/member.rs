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

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Largest edge of a stored member picture or user avatar.
pub const PORTRAIT_SIZE: u32 = 512;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Member {
    pub id: Option<i64>,
    pub name: String,
    pub role: Option<String>,
    pub description: Option<String>,
    pub picture: Option<String>,
    pub twitch_handle: Option<String>,
    pub active: bool,
    pub lang: String,
    pub markdown: bool,
}

impl Member {
    pub fn has_role(&self) -> bool {
        self.role.as_deref().is_some_and(|r| !r.trim().is_empty())
    }

    pub fn twitch_key(&self) -> Option<String> {
        self.twitch_handle
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_lowercase)
    }
}

/// Order used by the public member list: members holding a role first,
/// sorted by role then name, followed by everyone else sorted by name.
pub fn sort_for_display(members: &mut [Member]) {
    members.sort_by(|a, b| match (a.has_role(), b.has_role()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (true, true) => a
            .role
            .cmp(&b.role)
            .then_with(|| a.name.cmp(&b.name)),
        (false, false) => a.name.cmp(&b.name),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn member(name: &str, role: Option<&str>) -> Member {
        Member {
            id: None,
            name: name.to_string(),
            role: role.map(str::to_string),
            description: None,
            picture: None,
            twitch_handle: None,
            active: true,
            lang: "en_english".to_string(),
            markdown: false,
        }
    }

    #[test]
    fn test_sort_for_display() {
        let mut members = vec![
            member("Zed", None),
            member("Bob", Some("Treasurer")),
            member("Amy", None),
            member("Carl", Some("President")),
            member("Abe", Some("Treasurer")),
            member("Eve", Some("")),
        ];
        sort_for_display(&mut members);
        let names: Vec<&str> = members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Carl", "Abe", "Bob", "Amy", "Eve", "Zed"]);
    }

    #[test]
    fn test_twitch_key() {
        let mut m = member("Amy", None);
        assert_eq!(m.twitch_key(), None);
        m.twitch_handle = Some("  ".to_string());
        assert_eq!(m.twitch_key(), None);
        m.twitch_handle = Some("AmyPlays".to_string());
        assert_eq!(m.twitch_key().as_deref(), Some("amyplays"));
    }
}
