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

use crate::utils::text::{strip_tags, word_wrap};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pagelist {
    pub id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub lang: String,
    pub markdown: bool,
    pub template: String,
    pub slug: String,
    pub updated_at: DateTime<Utc>,
}

/// A page attached to a list, kept in display order by `position`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PagelistLink {
    pub pagelist: i64,
    pub page: i64,
    pub picture: Option<String>,
    pub position: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

impl MoveDirection {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "up" => Some(MoveDirection::Up),
            "down" => Some(MoveDirection::Down),
            _ => None,
        }
    }
}

/// Work out the two position updates needed to move `page` one step in
/// `direction`. Returns `(page, new_position)` pairs, or `None` when the
/// link is missing or already at the edge of the list.
pub fn plan_link_move(
    links: &[PagelistLink],
    page: i64,
    direction: MoveDirection,
) -> Option<[(i64, i64); 2]> {
    let max = links.len() as i64 - 1;
    let moved = links.iter().find(|l| l.page == page)?;
    let target = match direction {
        MoveDirection::Up if moved.position > 0 => moved.position - 1,
        MoveDirection::Down if moved.position < max => moved.position + 1,
        _ => return None,
    };
    let displaced = links.iter().find(|l| l.position == target)?;
    Some([(moved.page, target), (displaced.page, moved.position)])
}

/// One-line teaser of a page description: the first line of the text
/// wrapped at 80 columns, with ` ...` when the text goes on.
pub fn link_summary(description: &str) -> String {
    let wrapped = word_wrap(&strip_tags(description), 80);
    let mut lines = wrapped.lines();
    let first = lines.next().unwrap_or_default().to_string();
    if lines.next().is_some() {
        format!("{} ...", first)
    } else {
        first
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn links() -> Vec<PagelistLink> {
        (0..3)
            .map(|i| PagelistLink {
                pagelist: 1,
                page: 10 + i,
                picture: None,
                position: i,
            })
            .collect()
    }

    #[test]
    fn test_plan_link_move() {
        let links = links();
        assert_eq!(
            plan_link_move(&links, 11, MoveDirection::Up),
            Some([(11, 0), (10, 1)])
        );
        assert_eq!(
            plan_link_move(&links, 11, MoveDirection::Down),
            Some([(11, 2), (12, 1)])
        );
    }

    #[test]
    fn test_plan_link_move_boundaries() {
        let links = links();
        assert_eq!(plan_link_move(&links, 10, MoveDirection::Up), None);
        assert_eq!(plan_link_move(&links, 12, MoveDirection::Down), None);
        assert_eq!(plan_link_move(&links, 99, MoveDirection::Down), None);
        assert_eq!(plan_link_move(&[], 10, MoveDirection::Down), None);
    }

    #[test]
    fn test_link_summary() {
        assert_eq!(link_summary("<p>Short text</p>"), "Short text");

        let long = "word ".repeat(30);
        let summary = link_summary(&long);
        assert!(summary.ends_with(" ..."));
        assert!(summary.len() <= 84);
    }

    #[test]
    fn test_move_direction_parse() {
        assert_eq!(MoveDirection::parse("up"), Some(MoveDirection::Up));
        assert_eq!(MoveDirection::parse("sideways"), None);
    }
}
