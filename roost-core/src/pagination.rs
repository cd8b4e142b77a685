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

//! Page splitting for admin lists and public listings.

use serde::Serialize;

/// Number of page links shown on each side of the current page.
const WINDOW: i64 = 2;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PageLink {
    pub label: String,
    /// `None` for the gap marker.
    pub url: Option<String>,
    pub active: bool,
}

impl PageLink {
    fn page(label: impl Into<String>, url: String, active: bool) -> Self {
        Self {
            label: label.into(),
            url: Some(url),
            active,
        }
    }

    fn gap() -> Self {
        Self {
            label: "…".to_string(),
            url: None,
            active: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pagination {
    current: i64,
    total: i64,
    per_page: i64,
    url_pattern: String,
}

impl Pagination {
    /// `url_pattern` holds a `%d` placeholder for the page number.
    pub fn new(current: i64, total: i64, per_page: i64, url_pattern: impl Into<String>) -> Self {
        let per_page = per_page.max(1);
        let total = total.max(0);
        let pages = Self::page_count(total, per_page);
        Self {
            current: current.clamp(1, pages),
            total,
            per_page,
            url_pattern: url_pattern.into(),
        }
    }

    fn page_count(total: i64, per_page: i64) -> i64 {
        (total / per_page + i64::from(total % per_page != 0)).max(1)
    }

    pub fn pages(&self) -> i64 {
        Self::page_count(self.total, self.per_page)
    }

    pub fn current(&self) -> i64 {
        self.current
    }

    pub fn total(&self) -> i64 {
        self.total
    }

    pub fn per_page(&self) -> i64 {
        self.per_page
    }

    pub fn offset(&self) -> i64 {
        (self.current - 1) * self.per_page
    }

    pub fn url_for(&self, page: i64) -> String {
        self.url_pattern.replace("%d", &page.to_string())
    }

    /// Links for the navigation bar: previous, first, the window around the
    /// current page, last and next. Empty when everything fits on one page.
    pub fn nav(&self) -> Vec<PageLink> {
        let pages = self.pages();
        if pages <= 1 {
            return Vec::new();
        }

        let mut links = Vec::new();
        if self.current > 1 {
            links.push(PageLink::page("«", self.url_for(self.current - 1), false));
        }

        let start = (self.current - WINDOW).max(1);
        let end = (self.current + WINDOW).min(pages);

        if start > 1 {
            links.push(PageLink::page("1", self.url_for(1), false));
            if start > 2 {
                links.push(PageLink::gap());
            }
        }
        for page in start..=end {
            links.push(PageLink::page(
                page.to_string(),
                self.url_for(page),
                page == self.current,
            ));
        }
        if end < pages {
            if end < pages - 1 {
                links.push(PageLink::gap());
            }
            links.push(PageLink::page(pages.to_string(), self.url_for(pages), false));
        }

        if self.current < pages {
            links.push(PageLink::page("»", self.url_for(self.current + 1), false));
        }
        links
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn labels(p: &Pagination) -> Vec<String> {
        p.nav().into_iter().map(|l| l.label).collect()
    }

    #[test]
    fn test_offset_and_pages() {
        let p = Pagination::new(3, 45, 10, "/admin/blog/manage/%d");
        assert_eq!(p.pages(), 5);
        assert_eq!(p.offset(), 20);
        assert_eq!(p.url_for(4), "/admin/blog/manage/4");
    }

    #[test]
    fn test_current_page_is_clamped() {
        assert_eq!(Pagination::new(0, 45, 10, "%d").current(), 1);
        assert_eq!(Pagination::new(99, 45, 10, "%d").current(), 5);
        assert_eq!(Pagination::new(4, 0, 10, "%d").current(), 1);
        assert_eq!(Pagination::new(1, 10, 0, "%d").per_page(), 1);
    }

    #[test]
    fn test_extreme_values() {
        let p = Pagination::new(i64::MAX, i64::MAX, i64::MAX, "%d");
        assert_eq!(p.pages(), 1);
        assert_eq!(p.offset(), 0);
        let p = Pagination::new(i64::MAX, 3, 2, "%d");
        assert_eq!(p.current(), 2);
        assert_eq!(p.offset(), 2);
    }

    #[test]
    fn test_single_page_has_no_nav() {
        assert!(Pagination::new(1, 10, 10, "%d").nav().is_empty());
    }

    #[test]
    fn test_nav_window() {
        let p = Pagination::new(6, 200, 10, "/p/%d");
        assert_eq!(
            labels(&p),
            vec!["«", "1", "…", "4", "5", "6", "7", "8", "…", "20", "»"]
        );
        let active: Vec<_> = p.nav().into_iter().filter(|l| l.active).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].url.as_deref(), Some("/p/6"));
    }

    #[test]
    fn test_nav_edges() {
        let first = Pagination::new(1, 30, 10, "%d");
        assert_eq!(labels(&first), vec!["1", "2", "3", "»"]);

        let last = Pagination::new(3, 30, 10, "%d");
        assert_eq!(labels(&last), vec!["«", "1", "2", "3"]);
    }
}
