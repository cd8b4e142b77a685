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

/// A static page, addressable by slug within its language.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page {
    pub id: Option<i64>,
    pub title: String,
    pub slug: String,
    pub desc: Option<String>,
    pub lang: String,
    pub template: String,
    pub date: DateTime<Utc>,
    pub content: String,
    pub markdown: bool,
}

impl Page {
    pub fn new(title: String, slug: String, lang: String) -> Self {
        Self {
            id: None,
            title,
            slug,
            desc: None,
            lang,
            template: "index.html".to_string(),
            date: Utc::now(),
            content: String::new(),
            markdown: false,
        }
    }

    /// Error pages are kept out of sitemaps.
    pub fn is_error_page(&self) -> bool {
        self.slug.contains("404")
    }
}
