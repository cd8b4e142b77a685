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
pub enum PostStatus {
    #[default]
    Draft,
    /// Reachable by its slug but left out of listings and feeds.
    Hidden,
    Published,
}

impl PostStatus {
    pub fn from_i64(value: i64) -> Self {
        match value {
            1 => PostStatus::Hidden,
            2 => PostStatus::Published,
            _ => PostStatus::Draft,
        }
    }

    pub fn as_i64(self) -> i64 {
        match self {
            PostStatus::Draft => 0,
            PostStatus::Hidden => 1,
            PostStatus::Published => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlogPost {
    pub id: Option<i64>,
    pub user_id: i64,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub intro: Option<String>,
    pub cover_photo: Option<String>,
    pub status: PostStatus,
    pub lang: String,
    pub markdown: bool,
    pub comments: bool,
    pub published_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl BlogPost {
    pub fn new(user_id: i64, title: String, slug: String, content: String, lang: String) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            user_id,
            title,
            slug,
            content,
            intro: None,
            cover_photo: None,
            status: PostStatus::Draft,
            lang,
            markdown: false,
            comments: true,
            published_at: now,
            updated_at: now,
            created_at: now,
        }
    }

    /// Listed posts are published and their publication date has passed.
    pub fn is_listed(&self, now: DateTime<Utc>) -> bool {
        self.status == PostStatus::Published && self.published_at <= now
    }

    /// Reachable by slug for anonymous visitors.
    pub fn is_visible(&self, now: DateTime<Utc>) -> bool {
        self.status != PostStatus::Draft && self.published_at <= now
    }

    /// Text used in listings: the intro when one was written.
    pub fn teaser(&self) -> &str {
        match self.intro.as_deref() {
            Some(intro) if !intro.trim().is_empty() => intro,
            _ => &self.content,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    pub id: Option<i64>,
    pub name: String,
    pub slug: String,
}

/// Split the comma separated tag field of the post form.
pub fn parse_tag_list(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            tags.push(tag.to_string());
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn post() -> BlogPost {
        BlogPost::new(
            1,
            "Hello".to_string(),
            "hello".to_string(),
            "Body".to_string(),
            "en_english".to_string(),
        )
    }

    #[test]
    fn test_visibility_rules() {
        let now = Utc::now();
        let mut p = post();
        p.published_at = now - Duration::hours(1);
        assert!(!p.is_visible(now));

        p.status = PostStatus::Hidden;
        assert!(p.is_visible(now));
        assert!(!p.is_listed(now));

        p.status = PostStatus::Published;
        assert!(p.is_listed(now));

        p.published_at = now + Duration::hours(1);
        assert!(!p.is_listed(now));
        assert!(!p.is_visible(now));
    }

    #[test]
    fn test_teaser_prefers_intro() {
        let mut p = post();
        assert_eq!(p.teaser(), "Body");
        p.intro = Some("   ".to_string());
        assert_eq!(p.teaser(), "Body");
        p.intro = Some("Short".to_string());
        assert_eq!(p.teaser(), "Short");
    }

    #[test]
    fn test_parse_tag_list() {
        assert_eq!(
            parse_tag_list("rust, web,,Rust , cms"),
            vec!["rust".to_string(), "web".to_string(), "cms".to_string()]
        );
        assert!(parse_tag_list(" , ").is_empty());
    }

    #[test]
    fn test_status_codes() {
        for status in [PostStatus::Draft, PostStatus::Hidden, PostStatus::Published] {
            assert_eq!(PostStatus::from_i64(status.as_i64()), status);
        }
    }
}
