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
use std::collections::BTreeMap;

/// Thumbnail widths generated for every uploaded picture, widest first.
pub const GALLERY_THUMBS: [(&str, u32); 3] = [("md", 600), ("sm", 300), ("xs", 150)];

pub const GALLERY_ITEMS_PER_PAGE: i64 = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("desc") {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Gallery {
    pub id: Option<i64>,
    pub name: String,
    pub slug: String,
    pub img_per_page: i64,
    pub sort: SortOrder,
}

/// Size key (`lg`, `md`, `sm`, `xs`) to the stored path of that rendition.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ImageSet(pub BTreeMap<String, String>);

impl ImageSet {
    pub fn get(&self, size: &str) -> Option<&str> {
        self.0.get(size).map(String::as_str)
    }

    pub fn insert(&mut self, size: &str, path: String) {
        self.0.insert(size.to_string(), path);
    }

    /// Small rendition for grids: `sm`, then `xs`, then the original.
    pub fn small(&self) -> Option<&str> {
        self.get("sm").or_else(|| self.get("xs")).or_else(|| self.get("lg"))
    }

    /// Fill in `sm` so templates can always rely on it.
    pub fn with_small_fallback(mut self) -> Self {
        if self.get("sm").is_none() {
            if let Some(small) = self.small().map(str::to_string) {
                self.insert("sm", small);
            }
        }
        self
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.0.values().map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GalleryItem {
    pub id: Option<i64>,
    pub gallery: i64,
    pub src: ImageSet,
    pub title: Option<String>,
    pub desc: Option<String>,
}

/// Thumbnail sizes worth generating for an image of the given width.
pub fn thumbs_for_width(width: u32) -> Vec<(&'static str, u32)> {
    GALLERY_THUMBS
        .iter()
        .copied()
        .filter(|(_, target)| width > *target)
        .collect()
}

/// Parse sizes such as `8M`, `512K`, `2GB` or `1024` into bytes.
pub fn parse_byte_size(raw: &str) -> Option<u64> {
    let raw = raw.trim().to_uppercase();
    let digits_end = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let number: u64 = raw[..digits_end].parse().ok()?;
    let exponent = match raw[digits_end..].trim() {
        "" | "B" => 0,
        "K" | "KB" => 1,
        "M" | "MB" => 2,
        "G" | "GB" => 3,
        "T" | "TB" => 4,
        "P" | "PB" => 5,
        _ => return None,
    };
    number.checked_mul(1024u64.pow(exponent))
}

/// Human readable size using binary prefixes, rounded to a whole number.
pub fn format_byte_size(bytes: u64) -> String {
    const SUFFIXES: [&str; 5] = ["", "K", "M", "G", "T"];
    if bytes == 0 {
        return "0 ".to_string();
    }
    let base = (bytes as f64).ln() / 1024f64.ln();
    let index = (base.floor() as usize).min(SUFFIXES.len() - 1);
    let value = 1024f64.powf(base - index as f64).round();
    format!("{} {}", value, SUFFIXES[index])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_small_fallback() {
        let mut set = ImageSet::default();
        set.insert("lg", "uploads/galleries/1/a.jpg".to_string());
        assert_eq!(set.small(), Some("uploads/galleries/1/a.jpg"));

        set.insert("xs", "uploads/galleries/1/a-xs.jpg".to_string());
        let set = set.with_small_fallback();
        assert_eq!(set.get("sm"), Some("uploads/galleries/1/a-xs.jpg"));
    }

    #[test]
    fn test_image_set_json_shape() {
        let mut set = ImageSet::default();
        set.insert("lg", "a.jpg".to_string());
        set.insert("md", "a-md.jpg".to_string());
        assert_eq!(
            serde_json::to_string(&set).unwrap(),
            r#"{"lg":"a.jpg","md":"a-md.jpg"}"#
        );
    }

    #[test]
    fn test_thumbs_for_width() {
        assert!(thumbs_for_width(100).is_empty());
        assert_eq!(thumbs_for_width(300), vec![("xs", 150)]);
        assert_eq!(
            thumbs_for_width(1920),
            vec![("md", 600), ("sm", 300), ("xs", 150)]
        );
    }

    #[test]
    fn test_parse_byte_size() {
        assert_eq!(parse_byte_size("1024"), Some(1024));
        assert_eq!(parse_byte_size("8M"), Some(8 * 1024 * 1024));
        assert_eq!(parse_byte_size("2gb"), Some(2 * 1024 * 1024 * 1024));
        assert_eq!(parse_byte_size("12Q"), None);
        assert_eq!(parse_byte_size("M"), None);
    }

    #[test]
    fn test_format_byte_size() {
        assert_eq!(format_byte_size(8 * 1024 * 1024), "8 M");
        assert_eq!(format_byte_size(512), "512 ");
        assert_eq!(format_byte_size(2048), "2 K");
    }

    #[test]
    fn test_sort_order_parse() {
        assert_eq!(SortOrder::parse("desc"), SortOrder::Desc);
        assert_eq!(SortOrder::parse("anything"), SortOrder::Asc);
        assert_eq!(SortOrder::Desc.as_str(), "DESC");
    }
}
