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

//! Image galleries embedded in content through `{$gallery.<slug>}`.

pub mod admin;
pub mod site;

use roost_core::models::gallery::{GalleryItem, ImageSet};
use serde::Serialize;
use std::path::PathBuf;

use crate::config::Config;
use crate::core::Core;

pub const MODULE: &str = "galleries";
pub const TAG: &str = "gallery";

/// Directory holding one gallery's files.
pub fn gallery_dir(core: &Core, id: i64) -> PathBuf {
    core.uploads_dir(MODULE).join(id.to_string())
}

/// Public URLs of every rendition, `sm` always present.
pub fn image_urls(gallery_id: i64, src: &ImageSet) -> ImageSet {
    let mut urls = ImageSet::default();
    for (size, file) in &src.clone().with_small_fallback().0 {
        urls.insert(size, Config::upload_url(MODULE, &format!("{}/{}", gallery_id, file)));
    }
    urls
}

#[derive(Debug, Serialize)]
pub struct ItemView {
    pub id: i64,
    pub title: String,
    pub desc: String,
    pub src: ImageSet,
}

impl ItemView {
    pub fn new(item: &GalleryItem) -> Self {
        ItemView {
            id: item.id.unwrap_or_default(),
            title: item.title.clone().unwrap_or_default(),
            desc: item.desc.clone().unwrap_or_default(),
            src: image_urls(item.gallery, &item.src),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_image_urls_fill_small() {
        let mut src = ImageSet::default();
        src.insert("lg", "a.png".to_string());
        src.insert("xs", "a-xs.png".to_string());
        let urls = image_urls(3, &src);
        assert_eq!(urls.get("lg"), Some("/uploads/galleries/3/a.png"));
        assert_eq!(urls.get("sm"), Some("/uploads/galleries/3/a-xs.png"));
    }
}
