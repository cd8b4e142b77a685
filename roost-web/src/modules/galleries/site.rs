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

use anyhow::Result;
use async_trait::async_trait;
use roost_db::repositories::GalleryRepository;
use std::collections::BTreeMap;
use tera::Context;

use super::{ItemView, MODULE, TAG};
use crate::core::{Core, Location};
use crate::modules::SiteModule;

const GLIGHTBOX_CSS: &str = "https://cdn.jsdelivr.net/npm/glightbox/dist/css/glightbox.min.css";
const GLIGHTBOX_JS: &str = "https://cdn.jsdelivr.net/gh/mcstudios/glightbox/dist/js/glightbox.min.js";

pub struct GalleriesSite;

#[async_trait]
impl SiteModule for GalleriesSite {
    fn name(&self) -> &'static str {
        MODULE
    }

    /// Render every non-empty gallery so content can embed it as
    /// `{$gallery.<slug>}`.
    async fn init(&self, core: &mut Core) -> Result<()> {
        let repo = GalleryRepository::new(core.db().clone());
        let mut rendered = BTreeMap::new();
        for gallery in repo.list().await? {
            let items: Vec<ItemView> = repo.items(&gallery, None, 0).await?.iter().map(ItemView::new).collect();
            if items.is_empty() {
                continue;
            }
            let mut ctx = Context::new();
            ctx.insert("gallery", &gallery);
            ctx.insert("items", &items);
            let html = core.draw(&core.theme_template("gallery.html"), ctx)?;
            rendered.insert(gallery.slug, html);
        }
        for (slug, html) in &rendered {
            core.set_tag(TAG, slug, html.clone());
        }
        core.assign(TAG, &rendered);

        core.add_css(GLIGHTBOX_CSS);
        core.add_css("/static/css/galleries.css");
        core.add_js(GLIGHTBOX_JS, Location::Footer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::test_core;
    use roost_core::models::gallery::ImageSet;

    #[tokio::test]
    async fn test_init_renders_non_empty_galleries() {
        let (mut core, _dirs) = test_core().await;
        let repo = GalleryRepository::new(core.db().clone());
        let id = repo.create("Shots", "shots").await.unwrap();
        repo.create("Empty", "empty").await.unwrap();
        let mut src = ImageSet::default();
        src.insert("lg", "a.png".to_string());
        src.insert("xs", "a-xs.png".to_string());
        repo.add_item(id, &src, Some("Start")).await.unwrap();

        GalleriesSite.init(&mut core).await.unwrap();
        let html = core.tag(TAG, "shots").unwrap();
        assert!(html.contains("/uploads/galleries/1/a-xs.png"));
        assert!(html.contains("/uploads/galleries/1/a.png"));
        assert!(core.tag(TAG, "empty").is_none());
        assert!(core.expand_tags("<p>{$gallery.shots}</p>").contains("Start"));
    }
}
