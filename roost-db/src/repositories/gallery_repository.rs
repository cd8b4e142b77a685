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

use anyhow::{anyhow, Context, Result};
use roost_core::models::gallery::{Gallery, GalleryItem, ImageSet, SortOrder};
use sqlx::SqlitePool;

use crate::query::QueryBuilder;

#[derive(sqlx::FromRow)]
struct GalleryRow {
    id: i64,
    name: String,
    slug: String,
    img_per_page: i64,
    sort: String,
}

impl From<GalleryRow> for Gallery {
    fn from(row: GalleryRow) -> Self {
        Gallery {
            id: Some(row.id),
            name: row.name,
            slug: row.slug,
            img_per_page: row.img_per_page,
            sort: SortOrder::parse(&row.sort),
        }
    }
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: i64,
    gallery: i64,
    src: String,
    title: Option<String>,
    desc: Option<String>,
}

impl TryFrom<ItemRow> for GalleryItem {
    type Error = anyhow::Error;

    fn try_from(row: ItemRow) -> Result<Self> {
        let src: ImageSet = serde_json::from_str(&row.src)
            .with_context(|| format!("Invalid image set for gallery item {}", row.id))?;
        Ok(GalleryItem {
            id: Some(row.id),
            gallery: row.gallery,
            src,
            title: row.title,
            desc: row.desc,
        })
    }
}

fn items_query(gallery: &Gallery) -> Result<QueryBuilder> {
    let id = gallery.id.ok_or_else(|| anyhow!("Gallery has no id"))?;
    let query = QueryBuilder::table("galleries_items").where_eq("gallery", id);
    Ok(match gallery.sort {
        SortOrder::Asc => query.asc("id"),
        SortOrder::Desc => query.desc("id"),
    })
}

pub struct GalleryRepository {
    pool: SqlitePool,
}

impl GalleryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, name: &str, slug: &str) -> Result<i64> {
        QueryBuilder::table("galleries")
            .insert(
                &self.pool,
                &[
                    ("name", name.into()),
                    ("slug", slug.into()),
                    ("img_per_page", 0i64.into()),
                    ("sort", SortOrder::Desc.as_str().into()),
                ],
            )
            .await
    }

    pub async fn update(&self, gallery: &Gallery) -> Result<()> {
        let id = gallery.id.ok_or_else(|| anyhow!("Cannot update a gallery without id"))?;
        QueryBuilder::table("galleries")
            .where_eq("id", id)
            .update(
                &self.pool,
                &[
                    ("name", gallery.name.as_str().into()),
                    ("slug", gallery.slug.as_str().into()),
                    ("img_per_page", gallery.img_per_page.into()),
                    ("sort", gallery.sort.as_str().into()),
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Gallery>> {
        let row: Option<GalleryRow> = QueryBuilder::table("galleries")
            .where_eq("id", id)
            .fetch_one_as(&self.pool)
            .await?;
        Ok(row.map(Gallery::from))
    }

    pub async fn slug_taken(&self, slug: &str) -> Result<bool> {
        Ok(QueryBuilder::table("galleries")
            .where_eq("slug", slug)
            .count(&self.pool)
            .await?
            > 0)
    }

    pub async fn list(&self) -> Result<Vec<Gallery>> {
        let rows: Vec<GalleryRow> = QueryBuilder::table("galleries")
            .asc("name")
            .fetch_as(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Gallery::from).collect())
    }

    /// Delete a gallery with its items.
    pub async fn delete(&self, id: i64) -> Result<()> {
        QueryBuilder::table("galleries_items")
            .where_eq("gallery", id)
            .delete(&self.pool)
            .await?;
        let deleted = QueryBuilder::table("galleries")
            .where_eq("id", id)
            .delete(&self.pool)
            .await?;
        if deleted == 0 {
            return Err(anyhow!("Gallery {} not found", id));
        }
        Ok(())
    }

    /// Items in the gallery's sort order. `limit` of `None` returns all.
    pub async fn items(&self, gallery: &Gallery, limit: Option<i64>, offset: i64) -> Result<Vec<GalleryItem>> {
        let mut query = items_query(gallery)?;
        if let Some(limit) = limit {
            query = query.limit(limit).offset(offset);
        }
        let rows: Vec<ItemRow> = query.fetch_as(&self.pool).await?;
        rows.into_iter().map(GalleryItem::try_from).collect()
    }

    pub async fn count_items(&self, gallery_id: i64) -> Result<i64> {
        QueryBuilder::table("galleries_items")
            .where_eq("gallery", gallery_id)
            .count(&self.pool)
            .await
    }

    pub async fn find_item(&self, id: i64) -> Result<Option<GalleryItem>> {
        let row: Option<ItemRow> = QueryBuilder::table("galleries_items")
            .where_eq("id", id)
            .fetch_one_as(&self.pool)
            .await?;
        row.map(GalleryItem::try_from).transpose()
    }

    pub async fn add_item(&self, gallery_id: i64, src: &ImageSet, title: Option<&str>) -> Result<i64> {
        let src = serde_json::to_string(src).context("Failed to encode image set")?;
        QueryBuilder::table("galleries_items")
            .insert(
                &self.pool,
                &[
                    ("gallery", gallery_id.into()),
                    ("src", src.into()),
                    ("title", title.into()),
                ],
            )
            .await
    }

    pub async fn update_item(&self, id: i64, title: Option<&str>, desc: Option<&str>) -> Result<bool> {
        let updated = QueryBuilder::table("galleries_items")
            .where_eq("id", id)
            .update(&self.pool, &[("title", title.into()), ("desc", desc.into())])
            .await?;
        Ok(updated > 0)
    }

    pub async fn delete_item(&self, id: i64) -> Result<()> {
        QueryBuilder::table("galleries_items")
            .where_eq("id", id)
            .delete(&self.pool)
            .await?;
        Ok(())
    }
}
