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

use anyhow::{anyhow, Result};
use roost_core::models::page::Page;
use sqlx::SqlitePool;

use super::from_timestamp;
use crate::query::{QueryBuilder, Value};

#[derive(sqlx::FromRow)]
struct PageRow {
    id: i64,
    title: String,
    slug: String,
    desc: Option<String>,
    lang: String,
    template: String,
    date: i64,
    content: String,
    markdown: i64,
}

impl From<PageRow> for Page {
    fn from(row: PageRow) -> Self {
        Page {
            id: Some(row.id),
            title: row.title,
            slug: row.slug,
            desc: row.desc,
            lang: row.lang,
            template: row.template,
            date: from_timestamp(row.date),
            content: row.content,
            markdown: row.markdown != 0,
        }
    }
}

fn page_values(page: &Page) -> Vec<(&'static str, Value)> {
    vec![
        ("title", page.title.as_str().into()),
        ("slug", page.slug.as_str().into()),
        ("desc", page.desc.clone().into()),
        ("lang", page.lang.as_str().into()),
        ("template", page.template.as_str().into()),
        ("date", page.date.timestamp().into()),
        ("content", page.content.as_str().into()),
        ("markdown", page.markdown.into()),
    ]
}

pub struct PageRepository {
    pool: SqlitePool,
}

impl PageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, page: &Page) -> Result<i64> {
        QueryBuilder::table("pages")
            .insert(&self.pool, &page_values(page))
            .await
    }

    pub async fn update(&self, page: &Page) -> Result<()> {
        let id = page.id.ok_or_else(|| anyhow!("Cannot update a page without id"))?;
        QueryBuilder::table("pages")
            .where_eq("id", id)
            .update(&self.pool, &page_values(page))
            .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Page>> {
        let row: Option<PageRow> = QueryBuilder::table("pages")
            .where_eq("id", id)
            .fetch_one_as(&self.pool)
            .await?;
        Ok(row.map(Page::from))
    }

    pub async fn find_by_slug(&self, slug: &str, lang: &str) -> Result<Option<Page>> {
        let row: Option<PageRow> = QueryBuilder::table("pages")
            .where_eq("slug", slug)
            .where_eq("lang", lang)
            .fetch_one_as(&self.pool)
            .await?;
        Ok(row.map(Page::from))
    }

    /// Pages in a language ordered by title, every language when `None`.
    pub async fn list(&self, lang: Option<&str>) -> Result<Vec<Page>> {
        let mut query = QueryBuilder::table("pages");
        if let Some(lang) = lang {
            query = query.where_eq("lang", lang);
        }
        let rows: Vec<PageRow> = query.asc("title").fetch_as(&self.pool).await?;
        Ok(rows.into_iter().map(Page::from).collect())
    }

    pub async fn list_paginated(&self, lang: &str, limit: i64, offset: i64) -> Result<Vec<Page>> {
        let rows: Vec<PageRow> = QueryBuilder::table("pages")
            .where_eq("lang", lang)
            .desc("date")
            .limit(limit)
            .offset(offset)
            .fetch_as(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Page::from).collect())
    }

    pub async fn count(&self, lang: Option<&str>) -> Result<i64> {
        let mut query = QueryBuilder::table("pages");
        if let Some(lang) = lang {
            query = query.where_eq("lang", lang);
        }
        query.count(&self.pool).await
    }

    /// Every language variant sharing `slug`.
    pub async fn translations(&self, slug: &str) -> Result<Vec<Page>> {
        let rows: Vec<PageRow> = QueryBuilder::table("pages")
            .where_eq("slug", slug)
            .asc("lang")
            .fetch_as(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Page::from).collect())
    }

    pub async fn slug_taken(&self, slug: &str, lang: &str, except_id: Option<i64>) -> Result<bool> {
        let mut query = QueryBuilder::table("pages")
            .where_eq("slug", slug)
            .where_eq("lang", lang);
        if let Some(id) = except_id {
            query = query.where_op("id", "!=", id);
        }
        Ok(query.count(&self.pool).await? > 0)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let deleted = QueryBuilder::table("pages")
            .where_eq("id", id)
            .delete(&self.pool)
            .await?;
        if deleted == 0 {
            return Err(anyhow!("Page {} not found", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::installed_pool;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_page_crud_and_slug_per_language() {
        let repo = PageRepository::new(installed_pool().await);
        let mut page = Page::new("About".into(), "about".into(), "en_english".into());
        page.desc = Some("Who we are".into());
        let id = repo.create(&page).await.unwrap();

        let mut stored = repo.find_by_slug("about", "en_english").await.unwrap().unwrap();
        assert_eq!(stored.id, Some(id));
        assert_eq!(stored.desc.as_deref(), Some("Who we are"));

        assert!(repo.slug_taken("about", "en_english", None).await.unwrap());
        assert!(!repo.slug_taken("about", "en_english", Some(id)).await.unwrap());
        assert!(!repo.slug_taken("about", "fr_french", None).await.unwrap());

        stored.content = "<p>Hello</p>".into();
        repo.update(&stored).await.unwrap();
        assert_eq!(repo.find_by_id(id).await.unwrap().unwrap().content, "<p>Hello</p>");

        repo.delete(id).await.unwrap();
        assert!(repo.find_by_id(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fresh_install_has_error_page() {
        let repo = PageRepository::new(installed_pool().await);
        let page = repo.find_by_slug("404", "en_english").await.unwrap().unwrap();
        assert!(page.is_error_page());
        assert_eq!(repo.count(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_translations_share_slug() {
        let repo = PageRepository::new(installed_pool().await);
        for lang in ["en_english", "fr_french"] {
            repo.create(&Page::new("Contact".into(), "contact".into(), lang.into()))
                .await
                .unwrap();
        }
        let langs: Vec<_> = repo
            .translations("contact")
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.lang)
            .collect();
        assert_eq!(langs, vec!["en_english", "fr_french"]);
    }
}
