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
use roost_core::models::snippet::{LocalizedContent, Snippet};
use sqlx::SqlitePool;

use crate::query::{QueryBuilder, Value};

#[derive(sqlx::FromRow)]
struct SnippetRow {
    id: i64,
    name: String,
    slug: String,
    content: String,
}

impl From<SnippetRow> for Snippet {
    fn from(row: SnippetRow) -> Self {
        Snippet {
            id: Some(row.id),
            name: row.name,
            slug: row.slug,
            content: LocalizedContent::parse(&row.content),
        }
    }
}

fn snippet_values(snippet: &Snippet) -> Vec<(&'static str, Value)> {
    vec![
        ("name", snippet.name.as_str().into()),
        ("slug", snippet.slug.as_str().into()),
        ("content", snippet.content.serialize().into()),
    ]
}

pub struct SnippetRepository {
    pool: SqlitePool,
}

impl SnippetRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, snippet: &Snippet) -> Result<i64> {
        QueryBuilder::table("snippets")
            .insert(&self.pool, &snippet_values(snippet))
            .await
    }

    pub async fn update(&self, snippet: &Snippet) -> Result<()> {
        let id = snippet.id.ok_or_else(|| anyhow!("Cannot update a snippet without id"))?;
        QueryBuilder::table("snippets")
            .where_eq("id", id)
            .update(&self.pool, &snippet_values(snippet))
            .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Snippet>> {
        let row: Option<SnippetRow> = QueryBuilder::table("snippets")
            .where_eq("id", id)
            .fetch_one_as(&self.pool)
            .await?;
        Ok(row.map(Snippet::from))
    }

    pub async fn list(&self) -> Result<Vec<Snippet>> {
        let rows: Vec<SnippetRow> = QueryBuilder::table("snippets")
            .asc("name")
            .fetch_as(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Snippet::from).collect())
    }

    pub async fn slug_taken(&self, slug: &str, except_id: Option<i64>) -> Result<bool> {
        let mut query = QueryBuilder::table("snippets").where_eq("slug", slug);
        if let Some(id) = except_id {
            query = query.where_op("id", "!=", id);
        }
        Ok(query.count(&self.pool).await? > 0)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        QueryBuilder::table("snippets")
            .where_eq("id", id)
            .delete(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::installed_pool;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_snippet_languages_are_stored() {
        let repo = SnippetRepository::new(installed_pool().await);
        let mut content = LocalizedContent::default();
        content.set("en_english", "Hello".into());
        content.set("fr_french", "Bonjour".into());
        let id = repo
            .create(&Snippet {
                id: None,
                name: "Greeting".into(),
                slug: "greeting".into(),
                content,
            })
            .await
            .unwrap();

        let stored = repo.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.content.for_lang("fr_french"), "Bonjour");
        assert_eq!(stored.content.for_lang("de_german"), "Hello");
        assert!(repo.slug_taken("greeting", None).await.unwrap());
        assert!(!repo.slug_taken("greeting", Some(id)).await.unwrap());

        repo.delete(id).await.unwrap();
        assert!(repo.list().await.unwrap().is_empty());
    }
}
