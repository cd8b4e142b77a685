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
use chrono::Utc;
use roost_core::models::pagelist::{plan_link_move, MoveDirection, Pagelist, PagelistLink};
use serde::Serialize;
use sqlx::SqlitePool;

use super::from_timestamp;
use crate::query::{QueryBuilder, Value};

#[derive(sqlx::FromRow)]
struct PagelistRow {
    id: i64,
    title: String,
    description: Option<String>,
    content: Option<String>,
    lang: String,
    markdown: i64,
    template: String,
    slug: String,
    updated_at: i64,
}

impl From<PagelistRow> for Pagelist {
    fn from(row: PagelistRow) -> Self {
        Pagelist {
            id: Some(row.id),
            title: row.title,
            description: row.description,
            content: row.content,
            lang: row.lang,
            markdown: row.markdown != 0,
            template: row.template,
            slug: row.slug,
            updated_at: from_timestamp(row.updated_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct LinkRow {
    pagelist: i64,
    page: i64,
    picture: Option<String>,
    position: i64,
    title: Option<String>,
    slug: Option<String>,
    desc: Option<String>,
    lang: Option<String>,
}

/// A link with the page it points at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkedPage {
    pub link: PagelistLink,
    pub title: String,
    pub slug: String,
    pub desc: Option<String>,
    pub lang: String,
}

impl From<LinkRow> for LinkedPage {
    fn from(row: LinkRow) -> Self {
        LinkedPage {
            link: PagelistLink {
                pagelist: row.pagelist,
                page: row.page,
                picture: row.picture,
                position: row.position,
            },
            title: row.title.unwrap_or_default(),
            slug: row.slug.unwrap_or_default(),
            desc: row.desc,
            lang: row.lang.unwrap_or_default(),
        }
    }
}

fn pagelist_values(list: &Pagelist) -> Vec<(&'static str, Value)> {
    vec![
        ("title", list.title.as_str().into()),
        ("description", list.description.clone().into()),
        ("content", list.content.clone().into()),
        ("lang", list.lang.as_str().into()),
        ("markdown", list.markdown.into()),
        ("template", list.template.as_str().into()),
        ("slug", list.slug.as_str().into()),
        ("updated_at", Utc::now().timestamp().into()),
    ]
}

pub struct PagelistRepository {
    pool: SqlitePool,
}

impl PagelistRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, list: &Pagelist) -> Result<i64> {
        QueryBuilder::table("pagelist")
            .insert(&self.pool, &pagelist_values(list))
            .await
    }

    pub async fn update(&self, list: &Pagelist) -> Result<()> {
        let id = list.id.ok_or_else(|| anyhow!("Cannot update a page list without id"))?;
        QueryBuilder::table("pagelist")
            .where_eq("id", id)
            .update(&self.pool, &pagelist_values(list))
            .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Pagelist>> {
        let row: Option<PagelistRow> = QueryBuilder::table("pagelist")
            .where_eq("id", id)
            .fetch_one_as(&self.pool)
            .await?;
        Ok(row.map(Pagelist::from))
    }

    pub async fn find_by_slug(&self, slug: &str, lang: &str) -> Result<Option<Pagelist>> {
        let row: Option<PagelistRow> = QueryBuilder::table("pagelist")
            .where_eq("slug", slug)
            .where_eq("lang", lang)
            .fetch_one_as(&self.pool)
            .await?;
        Ok(row.map(Pagelist::from))
    }

    pub async fn list(&self, lang: Option<&str>) -> Result<Vec<Pagelist>> {
        let mut query = QueryBuilder::table("pagelist");
        if let Some(lang) = lang {
            query = query.where_eq("lang", lang);
        }
        let rows: Vec<PagelistRow> = query.asc("title").fetch_as(&self.pool).await?;
        Ok(rows.into_iter().map(Pagelist::from).collect())
    }

    pub async fn slug_taken(&self, slug: &str, lang: &str, except_id: Option<i64>) -> Result<bool> {
        let mut query = QueryBuilder::table("pagelist")
            .where_eq("slug", slug)
            .where_eq("lang", lang);
        if let Some(id) = except_id {
            query = query.where_op("id", "!=", id);
        }
        Ok(query.count(&self.pool).await? > 0)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        QueryBuilder::table("pagelist_pages")
            .where_eq("pagelist", id)
            .delete(&self.pool)
            .await?;
        let deleted = QueryBuilder::table("pagelist")
            .where_eq("id", id)
            .delete(&self.pool)
            .await?;
        if deleted == 0 {
            return Err(anyhow!("Page list {} not found", id));
        }
        Ok(())
    }

    /// Links of a list by position, with their page details.
    pub async fn links(&self, pagelist: i64) -> Result<Vec<LinkedPage>> {
        let rows: Vec<LinkRow> = QueryBuilder::table("pagelist_pages")
            .select(&[
                "pagelist_pages.*",
                "pages.title",
                "pages.slug",
                "pages.desc",
                "pages.lang",
            ])
            .left_join("pages", "pages.id = pagelist_pages.page")
            .where_eq("pagelist_pages.pagelist", pagelist)
            .asc("pagelist_pages.position")
            .fetch_as(&self.pool)
            .await?;
        Ok(rows.into_iter().map(LinkedPage::from).collect())
    }

    async fn plain_links(&self, pagelist: i64) -> Result<Vec<PagelistLink>> {
        Ok(self.links(pagelist).await?.into_iter().map(|l| l.link).collect())
    }

    pub async fn find_link(&self, pagelist: i64, page: i64) -> Result<Option<LinkedPage>> {
        Ok(self
            .links(pagelist)
            .await?
            .into_iter()
            .find(|l| l.link.page == page))
    }

    /// Link a page to the list. An existing link only gets its picture
    /// replaced; a new one goes last.
    pub async fn save_link(&self, pagelist: i64, page: i64, picture: Option<&str>) -> Result<()> {
        let existing = QueryBuilder::table("pagelist_pages")
            .where_eq("pagelist", pagelist)
            .where_eq("page", page);
        if existing.count(&self.pool).await? > 0 {
            if picture.is_some() {
                existing.update(&self.pool, &[("picture", picture.into())]).await?;
            }
            return Ok(());
        }
        let position = QueryBuilder::table("pagelist_pages")
            .where_eq("pagelist", pagelist)
            .count(&self.pool)
            .await?;
        QueryBuilder::table("pagelist_pages")
            .insert(
                &self.pool,
                &[
                    ("pagelist", pagelist.into()),
                    ("page", page.into()),
                    ("picture", picture.into()),
                    ("position", position.into()),
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn clear_link_picture(&self, pagelist: i64, page: i64) -> Result<()> {
        QueryBuilder::table("pagelist_pages")
            .where_eq("pagelist", pagelist)
            .where_eq("page", page)
            .update(&self.pool, &[("picture", Value::Null)])
            .await?;
        Ok(())
    }

    /// Swap a link with its neighbour. Returns `false` at the list edges.
    pub async fn move_link(&self, pagelist: i64, page: i64, direction: MoveDirection) -> Result<bool> {
        let links = self.plain_links(pagelist).await?;
        let Some(updates) = plan_link_move(&links, page, direction) else {
            return Ok(false);
        };
        for (page, position) in updates {
            QueryBuilder::table("pagelist_pages")
                .where_eq("pagelist", pagelist)
                .where_eq("page", page)
                .update(&self.pool, &[("position", position.into())])
                .await?;
        }
        Ok(true)
    }

    /// Remove a link and close the gap it leaves.
    pub async fn delete_link(&self, pagelist: i64, page: i64) -> Result<Option<PagelistLink>> {
        let links = self.plain_links(pagelist).await?;
        let Some(removed) = links.iter().find(|l| l.page == page).cloned() else {
            return Ok(None);
        };
        QueryBuilder::table("pagelist_pages")
            .where_eq("pagelist", pagelist)
            .where_eq("page", page)
            .delete(&self.pool)
            .await?;
        for (position, link) in links.iter().filter(|l| l.page != page).enumerate() {
            if link.position != position as i64 {
                QueryBuilder::table("pagelist_pages")
                    .where_eq("pagelist", pagelist)
                    .where_eq("page", link.page)
                    .update(&self.pool, &[("position", (position as i64).into())])
                    .await?;
            }
        }
        Ok(Some(removed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::PageRepository;
    use crate::test_support::installed_pool;
    use pretty_assertions::assert_eq;
    use roost_core::models::page::Page;

    async fn setup() -> (PagelistRepository, i64, Vec<i64>) {
        let pool = installed_pool().await;
        let pages = PageRepository::new(pool.clone());
        let mut ids = Vec::new();
        for slug in ["one", "two", "three"] {
            ids.push(pages.create(&Page::new(slug.into(), slug.into(), "en_english".into())).await.unwrap());
        }
        let repo = PagelistRepository::new(pool);
        let list = Pagelist {
            id: None,
            title: "Projects".into(),
            description: None,
            content: None,
            lang: "en_english".into(),
            markdown: false,
            template: "index.html".into(),
            slug: "projects".into(),
            updated_at: Utc::now(),
        };
        let list_id = repo.create(&list).await.unwrap();
        for id in &ids {
            repo.save_link(list_id, *id, None).await.unwrap();
        }
        (repo, list_id, ids)
    }

    fn order(links: &[LinkedPage]) -> Vec<&str> {
        links.iter().map(|l| l.slug.as_str()).collect()
    }

    #[tokio::test]
    async fn test_links_keep_insert_order_and_picture_updates() {
        let (repo, list, ids) = setup().await;
        assert_eq!(order(&repo.links(list).await.unwrap()), vec!["one", "two", "three"]);

        repo.save_link(list, ids[0], Some("one.png")).await.unwrap();
        let links = repo.links(list).await.unwrap();
        assert_eq!(links.len(), 3);
        assert_eq!(links[0].link.picture.as_deref(), Some("one.png"));
        assert_eq!(links[0].link.position, 0);
    }

    #[tokio::test]
    async fn test_move_and_delete_links() {
        let (repo, list, ids) = setup().await;
        assert!(repo.move_link(list, ids[2], MoveDirection::Up).await.unwrap());
        assert_eq!(order(&repo.links(list).await.unwrap()), vec!["one", "three", "two"]);
        assert!(!repo.move_link(list, ids[0], MoveDirection::Up).await.unwrap());

        repo.delete_link(list, ids[0]).await.unwrap();
        let links = repo.links(list).await.unwrap();
        assert_eq!(order(&links), vec!["three", "two"]);
        assert_eq!(links.iter().map(|l| l.link.position).collect::<Vec<_>>(), vec![0, 1]);
        assert!(repo.delete_link(list, ids[0]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_slug_unique_per_language() {
        let (repo, list, _) = setup().await;
        assert!(repo.slug_taken("projects", "en_english", None).await.unwrap());
        assert!(!repo.slug_taken("projects", "en_english", Some(list)).await.unwrap());
        assert!(!repo.slug_taken("projects", "fr_french", None).await.unwrap());
        assert!(repo.find_by_slug("projects", "en_english").await.unwrap().is_some());
    }
}
