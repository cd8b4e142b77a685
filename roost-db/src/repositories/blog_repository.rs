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
use chrono::{DateTime, Utc};
use roost_core::models::blog::{BlogPost, PostStatus, Tag};
use roost_core::utils::create_slug;
use serde::Serialize;
use sqlx::SqlitePool;

use super::from_timestamp;
use crate::query::{QueryBuilder, Value};

#[derive(sqlx::FromRow)]
struct PostRow {
    id: i64,
    user_id: i64,
    title: String,
    slug: String,
    content: String,
    intro: Option<String>,
    cover_photo: Option<String>,
    status: i64,
    lang: String,
    markdown: i64,
    comments: i64,
    published_at: i64,
    updated_at: i64,
    created_at: i64,
}

impl From<PostRow> for BlogPost {
    fn from(row: PostRow) -> Self {
        BlogPost {
            id: Some(row.id),
            user_id: row.user_id,
            title: row.title,
            slug: row.slug,
            content: row.content,
            intro: row.intro,
            cover_photo: row.cover_photo,
            status: PostStatus::from_i64(row.status),
            lang: row.lang,
            markdown: row.markdown != 0,
            comments: row.comments != 0,
            published_at: from_timestamp(row.published_at),
            updated_at: from_timestamp(row.updated_at),
            created_at: from_timestamp(row.created_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct TagRow {
    id: i64,
    name: String,
    slug: String,
}

impl From<TagRow> for Tag {
    fn from(row: TagRow) -> Self {
        Tag {
            id: Some(row.id),
            name: row.name,
            slug: row.slug,
        }
    }
}

/// A tag and how many listed posts carry it.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct TagCount {
    pub name: String,
    pub slug: String,
    pub count: i64,
}

fn post_values(post: &BlogPost) -> Vec<(&'static str, Value)> {
    vec![
        ("user_id", post.user_id.into()),
        ("title", post.title.as_str().into()),
        ("slug", post.slug.as_str().into()),
        ("content", post.content.as_str().into()),
        ("intro", post.intro.clone().into()),
        ("cover_photo", post.cover_photo.clone().into()),
        ("status", post.status.as_i64().into()),
        ("lang", post.lang.as_str().into()),
        ("markdown", post.markdown.into()),
        ("comments", post.comments.into()),
        ("published_at", post.published_at.timestamp().into()),
        ("updated_at", post.updated_at.timestamp().into()),
        ("created_at", post.created_at.timestamp().into()),
    ]
}

/// Listed posts: published, already public, in one language.
fn listed(lang: &str, now: DateTime<Utc>) -> QueryBuilder {
    QueryBuilder::table("blog")
        .where_eq("blog.status", PostStatus::Published.as_i64())
        .where_op("blog.published_at", "<=", now.timestamp())
        .where_eq("blog.lang", lang)
}

fn listed_with_tag(lang: &str, now: DateTime<Utc>, tag_id: Option<i64>) -> QueryBuilder {
    match tag_id {
        Some(tag_id) => listed(lang, now)
            .select(&["blog.*"])
            .join("blog_tags_relationship", "blog_tags_relationship.blog_id = blog.id")
            .where_eq("blog_tags_relationship.tag_id", tag_id),
        None => listed(lang, now),
    }
}

pub struct BlogRepository {
    pool: SqlitePool,
}

impl BlogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, post: &BlogPost) -> Result<i64> {
        QueryBuilder::table("blog")
            .insert(&self.pool, &post_values(post))
            .await
    }

    pub async fn update(&self, post: &BlogPost) -> Result<()> {
        let id = post.id.ok_or_else(|| anyhow!("Cannot update a post without id"))?;
        QueryBuilder::table("blog")
            .where_eq("id", id)
            .update(&self.pool, &post_values(post))
            .await?;
        Ok(())
    }

    pub async fn set_cover(&self, id: i64, cover: Option<&str>) -> Result<()> {
        QueryBuilder::table("blog")
            .where_eq("id", id)
            .update(&self.pool, &[("cover_photo", cover.into())])
            .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<BlogPost>> {
        let row: Option<PostRow> = QueryBuilder::table("blog")
            .where_eq("id", id)
            .fetch_one_as(&self.pool)
            .await?;
        Ok(row.map(BlogPost::from))
    }

    /// Any post with that slug, drafts included.
    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<BlogPost>> {
        let row: Option<PostRow> = QueryBuilder::table("blog")
            .where_eq("slug", slug)
            .fetch_one_as(&self.pool)
            .await?;
        Ok(row.map(BlogPost::from))
    }

    /// Hidden and published posts whose publication date has passed.
    pub async fn find_visible_by_slug(&self, slug: &str, now: DateTime<Utc>) -> Result<Option<BlogPost>> {
        let row: Option<PostRow> = QueryBuilder::table("blog")
            .where_op("status", ">=", PostStatus::Hidden.as_i64())
            .where_op("published_at", "<=", now.timestamp())
            .where_eq("slug", slug)
            .fetch_one_as(&self.pool)
            .await?;
        Ok(row.map(BlogPost::from))
    }

    /// Listed posts, newest first, optionally narrowed to one tag.
    pub async fn list_published(
        &self,
        lang: &str,
        now: DateTime<Utc>,
        tag_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<BlogPost>> {
        let rows: Vec<PostRow> = listed_with_tag(lang, now, tag_id)
            .desc("blog.published_at")
            .limit(limit)
            .offset(offset)
            .fetch_as(&self.pool)
            .await?;
        Ok(rows.into_iter().map(BlogPost::from).collect())
    }

    pub async fn count_published(&self, lang: &str, now: DateTime<Utc>, tag_id: Option<i64>) -> Result<i64> {
        listed_with_tag(lang, now, tag_id).count(&self.pool).await
    }

    /// Listed posts in every language, for the sitemap.
    pub async fn all_published(&self, now: DateTime<Utc>) -> Result<Vec<BlogPost>> {
        let rows: Vec<PostRow> = QueryBuilder::table("blog")
            .where_eq("status", PostStatus::Published.as_i64())
            .where_op("published_at", "<=", now.timestamp())
            .desc("published_at")
            .fetch_as(&self.pool)
            .await?;
        Ok(rows.into_iter().map(BlogPost::from).collect())
    }

    /// Every post for the admin list, newest first.
    pub async fn list_all(&self, limit: i64, offset: i64) -> Result<Vec<BlogPost>> {
        let rows: Vec<PostRow> = QueryBuilder::table("blog")
            .desc("published_at")
            .desc("id")
            .limit(limit)
            .offset(offset)
            .fetch_as(&self.pool)
            .await?;
        Ok(rows.into_iter().map(BlogPost::from).collect())
    }

    pub async fn count(&self) -> Result<i64> {
        QueryBuilder::table("blog").count(&self.pool).await
    }

    pub async fn slug_taken(&self, slug: &str, except_id: Option<i64>) -> Result<bool> {
        let mut query = QueryBuilder::table("blog").where_eq("slug", slug);
        if let Some(id) = except_id {
            query = query.where_op("id", "!=", id);
        }
        Ok(query.count(&self.pool).await? > 0)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let deleted = QueryBuilder::table("blog")
            .where_eq("id", id)
            .delete(&self.pool)
            .await?;
        if deleted == 0 {
            return Err(anyhow!("Post {} not found", id));
        }
        QueryBuilder::table("blog_tags_relationship")
            .where_eq("blog_id", id)
            .delete(&self.pool)
            .await?;
        self.delete_orphan_tags().await
    }

    pub async fn tags_for_post(&self, post_id: i64) -> Result<Vec<Tag>> {
        let rows: Vec<TagRow> = QueryBuilder::table("blog_tags")
            .select(&["blog_tags.id", "blog_tags.name", "blog_tags.slug"])
            .join("blog_tags_relationship", "blog_tags.id = blog_tags_relationship.tag_id")
            .where_eq("blog_tags_relationship.blog_id", post_id)
            .asc("blog_tags.name")
            .fetch_as(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Tag::from).collect())
    }

    pub async fn find_tag_by_slug(&self, slug: &str) -> Result<Option<Tag>> {
        let row: Option<TagRow> = QueryBuilder::table("blog_tags")
            .where_eq("slug", slug)
            .fetch_one_as(&self.pool)
            .await?;
        Ok(row.map(Tag::from))
    }

    /// Replace the tags of a post. Tags are matched by slug and created on
    /// first use; tags left without posts are removed.
    pub async fn set_tags(&self, post_id: i64, names: &[String]) -> Result<()> {
        QueryBuilder::table("blog_tags_relationship")
            .where_eq("blog_id", post_id)
            .delete(&self.pool)
            .await?;

        for name in names {
            let slug = create_slug(name);
            let tag_id = match self.find_tag_by_slug(&slug).await? {
                Some(tag) => tag.id.unwrap_or_default(),
                None => {
                    QueryBuilder::table("blog_tags")
                        .insert(&self.pool, &[("name", name.as_str().into()), ("slug", slug.as_str().into())])
                        .await?
                }
            };
            sqlx::query("INSERT OR IGNORE INTO blog_tags_relationship (blog_id, tag_id) VALUES (?, ?)")
                .bind(post_id)
                .bind(tag_id)
                .execute(&self.pool)
                .await?;
        }
        self.delete_orphan_tags().await
    }

    async fn delete_orphan_tags(&self) -> Result<()> {
        sqlx::query(
            "DELETE FROM blog_tags WHERE id NOT IN (SELECT tag_id FROM blog_tags_relationship)",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Tags used by listed posts of a language, with post counts.
    pub async fn tag_cloud(&self, lang: &str, now: DateTime<Utc>) -> Result<Vec<TagCount>> {
        QueryBuilder::table("blog_tags")
            .select(&["blog_tags.name", "blog_tags.slug"])
            .select_count("blog_tags.name", "count")
            .join("blog_tags_relationship", "blog_tags.id = blog_tags_relationship.tag_id")
            .join("blog", "blog.id = blog_tags_relationship.blog_id")
            .where_eq("blog.status", PostStatus::Published.as_i64())
            .where_eq("blog.lang", lang)
            .where_op("blog.published_at", "<=", now.timestamp())
            .group("blog_tags.name")
            .group("blog_tags.slug")
            .asc("blog_tags.name")
            .fetch_as(&self.pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::installed_pool;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn post(slug: &str, status: PostStatus, published_at: DateTime<Utc>, lang: &str) -> BlogPost {
        let mut post = BlogPost::new(1, slug.to_uppercase(), slug.into(), "Body".into(), lang.into());
        post.status = status;
        post.published_at = published_at;
        post
    }

    #[tokio::test]
    async fn test_listing_respects_status_date_and_language() {
        let repo = BlogRepository::new(installed_pool().await);
        let now = Utc::now();
        repo.create(&post("old", PostStatus::Published, now - Duration::days(2), "en_english")).await.unwrap();
        repo.create(&post("new", PostStatus::Published, now - Duration::hours(1), "en_english")).await.unwrap();
        repo.create(&post("future", PostStatus::Published, now + Duration::days(1), "en_english")).await.unwrap();
        repo.create(&post("hidden", PostStatus::Hidden, now - Duration::days(1), "en_english")).await.unwrap();
        repo.create(&post("draft", PostStatus::Draft, now - Duration::days(1), "en_english")).await.unwrap();
        repo.create(&post("french", PostStatus::Published, now - Duration::days(1), "fr_french")).await.unwrap();

        let slugs: Vec<_> = repo
            .list_published("en_english", now, None, 10, 0)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.slug)
            .collect();
        assert_eq!(slugs, vec!["new", "old"]);
        assert_eq!(repo.count_published("en_english", now, None).await.unwrap(), 2);

        assert!(repo.find_visible_by_slug("hidden", now).await.unwrap().is_some());
        assert!(repo.find_visible_by_slug("draft", now).await.unwrap().is_none());
        assert!(repo.find_visible_by_slug("future", now).await.unwrap().is_none());
        assert!(repo.find_by_slug("draft").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_tags_and_tag_listing() {
        let repo = BlogRepository::new(installed_pool().await);
        let now = Utc::now();
        let first = repo.create(&post("one", PostStatus::Published, now - Duration::hours(2), "en_english")).await.unwrap();
        let second = repo.create(&post("two", PostStatus::Published, now - Duration::hours(1), "en_english")).await.unwrap();

        repo.set_tags(first, &["Rust".into(), "Speed Run".into()]).await.unwrap();
        repo.set_tags(second, &["rust".into()]).await.unwrap();

        let tag = repo.find_tag_by_slug("rust").await.unwrap().unwrap();
        assert_eq!(tag.name, "Rust");
        assert_eq!(repo.count_published("en_english", now, tag.id).await.unwrap(), 2);
        let tagged = repo.list_published("en_english", now, tag.id, 1, 0).await.unwrap();
        assert_eq!(tagged[0].slug, "two");

        let cloud = repo.tag_cloud("en_english", now).await.unwrap();
        assert_eq!(
            cloud,
            vec![
                TagCount { name: "Rust".into(), slug: "rust".into(), count: 2 },
                TagCount { name: "Speed Run".into(), slug: "speed-run".into(), count: 1 },
            ]
        );

        repo.set_tags(first, &["Rust".into()]).await.unwrap();
        assert!(repo.find_tag_by_slug("speed-run").await.unwrap().is_none());

        repo.delete(second).await.unwrap();
        let names: Vec<_> = repo.tags_for_post(first).await.unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["Rust"]);
    }
}
