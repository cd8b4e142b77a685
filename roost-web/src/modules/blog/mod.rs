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

//! Blog posts with tags, covers, listings and an RSS feed.

pub mod admin;
pub mod site;

use anyhow::Result;
use roost_core::models::blog::{BlogPost, PostStatus};
use roost_db::repositories::{BlogRepository, UserRepository};
use serde::Serialize;

use crate::config::Config;
use crate::core::Core;
use crate::markdown::render_body;

pub const MODULE: &str = "blog";
const DEFAULT_COVER: &str = "/static/img/default-cover.svg";

#[derive(Debug, Clone, Serialize)]
pub struct TagLink {
    pub name: String,
    pub slug: String,
    pub url: String,
}

/// A post prepared for the theme templates.
#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub id: Option<i64>,
    pub title: String,
    pub slug: String,
    pub url: String,
    /// Rendered body: the full content on post pages, the teaser in lists.
    pub content: String,
    pub intro: Option<String>,
    pub cover: String,
    pub has_cover: bool,
    pub author: String,
    pub author_avatar: Option<String>,
    pub date: String,
    pub published_at: i64,
    pub status: PostStatus,
    pub lang: String,
    pub tags: Vec<TagLink>,
}

/// Base path of the blog on the site.
pub fn blog_slug(core: &Core) -> String {
    let slug = core.setting(MODULE, "slug");
    if slug.trim().is_empty() {
        MODULE.to_string()
    } else {
        slug.trim_matches('/').to_string()
    }
}

pub fn post_url(core: &Core, slug: &str) -> String {
    core.url(&format!("{}{}/post/{}", core.url_prefix(), blog_slug(core), slug))
}

pub fn tag_url(core: &Core, slug: &str) -> String {
    core.url(&format!("{}{}/tag/{}", core.url_prefix(), blog_slug(core), slug))
}

/// Cover of a post, or the configured default cover.
pub fn cover_url(core: &Core, post: &BlogPost) -> String {
    match post.cover_photo.as_deref() {
        Some(cover) if !cover.is_empty() => Config::upload_url(MODULE, cover),
        _ => default_cover(core),
    }
}

pub fn default_cover(core: &Core) -> String {
    let cover = core.setting(MODULE, "default_cover");
    if cover.is_empty() {
        DEFAULT_COVER.to_string()
    } else {
        Config::upload_url(MODULE, &cover)
    }
}

/// Build the template view of a post. `full` renders the whole content,
/// otherwise the intro stands in for it when there is one.
pub async fn post_view(core: &Core, post: &BlogPost, full: bool) -> Result<PostView> {
    let users = UserRepository::new(core.db().clone());
    let author = match users.find_by_id(post.user_id).await? {
        Some(user) => Some(user),
        None => users.first().await?,
    };
    let tags = BlogRepository::new(core.db().clone())
        .tags_for_post(post.id.unwrap_or_default())
        .await?
        .into_iter()
        .map(|tag| TagLink {
            url: tag_url(core, &tag.slug),
            name: tag.name,
            slug: tag.slug,
        })
        .collect();
    let body = if full { post.content.as_str() } else { post.teaser() };
    let dateformat = core.setting(MODULE, "dateformat");

    Ok(PostView {
        id: post.id,
        title: post.title.clone(),
        slug: post.slug.clone(),
        url: post_url(core, &post.slug),
        content: render_body(body, post.markdown),
        intro: post
            .intro
            .as_deref()
            .filter(|i| !i.trim().is_empty())
            .map(|i| render_body(i, post.markdown)),
        cover: cover_url(core, post),
        has_cover: post.cover_photo.as_deref().is_some_and(|c| !c.is_empty()),
        author: author
            .as_ref()
            .map(|u| u.display_name().to_string())
            .unwrap_or_default(),
        author_avatar: author
            .and_then(|u| u.avatar)
            .map(|a| Config::upload_url("users", &a)),
        date: core.format_date(post.published_at, &dateformat),
        published_at: post.published_at.timestamp(),
        status: post.status,
        lang: post.lang.clone(),
        tags,
    })
}
