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
use html_escape::encode_double_quoted_attribute as attr;
use roost_core::models::blog::PostStatus;
use roost_core::router::path_segment;
use roost_core::utils::text::{meta_description, strip_braces, strip_tags};
use roost_core::Pagination;
use roost_db::repositories::BlogRepository;
use serde::Serialize;
use tera::Context;

use super::{blog_slug, post_view, tag_url, MODULE};
use crate::core::{Core, Location};
use crate::form::FormData;
use crate::modules::{Output, SiteModule, SiteRoute};

const FEED_SIZE: i64 = 5;

#[derive(Debug, Serialize)]
struct LatestPost {
    title: String,
    slug: String,
    url: String,
    author: String,
}

#[derive(Debug, Serialize)]
struct TagCloudEntry {
    name: String,
    slug: String,
    url: String,
    count: i64,
}

#[derive(Debug, Serialize)]
struct FeedItem {
    title: String,
    link: String,
    description: String,
    pub_date: String,
    categories: Vec<String>,
}

pub struct BlogSite;

impl BlogSite {
    fn repo(core: &Core) -> BlogRepository {
        BlogRepository::new(core.db().clone())
    }

    /// A post opened in another language switches the page to it.
    async fn follow_post_language(&self, core: &mut Core) -> Result<()> {
        let slug = blog_slug(core);
        if path_segment(&core.path, 0) != Some(slug.as_str())
            || path_segment(&core.path, 1) != Some("post")
        {
            return Ok(());
        }
        let Some(post_slug) = path_segment(&core.path, 2) else {
            return Ok(());
        };
        let post = Self::repo(core)
            .find_visible_by_slug(post_slug, core.now())
            .await?;
        if let Some(post) = post {
            if post.lang != core.lang_code && core.state.lang.is_active(&post.lang) {
                tracing::debug!("Switching to {} for post {}", post.lang, post.slug);
                core.set_language(&post.lang);
            }
        }
        Ok(())
    }

    async fn listing(&self, core: &mut Core, tag_slug: Option<&str>, page: i64) -> Result<Output> {
        let repo = Self::repo(core);
        let tag = match tag_slug {
            Some(slug) => match repo.find_tag_by_slug(slug).await? {
                Some(tag) => Some(tag),
                None => return Ok(Output::NotFound),
            },
            None => None,
        };
        let tag_id = tag.as_ref().and_then(|t| t.id);
        let lang = core.lang_code.clone();
        let now = core.now();

        let per_page = core.setting_i64(MODULE, "perpage", 5).max(1);
        let count = repo.count_published(&lang, now, tag_id).await?;
        let base = match &tag {
            Some(tag) => tag_url(core, &tag.slug),
            None => core.url(&format!("{}{}", core.url_prefix(), blog_slug(core))),
        };
        let pagination = Pagination::new(page, count, per_page, format!("{}/%d", base));

        let mut posts = Vec::new();
        for post in repo
            .list_published(&lang, now, tag_id, per_page, pagination.offset())
            .await?
        {
            posts.push(post_view(core, &post, false).await?);
        }

        let current = pagination.current();
        let prev = (current > 1).then(|| pagination.url_for(current - 1));
        let next = (current < pagination.pages()).then(|| pagination.url_for(current + 1));

        let title = match &tag {
            Some(tag) => format!("#{}", tag.name),
            None => core.setting(MODULE, "title"),
        };
        core.assign("page_title", &title);
        core.assign("page_desc", &core.setting(MODULE, "desc"));
        core.assign("posts", &posts);
        core.assign("tag", &tag);
        core.assign("prev_page", &prev);
        core.assign("next_page", &next);
        core.assign("pagination", &pagination.nav());
        self.add_feed_link(core);
        Ok(Output::Page("blog.html".to_string()))
    }

    async fn post(&self, core: &mut Core, slug: &str) -> Result<Output> {
        let repo = Self::repo(core);
        let now = core.now();
        let post = if core.user.is_some() {
            repo.find_by_slug(slug).await?
        } else {
            repo.find_visible_by_slug(slug, now).await?
        };
        let Some(post) = post else {
            return Ok(Output::NotFound);
        };

        let view = post_view(core, &post, true).await?;
        let mut warnings = Vec::new();
        if core.user.is_some() {
            if post.published_at > now {
                warnings.push(core.lang_text(MODULE, "post_time"));
            }
            if post.status == PostStatus::Draft {
                warnings.push(core.lang_text(MODULE, "post_draft"));
            }
        }

        let desc = meta_description(&view.content);
        let url = core.absolute_url(&view.url);
        self.add_feed_link(core);
        core.append(
            format!(
                concat!(
                    "<meta property=\"og:url\" content=\"{}\" />\n",
                    "<meta property=\"og:type\" content=\"article\" />\n",
                    "<meta property=\"og:title\" content=\"{}\" />\n",
                    "<meta property=\"og:description\" content=\"{}\" />"
                ),
                attr(&url),
                attr(&view.title),
                attr(&desc)
            ),
            Location::Header,
        );
        if view.has_cover {
            let image = core.absolute_url(&view.cover);
            core.append(
                format!("<meta property=\"og:image\" content=\"{}\" />", attr(&image)),
                Location::Header,
            );
        }

        core.assign("page_title", &view.title);
        core.assign("page_desc", &desc);
        core.assign("post", &view);
        core.assign("warnings", &warnings);
        Ok(Output::Page("post.html".to_string()))
    }

    fn add_feed_link(&self, core: &mut Core) {
        let feed = core.absolute_url(&format!("{}/feed/{}", blog_slug(core), core.lang_code));
        core.append(
            format!(
                "<link rel=\"alternate\" type=\"application/rss+xml\" title=\"RSS\" href=\"{}\" />",
                attr(&feed)
            ),
            Location::Header,
        );
    }

    async fn feed(&self, core: &mut Core, lang: &str) -> Result<Output> {
        let lang = if core.state.lang.is_active(lang) {
            lang.to_string()
        } else if let Some(code) = core.state.lang.code_for_prefix(lang) {
            code
        } else {
            return Ok(Output::NotFound);
        };
        if lang != core.lang_code {
            core.set_language(&lang);
        }

        let posts = Self::repo(core)
            .list_published(&lang, core.now(), None, FEED_SIZE, 0)
            .await?;
        let mut items = Vec::new();
        for post in &posts {
            let view = post_view(core, post, false).await?;
            items.push(FeedItem {
                link: core.absolute_url(&view.url),
                description: strip_braces(&strip_tags(&view.content)).trim().to_string(),
                pub_date: post.published_at.to_rfc2822(),
                categories: view.tags.into_iter().map(|t| t.name).collect(),
                title: view.title,
            });
        }

        let mut ctx = Context::new();
        ctx.insert("feed_title", &core.setting(MODULE, "title"));
        ctx.insert("feed_desc", &core.setting(MODULE, "desc"));
        ctx.insert(
            "feed_link",
            &core.absolute_url(&format!("{}{}", core.url_prefix(), blog_slug(core))),
        );
        ctx.insert("items", &items);
        let body = core.draw("modules/blog/feed.xml", ctx)?;
        Ok(Output::Raw {
            content_type: "application/xml; charset=utf-8",
            body: body.into_bytes(),
            filename: None,
        })
    }
}

#[async_trait]
impl SiteModule for BlogSite {
    fn name(&self) -> &'static str {
        MODULE
    }

    async fn init(&self, core: &mut Core) -> Result<()> {
        self.follow_post_language(core).await?;
        core.add_css("/static/css/blog.css");

        let repo = Self::repo(core);
        let lang = core.lang_code.clone();
        let now = core.now();
        let limit = core.setting_i64(MODULE, "latestPostsCount", 5).max(0);

        let mut latest = Vec::new();
        for post in repo.list_published(&lang, now, None, limit, 0).await? {
            let view = post_view(core, &post, false).await?;
            latest.push(LatestPost {
                title: view.title,
                slug: view.slug,
                url: view.url,
                author: view.author,
            });
        }
        let tags: Vec<TagCloudEntry> = repo
            .tag_cloud(&lang, now)
            .await?
            .into_iter()
            .map(|t| TagCloudEntry {
                url: tag_url(core, &t.slug),
                name: t.name,
                slug: t.slug,
                count: t.count,
            })
            .collect();

        core.assign("blog_base_slug", &blog_slug(core));
        core.assign("latest_posts", &latest);
        core.assign("all_tags", &tags);
        Ok(())
    }

    fn routes(&self, core: &mut Core) -> Result<()> {
        let slug = blog_slug(core);
        let routes = [
            (slug.clone(), "index"),
            (format!("{}/(:int)", slug), "index"),
            (format!("{}/post/(:str)", slug), "post"),
            (format!("{}/tag/(:str)", slug), "tag"),
            (format!("{}/tag/(:str)/(:int)", slug), "tag"),
            (format!("{}/feed/(:str)", slug), "feed"),
        ];
        for (pattern, action) in routes {
            core.router.route(&pattern, SiteRoute::new(MODULE, action))?;
        }
        Ok(())
    }

    async fn handle(
        &self,
        core: &mut Core,
        action: &'static str,
        params: Vec<String>,
        _form: &FormData,
    ) -> Result<Output> {
        let page = |n: usize| {
            params
                .get(n)
                .and_then(|p| p.parse::<i64>().ok())
                .unwrap_or(1)
                .max(1)
        };
        match action {
            "index" => self.listing(core, None, page(0)).await,
            "tag" => {
                let slug = params.first().cloned().unwrap_or_default();
                self.listing(core, Some(&slug), page(1)).await
            }
            "post" => {
                let slug = params.first().cloned().unwrap_or_default();
                self.post(core, &slug).await
            }
            "feed" => {
                let lang = params.first().cloned().unwrap_or_default();
                self.feed(core, &lang).await
            }
            _ => Ok(Output::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{admin_core, create_test_user, test_core};
    use chrono::{Duration, Utc};
    use pretty_assertions::assert_eq;
    use roost_core::models::blog::BlogPost;

    async fn add_post(core: &Core, slug: &str, status: PostStatus, offset: Duration) -> i64 {
        let user = match roost_db::repositories::UserRepository::new(core.db().clone())
            .first()
            .await
            .unwrap()
        {
            Some(user) => user,
            None => create_test_user(core.db(), "author", "secret1").await,
        };
        let mut post = BlogPost::new(
            user.id.unwrap(),
            format!("Post {}", slug),
            slug.to_string(),
            format!("<p>Body of {} {{$snippet.x}}</p>", slug),
            "en_english".to_string(),
        );
        post.status = status;
        post.published_at = Utc::now() + offset;
        let repo = BlogRepository::new(core.db().clone());
        let id = repo.create(&post).await.unwrap();
        repo.set_tags(id, &["Rust".to_string()]).await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_routes_follow_slug_setting() {
        let (mut core, _dirs) = test_core().await;
        core.settings.set_field(MODULE, "slug", "news").await.unwrap();
        BlogSite.routes(&mut core).unwrap();
        let matched = core.router.dispatch("news/post/hello").unwrap();
        assert_eq!(*matched.target, SiteRoute::new(MODULE, "post"));
        assert_eq!(matched.params, vec!["hello".to_string()]);
        let matched = core.router.dispatch("news/tag/rust/2").unwrap();
        assert_eq!(matched.params, vec!["rust".to_string(), "2".to_string()]);
        assert!(core.router.dispatch("blog").is_none());
    }

    #[tokio::test]
    async fn test_listing_paginates_published_posts() {
        let (mut core, _dirs) = test_core().await;
        core.settings.set_field(MODULE, "perpage", "2").await.unwrap();
        for i in 0..3 {
            add_post(&core, &format!("p{}", i), PostStatus::Published, Duration::minutes(-10 - i)).await;
        }
        add_post(&core, "draft", PostStatus::Draft, Duration::minutes(-1)).await;
        add_post(&core, "later", PostStatus::Published, Duration::days(1)).await;

        let out = BlogSite.handle(&mut core, "index", vec![], &FormData::default()).await.unwrap();
        assert!(matches!(out, Output::Page(ref t) if t == "blog.html"));
        let ctx = core.base_context();
        let posts = ctx.get("posts").unwrap().as_array().unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0]["slug"], "p0");
        assert_eq!(ctx.get("next_page").unwrap().as_str(), Some("/blog/2"));
        assert!(ctx.get("prev_page").unwrap().is_null());
    }

    #[tokio::test]
    async fn test_last_page_has_no_next() {
        let (mut core, _dirs) = test_core().await;
        core.settings.set_field(MODULE, "perpage", "2").await.unwrap();
        for i in 0..4 {
            add_post(&core, &format!("p{}", i), PostStatus::Published, Duration::minutes(-10 - i)).await;
        }
        BlogSite.handle(&mut core, "index", vec!["2".into()], &FormData::default()).await.unwrap();
        let ctx = core.base_context();
        assert!(ctx.get("next_page").unwrap().is_null());
        assert_eq!(ctx.get("prev_page").unwrap().as_str(), Some("/blog/1"));
    }

    #[tokio::test]
    async fn test_out_of_range_page_shows_last_page() {
        let (mut core, _dirs) = test_core().await;
        core.settings.set_field(MODULE, "perpage", "2").await.unwrap();
        for i in 0..3 {
            add_post(&core, &format!("p{}", i), PostStatus::Published, Duration::minutes(-10 - i)).await;
        }
        for page in ["99", "9000000000000000000"] {
            BlogSite
                .handle(&mut core, "index", vec![page.into()], &FormData::default())
                .await
                .unwrap();
            let ctx = core.base_context();
            let posts = ctx.get("posts").unwrap().as_array().unwrap();
            assert_eq!(posts.len(), 1);
            assert_eq!(posts[0]["slug"], "p2");
            assert!(ctx.get("next_page").unwrap().is_null());
            assert_eq!(ctx.get("prev_page").unwrap().as_str(), Some("/blog/1"));
        }
    }

    #[tokio::test]
    async fn test_drafts_only_for_admins() {
        let (mut core, _dirs) = test_core().await;
        add_post(&core, "draft", PostStatus::Draft, Duration::minutes(-1)).await;
        add_post(&core, "hidden", PostStatus::Hidden, Duration::minutes(-1)).await;
        let form = FormData::default();

        let out = BlogSite.handle(&mut core, "post", vec!["draft".into()], &form).await.unwrap();
        assert!(matches!(out, Output::NotFound));
        let out = BlogSite.handle(&mut core, "post", vec!["hidden".into()], &form).await.unwrap();
        assert!(matches!(out, Output::Page(_)));

        let (mut admin, _dirs) = admin_core().await;
        add_post(&admin, "draft", PostStatus::Draft, Duration::minutes(-1)).await;
        let out = BlogSite.handle(&mut admin, "post", vec!["draft".into()], &form).await.unwrap();
        assert!(matches!(out, Output::Page(_)));
        let warnings = admin.base_context().get("warnings").unwrap().clone();
        assert_eq!(warnings.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_tag_is_not_found() {
        let (mut core, _dirs) = test_core().await;
        let out = BlogSite
            .handle(&mut core, "tag", vec!["nope".into()], &FormData::default())
            .await
            .unwrap();
        assert!(matches!(out, Output::NotFound));
    }

    #[tokio::test]
    async fn test_tag_listing_title() {
        let (mut core, _dirs) = test_core().await;
        add_post(&core, "tagged", PostStatus::Published, Duration::minutes(-1)).await;
        BlogSite.handle(&mut core, "tag", vec!["rust".into()], &FormData::default()).await.unwrap();
        let ctx = core.base_context();
        assert_eq!(ctx.get("page_title").unwrap().as_str(), Some("#Rust"));
        assert_eq!(ctx.get("posts").unwrap().as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_feed_strips_markup_and_tags() {
        let (mut core, _dirs) = test_core().await;
        core.base_url = "https://example.com".to_string();
        add_post(&core, "one", PostStatus::Published, Duration::minutes(-1)).await;
        let out = BlogSite
            .handle(&mut core, "feed", vec!["en_english".into()], &FormData::default())
            .await
            .unwrap();
        let Output::Raw { content_type, body, .. } = out else {
            panic!("feed should be raw output");
        };
        assert!(content_type.starts_with("application/xml"));
        let xml = String::from_utf8(body).unwrap();
        assert!(xml.contains("<link>https://example.com/blog/post/one</link>"));
        assert!(xml.contains("Body of one"));
        assert!(!xml.contains("snippet.x"));
        assert!(xml.contains("<category>Rust</category>"));
    }

    #[tokio::test]
    async fn test_init_exposes_latest_posts_and_tags() {
        let (mut core, _dirs) = test_core().await;
        add_post(&core, "one", PostStatus::Published, Duration::minutes(-1)).await;
        BlogSite.init(&mut core).await.unwrap();
        let ctx = core.base_context();
        assert_eq!(ctx.get("latest_posts").unwrap()[0]["url"], "/blog/post/one");
        assert_eq!(ctx.get("all_tags").unwrap()[0]["count"], 1);
        assert!(core.header_html().contains("/static/css/blog.css"));
    }
}
