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
use chrono::{DateTime, SecondsFormat, Utc};
use roost_core::utils::text::lang_prefix;
use roost_db::repositories::{BlogRepository, ModuleRepository, PageRepository, PagelistRepository};
use serde::Serialize;
use tera::Context;

use super::MODULE;
use crate::core::{Core, Location};
use crate::form::FormData;
use crate::modules::blog::{self, blog_slug};
use crate::modules::{Output, SiteModule, SiteRoute};

const NOINDEX_META: &str = r#"<meta name="robots" content="noindex" />"#;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Alternate {
    pub hreflang: String,
    pub href: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SitemapUrl {
    pub loc: String,
    pub lastmod: Option<String>,
    pub changefreq: &'static str,
    pub image: Option<String>,
    pub links: Vec<Alternate>,
}

impl SitemapUrl {
    fn new(loc: String, changefreq: &'static str) -> Self {
        Self {
            loc,
            lastmod: None,
            changefreq,
            image: None,
            links: Vec::new(),
        }
    }
}

fn w3c_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Absolute URL of `path` as seen in language `lang`.
fn localized(core: &Core, site_lang: &str, lang: &str, path: &str) -> String {
    if lang == site_lang {
        core.absolute_url(path)
    } else if path.is_empty() {
        core.absolute_url(lang_prefix(lang))
    } else {
        core.absolute_url(&format!("{}/{}", lang_prefix(lang), path))
    }
}

/// Collect every public URL of the site.
pub async fn collect_urls(core: &Core) -> Result<Vec<SitemapUrl>> {
    let site_lang = core.setting("settings", "lang_site");
    let homepage = core.setting("settings", "homepage").trim_matches('/').to_string();
    let active = |lang: &str| core.state.lang.is_active(lang);
    let modules = ModuleRepository::new(core.db().clone());

    let mut urls = vec![SitemapUrl::new(core.absolute_url(""), "always")];

    let pages = PageRepository::new(core.db().clone());
    for page in pages.list(None).await? {
        if !active(&page.lang) || page.is_error_page() {
            continue;
        }
        let links = pages
            .translations(&page.slug)
            .await?
            .iter()
            .filter(|p| active(&p.lang))
            .map(|p| Alternate {
                hreflang: lang_prefix(&p.lang).to_string(),
                href: localized(core, &site_lang, &p.lang, &p.slug),
            })
            .collect();
        let lastmod = Some(w3c_date(page.date));
        if page.slug == homepage && page.lang == site_lang {
            urls[0].lastmod = lastmod;
            urls[0].links = links;
        } else if page.slug == homepage {
            let mut url = SitemapUrl::new(localized(core, &site_lang, &page.lang, ""), "always");
            url.lastmod = lastmod;
            url.links = links;
            urls.push(url);
        } else {
            let mut url = SitemapUrl::new(localized(core, &site_lang, &page.lang, &page.slug), "monthly");
            url.lastmod = lastmod;
            url.links = links;
            urls.push(url);
        }
    }

    if modules.has("pagelist").await? {
        let lists = PagelistRepository::new(core.db().clone()).list(None).await?;
        for list in lists.iter().filter(|l| active(&l.lang)) {
            let mut url = SitemapUrl::new(localized(core, &site_lang, &list.lang, &list.slug), "never");
            url.lastmod = Some(w3c_date(list.updated_at));
            url.links = lists
                .iter()
                .filter(|other| other.slug == list.slug && active(&other.lang))
                .map(|other| Alternate {
                    hreflang: lang_prefix(&other.lang).to_string(),
                    href: localized(core, &site_lang, &other.lang, &other.slug),
                })
                .collect();
            urls.push(url);
        }
    }

    if modules.has(blog::MODULE).await? {
        let base = blog_slug(core);
        let repo = BlogRepository::new(core.db().clone());
        let posts = repo.all_published(core.now()).await?;
        let latest = posts.first().map(|p| w3c_date(p.published_at));
        if homepage == base {
            urls[0].lastmod = latest;
            urls[0].changefreq = "daily";
        } else {
            let mut url = SitemapUrl::new(core.absolute_url(&base), "daily");
            url.lastmod = latest;
            urls.push(url);
        }
        for post in posts.iter().filter(|p| active(&p.lang)) {
            let path = format!("{}/post/{}", base, post.slug);
            let mut url = SitemapUrl::new(localized(core, &site_lang, &post.lang, &path), "never");
            url.lastmod = Some(w3c_date(post.published_at));
            url.image = Some(core.absolute_url(&blog::cover_url(core, post)));
            urls.push(url);
        }
        for info in core.state.lang.active()? {
            for tag in repo.tag_cloud(&info.code, core.now()).await? {
                let path = format!("{}/tag/{}", base, tag.slug);
                urls.push(SitemapUrl::new(localized(core, &site_lang, &info.code, &path), "daily"));
            }
        }
    }

    Ok(urls)
}

pub struct SitemapSite;

impl SitemapSite {
    async fn sitemap(&self, core: &mut Core) -> Result<Output> {
        let urls = collect_urls(core).await?;
        let mut ctx = Context::new();
        ctx.insert("urls", &urls);
        let xml = core.draw("modules/sitemap/sitemap.xml", ctx)?;
        Ok(Output::Raw {
            content_type: "application/xml; charset=utf-8",
            body: xml.into_bytes(),
            filename: None,
        })
    }
}

#[async_trait]
impl SiteModule for SitemapSite {
    fn name(&self) -> &'static str {
        MODULE
    }

    async fn init(&self, core: &mut Core) -> Result<()> {
        if core.setting(MODULE, "noindex") == "1" {
            core.append(NOINDEX_META, Location::Header);
        }
        Ok(())
    }

    fn routes(&self, core: &mut Core) -> Result<()> {
        core.router.route("sitemap.xml", SiteRoute::new(MODULE, "sitemap"))?;
        Ok(())
    }

    async fn handle(
        &self,
        core: &mut Core,
        action: &'static str,
        _params: Vec<String>,
        _form: &FormData,
    ) -> Result<Output> {
        match action {
            "sitemap" => self.sitemap(core).await,
            _ => Ok(Output::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::test_core;
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use roost_core::models::blog::{BlogPost, PostStatus};
    use roost_core::models::page::Page;

    #[tokio::test]
    async fn test_sitemap_urls() {
        let (mut core, _dirs) = test_core().await;
        core.base_url = "https://example.org".into();
        let pages = PageRepository::new(core.db().clone());
        pages.create(&Page::new("About".into(), "about".into(), "en_english".into())).await.unwrap();
        pages.create(&Page::new("Qui".into(), "about".into(), "fr_french".into())).await.unwrap();

        let mut post = BlogPost::new(1, "Hi".into(), "hi".into(), "Body".into(), "en_english".into());
        post.status = PostStatus::Published;
        post.published_at = Utc::now() - Duration::hours(1);
        let blog = BlogRepository::new(core.db().clone());
        let id = blog.create(&post).await.unwrap();
        blog.set_tags(id, &["Speedrun".to_string()]).await.unwrap();

        let urls = collect_urls(&core).await.unwrap();
        let locs: Vec<&str> = urls.iter().map(|u| u.loc.as_str()).collect();
        assert_eq!(
            locs,
            vec![
                "https://example.org/",
                "https://example.org/about",
                "https://example.org/fr/about",
                "https://example.org/blog/post/hi",
                "https://example.org/blog/tag/speedrun",
            ]
        );
        // The homepage is the blog.
        assert_eq!(urls[0].changefreq, "daily");
        assert_eq!(urls[1].links.len(), 2);
        assert_eq!(urls[1].links[1].href, "https://example.org/fr/about");
        assert_eq!(urls[3].image.as_deref(), Some("https://example.org/static/img/default-cover.svg"));
    }

    #[tokio::test]
    async fn test_noindex_meta() {
        let (mut core, _dirs) = test_core().await;
        SitemapSite.init(&mut core).await.unwrap();
        assert!(!core.header_html().contains("noindex"));
        core.settings.set_field(MODULE, "noindex", "1").await.unwrap();
        SitemapSite.init(&mut core).await.unwrap();
        assert!(core.header_html().contains(NOINDEX_META));
    }

    #[tokio::test]
    async fn test_sitemap_xml_output() {
        let (mut core, _dirs) = test_core().await;
        let out = SitemapSite.handle(&mut core, "sitemap", vec![], &FormData::default()).await.unwrap();
        let Output::Raw { content_type, body, .. } = out else {
            panic!("expected raw output");
        };
        assert!(content_type.starts_with("application/xml"));
        let xml = String::from_utf8(body).unwrap();
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<changefreq>daily</changefreq>"));
    }
}
