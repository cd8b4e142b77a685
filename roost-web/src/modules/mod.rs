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

//! Content modules and the collection that loads them.
//!
//! Every installed module (a row of the `modules` table) may provide an
//! admin controller and a site controller. The collection instantiates the
//! controllers of the requested kind in `sequence` order, runs their `init`
//! hooks and, on the public site, lets them register routes.

use anyhow::Result;
use async_trait::async_trait;
use axum::http::Method;
use roost_db::repositories::ModuleRepository;
use serde::Serialize;
use std::collections::HashMap;

use crate::core::Core;
use crate::form::FormData;

pub mod blog;
pub mod dashboard;
pub mod events;
pub mod events_registration;
pub mod galleries;
pub mod helpers;
pub mod members;
pub mod pagelist;
pub mod pages;
pub mod settings;
pub mod sitemap;
pub mod snippets;
pub mod twitch;
pub mod users;

/// What a controller wants sent back.
#[derive(Debug)]
pub enum Output {
    /// Admin content, wrapped in the admin layout. On the site it is sent
    /// as is.
    Html(String),
    /// Public page rendered with the given theme template.
    Page(String),
    Redirect(String),
    Json(serde_json::Value),
    Raw {
        content_type: &'static str,
        body: Vec<u8>,
        /// Sent as an attachment when set.
        filename: Option<String>,
    },
    NotFound,
}

/// Route target registered by a site controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteRoute {
    pub module: &'static str,
    pub action: &'static str,
}

impl SiteRoute {
    pub fn new(module: &'static str, action: &'static str) -> Self {
        Self { module, action }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NavItem {
    pub label: String,
    /// Action path below the module, such as `manage` or `add`.
    pub action: String,
}

impl NavItem {
    pub fn new(label: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: action.into(),
        }
    }
}

/// One admin request, routed as `/{admin}/{module}/{action}/{params...}`.
#[derive(Debug, Clone)]
pub struct AdminRequest {
    pub method: Method,
    pub action: String,
    pub params: Vec<String>,
    pub form: FormData,
    pub query: HashMap<String, String>,
}

impl AdminRequest {
    pub fn get(action: &str, params: &[&str]) -> Self {
        Self {
            method: Method::GET,
            action: action.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            form: FormData::default(),
            query: HashMap::new(),
        }
    }

    pub fn post(action: &str, params: &[&str], form: FormData) -> Self {
        Self {
            method: Method::POST,
            form,
            ..Self::get(action, params)
        }
    }

    pub fn is_post(&self) -> bool {
        self.method == Method::POST
    }

    pub fn param(&self, n: usize) -> Option<&str> {
        self.params.get(n).map(String::as_str)
    }

    pub fn id(&self, n: usize) -> Option<i64> {
        self.param(n).and_then(|p| p.parse().ok())
    }

    /// Page number from the path or `?page=`, at least 1.
    pub fn page(&self, n: usize) -> i64 {
        self.id(n)
            .or_else(|| self.query.get("page").and_then(|p| p.parse().ok()))
            .unwrap_or(1)
            .max(1)
    }

    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }
}

#[async_trait]
pub trait AdminModule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Entries of the module's admin menu. The first one is its landing page.
    fn navigation(&self, core: &Core) -> Vec<NavItem>;

    async fn init(&self, _core: &mut Core) -> Result<()> {
        Ok(())
    }

    async fn dispatch(&self, core: &mut Core, request: AdminRequest) -> Result<Output>;

    async fn finish(&self, _core: &mut Core) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
pub trait SiteModule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Runs on every page, before routing. Typically sets template
    /// variables and `{$module.key}` tags.
    async fn init(&self, _core: &mut Core) -> Result<()> {
        Ok(())
    }

    fn routes(&self, _core: &mut Core) -> Result<()> {
        Ok(())
    }

    async fn handle(
        &self,
        _core: &mut Core,
        _action: &'static str,
        _params: Vec<String>,
        _form: &FormData,
    ) -> Result<Output> {
        Ok(Output::NotFound)
    }

    async fn finish(&self, _core: &mut Core) -> Result<()> {
        Ok(())
    }
}

/// Site controller of a module directory, if it has one.
pub fn site_controller(dir: &str) -> Option<Box<dyn SiteModule>> {
    Some(match dir {
        "pages" => Box::new(pages::site::PagesSite),
        "blog" => Box::new(blog::site::BlogSite),
        "events" => Box::new(events::site::EventsSite),
        "events_registration" => Box::new(events_registration::site::RegistrationSite),
        "galleries" => Box::new(galleries::site::GalleriesSite),
        "members" => Box::new(members::site::MembersSite),
        "pagelist" => Box::new(pagelist::site::PagelistSite),
        "snippets" => Box::new(snippets::site::SnippetsSite),
        "sitemap" => Box::new(sitemap::site::SitemapSite),
        "twitch" => Box::new(twitch::site::TwitchSite),
        _ => return None,
    })
}

/// Admin controller of a module directory, if it has one.
pub fn admin_controller(dir: &str) -> Option<Box<dyn AdminModule>> {
    Some(match dir {
        "dashboard" => Box::new(dashboard::DashboardAdmin),
        "pages" => Box::new(pages::admin::PagesAdmin),
        "blog" => Box::new(blog::admin::BlogAdmin),
        "events" => Box::new(events::admin::EventsAdmin),
        "events_registration" => Box::new(events_registration::admin::RegistrationAdmin),
        "galleries" => Box::new(galleries::admin::GalleriesAdmin),
        "members" => Box::new(members::admin::MembersAdmin),
        "pagelist" => Box::new(pagelist::admin::PagelistAdmin),
        "snippets" => Box::new(snippets::admin::SnippetsAdmin),
        "sitemap" => Box::new(sitemap::admin::SitemapAdmin),
        "twitch" => Box::new(twitch::admin::TwitchAdmin),
        "users" => Box::new(users::UsersAdmin),
        "settings" => Box::new(settings::SettingsAdmin),
        _ => return None,
    })
}

/// Loaded controllers of one kind, in navigation order.
pub struct ModulesCollection<M: ?Sized> {
    modules: Vec<(String, Box<M>)>,
}

impl<M: ?Sized> ModulesCollection<M> {
    async fn load(core: &Core, controller: fn(&str) -> Option<Box<M>>) -> Result<Self> {
        let dirs = ModuleRepository::new(core.db().clone()).list().await?;
        let modules = dirs
            .into_iter()
            .filter_map(|dir| controller(&dir).map(|m| (dir, m)))
            .collect();
        Ok(Self { modules })
    }

    pub fn has(&self, name: &str) -> bool {
        self.modules.iter().any(|(dir, _)| dir == name)
    }

    pub fn get(&self, name: &str) -> Option<&M> {
        self.modules
            .iter()
            .find(|(dir, _)| dir == name)
            .map(|(_, m)| m.as_ref())
    }

    pub fn list(&self) -> Vec<&str> {
        self.modules.iter().map(|(dir, _)| dir.as_str()).collect()
    }
}

impl ModulesCollection<dyn SiteModule> {
    pub async fn site(core: &mut Core) -> Result<Self> {
        let collection = Self::load(core, site_controller).await?;
        for (_, module) in &collection.modules {
            module.init(core).await?;
        }
        for (_, module) in &collection.modules {
            module.routes(core)?;
        }
        Ok(collection)
    }

    pub async fn finish_loop(&self, core: &mut Core) -> Result<()> {
        for (_, module) in &self.modules {
            module.finish(core).await?;
        }
        Ok(())
    }
}

impl ModulesCollection<dyn AdminModule> {
    pub async fn admin(core: &mut Core) -> Result<Self> {
        let collection = Self::load(core, admin_controller).await?;
        for (_, module) in &collection.modules {
            module.init(core).await?;
        }
        Ok(collection)
    }

    pub async fn finish_loop(&self, core: &mut Core) -> Result<()> {
        for (_, module) in &self.modules {
            module.finish(core).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::test_core;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_controllers_exist_for_catalog() {
        for manifest in roost_db::catalog() {
            assert!(admin_controller(manifest.dir).is_some(), "{}", manifest.dir);
        }
        assert!(site_controller("users").is_none());
        assert!(site_controller("blog").is_some());
    }

    #[tokio::test]
    async fn test_site_collection_follows_sequence() {
        let (mut core, _state) = test_core().await;
        let site = ModulesCollection::site(&mut core).await.unwrap();
        assert_eq!(
            site.list(),
            vec![
                "pages",
                "blog",
                "galleries",
                "snippets",
                "pagelist",
                "events",
                "events_registration",
                "members",
                "twitch",
                "sitemap",
            ]
        );
        assert!(site.has("blog"));
        assert!(!site.has("users"));
        assert!(site.get("blog").is_some());
        assert!(!core.router.is_empty());
        site.finish_loop(&mut core).await.unwrap();
    }

    #[tokio::test]
    async fn test_admin_collection_includes_core_modules() {
        let (mut core, _state) = test_core().await;
        let admin = ModulesCollection::admin(&mut core).await.unwrap();
        assert_eq!(admin.list().first(), Some(&"dashboard"));
        assert!(admin.has("settings"));
        assert!(admin.has("users"));
    }

    #[test]
    fn test_admin_request_page() {
        let mut request = AdminRequest::get("manage", &["3"]);
        assert_eq!(request.page(0), 3);
        request.params.clear();
        request.query.insert("page".into(), "0".into());
        assert_eq!(request.page(0), 1);
    }
}
