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

//! Administration panel: `/{admin}/{module}/{action}/{params...}`.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{Html, IntoResponse, Redirect, Response},
    Extension,
};
use axum_extra::extract::CookieJar;
use roost_core::models::user::Access;
use serde::Serialize;
use std::collections::HashMap;
use tera::Context;

use super::shared::{base_url, identify, respond};
use crate::auth::{login_check, ClientInfo};
use crate::core::Core;
use crate::error::AppError;
use crate::form::FormData;
use crate::modules::{dashboard, users, AdminModule, AdminRequest, ModulesCollection, Output};
use crate::session::SessionHandle;
use crate::AppState;

#[derive(Debug, Clone, Serialize)]
struct SubNav {
    url: String,
    label: String,
    active: bool,
}

#[derive(Debug, Clone, Serialize)]
struct Nav {
    url: String,
    icon: &'static str,
    name: String,
    active: bool,
    subnav: Vec<SubNav>,
}

/// Split `blog/edit/3` into module, action and parameters.
pub fn split_path(path: &str) -> (String, String, Vec<String>) {
    let mut segments = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let module = segments.next().unwrap_or_else(|| dashboard::MODULE.to_string());
    let action = segments.next().unwrap_or_default();
    (module, action, segments.collect())
}

/// Modules a user may open. The own profile is open to everybody.
pub fn may_open(access: &Access, module: &str, action: &str) -> bool {
    access.allows(module) || (module == users::MODULE && action == "profile")
}

fn login_url(core: &Core) -> String {
    format!("/{}/login", core.config().admin_path)
}

fn build_nav(core: &Core, modules: &ModulesCollection<dyn AdminModule>, access: &Access, current: &str, action: &str) -> Vec<Nav> {
    modules
        .list()
        .into_iter()
        .filter(|dir| access.allows(dir))
        .filter_map(|dir| {
            let module = modules.get(dir)?;
            let manifest = roost_db::manifest(dir)?;
            let active = dir == current;
            let subnav = module
                .navigation(core)
                .into_iter()
                .map(|item| SubNav {
                    url: core.admin_url(&format!("{}/{}", dir, item.action)),
                    active: active && item.action.split('/').next() == Some(action),
                    label: item.label,
                })
                .collect();
            Some(Nav {
                url: core.admin_url(dir),
                icon: manifest.icon,
                name: manifest.name.to_string(),
                active,
                subnav,
            })
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
pub async fn admin_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    client: ClientInfo,
    jar: CookieJar,
    headers: HeaderMap,
    method: Method,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
    form: FormData,
) -> Result<Response, AppError> {
    let prefix = format!("/{}", state.config.admin_path);
    let path = uri.path().strip_prefix(&prefix).unwrap_or_default().to_string();

    let mut core = Core::new(&state, session.lock().await, uri.path()).await?;
    core.base_url = base_url(&headers, &state.config);
    let admin_lang = core.setting("settings", "lang_admin");
    if core.state.lang.exists(&admin_lang) {
        core.set_language(&admin_lang);
    }

    let token = query.get("t").map(String::as_str);
    let jar = identify(&mut core, &client, jar, token, true).await?;
    let Some(user) = core.user.clone() else {
        let pool = core.db().clone();
        if login_check(&pool, &core.session.data, &client, None, false).await?.is_some() {
            // Logged in, but the link lacks the session token.
            tracing::debug!("Admin token missing for /{}", path.trim_start_matches('/'));
            return Ok((jar, Redirect::to(&core.admin_url(dashboard::MODULE))).into_response());
        }
        core.session.data.logout();
        return Ok((jar, Redirect::to(&login_url(&core))).into_response());
    };

    let (module, mut action, params) = split_path(&path);
    let access = user.effective_access();
    if !may_open(&access, &module, &action) {
        tracing::warn!("User {} refused access to module {}", user.username, module);
        return Err(AppError::forbidden("Access denied"));
    }

    let modules = ModulesCollection::admin(&mut core).await?;
    let Some(controller) = modules.get(&module) else {
        return Err(AppError::not_found("Unknown module").with_details(module));
    };
    if action.is_empty() {
        action = controller
            .navigation(&core)
            .into_iter()
            .next()
            .map(|item| item.action)
            .unwrap_or_default();
    }

    let request = AdminRequest {
        method,
        action: action.clone(),
        params,
        form,
        query,
    };
    tracing::debug!("Admin {}/{} by {}", module, action, user.username);
    let output = controller.dispatch(&mut core, request).await?;
    modules.finish_loop(&mut core).await?;

    let response = match output {
        Output::Html(content) => {
            let mut ctx = Context::new();
            let manifest = roost_db::manifest(&module);
            ctx.insert("module_title", manifest.map(|m| m.name).unwrap_or_default());
            ctx.insert("nav", &build_nav(&core, &modules, &access, &module, &action));
            ctx.insert("dashboard_url", &core.admin_url(dashboard::MODULE));
            ctx.insert("profile_url", &core.admin_url("users/profile"));
            ctx.insert("logout_url", &core.admin_url("logout"));
            ctx.insert("notification", &core.take_notify());
            ctx.insert("content", &content);
            Html(core.draw("admin/layout.html", ctx)?).into_response()
        }
        Output::NotFound | Output::Page(_) => (StatusCode::NOT_FOUND, "Not found").into_response(),
        other => respond(&mut core, other).await?,
    };
    Ok((jar, response).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::create_router;
    use crate::test_helpers::{create_test_state, create_test_user};
    use axum_test::{TestResponse, TestServer};
    use pretty_assertions::assert_eq;
    use roost_db::repositories::UserRepository;

    fn location(response: &TestResponse) -> String {
        response.header("location").to_str().unwrap().to_string()
    }

    fn token_of(url: &str) -> String {
        url.split("t=").nth(1).unwrap().to_string()
    }

    async fn logged_in(server: &TestServer, username: &str) -> String {
        let response = server
            .post("/admin/login")
            .form(&[("username", username), ("password", "secret1")])
            .await;
        let target = location(&response);
        assert!(target.starts_with("/admin/dashboard?t="), "{}", target);
        token_of(&target)
    }

    #[test]
    fn test_split_path() {
        assert_eq!(
            split_path("/blog/edit/3"),
            ("blog".to_string(), "edit".to_string(), vec!["3".to_string()])
        );
        assert_eq!(split_path(""), ("dashboard".to_string(), String::new(), vec![]));
    }

    #[test]
    fn test_profile_is_open_to_everybody() {
        let access = Access::parse("blog");
        assert!(may_open(&access, "blog", "manage"));
        assert!(may_open(&access, "dashboard", ""));
        assert!(may_open(&access, "users", "profile"));
        assert!(!may_open(&access, "users", "manage"));
        assert!(!may_open(&access, "settings", "general"));
    }

    #[tokio::test]
    async fn test_anonymous_is_sent_to_login() {
        let (state, _dirs) = create_test_state().await;
        let server = TestServer::new(create_router(state)).unwrap();
        let response = server.get("/admin/blog/manage").await;
        assert_eq!(location(&response), "/admin/login");
        server.get("/admin/login").await.assert_status_ok();
    }

    #[tokio::test]
    async fn test_login_dispatch_and_logout() {
        let (state, _dirs) = create_test_state().await;
        create_test_user(&state.db, "admin", "secret1").await;
        let server = TestServer::builder().save_cookies().build(create_router(state)).unwrap();

        let response = server
            .post("/admin/login")
            .form(&[("username", "admin"), ("password", "wrong")])
            .await;
        assert_eq!(location(&response), "/admin/login");
        assert!(server.get("/admin/login").await.text().contains("Wrong username or password"));

        let token = logged_in(&server, "admin").await;

        let response = server.get(&format!("/admin/dashboard?t={}", token)).await;
        response.assert_status_ok();
        assert!(response.text().contains("/admin/users/profile?t="));

        // Without the token the request only bounces to the dashboard.
        let response = server.get("/admin/blog/manage").await;
        assert_eq!(location(&response), format!("/admin/dashboard?t={}", token));

        let response = server.get(&format!("/admin/blog?t={}", token)).await;
        response.assert_status_ok();

        let response = server.get(&format!("/admin/logout?t={}", token)).await;
        assert_eq!(location(&response), "/");
        let response = server.get(&format!("/admin/dashboard?t={}", token)).await;
        assert_eq!(location(&response), "/admin/login");
    }

    #[tokio::test]
    async fn test_restricted_user() {
        let (state, _dirs) = create_test_state().await;
        create_test_user(&state.db, "admin", "secret1").await;
        let mut editor = create_test_user(&state.db, "editor", "secret1").await;
        editor.access = Access::parse("blog");
        UserRepository::new(state.db.clone()).update(&editor).await.unwrap();

        let server = TestServer::builder().save_cookies().build(create_router(state)).unwrap();
        let token = logged_in(&server, "editor").await;

        server
            .get(&format!("/admin/settings/general?t={}", token))
            .await
            .assert_status(StatusCode::FORBIDDEN);
        server
            .get(&format!("/admin/users/profile?t={}", token))
            .await
            .assert_status_ok();
        let dashboard = server.get(&format!("/admin/dashboard?t={}", token)).await;
        assert!(!dashboard.text().contains("/admin/settings?t="));
        assert!(dashboard.text().contains("/admin/blog?t="));
    }
}
