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

//! Public site: every path no other route claimed.

use axum::{
    extract::State,
    http::{HeaderMap, Uri},
    response::{IntoResponse, Response},
    Extension,
};
use axum_extra::extract::CookieJar;
use roost_core::router::path_segment;

use super::shared::{base_url, identify, respond};
use crate::auth::ClientInfo;
use crate::core::Core;
use crate::error::AppError;
use crate::form::FormData;
use crate::modules::{ModulesCollection, Output};
use crate::session::SessionHandle;
use crate::AppState;

/// Strip a leading language prefix such as `fr/` and switch to that
/// language. The site language is served without prefix.
pub fn select_language(core: &mut Core) {
    let Some(prefix) = path_segment(&core.path, 0).map(str::to_string) else {
        return;
    };
    let Some(code) = core.state.lang.code_for_prefix(&prefix) else {
        return;
    };
    core.path = core.path[prefix.len()..].trim_start_matches('/').to_string();
    core.set_language(&code);
    core.session.data.lang = Some(code);
}

pub async fn site_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    client: ClientInfo,
    jar: CookieJar,
    headers: HeaderMap,
    uri: Uri,
    form: FormData,
) -> Result<Response, AppError> {
    let mut core = Core::new(&state, session.lock().await, uri.path()).await?;
    core.base_url = base_url(&headers, &state.config);
    let jar = identify(&mut core, &client, jar, None, false).await?;
    select_language(&mut core);

    let modules = ModulesCollection::site(&mut core).await?;
    let found = core
        .router
        .dispatch(&core.path)
        .map(|m| (*m.target, m.params));

    let output = match found {
        Some((route, params)) => match modules.get(route.module) {
            Some(module) => {
                tracing::debug!("Site route {}/{} for /{}", route.module, route.action, core.path);
                module.handle(&mut core, route.action, params, &form).await?
            }
            None => Output::NotFound,
        },
        None => Output::NotFound,
    };
    modules.finish_loop(&mut core).await?;

    let response = respond(&mut core, output).await?;
    Ok((jar, response).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::create_router;
    use crate::test_helpers::{create_test_state, test_core};
    use axum::http::{header, HeaderValue, StatusCode};
    use axum_test::TestServer;
    use pretty_assertions::assert_eq;
    use roost_core::models::page::Page;
    use roost_db::repositories::PageRepository;

    #[tokio::test]
    async fn test_select_language_strips_prefix() {
        let (mut core, _dirs) = test_core().await;
        core.path = "fr/about".to_string();
        select_language(&mut core);
        assert_eq!(core.path, "about");
        assert_eq!(core.lang_code, "fr_french");

        core.path = "blog/post/fr".to_string();
        select_language(&mut core);
        assert_eq!(core.path, "blog/post/fr");

        core.path = "fr".to_string();
        select_language(&mut core);
        assert_eq!(core.path, "");
    }

    #[tokio::test]
    async fn test_pages_are_served_per_language() {
        let (state, _dirs) = create_test_state().await;
        let repo = PageRepository::new(state.db.clone());
        let mut page = Page::new("About us".into(), "about".into(), "en_english".into());
        page.content = "<p>English body</p>".into();
        repo.create(&page).await.unwrap();
        let mut page = Page::new("A propos".into(), "about".into(), "fr_french".into());
        page.content = "<p>Corps français</p>".into();
        repo.create(&page).await.unwrap();

        let server = TestServer::new(create_router(state)).unwrap();

        let response = server.get("/about").await;
        response.assert_status_ok();
        assert!(response.text().contains("English body"));
        assert!(response.text().contains(r#"<meta name="generator" content="Roost" />"#));

        let response = server.get("/fr/about").await;
        response.assert_status_ok();
        assert!(response.text().contains("Corps français"));

        let response = server.get("/nowhere-to-be-found").await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_sitemap_is_xml() {
        let (state, _dirs) = create_test_state().await;
        let server = TestServer::new(create_router(state)).unwrap();
        let response = server
            .get("/sitemap.xml")
            .add_header(header::HOST, HeaderValue::from_static("example.org"))
            .await;
        response.assert_status_ok();
        assert_eq!(
            response.header("content-type"),
            "application/xml; charset=utf-8"
        );
        assert!(response.text().contains("<loc>http://example.org/</loc>"));
    }
}
