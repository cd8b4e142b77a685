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

use axum::extract::DefaultBodyLimit;
use axum::{middleware, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::{handlers, request_logging::request_logging_middleware, session::session_middleware, AppState};

pub fn create_router(state: AppState) -> Router {
    let max_upload_size = state.config.max_upload_size;
    let admin = format!("/{}", state.config.admin_path.trim_matches('/'));

    let admin_routes = get(handlers::admin_handler).post(handlers::admin_handler);

    Router::new()
        // Health check
        .route("/.health", get(health))
        .nest_service("/static", ServeDir::new(&state.config.static_dir))
        .nest_service("/uploads", ServeDir::new(&state.config.uploads_dir))
        .route(
            &format!("{}/login", admin),
            get(handlers::login_form).post(handlers::login),
        )
        .route(&format!("{}/logout", admin), get(handlers::logout))
        .route(&admin, admin_routes.clone())
        .route(&format!("{}/", admin), admin_routes.clone())
        .route(&format!("{}/{{*rest}}", admin), admin_routes)
        // Everything else belongs to the site modules
        .fallback(handlers::site_handler)
        .layer(middleware::from_fn_with_state(state.clone(), session_middleware))
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::max(max_upload_size))
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new()),
        )
        .with_state(state)
}

// Health check handler
async fn health() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum_test::TestServer;

    #[tokio::test]
    async fn test_health_endpoint_uses_dot_prefix() {
        let (state, _dirs) = crate::test_helpers::create_test_state().await;
        let server = TestServer::new(create_router(state)).expect("Failed to create test server");

        let response = server.get("/.health").await;
        response.assert_status(StatusCode::OK);
        response.assert_text("OK");

        // Without the dot it is an ordinary page slug.
        let response = server.get("/health").await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_static_and_uploads_are_served() {
        let (state, dirs) = crate::test_helpers::create_test_state().await;
        crate::templates::init_static(&state.config.static_dir).unwrap();
        std::fs::create_dir_all(dirs.uploads().join("blog")).unwrap();
        std::fs::write(dirs.uploads().join("blog").join("a.txt"), "cover").unwrap();
        let server = TestServer::new(create_router(state)).expect("Failed to create test server");

        server.get("/static/css/admin.css").await.assert_status_ok();
        server.get("/uploads/blog/a.txt").await.assert_text("cover");
        server
            .get("/uploads/blog/missing.txt")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_admin_path_is_configurable() {
        let (mut state, _dirs) = crate::test_helpers::create_test_state().await;
        state.config.admin_path = "backstage".to_string();
        let server = TestServer::new(create_router(state)).expect("Failed to create test server");

        server.get("/backstage/login").await.assert_status_ok();
        let response = server.get("/backstage/blog/manage").await;
        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(response.header("location"), "/backstage/login");
    }
}
