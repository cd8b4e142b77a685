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

//! Server-side sessions keyed by the `roost` cookie.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use chrono::Duration;
use roost_core::models::session::{Session, SessionData};
use roost_db::repositories::SessionRepository;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::AppState;

pub const SESSION_COOKIE: &str = "roost";

/// The visitor's session, shared between the middleware and the handler.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<Mutex<Session>>,
    destroyed: Arc<AtomicBool>,
}

impl SessionHandle {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
            destroyed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn lock(&self) -> OwnedMutexGuard<Session> {
        Arc::clone(&self.inner).lock_owned().await
    }

    /// Delete the session row and the cookie once the response is built.
    pub fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

pub fn session_cookie(id: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, id))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

/// Loads the session before the handler runs and stores it afterwards when
/// its data changed. Anonymous visitors only get a cookie once something is
/// written to their session.
pub async fn session_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let repo = SessionRepository::new(state.db.clone());
    let lifetime = Duration::minutes(state.config.session_timeout_minutes);

    let existing = match jar.get(SESSION_COOKIE) {
        Some(cookie) => match repo.find_by_id(cookie.value()).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("Failed to load session: {:#}", e);
                None
            }
        },
        None => None,
    };
    let is_new = existing.is_none();
    let session = existing.unwrap_or_else(|| Session::new_with_expiry(lifetime));
    let before = session.data.clone();

    let handle = SessionHandle::new(session);
    request.extensions_mut().insert(handle.clone());

    let mut response = next.run(request).await;

    let mut session = handle.lock().await;

    if handle.is_destroyed() {
        if let Err(e) = repo.delete(&session.id).await {
            tracing::warn!("Failed to delete session: {:#}", e);
        }
        let removal = Cookie::build((SESSION_COOKIE, "")).path("/").removal().build();
        append_cookie(&mut response, &removal);
        return response;
    }

    let changed = session.data != before;
    if !changed && (is_new || session.data == SessionData::default()) {
        return response;
    }

    session.expires_at = chrono::Utc::now() + lifetime;
    if let Err(e) = repo.save(&session).await {
        tracing::error!("Failed to save session: {:#}", e);
        return response;
    }
    if is_new {
        let cookie = session_cookie(session.id.clone(), state.config.secure_cookies);
        append_cookie(&mut response, &cookie);
    }
    response
}

fn append_cookie(response: &mut Response, cookie: &Cookie<'_>) {
    if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
}
