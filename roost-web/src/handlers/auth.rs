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

use axum::{
    extract::{Query, State},
    http::{HeaderMap, Uri},
    response::{Html, IntoResponse, Redirect, Response},
    Extension,
};
use axum_extra::extract::CookieJar;
use roost_core::models::notification::Notification;
use std::collections::HashMap;
use tera::Context;

use super::shared::{base_url, identify, remember_cookie, remove_remember_cookie};
use crate::auth::{self, ClientInfo, LoginOutcome, REMEMBER_COOKIE};
use crate::core::Core;
use crate::error::AppError;
use crate::form::FormData;
use crate::modules::dashboard;
use crate::session::SessionHandle;
use crate::AppState;

async fn admin_core(state: &AppState, session: &SessionHandle, headers: &HeaderMap, uri: &Uri) -> Result<Core, AppError> {
    let mut core = Core::new(state, session.lock().await, uri.path()).await?;
    core.base_url = base_url(headers, &state.config);
    let admin_lang = core.setting("settings", "lang_admin");
    if core.state.lang.exists(&admin_lang) {
        core.set_language(&admin_lang);
    }
    Ok(core)
}

fn login_url(core: &Core) -> String {
    format!("/{}/login", core.config().admin_path)
}

/// Display login form
pub async fn login_form(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    client: ClientInfo,
    jar: CookieJar,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response, AppError> {
    let mut core = admin_core(&state, &session, &headers, &uri).await?;
    let jar = identify(&mut core, &client, jar, None, false).await?;
    if core.user.is_some() {
        return Ok((jar, Redirect::to(&core.admin_url(dashboard::MODULE))).into_response());
    }

    let form = core.take_form();
    let mut ctx = Context::new();
    ctx.insert("login_url", &login_url(&core));
    ctx.insert("notification", &core.take_notify());
    ctx.insert("username", form.get("username").and_then(|v| v.as_str()).unwrap_or_default());
    let html = core.draw("admin/login.html", ctx)?;
    Ok((jar, Html(html)).into_response())
}

/// Handle login POST request
pub async fn login(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    client: ClientInfo,
    jar: CookieJar,
    headers: HeaderMap,
    uri: Uri,
    form: FormData,
) -> Result<Response, AppError> {
    let mut core = admin_core(&state, &session, &headers, &uri).await?;
    let pool = core.db().clone();
    let outcome = auth::login(
        &pool,
        &mut core.session.data,
        &client,
        &form.text("username"),
        form.get("password").unwrap_or_default(),
        form.checked("remember_me"),
    )
    .await?;

    match outcome {
        LoginOutcome::Success { remember } => {
            let jar = match remember {
                Some(value) => jar.add(remember_cookie(value, state.config.secure_cookies)),
                None => jar,
            };
            Ok((jar, Redirect::to(&core.admin_url(dashboard::MODULE))).into_response())
        }
        LoginOutcome::Invalid | LoginOutcome::Locked { .. } => {
            let key = if matches!(outcome, LoginOutcome::Invalid) {
                "login_failure"
            } else {
                "login_locked"
            };
            let text = core.lang_text("general", key);
            core.notify(Notification::failure(text));
            core.keep_form(&form);
            Ok((jar, Redirect::to(&login_url(&core))).into_response())
        }
    }
}

/// Handle logout. The link carries the session token like every admin link.
pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    client: ClientInfo,
    jar: CookieJar,
    headers: HeaderMap,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let mut core = admin_core(&state, &session, &headers, &uri).await?;
    let token = query.get("t").map(String::as_str);
    let jar = identify(&mut core, &client, jar, token, true).await?;
    let Some(user) = core.user.take() else {
        return Ok((jar, Redirect::to(&login_url(&core))).into_response());
    };

    let pool = core.db().clone();
    let remembered = jar.get(REMEMBER_COOKIE).map(|c| c.value().to_string());
    auth::logout(&pool, &mut core.session.data, remembered.as_deref()).await?;
    session.destroy();
    tracing::info!("User {} logged out", user.username);
    Ok((remove_remember_cookie(jar), Redirect::to("/")).into_response())
}
