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
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Json, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;

use crate::auth::{login_check, restore_remembered, ClientInfo, REMEMBER_COOKIE};
use crate::config::Config;
use crate::core::Core;
use crate::error::AppError;
use crate::modules::Output;

const REMEMBER_DAYS: i64 = 30;

/// Scheme and host the visitor used, honouring a reverse proxy.
pub fn base_url(headers: &HeaderMap, config: &Config) -> String {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(',').next().unwrap_or_default().trim().to_string())
            .filter(|v| !v.is_empty())
    };
    let scheme = header_value("x-forwarded-proto").unwrap_or_else(|| {
        if config.secure_cookies {
            "https".to_string()
        } else {
            "http".to_string()
        }
    });
    let host = header_value("x-forwarded-host")
        .or_else(|| header_value(header::HOST.as_str()))
        .unwrap_or_else(|| config.bind_addr());
    format!("{}://{}", scheme, host)
}

pub fn remember_cookie(value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((REMEMBER_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(cookie::time::Duration::days(REMEMBER_DAYS))
        .build()
}

pub fn remove_remember_cookie(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(REMEMBER_COOKIE).path("/"))
}

/// Find the logged-in user of the session, logging back in from the
/// remember-me cookie when the session is anonymous. Returns the jar with
/// the renewed cookie, if one was issued.
pub async fn identify(
    core: &mut Core,
    client: &ClientInfo,
    jar: CookieJar,
    link_token: Option<&str>,
    require_token: bool,
) -> Result<CookieJar, AppError> {
    let pool = core.db().clone();
    let user = login_check(&pool, &core.session.data, client, link_token, require_token).await?;
    if user.is_some() {
        core.user = user;
        return Ok(jar);
    }
    if core.session.data.is_logged_in() {
        return Ok(jar);
    }

    let Some(cookie) = jar.get(REMEMBER_COOKIE).map(|c| c.value().to_string()) else {
        return Ok(jar);
    };
    match restore_remembered(&pool, &mut core.session.data, client, &cookie).await? {
        Some(renewed) => {
            // An admin link cannot carry the new token yet.
            if !require_token {
                core.user = login_check(&pool, &core.session.data, client, None, false).await?;
            }
            Ok(jar.add(remember_cookie(renewed, core.config().secure_cookies)))
        }
        None => Ok(remove_remember_cookie(jar)),
    }
}

/// Responses shared by the site and the admin. `Html` is sent as is and
/// `Page` is rendered with the current theme.
pub async fn respond(core: &mut Core, output: Output) -> Result<Response, AppError> {
    Ok(match output {
        Output::Html(html) => Html(html).into_response(),
        Output::Page(template) => Html(core.render_page(&template)?).into_response(),
        Output::Redirect(url) => Redirect::to(&url).into_response(),
        Output::Json(value) => Json(value).into_response(),
        Output::Raw {
            content_type,
            body,
            filename,
        } => raw(content_type, body, filename.as_deref()),
        Output::NotFound => {
            let template = crate::modules::pages::not_found(core).await?;
            let html = core.render_page(&template)?;
            (StatusCode::NOT_FOUND, Html(html)).into_response()
        }
    })
}

fn raw(content_type: &'static str, body: Vec<u8>, filename: Option<&str>) -> Response {
    let mut response = ([(header::CONTENT_TYPE, content_type)], body).into_response();
    if let Some(name) = filename {
        let name = name.replace(['"', '\\', '\r', '\n'], "");
        if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", name)) {
            response.headers_mut().insert(header::CONTENT_DISPOSITION, value);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_base_url_follows_proxy_headers() {
        let config = Config::default();
        let mut headers = HeaderMap::new();
        assert_eq!(base_url(&headers, &config), "http://0.0.0.0:3000");

        headers.insert(header::HOST, HeaderValue::from_static("example.org"));
        assert_eq!(base_url(&headers, &config), "http://example.org");

        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        assert_eq!(base_url(&headers, &config), "https://example.org");
    }

    #[test]
    fn test_raw_attachment_header() {
        let response = raw("text/csv", b"a,b".to_vec(), Some("runs \"2024\".csv"));
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"runs 2024.csv\""
        );
    }
}
