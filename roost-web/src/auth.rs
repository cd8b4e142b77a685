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

//! Admin authentication: session login, the `?t=` link token, client
//! binding, remember-me cookies and login lockout.

use anyhow::Result;
use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{DateTime, Utc};
use rand::RngCore;
use roost_core::models::session::SessionData;
use roost_core::models::user::{User, UserStatus};
use roost_db::repositories::{
    parse_remember_cookie, LoginAttemptRepository, RememberMeRepository, UserRepository,
};
use sqlx::SqlitePool;
use std::convert::Infallible;
use std::net::SocketAddr;

pub const REMEMBER_COOKIE: &str = "remember_me";

/// Who is on the other end of the request.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientInfo {
    pub ip: String,
    pub user_agent: String,
}

impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header_value = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let ip = header_value("x-forwarded-for")
            .and_then(|v| v.split(',').next().map(|s| s.trim().to_string()))
            .or_else(|| header_value("x-real-ip"))
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            })
            .unwrap_or_else(|| "unknown".to_string());

        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        Ok(ClientInfo { ip, user_agent })
    }
}

/// Random lowercase hex string of `bytes` bytes.
pub fn random_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    buf.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Resolve the logged-in user from the session. Admin requests also pass
/// the `?t=` token, which must match the session's.
pub async fn login_check(
    pool: &SqlitePool,
    session: &SessionData,
    client: &ClientInfo,
    link_token: Option<&str>,
    require_token: bool,
) -> Result<Option<User>> {
    let (Some(user_id), Some(token)) = (session.user_id, session.token.as_deref()) else {
        return Ok(None);
    };
    if require_token && link_token != Some(token) {
        tracing::debug!("Admin token mismatch for user {}", user_id);
        return Ok(None);
    }
    if session.ip.as_deref() != Some(client.ip.as_str())
        || session.user_agent.as_deref() != Some(client.user_agent.as_str())
    {
        tracing::warn!("Session of user {} used from another client", user_id);
        return Ok(None);
    }
    let user = UserRepository::new(pool.clone()).find_by_id(user_id).await?;
    Ok(user.filter(|u| u.status == UserStatus::Active))
}

fn open_session(session: &mut SessionData, user_id: i64, client: &ClientInfo) {
    session.user_id = Some(user_id);
    session.token = Some(random_token(6));
    session.ip = Some(client.ip.clone());
    session.user_agent = Some(client.user_agent.clone());
}

/// Log in from a remember-me cookie. On success the session is opened and
/// the cookie value to send back is returned: the token is replaced and
/// the expiry pushed another 30 days.
pub async fn restore_remembered(
    pool: &SqlitePool,
    session: &mut SessionData,
    client: &ClientInfo,
    cookie: &str,
) -> Result<Option<String>> {
    let Some((user_id, token)) = parse_remember_cookie(cookie) else {
        return Ok(None);
    };
    let repo = RememberMeRepository::new(pool.clone());
    let Some(stored) = repo.find(user_id, token).await? else {
        return Ok(None);
    };
    repo.delete(stored.id).await?;
    if stored.is_expired(Utc::now()) {
        tracing::info!("Expired remember-me token for user {}", user_id);
        return Ok(None);
    }
    let user = UserRepository::new(pool.clone()).find_by_id(user_id).await?;
    let Some(user) = user.filter(|u| u.status == UserStatus::Active) else {
        return Ok(None);
    };
    let renewed = repo.create(user_id, &random_token(16)).await?;
    open_session(session, user.id.unwrap_or(user_id), client);
    tracing::info!("User {} logged in from remember-me cookie", user.username);
    Ok(Some(renewed.cookie_value()))
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    /// Logged in. Carries the remember-me cookie value when requested.
    Success { remember: Option<String> },
    Invalid,
    Locked { until: DateTime<Utc> },
}

pub async fn login(
    pool: &SqlitePool,
    session: &mut SessionData,
    client: &ClientInfo,
    username: &str,
    password: &str,
    remember: bool,
) -> Result<LoginOutcome> {
    let attempts = LoginAttemptRepository::new(pool.clone());
    let now = Utc::now();
    if let Some(until) = attempts.locked_until(&client.ip, now).await? {
        tracing::warn!("Login refused for locked address {}", client.ip);
        return Ok(LoginOutcome::Locked { until });
    }

    let user = UserRepository::new(pool.clone())
        .find_by_username(username)
        .await?
        .filter(|u| u.status == UserStatus::Active);

    let verified = match &user {
        Some(user) => user.verify_password(password).unwrap_or(false),
        None => false,
    };

    let (Some(user), true) = (user, verified) else {
        let count = attempts.record_failure(&client.ip, now).await?;
        tracing::info!("Failed login for '{}' from {} ({} attempts)", username, client.ip, count);
        return Ok(match attempts.locked_until(&client.ip, now).await? {
            Some(until) => LoginOutcome::Locked { until },
            None => LoginOutcome::Invalid,
        });
    };

    attempts.clear(&client.ip).await?;
    let user_id = user.id.unwrap_or_default();
    open_session(session, user_id, client);

    let remember = if remember {
        let token = RememberMeRepository::new(pool.clone())
            .create(user_id, &random_token(16))
            .await?;
        Some(token.cookie_value())
    } else {
        None
    };

    tracing::info!("User {} logged in", user.username);
    Ok(LoginOutcome::Success { remember })
}

/// Forget the login and the remember-me token behind `cookie`.
pub async fn logout(pool: &SqlitePool, session: &mut SessionData, cookie: Option<&str>) -> Result<()> {
    if let Some((user_id, token)) = cookie.and_then(parse_remember_cookie) {
        let repo = RememberMeRepository::new(pool.clone());
        if let Some(stored) = repo.find(user_id, token).await? {
            repo.delete(stored.id).await?;
        }
    }
    session.logout();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{create_test_user, test_pool};
    use pretty_assertions::assert_eq;

    fn client() -> ClientInfo {
        ClientInfo {
            ip: "10.0.0.1".to_string(),
            user_agent: "test-agent".to_string(),
        }
    }

    #[tokio::test]
    async fn test_login_and_check() {
        let pool = test_pool().await;
        create_test_user(&pool, "alice", "secret1").await;
        let mut session = SessionData::default();

        let outcome = login(&pool, &mut session, &client(), "alice", "secret1", false)
            .await
            .unwrap();
        assert_eq!(outcome, LoginOutcome::Success { remember: None });
        let token = session.token.clone().unwrap();
        assert_eq!(token.len(), 12);

        let user = login_check(&pool, &session, &client(), Some(&token), true).await.unwrap();
        assert_eq!(user.unwrap().username, "alice");

        let wrong = login_check(&pool, &session, &client(), Some("nope"), true).await.unwrap();
        assert!(wrong.is_none());

        let other = ClientInfo {
            ip: "10.0.0.2".to_string(),
            ..client()
        };
        assert!(login_check(&pool, &session, &other, Some(&token), true).await.unwrap().is_none());
        assert!(login_check(&pool, &session, &client(), None, false).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_lockout_after_five_failures() {
        let pool = test_pool().await;
        create_test_user(&pool, "bob", "secret1").await;
        let mut session = SessionData::default();

        for _ in 0..4 {
            let outcome = login(&pool, &mut session, &client(), "bob", "wrong", false).await.unwrap();
            assert_eq!(outcome, LoginOutcome::Invalid);
        }
        let fifth = login(&pool, &mut session, &client(), "bob", "wrong", false).await.unwrap();
        assert!(matches!(fifth, LoginOutcome::Locked { .. }));

        let correct = login(&pool, &mut session, &client(), "bob", "secret1", false).await.unwrap();
        assert!(matches!(correct, LoginOutcome::Locked { .. }));
        assert!(!session.is_logged_in());
    }

    #[tokio::test]
    async fn test_remember_me_rotates_token() {
        let pool = test_pool().await;
        create_test_user(&pool, "carol", "secret1").await;
        let mut session = SessionData::default();
        let outcome = login(&pool, &mut session, &client(), "carol", "secret1", true).await.unwrap();
        let LoginOutcome::Success { remember: Some(cookie) } = outcome else {
            panic!("expected remember cookie");
        };

        let mut fresh = SessionData::default();
        let renewed = restore_remembered(&pool, &mut fresh, &client(), &cookie).await.unwrap();
        let renewed = renewed.unwrap();
        assert_ne!(renewed, cookie);
        assert!(fresh.is_logged_in());

        let mut again = SessionData::default();
        assert!(restore_remembered(&pool, &mut again, &client(), &cookie).await.unwrap().is_none());

        logout(&pool, &mut fresh, Some(&renewed)).await.unwrap();
        assert!(!fresh.is_logged_in());
        assert!(restore_remembered(&pool, &mut again, &client(), &renewed).await.unwrap().is_none());
    }
}
