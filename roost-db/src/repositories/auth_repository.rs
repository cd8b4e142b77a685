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

//! Remember-me tokens and failed login bookkeeping.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;

use super::from_timestamp;
use crate::query::QueryBuilder;

pub const REMEMBER_ME_DAYS: i64 = 30;
pub const MAX_LOGIN_ATTEMPTS: i64 = 5;
pub const LOGIN_LOCK_MINUTES: i64 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct RememberToken {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub expiry: DateTime<Utc>,
}

impl RememberToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expiry
    }

    /// Cookie value, `user_id:token`.
    pub fn cookie_value(&self) -> String {
        format!("{}:{}", self.user_id, self.token)
    }
}

/// Split a remember-me cookie into user id and token.
pub fn parse_remember_cookie(raw: &str) -> Option<(i64, &str)> {
    let (user_id, token) = raw.split_once(':')?;
    if token.is_empty() || token.contains(':') {
        return None;
    }
    Some((user_id.parse().ok()?, token))
}

pub struct RememberMeRepository {
    pool: SqlitePool,
}

impl RememberMeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user_id: i64, token: &str) -> Result<RememberToken> {
        let expiry = Utc::now() + Duration::days(REMEMBER_ME_DAYS);
        let id = QueryBuilder::table("remember_me")
            .insert(
                &self.pool,
                &[
                    ("token", token.into()),
                    ("user_id", user_id.into()),
                    ("expiry", expiry.timestamp().into()),
                ],
            )
            .await?;
        Ok(RememberToken {
            id,
            user_id,
            token: token.to_string(),
            expiry: from_timestamp(expiry.timestamp()),
        })
    }

    pub async fn find(&self, user_id: i64, token: &str) -> Result<Option<RememberToken>> {
        let row = sqlx::query_as::<_, (i64, i64, String, i64)>(
            "SELECT id, user_id, token, expiry FROM remember_me WHERE user_id = ? AND token = ?",
        )
        .bind(user_id)
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to find remember-me token")?;

        Ok(row.map(|(id, user_id, token, expiry)| RememberToken {
            id,
            user_id,
            token,
            expiry: from_timestamp(expiry),
        }))
    }

    /// Push the expiry another 30 days out.
    pub async fn renew(&self, id: i64) -> Result<()> {
        let expiry = Utc::now() + Duration::days(REMEMBER_ME_DAYS);
        QueryBuilder::table("remember_me")
            .where_eq("id", id)
            .update(&self.pool, &[("expiry", expiry.timestamp().into())])
            .await?;
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        QueryBuilder::table("remember_me")
            .where_eq("id", id)
            .delete(&self.pool)
            .await?;
        Ok(())
    }
}

pub struct LoginAttemptRepository {
    pool: SqlitePool,
}

impl LoginAttemptRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn get(&self, ip: &str) -> Result<Option<(i64, i64)>> {
        sqlx::query_as::<_, (i64, i64)>("SELECT attempts, expires FROM login_attempts WHERE ip = ?")
            .bind(ip)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to read login attempts")
    }

    /// When the address is locked out, the moment the lock ends.
    pub async fn locked_until(&self, ip: &str, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
        match self.get(ip).await? {
            Some((attempts, expires)) if attempts >= MAX_LOGIN_ATTEMPTS => {
                if now.timestamp() < expires {
                    Ok(Some(from_timestamp(expires)))
                } else {
                    self.clear(ip).await?;
                    Ok(None)
                }
            }
            _ => Ok(None),
        }
    }

    /// Count a failed login. Returns the attempts so far; reaching the
    /// maximum locks the address for ten minutes.
    pub async fn record_failure(&self, ip: &str, now: DateTime<Utc>) -> Result<i64> {
        let attempts = self.get(ip).await?.map(|(a, _)| a).unwrap_or(0) + 1;
        let expires = if attempts >= MAX_LOGIN_ATTEMPTS {
            (now + Duration::minutes(LOGIN_LOCK_MINUTES)).timestamp()
        } else {
            0
        };
        sqlx::query(
            r#"
            INSERT INTO login_attempts (ip, attempts, expires) VALUES (?, ?, ?)
            ON CONFLICT(ip) DO UPDATE SET attempts = excluded.attempts, expires = excluded.expires
            "#,
        )
        .bind(ip)
        .bind(attempts)
        .bind(expires)
        .execute(&self.pool)
        .await
        .context("Failed to record login attempt")?;
        Ok(attempts)
    }

    pub async fn clear(&self, ip: &str) -> Result<()> {
        QueryBuilder::table("login_attempts")
            .where_eq("ip", ip)
            .delete(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::installed_pool;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_remember_cookie() {
        assert_eq!(parse_remember_cookie("3:abcdef"), Some((3, "abcdef")));
        assert_eq!(parse_remember_cookie("x:abcdef"), None);
        assert_eq!(parse_remember_cookie("3:"), None);
        assert_eq!(parse_remember_cookie("3:a:b"), None);
        assert_eq!(parse_remember_cookie("nothing"), None);
    }

    #[tokio::test]
    async fn test_remember_token_lifecycle() {
        let repo = RememberMeRepository::new(installed_pool().await);
        let token = repo.create(1, "tok").await.unwrap();
        assert_eq!(token.cookie_value(), "1:tok");

        let found = repo.find(1, "tok").await.unwrap().unwrap();
        assert!(!found.is_expired(Utc::now()));
        assert!(found.is_expired(Utc::now() + Duration::days(31)));
        assert!(repo.find(2, "tok").await.unwrap().is_none());

        repo.renew(found.id).await.unwrap();
        repo.delete(found.id).await.unwrap();
        assert!(repo.find(1, "tok").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lockout_after_five_failures() {
        let repo = LoginAttemptRepository::new(installed_pool().await);
        let now = Utc::now();

        for expected in 1..MAX_LOGIN_ATTEMPTS {
            assert_eq!(repo.record_failure("10.0.0.1", now).await.unwrap(), expected);
            assert!(repo.locked_until("10.0.0.1", now).await.unwrap().is_none());
        }
        repo.record_failure("10.0.0.1", now).await.unwrap();
        assert!(repo.locked_until("10.0.0.1", now).await.unwrap().is_some());
        assert!(repo.locked_until("10.0.0.2", now).await.unwrap().is_none());

        let later = now + Duration::minutes(LOGIN_LOCK_MINUTES + 1);
        assert!(repo.locked_until("10.0.0.1", later).await.unwrap().is_none());
        assert_eq!(repo.record_failure("10.0.0.1", later).await.unwrap(), 1);
    }
}
