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

use anyhow::{Context, Result};
use chrono::Utc;
use roost_core::models::session::{Session, SessionData};
use sqlx::SqlitePool;

use super::from_timestamp;

pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace the session and its data.
    pub async fn save(&self, session: &Session) -> Result<()> {
        let data = serde_json::to_string(&session.data).context("Failed to encode session data")?;
        sqlx::query(
            r#"
            INSERT INTO sessions (id, data, expires_at, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET data = excluded.data, expires_at = excluded.expires_at
            "#,
        )
        .bind(&session.id)
        .bind(data)
        .bind(session.expires_at.timestamp())
        .bind(session.created_at.timestamp())
        .execute(&self.pool)
        .await
        .context("Failed to save session")?;

        Ok(())
    }

    /// Find a live session. Expired ones are removed and reported missing.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<Session>> {
        let row = sqlx::query_as::<_, (String, String, i64, i64)>(
            r#"
            SELECT id, data, expires_at, created_at
            FROM sessions
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to find session by id")?;

        let Some((id, data, expires_at, created_at)) = row else {
            return Ok(None);
        };

        let session = Session {
            id,
            // A corrupt payload only loses the flash messages and login.
            data: serde_json::from_str::<SessionData>(&data).unwrap_or_default(),
            expires_at: from_timestamp(expires_at),
            created_at: from_timestamp(created_at),
        };

        if session.is_expired() {
            self.delete(&session.id).await?;
            return Ok(None);
        }
        Ok(Some(session))
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    pub async fn delete_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await
            .context("Failed to delete expired sessions")?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::installed_pool;
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use roost_core::models::notification::Notification;

    #[tokio::test]
    async fn test_session_data_survives_round_trip() {
        let repo = SessionRepository::new(installed_pool().await);
        let mut session = Session::new();
        session.data.user_id = Some(1);
        session.data.token = Some("abc".into());
        session.data.notify(Notification::failure("Nope"));
        repo.save(&session).await.unwrap();

        let mut found = repo.find_by_id(&session.id).await.unwrap().unwrap();
        assert!(found.data.is_logged_in());
        assert_eq!(found.data.take_notify(), Some(Notification::failure("Nope")));

        found.data.logout();
        repo.save(&found).await.unwrap();
        let again = repo.find_by_id(&session.id).await.unwrap().unwrap();
        assert!(!again.data.is_logged_in());
    }

    #[tokio::test]
    async fn test_expired_sessions_are_dropped() {
        let repo = SessionRepository::new(installed_pool().await);
        let expired = Session::new_with_expiry(Duration::seconds(-10));
        let live = Session::new();
        repo.save(&expired).await.unwrap();
        repo.save(&live).await.unwrap();

        assert_eq!(repo.delete_expired().await.unwrap(), 1);
        assert!(repo.find_by_id(&expired.id).await.unwrap().is_none());
        assert!(repo.find_by_id(&live.id).await.unwrap().is_some());
    }
}
