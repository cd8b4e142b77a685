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

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::notification::{Notification, NotifyKind};

/// Values a visitor carries between requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionData {
    pub user_id: Option<i64>,
    /// Anti-forgery token appended to every admin link as `?t=`.
    pub token: Option<String>,
    pub user_agent: Option<String>,
    pub ip: Option<String>,
    pub success: Option<String>,
    pub failure: Option<String>,
    /// Submitted form values kept to refill the form after a failed save.
    pub form: Option<serde_json::Map<String, serde_json::Value>>,
    /// Last content language chosen in each admin module.
    #[serde(default)]
    pub last_lang: HashMap<String, String>,
    /// Language the visitor is browsing the site in.
    #[serde(default)]
    pub lang: Option<String>,
}

impl SessionData {
    pub fn is_logged_in(&self) -> bool {
        self.user_id.is_some() && self.token.is_some()
    }

    pub fn notify(&mut self, notification: Notification) {
        match notification.kind {
            NotifyKind::Success => self.success = Some(notification.text),
            NotifyKind::Failure => self.failure = Some(notification.text),
        }
    }

    /// Pop the pending notification. Failures are reported before successes.
    pub fn take_notify(&mut self) -> Option<Notification> {
        if let Some(text) = self.failure.take() {
            return Some(Notification::failure(text));
        }
        self.success.take().map(Notification::success)
    }

    pub fn take_form(&mut self) -> Option<serde_json::Map<String, serde_json::Value>> {
        self.form.take()
    }

    pub fn logout(&mut self) {
        self.user_id = None;
        self.token = None;
        self.user_agent = None;
        self.ip = None;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: String,
    pub data: SessionData,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Create an anonymous session with default expiration (24 hours)
    pub fn new() -> Self {
        Self::new_with_expiry(Duration::hours(24))
    }

    pub fn new_with_expiry(expiry_duration: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            data: SessionData::default(),
            expires_at: now + expiry_duration,
            created_at: now,
        }
    }

    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_session() {
        let before = Utc::now();
        let session = Session::new();
        let after = Utc::now();

        assert!(!session.id.is_empty());
        assert!(session.created_at >= before && session.created_at <= after);
        assert_eq!(session.expires_at, session.created_at + Duration::hours(24));
        assert!(!session.data.is_logged_in());
    }

    #[test]
    fn test_new_session_unique_ids() {
        assert_ne!(Session::new().id, Session::new().id);
    }

    #[test]
    fn test_is_expired() {
        let session = Session::new_with_expiry(Duration::seconds(-1));
        assert!(session.is_expired());
        assert!(!Session::new().is_expired());
    }

    #[test]
    fn test_failure_is_reported_first() {
        let mut data = SessionData::default();
        data.notify(Notification::success("Saved"));
        data.notify(Notification::failure("Broken"));

        let first = data.take_notify().unwrap();
        assert_eq!(first.kind, NotifyKind::Failure);
        assert_eq!(first.text, "Broken");

        let second = data.take_notify().unwrap();
        assert_eq!(second.kind, NotifyKind::Success);
        assert!(data.take_notify().is_none());
    }

    #[test]
    fn test_session_data_serialization() {
        let mut data = SessionData {
            user_id: Some(3),
            token: Some("abc".to_string()),
            ..Default::default()
        };
        data.last_lang.insert("blog".to_string(), "fr_french".to_string());

        let json = serde_json::to_string(&data).unwrap();
        let back: SessionData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, data);
        assert!(back.is_logged_in());
    }

    #[test]
    fn test_logout_keeps_flash() {
        let mut data = SessionData {
            user_id: Some(1),
            token: Some("abc".to_string()),
            ..Default::default()
        };
        data.notify(Notification::success("Bye"));
        data.logout();
        assert!(!data.is_logged_in());
        assert!(data.take_notify().is_some());
    }
}
