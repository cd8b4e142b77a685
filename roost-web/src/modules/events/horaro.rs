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

//! Client for the public Horaro schedule API.

use anyhow::{Context, Result};
use roost_core::models::event::{HoraroSchedule, HORARO_BASE_URL};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ScheduleEnvelope {
    data: HoraroSchedule,
}

#[derive(Clone)]
pub struct HoraroClient {
    http: reqwest::Client,
    base_url: String,
}

impl HoraroClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_base_url(http, HORARO_BASE_URL)
    }

    pub fn with_base_url(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn schedule_url(&self, event: &str, schedule: &str) -> String {
        format!(
            "{}/-/api/v1/events/{}/schedules/{}",
            self.base_url,
            urlencode(event),
            urlencode(schedule)
        )
    }

    pub async fn fetch(&self, event: &str, schedule: &str) -> Result<HoraroSchedule> {
        let url = self.schedule_url(event, schedule);
        let envelope: ScheduleEnvelope = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?
            .error_for_status()
            .with_context(|| format!("Horaro refused {}", url))?
            .json()
            .await
            .context("Invalid Horaro schedule")?;
        Ok(envelope.data)
    }

    /// The schedule, or `None` when Horaro cannot provide it.
    pub async fn schedule(&self, event: &str, schedule: &str) -> Option<HoraroSchedule> {
        match self.fetch(event, schedule).await {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::warn!("Horaro schedule {}/{} unavailable: {:#}", event, schedule, e);
                None
            }
        }
    }
}

fn urlencode(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_schedule_url() {
        let client = HoraroClient::new(reqwest::Client::new());
        assert_eq!(
            client.schedule_url("sta2024", "main"),
            "https://horaro.org/-/api/v1/events/sta2024/schedules/main"
        );
    }

    #[test]
    fn test_envelope_parsing() {
        let raw = r#"{"data": {"name": "Main", "columns": ["Game"], "items": [
            {"scheduled_t": 10, "length_t": 5, "data": ["Mario"]}
        ]}}"#;
        let envelope: ScheduleEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.data.name.as_deref(), Some("Main"));
        assert_eq!(envelope.data.items[0].ends_at(), 15);
    }

    #[tokio::test]
    async fn test_unreachable_host_gives_none() {
        let client = HoraroClient::with_base_url(reqwest::Client::new(), "http://127.0.0.1:9");
        assert!(client.schedule("a", "b").await.is_none());
    }
}
