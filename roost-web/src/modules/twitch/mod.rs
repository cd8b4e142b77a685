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

//! Twitch live status through the Helix API.

pub mod admin;
pub mod site;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

pub const MODULE: &str = "twitch";

const AUTH_URL: &str = "https://id.twitch.tv";
const API_URL: &str = "https://api.twitch.tv";
/// How long a stream lookup is reused.
pub const STATUS_TTL: Duration = Duration::from_secs(600);
/// How long a failed lookup is read as offline before retrying.
pub const FAILURE_TTL: Duration = Duration::from_secs(60);

/// Application credentials from the module settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwitchCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl TwitchCredentials {
    /// `None` unless both values are filled in.
    pub fn new(client_id: &str, client_secret: &str) -> Option<Self> {
        let client_id = client_id.trim();
        let client_secret = client_secret.trim();
        if client_id.is_empty() || client_secret.is_empty() {
            return None;
        }
        Some(Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct StreamsResponse {
    data: Vec<Stream>,
}

#[derive(Debug, Deserialize)]
struct Stream {
    user_login: String,
}

#[derive(Debug, Clone)]
struct AppToken {
    value: String,
    client_id: String,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct Cache {
    token: Option<AppToken>,
    /// Sorted, lowercased handle list to the online ones and expiry.
    streams: HashMap<String, (Instant, Vec<String>)>,
}

/// Shared Helix client. Clones share the token and the status cache.
#[derive(Clone)]
pub struct TwitchClient {
    http: reqwest::Client,
    auth_url: String,
    api_url: String,
    cache: Arc<RwLock<Cache>>,
}

fn normalize(handles: &[String]) -> Vec<String> {
    let mut handles: Vec<String> = handles
        .iter()
        .map(|h| h.trim().to_lowercase())
        .filter(|h| !h.is_empty())
        .collect();
    handles.sort();
    handles.dedup();
    handles
}

impl TwitchClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_urls(http, AUTH_URL, API_URL)
    }

    pub fn with_urls(http: reqwest::Client, auth_url: &str, api_url: &str) -> Self {
        Self {
            http,
            auth_url: auth_url.trim_end_matches('/').to_string(),
            api_url: api_url.trim_end_matches('/').to_string(),
            cache: Arc::new(RwLock::new(Cache::default())),
        }
    }

    /// Forget the token and every cached status.
    pub async fn clear_cache(&self) {
        let mut cache = self.cache.write().await;
        *cache = Cache::default();
        tracing::debug!("Twitch cache cleared");
    }

    async fn token(&self, credentials: &TwitchCredentials) -> Result<String> {
        if let Some(token) = &self.cache.read().await.token {
            if token.client_id == credentials.client_id && token.expires_at > Instant::now() {
                return Ok(token.value.clone());
            }
        }

        let url = format!("{}/oauth2/token", self.auth_url);
        let response: TokenResponse = self
            .http
            .post(&url)
            .query(&[
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .context("Failed to reach Twitch authentication")?
            .error_for_status()
            .context("Twitch refused the client credentials")?
            .json()
            .await
            .context("Invalid Twitch token response")?;

        let lifetime = Duration::from_secs(response.expires_in.saturating_sub(60));
        self.cache.write().await.token = Some(AppToken {
            value: response.access_token.clone(),
            client_id: credentials.client_id.clone(),
            expires_at: Instant::now() + lifetime,
        });
        tracing::info!("Obtained a Twitch app token valid for {}s", lifetime.as_secs());
        Ok(response.access_token)
    }

    async fn fetch_online(&self, credentials: &TwitchCredentials, handles: &[String]) -> Result<Vec<String>> {
        let token = self.token(credentials).await?;
        let mut query: Vec<(&str, &str)> = handles.iter().map(|h| ("user_login", h.as_str())).collect();
        query.push(("first", "100"));
        let url = format!("{}/helix/streams", self.api_url);
        let response = self
            .http
            .get(&url)
            .query(&query)
            .header("Client-Id", &credentials.client_id)
            .bearer_auth(token)
            .send()
            .await
            .context("Failed to reach the Twitch API")?;
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            self.cache.write().await.token = None;
            return Err(anyhow!("Twitch token rejected"));
        }
        let streams: StreamsResponse = response
            .error_for_status()
            .context("Twitch streams request failed")?
            .json()
            .await
            .context("Invalid Twitch streams response")?;
        Ok(streams
            .data
            .into_iter()
            .map(|s| s.user_login.to_lowercase())
            .collect())
    }

    /// Lowercased logins among `handles` currently streaming. Lookups are
    /// cached for [`STATUS_TTL`]. Failures are logged and read as offline
    /// for [`FAILURE_TTL`].
    pub async fn online_channels(&self, credentials: &TwitchCredentials, handles: &[String]) -> Vec<String> {
        let handles = normalize(handles);
        if handles.is_empty() {
            return Vec::new();
        }
        let key = handles.join("-");
        if let Some((expires_at, online)) = self.cache.read().await.streams.get(&key) {
            if *expires_at > Instant::now() {
                return online.clone();
            }
        }

        let mut online = Vec::new();
        let mut ttl = STATUS_TTL;
        // Helix takes at most 100 logins per request.
        for chunk in handles.chunks(100) {
            match self.fetch_online(credentials, chunk).await {
                Ok(found) => online.extend(found),
                Err(e) => {
                    tracing::warn!("Twitch status unavailable: {:#}", e);
                    online.clear();
                    ttl = FAILURE_TTL;
                    break;
                }
            }
        }
        self.cache
            .write()
            .await
            .streams
            .insert(key, (Instant::now() + ttl, online.clone()));
        online
    }

    #[cfg(test)]
    pub async fn prime(&self, handles: &[String], online: &[&str]) {
        let key = normalize(handles).join("-");
        let online = online.iter().map(|h| h.to_lowercase()).collect();
        self.cache
            .write()
            .await
            .streams
            .insert(key, (Instant::now() + STATUS_TTL, online));
    }

    #[cfg(test)]
    pub async fn is_cached(&self, handles: &[String]) -> bool {
        let key = normalize(handles).join("-");
        self.cache.read().await.streams.contains_key(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Query, State};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Default)]
    struct Calls {
        tokens: Arc<AtomicUsize>,
        streams: Arc<AtomicUsize>,
        misses: Arc<AtomicUsize>,
    }

    async fn fake_twitch() -> (String, Calls) {
        let calls = Calls::default();
        let app = Router::new()
            .route(
                "/oauth2/token",
                post(|State(calls): State<Calls>| async move {
                    calls.tokens.fetch_add(1, Ordering::SeqCst);
                    Json(json!({"access_token": "abc", "expires_in": 3600, "token_type": "bearer"}))
                }),
            )
            .route(
                "/helix/streams",
                get(
                    |State(calls): State<Calls>, Query(query): Query<Vec<(String, String)>>| async move {
                        calls.streams.fetch_add(1, Ordering::SeqCst);
                        let live: Vec<Value> = query
                            .iter()
                            .filter(|(k, v)| k == "user_login" && v.starts_with("live"))
                            .map(|(_, v)| json!({"user_login": v, "user_name": v.to_uppercase()}))
                            .collect();
                        Json(json!({"data": live}))
                    },
                ),
            )
            .fallback(|State(calls): State<Calls>| async move {
                calls.misses.fetch_add(1, Ordering::SeqCst);
                axum::http::StatusCode::NOT_FOUND
            })
            .with_state(calls.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), calls)
    }

    fn credentials() -> TwitchCredentials {
        TwitchCredentials::new("id", "secret").unwrap()
    }

    #[test]
    fn test_credentials_need_both_values() {
        assert!(TwitchCredentials::new("id", " ").is_none());
        assert!(TwitchCredentials::new("", "secret").is_none());
    }

    #[tokio::test]
    async fn test_online_channels_are_cached() {
        let (base, calls) = fake_twitch().await;
        let client = TwitchClient::with_urls(reqwest::Client::new(), &base, &base);
        let handles = vec!["LiveOne".to_string(), "sleepy".to_string()];

        let online = client.online_channels(&credentials(), &handles).await;
        assert_eq!(online, vec!["liveone".to_string()]);
        client.online_channels(&credentials(), &handles).await;
        assert_eq!(calls.streams.load(Ordering::SeqCst), 1);
        assert_eq!(calls.tokens.load(Ordering::SeqCst), 1);

        client.clear_cache().await;
        client.online_channels(&credentials(), &handles).await;
        assert_eq!(calls.streams.load(Ordering::SeqCst), 2);
        assert_eq!(calls.tokens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_token_is_reused_across_lookups() {
        let (base, calls) = fake_twitch().await;
        let client = TwitchClient::with_urls(reqwest::Client::new(), &base, &base);
        client.online_channels(&credentials(), &["a".to_string()]).await;
        client.online_channels(&credentials(), &["b".to_string()]).await;
        assert_eq!(calls.tokens.load(Ordering::SeqCst), 1);
        assert_eq!(calls.streams.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unreachable_api_reads_offline() {
        let client = TwitchClient::with_urls(reqwest::Client::new(), "http://127.0.0.1:9", "http://127.0.0.1:9");
        assert!(client.online_channels(&credentials(), &["live".to_string()]).await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_lookup_is_cached_briefly() {
        let (base, calls) = fake_twitch().await;
        let client = TwitchClient::with_urls(reqwest::Client::new(), &base, &format!("{}/down", base));
        let handles = vec!["live".to_string()];

        assert!(client.online_channels(&credentials(), &handles).await.is_empty());
        assert!(client.is_cached(&handles).await);
        assert!(client.online_channels(&credentials(), &handles).await.is_empty());
        assert_eq!(calls.misses.load(Ordering::SeqCst), 1);
        assert_eq!(calls.tokens.load(Ordering::SeqCst), 1);

        let (expires_at, _) = client.cache.read().await.streams["live"].clone();
        assert!(expires_at <= Instant::now() + FAILURE_TTL);
    }
}
