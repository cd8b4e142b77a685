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
use axum::extract::FromRef;
use sqlx::SqlitePool;
use std::time::Duration;

use crate::autoreload_templates::TemplateEngine;
use crate::config::Config;
use crate::lang::LangStore;
use crate::modules::twitch::TwitchClient;
use crate::templates::init_templates;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub templates: TemplateEngine,
    pub config: Config,
    pub lang: LangStore,
    pub twitch: TwitchClient,
    /// Outbound client for Twitch, Horaro and the update feed.
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(db: SqlitePool, templates: TemplateEngine, config: Config, lang: LangStore) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("Roost/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            db,
            templates,
            config,
            lang,
            twitch: TwitchClient::new(http.clone()),
            http,
        })
    }

    /// Open the database, write missing default templates and language
    /// files, and create the uploads directory.
    pub async fn from_config(config: Config) -> Result<Self> {
        let uploads = config.uploads_path();
        std::fs::create_dir_all(&uploads)
            .with_context(|| format!("Failed to create uploads directory {}", uploads.display()))?;

        tracing::info!("Initializing database: {}", config.database_url);
        let db = roost_db::init_database(&config.database_url, Some(&uploads)).await?;

        tracing::info!("Loading templates from: {}", config.templates_dir);
        let templates = init_templates(&config.templates_dir, config.development_mode)?;

        let lang = LangStore::new(&config.lang_dir)?;
        Self::new(db, templates, config, lang)
    }
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}
