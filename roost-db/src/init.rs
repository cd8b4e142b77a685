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
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

use crate::install::fresh_install;

/// Open the database, creating the file if needed, and install the basic
/// modules on first start.
pub async fn init_database(database_url: &str, uploads_dir: Option<&Path>) -> Result<SqlitePool> {
    if let Some(path) = database_url.strip_prefix("sqlite:") {
        let path = path.trim_start_matches("//");
        if !path.starts_with(":memory:") {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .context("Failed to create database directory")?;
                }
            }
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)
        .context("Invalid database url")?
        .create_if_missing(true)
        .foreign_keys(false);

    // A single connection keeps in-memory databases alive across queries.
    let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .context("Failed to connect to database")?;

    if fresh_install(&pool, uploads_dir).await? {
        tracing::info!("Fresh install completed for {}", database_url);
    }

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_creates_file_and_installs() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("data").join("roost.db");
        let url = format!("sqlite:{}", db_path.display());

        let pool = init_database(&url, Some(dir.path())).await.unwrap();
        assert!(db_path.exists());

        let settings = Settings::load(pool.clone()).await.unwrap();
        assert_eq!(settings.get("settings.lang_site"), Some("en_english"));
        pool.close().await;

        // Second start keeps existing data.
        let pool = init_database(&url, None).await.unwrap();
        let mut settings = Settings::load(pool).await.unwrap();
        settings.set("settings.title", "Kept").await.unwrap();
        settings.reload().await.unwrap();
        assert_eq!(settings.get("settings.title"), Some("Kept"));
    }
}
