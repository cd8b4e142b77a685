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
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const CONFIG_FILE: &str = "roost.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub templates_dir: String,
    pub uploads_dir: String,
    pub static_dir: String,
    pub lang_dir: String,
    /// Reload templates on every render.
    pub development_mode: bool,
    /// First path segment of the administration panel.
    pub admin_path: String,
    pub session_timeout_minutes: i64,
    pub secure_cookies: bool,
    pub max_upload_size: usize,
    pub update_feed_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite:roost.db".to_string(),
            host: "0.0.0.0".to_string(),
            port: 3000,
            templates_dir: "templates".to_string(),
            uploads_dir: "uploads".to_string(),
            static_dir: "static".to_string(),
            lang_dir: "lang".to_string(),
            development_mode: false,
            admin_path: "admin".to_string(),
            session_timeout_minutes: 60 * 24,
            secure_cookies: false,
            max_upload_size: 10 * 1024 * 1024,
            update_feed_url: "https://roost.rs/releases/latest.json".to_string(),
        }
    }
}

impl Config {
    /// Defaults, then `roost.toml`, then `ROOST_*` environment variables.
    pub fn load() -> Result<Self> {
        Self::figment(CONFIG_FILE)
            .extract()
            .context("Failed to load configuration")
    }

    pub fn figment(file: &str) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed("ROOST_"))
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn uploads_path(&self) -> PathBuf {
        PathBuf::from(&self.uploads_dir)
    }

    /// Directory holding the uploads of one module.
    pub fn module_uploads(&self, module: &str) -> PathBuf {
        self.uploads_path().join(module)
    }

    /// Public URL of an uploaded file.
    pub fn upload_url(module: &str, file: &str) -> String {
        format!("/uploads/{}/{}", module, file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_defaults_without_file_or_env() {
        let config: Config = Config::figment("does-not-exist.toml").extract().unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
        assert_eq!(config.admin_path, "admin");
    }

    #[test]
    #[serial]
    fn test_file_and_env_override_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "roost.toml",
                r#"
                port = 8080
                admin_path = "manage"
                "#,
            )?;
            jail.set_env("ROOST_PORT", "9090");
            jail.set_env("ROOST_DEVELOPMENT_MODE", "true");

            let config: Config = Config::figment("roost.toml").extract()?;
            assert_eq!(config.port, 9090);
            assert_eq!(config.admin_path, "manage");
            assert!(config.development_mode);
            assert_eq!(config.database_url, "sqlite:roost.db");
            Ok(())
        });
    }

    #[test]
    fn test_upload_paths() {
        let config = Config {
            uploads_dir: "/srv/uploads".to_string(),
            ..Config::default()
        };
        assert_eq!(config.module_uploads("blog"), PathBuf::from("/srv/uploads/blog"));
        assert_eq!(Config::upload_url("blog", "a.jpg"), "/uploads/blog/a.jpg");
    }
}
