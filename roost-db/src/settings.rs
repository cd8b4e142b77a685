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

//! Cached `(module, field) -> value` settings.

use anyhow::{anyhow, Context, Result};
use sqlx::SqlitePool;
use std::collections::{BTreeMap, HashMap};

use crate::query::QueryBuilder;

pub type ModuleSettings = BTreeMap<String, String>;

#[derive(Debug, Clone)]
pub struct Settings {
    pool: SqlitePool,
    cache: HashMap<String, ModuleSettings>,
}

/// Split `module.field`. Anything without exactly one dot is rejected.
fn split_key(key: &str) -> Result<(&str, &str)> {
    match key.split_once('.') {
        Some((module, field)) if !module.is_empty() && !field.is_empty() && !field.contains('.') => {
            Ok((module, field))
        }
        _ => Err(anyhow!("Invalid settings key '{}'", key)),
    }
}

impl Settings {
    pub async fn load(pool: SqlitePool) -> Result<Self> {
        let mut settings = Self {
            pool,
            cache: HashMap::new(),
        };
        settings.reload().await?;
        Ok(settings)
    }

    /// Settings with no backing rows, for rendering without a database.
    pub fn empty(pool: SqlitePool) -> Self {
        Self {
            pool,
            cache: HashMap::new(),
        }
    }

    pub async fn reload(&mut self) -> Result<()> {
        let rows: Vec<(String, String, Option<String>)> =
            sqlx::query_as("SELECT module, field, value FROM settings")
                .fetch_all(&self.pool)
                .await
                .context("Failed to load settings")?;

        self.cache.clear();
        for (module, field, value) in rows {
            let entry = self.cache.entry(module).or_default();
            if let Some(value) = value {
                entry.insert(field, value);
            }
        }
        Ok(())
    }

    /// Look up `module.field`.
    pub fn get(&self, key: &str) -> Option<&str> {
        let (module, field) = split_key(key).ok()?;
        self.get_field(module, field)
    }

    pub fn get_field(&self, module: &str, field: &str) -> Option<&str> {
        self.cache
            .get(module)
            .and_then(|m| m.get(field))
            .map(String::as_str)
    }

    /// A field, or `default` when unset or blank.
    pub fn get_or<'a>(&'a self, module: &str, field: &str, default: &'a str) -> &'a str {
        match self.get_field(module, field) {
            Some(value) if !value.trim().is_empty() => value,
            _ => default,
        }
    }

    pub fn module(&self, module: &str) -> Option<&ModuleSettings> {
        self.cache.get(module)
    }

    pub fn all(&self) -> &HashMap<String, ModuleSettings> {
        &self.cache
    }

    /// Update one existing setting. Returns `false` when no row matched.
    pub async fn set(&mut self, key: &str, value: &str) -> Result<bool> {
        let (module, field) = split_key(key)?;
        self.set_field(module, field, value).await
    }

    pub async fn set_field(&mut self, module: &str, field: &str, value: &str) -> Result<bool> {
        if value.is_empty() {
            return Err(anyhow!("Value cannot be empty"));
        }
        let updated = QueryBuilder::table("settings")
            .where_eq("module", module)
            .where_eq("field", field)
            .update(&self.pool, &[("value", value.into())])
            .await?;
        if updated == 0 {
            return Ok(false);
        }
        self.cache
            .entry(module.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(true)
    }

    /// Write several fields of one module at once, creating missing rows.
    /// Empty values are stored as they are.
    pub async fn update_many(&mut self, module: &str, values: &[(&str, String)]) -> Result<()> {
        for (field, value) in values {
            let updated = QueryBuilder::table("settings")
                .where_eq("module", module)
                .where_eq("field", *field)
                .update(&self.pool, &[("value", value.into())])
                .await?;
            if updated == 0 {
                QueryBuilder::table("settings")
                    .insert(
                        &self.pool,
                        &[
                            ("module", module.into()),
                            ("field", (*field).into()),
                            ("value", value.into()),
                        ],
                    )
                    .await?;
            }
            self.cache
                .entry(module.to_string())
                .or_default()
                .insert(field.to_string(), value.clone());
        }
        tracing::debug!("Saved {} settings for module {}", values.len(), module);
        Ok(())
    }
}
