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

//! Translation tables.
//!
//! Each language is one TOML file, `lang/<code>.toml`, where `<code>` looks
//! like `en_english`. Tables group strings by module:
//!
//! ```toml
//! [meta]
//! name = "English"
//!
//! [blog]
//! saved = "Post saved"
//! ```
//!
//! A language is switched off by creating `lang/<code>.lock`. Missing keys
//! fall back to English, then to the key itself.

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_LANG: &str = "en_english";

const EMBEDDED_ENGLISH: &str = include_str!("../lang/en_english.toml");
const EMBEDDED_FRENCH: &str = include_str!("../lang/fr_french.toml");

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(transparent)]
pub struct LangTable(BTreeMap<String, BTreeMap<String, String>>);

impl LangTable {
    pub fn parse(raw: &str) -> Result<Self> {
        let table: BTreeMap<String, BTreeMap<String, String>> =
            toml::from_str(raw).context("Failed to parse language file")?;
        Ok(Self(table))
    }

    pub fn get(&self, section: &str, key: &str) -> String {
        self.0
            .get(section)
            .and_then(|s| s.get(key))
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get("meta").and_then(|m| m.get("name")).map(String::as_str)
    }

    /// Fill every key missing here from `fallback`.
    fn merge_missing(&mut self, fallback: &LangTable) {
        for (section, entries) in &fallback.0 {
            let target = self.0.entry(section.clone()).or_default();
            for (key, value) in entries {
                target.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LangInfo {
    pub code: String,
    pub name: String,
    /// `en` for `en_english`.
    pub prefix: String,
    pub active: bool,
}

/// Language files on disk.
#[derive(Debug, Clone)]
pub struct LangStore {
    dir: PathBuf,
    english: LangTable,
}

impl LangStore {
    /// Open the language directory, writing the bundled languages when
    /// their files are missing.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create language directory {}", dir.display()))?;
        for (code, body) in [(DEFAULT_LANG, EMBEDDED_ENGLISH), ("fr_french", EMBEDDED_FRENCH)] {
            let path = dir.join(format!("{}.toml", code));
            if !path.exists() {
                std::fs::write(&path, body)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
            }
        }
        Ok(Self {
            dir,
            english: LangTable::parse(EMBEDDED_ENGLISH)?,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn lock_path(&self, code: &str) -> PathBuf {
        self.dir.join(format!("{}.lock", code))
    }

    pub fn exists(&self, code: &str) -> bool {
        valid_code(code) && self.dir.join(format!("{}.toml", code)).is_file()
    }

    pub fn is_active(&self, code: &str) -> bool {
        self.exists(code) && !self.lock_path(code).exists()
    }

    /// Every installed language, sorted by code.
    pub fn available(&self) -> Result<Vec<LangInfo>> {
        let mut langs = Vec::new();
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read {}", self.dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                continue;
            }
            let Some(code) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !valid_code(code) {
                continue;
            }
            let name = std::fs::read_to_string(&path)
                .ok()
                .and_then(|raw| LangTable::parse(&raw).ok())
                .and_then(|t| t.name().map(str::to_string))
                .unwrap_or_else(|| code.to_string());
            langs.push(LangInfo {
                code: code.to_string(),
                name,
                prefix: roost_core::utils::text::lang_prefix(code).to_string(),
                active: !self.lock_path(code).exists(),
            });
        }
        langs.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(langs)
    }

    pub fn active(&self) -> Result<Vec<LangInfo>> {
        Ok(self.available()?.into_iter().filter(|l| l.active).collect())
    }

    /// Find the active language whose URL prefix is `prefix`.
    pub fn code_for_prefix(&self, prefix: &str) -> Option<String> {
        self.active()
            .ok()?
            .into_iter()
            .find(|l| l.prefix == prefix)
            .map(|l| l.code)
    }

    pub fn set_active(&self, code: &str, active: bool) -> Result<()> {
        if !self.exists(code) {
            return Err(anyhow!("Unknown language {}", code));
        }
        let lock = self.lock_path(code);
        if active {
            if lock.exists() {
                std::fs::remove_file(&lock)
                    .with_context(|| format!("Failed to remove {}", lock.display()))?;
            }
        } else {
            std::fs::write(&lock, "")
                .with_context(|| format!("Failed to write {}", lock.display()))?;
        }
        tracing::info!("Language {} active: {}", code, active);
        Ok(())
    }

    /// Load a language, completed with English for missing strings.
    pub fn load(&self, code: &str) -> LangTable {
        let mut table = if self.exists(code) {
            let path = self.dir.join(format!("{}.toml", code));
            match std::fs::read_to_string(&path)
                .context("Failed to read language file")
                .and_then(|raw| LangTable::parse(&raw))
            {
                Ok(table) => table,
                Err(e) => {
                    tracing::warn!("Language {} unusable: {:#}", code, e);
                    LangTable::default()
                }
            }
        } else {
            LangTable::default()
        };
        table.merge_missing(&self.english);
        table
    }
}

fn valid_code(code: &str) -> bool {
    !code.is_empty()
        && code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_bundled_languages_are_written() {
        let dir = TempDir::new().unwrap();
        let store = LangStore::new(dir.path()).unwrap();
        let codes: Vec<String> = store.available().unwrap().into_iter().map(|l| l.code).collect();
        assert_eq!(codes, vec!["en_english".to_string(), "fr_french".to_string()]);
        assert!(store.is_active("en_english"));
    }

    #[test]
    fn test_lock_file_deactivates() {
        let dir = TempDir::new().unwrap();
        let store = LangStore::new(dir.path()).unwrap();
        store.set_active("fr_french", false).unwrap();
        assert!(dir.path().join("fr_french.lock").exists());
        assert!(!store.is_active("fr_french"));
        assert_eq!(store.code_for_prefix("fr"), None);

        store.set_active("fr_french", true).unwrap();
        assert_eq!(store.code_for_prefix("fr"), Some("fr_french".to_string()));
    }

    #[test]
    fn test_missing_keys_fall_back() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("de_german.toml"), "[meta]\nname = \"Deutsch\"\n").unwrap();
        let store = LangStore::new(dir.path()).unwrap();
        let table = store.load("de_german");
        assert_eq!(table.name(), Some("Deutsch"));
        assert_eq!(table.get("general", "save"), "Save");
        assert_eq!(table.get("general", "no_such_key"), "no_such_key");
    }

    #[test]
    fn test_unknown_language_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = LangStore::new(dir.path()).unwrap();
        assert!(store.set_active("../etc", false).is_err());
        assert!(!store.exists("xx_none"));
    }
}
