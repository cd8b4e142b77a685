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

//! Submitted form values, from either urlencoded or multipart bodies.

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::{header, Method},
};
use serde_json::{Map, Value};

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Bytes,
}

/// Posted fields in submission order. Array fields (`name[]`) are read with
/// [`FormData::all`].
#[derive(Debug, Clone, Default)]
pub struct FormData {
    fields: Vec<(String, String)>,
    files: Vec<(String, UploadedFile)>,
}

impl FormData {
    pub fn from_pairs<K: Into<String>, V: Into<String>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            fields: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            files: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.files.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Trimmed value, empty when absent.
    pub fn text(&self, name: &str) -> String {
        self.get(name).map(|v| v.trim().to_string()).unwrap_or_default()
    }

    /// Trimmed value, `None` when absent or blank.
    pub fn optional(&self, name: &str) -> Option<String> {
        Some(self.text(name)).filter(|v| !v.is_empty())
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(|v| v.trim().parse().ok())
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|v| v.trim().replace(',', ".").parse().ok())
    }

    /// Checkbox semantics: present and not `0`.
    pub fn checked(&self, name: &str) -> bool {
        matches!(self.get(name), Some(v) if !v.is_empty() && v != "0")
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Every value posted as `name` or `name[]`.
    pub fn all(&self, name: &str) -> Vec<String> {
        let array = format!("{}[]", name);
        self.fields
            .iter()
            .filter(|(k, _)| *k == name || *k == array)
            .map(|(_, v)| v.clone())
            .collect()
    }

    /// Every value of `name[]` parsed as ids.
    pub fn ids(&self, name: &str) -> Vec<i64> {
        self.all(name)
            .iter()
            .filter_map(|v| v.trim().parse().ok())
            .collect()
    }

    /// An uploaded file, ignoring empty file inputs.
    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files(name).into_iter().next()
    }

    /// Every non-empty file posted as `name` or `name[]`.
    pub fn files(&self, name: &str) -> Vec<&UploadedFile> {
        let array = format!("{}[]", name);
        self.files
            .iter()
            .filter(|(k, f)| (*k == name || *k == array) && !f.filename.is_empty() && !f.bytes.is_empty())
            .map(|(_, f)| f)
            .collect()
    }

    /// Fields as JSON, kept in the session to refill a rejected form.
    pub fn to_json_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        for (key, value) in &self.fields {
            if key.contains("password") {
                continue;
            }
            let key = key.trim_end_matches("[]").to_string();
            match map.get_mut(&key) {
                Some(Value::Array(items)) => items.push(Value::String(value.clone())),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, Value::String(value.clone())]);
                }
                None => {
                    map.insert(key, Value::String(value.clone()));
                }
            }
        }
        map
    }

    #[cfg(test)]
    pub fn with_file(mut self, name: &str, filename: &str, bytes: Vec<u8>) -> Self {
        self.files.push((
            name.to_string(),
            UploadedFile {
                filename: filename.to_string(),
                bytes: Bytes::from(bytes),
            },
        ));
        self
    }
}

impl<S> FromRequest<S> for FormData
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if req.method() == Method::GET || req.method() == Method::HEAD {
            return Ok(Self::default());
        }

        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if content_type.starts_with("multipart/form-data") {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::bad_request(format!("Invalid multipart body: {}", e)))?;
            let mut form = Self::default();
            while let Some(field) = multipart
                .next_field()
                .await
                .map_err(|e| AppError::bad_request(format!("Invalid multipart field: {}", e)))?
            {
                let name = field.name().unwrap_or_default().to_string();
                match field.file_name().map(str::to_string) {
                    Some(filename) => {
                        let bytes = field
                            .bytes()
                            .await
                            .map_err(|e| AppError::bad_request(format!("Upload failed: {}", e)))?;
                        form.files.push((name, UploadedFile { filename, bytes }));
                    }
                    None => {
                        let value = field
                            .text()
                            .await
                            .map_err(|e| AppError::bad_request(format!("Invalid field: {}", e)))?;
                        form.fields.push((name, value));
                    }
                }
            }
            return Ok(form);
        }

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::bad_request(format!("Failed to read body: {}", e)))?;
        let fields: Vec<(String, String)> = serde_urlencoded::from_bytes(&bytes)
            .map_err(|e| AppError::bad_request(format!("Invalid form body: {}", e)))?;
        Ok(Self {
            fields,
            files: Vec::new(),
        })
    }
}
