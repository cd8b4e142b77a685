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

//! Small pieces shared by the admin controllers.

use anyhow::Result;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use roost_core::models::notification::Notification;
use serde_json::json;
use tera::Context;

use crate::config::Config;
use crate::core::Core;
use crate::form::FormData;
use crate::lang::LangInfo;
use crate::modules::{AdminRequest, Output};
use crate::uploads;

const INPUT_DATETIME: &str = "%Y-%m-%dT%H:%M";

/// Redirect to an admin page of the current session.
pub fn redirect(core: &Core, path: &str) -> Output {
    Output::Redirect(core.admin_url(path))
}

pub fn success(core: &mut Core, text: impl Into<String>, path: &str) -> Output {
    core.notify(Notification::success(text));
    redirect(core, path)
}

/// Send the form back with a failure message and its values kept.
pub fn reject(core: &mut Core, form: &FormData, text: impl Into<String>, path: &str) -> Output {
    core.notify(Notification::failure(text));
    core.keep_form(form);
    redirect(core, path)
}

pub fn failure(core: &mut Core, text: impl Into<String>, path: &str) -> Output {
    core.notify(Notification::failure(text));
    redirect(core, path)
}

pub fn view(core: &Core, template: &str, ctx: Context) -> Result<Output> {
    Ok(Output::Html(core.draw(template, ctx)?))
}

/// Active languages for language pickers.
pub fn languages(core: &Core) -> Vec<LangInfo> {
    core.state.lang.active().unwrap_or_default()
}

/// Content language an admin list shows: `?lang=` when given and active,
/// then the last one picked in this module, then the site language.
pub fn content_lang(core: &mut Core, module: &str, request: &AdminRequest) -> String {
    if let Some(lang) = request.query("lang").filter(|l| core.state.lang.is_active(l)) {
        let lang = lang.to_string();
        core.session
            .data
            .last_lang
            .insert(module.to_string(), lang.clone());
        return lang;
    }
    if let Some(lang) = core.session.data.last_lang.get(module) {
        if core.state.lang.is_active(lang) {
            return lang.clone();
        }
    }
    core.setting("settings", "lang_site")
}

/// Parse a `datetime-local` input in the site timezone.
pub fn parse_datetime(core: &Core, raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    let naive = NaiveDateTime::parse_from_str(raw, INPUT_DATETIME)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()?;
    core.timezone()
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Value for a `datetime-local` input.
pub fn input_datetime(core: &Core, date: DateTime<Utc>) -> String {
    core.format_date(date, INPUT_DATETIME)
}

/// Image posted by the WYSIWYG editor. Answers `{status, result}` with the
/// file URL or the error text.
pub fn editor_upload(core: &Core, module: &str, form: &FormData) -> Result<Output> {
    let failure = || {
        Output::Json(json!({
            "status": "failure",
            "result": core.lang_text("general", "editor_upload_fail"),
        }))
    };
    let Some(file) = form.file("file") else {
        return Ok(failure());
    };
    let dir = uploads::module_dir(&core.config().uploads_path(), module)?;
    match uploads::save_picture(&dir, &file.filename, None, &file.bytes) {
        Ok(name) => Ok(Output::Json(json!({
            "status": "success",
            "result": Config::upload_url(module, &name),
        }))),
        Err(e) => {
            tracing::warn!("Editor upload refused: {:#}", e);
            Ok(failure())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{admin_core, png_bytes};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_datetime_round_trip_in_site_timezone() {
        let (mut core, _dirs) = admin_core().await;
        core.settings
            .set_field("settings", "timezone", "Europe/Paris")
            .await
            .unwrap();
        let core = Core::new(&core.state.clone(), core.session, "").await.unwrap();
        let parsed = parse_datetime(&core, "2024-07-01T12:30").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-07-01T10:30:00+00:00");
        assert_eq!(input_datetime(&core, parsed), "2024-07-01T12:30");
        assert!(parse_datetime(&core, "yesterday").is_none());
    }

    #[tokio::test]
    async fn test_content_lang_is_remembered() {
        let (mut core, _dirs) = admin_core().await;
        let mut request = AdminRequest::get("manage", &[]);
        assert_eq!(content_lang(&mut core, "pages", &request), "en_english");

        request.query.insert("lang".into(), "fr_french".into());
        assert_eq!(content_lang(&mut core, "pages", &request), "fr_french");
        request.query.clear();
        assert_eq!(content_lang(&mut core, "pages", &request), "fr_french");

        request.query.insert("lang".into(), "xx_none".into());
        assert_eq!(content_lang(&mut core, "pages", &request), "fr_french");
    }

    #[tokio::test]
    async fn test_editor_upload() {
        let (core, dirs) = admin_core().await;
        let form = FormData::default().with_file("file", "shot.png", png_bytes(8, 8));
        let Output::Json(answer) = editor_upload(&core, "pages", &form).unwrap() else {
            panic!("json expected");
        };
        assert_eq!(answer["status"], "success");
        let url = answer["result"].as_str().unwrap();
        assert!(url.starts_with("/uploads/pages/shot-"));
        let name = url.rsplit('/').next().unwrap();
        assert!(dirs.uploads().join("pages").join(name).exists());

        let form = FormData::default().with_file("file", "notes.txt", b"plain text here".to_vec());
        let Output::Json(answer) = editor_upload(&core, "pages", &form).unwrap() else {
            panic!("json expected");
        };
        assert_eq!(answer["status"], "failure");
    }
}
