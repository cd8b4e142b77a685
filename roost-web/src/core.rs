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

//! The per-request context handed to every module.

use anyhow::Result;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use roost_core::models::notification::{Notification, NotificationView};
use roost_core::models::session::Session;
use roost_core::models::user::User;
use roost_core::utils::text::lang_prefix;
use roost_core::Router;
use roost_db::Settings;
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::PathBuf;
use tera::Context;
use tokio::sync::OwnedMutexGuard;

use crate::config::Config;
use crate::form::FormData;
use crate::lang::LangTable;
use crate::modules::SiteRoute;
use crate::AppState;

static TAG_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\$([A-Za-z0-9_\-]+)\.([A-Za-z0-9_\-]+)\}").expect("tag regex is valid")
});

const GENERATOR_META: &str = r#"<meta name="generator" content="Roost" />"#;
const FALLBACK_DATE_FORMAT: &str = "%Y-%m-%d";

/// Escape `{$module.key}` tags so they are shown instead of expanded.
pub fn no_parse(text: &str) -> String {
    text.replace("{$", "{&#36;")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Header,
    Footer,
}

impl Location {
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("footer") {
            Location::Footer
        } else {
            Location::Header
        }
    }
}

pub struct Core {
    pub state: AppState,
    pub settings: Settings,
    pub lang_code: String,
    pub lang: LangTable,
    pub session: OwnedMutexGuard<Session>,
    pub user: Option<User>,
    /// Request path without the leading slash.
    pub path: String,
    /// Scheme and host of the request, such as `https://example.org`.
    pub base_url: String,
    pub router: Router<SiteRoute>,
    vars: Context,
    tags: HashMap<String, String>,
    header: Vec<String>,
    footer: Vec<String>,
    timezone: Tz,
}

impl Core {
    pub async fn new(state: &AppState, session: OwnedMutexGuard<Session>, path: &str) -> Result<Self> {
        let settings = Settings::load(state.db.clone()).await?;
        let timezone = match settings.get_or("settings", "timezone", "UTC").parse::<Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                tracing::warn!("Unknown timezone setting, using UTC");
                Tz::UTC
            }
        };
        let lang_code = settings
            .get_or("settings", "lang_site", crate::lang::DEFAULT_LANG)
            .to_string();
        let lang = state.lang.load(&lang_code);
        Ok(Self {
            state: state.clone(),
            settings,
            lang_code,
            lang,
            session,
            user: None,
            path: path.trim_matches('/').to_string(),
            base_url: String::new(),
            router: Router::new(),
            vars: Context::new(),
            tags: HashMap::new(),
            header: Vec::new(),
            footer: Vec::new(),
            timezone,
        })
    }

    pub fn db(&self) -> &SqlitePool {
        &self.state.db
    }

    pub fn config(&self) -> &Config {
        &self.state.config
    }

    pub fn set_language(&mut self, code: &str) {
        self.lang_code = code.to_string();
        self.lang = self.state.lang.load(code);
    }

    /// `en` for `en_english`.
    pub fn lang_prefix(&self) -> &str {
        lang_prefix(&self.lang_code)
    }

    /// Leading path segment of site links: empty for the site language,
    /// `fr/` for `fr_french` otherwise.
    pub fn url_prefix(&self) -> String {
        if self.lang_code == self.settings.get_or("settings", "lang_site", crate::lang::DEFAULT_LANG) {
            String::new()
        } else {
            format!("{}/", self.lang_prefix())
        }
    }

    pub fn lang_text(&self, section: &str, key: &str) -> String {
        self.lang.get(section, key)
    }

    /// A setting value, empty when unset.
    pub fn setting(&self, module: &str, field: &str) -> String {
        self.settings.get_or(module, field, "").to_string()
    }

    pub fn setting_i64(&self, module: &str, field: &str, default: i64) -> i64 {
        self.settings
            .get_field(module, field)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// A field of the logged-in user's row.
    pub fn user_info(&self, field: &str) -> Option<Value> {
        let user = self.user.as_ref()?;
        serde_json::to_value(user).ok()?.get(field).cloned()
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user.as_ref().and_then(|u| u.id)
    }

    pub fn notify(&mut self, notification: Notification) {
        self.session.data.notify(notification);
    }

    pub fn take_notify(&mut self) -> Option<NotificationView> {
        self.session.data.take_notify().map(NotificationView::from)
    }

    /// Keep the submitted values to refill the form after a redirect.
    pub fn keep_form(&mut self, form: &FormData) {
        self.session.data.form = Some(form.to_json_map());
    }

    pub fn take_form(&mut self) -> Map<String, Value> {
        self.session.data.take_form().unwrap_or_default()
    }

    pub fn assign<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) {
        self.vars.insert(key, value);
    }

    /// Make `{$module.key}` expand to `value` in rendered output.
    pub fn set_tag(&mut self, module: &str, key: &str, value: impl Into<String>) {
        self.tags.insert(format!("{}.{}", module, key), value.into());
    }

    pub fn tag(&self, module: &str, key: &str) -> Option<&str> {
        self.tags.get(&format!("{}.{}", module, key)).map(String::as_str)
    }

    /// Replace known tags. Unknown ones stay as written.
    pub fn expand_tags(&self, text: &str) -> String {
        TAG_REGEX
            .replace_all(text, |caps: &Captures| {
                match self.tags.get(&format!("{}.{}", &caps[1], &caps[2])) {
                    Some(value) => value.clone(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    pub fn add_css(&mut self, url: &str) {
        self.header.push(format!(
            r#"<link rel="stylesheet" href="{}">"#,
            html_escape::encode_double_quoted_attribute(url)
        ));
    }

    pub fn add_js(&mut self, url: &str, location: Location) {
        let tag = format!(
            r#"<script src="{}"></script>"#,
            html_escape::encode_double_quoted_attribute(url)
        );
        self.append(tag, location);
    }

    pub fn append(&mut self, html: impl Into<String>, location: Location) {
        match location {
            Location::Header => self.header.push(html.into()),
            Location::Footer => self.footer.push(html.into()),
        }
    }

    pub fn header_html(&self) -> String {
        std::iter::once(GENERATOR_META)
            .chain(self.header.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn footer_html(&self) -> String {
        self.footer.join("\n")
    }

    pub fn url(&self, path: &str) -> String {
        format!("/{}", path.trim_start_matches('/'))
    }

    /// Absolute URL for feeds, sitemaps and meta tags.
    pub fn absolute_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, self.url(path))
    }

    /// Admin link carrying the session token.
    pub fn admin_url(&self, path: &str) -> String {
        let base = format!(
            "/{}/{}",
            self.config().admin_path,
            path.trim_start_matches('/')
        );
        match self.session.data.token.as_deref() {
            Some(token) => {
                let sep = if base.contains('?') { '&' } else { '?' };
                format!("{}{}t={}", base, sep, token)
            }
            None => base,
        }
    }

    pub fn uploads_dir(&self, module: &str) -> PathBuf {
        self.config().module_uploads(module)
    }

    pub fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Format in the site timezone. An invalid pattern falls back to ISO dates.
    pub fn format_date(&self, date: DateTime<Utc>, format: &str) -> String {
        let format = if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
            FALLBACK_DATE_FORMAT
        } else {
            format
        };
        date.with_timezone(&self.timezone).format(format).to_string()
    }

    /// Variables every template sees.
    pub fn base_context(&self) -> Context {
        let mut ctx = self.vars.clone();
        ctx.insert("settings", self.settings.all());
        ctx.insert(
            "site",
            &self.settings.module("settings").cloned().unwrap_or_default(),
        );
        ctx.insert("lang", &self.lang);
        ctx.insert("lang_code", &self.lang_code);
        ctx.insert("lang_prefix", self.lang_prefix());
        ctx.insert("url_prefix", &self.url_prefix());
        ctx.insert("header", &self.header_html());
        ctx.insert("footer", &self.footer_html());
        ctx.insert("user", &self.user);
        ctx.insert("token", &self.session.data.token);
        ctx.insert("admin_base", &format!("/{}", self.config().admin_path));
        ctx.insert("path", &self.path);
        ctx.insert("base_url", &self.base_url);
        ctx.insert("year", &self.format_date(self.now(), "%Y"));
        ctx
    }

    /// Render a template with the shared variables plus `extra`.
    pub fn draw(&self, template: &str, extra: Context) -> Result<String> {
        let mut ctx = self.base_context();
        ctx.extend(extra);
        self.state.templates.render(template, &ctx)
    }

    /// Theme template path, falling back to the default theme.
    pub fn theme_template(&self, template: &str) -> String {
        let theme = self.settings.get_or("settings", "theme", "default");
        let themed = format!("themes/{}/{}", theme, template);
        if self.state.templates.has_template(&themed) {
            themed
        } else {
            format!("themes/default/{}", template)
        }
    }

    /// Page templates of the current theme, such as `index.html`.
    pub fn theme_templates(&self) -> Vec<String> {
        let theme = self.settings.get_or("settings", "theme", "default");
        let prefix = format!("themes/{}/", theme);
        self.state
            .templates
            .names_under(&prefix)
            .into_iter()
            .filter_map(|name| name.strip_prefix(&prefix).map(str::to_string))
            .filter(|name| name.ends_with(".html") && !name.contains('/') && name != "base.html")
            .collect()
    }

    /// Render a public page: theme template, flash message and tags.
    pub fn render_page(&mut self, template: &str) -> Result<String> {
        let mut extra = Context::new();
        extra.insert("notification", &self.take_notify());
        let name = self.theme_template(template);
        let html = self.draw(&name, extra)?;
        Ok(self.expand_tags(&html))
    }
}
