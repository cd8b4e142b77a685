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

use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tera::{Context, Filter, Tera, Value};

use crate::core::no_parse;
use crate::markdown::make_markdown_filter;
use roost_core::estimated_time_text;

/// A wrapper around Tera that can reload templates in development mode
pub enum TemplateEngine {
    /// Static templates loaded once at startup
    Static(Arc<Tera>),
    /// Reloadable templates that refresh on each render
    Reloadable {
        templates_dir: String,
        cached: Arc<RwLock<Tera>>,
    },
}

impl TemplateEngine {
    /// Create a new template engine
    pub fn new(templates_dir: &str, development_mode: bool) -> Result<Self> {
        let tera = Self::create_tera_instance(templates_dir)?;
        if development_mode {
            tracing::info!("Template hot reload enabled (development mode)");
            Ok(Self::Reloadable {
                templates_dir: templates_dir.to_string(),
                cached: Arc::new(RwLock::new(tera)),
            })
        } else {
            tracing::info!("Templates loaded once (production mode)");
            Ok(Self::Static(Arc::new(tera)))
        }
    }

    fn create_tera_instance(templates_dir: &str) -> Result<Tera> {
        // Themes, admin screens and feeds all live under the same root
        let pattern = format!("{}/**/*", templates_dir);
        let mut tera = Tera::new(&pattern)?;

        tera.register_filter("markdown", make_markdown_filter());
        tera.register_filter("no_parse", NoParseFilter);
        tera.register_filter("duration", DurationFilter);

        Ok(tera)
    }

    /// Render a template
    pub fn render(&self, template_name: &str, context: &Context) -> Result<String> {
        match self {
            Self::Static(tera) => Ok(tera.render(template_name, context)?),
            Self::Reloadable {
                templates_dir,
                cached,
            } => {
                match Self::create_tera_instance(templates_dir) {
                    Ok(new_tera) => {
                        if let Ok(mut write_guard) = cached.write() {
                            *write_guard = new_tera;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to reload templates: {}. Using cached version.", e);
                    }
                }
                let read_guard = cached
                    .read()
                    .map_err(|_| anyhow::anyhow!("Template cache lock poisoned"))?;
                Ok(read_guard.render(template_name, context)?)
            }
        }
    }

    /// Whether a template with this name was loaded. Themes use it to fall
    /// back to the default theme.
    pub fn has_template(&self, template_name: &str) -> bool {
        match self {
            Self::Static(tera) => tera.get_template_names().any(|n| n == template_name),
            Self::Reloadable { cached, .. } => cached
                .read()
                .map(|tera| tera.get_template_names().any(|n| n == template_name))
                .unwrap_or(false),
        }
    }

    /// Loaded template names under `prefix`, sorted.
    pub fn names_under(&self, prefix: &str) -> Vec<String> {
        let collect = |tera: &Tera| {
            let mut names: Vec<String> = tera
                .get_template_names()
                .filter(|n| n.starts_with(prefix))
                .map(str::to_string)
                .collect();
            names.sort();
            names
        };
        match self {
            Self::Static(tera) => collect(tera),
            Self::Reloadable { cached, .. } => cached.read().map(|tera| collect(&tera)).unwrap_or_default(),
        }
    }
}

impl Clone for TemplateEngine {
    fn clone(&self) -> Self {
        match self {
            Self::Static(tera) => Self::Static(Arc::clone(tera)),
            Self::Reloadable {
                templates_dir,
                cached,
            } => Self::Reloadable {
                templates_dir: templates_dir.clone(),
                cached: Arc::clone(cached),
            },
        }
    }
}

/// Shows `{$module.key}` tags literally instead of expanding them.
struct NoParseFilter;

impl Filter for NoParseFilter {
    fn filter(&self, value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
        match value.as_str() {
            Some(text) => Ok(Value::String(no_parse(text))),
            None => Err(tera::Error::msg("no_parse filter expects a string")),
        }
    }
}

/// Seconds formatted as `01h 30m 00s`.
struct DurationFilter;

impl Filter for DurationFilter {
    fn filter(&self, value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
        let seconds = value
            .as_i64()
            .ok_or_else(|| tera::Error::msg("duration filter only works on integers"))?;
        Ok(Value::String(estimated_time_text(seconds)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn engine_with(files: &[(&str, &str)], development_mode: bool) -> (TempDir, TemplateEngine) {
        let dir = TempDir::new().unwrap();
        for (name, body) in files {
            let path = dir.path().join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, body).unwrap();
        }
        let engine = TemplateEngine::new(dir.path().to_str().unwrap(), development_mode).unwrap();
        (dir, engine)
    }

    #[test]
    fn test_filters_are_registered() {
        let (_dir, engine) = engine_with(
            &[("t.txt", "{{ tag | no_parse }}|{{ secs | duration }}")],
            false,
        );
        let mut ctx = Context::new();
        ctx.insert("tag", "{$snippet.footer}");
        ctx.insert("secs", &5400);
        let out = engine.render("t.txt", &ctx).unwrap();
        assert_eq!(out, "{&#36;snippet.footer}|01h 30m 00s");
    }

    #[test]
    fn test_has_template() {
        let (_dir, engine) = engine_with(&[("themes/default/index.html", "hi")], false);
        assert!(engine.has_template("themes/default/index.html"));
        assert!(!engine.has_template("themes/other/index.html"));
    }

    #[test]
    fn test_names_under() {
        let (_dir, engine) = engine_with(
            &[
                ("themes/default/post.html", "p"),
                ("themes/default/index.html", "i"),
                ("admin/layout.html", "l"),
            ],
            false,
        );
        assert_eq!(
            engine.names_under("themes/default/"),
            vec!["themes/default/index.html", "themes/default/post.html"]
        );
    }

    #[test]
    fn test_reloadable_picks_up_changes() {
        let (dir, engine) = engine_with(&[("t.html", "one")], true);
        assert_eq!(engine.render("t.html", &Context::new()).unwrap(), "one");
        std::fs::write(dir.path().join("t.html"), "two").unwrap();
        assert_eq!(engine.render("t.html", &Context::new()).unwrap(), "two");
    }
}
