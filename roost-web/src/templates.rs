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

//! Templates and static assets shipped inside the binary. They are written
//! to disk on startup when missing, so a site can override any of them.

use anyhow::{Context, Result};
use std::path::Path;

use crate::autoreload_templates::TemplateEngine;

macro_rules! embedded {
    ($root:literal, [$($file:literal),* $(,)?]) => {
        &[$(($file, include_str!(concat!("../", $root, "/", $file)))),*]
    };
}

pub const TEMPLATES: &[(&str, &str)] = embedded!(
    "templates",
    [
        "admin/layout.html",
        "admin/login.html",
        "admin/pagination.html",
        "modules/blog/admin/form.html",
        "modules/blog/admin/manage.html",
        "modules/blog/admin/settings.html",
        "modules/blog/feed.xml",
        "modules/dashboard/admin/main.html",
        "modules/events/admin/form.html",
        "modules/events/admin/group_form.html",
        "modules/events/admin/groups.html",
        "modules/events/admin/manage.html",
        "modules/events/admin/settings.html",
        "modules/events_registration/admin/export.html",
        "modules/events_registration/admin/form.html",
        "modules/events_registration/admin/manage.html",
        "modules/events_registration/admin/settings.html",
        "modules/galleries/admin/edit.html",
        "modules/galleries/admin/manage.html",
        "modules/members/admin/form.html",
        "modules/members/admin/manage.html",
        "modules/members/admin/settings.html",
        "modules/pagelist/admin/form.html",
        "modules/pagelist/admin/link.html",
        "modules/pagelist/admin/manage.html",
        "modules/pages/admin/form.html",
        "modules/pages/admin/manage.html",
        "modules/settings/admin/general.html",
        "modules/settings/admin/languages.html",
        "modules/settings/admin/modules.html",
        "modules/settings/admin/themes.html",
        "modules/settings/admin/updates.html",
        "modules/sitemap/admin/settings.html",
        "modules/sitemap/sitemap.xml",
        "modules/snippets/admin/form.html",
        "modules/snippets/admin/manage.html",
        "modules/twitch/admin/settings.html",
        "modules/users/admin/form.html",
        "modules/users/admin/manage.html",
        "modules/users/admin/profile.html",
        "themes/default/base.html",
        "themes/default/blog.html",
        "themes/default/event.html",
        "themes/default/events.html",
        "themes/default/gallery.html",
        "themes/default/index.html",
        "themes/default/members.html",
        "themes/default/pagelist.html",
        "themes/default/post.html",
        "themes/default/register.html",
        "themes/default/twitch_embed.html",
    ]
);

pub const STATIC_FILES: &[(&str, &str)] = embedded!(
    "static",
    [
        "css/admin.css",
        "css/blog.css",
        "css/events.css",
        "css/events_registration.css",
        "css/galleries.css",
        "css/members.css",
        "css/style.css",
        "img/default-avatar.svg",
        "img/default-cover.svg",
        "img/default-member.svg",
        "js/admin.js",
        "js/events_registration.js",
    ]
);

/// Write every embedded file missing under `dir`. Returns how many were
/// written.
pub fn write_missing(dir: &Path, files: &[(&str, &str)]) -> Result<usize> {
    let mut written = 0;
    for (name, content) in files {
        let path = dir.join(name);
        if path.exists() {
            continue;
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        written += 1;
    }
    Ok(written)
}

pub fn init_templates(templates_dir: &str, development_mode: bool) -> Result<TemplateEngine> {
    std::fs::create_dir_all(templates_dir).context("Failed to create templates directory")?;
    let written = write_missing(Path::new(templates_dir), TEMPLATES)?;
    if written > 0 {
        tracing::info!("Wrote {} default templates to {}", written, templates_dir);
    }
    TemplateEngine::new(templates_dir, development_mode)
}

pub fn init_static(static_dir: &str) -> Result<()> {
    let written = write_missing(Path::new(static_dir), STATIC_FILES)?;
    if written > 0 {
        tracing::info!("Wrote {} static files to {}", written, static_dir);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_existing_files_are_kept() {
        let dir = TempDir::new().unwrap();
        let custom = dir.path().join("themes/default/index.html");
        std::fs::create_dir_all(custom.parent().unwrap()).unwrap();
        std::fs::write(&custom, "mine").unwrap();

        let written = write_missing(dir.path(), TEMPLATES).unwrap();
        assert_eq!(written, TEMPLATES.len() - 1);
        assert_eq!(std::fs::read_to_string(&custom).unwrap(), "mine");
        assert_eq!(write_missing(dir.path(), TEMPLATES).unwrap(), 0);
    }

    #[test]
    fn test_every_template_parses() {
        let dir = TempDir::new().unwrap();
        let templates_dir = dir.path().to_string_lossy().to_string();
        let engine = init_templates(&templates_dir, false).unwrap();
        for (name, _) in TEMPLATES {
            assert!(engine.has_template(name), "{} not loaded", name);
        }
    }
}
