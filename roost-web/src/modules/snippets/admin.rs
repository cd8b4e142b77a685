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
use async_trait::async_trait;
use roost_core::models::snippet::{LocalizedContent, Snippet};
use roost_core::utils::create_slug;
use roost_db::repositories::SnippetRepository;
use serde::Serialize;
use tera::Context;

use super::MODULE;
use crate::core::Core;
use crate::form::FormData;
use crate::modules::helpers;
use crate::modules::{AdminModule, AdminRequest, NavItem, Output};

#[derive(Debug, Serialize)]
struct SnippetRow {
    id: i64,
    name: String,
    tag: String,
    edit_url: String,
    delete_url: String,
}

#[derive(Debug, Serialize)]
struct ContentField {
    code: String,
    name: String,
    text: String,
}

pub struct SnippetsAdmin;

impl SnippetsAdmin {
    fn repo(core: &Core) -> SnippetRepository {
        SnippetRepository::new(core.db().clone())
    }

    async fn manage(&self, core: &mut Core) -> Result<Output> {
        let rows: Vec<SnippetRow> = Self::repo(core)
            .list()
            .await?
            .into_iter()
            .map(|snippet| {
                let id = snippet.id.unwrap_or_default();
                SnippetRow {
                    id,
                    tag: snippet.tag(),
                    name: snippet.name,
                    edit_url: core.admin_url(&format!("snippets/edit/{}", id)),
                    delete_url: core.admin_url(&format!("snippets/delete/{}", id)),
                }
            })
            .collect();
        let mut ctx = Context::new();
        ctx.insert("snippets", &rows);
        ctx.insert("add_url", &core.admin_url("snippets/add"));
        helpers::view(core, "modules/snippets/admin/manage.html", ctx)
    }

    async fn form(&self, core: &mut Core, id: Option<i64>) -> Result<Output> {
        let snippet = match id {
            Some(id) => match Self::repo(core).find_by_id(id).await? {
                Some(snippet) => Some(snippet),
                None => return Ok(helpers::redirect(core, "snippets/manage")),
            },
            None => None,
        };
        let form = core.take_form();
        let content = snippet.as_ref().map(|s| s.content.clone()).unwrap_or_default();
        let fields: Vec<ContentField> = helpers::languages(core)
            .into_iter()
            .map(|language| {
                let key = format!("content[{}]", language.code);
                let text = form
                    .get(&key)
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| content.get(&language.code).unwrap_or_default().to_string());
                ContentField {
                    code: language.code,
                    name: language.name,
                    text,
                }
            })
            .collect();

        let mut ctx = Context::new();
        ctx.insert("form", &form);
        ctx.insert("fields", &fields);
        ctx.insert("editor", &core.setting("settings", "editor"));
        let save_path = match id {
            Some(id) => format!("snippets/save/{}", id),
            None => "snippets/save".to_string(),
        };
        ctx.insert("save_url", &core.admin_url(&save_path));
        ctx.insert("manage_url", &core.admin_url("snippets/manage"));
        ctx.insert("tag", &snippet.as_ref().map(Snippet::tag));
        ctx.insert("snippet", &snippet);
        helpers::view(core, "modules/snippets/admin/form.html", ctx)
    }

    async fn save(&self, core: &mut Core, id: Option<i64>, form: &FormData) -> Result<Output> {
        let repo = Self::repo(core);
        let back = match id {
            Some(id) => format!("snippets/edit/{}", id),
            None => "snippets/add".to_string(),
        };
        let name = form.text("name");
        if name.is_empty() {
            let text = core.lang_text("general", "fill_inputs");
            return Ok(helpers::reject(core, form, text, &back));
        }
        let slug = create_slug(&name);
        if slug.is_empty() {
            let text = core.lang_text("general", "wrong_slug");
            return Ok(helpers::reject(core, form, text, &back));
        }
        if repo.slug_taken(&slug, id).await? {
            let text = core.lang_text(MODULE, "already_exists");
            return Ok(helpers::reject(core, form, text, &back));
        }

        let mut content = LocalizedContent::default();
        for language in helpers::languages(core) {
            if let Some(text) = form.get(&format!("content[{}]", language.code)) {
                content.set(&language.code, text.to_string());
            }
        }
        let mut snippet = Snippet {
            id,
            name,
            slug,
            content,
        };
        let id = match id {
            Some(id) => {
                let Some(existing) = repo.find_by_id(id).await? else {
                    return Ok(Output::NotFound);
                };
                // Languages switched off keep their text.
                for (lang, text) in existing.content.0 {
                    if snippet.content.get(&lang).is_none() {
                        snippet.content.set(&lang, text);
                    }
                }
                repo.update(&snippet).await?;
                id
            }
            None => repo.create(&snippet).await?,
        };
        let text = core.lang_text(MODULE, "save_success");
        Ok(helpers::success(core, text, &format!("snippets/edit/{}", id)))
    }

    async fn delete(&self, core: &mut Core, id: i64) -> Result<Output> {
        let repo = Self::repo(core);
        if repo.find_by_id(id).await?.is_none() {
            let text = core.lang_text(MODULE, "delete_failure");
            return Ok(helpers::failure(core, text, "snippets/manage"));
        }
        repo.delete(id).await?;
        let text = core.lang_text(MODULE, "delete_success");
        Ok(helpers::success(core, text, "snippets/manage"))
    }
}

#[async_trait]
impl AdminModule for SnippetsAdmin {
    fn name(&self) -> &'static str {
        MODULE
    }

    fn navigation(&self, core: &Core) -> Vec<NavItem> {
        vec![
            NavItem::new(core.lang_text("general", "manage"), "manage"),
            NavItem::new(core.lang_text(MODULE, "add"), "add"),
        ]
    }

    async fn dispatch(&self, core: &mut Core, request: AdminRequest) -> Result<Output> {
        match (request.action.as_str(), request.id(0)) {
            ("manage", _) => self.manage(core).await,
            ("add", _) => self.form(core, None).await,
            ("edit", Some(id)) => self.form(core, Some(id)).await,
            ("save", id) if request.is_post() => self.save(core, id, &request.form).await,
            ("delete", Some(id)) => self.delete(core, id).await,
            _ => Ok(Output::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::admin_core;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_save_stores_segments_and_refuses_duplicates() {
        let (mut core, _dirs) = admin_core().await;
        let form = FormData::from_pairs([
            ("name", "Site Footer"),
            ("content[en_english]", "Hello"),
            ("content[fr_french]", "Bonjour"),
        ]);
        SnippetsAdmin
            .dispatch(&mut core, AdminRequest::post("save", &[], form))
            .await
            .unwrap();
        let snippet = SnippetsAdmin::repo(&core).find_by_id(1).await.unwrap().unwrap();
        assert_eq!(snippet.slug, "site-footer");
        assert_eq!(snippet.content.get("fr_french"), Some("Bonjour"));

        let form = FormData::from_pairs([("name", "site footer"), ("content[en_english]", "x")]);
        SnippetsAdmin
            .dispatch(&mut core, AdminRequest::post("save", &[], form))
            .await
            .unwrap();
        assert_eq!(
            core.session.data.failure.as_deref(),
            Some(core.lang_text(MODULE, "already_exists").as_str())
        );
    }

    #[tokio::test]
    async fn test_manage_shows_literal_tag() {
        let (mut core, _dirs) = admin_core().await;
        let form = FormData::from_pairs([("name", "Footer"), ("content[en_english]", "Hi")]);
        SnippetsAdmin
            .dispatch(&mut core, AdminRequest::post("save", &[], form))
            .await
            .unwrap();
        let out = SnippetsAdmin
            .dispatch(&mut core, AdminRequest::get("manage", &[]))
            .await
            .unwrap();
        assert!(matches!(out, Output::Html(ref html) if html.contains("{&#36;snippet.footer}")));
    }
}
