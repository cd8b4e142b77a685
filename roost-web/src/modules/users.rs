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

//! Administrator accounts: listing, the account form and "my profile".

use anyhow::Result;
use async_trait::async_trait;
use roost_core::models::user::{Access, User, UserStatus, ROOT_USER_ID};
use roost_db::install::manifest;
use roost_db::repositories::{ModuleRepository, UserRepository};
use serde::Serialize;
use tera::Context;

use crate::config::Config;
use crate::core::Core;
use crate::form::FormData;
use crate::modules::helpers;
use crate::modules::{AdminModule, AdminRequest, NavItem, Output};
use crate::uploads;

pub const MODULE: &str = "users";
pub const DEFAULT_AVATAR: &str = "/static/img/default-avatar.svg";
const AVATAR_SIZE: u32 = 512;

pub fn avatar_url(user: &User) -> String {
    match user.avatar.as_deref() {
        Some(avatar) if !avatar.is_empty() => Config::upload_url(MODULE, avatar),
        _ => DEFAULT_AVATAR.to_string(),
    }
}

#[derive(Debug, Serialize)]
struct UserRow {
    id: i64,
    username: String,
    fullname: String,
    email: String,
    status: &'static str,
    avatar: String,
    edit_url: String,
    delete_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct ModuleChoice {
    dir: String,
    name: String,
    icon: String,
    selected: bool,
}

fn status_key(status: UserStatus) -> &'static str {
    match status {
        UserStatus::Active => "active",
        UserStatus::Inactive => "inactive",
        UserStatus::Blocked => "blocked",
    }
}

/// Installed modules a user can be granted, with the current grant marked.
async fn module_choices(core: &Core, access: Option<&Access>) -> Result<Vec<ModuleChoice>> {
    let dirs = ModuleRepository::new(core.db().clone()).list().await?;
    Ok(dirs
        .into_iter()
        .filter(|dir| dir != "dashboard")
        .map(|dir| {
            let (name, icon) = manifest(&dir)
                .map(|m| (m.name.to_string(), m.icon.to_string()))
                .unwrap_or_else(|| (dir.clone(), String::new()));
            ModuleChoice {
                selected: access.is_some_and(|a| a.allows(&dir)),
                dir,
                name,
                icon,
            }
        })
        .collect())
}

/// Store an uploaded avatar cropped square, replacing the previous one.
fn store_avatar(core: &Core, user: &mut User, form: &FormData) -> Result<bool> {
    let Some(file) = form.file("photo") else {
        return Ok(true);
    };
    let dir = uploads::module_dir(&core.config().uploads_path(), MODULE)?;
    let stored = uploads::save_picture(&dir, &file.filename, Some(&format!("avatar-{}", user.username)), &file.bytes)
        .and_then(|name| uploads::crop_square(&dir.join(&name), AVATAR_SIZE).map(|_| name));
    match stored {
        Ok(name) => {
            if let Some(old) = user.avatar.as_deref() {
                uploads::remove_file(&dir, old)?;
            }
            user.avatar = Some(name);
            Ok(true)
        }
        Err(e) => {
            tracing::warn!("Avatar refused for {}: {:#}", user.username, e);
            Ok(false)
        }
    }
}

pub struct UsersAdmin;

impl UsersAdmin {
    fn repo(core: &Core) -> UserRepository {
        UserRepository::new(core.db().clone())
    }

    async fn manage(&self, core: &mut Core) -> Result<Output> {
        let my_id = core.user_id();
        let mut users = Self::repo(core).list().await?;
        users.sort_by_key(|u| u.status.as_i64());
        let rows: Vec<UserRow> = users
            .iter()
            .map(|user| {
                let id = user.id.unwrap_or_default();
                UserRow {
                    id,
                    username: user.username.clone(),
                    fullname: user.fullname.clone().filter(|n| !n.is_empty()).unwrap_or_else(|| "----".to_string()),
                    email: user.email.clone(),
                    status: status_key(user.status),
                    avatar: avatar_url(user),
                    edit_url: core.admin_url(&format!("users/edit/{}", id)),
                    delete_url: (id != ROOT_USER_ID && Some(id) != my_id)
                        .then(|| core.admin_url(&format!("users/delete/{}", id))),
                }
            })
            .collect();

        let mut ctx = Context::new();
        ctx.insert("users", &rows);
        ctx.insert("add_url", &core.admin_url("users/add"));
        helpers::view(core, "modules/users/admin/manage.html", ctx)
    }

    async fn form(&self, core: &mut Core, id: Option<i64>) -> Result<Output> {
        let user = match id {
            Some(id) => match Self::repo(core).find_by_id(id).await? {
                Some(user) => Some(user),
                None => return Ok(helpers::redirect(core, "users/manage")),
            },
            None => None,
        };
        let access = user.as_ref().map(User::effective_access);
        let mut ctx = Context::new();
        ctx.insert("form", &core.take_form());
        ctx.insert("user", &user);
        ctx.insert("is_root", &user.as_ref().is_some_and(User::is_root));
        ctx.insert("status", &user.as_ref().map(|u| u.status.as_i64()).unwrap_or(0));
        ctx.insert("modules", &module_choices(core, access.as_ref()).await?);
        ctx.insert(
            "avatar_url",
            &user.as_ref().map(avatar_url).unwrap_or_else(|| DEFAULT_AVATAR.to_string()),
        );
        let save_path = match id {
            Some(id) => format!("users/save/{}", id),
            None => "users/save".to_string(),
        };
        ctx.insert("save_url", &core.admin_url(&save_path));
        ctx.insert("manage_url", &core.admin_url("users/manage"));
        helpers::view(core, "modules/users/admin/form.html", ctx)
    }

    async fn save(&self, core: &mut Core, id: Option<i64>, form: &FormData) -> Result<Output> {
        let repo = Self::repo(core);
        let back = match id {
            Some(id) => format!("users/edit/{}", id),
            None => "users/add".to_string(),
        };
        let username = form.text("username");
        let email = form.text("email");
        let password = form.get("password").unwrap_or_default().to_string();
        let selected = form.all("access");
        let is_root = id == Some(ROOT_USER_ID);

        if username.is_empty() || email.is_empty() || (selected.is_empty() && !is_root) {
            let text = core.lang_text("general", "fill_inputs");
            return Ok(helpers::reject(core, form, text, &back));
        }
        if User::validate_username(&username).is_err() {
            let text = core.lang_text(MODULE, "wrong_username");
            return Ok(helpers::reject(core, form, text, &back));
        }
        if repo.username_taken(&username, id).await? {
            let text = core.lang_text(MODULE, "user_already_exists");
            return Ok(helpers::reject(core, form, text, &back));
        }
        if User::validate_email(&email).is_err() {
            let text = core.lang_text(MODULE, "wrong_email");
            return Ok(helpers::reject(core, form, text, &back));
        }
        // An empty password keeps the current one on edit.
        if (id.is_none() || !password.is_empty()) && User::validate_password(&password).is_err() {
            let text = core.lang_text(MODULE, "too_short_pswd");
            return Ok(helpers::reject(core, form, text, &back));
        }

        let available = module_choices(core, None).await?.len();
        let access = if is_root {
            Access::All
        } else {
            Access::from_selection(&selected, available)
        };

        let mut user = match id {
            Some(id) => match repo.find_by_id(id).await? {
                Some(mut user) => {
                    if !password.is_empty() {
                        user.set_password(&password)?;
                    }
                    user.username = username;
                    user.email = email;
                    user
                }
                None => return Ok(Output::NotFound),
            },
            None => User::new(username, email, &password)?,
        };
        user.fullname = form.optional("fullname");
        user.description = form.optional("description");
        user.access = access;
        // Blocking or disabling the root account would lock everybody out.
        if !is_root {
            if let Some(status) = form.int("status") {
                user.status = UserStatus::from_i64(status);
            }
        }

        let avatar_ok = store_avatar(core, &mut user, form)?;
        let id = match user.id {
            Some(id) => {
                repo.update(&user).await?;
                id
            }
            None => repo.create(&user).await?,
        };
        tracing::info!("Saved user {} ({})", id, user.username);

        if !avatar_ok {
            let text = core.lang_text(MODULE, "avatar_error");
            return Ok(helpers::failure(core, text, &format!("users/edit/{}", id)));
        }
        let text = core.lang_text(MODULE, "save_success");
        Ok(helpers::success(core, text, &format!("users/edit/{}", id)))
    }

    async fn delete(&self, core: &mut Core, id: i64) -> Result<Output> {
        if id == ROOT_USER_ID || core.user_id() == Some(id) {
            let text = core.lang_text(MODULE, "delete_refused");
            return Ok(helpers::failure(core, text, "users/manage"));
        }
        let repo = Self::repo(core);
        let Some(user) = repo.find_by_id(id).await? else {
            let text = core.lang_text(MODULE, "delete_failure");
            return Ok(helpers::failure(core, text, "users/manage"));
        };
        repo.delete(id).await?;
        if let Some(avatar) = user.avatar.as_deref() {
            uploads::remove_file(&core.uploads_dir(MODULE), avatar)?;
        }
        tracing::info!("Deleted user {} ({})", id, user.username);
        let text = core.lang_text(MODULE, "delete_success");
        Ok(helpers::success(core, text, "users/manage"))
    }

    /// The signed-in user's own account. Reachable without access to
    /// this module.
    async fn profile(&self, core: &mut Core, request: &AdminRequest) -> Result<Output> {
        let Some(mut user) = core.user.clone() else {
            return Ok(Output::NotFound);
        };
        if !request.is_post() {
            let mut ctx = Context::new();
            ctx.insert("form", &core.take_form());
            ctx.insert("user", &user);
            ctx.insert("avatar_url", &avatar_url(&user));
            ctx.insert("save_url", &core.admin_url("users/profile"));
            return helpers::view(core, "modules/users/admin/profile.html", ctx);
        }

        let form = &request.form;
        let email = form.text("email");
        let password = form.get("password").unwrap_or_default().to_string();
        if User::validate_email(&email).is_err() {
            let text = core.lang_text(MODULE, "wrong_email");
            return Ok(helpers::reject(core, form, text, "users/profile"));
        }
        if !password.is_empty() {
            if User::validate_password(&password).is_err() {
                let text = core.lang_text(MODULE, "too_short_pswd");
                return Ok(helpers::reject(core, form, text, "users/profile"));
            }
            user.set_password(&password)?;
        }
        user.email = email;
        user.fullname = form.optional("fullname");
        user.description = form.optional("description");
        let avatar_ok = store_avatar(core, &mut user, form)?;
        Self::repo(core).update(&user).await?;
        core.user = Some(user);

        if !avatar_ok {
            let text = core.lang_text(MODULE, "avatar_error");
            return Ok(helpers::failure(core, text, "users/profile"));
        }
        let text = core.lang_text(MODULE, "save_success");
        Ok(helpers::success(core, text, "users/profile"))
    }
}

#[async_trait]
impl AdminModule for UsersAdmin {
    fn name(&self) -> &'static str {
        MODULE
    }

    fn navigation(&self, core: &Core) -> Vec<NavItem> {
        vec![
            NavItem::new(core.lang_text("general", "manage"), "manage"),
            NavItem::new(core.lang_text(MODULE, "add_new"), "add"),
        ]
    }

    async fn dispatch(&self, core: &mut Core, request: AdminRequest) -> Result<Output> {
        match (request.action.as_str(), request.id(0)) {
            ("manage", _) => self.manage(core).await,
            ("add", _) => self.form(core, None).await,
            ("edit", Some(id)) => self.form(core, Some(id)).await,
            ("save", id) if request.is_post() => self.save(core, id, &request.form).await,
            ("delete", Some(id)) => self.delete(core, id).await,
            ("profile", _) => self.profile(core, &request).await,
            _ => Ok(Output::NotFound),
        }
    }
}
