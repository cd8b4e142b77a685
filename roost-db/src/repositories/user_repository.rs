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

use anyhow::{anyhow, Result};
use roost_core::models::user::{Access, User, UserStatus};
use sqlx::SqlitePool;

use crate::query::{QueryBuilder, Value};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    fullname: Option<String>,
    description: Option<String>,
    password: String,
    avatar: Option<String>,
    email: String,
    role: String,
    access: String,
    status: i64,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: Some(row.id),
            username: row.username,
            fullname: row.fullname,
            description: row.description,
            password_hash: row.password,
            avatar: row.avatar,
            email: row.email,
            role: row.role,
            access: Access::parse(&row.access),
            status: UserStatus::from_i64(row.status),
        }
    }
}

fn user_values(user: &User) -> Vec<(&'static str, Value)> {
    vec![
        ("username", user.username.as_str().into()),
        ("fullname", user.fullname.clone().into()),
        ("description", user.description.clone().into()),
        ("password", user.password_hash.as_str().into()),
        ("avatar", user.avatar.clone().into()),
        ("email", user.email.as_str().into()),
        ("role", user.role.as_str().into()),
        ("access", user.access.to_string().into()),
        ("status", user.status.as_i64().into()),
    ]
}

pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user: &User) -> Result<i64> {
        if self.username_taken(&user.username, None).await? {
            return Err(anyhow!("Username {} is already taken", user.username));
        }
        QueryBuilder::table("users")
            .insert(&self.pool, &user_values(user))
            .await
    }

    pub async fn update(&self, user: &User) -> Result<()> {
        let id = user.id.ok_or_else(|| anyhow!("Cannot update a user without id"))?;
        QueryBuilder::table("users")
            .where_eq("id", id)
            .update(&self.pool, &user_values(user))
            .await?;
        Ok(())
    }

    pub async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool> {
        let updated = QueryBuilder::table("users")
            .where_eq("id", id)
            .update(&self.pool, &[("password", password_hash.into())])
            .await?;
        Ok(updated > 0)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        let row: Option<UserRow> = QueryBuilder::table("users")
            .where_eq("id", id)
            .fetch_one_as(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let row: Option<UserRow> = QueryBuilder::table("users")
            .where_eq("username", username)
            .fetch_one_as(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    /// The user with the lowest id. Blog posts whose author is gone fall
    /// back to it.
    pub async fn first(&self) -> Result<Option<User>> {
        let row: Option<UserRow> = QueryBuilder::table("users")
            .asc("id")
            .fetch_one_as(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        let rows: Vec<UserRow> = QueryBuilder::table("users")
            .asc("id")
            .fetch_as(&self.pool)
            .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    pub async fn count(&self) -> Result<i64> {
        QueryBuilder::table("users").count(&self.pool).await
    }

    /// Whether another user already uses `username`.
    pub async fn username_taken(&self, username: &str, except_id: Option<i64>) -> Result<bool> {
        let mut query = QueryBuilder::table("users").where_eq("username", username);
        if let Some(id) = except_id {
            query = query.where_op("id", "!=", id);
        }
        Ok(query.count(&self.pool).await? > 0)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let deleted = QueryBuilder::table("users")
            .where_eq("id", id)
            .delete(&self.pool)
            .await?;
        if deleted == 0 {
            return Err(anyhow!("User {} not found", id));
        }
        QueryBuilder::table("remember_me")
            .where_eq("user_id", id)
            .delete(&self.pool)
            .await?;
        Ok(())
    }
}
