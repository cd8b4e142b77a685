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
use roost_core::models::member::{sort_for_display, Member};
use sqlx::SqlitePool;

use crate::query::{QueryBuilder, Value};

#[derive(sqlx::FromRow)]
struct MemberRow {
    id: i64,
    name: String,
    role: Option<String>,
    description: Option<String>,
    picture: Option<String>,
    twitch_handle: Option<String>,
    status: i64,
    lang: String,
    markdown: i64,
}

impl From<MemberRow> for Member {
    fn from(row: MemberRow) -> Self {
        Member {
            id: Some(row.id),
            name: row.name,
            role: row.role,
            description: row.description,
            picture: row.picture,
            twitch_handle: row.twitch_handle,
            active: row.status != 0,
            lang: row.lang,
            markdown: row.markdown != 0,
        }
    }
}

fn member_values(member: &Member) -> Vec<(&'static str, Value)> {
    vec![
        ("name", member.name.as_str().into()),
        ("role", member.role.clone().into()),
        ("description", member.description.clone().into()),
        ("picture", member.picture.clone().into()),
        ("twitch_handle", member.twitch_handle.clone().into()),
        ("status", member.active.into()),
        ("lang", member.lang.as_str().into()),
        ("markdown", member.markdown.into()),
    ]
}

/// Members live in the `members_sta` table.
pub struct MemberRepository {
    pool: SqlitePool,
}

impl MemberRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, member: &Member) -> Result<i64> {
        QueryBuilder::table("members_sta")
            .insert(&self.pool, &member_values(member))
            .await
    }

    pub async fn update(&self, member: &Member) -> Result<()> {
        let id = member.id.ok_or_else(|| anyhow!("Cannot update a member without id"))?;
        QueryBuilder::table("members_sta")
            .where_eq("id", id)
            .update(&self.pool, &member_values(member))
            .await?;
        Ok(())
    }

    pub async fn set_picture(&self, id: i64, picture: Option<&str>) -> Result<()> {
        QueryBuilder::table("members_sta")
            .where_eq("id", id)
            .update(&self.pool, &[("picture", picture.into())])
            .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Member>> {
        let row: Option<MemberRow> = QueryBuilder::table("members_sta")
            .where_eq("id", id)
            .fetch_one_as(&self.pool)
            .await?;
        Ok(row.map(Member::from))
    }

    /// Admin list: active members first, then by name.
    pub async fn list(&self, lang: &str) -> Result<Vec<Member>> {
        let rows: Vec<MemberRow> = QueryBuilder::table("members_sta")
            .where_eq("lang", lang)
            .desc("status")
            .asc("name")
            .fetch_as(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Member::from).collect())
    }

    /// Active members of a language in display order.
    pub async fn list_active(&self, lang: &str) -> Result<Vec<Member>> {
        let rows: Vec<MemberRow> = QueryBuilder::table("members_sta")
            .where_eq("lang", lang)
            .where_eq("status", 1)
            .fetch_as(&self.pool)
            .await?;
        let mut members: Vec<Member> = rows.into_iter().map(Member::from).collect();
        sort_for_display(&mut members);
        Ok(members)
    }

    pub async fn count(&self) -> Result<i64> {
        QueryBuilder::table("members_sta").count(&self.pool).await
    }

    /// Whether a member of the language already has this name or Twitch
    /// handle.
    pub async fn duplicate_exists(&self, lang: &str, name: &str, twitch_handle: Option<&str>) -> Result<bool> {
        let by_name = QueryBuilder::table("members_sta")
            .where_eq("lang", lang)
            .where_eq("name", name)
            .count(&self.pool)
            .await?;
        if by_name > 0 {
            return Ok(true);
        }
        match twitch_handle.map(str::trim).filter(|h| !h.is_empty()) {
            Some(handle) => Ok(QueryBuilder::table("members_sta")
                .where_eq("lang", lang)
                .where_eq("twitch_handle", handle)
                .count(&self.pool)
                .await?
                > 0),
            None => Ok(false),
        }
    }

    pub async fn delete(&self, id: i64) -> Result<Option<Member>> {
        let member = self.find_by_id(id).await?;
        if member.is_some() {
            QueryBuilder::table("members_sta")
                .where_eq("id", id)
                .delete(&self.pool)
                .await?;
        }
        Ok(member)
    }
}
