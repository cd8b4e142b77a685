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

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::query::QueryBuilder;

/// The `modules` table: installed module dirs and their navigation order.
pub struct ModuleRepository {
    pool: SqlitePool,
}

impl ModuleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Installed module dirs ordered by `sequence`.
    pub async fn list(&self) -> Result<Vec<String>> {
        let dirs = sqlx::query_scalar::<_, String>("SELECT dir FROM modules ORDER BY sequence ASC, id ASC")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list modules")?;
        Ok(dirs)
    }

    pub async fn has(&self, dir: &str) -> Result<bool> {
        Ok(QueryBuilder::table("modules")
            .where_eq("dir", dir)
            .count(&self.pool)
            .await?
            > 0)
    }

    pub async fn insert(&self, dir: &str, sequence: i64) -> Result<i64> {
        QueryBuilder::table("modules")
            .insert(&self.pool, &[("dir", dir.into()), ("sequence", sequence.into())])
            .await
    }

    /// Add a module after every other one.
    pub async fn append(&self, dir: &str) -> Result<i64> {
        let last: Option<i64> = sqlx::query_scalar("SELECT MAX(sequence) FROM modules")
            .fetch_one(&self.pool)
            .await
            .context("Failed to read module sequence")?;
        self.insert(dir, last.map(|s| s + 1).unwrap_or(0)).await
    }

    pub async fn remove(&self, dir: &str) -> Result<()> {
        QueryBuilder::table("modules")
            .where_eq("dir", dir)
            .delete(&self.pool)
            .await?;
        Ok(())
    }

    /// Swap the module with its neighbour in navigation order. Returns
    /// `false` at either end of the list.
    pub async fn move_module(&self, dir: &str, up: bool) -> Result<bool> {
        let rows: Vec<(i64, String, i64)> =
            sqlx::query_as("SELECT id, dir, sequence FROM modules ORDER BY sequence ASC, id ASC")
                .fetch_all(&self.pool)
                .await
                .context("Failed to list modules")?;

        let Some(index) = rows.iter().position(|(_, d, _)| d == dir) else {
            return Ok(false);
        };
        let neighbour = if up {
            match index.checked_sub(1) {
                Some(i) => i,
                None => return Ok(false),
            }
        } else if index + 1 < rows.len() {
            index + 1
        } else {
            return Ok(false);
        };

        let (id, _, _) = &rows[index];
        let (other_id, _, _) = &rows[neighbour];
        // Sequences may collide after manual edits, so reassign from positions.
        let (seq, other_seq) = (neighbour as i64, index as i64);
        for (position, (row_id, _, sequence)) in rows.iter().enumerate() {
            if *sequence != position as i64 && row_id != id && row_id != other_id {
                QueryBuilder::table("modules")
                    .where_eq("id", *row_id)
                    .update(&self.pool, &[("sequence", (position as i64).into())])
                    .await?;
            }
        }
        QueryBuilder::table("modules")
            .where_eq("id", *id)
            .update(&self.pool, &[("sequence", seq.into())])
            .await?;
        QueryBuilder::table("modules")
            .where_eq("id", *other_id)
            .update(&self.pool, &[("sequence", other_seq.into())])
            .await?;
        Ok(true)
    }
}
