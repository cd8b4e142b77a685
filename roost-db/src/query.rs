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

//! Fluent SQL builder over the SQLite pool.
//!
//! ```ignore
//! let rows = QueryBuilder::table("blog")
//!     .where_eq("status", 2)
//!     .where_op("published_at", "<=", now)
//!     .desc("published_at")
//!     .limit(5)
//!     .to_array(&pool)
//!     .await?;
//! ```
//!
//! Values are always bound as parameters. Table and column names are
//! checked against `[A-Za-z0-9_.*]` and a bad name fails the query when it
//! runs.

use anyhow::{anyhow, Context, Result};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Column, Row, Sqlite, SqlitePool, TypeInfo, ValueRef};

/// A row as a JSON object keyed by column name.
pub type RowMap = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Real(f64),
    Text(String),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

const OPERATORS: [&str; 9] = ["=", "!=", "<>", "<", "<=", ">", ">=", "LIKE", "NOT LIKE"];

#[derive(Debug, Clone, Copy, PartialEq)]
enum Conjunction {
    And,
    Or,
}

/// Outcome of [`QueryBuilder::save`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Saved {
    affected: u64,
    last_insert_id: Option<i64>,
}

impl Saved {
    pub fn affected(&self) -> u64 {
        self.affected
    }

    /// Row id of the inserted row, `None` when the save was an update.
    pub fn last_insert_id(&self) -> Option<i64> {
        self.last_insert_id
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    table: String,
    selects: Vec<String>,
    joins: Vec<String>,
    conditions: Vec<(Conjunction, String)>,
    binds: Vec<Value>,
    group_by: Vec<String>,
    order_by: Vec<String>,
    limit: Option<i64>,
    offset: Option<i64>,
    error: Option<String>,
}

/// Quote each dotted part so column names such as `desc` stay usable.
fn quote(name: &str) -> String {
    name.split('.')
        .map(|part| {
            if part == "*" {
                part.to_string()
            } else {
                format!("\"{}\"", part)
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn valid_ident(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '*')
}

impl QueryBuilder {
    pub fn table(name: &str) -> Self {
        let mut qb = Self {
            table: name.to_string(),
            ..Default::default()
        };
        qb.check(name);
        qb
    }

    fn check(&mut self, name: &str) {
        if self.error.is_none() && !valid_ident(name) {
            self.error = Some(format!("Invalid identifier '{}'", name));
        }
    }

    fn push_condition(&mut self, conj: Conjunction, column: &str, op: &str, value: Value) {
        self.check(column);
        let op = op.trim().to_uppercase();
        if !OPERATORS.contains(&op.as_str()) {
            self.error.get_or_insert_with(|| format!("Invalid operator '{}'", op));
            return;
        }
        self.conditions
            .push((conj, format!("{} {} ?", quote(column), op)));
        self.binds.push(value);
    }

    /// Select columns. Each entry is a column name, optionally followed by
    /// ` AS alias`.
    pub fn select(mut self, columns: &[&str]) -> Self {
        for column in columns {
            let (name, alias) = match column.split_once(" AS ") {
                Some((name, alias)) => (name.trim(), Some(alias.trim())),
                None => (column.trim(), None),
            };
            self.check(name);
            let rendered = match alias {
                Some(alias) => {
                    self.check(alias);
                    format!("{} AS {}", quote(name), quote(alias))
                }
                None => quote(name),
            };
            self.selects.push(rendered);
        }
        self
    }

    /// Select an aggregate such as `COUNT(blog_tags.name)` under `alias`.
    pub fn select_count(mut self, column: &str, alias: &str) -> Self {
        self.check(column);
        self.check(alias);
        self.selects.push(format!("COUNT({}) AS {}", quote(column), quote(alias)));
        self
    }

    pub fn where_eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.where_op(column, "=", value)
    }

    pub fn where_op(mut self, column: &str, op: &str, value: impl Into<Value>) -> Self {
        self.push_condition(Conjunction::And, column, op, value.into());
        self
    }

    pub fn or_where(self, column: &str, value: impl Into<Value>) -> Self {
        self.or_where_op(column, "=", value)
    }

    pub fn or_where_op(mut self, column: &str, op: &str, value: impl Into<Value>) -> Self {
        self.push_condition(Conjunction::Or, column, op, value.into());
        self
    }

    pub fn like(self, column: &str, pattern: impl Into<Value>) -> Self {
        self.where_op(column, "LIKE", pattern)
    }

    /// `column IN (...)`. An empty list matches nothing.
    pub fn where_in<V: Into<Value>>(mut self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.check(column);
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            self.conditions.push((Conjunction::And, "0 = 1".to_string()));
            return self;
        }
        let placeholders = vec!["?"; values.len()].join(", ");
        self.conditions
            .push((Conjunction::And, format!("{} IN ({})", quote(column), placeholders)));
        self.binds.extend(values);
        self
    }

    pub fn where_null(mut self, column: &str) -> Self {
        self.check(column);
        self.conditions
            .push((Conjunction::And, format!("{} IS NULL", quote(column))));
        self
    }

    pub fn where_not_null(mut self, column: &str) -> Self {
        self.check(column);
        self.conditions
            .push((Conjunction::And, format!("{} IS NOT NULL", quote(column))));
        self
    }

    fn push_join(mut self, kind: &str, table: &str, on: &str) -> Self {
        self.check(table);
        match on.split_once('=') {
            Some((left, right)) => {
                let (left, right) = (left.trim(), right.trim());
                self.check(left);
                self.check(right);
                self.joins
                    .push(format!(
                        "{} {} ON {} = {}",
                        kind,
                        quote(table),
                        quote(left),
                        quote(right)
                    ));
            }
            None => {
                self.error
                    .get_or_insert_with(|| format!("Invalid join condition '{}'", on));
            }
        }
        self
    }

    /// Inner join, `on` written as `a.col = b.col`.
    pub fn join(self, table: &str, on: &str) -> Self {
        self.push_join("INNER JOIN", table, on)
    }

    pub fn left_join(self, table: &str, on: &str) -> Self {
        self.push_join("LEFT JOIN", table, on)
    }

    pub fn asc(mut self, column: &str) -> Self {
        self.check(column);
        self.order_by.push(format!("{} ASC", quote(column)));
        self
    }

    pub fn desc(mut self, column: &str) -> Self {
        self.check(column);
        self.order_by.push(format!("{} DESC", quote(column)));
        self
    }

    pub fn group(mut self, column: &str) -> Self {
        self.check(column);
        self.group_by.push(quote(column));
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    fn ensure_valid(&self) -> Result<()> {
        match &self.error {
            Some(err) => Err(anyhow!("{} in query on '{}'", err, self.table)),
            None => Ok(()),
        }
    }

    fn where_clause(&self) -> String {
        let mut sql = String::new();
        for (i, (conj, condition)) in self.conditions.iter().enumerate() {
            if i == 0 {
                sql.push_str(" WHERE ");
            } else {
                sql.push_str(match conj {
                    Conjunction::And => " AND ",
                    Conjunction::Or => " OR ",
                });
            }
            sql.push_str(condition);
        }
        sql
    }

    /// Render the SELECT statement this builder describes.
    pub fn to_select_sql(&self) -> String {
        let columns = if self.selects.is_empty() {
            format!("{}.*", quote(&self.table))
        } else {
            self.selects.join(", ")
        };
        let mut sql = format!("SELECT {} FROM {}", columns, quote(&self.table));
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join);
        }
        sql.push_str(&self.where_clause());
        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }
        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset)),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {}", limit)),
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {}", offset)),
            (None, None) => {}
        }
        sql
    }

    fn bind<'q>(
        mut query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
        values: &[Value],
    ) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
        for value in values {
            query = match value {
                Value::Null => query.bind(None::<String>),
                Value::Int(v) => query.bind(*v),
                Value::Real(v) => query.bind(*v),
                Value::Text(v) => query.bind(v.clone()),
            };
        }
        query
    }

    pub async fn fetch_all(&self, pool: &SqlitePool) -> Result<Vec<SqliteRow>> {
        self.ensure_valid()?;
        let sql = self.to_select_sql();
        Self::bind(sqlx::query(&sql), &self.binds)
            .fetch_all(pool)
            .await
            .with_context(|| format!("Failed to query {}", self.table))
    }

    pub async fn fetch_optional(&self, pool: &SqlitePool) -> Result<Option<SqliteRow>> {
        let mut first = self.clone();
        first.limit = Some(1);
        Ok(first.fetch_all(pool).await?.into_iter().next())
    }

    /// Rows decoded into `T`.
    pub async fn fetch_as<T>(&self, pool: &SqlitePool) -> Result<Vec<T>>
    where
        T: for<'r> sqlx::FromRow<'r, SqliteRow>,
    {
        self.fetch_all(pool)
            .await?
            .iter()
            .map(|row| T::from_row(row).with_context(|| format!("Failed to decode {} row", self.table)))
            .collect()
    }

    pub async fn fetch_one_as<T>(&self, pool: &SqlitePool) -> Result<Option<T>>
    where
        T: for<'r> sqlx::FromRow<'r, SqliteRow>,
    {
        match self.fetch_optional(pool).await? {
            Some(row) => Ok(Some(
                T::from_row(&row).with_context(|| format!("Failed to decode {} row", self.table))?,
            )),
            None => Ok(None),
        }
    }

    /// All rows as JSON objects.
    pub async fn to_array(&self, pool: &SqlitePool) -> Result<Vec<RowMap>> {
        self.fetch_all(pool).await?.iter().map(row_to_map).collect()
    }

    /// First row as a JSON object.
    pub async fn one_array(&self, pool: &SqlitePool) -> Result<Option<RowMap>> {
        self.fetch_optional(pool).await?.as_ref().map(row_to_map).transpose()
    }

    pub async fn count(&self, pool: &SqlitePool) -> Result<i64> {
        self.ensure_valid()?;
        let mut inner = self.clone();
        inner.order_by.clear();
        inner.limit = None;
        inner.offset = None;
        if inner.selects.is_empty() {
            inner.selects.push("1".to_string());
        }
        let sql = format!("SELECT COUNT(*) FROM ({})", inner.to_select_sql());
        let row = Self::bind(sqlx::query(&sql), &self.binds)
            .fetch_one(pool)
            .await
            .with_context(|| format!("Failed to count {}", self.table))?;
        Ok(row.try_get::<i64, _>(0)?)
    }

    /// Insert a row and return its id.
    pub async fn insert(&self, pool: &SqlitePool, values: &[(&str, Value)]) -> Result<i64> {
        self.ensure_valid()?;
        if values.is_empty() {
            return Err(anyhow!("Nothing to insert into {}", self.table));
        }
        for (column, _) in values {
            if !valid_ident(column) {
                return Err(anyhow!("Invalid column '{}'", column));
            }
        }
        let columns: Vec<String> = values.iter().map(|(c, _)| quote(c)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(&self.table),
            columns.join(", "),
            vec!["?"; values.len()].join(", ")
        );
        let binds: Vec<Value> = values.iter().map(|(_, v)| v.clone()).collect();
        let result = Self::bind(sqlx::query(&sql), &binds)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to insert into {}", self.table))?;
        Ok(result.last_insert_rowid())
    }

    /// Update the filtered rows. Refuses to run without a filter.
    pub async fn update(&self, pool: &SqlitePool, values: &[(&str, Value)]) -> Result<u64> {
        self.ensure_valid()?;
        if self.conditions.is_empty() {
            return Err(anyhow!("Refusing to update every row of {}", self.table));
        }
        if values.is_empty() {
            return Ok(0);
        }
        for (column, _) in values {
            if !valid_ident(column) {
                return Err(anyhow!("Invalid column '{}'", column));
            }
        }
        let assignments: Vec<String> = values.iter().map(|(c, _)| format!("{} = ?", quote(c))).collect();
        let sql = format!(
            "UPDATE {} SET {}{}",
            quote(&self.table),
            assignments.join(", "),
            self.where_clause()
        );
        let mut binds: Vec<Value> = values.iter().map(|(_, v)| v.clone()).collect();
        binds.extend(self.binds.iter().cloned());
        let result = Self::bind(sqlx::query(&sql), &binds)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to update {}", self.table))?;
        Ok(result.rows_affected())
    }

    /// Update when filtered, insert otherwise.
    pub async fn save(&self, pool: &SqlitePool, values: &[(&str, Value)]) -> Result<Saved> {
        if self.conditions.is_empty() {
            let id = self.insert(pool, values).await?;
            Ok(Saved {
                affected: 1,
                last_insert_id: Some(id),
            })
        } else {
            let affected = self.update(pool, values).await?;
            Ok(Saved {
                affected,
                last_insert_id: None,
            })
        }
    }

    /// Delete the filtered rows. Refuses to run without a filter.
    pub async fn delete(&self, pool: &SqlitePool) -> Result<u64> {
        self.ensure_valid()?;
        if self.conditions.is_empty() {
            return Err(anyhow!("Refusing to delete every row of {}", self.table));
        }
        let sql = format!("DELETE FROM {}{}", quote(&self.table), self.where_clause());
        let result = Self::bind(sqlx::query(&sql), &self.binds)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to delete from {}", self.table))?;
        Ok(result.rows_affected())
    }
}

/// Convert a row into a JSON object, keeping SQLite's dynamic types.
pub fn row_to_map(row: &SqliteRow) -> Result<RowMap> {
    let mut map = RowMap::new();
    for (i, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(i)?;
        let value = if raw.is_null() {
            serde_json::Value::Null
        } else {
            match raw.type_info().name() {
                "INTEGER" | "BOOLEAN" => serde_json::Value::from(row.try_get::<i64, _>(i)?),
                "REAL" => serde_json::Value::from(row.try_get::<f64, _>(i)?),
                "BLOB" => serde_json::Value::Null,
                _ => match row.try_get::<String, _>(i) {
                    Ok(text) => serde_json::Value::from(text),
                    Err(_) => row
                        .try_get::<i64, _>(i)
                        .map(serde_json::Value::from)
                        .or_else(|_| row.try_get::<f64, _>(i).map(serde_json::Value::from))
                        .unwrap_or(serde_json::Value::Null),
                },
            }
        };
        map.insert(column.name().to_string(), value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE items (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, kind TEXT, price REAL, qty INTEGER)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("CREATE TABLE kinds (name TEXT NOT NULL, label TEXT NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();
        for (name, kind, price, qty) in [
            ("apple", Some("fruit"), 1.5, 3),
            ("pear", Some("fruit"), 2.0, 0),
            ("leek", Some("veg"), 0.5, 7),
            ("mystery", None, 9.0, 1),
        ] {
            QueryBuilder::table("items")
                .insert(
                    &pool,
                    &[
                        ("name", name.into()),
                        ("kind", kind.into()),
                        ("price", price.into()),
                        ("qty", (qty as i64).into()),
                    ],
                )
                .await
                .unwrap();
        }
        for (name, label) in [("fruit", "Fruit"), ("veg", "Vegetable")] {
            QueryBuilder::table("kinds")
                .insert(&pool, &[("name", name.into()), ("label", label.into())])
                .await
                .unwrap();
        }
        pool
    }

    #[test]
    fn test_select_sql() {
        let sql = QueryBuilder::table("blog")
            .select(&["blog.id", "users.username AS author"])
            .left_join("users", "users.id = blog.user_id")
            .where_eq("blog.status", 2)
            .or_where("blog.id", 7)
            .desc("published_at")
            .limit(5)
            .offset(10)
            .to_select_sql();
        assert_eq!(
            sql,
            r#"SELECT "blog"."id", "users"."username" AS "author" FROM "blog" LEFT JOIN "users" ON "users"."id" = "blog"."user_id" WHERE "blog"."status" = ? OR "blog"."id" = ? ORDER BY "published_at" DESC LIMIT 5 OFFSET 10"#
        );
    }

    #[tokio::test]
    async fn test_insert_and_filters() {
        let pool = setup().await;

        let fruits = QueryBuilder::table("items")
            .where_eq("kind", "fruit")
            .asc("name")
            .to_array(&pool)
            .await
            .unwrap();
        let names: Vec<_> = fruits.iter().map(|r| r["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["apple", "pear"]);
        assert_eq!(fruits[0]["price"], serde_json::json!(1.5));
        assert_eq!(fruits[0]["qty"], serde_json::json!(3));

        let cheap = QueryBuilder::table("items")
            .where_op("price", "<", 1.8)
            .count(&pool)
            .await
            .unwrap();
        assert_eq!(cheap, 2);

        let no_kind = QueryBuilder::table("items")
            .where_null("kind")
            .one_array(&pool)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(no_kind["name"], "mystery");
        assert_eq!(no_kind["kind"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_where_in_and_empty_in() {
        let pool = setup().await;
        let count = QueryBuilder::table("items")
            .where_in("name", ["apple", "leek", "nope"])
            .count(&pool)
            .await
            .unwrap();
        assert_eq!(count, 2);

        let none = QueryBuilder::table("items")
            .where_in("id", Vec::<i64>::new())
            .to_array(&pool)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_join_group_and_count() {
        let pool = setup().await;
        let rows = QueryBuilder::table("items")
            .select(&["kinds.label"])
            .select_count("items.id", "total")
            .join("kinds", "kinds.name = items.kind")
            .group("kinds.label")
            .asc("kinds.label")
            .to_array(&pool)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["label"], "Fruit");
        assert_eq!(rows[0]["total"], serde_json::json!(2));

        let groups = QueryBuilder::table("items")
            .select(&["kind"])
            .where_not_null("kind")
            .group("kind")
            .count(&pool)
            .await
            .unwrap();
        assert_eq!(groups, 2);
    }

    #[tokio::test]
    async fn test_update_save_delete() {
        let pool = setup().await;
        let updated = QueryBuilder::table("items")
            .where_eq("kind", "fruit")
            .update(&pool, &[("qty", 10i64.into())])
            .await
            .unwrap();
        assert_eq!(updated, 2);

        let saved = QueryBuilder::table("items")
            .save(&pool, &[("name", "kiwi".into())])
            .await
            .unwrap();
        assert_eq!(saved.affected(), 1);
        let id = saved.last_insert_id().unwrap();
        let row = QueryBuilder::table("items")
            .where_eq("id", id)
            .one_array(&pool)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row["name"], "kiwi");

        let resaved = QueryBuilder::table("items")
            .where_eq("id", id)
            .save(&pool, &[("qty", 3i64.into())])
            .await
            .unwrap();
        assert_eq!(resaved.affected(), 1);
        assert_eq!(resaved.last_insert_id(), None);

        let deleted = QueryBuilder::table("items")
            .where_eq("name", "kiwi")
            .delete(&pool)
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(QueryBuilder::table("items").count(&pool).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_unfiltered_writes_are_refused() {
        let pool = setup().await;
        assert!(QueryBuilder::table("items").delete(&pool).await.is_err());
        assert!(QueryBuilder::table("items")
            .update(&pool, &[("qty", 0i64.into())])
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_invalid_identifiers_fail() {
        let pool = setup().await;
        let result = QueryBuilder::table("items")
            .where_eq("name; DROP TABLE items", "x")
            .to_array(&pool)
            .await;
        assert!(result.is_err());

        let result = QueryBuilder::table("items")
            .where_op("name", "UNION", "x")
            .to_array(&pool)
            .await;
        assert!(result.is_err());
        assert_eq!(QueryBuilder::table("items").count(&pool).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_limit_offset() {
        let pool = setup().await;
        let rows = QueryBuilder::table("items")
            .asc("id")
            .limit(2)
            .offset(1)
            .to_array(&pool)
            .await
            .unwrap();
        let names: Vec<_> = rows.iter().map(|r| r["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["pear", "leek"]);
    }
}
