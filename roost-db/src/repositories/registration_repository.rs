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
use chrono::{DateTime, Utc};
use roost_core::models::registration::{Registration, RegistrationStatus};
use serde::Serialize;
use sqlx::SqlitePool;

use super::from_timestamp;
use crate::query::{QueryBuilder, Value};

#[derive(sqlx::FromRow)]
struct RegistrationRow {
    id: i64,
    runner_name: String,
    game_name: String,
    game_category: String,
    estimated_time: i64,
    race: i64,
    race_opponents: Option<String>,
    event_id: Option<i64>,
    status: i64,
    created_at: i64,
    comment: Option<String>,
    event_name: Option<String>,
    event_start: Option<i64>,
}

/// A registration with the name and start of its event, when it still exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrationListing {
    pub registration: Registration,
    pub event_name: Option<String>,
    pub event_start: Option<DateTime<Utc>>,
}

impl From<RegistrationRow> for RegistrationListing {
    fn from(row: RegistrationRow) -> Self {
        RegistrationListing {
            registration: Registration {
                id: Some(row.id),
                runner_name: row.runner_name,
                game_name: row.game_name,
                game_category: row.game_category,
                estimated_time: row.estimated_time,
                race: row.race != 0,
                race_opponents: row.race_opponents,
                event_id: row.event_id,
                status: RegistrationStatus::from_i64(row.status),
                comment: row.comment,
                created_at: from_timestamp(row.created_at),
            },
            event_name: row.event_name,
            event_start: row.event_start.map(from_timestamp),
        }
    }
}

/// Which registrations an export or listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFilter {
    All,
    /// Registrations made without choosing an event.
    NoEvent,
    Event(i64),
}

impl EventFilter {
    /// Form value: empty or `0` for all, `-1` for no event, an id otherwise.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<i64>() {
            Ok(-1) => EventFilter::NoEvent,
            Ok(id) if id > 0 => EventFilter::Event(id),
            _ => EventFilter::All,
        }
    }

    fn apply(self, query: QueryBuilder) -> QueryBuilder {
        match self {
            EventFilter::All => query,
            EventFilter::NoEvent => query.where_null("events_registration.event_id"),
            EventFilter::Event(id) => query.where_eq("events_registration.event_id", id),
        }
    }
}

fn registration_values(registration: &Registration) -> Vec<(&'static str, Value)> {
    vec![
        ("runner_name", registration.runner_name.as_str().into()),
        ("game_name", registration.game_name.as_str().into()),
        ("game_category", registration.game_category.as_str().into()),
        ("estimated_time", registration.estimated_time.into()),
        ("race", registration.race.into()),
        ("race_opponents", registration.race_opponents.clone().into()),
        ("event_id", registration.event_id.into()),
        ("status", registration.status.as_i64().into()),
        ("created_at", registration.created_at.timestamp().into()),
        ("comment", registration.comment.clone().into()),
    ]
}

fn with_event() -> QueryBuilder {
    QueryBuilder::table("events_registration")
        .select(&[
            "events_registration.*",
            "events.name AS event_name",
            "events.start_at AS event_start",
        ])
        .left_join("events", "events.id = events_registration.event_id")
}

pub struct RegistrationRepository {
    pool: SqlitePool,
}

impl RegistrationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, registration: &Registration) -> Result<i64> {
        QueryBuilder::table("events_registration")
            .insert(&self.pool, &registration_values(registration))
            .await
    }

    pub async fn update(&self, registration: &Registration) -> Result<()> {
        let id = registration
            .id
            .ok_or_else(|| anyhow!("Cannot update a registration without id"))?;
        QueryBuilder::table("events_registration")
            .where_eq("id", id)
            .update(&self.pool, &registration_values(registration))
            .await?;
        Ok(())
    }

    pub async fn set_status(&self, id: i64, status: RegistrationStatus) -> Result<bool> {
        let updated = QueryBuilder::table("events_registration")
            .where_eq("id", id)
            .update(&self.pool, &[("status", status.as_i64().into())])
            .await?;
        Ok(updated > 0)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<RegistrationListing>> {
        let row: Option<RegistrationRow> = with_event()
            .where_eq("events_registration.id", id)
            .fetch_one_as(&self.pool)
            .await?;
        Ok(row.map(RegistrationListing::from))
    }

    /// Oldest registrations first.
    pub async fn list(&self, filter: EventFilter, limit: i64, offset: i64) -> Result<Vec<RegistrationListing>> {
        let rows: Vec<RegistrationRow> = filter
            .apply(with_event())
            .asc("events_registration.created_at")
            .asc("events_registration.id")
            .limit(limit)
            .offset(offset)
            .fetch_as(&self.pool)
            .await?;
        Ok(rows.into_iter().map(RegistrationListing::from).collect())
    }

    pub async fn count(&self, filter: EventFilter) -> Result<i64> {
        filter
            .apply(QueryBuilder::table("events_registration"))
            .count(&self.pool)
            .await
    }

    /// Registrations for a CSV export, by filter or by explicit ids.
    pub async fn export(&self, filter: EventFilter, ids: Option<&[i64]>) -> Result<Vec<RegistrationListing>> {
        let mut query = filter.apply(with_event());
        if let Some(ids) = ids {
            query = query.where_in("events_registration.id", ids.iter().copied());
        }
        let rows: Vec<RegistrationRow> = query
            .asc("events_registration.created_at")
            .fetch_as(&self.pool)
            .await?;
        Ok(rows.into_iter().map(RegistrationListing::from).collect())
    }

    pub async fn delete_many(&self, ids: &[i64]) -> Result<u64> {
        QueryBuilder::table("events_registration")
            .where_in("id", ids.iter().copied())
            .delete(&self.pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::EventRepository;
    use crate::test_support::installed_pool;
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use roost_core::models::event::Event;

    fn registration(runner: &str, event_id: Option<i64>) -> Registration {
        Registration {
            id: None,
            runner_name: runner.into(),
            game_name: "Celeste".into(),
            game_category: "Any%".into(),
            estimated_time: 1800,
            race: false,
            race_opponents: None,
            event_id,
            status: RegistrationStatus::Pending,
            comment: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_event_filter_parse() {
        assert_eq!(EventFilter::parse(""), EventFilter::All);
        assert_eq!(EventFilter::parse("0"), EventFilter::All);
        assert_eq!(EventFilter::parse("-1"), EventFilter::NoEvent);
        assert_eq!(EventFilter::parse("12"), EventFilter::Event(12));
    }

    #[tokio::test]
    async fn test_filters_and_event_join() {
        let pool = installed_pool().await;
        let events = EventRepository::new(pool.clone());
        let start = Utc::now() + Duration::days(3);
        let event_id = events
            .create(&Event::new("Summer run".into(), start, start + Duration::hours(8), "en_english".into()))
            .await
            .unwrap();

        let repo = RegistrationRepository::new(pool);
        repo.create(&registration("alice", Some(event_id))).await.unwrap();
        repo.create(&registration("bob", None)).await.unwrap();
        let gone = repo.create(&registration("carol", Some(9999))).await.unwrap();

        assert_eq!(repo.count(EventFilter::All).await.unwrap(), 3);
        assert_eq!(repo.count(EventFilter::NoEvent).await.unwrap(), 1);

        let for_event = repo.list(EventFilter::Event(event_id), 10, 0).await.unwrap();
        assert_eq!(for_event.len(), 1);
        assert_eq!(for_event[0].event_name.as_deref(), Some("Summer run"));

        let orphan = repo.find_by_id(gone).await.unwrap().unwrap();
        assert_eq!(orphan.registration.event_id, Some(9999));
        assert_eq!(orphan.event_name, None);

        let exported = repo.export(EventFilter::NoEvent, None).await.unwrap();
        assert_eq!(exported[0].registration.runner_name, "bob");
    }

    #[tokio::test]
    async fn test_status_and_mass_delete() {
        let repo = RegistrationRepository::new(installed_pool().await);
        let a = repo.create(&registration("a", None)).await.unwrap();
        let b = repo.create(&registration("b", None)).await.unwrap();

        assert!(repo.set_status(a, RegistrationStatus::Accepted).await.unwrap());
        let stored = repo.find_by_id(a).await.unwrap().unwrap();
        assert_eq!(stored.registration.status, RegistrationStatus::Accepted);

        assert_eq!(repo.delete_many(&[a, b]).await.unwrap(), 2);
        assert_eq!(repo.count(EventFilter::All).await.unwrap(), 0);
    }
}
