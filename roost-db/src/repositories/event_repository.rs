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
use roost_core::models::event::{Event, EventGroup};
use sqlx::SqlitePool;

use super::from_timestamp;
use crate::query::{QueryBuilder, Value};

#[derive(sqlx::FromRow)]
struct EventRow {
    id: i64,
    name: String,
    start_at: i64,
    end_at: i64,
    description: Option<String>,
    picture: Option<String>,
    building_name: Option<String>,
    building_address: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    channel_name: Option<String>,
    horaro_event_id: Option<String>,
    horaro_schedule_id: Option<String>,
    lang: String,
    markdown: i64,
    group_id: Option<i64>,
    registration: i64,
    updated_at: i64,
    created_at: i64,
    published_at: i64,
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        Event {
            id: Some(row.id),
            name: row.name,
            start_at: from_timestamp(row.start_at),
            end_at: from_timestamp(row.end_at),
            description: row.description,
            picture: row.picture,
            building_name: row.building_name,
            building_address: row.building_address,
            latitude: row.latitude,
            longitude: row.longitude,
            channel_name: row.channel_name,
            horaro_event_id: row.horaro_event_id,
            horaro_schedule_id: row.horaro_schedule_id,
            lang: row.lang,
            markdown: row.markdown != 0,
            group_id: row.group_id,
            registration: row.registration != 0,
            published_at: from_timestamp(row.published_at),
            updated_at: from_timestamp(row.updated_at),
            created_at: from_timestamp(row.created_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct GroupRow {
    id: i64,
    lang: String,
    name: String,
    color: Option<String>,
    #[sqlx(rename = "textColor")]
    text_color: Option<String>,
}

impl From<GroupRow> for EventGroup {
    fn from(row: GroupRow) -> Self {
        EventGroup {
            id: Some(row.id),
            lang: row.lang,
            name: row.name,
            color: row.color,
            text_color: row.text_color,
        }
    }
}

fn event_values(event: &Event) -> Vec<(&'static str, Value)> {
    vec![
        ("name", event.name.as_str().into()),
        ("start_at", event.start_at.timestamp().into()),
        ("end_at", event.end_at.timestamp().into()),
        ("description", event.description.clone().into()),
        ("picture", event.picture.clone().into()),
        ("building_name", event.building_name.clone().into()),
        ("building_address", event.building_address.clone().into()),
        ("latitude", event.latitude.into()),
        ("longitude", event.longitude.into()),
        ("channel_name", event.channel_name.clone().into()),
        ("horaro_event_id", event.horaro_event_id.clone().into()),
        ("horaro_schedule_id", event.horaro_schedule_id.clone().into()),
        ("lang", event.lang.as_str().into()),
        ("markdown", event.markdown.into()),
        ("group_id", event.group_id.into()),
        ("registration", event.registration.into()),
        ("updated_at", event.updated_at.timestamp().into()),
        ("created_at", event.created_at.timestamp().into()),
        ("published_at", event.published_at.timestamp().into()),
    ]
}

fn group_values(group: &EventGroup) -> Vec<(&'static str, Value)> {
    vec![
        ("lang", group.lang.as_str().into()),
        ("name", group.name.as_str().into()),
        ("color", group.color.clone().into()),
        ("textColor", group.text_color.clone().into()),
    ]
}

fn public(lang: &str, now: DateTime<Utc>) -> QueryBuilder {
    QueryBuilder::table("events")
        .where_eq("lang", lang)
        .where_op("published_at", "<=", now.timestamp())
}

pub struct EventRepository {
    pool: SqlitePool,
}

impl EventRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, event: &Event) -> Result<i64> {
        QueryBuilder::table("events")
            .insert(&self.pool, &event_values(event))
            .await
    }

    pub async fn update(&self, event: &Event) -> Result<()> {
        let id = event.id.ok_or_else(|| anyhow!("Cannot update an event without id"))?;
        QueryBuilder::table("events")
            .where_eq("id", id)
            .update(&self.pool, &event_values(event))
            .await?;
        Ok(())
    }

    pub async fn set_picture(&self, id: i64, picture: Option<&str>) -> Result<()> {
        QueryBuilder::table("events")
            .where_eq("id", id)
            .update(&self.pool, &[("picture", picture.into())])
            .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Event>> {
        let row: Option<EventRow> = QueryBuilder::table("events")
            .where_eq("id", id)
            .fetch_one_as(&self.pool)
            .await?;
        Ok(row.map(Event::from))
    }

    /// A published event of the current language.
    pub async fn find_public(&self, id: i64, lang: &str, now: DateTime<Utc>) -> Result<Option<Event>> {
        let row: Option<EventRow> = public(lang, now)
            .where_eq("id", id)
            .fetch_one_as(&self.pool)
            .await?;
        Ok(row.map(Event::from))
    }

    pub async fn list_public(&self, lang: &str, now: DateTime<Utc>) -> Result<Vec<Event>> {
        let rows: Vec<EventRow> = public(lang, now).asc("start_at").fetch_as(&self.pool).await?;
        Ok(rows.into_iter().map(Event::from).collect())
    }

    /// Published events not finished yet, soonest first.
    pub async fn upcoming(&self, lang: &str, now: DateTime<Utc>) -> Result<Vec<Event>> {
        let rows: Vec<EventRow> = public(lang, now)
            .where_op("end_at", ">=", now.timestamp())
            .asc("start_at")
            .fetch_as(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Event::from).collect())
    }

    /// Events of a language still taking registrations.
    pub async fn open_for_registration(&self, lang: &str, now: DateTime<Utc>) -> Result<Vec<Event>> {
        let rows: Vec<EventRow> = QueryBuilder::table("events")
            .where_eq("lang", lang)
            .where_eq("registration", 1)
            .where_op("end_at", ">=", now.timestamp())
            .asc("start_at")
            .fetch_as(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Event::from).collect())
    }

    pub async fn list_all(&self, limit: i64, offset: i64) -> Result<Vec<Event>> {
        let rows: Vec<EventRow> = QueryBuilder::table("events")
            .desc("start_at")
            .desc("end_at")
            .limit(limit)
            .offset(offset)
            .fetch_as(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Event::from).collect())
    }

    /// Every event, newest first, for selectors.
    pub async fn all(&self) -> Result<Vec<Event>> {
        let rows: Vec<EventRow> = QueryBuilder::table("events")
            .desc("start_at")
            .fetch_as(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Event::from).collect())
    }

    pub async fn count(&self) -> Result<i64> {
        QueryBuilder::table("events").count(&self.pool).await
    }

    /// Delete events and return the pictures they referenced.
    pub async fn delete_many(&self, ids: &[i64]) -> Result<Vec<String>> {
        let rows: Vec<EventRow> = QueryBuilder::table("events")
            .where_in("id", ids.iter().copied())
            .fetch_as(&self.pool)
            .await?;
        QueryBuilder::table("events")
            .where_in("id", ids.iter().copied())
            .delete(&self.pool)
            .await?;
        Ok(rows.into_iter().filter_map(|r| r.picture).collect())
    }

    pub async fn list_groups(&self, lang: Option<&str>) -> Result<Vec<EventGroup>> {
        let mut query = QueryBuilder::table("events_groups");
        if let Some(lang) = lang {
            query = query.where_eq("lang", lang);
        }
        let rows: Vec<GroupRow> = query.asc("name").fetch_as(&self.pool).await?;
        Ok(rows.into_iter().map(EventGroup::from).collect())
    }

    pub async fn find_group(&self, id: i64) -> Result<Option<EventGroup>> {
        let row: Option<GroupRow> = QueryBuilder::table("events_groups")
            .where_eq("id", id)
            .fetch_one_as(&self.pool)
            .await?;
        Ok(row.map(EventGroup::from))
    }

    pub async fn save_group(&self, group: &EventGroup) -> Result<i64> {
        match group.id {
            Some(id) => {
                QueryBuilder::table("events_groups")
                    .where_eq("id", id)
                    .update(&self.pool, &group_values(group))
                    .await?;
                Ok(id)
            }
            None => {
                QueryBuilder::table("events_groups")
                    .insert(&self.pool, &group_values(group))
                    .await
            }
        }
    }

    /// Delete a group; its events stay, ungrouped.
    pub async fn delete_group(&self, id: i64) -> Result<()> {
        QueryBuilder::table("events")
            .where_eq("group_id", id)
            .update(&self.pool, &[("group_id", Value::Null)])
            .await?;
        QueryBuilder::table("events_groups")
            .where_eq("id", id)
            .delete(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::installed_pool;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn event(name: &str, start: DateTime<Utc>, hours: i64) -> Event {
        let mut event = Event::new(name.into(), start, start + Duration::hours(hours), "en_english".into());
        event.published_at = Utc::now() - Duration::days(30);
        event
    }

    #[tokio::test]
    async fn test_upcoming_skips_finished_and_unpublished() {
        let repo = EventRepository::new(installed_pool().await);
        let now = Utc::now();
        repo.create(&event("past", now - Duration::days(3), 2)).await.unwrap();
        repo.create(&event("running", now - Duration::hours(1), 5)).await.unwrap();
        repo.create(&event("later", now + Duration::days(5), 5)).await.unwrap();
        let mut hidden = event("hidden", now + Duration::days(1), 5);
        hidden.published_at = now + Duration::days(2);
        repo.create(&hidden).await.unwrap();

        let names: Vec<_> = repo
            .upcoming("en_english", now)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["running", "later"]);
        assert_eq!(repo.list_public("en_english", now).await.unwrap().len(), 3);
        assert!(repo.upcoming("fr_french", now).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_many_returns_pictures() {
        let repo = EventRepository::new(installed_pool().await);
        let now = Utc::now();
        let mut with_picture = event("a", now, 1);
        with_picture.picture = Some("a-1234.png".into());
        let a = repo.create(&with_picture).await.unwrap();
        let b = repo.create(&event("b", now, 1)).await.unwrap();
        let c = repo.create(&event("c", now, 1)).await.unwrap();

        let pictures = repo.delete_many(&[a, b]).await.unwrap();
        assert_eq!(pictures, vec!["a-1234.png".to_string()]);
        assert_eq!(repo.count().await.unwrap(), 1);
        assert!(repo.find_by_id(c).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_group_round_trip_and_delete_ungroups_events() {
        let repo = EventRepository::new(installed_pool().await);
        let group_id = repo
            .save_group(&EventGroup {
                id: None,
                lang: "en_english".into(),
                name: "Marathons".into(),
                color: Some("#ff0000".into()),
                text_color: Some("#ffffff".into()),
            })
            .await
            .unwrap();
        let group = repo.find_group(group_id).await.unwrap().unwrap();
        assert_eq!(group.text_color.as_deref(), Some("#ffffff"));

        let mut grouped = event("grouped", Utc::now(), 1);
        grouped.group_id = Some(group_id);
        let id = repo.create(&grouped).await.unwrap();

        repo.delete_group(group_id).await.unwrap();
        assert!(repo.find_group(group_id).await.unwrap().is_none());
        assert_eq!(repo.find_by_id(id).await.unwrap().unwrap().group_id, None);
    }
}
