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

//! iCalendar (RFC 5545) export of events.

use chrono::{DateTime, Utc};

const LINE_LIMIT: usize = 75;
const DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// One `VEVENT` entry.
#[derive(Debug, Clone, Default)]
pub struct CalendarEvent {
    pub uid: String,
    pub summary: String,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub location: Option<String>,
    pub geo: Option<(f64, f64)>,
    pub url: Option<String>,
    pub attachment: Option<(String, &'static str)>,
}

pub struct Calendar {
    name: String,
    events: Vec<CalendarEvent>,
}

impl Calendar {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            events: Vec::new(),
        }
    }

    pub fn push(&mut self, event: CalendarEvent) {
        self.events.push(event);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn render(&self, stamp: DateTime<Utc>) -> String {
        let mut lines = vec![
            "BEGIN:VCALENDAR".to_string(),
            "VERSION:2.0".to_string(),
            "PRODID:-//Roost//Events//EN".to_string(),
            "CALSCALE:GREGORIAN".to_string(),
            format!("X-WR-CALNAME:{}", escape(&self.name)),
        ];
        for event in &self.events {
            lines.push("BEGIN:VEVENT".to_string());
            lines.push(format!("UID:{}", escape(&event.uid)));
            lines.push(format!("DTSTAMP:{}", stamp.format(DATE_FORMAT)));
            lines.push(format!("DTSTART:{}", event.start.format(DATE_FORMAT)));
            lines.push(format!("DTEND:{}", event.end.format(DATE_FORMAT)));
            lines.push(format!("SUMMARY:{}", escape(&event.summary)));
            if let Some(description) = event.description.as_deref().filter(|d| !d.is_empty()) {
                lines.push(format!("DESCRIPTION:{}", escape(description)));
            }
            if let Some(location) = event.location.as_deref().filter(|l| !l.is_empty()) {
                lines.push(format!("LOCATION:{}", escape(location)));
            }
            if let Some((lat, lon)) = event.geo {
                lines.push(format!("GEO:{};{}", lat, lon));
            }
            if let Some(url) = &event.url {
                lines.push(format!("URL:{}", url));
            }
            if let Some((uri, mime)) = &event.attachment {
                lines.push(format!("ATTACH;FMTTYPE={}:{}", mime, uri));
            }
            lines.push("END:VEVENT".to_string());
        }
        lines.push("END:VCALENDAR".to_string());

        let mut out = String::new();
        for line in lines {
            out.push_str(&fold(&line));
            out.push_str("\r\n");
        }
        out
    }
}

/// Escape a TEXT value.
pub fn escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace("\r\n", "\\n")
        .replace('\n', "\\n")
}

/// Fold content lines longer than 75 octets, without splitting characters.
fn fold(line: &str) -> String {
    if line.len() <= LINE_LIMIT {
        return line.to_string();
    }
    let mut out = String::with_capacity(line.len() + line.len() / LINE_LIMIT * 3);
    let mut width = 0;
    for c in line.chars() {
        let size = c.len_utf8();
        if width + size > LINE_LIMIT {
            out.push_str("\r\n ");
            width = 1;
        }
        out.push(c);
        width += size;
    }
    out
}
