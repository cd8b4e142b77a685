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

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotifyKind {
    Success,
    Failure,
}

/// A one-shot message shown on the next rendered page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub kind: NotifyKind,
    pub text: String,
}

impl Notification {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            kind: NotifyKind::Success,
            text: text.into(),
        }
    }

    pub fn failure(text: impl Into<String>) -> Self {
        Self {
            kind: NotifyKind::Failure,
            text: text.into(),
        }
    }

    /// CSS flavour used by the alert box.
    pub fn css_class(&self) -> &'static str {
        match self.kind {
            NotifyKind::Success => "success",
            NotifyKind::Failure => "danger",
        }
    }
}

/// Template-facing view of a notification.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NotificationView {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl From<Notification> for NotificationView {
    fn from(n: Notification) -> Self {
        Self {
            kind: n.css_class(),
            text: n.text,
        }
    }
}
