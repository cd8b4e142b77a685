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

use chrono::{DateTime, Utc};

pub mod auth_repository;
pub mod blog_repository;
pub mod event_repository;
pub mod gallery_repository;
pub mod member_repository;
pub mod module_repository;
pub mod page_repository;
pub mod pagelist_repository;
pub mod registration_repository;
pub mod session_repository;
pub mod snippet_repository;
pub mod user_repository;

pub use auth_repository::*;
pub use blog_repository::*;
pub use event_repository::*;
pub use gallery_repository::*;
pub use member_repository::*;
pub use module_repository::*;
pub use page_repository::*;
pub use pagelist_repository::*;
pub use registration_repository::*;
pub use session_repository::*;
pub use snippet_repository::*;
pub use user_repository::*;

/// Columns hold unix seconds.
pub(crate) fn from_timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}
