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

pub mod blog;
pub mod event;
pub mod gallery;
pub mod member;
pub mod notification;
pub mod page;
pub mod pagelist;
pub mod registration;
pub mod session;
pub mod snippet;
pub mod user;

pub use blog::*;
pub use event::*;
pub use gallery::*;
pub use member::*;
pub use notification::*;
pub use page::*;
pub use pagelist::*;
pub use registration::*;
pub use session::*;
pub use snippet::*;
pub use user::*;
