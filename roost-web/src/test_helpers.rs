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

use image::{DynamicImage, ImageBuffer, Rgb};
use roost_core::models::session::Session;
use roost_core::models::user::User;
use roost_db::repositories::UserRepository;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::core::Core;
use crate::lang::LangStore;
use crate::templates::init_templates;
use crate::AppState;

/// Directories backing a test state. Dropping it removes them.
pub struct TestDirs {
    pub root: TempDir,
}

impl TestDirs {
    pub fn uploads(&self) -> std::path::PathBuf {
        self.root.path().join("uploads")
    }
}

/// In-memory database with every basic module installed.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    roost_db::fresh_install(&pool, None).await.unwrap();
    pool
}

pub async fn create_test_state() -> (AppState, TestDirs) {
    let root = TempDir::new().unwrap();
    let path = |name: &str| root.path().join(name).to_string_lossy().to_string();

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        templates_dir: path("templates"),
        uploads_dir: path("uploads"),
        static_dir: path("static"),
        lang_dir: path("lang"),
        update_feed_url: String::new(),
        ..Config::default()
    };
    std::fs::create_dir_all(config.uploads_path()).unwrap();

    let pool = test_pool().await;
    let templates = init_templates(&config.templates_dir, false).unwrap();
    let lang = LangStore::new(&config.lang_dir).unwrap();
    let state = AppState::new(pool, templates, config, lang).unwrap();
    (state, TestDirs { root })
}

pub async fn create_test_user(pool: &SqlitePool, username: &str, password: &str) -> User {
    let mut user = User::new(
        username.to_string(),
        format!("{}@example.com", username),
        password,
    )
    .unwrap();
    let id = UserRepository::new(pool.clone()).create(&user).await.unwrap();
    user.id = Some(id);
    user
}

/// A site-side core over a fresh state, with an anonymous session.
pub async fn test_core() -> (Core, TestDirs) {
    let (state, dirs) = create_test_state().await;
    let session = Arc::new(Mutex::new(Session::new())).lock_owned().await;
    let core = Core::new(&state, session, "").await.unwrap();
    (core, dirs)
}

/// A core logged in as a fresh `admin` user, as an admin controller sees it.
pub async fn admin_core() -> (Core, TestDirs) {
    let (mut core, dirs) = test_core().await;
    let user = create_test_user(core.db(), "admin", "secret1").await;
    core.session.data.user_id = user.id;
    core.session.data.token = Some("t0k3n".to_string());
    core.user = Some(user);
    (core, dirs)
}

/// A plain PNG of the given size.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_pixel(width, height, Rgb([200u8, 30, 30]));
    let mut out = std::io::Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}
