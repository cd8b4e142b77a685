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

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use roost_core::models::user::{Access, User};
use roost_db::repositories::{ModuleRepository, UserRepository};
use roost_db::Settings;
use roost_web::config::Config;
use sqlx::SqlitePool;
use std::path::Path;

#[derive(Parser)]
#[command(name = "roost")]
#[command(about = "Roost CLI tool for installation, modules, users and settings")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database, default templates, static files and languages
    Init,

    /// Module management commands
    Module {
        #[command(subcommand)]
        command: ModuleCommands,
    },

    /// User management commands
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Read or change settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
}

#[derive(Subcommand)]
enum ModuleCommands {
    /// List every known module and whether it is installed
    List,
    /// Install a module and append it to the navigation
    Install { dir: String },
    /// Uninstall a module, dropping its tables and uploads
    Uninstall { dir: String },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a new user
    Create {
        /// Username
        username: String,
        /// Email address
        email: String,
        /// `all` or a comma separated list of modules
        #[arg(long, default_value = "all")]
        access: String,
        /// Password (will prompt if not provided)
        #[arg(long)]
        password: Option<String>,
    },

    /// Change user password
    Password {
        /// Username
        user: String,
        /// New password (will prompt if not provided)
        #[arg(long)]
        password: Option<String>,
    },

    /// List users
    List,
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Print `module.field`, or every field of `module`
    Get { key: String },
    /// Change an existing `module.field`
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::load()?;
    let uploads = config.uploads_path();

    match cli.command {
        Commands::Init => init(&config).await,
        Commands::Module { command } => {
            let pool = connect(&config).await?;
            let output = match command {
                ModuleCommands::List => list_modules(&pool).await?,
                ModuleCommands::Install { dir } => install(&pool, &dir, &uploads).await?,
                ModuleCommands::Uninstall { dir } => uninstall(&pool, &dir, &uploads).await?,
            };
            println!("{}", output);
            Ok(())
        }
        Commands::User { command } => {
            let pool = connect(&config).await?;
            println!("{}", handle_user_command(command, &pool).await?);
            Ok(())
        }
        Commands::Settings { command } => {
            let pool = connect(&config).await?;
            let output = match command {
                SettingsCommands::Get { key } => get_setting(&pool, &key).await?,
                SettingsCommands::Set { key, value } => set_setting(&pool, &key, &value).await?,
            };
            println!("{}", output);
            Ok(())
        }
    }
}

async fn connect(config: &Config) -> Result<SqlitePool> {
    roost_db::init_database(&config.database_url, Some(&config.uploads_path())).await
}

async fn init(config: &Config) -> Result<()> {
    println!("Initializing database at: {}", config.database_url);
    let pool = connect(config).await?;

    roost_web::templates::init_templates(&config.templates_dir, false)?;
    roost_web::templates::init_static(&config.static_dir)?;
    roost_web::lang::LangStore::new(&config.lang_dir)?;
    println!("Templates: {}", config.templates_dir);
    println!("Static files: {}", config.static_dir);
    println!("Languages: {}", config.lang_dir);

    if UserRepository::new(pool).count().await? == 0 {
        println!("No user yet. Create the administrator with 'roost user create'.");
    }
    println!("Roost initialized successfully!");
    Ok(())
}

async fn list_modules(pool: &SqlitePool) -> Result<String> {
    let installed = ModuleRepository::new(pool.clone()).list().await?;
    let lines: Vec<String> = roost_db::catalog()
        .iter()
        .map(|m| {
            let state = match installed.iter().position(|d| d == m.dir) {
                Some(n) => format!("installed #{}", n + 1),
                None => "available".to_string(),
            };
            let core = if m.core { " (core)" } else { "" };
            format!("{:<22} {:<14} {}{}", m.dir, state, m.name, core)
        })
        .collect();
    Ok(lines.join("\n"))
}

async fn install(pool: &SqlitePool, dir: &str, uploads: &Path) -> Result<String> {
    roost_db::install_module(pool, dir, Some(uploads)).await?;
    Ok(format!("Module {} installed", dir))
}

async fn uninstall(pool: &SqlitePool, dir: &str, uploads: &Path) -> Result<String> {
    let manifest = roost_db::manifest(dir).ok_or_else(|| anyhow!("Unknown module {}", dir))?;
    if manifest.core {
        return Err(anyhow!("Module {} is part of the core and cannot be removed", dir));
    }
    roost_db::uninstall_module(pool, dir, Some(uploads)).await?;
    Ok(format!("Module {} uninstalled", dir))
}

fn read_password(given: Option<String>) -> Result<String> {
    match given {
        Some(password) => Ok(password),
        None => rpassword::prompt_password("Password: ").context("Failed to read password"),
    }
}

async fn handle_user_command(command: UserCommands, pool: &SqlitePool) -> Result<String> {
    let repo = UserRepository::new(pool.clone());
    match command {
        UserCommands::Create {
            username,
            email,
            access,
            password,
        } => {
            if repo.username_taken(&username, None).await? {
                return Err(anyhow!("User {} already exists", username));
            }
            let password = read_password(password)?;
            let mut user = User::new(username, email, &password)?;
            user.access = Access::parse(&access);
            let id = repo.create(&user).await?;
            Ok(format!("User {} created with ID: {} (access: {})", user.username, id, user.access))
        }
        UserCommands::Password { user, password } => {
            let found = repo
                .find_by_username(&user)
                .await?
                .ok_or_else(|| anyhow!("User not found: {}", user))?;
            let password = read_password(password)?;
            User::validate_password(&password).map_err(|e| anyhow!(e))?;
            let hash = User::hash_password(&password)?;
            repo.update_password(found.id.unwrap_or_default(), &hash).await?;
            Ok(format!("Password changed for {}", found.username))
        }
        UserCommands::List => {
            let users = repo.list().await?;
            if users.is_empty() {
                return Ok("No users".to_string());
            }
            let lines: Vec<String> = users
                .iter()
                .map(|u| {
                    format!(
                        "{:>4}  {:<20} {:<30} {:<9} {}",
                        u.id.unwrap_or_default(),
                        u.username,
                        u.email,
                        format!("{:?}", u.status).to_lowercase(),
                        u.effective_access()
                    )
                })
                .collect();
            Ok(lines.join("\n"))
        }
    }
}

async fn get_setting(pool: &SqlitePool, key: &str) -> Result<String> {
    let settings = Settings::load(pool.clone()).await?;
    if key.contains('.') {
        return settings
            .get(key)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("No setting {}", key));
    }
    let module = settings
        .module(key)
        .ok_or_else(|| anyhow!("No settings for module {}", key))?;
    Ok(serde_json::to_string_pretty(module)?)
}

async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<String> {
    let mut settings = Settings::load(pool.clone()).await?;
    if !settings.set(key, value).await? {
        return Err(anyhow!("No setting {}", key));
    }
    Ok(format!("{} = {}", key, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    async fn pool() -> SqlitePool {
        roost_db::init_database("sqlite::memory:", None).await.unwrap()
    }

    #[tokio::test]
    async fn test_module_install_and_uninstall() {
        let pool = pool().await;
        let uploads = TempDir::new().unwrap();

        let listing = list_modules(&pool).await.unwrap();
        assert!(listing.lines().any(|l| l.starts_with("dashboard") && l.contains("installed #1")));

        let err = install(&pool, "blog", uploads.path()).await.unwrap_err();
        assert!(err.to_string().contains("already installed"));

        uninstall(&pool, "twitch", uploads.path()).await.unwrap();
        assert!(!ModuleRepository::new(pool.clone()).has("twitch").await.unwrap());
        install(&pool, "twitch", uploads.path()).await.unwrap();
        let dirs = ModuleRepository::new(pool.clone()).list().await.unwrap();
        assert_eq!(dirs.last().map(String::as_str), Some("twitch"));

        assert!(uninstall(&pool, "settings", uploads.path()).await.is_err());
        assert!(install(&pool, "nope", uploads.path()).await.is_err());
    }

    #[tokio::test]
    async fn test_user_commands() {
        let pool = pool().await;
        let create = |username: &str, access: &str| UserCommands::Create {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            access: access.to_string(),
            password: Some("secret1".to_string()),
        };
        let out = handle_user_command(create("admin", "all"), &pool).await.unwrap();
        assert!(out.contains("ID: 1"));
        let out = handle_user_command(create("writer", "blog,events"), &pool).await.unwrap();
        assert!(out.contains("access: blog,events,dashboard"));
        assert!(handle_user_command(create("writer", "all"), &pool).await.is_err());

        let change = UserCommands::Password {
            user: "writer".to_string(),
            password: Some("abc".to_string()),
        };
        assert!(handle_user_command(change, &pool).await.is_err());
        let change = UserCommands::Password {
            user: "writer".to_string(),
            password: Some("longer-secret".to_string()),
        };
        handle_user_command(change, &pool).await.unwrap();
        let writer = UserRepository::new(pool.clone())
            .find_by_username("writer")
            .await
            .unwrap()
            .unwrap();
        assert!(writer.verify_password("longer-secret").unwrap());

        let list = handle_user_command(UserCommands::List, &pool).await.unwrap();
        assert_eq!(list.lines().count(), 2);
        assert!(list.lines().next().unwrap().contains("admin"));
    }

    #[tokio::test]
    async fn test_settings_get_and_set() {
        let pool = pool().await;
        set_setting(&pool, "blog.perpage", "7").await.unwrap();
        assert_eq!(get_setting(&pool, "blog.perpage").await.unwrap(), "7");
        assert!(get_setting(&pool, "blog").await.unwrap().contains("\"perpage\": \"7\""));
        assert!(set_setting(&pool, "blog.perpage", "").await.is_err());
        assert!(set_setting(&pool, "blog.nothing", "1").await.is_err());
        assert!(get_setting(&pool, "nothing.here").await.is_err());
    }
}
