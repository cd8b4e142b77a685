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

use anyhow::Result;
use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Passwords shorter than this are refused by the admin forms.
pub const MIN_PASSWORD_LENGTH: usize = 5;

/// The first account. It always keeps full access and cannot be deleted.
pub const ROOT_USER_ID: i64 = 1;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9._%+-]*[a-zA-Z0-9])?@[a-zA-Z0-9]([a-zA-Z0-9.-]*[a-zA-Z0-9])?\.[a-zA-Z]{2,}$")
        .expect("email regex is valid")
});

static USERNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_.-]+$").expect("username regex is valid"));

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
    Blocked,
}

impl UserStatus {
    pub fn from_i64(value: i64) -> Self {
        match value {
            1 => UserStatus::Inactive,
            2 => UserStatus::Blocked,
            _ => UserStatus::Active,
        }
    }

    pub fn as_i64(self) -> i64 {
        match self {
            UserStatus::Active => 0,
            UserStatus::Inactive => 1,
            UserStatus::Blocked => 2,
        }
    }
}

/// Which admin modules a user may open.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Access {
    All,
    Modules(Vec<String>),
}

impl Access {
    /// Parse the stored form: `all` or a comma separated list of module dirs.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw == "all" {
            return Access::All;
        }
        let mut modules: Vec<String> = raw
            .split(',')
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        if !modules.iter().any(|m| m == "dashboard") {
            modules.push("dashboard".to_string());
        }
        Access::Modules(modules)
    }

    /// Build access from the module checkboxes of the user form. Selecting
    /// every available module collapses to `All`.
    pub fn from_selection(selected: &[String], available: usize) -> Self {
        if selected.iter().any(|s| s == "all") || (available > 0 && selected.len() >= available) {
            return Access::All;
        }
        Access::parse(&selected.join(","))
    }

    pub fn allows(&self, module: &str) -> bool {
        match self {
            Access::All => true,
            Access::Modules(modules) => modules.iter().any(|m| m == module),
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::All => write!(f, "all"),
            Access::Modules(modules) => write!(f, "{}", modules.join(",")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Option<i64>,
    pub username: String,
    pub fullname: Option<String>,
    pub description: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub avatar: Option<String>,
    pub email: String,
    pub role: String,
    pub access: Access,
    pub status: UserStatus,
}

impl User {
    /// Create a new user with a hashed password
    pub fn new(username: String, email: String, password: &str) -> Result<Self> {
        Self::validate_email(&email).map_err(|e| anyhow::anyhow!("Invalid email: {}", e))?;
        Self::validate_username(&username)
            .map_err(|e| anyhow::anyhow!("Invalid username: {}", e))?;
        Self::validate_password(password)
            .map_err(|e| anyhow::anyhow!("Invalid password: {}", e))?;

        Ok(Self {
            id: None,
            username,
            fullname: None,
            description: None,
            password_hash: Self::hash_password(password)?,
            avatar: None,
            email,
            role: "admin".to_string(),
            access: Access::All,
            status: UserStatus::Active,
        })
    }

    /// Name shown to visitors: full name when set, username otherwise.
    pub fn display_name(&self) -> &str {
        match self.fullname.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.username,
        }
    }

    pub fn is_root(&self) -> bool {
        self.id == Some(ROOT_USER_ID)
    }

    /// Effective access. The root account is never restricted.
    pub fn effective_access(&self) -> Access {
        if self.is_root() {
            Access::All
        } else {
            self.access.clone()
        }
    }

    /// Hash a password using Argon2
    pub fn hash_password(password: &str) -> Result<String> {
        use argon2::password_hash::rand_core::OsRng;

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
            .to_string();
        Ok(password_hash)
    }

    pub fn set_password(&mut self, password: &str) -> Result<()> {
        Self::validate_password(password).map_err(|e| anyhow::anyhow!(e))?;
        self.password_hash = Self::hash_password(password)?;
        Ok(())
    }

    /// Verify a password against the stored hash
    pub fn verify_password(&self, password: &str) -> Result<bool> {
        use argon2::password_hash::{PasswordHash, PasswordVerifier};

        let parsed_hash = PasswordHash::new(&self.password_hash)
            .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    pub fn validate_email(email: &str) -> Result<(), String> {
        if email.is_empty() {
            return Err("Email cannot be empty".to_string());
        }
        if email.len() > 255 {
            return Err("Email cannot exceed 255 characters".to_string());
        }
        if !EMAIL_REGEX.is_match(email) {
            return Err("Invalid email format".to_string());
        }
        Ok(())
    }

    pub fn validate_username(username: &str) -> Result<(), String> {
        if username.is_empty() {
            return Err("Username cannot be empty".to_string());
        }
        if username.len() > 50 {
            return Err("Username cannot exceed 50 characters".to_string());
        }
        if !USERNAME_REGEX.is_match(username) {
            return Err(
                "Username may only contain letters, numbers, dots, underscores and hyphens"
                    .to_string(),
            );
        }
        Ok(())
    }

    pub fn validate_password(password: &str) -> Result<(), String> {
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_user() {
        let user = User::new(
            "jdoe".to_string(),
            "jdoe@example.com".to_string(),
            "secret1",
        )
        .unwrap();

        assert!(user.id.is_none());
        assert_eq!(user.username, "jdoe");
        assert_ne!(user.password_hash, "secret1");
        assert_eq!(user.access, Access::All);
        assert_eq!(user.status, UserStatus::Active);
        assert!(user.verify_password("secret1").unwrap());
        assert!(!user.verify_password("secret2").unwrap());
    }

    #[test]
    fn test_short_password_rejected() {
        let result = User::new("jdoe".to_string(), "jdoe@example.com".to_string(), "abcd");
        assert!(result.is_err());
        assert!(User::validate_password("abcde").is_ok());
    }

    #[test]
    fn test_validate_email() {
        assert!(User::validate_email("a@b.co").is_ok());
        assert!(User::validate_email("").is_err());
        assert!(User::validate_email("no-at-sign.com").is_err());
        assert!(User::validate_email("user@domain").is_err());
    }

    #[test]
    fn test_validate_username() {
        assert!(User::validate_username("admin").is_ok());
        assert!(User::validate_username("john.doe-2").is_ok());
        assert!(User::validate_username("").is_err());
        assert!(User::validate_username("john doe").is_err());
    }

    #[test]
    fn test_access_parse() {
        assert_eq!(Access::parse("all"), Access::All);
        assert_eq!(
            Access::parse("blog, events"),
            Access::Modules(vec![
                "blog".to_string(),
                "events".to_string(),
                "dashboard".to_string()
            ])
        );
        assert_eq!(Access::parse("blog,dashboard").to_string(), "blog,dashboard");
    }

    #[test]
    fn test_access_allows() {
        let access = Access::parse("blog");
        assert!(access.allows("blog"));
        assert!(access.allows("dashboard"));
        assert!(!access.allows("users"));
        assert!(Access::All.allows("users"));
    }

    #[test]
    fn test_access_from_selection() {
        let all = vec!["blog".to_string(), "users".to_string()];
        assert_eq!(Access::from_selection(&all, 2), Access::All);
        assert_eq!(
            Access::from_selection(&all[..1], 2),
            Access::parse("blog")
        );
    }

    #[test]
    fn test_root_user_has_all_access() {
        let mut user = User::new(
            "admin".to_string(),
            "admin@example.com".to_string(),
            "admin1",
        )
        .unwrap();
        user.access = Access::parse("blog");
        assert_eq!(user.effective_access(), Access::parse("blog"));
        user.id = Some(ROOT_USER_ID);
        assert_eq!(user.effective_access(), Access::All);
    }

    #[test]
    fn test_display_name() {
        let mut user = User::new(
            "jdoe".to_string(),
            "jdoe@example.com".to_string(),
            "secret1",
        )
        .unwrap();
        assert_eq!(user.display_name(), "jdoe");
        user.fullname = Some("John Doe".to_string());
        assert_eq!(user.display_name(), "John Doe");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(UserStatus::from_i64(2), UserStatus::Blocked);
        assert_eq!(UserStatus::Inactive.as_i64(), 1);
        assert_eq!(UserStatus::from_i64(42), UserStatus::Active);
    }
}
