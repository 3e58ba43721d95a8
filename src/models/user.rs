use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;

/// Name stored when a registration does not supply one.
pub const DEFAULT_NAME: &str = "Anonymous";
/// Minimum password length, counted after trimming.
pub const MIN_PASSWORD_LEN: usize = 7;

lazy_static! {
    // Passwords may not contain the word "password" in any casing.
    static ref FORBIDDEN_PASSWORD_WORD: Regex = Regex::new(r"(?i)password").unwrap();
}

/// A user account as persisted by the store.
///
/// This type deliberately does not implement `Serialize`: the only way a user
/// leaves the service is through [`User::to_public`].
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub age: i32,
    pub email: String,
    /// bcrypt digest, never the plaintext.
    pub password: String,
    /// Session tokens in issue order.
    pub tokens: Vec<String>,
    pub avatar: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The externally visible projection of a [`User`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub age: i32,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Projects the user for exposure across a trust boundary, dropping the
    /// password digest, the session tokens and the avatar bytes.
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            name: self.name.clone(),
            age: self.age,
            email: self.email.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn holds_token(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t == token)
    }
}

/// Raw registration fields as supplied by a caller.
#[derive(Debug, Clone, Deserialize)]
pub struct UserInput {
    pub name: Option<String>,
    pub age: Option<i32>,
    pub email: String,
    pub password: String,
}

/// Profile changes a caller may request. Any other key is rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub age: Option<i32>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.age.is_none() && self.email.is_none() && self.password.is_none()
    }
}

/// A validated registration ready to be stored; `password_hash` is already digested.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub age: i32,
    pub email: String,
    pub password_hash: String,
}

/// Validated profile changes; `password_hash` is set only when the password changed.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub age: Option<i32>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

/// Trims the name, substituting [`DEFAULT_NAME`] when none was given.
pub fn normalize_name(name: Option<&str>) -> Result<String, AppError> {
    match name {
        None => Ok(DEFAULT_NAME.to_string()),
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Err(AppError::validation("name", "Name is required"));
            }
            Ok(trimmed.to_string())
        }
    }
}

pub fn validate_age(age: i32) -> Result<i32, AppError> {
    if age < 0 {
        return Err(AppError::validation("age", "Age must be a positive number!"));
    }
    Ok(age)
}

/// Trims and lower-cases the email, then checks its syntax.
pub fn normalize_email(email: &str) -> Result<String, AppError> {
    let normalized = email.trim().to_lowercase();
    if normalized.is_empty() {
        return Err(AppError::validation("email", "Email is required"));
    }
    if !validator::validate_email(normalized.as_str()) {
        return Err(AppError::validation("email", "Invalid Email!"));
    }
    Ok(normalized)
}

/// Trims the password and checks the length and forbidden-word rules.
/// Returns the trimmed plaintext, which is what gets hashed.
pub fn validate_password(password: &str) -> Result<String, AppError> {
    let trimmed = password.trim();
    if trimmed.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation("password", "Password too Small!"));
    }
    if FORBIDDEN_PASSWORD_WORD.is_match(trimmed) {
        return Err(AppError::validation(
            "password",
            "Password Must not contain the word \"password\"",
        ));
    }
    Ok(trimmed.to_string())
}
