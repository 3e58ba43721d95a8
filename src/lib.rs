#![doc = "The `taskforge_accounts` library crate."]
#![doc = ""]
#![doc = "User accounts for the TaskForge backend: validation and normalization of user"]
#![doc = "records, bcrypt password storage, session-token issuance and revocation, and account"]
#![doc = "deletion that removes the user's tasks with it. The binary (`main.rs`) serves it over HTTP."]

pub mod accounts;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod store;

pub use crate::accounts::{AccountService, AccountSettings};
pub use crate::error::{AppError, AuthFailure};
