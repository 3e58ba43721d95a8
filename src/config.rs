use std::env;

use crate::accounts::AccountSettings;
use crate::error::AppError;

/// Cost the password hashes were historically created with.
pub const DEFAULT_BCRYPT_COST: u32 = 8;

pub struct Config {
    pub database_url: String,
    pub server_port: u16,
    pub server_host: String,
    pub jwt_secret: String,
    pub bcrypt_cost: u32,
    pub token_ttl_hours: Option<i64>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            server_port: parsed("SERVER_PORT")?.unwrap_or(8080),
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            jwt_secret: required("JWT_SECRET")?,
            bcrypt_cost: parsed("BCRYPT_COST")?.unwrap_or(DEFAULT_BCRYPT_COST),
            token_ttl_hours: parsed("TOKEN_TTL_HOURS")?,
        })
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }

    /// The part of the configuration the account service needs.
    pub fn account_settings(&self) -> AccountSettings {
        AccountSettings {
            jwt_secret: self.jwt_secret.clone(),
            bcrypt_cost: self.bcrypt_cost,
            token_ttl_hours: self.token_ttl_hours,
        }
    }
}

fn required(key: &str) -> Result<String, AppError> {
    env::var(key).map_err(|_| AppError::InternalServerError(format!("{} must be set", key)))
}

fn parsed<T: std::str::FromStr>(key: &str) -> Result<Option<T>, AppError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| AppError::InternalServerError(format!("{} is not a valid value", key))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Single test so the process environment is not mutated concurrently.
    #[test]
    fn test_config_from_env() {
        env::remove_var("SERVER_PORT");
        env::remove_var("SERVER_HOST");
        env::remove_var("BCRYPT_COST");
        env::remove_var("TOKEN_TTL_HOURS");
        env::remove_var("JWT_SECRET");
        env::set_var("DATABASE_URL", "postgres://test");

        assert!(matches!(
            Config::from_env(),
            Err(AppError::InternalServerError(msg)) if msg.contains("JWT_SECRET")
        ));

        env::set_var("JWT_SECRET", "config-test-secret");
        let config = Config::from_env().unwrap();

        assert_eq!(config.database_url, "postgres://test");
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.server_host, "127.0.0.1");
        assert_eq!(config.bcrypt_cost, DEFAULT_BCRYPT_COST);
        assert_eq!(config.token_ttl_hours, None);
        assert_eq!(config.server_url(), "http://127.0.0.1:8080");

        env::set_var("SERVER_PORT", "3000");
        env::set_var("SERVER_HOST", "0.0.0.0");
        env::set_var("TOKEN_TTL_HOURS", "24");

        let config = Config::from_env().unwrap();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.server_host, "0.0.0.0");
        assert_eq!(config.account_settings().token_ttl_hours, Some(24));

        env::set_var("SERVER_PORT", "not-a-port");
        assert!(Config::from_env().is_err());

        env::remove_var("SERVER_PORT");
        env::remove_var("SERVER_HOST");
        env::remove_var("TOKEN_TTL_HOURS");
    }
}
