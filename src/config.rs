// src/config.rs

use std::{env, net::SocketAddr, str::FromStr, time::Duration};

use dotenvy::dotenv;

/// Default minimum total score for an exam to count as passed.
///
/// A fixed count of correct answers, independent of how many questions the
/// exam has.
pub const DEFAULT_PASS_THRESHOLD: i64 = 5;

/// Default per-call timeout for store collaborators, in milliseconds.
pub const DEFAULT_COLLABORATOR_TIMEOUT_MS: u64 = 3000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: SocketAddr,
    pub pass_threshold: i64,
    pub collaborator_timeout: Duration,
    pub teacher_username: Option<String>,
    pub teacher_password: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET")?;

        let jwt_expiration = parsed("JWT_EXPIRATION", 86_400)?;
        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let bind_addr = parsed("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?;
        let pass_threshold = parsed("PASS_THRESHOLD", DEFAULT_PASS_THRESHOLD)?;
        let timeout_ms = parsed("COLLABORATOR_TIMEOUT_MS", DEFAULT_COLLABORATOR_TIMEOUT_MS)?;

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            bind_addr,
            pass_threshold,
            collaborator_timeout: Duration::from_millis(timeout_ms),
            teacher_username: env::var("TEACHER_USERNAME").ok(),
            teacher_password: env::var("TEACHER_PASSWORD").ok(),
        })
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn parsed<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}
