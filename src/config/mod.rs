use serde::Deserialize;
use std::env;
use std::str::FromStr;
use thiserror::Error;

use crate::models::ReleaseMode;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

// Top-level configuration, one section per concern
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub ledger: LedgerConfig,
    pub seed: SeedConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

// Caching is skipped entirely when no URL is configured
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: Option<String>,
    pub seats_ttl_seconds: u64,
    pub movies_ttl_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expires_in_hours: i64,
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    pub max_attempts: u32,
    pub lock_timeout_ms: u64,
    pub retry_backoff_ms: u64,
    pub release_mode: ReleaseMode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedConfig {
    pub demo_data: bool,
    pub admin_email: String,
    pub admin_password: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        Ok(Config {
            app: AppConfig {
                host: vars.or("HOST", "0.0.0.0"),
                port: vars.parse_or("PORT", 8000)?,
                environment: vars.or("ENVIRONMENT", "development"),
                rust_log: vars.or("RUST_LOG", "cinema_booking=debug,tower_http=debug"),
            },
            database: DatabaseConfig {
                url: vars.or("DATABASE_URL", "sqlite://cinema.sqlite?mode=rwc"),
                pool_size: vars.parse_or("DB_POOL_SIZE", 10)?,
            },
            redis: RedisConfig {
                url: vars.get("REDIS_URL").filter(|url| !url.is_empty()),
                seats_ttl_seconds: vars.parse_or("REDIS_SEATS_TTL_SECONDS", 300)?,
                movies_ttl_seconds: vars.parse_or("REDIS_MOVIES_TTL_SECONDS", 3600)?,
            },
            jwt: JwtConfig {
                secret: vars.required("JWT_SECRET")?,
                expires_in_hours: vars.parse_or("JWT_EXPIRES_IN_HOURS", 24)?,
                bcrypt_cost: vars.parse_or("BCRYPT_COST", bcrypt::DEFAULT_COST)?,
            },
            ledger: LedgerConfig {
                max_attempts: vars.parse_or("LEDGER_MAX_ATTEMPTS", 3)?,
                lock_timeout_ms: vars.parse_or("LEDGER_LOCK_TIMEOUT_MS", 2000)?,
                retry_backoff_ms: vars.parse_or("LEDGER_RETRY_BACKOFF_MS", 10)?,
                release_mode: vars.parse_or("RELEASE_MODE", ReleaseMode::Cancel)?,
            },
            seed: SeedConfig {
                demo_data: vars.parse_or("SEED_DEMO_DATA", false)?,
                admin_email: vars.or("SEED_ADMIN_EMAIL", "admin@cinema.local"),
                admin_password: vars.or("SEED_ADMIN_PASSWORD", "admin123"),
            },
        })
    }

    pub fn is_production(&self) -> bool {
        self.app.environment.eq_ignore_ascii_case("production")
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name)
    }

    fn or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.get(name)
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::Missing(name))
    }

    fn parse_or<T: FromStr>(&self, name: &'static str, default: T) -> Result<T, ConfigError> {
        match self.get(name) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { name, value: raw }),
        }
    }
}
