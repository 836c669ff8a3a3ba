//! Process configuration loaded once from environment variables.
//!
//! Secrets (token signing key, admin bootstrap token) live here and are
//! handed to the services through `AppState`; nothing reads the environment
//! after startup.

use chrono::Duration;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_JWT_SECRET: &str = "default-jwt-secret-change-in-production";

/// Longest accepted token lifetime (ten years).
pub const MAX_TOKEN_TTL_SECS: i64 = 10 * 365 * 86_400;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JWT_SECRET_KEY must be set to a secure, unique value in production")]
    InsecureJwtSecret,

    #[error("invalid JWT_EXPIRE_TIME: {0:?}")]
    InvalidTokenTtl(String),

    #[error("invalid HOST/PORT: {0}")]
    InvalidAddress(String),
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `production` switches logging to JSON and enforces a real JWT secret.
    /// Env: `ENVIRONMENT`
    pub environment: String,

    /// Env: `HOST` / `PORT`. Default: `127.0.0.1:4000`
    pub host: String,
    pub port: u16,

    /// `None` runs the server on the in-process store.
    /// Env: `DATABASE_URL`
    pub database: Option<DbConfig>,

    /// Env: `JWT_SECRET_KEY` (or `JWT_SECRET`)
    pub jwt_secret: String,

    /// Env: `JWT_EXPIRE_TIME`. Default: one day.
    pub token_ttl: Duration,

    /// Registration elevates to admin only when this matches.
    /// Env: `ADMIN_ACCESS_TOKEN`
    pub admin_access_token: Option<String>,

    /// Env: `UPLOAD_DIR`. Default: `uploads`
    pub upload_dir: PathBuf,

    /// Env: `MAX_UPLOAD_BYTES`. Default: 5 MiB
    pub max_upload_bytes: usize,

    /// Env: `ALLOWED_ORIGINS` (comma-separated) or `FRONTEND_ORIGIN`
    pub allowed_origins: Vec<String>,

    /// Env: `GEMINI_API_KEY`, `GEMINI_MODEL`, `GEMINI_API_BASE`
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_api_base: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            host: "127.0.0.1".to_string(),
            port: 4000,
            database: None,
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            token_ttl: Duration::days(1),
            admin_access_token: None,
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: 5 * 1024 * 1024,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            gemini_api_key: None,
            gemini_model: "gemini-2.0-flash".to_string(),
            gemini_api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_var(key).and_then(|s| s.trim().parse().ok())
}

impl AppConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(env) = env_var("ENVIRONMENT") {
            config.environment = env;
        }
        if let Some(host) = env_var("HOST") {
            config.host = host;
        }
        if let Some(port) = env_parse("PORT") {
            config.port = port;
        }

        config.database = env_var("DATABASE_URL").map(|url| DbConfig {
            url,
            max_connections: env_parse("DB_POOL_MAX").unwrap_or(10),
            min_connections: env_parse("DB_POOL_MIN").unwrap_or(2),
            idle_timeout_secs: env_parse("DB_IDLE_TIMEOUT").unwrap_or(300),
        });

        if let Some(secret) = env_var("JWT_SECRET_KEY").or_else(|| env_var("JWT_SECRET")) {
            config.jwt_secret = secret;
        }
        if let Some(raw) = env_var("JWT_EXPIRE_TIME") {
            config.token_ttl = parse_ttl(&raw).ok_or(ConfigError::InvalidTokenTtl(raw))?;
        }

        config.admin_access_token = env_var("ADMIN_ACCESS_TOKEN");

        if let Some(dir) = env_var("UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(dir);
        }
        if let Some(max) = env_parse("MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = max;
        }

        let origins: Vec<String> = env_var("ALLOWED_ORIGINS")
            .or_else(|| env_var("FRONTEND_ORIGIN"))
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        if !origins.is_empty() {
            config.allowed_origins = origins;
        }

        config.gemini_api_key = env_var("GEMINI_API_KEY");
        if let Some(model) = env_var("GEMINI_MODEL") {
            config.gemini_model = model;
        }
        if let Some(base) = env_var("GEMINI_API_BASE") {
            config.gemini_api_base = base.trim_end_matches('/').to_string();
        }

        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Refuse to start in production with the insecure default secret.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.is_production() && self.jwt_secret == DEFAULT_JWT_SECRET {
            return Err(ConfigError::InsecureJwtSecret);
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|_| ConfigError::InvalidAddress(raw))
    }
}

/// Parse a token lifetime such as `3600`, `30m`, `12h`, `1d` or `7 days`.
/// A bare number is a count of seconds. Lifetimes above `MAX_TOKEN_TTL_SECS`
/// are refused.
pub fn parse_ttl(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let amount: i64 = digits.parse().ok()?;
    if amount <= 0 {
        return None;
    }

    let seconds_per_unit = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => 60,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3_600,
        "d" | "day" | "days" => 86_400,
        "w" | "week" | "weeks" => 604_800,
        _ => return None,
    };

    amount
        .checked_mul(seconds_per_unit)
        .filter(|secs| *secs <= MAX_TOKEN_TTL_SECS)
        .map(Duration::seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.port, 4000);
        assert_eq!(config.token_ttl, Duration::days(1));
        assert!(config.database.is_none());
        assert!(config.admin_access_token.is_none());
    }

    #[test]
    fn test_parse_ttl_units() {
        assert_eq!(parse_ttl("3600"), Some(Duration::hours(1)));
        assert_eq!(parse_ttl("30m"), Some(Duration::minutes(30)));
        assert_eq!(parse_ttl("12h"), Some(Duration::hours(12)));
        assert_eq!(parse_ttl("1d"), Some(Duration::days(1)));
        assert_eq!(parse_ttl("7 days"), Some(Duration::days(7)));
    }

    #[test]
    fn test_parse_ttl_rejects_garbage() {
        assert_eq!(parse_ttl(""), None);
        assert_eq!(parse_ttl("0"), None);
        assert_eq!(parse_ttl("soon"), None);
        assert_eq!(parse_ttl("5 fortnights"), None);
    }

    #[test]
    fn test_parse_ttl_rejects_out_of_range() {
        assert_eq!(parse_ttl("1000000000d"), None);
        assert_eq!(parse_ttl("9223372036854775807w"), None);
        assert_eq!(parse_ttl("3650d"), Some(Duration::days(3650)));
        assert_eq!(parse_ttl("3651d"), None);
    }

    #[test]
    fn test_production_requires_real_secret() {
        let config = AppConfig {
            environment: "production".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InsecureJwtSecret)
        ));

        let config = AppConfig {
            jwt_secret: "a-real-secret".to_string(),
            ..config
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bind_addr() {
        let config = AppConfig::default();
        assert_eq!(
            config.bind_addr().unwrap(),
            "127.0.0.1:4000".parse::<SocketAddr>().unwrap()
        );
    }
}
