//! Gateway configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). [`GatewayConfig::from_lookup`] takes
//! an arbitrary key lookup so tests never touch the process environment.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use crate::domain::PhoneNumber;

/// Startup configuration failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A key was set to a value that cannot be parsed.
    #[error("invalid value for {key}: {reason}")]
    Invalid {
        /// Environment key.
        key: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// A key required by another setting is missing.
    #[error("{key} is required: {reason}")]
    Missing {
        /// Environment key.
        key: &'static str,
        /// Why the key is needed.
        reason: &'static str,
    },
}

/// Which document store backs the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Process-local store, lost on restart.
    Memory,
    /// PostgreSQL via `DATABASE_URL`.
    Postgres,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-field lines.
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Settings for the HMAC JWT identity provider.
#[derive(Debug, Clone)]
pub struct JwtSettings {
    /// Shared HMAC secret.
    pub secret: String,
    /// Expected `iss` claim, if any.
    pub issuer: Option<String>,
}

/// Top-level gateway configuration.
///
/// Loaded once at startup via [`GatewayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// Origins echoed in `Access-Control-Allow-Origin`.
    pub cors_allowed_origins: Vec<String>,

    /// Document store backend.
    pub store_backend: StoreBackend,

    /// PostgreSQL connection string, required for [`StoreBackend::Postgres`].
    pub database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    pub database_max_connections: u32,

    /// Minimum idle connections in the pool.
    pub database_min_connections: u32,

    /// Timeout in seconds for acquiring a database connection.
    pub database_connect_timeout_secs: u64,

    /// Buffered change notifications per collection in the memory store.
    pub change_feed_capacity: usize,

    /// JWT identity provider settings.
    pub jwt: Option<JwtSettings>,

    /// Static token table for development and tests.
    pub static_tokens: HashMap<String, PhoneNumber>,

    /// Largest request body `read_body` accepts.
    pub max_body_bytes: usize,

    /// Interval between keep-alive comments on event streams.
    pub sse_keep_alive: Duration,

    /// Log output format.
    pub log_format: LogFormat,
}

impl GatewayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a value cannot be parsed or a
    /// required key is missing.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a value cannot be parsed or a
    /// required key is missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr: SocketAddr = lookup("LISTEN_ADDR")
            .unwrap_or_else(|| "0.0.0.0:3000".to_string())
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                key: "LISTEN_ADDR",
                reason: e.to_string(),
            })?;

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| "https://neon.estate".to_string())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        let store_backend = match lookup("STORE_BACKEND").as_deref() {
            None | Some("memory") => StoreBackend::Memory,
            Some("postgres") => StoreBackend::Postgres,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "STORE_BACKEND",
                    reason: format!("expected `memory` or `postgres`, got `{other}`"),
                });
            }
        };

        let database_url = lookup("DATABASE_URL").filter(|url| !url.is_empty());
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing {
                key: "DATABASE_URL",
                reason: "STORE_BACKEND is postgres",
            });
        }

        let jwt = lookup("AUTH_JWT_SECRET")
            .filter(|secret| !secret.is_empty())
            .map(|secret| JwtSettings {
                secret,
                issuer: lookup("AUTH_JWT_ISSUER").filter(|iss| !iss.is_empty()),
            });

        let static_tokens = match lookup("AUTH_STATIC_TOKENS") {
            Some(raw) => parse_static_tokens(&raw)?,
            None => HashMap::new(),
        };

        if jwt.is_none() && static_tokens.is_empty() {
            return Err(ConfigError::Missing {
                key: "AUTH_JWT_SECRET",
                reason: "no identity provider is configured (set it or AUTH_STATIC_TOKENS)",
            });
        }

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "LOG_FORMAT",
                    reason: format!("expected `pretty` or `json`, got `{other}`"),
                });
            }
        };

        Ok(Self {
            listen_addr,
            cors_allowed_origins,
            store_backend,
            database_url,
            database_max_connections: parse_env(&lookup, "DATABASE_MAX_CONNECTIONS", 10),
            database_min_connections: parse_env(&lookup, "DATABASE_MIN_CONNECTIONS", 2),
            database_connect_timeout_secs: parse_env(&lookup, "DATABASE_CONNECT_TIMEOUT_SECS", 5),
            change_feed_capacity: parse_env(&lookup, "CHANGE_FEED_CAPACITY", 1024).max(1),
            jwt,
            static_tokens,
            max_body_bytes: parse_env(&lookup, "MAX_BODY_BYTES", 1024 * 1024),
            sse_keep_alive: Duration::from_secs(parse_env(&lookup, "SSE_KEEP_ALIVE_SECS", 15).max(1)),
            log_format,
        })
    }
}

/// Parses a variable as `T`, returning `default` on missing or invalid
/// values.
fn parse_env<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Parses `token=+15550001,other=+15550002`.
fn parse_static_tokens(raw: &str) -> Result<HashMap<String, PhoneNumber>, ConfigError> {
    let mut tokens = HashMap::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((token, phone)) = pair.split_once('=') else {
            return Err(ConfigError::Invalid {
                key: "AUTH_STATIC_TOKENS",
                reason: format!("`{pair}` is not `token=phone`"),
            });
        };
        let phone = PhoneNumber::parse(phone.trim()).ok_or_else(|| ConfigError::Invalid {
            key: "AUTH_STATIC_TOKENS",
            reason: format!("`{phone}` is not a phone number"),
        })?;
        tokens.insert(token.trim().to_string(), phone);
    }
    Ok(tokens)
}
