// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment once at startup. There is no
//! configuration file.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `3909` |
//! | `AUTH_SECRET` | HMAC secret for session tokens | Required |
//! | `CONSOLE_USERNAME` | Console login name | Required |
//! | `CONSOLE_PASSWORD` | Argon2 PHC string or plaintext password | Required |
//! | `GARAGE_BACKEND` | `http` or `memory` | `http` |
//! | `GARAGE_ADMIN_URL` | Admin API base URL | Required for `http` |
//! | `GARAGE_ADMIN_TOKEN` | Admin API bearer token | Required for `http` |
//! | `ADMIN_API_TIMEOUT_SECS` | Admin API request timeout | `30` |
//! | `ROOT_KEY_CACHE_TTL_SECS` | Root key cache TTL | `300` |
//! | `APP_ENV` | `development` relaxes the cookie `Secure` default | `production` |
//! | `COOKIE_SECURE` | Force the cookie `Secure` attribute on or off | see `APP_ENV` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::time::Duration;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Session token signing secret.
///
/// A missing secret is a deployment error: the server refuses to start
/// rather than accept unsigned or unverifiable tokens.
pub const AUTH_SECRET_ENV: &str = "AUTH_SECRET";

pub const CONSOLE_USERNAME_ENV: &str = "CONSOLE_USERNAME";

/// Console password. Values starting with `$argon2` are verified as PHC
/// hashes, anything else is compared as plaintext.
pub const CONSOLE_PASSWORD_ENV: &str = "CONSOLE_PASSWORD";

pub const GARAGE_BACKEND_ENV: &str = "GARAGE_BACKEND";
pub const GARAGE_ADMIN_URL_ENV: &str = "GARAGE_ADMIN_URL";
pub const GARAGE_ADMIN_TOKEN_ENV: &str = "GARAGE_ADMIN_TOKEN";
pub const ADMIN_API_TIMEOUT_ENV: &str = "ADMIN_API_TIMEOUT_SECS";
pub const ROOT_KEY_CACHE_TTL_ENV: &str = "ROOT_KEY_CACHE_TTL_SECS";
pub const APP_ENV_ENV: &str = "APP_ENV";
pub const COOKIE_SECURE_ENV: &str = "COOKIE_SECURE";

/// Logging format: `json` for structured output, anything else for pretty.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3909;
pub const DEFAULT_ADMIN_API_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_ROOT_KEY_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Which credential store backs the console.
#[derive(Clone, PartialEq, Eq)]
pub enum BackendKind {
    Http { admin_url: String, admin_token: String },
    Memory,
}

impl std::fmt::Debug for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http { admin_url, .. } => f
                .debug_struct("Http")
                .field("admin_url", admin_url)
                .field("admin_token", &"<redacted>")
                .finish(),
            Self::Memory => f.write_str("Memory"),
        }
    }
}

#[derive(Clone)]
pub struct ConsoleConfig {
    pub bind_addr: SocketAddr,
    pub auth_secret: String,
    pub username: String,
    pub password: String,
    pub backend: BackendKind,
    pub admin_api_timeout: Duration,
    pub root_key_cache_ttl: Duration,
    pub cookie_secure: bool,
}

impl std::fmt::Debug for ConsoleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleConfig")
            .field("bind_addr", &self.bind_addr)
            .field("auth_secret", &"<redacted>")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("backend", &self.backend)
            .field("admin_api_timeout", &self.admin_api_timeout)
            .field("root_key_cache_ttl", &self.root_key_cache_ttl)
            .field("cookie_secure", &self.cookie_secure)
            .finish()
    }
}

impl ConsoleConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let host = env.or_default(HOST_ENV, DEFAULT_HOST);
        let port = env.parsed(PORT_ENV, DEFAULT_PORT)?;
        let bind_addr: SocketAddr =
            format!("{host}:{port}")
                .parse()
                .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                    name: HOST_ENV,
                    reason: e.to_string(),
                })?;

        let backend_name = env
            .or_default(GARAGE_BACKEND_ENV, "http")
            .to_ascii_lowercase();
        let backend = match backend_name.as_str() {
            "http" => BackendKind::Http {
                admin_url: env.required(GARAGE_ADMIN_URL_ENV)?,
                admin_token: env.required(GARAGE_ADMIN_TOKEN_ENV)?,
            },
            "memory" => BackendKind::Memory,
            other => {
                return Err(ConfigError::Invalid {
                    name: GARAGE_BACKEND_ENV,
                    reason: format!("expected `http` or `memory`, got `{other}`"),
                })
            }
        };

        let development = env
            .optional(APP_ENV_ENV)
            .is_some_and(|v| v.eq_ignore_ascii_case("development"));
        let cookie_secure = match env.optional(COOKIE_SECURE_ENV) {
            Some(value) => parse_bool(COOKIE_SECURE_ENV, &value)?,
            None => !development,
        };

        Ok(Self {
            bind_addr,
            auth_secret: env.required(AUTH_SECRET_ENV)?,
            username: env.required(CONSOLE_USERNAME_ENV)?,
            password: env.required(CONSOLE_PASSWORD_ENV)?,
            backend,
            admin_api_timeout: Duration::from_secs(
                env.parsed(ADMIN_API_TIMEOUT_ENV, DEFAULT_ADMIN_API_TIMEOUT_SECS)?,
            ),
            root_key_cache_ttl: Duration::from_secs(
                env.parsed(ROOT_KEY_CACHE_TTL_ENV, DEFAULT_ROOT_KEY_CACHE_TTL_SECS)?,
            ),
            cookie_secure,
        })
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn optional(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.optional(name).ok_or(ConfigError::Missing(name))
    }

    fn or_default(&self, name: &str, default: &str) -> String {
        self.optional(name).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(name) {
            Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
                name,
                reason: e.to_string(),
            }),
            None => Ok(default),
        }
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            name,
            reason: format!("expected a boolean, got `{other}`"),
        }),
    }
}
