//! Startup configuration
//!
//! Everything the hub needs is resolved once, up front, through a
//! `ParameterResolver`. Resolution failures are returned to the caller
//! rather than aborting the process here.

use async_trait::async_trait;
use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::str::FromStr;

use crate::persistence::PersistenceConfig;

/// Parameter holding the durable store name (SQLite database path)
pub const STORE_NAME_PARAM: &str = "TRADE_STORE_NAME";
/// Parameter holding the downstream topic URL
pub const TOPIC_PARAM: &str = "TRADE_TOPIC_URL";
/// Parameter holding the operational log group (directory)
pub const LOG_GROUP_PARAM: &str = "OPERATIONAL_LOG_GROUP";

pub const SERVER_PORT_PARAM: &str = "SERVER_PORT";
pub const PERSIST_WORKERS_PARAM: &str = "PERSIST_WORKERS";
pub const PERSIST_QUEUE_CAPACITY_PARAM: &str = "PERSIST_QUEUE_CAPACITY";

fn default_server_port() -> u16 {
    8080
}

/// Resolves named deployment parameters
#[async_trait]
pub trait ParameterResolver: Send + Sync {
    async fn resolve(&self, name: &str) -> Result<String, ConfigError>;

    /// Like `resolve`, but a missing parameter is `None`
    async fn resolve_optional(&self, name: &str) -> Result<Option<String>, ConfigError> {
        match self.resolve(name).await {
            Ok(value) => Ok(Some(value)),
            Err(ConfigError::Missing { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing parameter {name}")]
    Missing { name: String },

    #[error("Invalid value for {name} ({value}): {reason}")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Failed to resolve {name}: {message}")]
    Resolver { name: String, message: String },

    #[error("Failed to load {path}: {message}")]
    EnvFile { path: String, message: String },
}

/// Load variables from an env file into the process environment.
///
/// Returns `Ok(false)` when the file does not exist. Call this before the
/// tracing subscriber is built so `RUST_LOG` from the file takes effect.
pub fn load_env_file(path: impl AsRef<Path>) -> Result<bool, ConfigError> {
    let path = path.as_ref();
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ConfigError::EnvFile {
            path: path.display().to_string(),
            message: e.to_string(),
        }),
    }
}

/// Resolves parameters from environment variables
///
/// Variables from `.env.local` are loaded first when the file exists.
#[derive(Debug, Default)]
pub struct EnvParameterResolver;

impl EnvParameterResolver {
    /// Reads the live process environment; see [`load_env_file`]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ParameterResolver for EnvParameterResolver {
    async fn resolve(&self, name: &str) -> Result<String, ConfigError> {
        match env::var(name) {
            Ok(value) if !value.trim().is_empty() => Ok(value),
            Ok(_) | Err(env::VarError::NotPresent) => Err(ConfigError::Missing {
                name: name.to_string(),
            }),
            Err(e) => Err(ConfigError::Resolver {
                name: name.to_string(),
                message: e.to_string(),
            }),
        }
    }
}

/// Resolves parameters from a fixed map
#[derive(Debug, Clone, Default)]
pub struct StaticParameterResolver {
    values: HashMap<String, String>,
}

impl StaticParameterResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

#[async_trait]
impl ParameterResolver for StaticParameterResolver {
    async fn resolve(&self, name: &str) -> Result<String, ConfigError> {
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::Missing {
                name: name.to_string(),
            })
    }
}

/// Fully resolved hub configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    /// Durable store name (SQLite database path)
    pub store_name: String,
    /// Downstream topic URL
    pub topic: String,
    /// Operational log group directory
    pub log_group: String,
    pub server_port: u16,
    pub persistence: PersistenceConfig,
}

impl HubConfig {
    /// Resolve every parameter the hub needs
    ///
    /// Infrastructure identifiers are required; process settings fall back
    /// to defaults when absent but must parse when present.
    pub async fn resolve(resolver: &dyn ParameterResolver) -> Result<Self, ConfigError> {
        let store_name = resolver.resolve(STORE_NAME_PARAM).await?;
        let topic = resolver.resolve(TOPIC_PARAM).await?;
        let log_group = resolver.resolve(LOG_GROUP_PARAM).await?;

        let defaults = PersistenceConfig::default();
        let server_port = parse_setting(resolver, SERVER_PORT_PARAM, default_server_port()).await?;
        let workers = parse_setting(resolver, PERSIST_WORKERS_PARAM, defaults.workers).await?;
        let queue_capacity =
            parse_setting(resolver, PERSIST_QUEUE_CAPACITY_PARAM, defaults.queue_capacity).await?;

        if workers == 0 {
            return Err(invalid(PERSIST_WORKERS_PARAM, "0", "must be at least 1"));
        }
        if queue_capacity == 0 {
            return Err(invalid(PERSIST_QUEUE_CAPACITY_PARAM, "0", "must be at least 1"));
        }

        Ok(Self {
            store_name,
            topic,
            log_group,
            server_port,
            persistence: PersistenceConfig {
                workers,
                queue_capacity,
            },
        })
    }
}

async fn parse_setting<T>(
    resolver: &dyn ParameterResolver,
    name: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match resolver.resolve_optional(name).await? {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(name, &raw, &e.to_string())),
        None => Ok(default),
    }
}

fn invalid(name: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
