//! Configuration Module
//!
//! Loads each program's configuration from environment variables. Required
//! variables have no defaults: a missing or malformed value stops the program
//! at startup.

use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::services::DEFAULT_TTL_SECS;
use crate::store::pool::DEFAULT_POOL_SIZE;
use crate::store::PoolOptions;

// == Variable Names ==
pub const REDIS_ADDR: &str = "REDIS_ADDR";
pub const BIND_ADDR: &str = "BIND_ADDR";
pub const REDIS_QUEUE: &str = "REDIS_QUEUE";
pub const CHANNEL_NAME: &str = "CHANNEL_NAME";
pub const USER_ID: &str = "USER_ID";
pub const POOL_SIZE: &str = "POOL_SIZE";
pub const POOL_ACQUIRE_TIMEOUT_MS: &str = "POOL_ACQUIRE_TIMEOUT_MS";
pub const CACHE_TTL_SECS: &str = "CACHE_TTL_SECS";
pub const RECEIVE_TIMEOUT_MS: &str = "RECEIVE_TIMEOUT_MS";
pub const SHUTDOWN_TIMEOUT_SECS: &str = "SHUTDOWN_TIMEOUT_SECS";

const DEFAULT_RECEIVE_TIMEOUT_MS: u64 = 1000;
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 5;

// == Config Error ==
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Reads variables through a lookup function so tests need not touch the
/// process environment.
struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        match (self.lookup)(name) {
            Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
            _ => Err(ConfigError::Missing(name)),
        }
    }

    fn parsed<T>(&self, name: &'static str, raw: String) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            value: raw.clone(),
            reason: e.to_string(),
        })
    }

    fn optional<T>(&self, name: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match (self.lookup)(name) {
            Some(value) if !value.trim().is_empty() => {
                self.parsed(name, value.trim().to_string()).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn positive(&self, name: &'static str, default: u64) -> Result<u64, ConfigError> {
        let value = self.optional(name)?.unwrap_or(default);
        if value == 0 {
            return Err(ConfigError::Invalid {
                name,
                value: value.to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(value)
    }

    /// Accepts `host:port` and the Go-style `:port` shorthand.
    fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = self.required(BIND_ADDR)?;
        let full = if raw.starts_with(':') {
            format!("0.0.0.0{}", raw)
        } else {
            raw
        };
        self.parsed(BIND_ADDR, full)
    }

    fn store(&self) -> Result<StoreConfig, ConfigError> {
        let address = self.required(REDIS_ADDR)?;
        let size = self.positive(POOL_SIZE, DEFAULT_POOL_SIZE as u64)? as usize;
        let acquire_timeout = self
            .optional::<u64>(POOL_ACQUIRE_TIMEOUT_MS)?
            .map(Duration::from_millis);
        Ok(StoreConfig {
            address,
            pool: PoolOptions {
                size,
                acquire_timeout,
            },
        })
    }

    fn shutdown_timeout(&self) -> Result<Duration, ConfigError> {
        self.positive(SHUTDOWN_TIMEOUT_SECS, DEFAULT_SHUTDOWN_TIMEOUT_SECS)
            .map(Duration::from_secs)
    }
}

fn process_env(name: &str) -> Option<String> {
    env::var(name).ok()
}

// == Store Config ==
/// Where the store lives and how many pooled connections to keep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// `host:port` or a `redis://` URL
    pub address: String,
    pub pool: PoolOptions,
}

// == Cache Server Config ==
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheServerConfig {
    pub store: StoreConfig,
    pub bind_addr: SocketAddr,
    /// Expiry applied to values set over HTTP
    pub default_ttl: u64,
    pub shutdown_timeout: Duration,
}

impl CacheServerConfig {
    /// # Environment Variables
    /// - `REDIS_ADDR` (required)
    /// - `BIND_ADDR` (required)
    /// - `POOL_SIZE` (default: 10), `POOL_ACQUIRE_TIMEOUT_MS` (default: wait forever)
    /// - `CACHE_TTL_SECS` (default: 666)
    /// - `SHUTDOWN_TIMEOUT_SECS` (default: 5)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(process_env)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };
        Ok(Self {
            store: vars.store()?,
            bind_addr: vars.bind_addr()?,
            default_ttl: vars.positive(CACHE_TTL_SECS, DEFAULT_TTL_SECS)?,
            shutdown_timeout: vars.shutdown_timeout()?,
        })
    }
}

// == Queue Server Config ==
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueServerConfig {
    pub store: StoreConfig,
    pub bind_addr: SocketAddr,
    /// Name of the store list backing the queue
    pub queue_name: String,
    pub shutdown_timeout: Duration,
}

impl QueueServerConfig {
    /// # Environment Variables
    /// - `REDIS_ADDR`, `BIND_ADDR`, `REDIS_QUEUE` (required)
    /// - `POOL_SIZE`, `POOL_ACQUIRE_TIMEOUT_MS`, `SHUTDOWN_TIMEOUT_SECS` (optional)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(process_env)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };
        Ok(Self {
            store: vars.store()?,
            bind_addr: vars.bind_addr()?,
            queue_name: vars.required(REDIS_QUEUE)?,
            shutdown_timeout: vars.shutdown_timeout()?,
        })
    }
}

// == Messenger Config ==
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessengerConfig {
    pub store_address: String,
    pub channel: String,
    pub user_id: String,
    pub receive_timeout: Duration,
    pub shutdown_timeout: Duration,
}

impl MessengerConfig {
    /// # Environment Variables
    /// - `REDIS_ADDR`, `CHANNEL_NAME`, `USER_ID` (required)
    /// - `RECEIVE_TIMEOUT_MS` (default: 1000), `SHUTDOWN_TIMEOUT_SECS` (default: 5)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(process_env)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };
        Ok(Self {
            store_address: vars.required(REDIS_ADDR)?,
            channel: vars.required(CHANNEL_NAME)?,
            user_id: vars.required(USER_ID)?,
            receive_timeout: Duration::from_millis(
                vars.positive(RECEIVE_TIMEOUT_MS, DEFAULT_RECEIVE_TIMEOUT_MS)?,
            ),
            shutdown_timeout: vars.shutdown_timeout()?,
        })
    }
}
