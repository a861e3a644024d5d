// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Serve configuration and build identity
//!
//! Constructed once before any component runs and handed to each component
//! explicitly.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Schema version this binary understands.
pub const EXPECTED_SCHEMA_VERSION: &str = "0.1";

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("admin host {0:?} is not a valid IP address")]
    InvalidAdminHost(String),

    #[error("admin host {0} is not a loopback address")]
    AdminHostNotLoopback(IpAddr),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Configuration for a `serve` run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServeConfig {
    /// Directory holding the datastore file (default: working directory)
    #[serde(default = "crate::store::default_store_dir")]
    pub store_dir: PathBuf,

    /// Public HTTP port, bound on all interfaces (default: 8080)
    #[serde(default = "default_public_port")]
    pub public_port: u16,

    /// Admin HTTP port, bound on `admin_host` only (default: 8383)
    #[serde(default = "default_admin_port")]
    pub admin_port: u16,

    /// Admin bind host; must be a loopback IP (default: 127.0.0.1)
    #[serde(default = "default_admin_host")]
    pub admin_host: String,

    /// Directory for static public assets (default: public)
    #[serde(default = "default_public_dir")]
    pub public_dir: PathBuf,

    /// Grace window for in-flight requests at shutdown (default: 15s)
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: Duration,

    /// Self-triggered shutdown after this long (testing)
    #[serde(default)]
    pub exit_after: Option<Duration>,

    /// Delay between acknowledging `/admin/shutdown` and acting on it
    #[serde(default = "default_flush_delay")]
    pub shutdown_flush_delay: Duration,
}

fn default_public_port() -> u16 {
    8080
}

fn default_admin_port() -> u16 {
    8383
}

fn default_admin_host() -> String {
    "127.0.0.1".to_string()
}

fn default_public_dir() -> PathBuf {
    PathBuf::from("public")
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_flush_delay() -> Duration {
    Duration::from_millis(200)
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            store_dir: crate::store::default_store_dir(),
            public_port: default_public_port(),
            admin_port: default_admin_port(),
            admin_host: default_admin_host(),
            public_dir: default_public_dir(),
            shutdown_timeout: default_shutdown_timeout(),
            exit_after: None,
            shutdown_flush_delay: default_flush_delay(),
        }
    }
}

impl ServeConfig {
    /// Validate configuration.
    ///
    /// Runs before the datastore is opened, so a rejected config leaves
    /// nothing to clean up.
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_loopback(&self.admin_host)?;
        if self.shutdown_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "shutdown_timeout cannot be 0".into(),
            ));
        }
        if matches!(self.exit_after, Some(d) if d.is_zero()) {
            return Err(ConfigError::InvalidValue("exit_after cannot be 0".into()));
        }
        Ok(())
    }
}

/// Parse `host` as an IP address and require it to be loopback.
pub fn parse_loopback(host: &str) -> Result<IpAddr, ConfigError> {
    let ip: IpAddr = host
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidAdminHost(host.to_string()))?;
    if !ip.is_loopback() {
        return Err(ConfigError::AdminHostNotLoopback(ip));
    }
    Ok(ip)
}

/// Parse a duration such as `500ms`, `15s`, `2m`, `1h` or bare seconds.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration {:?}", input))?;

    match unit {
        "" | "s" => Ok(Duration::from_secs(value)),
        "ms" => Ok(Duration::from_millis(value)),
        "m" => Ok(Duration::from_secs(value.saturating_mul(60))),
        "h" => Ok(Duration::from_secs(value.saturating_mul(3600))),
        other => Err(format!("unknown duration unit {:?} in {:?}", other, input)),
    }
}

/// Identity of the running build, reported by `/version` and `/admin/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub version: String,
    pub schema_version: String,
    pub runtime_version: String,
    pub build_date: String,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            schema_version: EXPECTED_SCHEMA_VERSION.to_string(),
            runtime_version: env!("GOOB_RUSTC_VERSION").to_string(),
            build_date: option_env!("GOOB_BUILD_DATE").unwrap_or("").to_string(),
        }
    }
}
