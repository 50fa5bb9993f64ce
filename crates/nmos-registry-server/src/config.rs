// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Registry server configuration.

use nmos_registry::{ApiVersion, RegistryConfig, RegistryConfigError};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Registry server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 0.0.0.0)
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// HTTP port (default: 3000)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Registry engine settings
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Register the local node with an upstream registry
    #[serde(default)]
    pub registration: Option<RegistrationTarget>,
}

/// Upstream registry the local node announces itself to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationTarget {
    /// Registry base URL, e.g. `http://registry.local:3000`
    pub base_url: String,

    /// Seconds between heartbeats
    #[serde(default = "default_heart_rate")]
    pub heart_rate_secs: u64,

    /// Registration API version to use
    #[serde(default)]
    pub api_version: ApiVersion,
}

fn default_bind_address() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    3000
}

fn default_heart_rate() -> u64 {
    5
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            registry: RegistryConfig::default(),
            registration: None,
        }
    }
}

impl RegistrationTarget {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            heart_rate_secs: default_heart_rate(),
            api_version: ApiVersion::default(),
        }
    }

    /// Heartbeat interval as Duration.
    pub fn heart_rate(&self) -> Duration {
        Duration::from_secs(self.heart_rate_secs)
    }
}

impl ServerConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save configuration to a JSON file.
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Sweep interval as Duration.
    pub fn check_rate(&self) -> Duration {
        self.registry.liveness.check_rate()
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Invalid("port cannot be 0".into()));
        }
        self.registry.validate()?;

        if let Some(target) = &self.registration {
            if self.registry.node.is_none() {
                return Err(ConfigError::Invalid(
                    "registration requires a node section".into(),
                ));
            }
            if !target.base_url.starts_with("http://") && !target.base_url.starts_with("https://") {
                return Err(ConfigError::Invalid(format!(
                    "registration.base_url '{}' is not an http(s) URL",
                    target.base_url
                )));
            }
            if target.heart_rate_secs == 0 {
                return Err(ConfigError::Invalid(
                    "registration.heart_rate_secs cannot be 0".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value: {0}")]
    Invalid(String),

    #[error("Invalid registry section: {0}")]
    Registry(#[from] RegistryConfigError),
}
