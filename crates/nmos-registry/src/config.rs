// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Registry engine configuration.

use crate::model::{is_valid_uuid, ApiVersion};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default number of items returned by a paged query.
pub const DEFAULT_PAGING_LIMIT: usize = 10;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Highest API version served; lower versions are always served.
    #[serde(default)]
    pub max_api_version: ApiVersion,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub liveness: LivenessConfig,

    #[serde(default)]
    pub integrity: IntegrityConfig,

    /// Enables the Node API when present.
    #[serde(default)]
    pub node: Option<NodeConfig>,
}

/// Resource store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Reject creations not newer than the live latest version of the same id.
    #[serde(default)]
    pub ascending: bool,

    /// `paging.limit` applied when a query does not give one.
    #[serde(default = "default_paging_limit")]
    pub paging_limit: usize,
}

fn default_paging_limit() -> usize {
    DEFAULT_PAGING_LIMIT
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            ascending: false,
            paging_limit: default_paging_limit(),
        }
    }
}

/// Heartbeat timeout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessConfig {
    /// Seconds without a heartbeat before a node is garbage collected.
    #[serde(default = "default_gc_interval")]
    pub gc_interval_secs: u64,

    /// Seconds between liveness sweeps.
    #[serde(default = "default_check_rate")]
    pub check_rate_secs: u64,
}

fn default_gc_interval() -> u64 {
    12
}

fn default_check_rate() -> u64 {
    1
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            gc_interval_secs: default_gc_interval(),
            check_rate_secs: default_check_rate(),
        }
    }
}

impl LivenessConfig {
    pub fn check_rate(&self) -> Duration {
        Duration::from_secs(self.check_rate_secs)
    }
}

/// Referential integrity settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrityConfig {
    /// Emit success events as well as failures.
    #[serde(default)]
    pub diagnostics: bool,

    /// Re-validate dependents when a referenced resource is deleted.
    #[serde(default)]
    pub recheck_on_delete: bool,
}

/// Locally hosted node served by the Node API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node id; generated when absent.
    #[serde(default)]
    pub self_id: Option<String>,

    #[serde(default)]
    pub hostname: Option<String>,

    #[serde(default)]
    pub label: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Base URL advertised in the node's `href`.
    #[serde(default = "default_node_href")]
    pub href: String,

    #[serde(default)]
    pub devices: usize,

    #[serde(default)]
    pub sources: usize,

    #[serde(default)]
    pub flows: usize,

    #[serde(default)]
    pub senders: usize,

    #[serde(default)]
    pub receivers: usize,
}

fn default_node_href() -> String {
    "http://127.0.0.1:3000/".to_string()
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            self_id: None,
            hostname: None,
            label: None,
            description: None,
            href: default_node_href(),
            devices: 0,
            sources: 0,
            flows: 0,
            senders: 0,
            receivers: 0,
        }
    }
}

impl RegistryConfig {
    /// Check value ranges; reports the first problem.
    pub fn validate(&self) -> Result<(), RegistryConfigError> {
        if self.store.paging_limit == 0 {
            return Err(RegistryConfigError::Zero("store.paging_limit"));
        }
        if self.liveness.gc_interval_secs == 0 {
            return Err(RegistryConfigError::Zero("liveness.gc_interval_secs"));
        }
        if self.liveness.check_rate_secs == 0 {
            return Err(RegistryConfigError::Zero("liveness.check_rate_secs"));
        }
        if let Some(node) = &self.node {
            if let Some(id) = &node.self_id {
                if !is_valid_uuid(id) {
                    return Err(RegistryConfigError::SelfId(id.clone()));
                }
            }
            let needs_device = node.sources + node.flows + node.senders + node.receivers > 0;
            if needs_device && node.devices == 0 {
                return Err(RegistryConfigError::Missing {
                    child: "node resources other than devices",
                    parent: "device",
                });
            }
            if node.flows > 0 && node.sources == 0 {
                return Err(RegistryConfigError::Missing {
                    child: "node.flows",
                    parent: "source",
                });
            }
        }
        Ok(())
    }
}

/// Engine configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryConfigError {
    #[error("{0} cannot be 0")]
    Zero(&'static str),

    #[error("node.self_id '{0}' is not a v4 UUID")]
    SelfId(String),

    #[error("{child} need at least one {parent}")]
    Missing {
        child: &'static str,
        parent: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config: RegistryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.max_api_version, ApiVersion::V1_2);
        assert_eq!(config.store.paging_limit, DEFAULT_PAGING_LIMIT);
        assert!(!config.store.ascending);
        assert_eq!(config.liveness.gc_interval_secs, 12);
        assert!(config.node.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_limit() {
        let mut config = RegistryConfig::default();
        config.store.paging_limit = 0;
        assert_eq!(
            config.validate(),
            Err(RegistryConfigError::Zero("store.paging_limit"))
        );
    }

    #[test]
    fn test_validation_rejects_bad_self_id() {
        let config = RegistryConfig {
            node: Some(NodeConfig {
                self_id: Some("node-1".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "node.self_id 'node-1' is not a v4 UUID");
    }

    #[test]
    fn test_validation_rejects_orphan_children() {
        let config = RegistryConfig {
            node: Some(NodeConfig {
                senders: 2,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(RegistryConfigError::Missing { parent: "device", .. })
        ));

        let config = RegistryConfig {
            node: Some(NodeConfig {
                devices: 1,
                sources: 1,
                flows: 2,
                senders: 2,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
