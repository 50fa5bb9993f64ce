// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Registry data model: resource types, API versions, roles and identifiers.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

pub mod version;

pub use version::{ParseVersionError, VersionStamp};

/// Typed registry record kinds.
///
/// Declaration order is dependency order: a resource may only reference
/// kinds declared before it (flows and sources also reference themselves).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Node,
    Device,
    Source,
    Flow,
    Sender,
    Receiver,
}

impl ResourceType {
    /// All resource types in dependency order.
    pub const ALL: [ResourceType; 6] = [
        ResourceType::Node,
        ResourceType::Device,
        ResourceType::Source,
        ResourceType::Flow,
        ResourceType::Sender,
        ResourceType::Receiver,
    ];

    /// Name used in registration bodies (`"type": "device"`).
    pub fn singular(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Device => "device",
            Self::Source => "source",
            Self::Flow => "flow",
            Self::Sender => "sender",
            Self::Receiver => "receiver",
        }
    }

    /// Name used in URL paths (`/devices/<id>`).
    pub fn plural(self) -> &'static str {
        match self {
            Self::Node => "nodes",
            Self::Device => "devices",
            Self::Source => "sources",
            Self::Flow => "flows",
            Self::Sender => "senders",
            Self::Receiver => "receivers",
        }
    }

    pub fn from_singular(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.singular() == s)
    }

    pub fn from_plural(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.plural() == s)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.plural())
    }
}

/// Supported API versions, ordered by release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ApiVersion {
    #[serde(rename = "v1.0")]
    V1_0,
    #[serde(rename = "v1.1")]
    V1_1,
    #[serde(rename = "v1.2")]
    V1_2,
}

impl ApiVersion {
    pub const ALL: [ApiVersion; 3] = [ApiVersion::V1_0, ApiVersion::V1_1, ApiVersion::V1_2];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::V1_0 => "v1.0",
            Self::V1_1 => "v1.1",
            Self::V1_2 => "v1.2",
        }
    }

    /// Versions up to and including `ceiling`.
    pub fn up_to(ceiling: ApiVersion) -> Vec<ApiVersion> {
        Self::ALL.into_iter().filter(|v| *v <= ceiling).collect()
    }
}

impl Default for ApiVersion {
    fn default() -> Self {
        Self::V1_2
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApiVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| format!("unsupported API version '{}'", s))
    }
}

/// The three sub-APIs exposed over one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Registration,
    Query,
    Node,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::Query => "query",
            Self::Node => "node",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "registration" => Some(Self::Registration),
            "query" => Some(Self::Query),
            "node" => Some(Self::Node),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn uuid_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$",
        )
        .expect("uuid pattern compiles")
    })
}

/// Check that `id` is a version-4 UUID in canonical hyphenated form.
pub fn is_valid_uuid(id: &str) -> bool {
    uuid_pattern().is_match(id)
}

/// Generate a fresh resource identifier.
pub fn new_resource_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_type_names() {
        for t in ResourceType::ALL {
            assert_eq!(ResourceType::from_plural(t.plural()), Some(t));
            assert_eq!(ResourceType::from_singular(t.singular()), Some(t));
        }
        assert_eq!(ResourceType::from_plural("node"), None);
        assert_eq!(ResourceType::from_singular("nodes"), None);
        assert_eq!(ResourceType::Device.to_string(), "devices");
    }

    #[test]
    fn test_api_version_ceiling() {
        assert_eq!(ApiVersion::up_to(ApiVersion::V1_1), vec![ApiVersion::V1_0, ApiVersion::V1_1]);
        assert_eq!(ApiVersion::up_to(ApiVersion::V1_2).len(), 3);
        assert_eq!("v1.1".parse::<ApiVersion>(), Ok(ApiVersion::V1_1));
        assert!("v2.0".parse::<ApiVersion>().is_err());
    }

    #[test]
    fn test_api_version_serde() {
        let json = serde_json::to_string(&ApiVersion::V1_0).unwrap();
        assert_eq!(json, "\"v1.0\"");
    }

    #[test]
    fn test_uuid_validation() {
        assert!(is_valid_uuid("3b8be755-08ff-452b-b217-c9151eb21193"));
        assert!(is_valid_uuid("3B8BE755-08FF-452B-B217-C9151EB21193"));
        // wrong version nibble
        assert!(!is_valid_uuid("3b8be755-08ff-152b-b217-c9151eb21193"));
        // wrong variant nibble
        assert!(!is_valid_uuid("3b8be755-08ff-452b-c217-c9151eb21193"));
        assert!(!is_valid_uuid("3b8be75508ff452bb217c9151eb21193"));
        assert!(!is_valid_uuid("not-a-uuid"));
        assert!(is_valid_uuid(&new_resource_id()));
    }
}
