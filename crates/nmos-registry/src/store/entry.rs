// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Store keys and latest pointers.

use crate::model::{ApiVersion, ResourceType, VersionStamp};
use std::fmt;

/// Address of one stored payload: `(type, id, version)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreKey {
    pub resource_type: ResourceType,
    pub id: String,
    pub version: VersionStamp,
}

impl StoreKey {
    pub fn new(resource_type: ResourceType, id: impl Into<String>, version: VersionStamp) -> Self {
        Self {
            resource_type,
            id: id.into(),
            version,
        }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.resource_type.plural(), self.id, self.version)
    }
}

/// Key of a latest pointer: `(type, id)`.
pub(crate) type LatestKey = (ResourceType, String);

/// Wall-clock time of a store mutation.
///
/// The sequence number breaks ties between mutations that share a clock
/// reading, so pagination order is stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    pub time: VersionStamp,
    pub seq: u64,
}

/// Whether a latest pointer names a live version or a tombstone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerState {
    Live,
    Tombstone,
}

/// Per-id record of the current (or deleted) version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestPointer {
    pub state: PointerState,
    /// Current version, or the version the id was deleted at.
    pub version: VersionStamp,
    /// API version of the last write.
    pub api_version: ApiVersion,
    pub created: Timestamp,
    pub updated: Timestamp,
}

impl LatestPointer {
    pub fn is_live(&self) -> bool {
        self.state == PointerState::Live
    }

    pub fn is_tombstone(&self) -> bool {
        self.state == PointerState::Tombstone
    }
}
