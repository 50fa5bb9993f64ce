// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Versioned, tombstone-aware resource store.
//!
//! Payloads are written once under `(type, id, version)` and never
//! overwritten. A latest pointer per `(type, id)` names the current version;
//! deleting an id turns its pointer into a tombstone that remembers the
//! deleted version, so a later create of the same version can be told apart
//! from a create of an id that never existed.

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::model::{ApiVersion, ResourceType, VersionStamp};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

pub mod entry;
pub mod query;

pub use entry::{LatestPointer, PointerState, StoreKey, Timestamp};
pub use query::{BasicFilter, PagingAnchors, PagingOrder, QueryPage, QueryParams};

use entry::LatestKey;
use query::Candidate;

/// Read-only view used by collaborators that validate references.
pub trait ResourceLookup {
    /// Whether `(resource_type, id)` has a live latest version.
    fn exists(&self, resource_type: ResourceType, id: &str) -> bool;

    /// Payload of the live latest version.
    fn payload(&self, resource_type: ResourceType, id: &str) -> Option<&Value>;
}

/// A creation request: a typed `data` object carrying `id` and `version`.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateRequest {
    pub resource_type: Option<ResourceType>,
    pub api_version: ApiVersion,
    pub data: Option<Value>,
}

impl CreateRequest {
    pub fn new(resource_type: ResourceType, api_version: ApiVersion, data: Value) -> Self {
        Self {
            resource_type: Some(resource_type),
            api_version,
            data: Some(data),
        }
    }
}

/// Result of a successful create.
#[derive(Debug, Clone, PartialEq)]
pub struct Created {
    pub key: StoreKey,
    pub pointer: LatestPointer,
    /// False when the id was not live before this create.
    pub update: bool,
    pub payload: Value,
}

/// Result of a successful read.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadResult {
    pub key: StoreKey,
    pub api_version: ApiVersion,
    pub payload: Value,
}

/// Result of a successful delete: the tombstoned version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deleted {
    pub key: StoreKey,
    pub pointer: LatestPointer,
}

/// In-memory resource store.
#[derive(Debug)]
pub struct ResourceStore {
    config: StoreConfig,
    entries: HashMap<StoreKey, Value>,
    latest: HashMap<LatestKey, LatestPointer>,
    seq: u64,
}

impl ResourceStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            latest: HashMap::new(),
            seq: 0,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn stamp(&mut self, now: VersionStamp) -> Timestamp {
        self.seq += 1;
        Timestamp {
            time: now,
            seq: self.seq,
        }
    }

    /// Store a new version of a resource.
    pub fn create(&mut self, request: CreateRequest, now: VersionStamp) -> Result<Created, StoreError> {
        let resource_type = request.resource_type.ok_or(StoreError::MissingType)?;
        let data = request.data.ok_or(StoreError::MissingData(resource_type))?;
        let missing = |field| StoreError::MissingField {
            resource_type,
            field,
        };
        let id = data
            .get("id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| missing("id"))?
            .to_string();
        let raw_version = data
            .get("version")
            .and_then(Value::as_str)
            .ok_or_else(|| missing("version"))?;
        let version: VersionStamp = raw_version.parse().map_err(|_| StoreError::MalformedVersion {
            resource_type,
            version: raw_version.to_string(),
        })?;

        let latest_key: LatestKey = (resource_type, id.clone());
        let previous = self.latest.get(&latest_key).cloned();

        if self.config.ascending {
            if let Some(existing) = previous.as_ref().filter(|p| p.is_live()) {
                if existing.version >= version {
                    return Err(StoreError::StaleVersion {
                        resource_type,
                        version,
                        existing: existing.version,
                    });
                }
            }
        }

        let key = StoreKey::new(resource_type, id.clone(), version);
        if self.entries.contains_key(&key) {
            let tombstoned = previous.as_ref().map_or(false, LatestPointer::is_tombstone);
            return Err(if tombstoned {
                StoreError::PreviouslyDeleted {
                    resource_type,
                    id,
                    version,
                }
            } else {
                StoreError::Duplicate {
                    resource_type,
                    id,
                    version,
                }
            });
        }

        // A tombstoned id keeps its pointer, so reviving it is an update.
        let updated = self.stamp(now);
        let update = previous.is_some();
        let pointer = LatestPointer {
            state: PointerState::Live,
            version,
            api_version: request.api_version,
            created: previous.map_or(updated, |p| p.created),
            updated,
        };

        self.entries.insert(key.clone(), data.clone());
        self.latest.insert(latest_key, pointer.clone());
        tracing::debug!(key = %key, update, "stored resource");

        Ok(Created {
            key,
            pointer,
            update,
            payload: data,
        })
    }

    /// Latest live version of a resource.
    pub fn read(&self, resource_type: ResourceType, id: &str) -> Result<ReadResult, StoreError> {
        let pointer = self.live_pointer(resource_type, id)?;
        let key = StoreKey::new(resource_type, id, pointer.version);
        // Every live pointer names a stored entry.
        let payload = self
            .entries
            .get(&key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                resource_type,
                id: id.to_string(),
            })?;
        Ok(ReadResult {
            key,
            api_version: pointer.api_version,
            payload,
        })
    }

    /// Tombstone the latest version of a resource.
    pub fn delete(
        &mut self,
        resource_type: ResourceType,
        id: &str,
        api_version: ApiVersion,
        now: VersionStamp,
    ) -> Result<Deleted, StoreError> {
        let pointer = self.live_pointer(resource_type, id)?.clone();
        let updated = self.stamp(now);
        let tombstone = LatestPointer {
            state: PointerState::Tombstone,
            api_version,
            updated,
            ..pointer
        };
        self.latest
            .insert((resource_type, id.to_string()), tombstone.clone());
        let key = StoreKey::new(resource_type, id, tombstone.version);
        tracing::debug!(key = %key, "tombstoned resource");
        Ok(Deleted {
            key,
            pointer: tombstone,
        })
    }

    /// Tombstone a node and every live resource it owns: devices whose
    /// `node_id` is the node, then anything whose `device_id` is one of those
    /// devices. Dependents are removed before what they depend on.
    pub fn garbage_collect(&mut self, node_id: &str, now: VersionStamp) -> Vec<Deleted> {
        let devices: HashSet<String> = self
            .live_matching(ResourceType::Device, "node_id", |v| v == node_id)
            .into_iter()
            .collect();

        let mut doomed: Vec<(ResourceType, String)> = Vec::new();
        for resource_type in ResourceType::ALL.into_iter().rev() {
            match resource_type {
                ResourceType::Node => {
                    if self.exists(ResourceType::Node, node_id) {
                        doomed.push((resource_type, node_id.to_string()));
                    }
                }
                ResourceType::Device => {
                    let mut ids: Vec<String> = devices.iter().cloned().collect();
                    ids.sort();
                    doomed.extend(ids.into_iter().map(|id| (resource_type, id)));
                }
                _ => {
                    let mut ids = self.live_matching(resource_type, "device_id", |v| devices.contains(v));
                    ids.sort();
                    doomed.extend(ids.into_iter().map(|id| (resource_type, id)));
                }
            }
        }

        let api_version = self
            .latest
            .get(&(ResourceType::Node, node_id.to_string()))
            .map(|p| p.api_version)
            .unwrap_or_default();
        doomed
            .into_iter()
            .filter_map(|(t, id)| self.delete(t, &id, api_version, now).ok())
            .collect()
    }

    /// Validate raw query parameters and return one page of live resources.
    pub fn query(&self, resource_type: ResourceType, pairs: &[(String, String)]) -> Result<QueryPage, StoreError> {
        let params = QueryParams::parse(resource_type, pairs)?;
        Ok(self.page(resource_type, &params))
    }

    /// One page of live resources of `resource_type`.
    pub fn page(&self, resource_type: ResourceType, params: &QueryParams) -> QueryPage {
        let candidates: Vec<Candidate> = self
            .latest
            .iter()
            .filter(|((t, _), p)| *t == resource_type && p.is_live())
            .filter_map(|((t, id), p)| {
                let payload = self.entries.get(&StoreKey::new(*t, id.clone(), p.version))?;
                Some(Candidate {
                    version: p.version,
                    created: p.created,
                    updated: p.updated,
                    payload: payload.clone(),
                })
            })
            .collect();
        query::paginate(candidates, params, self.config.paging_limit)
    }

    /// Latest pointer for an id, live or tombstoned.
    pub fn pointer(&self, resource_type: ResourceType, id: &str) -> Option<&LatestPointer> {
        self.latest.get(&(resource_type, id.to_string()))
    }

    /// A stored payload by exact key, including superseded versions.
    pub fn entry(&self, key: &StoreKey) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Number of live resources of a type.
    pub fn live_count(&self, resource_type: ResourceType) -> usize {
        self.latest
            .iter()
            .filter(|((t, _), p)| *t == resource_type && p.is_live())
            .count()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.latest.clear();
    }

    fn live_pointer(&self, resource_type: ResourceType, id: &str) -> Result<&LatestPointer, StoreError> {
        match self.latest.get(&(resource_type, id.to_string())) {
            None => Err(StoreError::NotFound {
                resource_type,
                id: id.to_string(),
            }),
            Some(p) if p.is_tombstone() => Err(StoreError::Deleted {
                resource_type,
                id: id.to_string(),
            }),
            Some(p) => Ok(p),
        }
    }

    /// Ids of live resources whose string `field` satisfies `accept`.
    fn live_matching(&self, resource_type: ResourceType, field: &str, accept: impl Fn(&str) -> bool) -> Vec<String> {
        self.latest
            .iter()
            .filter(|((t, _), p)| *t == resource_type && p.is_live())
            .filter_map(|((t, id), p)| {
                let payload = self.entries.get(&StoreKey::new(*t, id.clone(), p.version))?;
                let value = payload.get(field)?.as_str()?;
                accept(value).then(|| id.clone())
            })
            .collect()
    }
}

impl ResourceLookup for ResourceStore {
    fn exists(&self, resource_type: ResourceType, id: &str) -> bool {
        self.live_pointer(resource_type, id).is_ok()
    }

    fn payload(&self, resource_type: ResourceType, id: &str) -> Option<&Value> {
        let pointer = self.live_pointer(resource_type, id).ok()?;
        self.entries
            .get(&StoreKey::new(resource_type, id, pointer.version))
    }
}
