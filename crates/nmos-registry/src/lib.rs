// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! NMOS Registry Engine
//!
//! Versioned registry for networked media resources: nodes register their
//! node, devices, sources, flows, senders and receivers, clients query the
//! current state, and nodes that stop sending heartbeats are garbage
//! collected.
//!
//! # Components
//!
//! - **Resource store**: append-only payloads addressed by
//!   `(type, id, version)` with a latest pointer per id that may be a
//!   tombstone; paged queries with `Link`/`X-Paging-*` cursors.
//! - **Protocol translators**: Registration, Query and Node APIs mapping
//!   requests onto store operations and store outcomes onto responses.
//! - **Liveness monitor**: heartbeat tracking and timeout eviction.
//! - **Integrity engine**: advisory cross-resource reference checks with a
//!   reverse index for re-checking dependents on delete.
//!
//! # Quick Start
//!
//! ```
//! use nmos_registry::{ApiRequest, Registry, RegistryConfig};
//! use serde_json::json;
//!
//! let mut registry = Registry::new(RegistryConfig::default());
//! let body = json!({
//!     "type": "node",
//!     "data": { "id": "3b8be755-08ff-452b-b217-c9151eb21193", "version": "1:0" }
//! });
//! let created = registry.handle(&ApiRequest::post("/x-nmos/registration/v1.2/resource", body));
//! assert_eq!(created.status, 201);
//!
//! let listed = registry.handle(&ApiRequest::get("/x-nmos/query/v1.2/nodes"));
//! assert_eq!(listed.status, 200);
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod integrity;
pub mod liveness;
pub mod model;
pub mod node;
pub mod protocol;
pub mod registry;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    IntegrityConfig, LivenessConfig, NodeConfig, RegistryConfig, RegistryConfigError, StoreConfig,
};
pub use error::{ApiError, ErrorKind, StoreError};
pub use integrity::{IntegrityEngine, IntegrityEvent, IntegrityStatus, Referrer, REFERENCE_RULES};
pub use liveness::LivenessMonitor;
pub use model::{is_valid_uuid, new_resource_id, ApiVersion, ResourceType, Role, VersionStamp};
pub use node::{Announcement, LocalNode, LocalResource};
pub use protocol::{ApiRequest, ApiResponse, Method, RequestPath, StoreRequest, StoreSuccess, Translation, Translator};
pub use registry::{Registry, RegistryEvent, SweepReport};
pub use store::{QueryPage, QueryParams, ResourceLookup, ResourceStore, StoreKey};
