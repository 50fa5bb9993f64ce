// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The registry state object.
//!
//! [`Registry`] owns the store, the liveness monitor, the integrity engine
//! and the role translators, and is the single dispatch path between them.
//! Every inbound request is handled to completion before the next one; the
//! owner serializes access (the server keeps it behind one lock).

use crate::clock::{Clock, SystemClock};
use crate::config::RegistryConfig;
use crate::integrity::{IntegrityEngine, IntegrityEvent};
use crate::liveness::LivenessMonitor;
use crate::model::{ApiVersion, ResourceType, Role, VersionStamp};
use crate::node::LocalNode;
use crate::protocol::{
    ApiRequest, ApiResponse, HeartbeatAction, HeartbeatRequest, NodeApi, QueryApi, RegistrationApi,
    StoreOutcome, StoreRequest, StoreSuccess, Translation, Translator,
};
use crate::store::{Created, Deleted, ResourceStore};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Capacity of the event broadcast channel.
const EVENT_CAPACITY: usize = 1024;

/// Observable registry changes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegistryEvent {
    Created {
        resource_type: ResourceType,
        id: String,
        version: VersionStamp,
        api_version: ApiVersion,
    },
    Updated {
        resource_type: ResourceType,
        id: String,
        version: VersionStamp,
        api_version: ApiVersion,
    },
    Deleted {
        resource_type: ResourceType,
        id: String,
        version: VersionStamp,
    },
    /// A node missed its heartbeats and is being garbage collected.
    Evicted { node_id: String },
    Integrity(IntegrityEvent),
}

/// Outcome of one liveness sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Evicted node ids, sorted.
    pub evicted: Vec<String>,
    /// Resources garbage collected with them, nodes included.
    pub removed: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.evicted.is_empty()
    }
}

/// One registry instance: state plus the translators serving it.
#[derive(Debug)]
pub struct Registry {
    config: RegistryConfig,
    clock: Arc<dyn Clock>,
    store: ResourceStore,
    liveness: LivenessMonitor,
    integrity: IntegrityEngine,
    registration: RegistrationApi,
    query: QueryApi,
    node: Option<NodeApi>,
    events: broadcast::Sender<RegistryEvent>,
}

impl Registry {
    pub fn new(config: RegistryConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: RegistryConfig, clock: Arc<dyn Clock>) -> Self {
        let max = config.max_api_version;
        let node = config
            .node
            .as_ref()
            .map(|node| NodeApi::new(max, LocalNode::new(node, max, Arc::clone(&clock))));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            store: ResourceStore::new(config.store.clone()),
            liveness: LivenessMonitor::new(&config.liveness),
            integrity: IntegrityEngine::new(config.integrity.clone()),
            registration: RegistrationApi::new(max),
            query: QueryApi::new(max),
            node,
            events,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn store(&self) -> &ResourceStore {
        &self.store
    }

    pub fn liveness(&self) -> &LivenessMonitor {
        &self.liveness
    }

    pub fn integrity(&self) -> &IntegrityEngine {
        &self.integrity
    }

    pub fn local_node(&self) -> Option<&LocalNode> {
        self.node.as_ref().map(NodeApi::local)
    }

    pub fn local_node_mut(&mut self) -> Option<&mut LocalNode> {
        self.node.as_mut().map(NodeApi::local_mut)
    }

    /// Roles served by this instance.
    pub fn roles(&self) -> Vec<Role> {
        let mut roles = vec![Role::Registration, Role::Query];
        if self.node.is_some() {
            roles.push(Role::Node);
        }
        roles
    }

    /// Subscribe to registry events.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    fn translator(&self, role: Role) -> Option<&dyn Translator> {
        match role {
            Role::Registration => Some(&self.registration as &dyn Translator),
            Role::Query => Some(&self.query as &dyn Translator),
            Role::Node => self.node.as_ref().map(|n| n as &dyn Translator),
        }
    }

    /// Handle one API request to completion.
    pub fn handle(&mut self, request: &ApiRequest) -> ApiResponse {
        let debug = || request.path.clone();
        let Some(route) = request.route.as_ref() else {
            return ApiResponse::error(404, "Path is not a registry resource.", debug());
        };
        let Some(api) = route.api.as_deref() else {
            return if request.is_get() {
                let roles: Vec<String> = self.roles().iter().map(|r| format!("{}/", r)).collect();
                ApiResponse::listing(roles.as_slice())
            } else {
                ApiResponse::error(
                    400,
                    format!("Received {} request with no API specified in the path.", request.method),
                    debug(),
                )
            };
        };

        let Some((role, translation)) = Role::from_name(api)
            .and_then(|role| self.translator(role).map(|t| (role, t.translate(request))))
        else {
            return ApiResponse::error(404, format!("API '{}' is not served here.", api), debug());
        };

        match translation {
            Translation::Respond(response) => response,
            Translation::Heartbeat(heartbeat) => self.heartbeat(request, heartbeat),
            Translation::Store(operation) => {
                let outcome = self.execute(operation);
                match self.translator(role) {
                    Some(t) => t.complete(request, outcome),
                    None => ApiResponse::error(500, "Translator disappeared.", debug()),
                }
            }
        }
    }

    /// Run one store operation and apply its side effects: liveness
    /// tracking, integrity checks and events.
    pub fn execute(&mut self, operation: StoreRequest) -> StoreOutcome {
        let now = self.clock.now();
        let outcome = match operation {
            StoreRequest::Create(request) => self.store.create(request, now).map(|created| {
                self.after_create(&created);
                StoreSuccess::Created(created)
            }),
            StoreRequest::Read { resource_type, id } => {
                self.store.read(resource_type, &id).map(StoreSuccess::Read)
            }
            StoreRequest::Delete {
                resource_type,
                id,
                api_version,
            } => self
                .store
                .delete(resource_type, &id, api_version, now)
                .map(|deleted| {
                    self.after_delete(&deleted);
                    StoreSuccess::Deleted(deleted)
                }),
            StoreRequest::Query {
                resource_type,
                params,
            } => self.store.query(resource_type, &params).map(StoreSuccess::Page),
            StoreRequest::GarbageCollect { node_id } => {
                let removed = self.store.garbage_collect(&node_id, now);
                for deleted in &removed {
                    self.after_delete(deleted);
                }
                tracing::info!(node_id = %node_id, removed = removed.len(), "garbage collected node");
                Ok(StoreSuccess::Collected(removed))
            }
        };
        if let Err(err) = &outcome {
            tracing::debug!(error = %err, "store request failed");
        }
        outcome
    }

    fn after_create(&mut self, created: &Created) {
        let resource_type = created.key.resource_type;
        let id = created.key.id.clone();
        tracing::info!(
            resource = %resource_type,
            id = %id,
            version = %created.key.version,
            update = created.update,
            "resource registered"
        );

        if resource_type == ResourceType::Node {
            self.liveness.track(&id, self.clock.now_secs());
        }
        let checks = self
            .integrity
            .on_created(&self.store, resource_type, &created.payload);

        let version = created.key.version;
        let api_version = created.pointer.api_version;
        self.publish(if created.update {
            RegistryEvent::Updated {
                resource_type,
                id,
                version,
                api_version,
            }
        } else {
            RegistryEvent::Created {
                resource_type,
                id,
                version,
                api_version,
            }
        });
        for check in checks {
            self.publish(RegistryEvent::Integrity(check));
        }
    }

    fn after_delete(&mut self, deleted: &Deleted) {
        let resource_type = deleted.key.resource_type;
        let id = &deleted.key.id;
        tracing::info!(resource = %resource_type, id = %id, "resource deleted");

        if resource_type == ResourceType::Node {
            self.liveness.untrack(id);
        }
        let checks = self.integrity.on_deleted(&self.store, resource_type, id);

        self.publish(RegistryEvent::Deleted {
            resource_type,
            id: id.clone(),
            version: deleted.key.version,
        });
        for check in checks {
            self.publish(RegistryEvent::Integrity(check));
        }
    }

    fn heartbeat(&mut self, request: &ApiRequest, heartbeat: HeartbeatRequest) -> ApiResponse {
        let node_id = &heartbeat.node_id;
        let seen = match heartbeat.action {
            HeartbeatAction::Renew => self.liveness.renew(node_id, self.clock.now_secs()),
            HeartbeatAction::Inspect => self.liveness.last_seen(node_id),
        };
        match (seen, heartbeat.action) {
            (Some(secs), _) => ApiResponse::ok(json!({ "health": secs.to_string() })),
            (None, HeartbeatAction::Renew) => ApiResponse::error(
                404,
                format!("On heartbeat, node with ID {} is not known in this registry.", node_id),
                request.path.clone(),
            ),
            (None, HeartbeatAction::Inspect) => ApiResponse::error(
                404,
                format!(
                    "This registration service is not maintaining a heartbeat record for node {}.",
                    node_id
                ),
                request.path.clone(),
            ),
        }
    }

    /// Evict every node whose heartbeat lapsed and garbage collect what it
    /// owns.
    pub fn sweep(&mut self) -> SweepReport {
        let evicted = self.liveness.sweep(self.clock.now_secs());
        let mut removed = 0;
        for node_id in &evicted {
            self.publish(RegistryEvent::Evicted {
                node_id: node_id.clone(),
            });
            let outcome = self.execute(StoreRequest::GarbageCollect {
                node_id: node_id.clone(),
            });
            if let Ok(StoreSuccess::Collected(gone)) = outcome {
                removed += gone.len();
            }
        }
        SweepReport { evicted, removed }
    }

    fn publish(&self, event: RegistryEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Drop all registry state.
    pub fn clear(&mut self) {
        self.store.clear();
        self.liveness.clear();
        self.integrity.clear();
        if let Some(local) = self.local_node_mut() {
            local.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::NodeConfig;
    use crate::protocol::Method;
    use serde_json::Value;

    const NODE: &str = "3b8be755-08ff-452b-b217-c9151eb21193";

    fn registry() -> (Registry, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000));
        (Registry::with_clock(RegistryConfig::default(), clock.clone()), clock)
    }

    fn register_node(registry: &mut Registry, id: &str) -> ApiResponse {
        let body = json!({ "type": "node", "data": { "id": id, "version": "1:0", "label": "n" } });
        registry.handle(&ApiRequest::post("/x-nmos/registration/v1.2/resource", body))
    }

    #[test]
    fn test_role_listing_and_unknown_api() {
        let (mut r, _) = registry();
        let resp = r.handle(&ApiRequest::get("/x-nmos/"));
        assert_eq!(resp.body, Some(json!(["registration/", "query/"])));

        let resp = r.handle(&ApiRequest::new(Method::Post, "/x-nmos"));
        assert_eq!(resp.status, 400);

        assert_eq!(r.handle(&ApiRequest::get("/x-nmos/node/v1.2/self")).status, 404);
        assert_eq!(r.handle(&ApiRequest::get("/x-nmos/connection/v1.0/")).status, 404);
        assert_eq!(r.handle(&ApiRequest::get("/elsewhere")).status, 404);
    }

    #[test]
    fn test_register_then_query() {
        let (mut r, _) = registry();
        let resp = register_node(&mut r, NODE);
        assert_eq!(resp.status, 201);
        assert_eq!(
            resp.header("Location"),
            Some(format!("/x-nmos/registration/v1.2/resource/nodes/{}", NODE).as_str())
        );
        assert!(r.liveness().is_tracked(NODE));

        let resp = r.handle(&ApiRequest::get(format!("/x-nmos/query/v1.2/nodes/{}", NODE)));
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body.unwrap()["label"], "n");

        let resp = r.handle(&ApiRequest::get("/x-nmos/query/v1.2/nodes"));
        assert_eq!(resp.body.as_ref().and_then(Value::as_array).map(Vec::len), Some(1));
    }

    #[test]
    fn test_events_published() {
        let (mut r, _) = registry();
        let mut events = r.subscribe();
        register_node(&mut r, NODE);
        match events.try_recv().unwrap() {
            RegistryEvent::Created { resource_type, id, .. } => {
                assert_eq!(resource_type, ResourceType::Node);
                assert_eq!(id, NODE);
            }
            other => panic!("unexpected {:?}", other),
        }

        let device = json!({ "type": "device", "data": {
            "id": "00000000-0000-4000-8000-000000000002",
            "version": "1:0",
            "node_id": "00000000-0000-4000-8000-0000000000ff",
        }});
        r.handle(&ApiRequest::post("/x-nmos/registration/v1.2/resource", device));
        assert!(matches!(events.try_recv().unwrap(), RegistryEvent::Created { .. }));
        match events.try_recv().unwrap() {
            RegistryEvent::Integrity(check) => assert_eq!(check.property, "device.node_id"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_sweep_collects_node() {
        let (mut r, clock) = registry();
        register_node(&mut r, NODE);
        clock.set_secs(1_000 + 12 + 1);
        let report = r.sweep();
        assert_eq!(report.evicted, vec![NODE.to_string()]);
        assert_eq!(report.removed, 1);
        assert!(!r.liveness().is_tracked(NODE));
        assert!(r.sweep().is_empty());

        let resp = r.handle(&ApiRequest::get(format!("/x-nmos/query/v1.2/nodes/{}", NODE)));
        assert_eq!(resp.status, 404);
        assert!(resp.body.unwrap()["error"].as_str().unwrap().contains("deleted"));
    }

    #[test]
    fn test_delete_stops_tracking() {
        let (mut r, _) = registry();
        register_node(&mut r, NODE);
        let path = format!("/x-nmos/registration/v1.2/resource/nodes/{}", NODE);
        let resp = r.handle(&ApiRequest::delete(path.clone()));
        assert_eq!(resp.status, 204);
        assert!(resp.body.is_none());
        assert!(!r.liveness().is_tracked(NODE));
        assert_eq!(r.handle(&ApiRequest::delete(path)).status, 404);
    }

    #[test]
    fn test_node_role_enabled() {
        let config = RegistryConfig {
            node: Some(NodeConfig {
                devices: 1,
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut r = Registry::with_clock(config, Arc::new(ManualClock::new(5)));
        assert_eq!(r.roles(), vec![Role::Registration, Role::Query, Role::Node]);
        let resp = r.handle(&ApiRequest::get("/x-nmos/node/v1.2/self"));
        assert_eq!(resp.status, 200);
        let id = r.local_node().unwrap().id().to_string();
        assert_eq!(resp.body.unwrap()["id"], id);
    }

    #[test]
    fn test_clear() {
        let (mut r, _) = registry();
        register_node(&mut r, NODE);
        r.clear();
        assert!(r.liveness().is_empty());
        assert_eq!(r.store().live_count(ResourceType::Node), 0);
    }
}
