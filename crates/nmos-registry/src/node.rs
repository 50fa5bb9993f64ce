// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Locally hosted node: its own resources and registration announcements.
//!
//! A [`LocalNode`] generates `self` plus the configured number of devices,
//! sources, flows, senders and receivers. Every local change issues a new
//! version stamp; [`LocalNode::announcements`] returns everything newer than
//! the last announced version, in dependency order, as Registration API
//! bodies.

use crate::clock::Clock;
use crate::config::NodeConfig;
use crate::model::{new_resource_id, ApiVersion, ResourceType, VersionStamp};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;

/// One resource owned by the local node.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalResource {
    pub resource_type: ResourceType,
    pub id: String,
    pub version: VersionStamp,
    pub payload: Value,
}

/// A creation or update to send to a registry.
#[derive(Debug, Clone, PartialEq)]
pub struct Announcement {
    pub resource_type: ResourceType,
    pub id: String,
    pub version: VersionStamp,
    /// The id was announced before.
    pub update: bool,
    /// `{ "type": "<singular>", "data": {...} }`
    pub body: Value,
}

/// The node served by the Node API.
#[derive(Debug)]
pub struct LocalNode {
    clock: Arc<dyn Clock>,
    self_id: String,
    resources: Vec<LocalResource>,
    last_version: VersionStamp,
    watermark: Option<VersionStamp>,
    announced: HashSet<(ResourceType, String)>,
}

impl LocalNode {
    pub fn new(config: &NodeConfig, max_api_version: ApiVersion, clock: Arc<dyn Clock>) -> Self {
        let self_id = config.self_id.clone().unwrap_or_else(new_resource_id);
        let mut node = Self {
            clock,
            self_id,
            resources: Vec::new(),
            last_version: VersionStamp::ZERO,
            watermark: None,
            announced: HashSet::new(),
        };
        node.populate(config, max_api_version);
        tracing::info!(
            node_id = %node.self_id,
            resources = node.resources.len(),
            "local node created"
        );
        node
    }

    fn populate(&mut self, config: &NodeConfig, max_api_version: ApiVersion) {
        let hostname = config.hostname.clone().unwrap_or_else(|| "localhost".to_string());
        let label = config.label.clone().unwrap_or_else(|| hostname.clone());
        let description = config.description.clone().unwrap_or_else(|| label.clone());
        let versions: Vec<&str> = ApiVersion::up_to(max_api_version)
            .into_iter()
            .map(ApiVersion::as_str)
            .collect();

        let self_id = self.self_id.clone();
        self.push(
            ResourceType::Node,
            self_id.clone(),
            json!({
                "label": label,
                "description": description,
                "tags": {},
                "href": config.href,
                "hostname": hostname,
                "caps": {},
                "api": { "versions": versions, "endpoints": [] },
                "services": [],
                "clocks": [],
                "interfaces": [],
            }),
        );

        let devices: Vec<String> = (1..=config.devices)
            .map(|n| {
                self.push_new(
                    ResourceType::Device,
                    json!({
                        "label": format!("{} device {}", label, n),
                        "description": description,
                        "tags": {},
                        "type": "urn:x-nmos:device:generic",
                        "node_id": self_id,
                        "senders": [],
                        "receivers": [],
                        "controls": [],
                    }),
                )
            })
            .collect();
        let pick = |ids: &[String], n: usize| ids.get(n % ids.len().max(1)).cloned();

        let sources: Vec<(String, Option<String>)> = (0..config.sources)
            .map(|n| {
                let device_id = pick(&devices, n);
                let id = self.push_new(
                    ResourceType::Source,
                    json!({
                        "label": format!("{} source {}", label, n + 1),
                        "description": description,
                        "tags": {},
                        "caps": {},
                        "device_id": device_id,
                        "parents": [],
                        "clock_name": null,
                        "format": "urn:x-nmos:format:video",
                    }),
                );
                (id, device_id)
            })
            .collect();

        let flows: Vec<(String, Option<String>)> = (0..config.flows)
            .map(|n| {
                let (source_id, device_id) = match sources.get(n % sources.len().max(1)) {
                    Some((s, d)) => (Some(s.clone()), d.clone()),
                    None => (None, pick(&devices, n)),
                };
                let id = self.push_new(
                    ResourceType::Flow,
                    json!({
                        "label": format!("{} flow {}", label, n + 1),
                        "description": description,
                        "tags": {},
                        "source_id": source_id,
                        "device_id": device_id,
                        "parents": [],
                        "format": "urn:x-nmos:format:video",
                    }),
                );
                (id, device_id)
            })
            .collect();

        for n in 0..config.senders {
            let (flow_id, device_id) = match flows.get(n % flows.len().max(1)) {
                Some((f, d)) => (Some(f.clone()), d.clone()),
                None => (None, pick(&devices, n)),
            };
            self.push_new(
                ResourceType::Sender,
                json!({
                    "label": format!("{} sender {}", label, n + 1),
                    "description": description,
                    "tags": {},
                    "flow_id": flow_id,
                    "transport": "urn:x-nmos:transport:rtp",
                    "device_id": device_id,
                    "manifest_href": null,
                }),
            );
        }

        for n in 0..config.receivers {
            self.push_new(
                ResourceType::Receiver,
                json!({
                    "label": format!("{} receiver {}", label, n + 1),
                    "description": description,
                    "tags": {},
                    "format": "urn:x-nmos:format:video",
                    "caps": {},
                    "device_id": pick(&devices, n),
                    "transport": "urn:x-nmos:transport:rtp",
                    "subscription": { "sender_id": null },
                }),
            );
        }
    }

    fn push_new(&mut self, resource_type: ResourceType, fields: Value) -> String {
        let id = new_resource_id();
        self.push(resource_type, id.clone(), fields);
        id
    }

    fn push(&mut self, resource_type: ResourceType, id: String, mut payload: Value) {
        let version = self.next_version();
        if let Value::Object(map) = &mut payload {
            map.insert("id".into(), Value::String(id.clone()));
            map.insert("version".into(), Value::String(version.to_string()));
        }
        self.resources.push(LocalResource {
            resource_type,
            id,
            version,
            payload,
        });
    }

    /// A version stamp newer than every one issued so far.
    fn next_version(&mut self) -> VersionStamp {
        let now = self.clock.now();
        self.last_version = if now > self.last_version {
            now
        } else {
            self.last_version.increment()
        };
        self.last_version
    }

    pub fn id(&self) -> &str {
        &self.self_id
    }

    /// The node resource itself.
    pub fn self_resource(&self) -> Option<&Value> {
        self.get(ResourceType::Node, &self.self_id)
    }

    pub fn resources(&self) -> &[LocalResource] {
        &self.resources
    }

    pub fn list(&self, resource_type: ResourceType) -> Vec<Value> {
        self.resources
            .iter()
            .filter(|r| r.resource_type == resource_type)
            .map(|r| r.payload.clone())
            .collect()
    }

    pub fn get(&self, resource_type: ResourceType, id: &str) -> Option<&Value> {
        self.resources
            .iter()
            .find(|r| r.resource_type == resource_type && r.id == id)
            .map(|r| &r.payload)
    }

    /// Record a local change to a resource and return its new version.
    pub fn bump(&mut self, resource_type: ResourceType, id: &str) -> Option<VersionStamp> {
        let index = self
            .resources
            .iter()
            .position(|r| r.resource_type == resource_type && r.id == id)?;
        let version = self.next_version();
        let resource = &mut self.resources[index];
        resource.version = version;
        if let Value::Object(map) = &mut resource.payload {
            map.insert("version".into(), Value::String(version.to_string()));
        }
        tracing::debug!(resource = %resource_type, id, version = %version, "local resource changed");
        Some(version)
    }

    /// Issue a new version for every resource. A registry refuses to
    /// re-create a deleted id at its old version, so this precedes
    /// re-registration after garbage collection or a cycle.
    pub fn touch_all(&mut self) {
        let keys: Vec<(ResourceType, String)> = self
            .resources
            .iter()
            .map(|r| (r.resource_type, r.id.clone()))
            .collect();
        for (resource_type, id) in keys {
            self.bump(resource_type, &id);
        }
    }

    /// Creations and updates for everything newer than the watermark, in
    /// dependency order. Advances the watermark to the newest version
    /// returned.
    pub fn announcements(&mut self) -> Vec<Announcement> {
        let watermark = self.watermark;
        let mut out = Vec::new();
        for resource_type in ResourceType::ALL {
            for r in self.resources.iter().filter(|r| r.resource_type == resource_type) {
                if watermark.map_or(false, |w| r.version <= w) {
                    continue;
                }
                let update = !self.announced.insert((r.resource_type, r.id.clone()));
                out.push(Announcement {
                    resource_type: r.resource_type,
                    id: r.id.clone(),
                    version: r.version,
                    update,
                    body: json!({ "type": r.resource_type.singular(), "data": r.payload }),
                });
            }
        }
        if let Some(newest) = out.iter().map(|a| a.version).max() {
            self.watermark = Some(newest);
        }
        out
    }

    /// Newest version announced so far.
    pub fn watermark(&self) -> Option<VersionStamp> {
        self.watermark
    }

    /// Re-announce everything on the next call. Ids announced before stay
    /// marked as updates.
    pub fn rewind(&mut self) {
        self.watermark = None;
    }

    /// Forget what was announced so the next call re-announces everything
    /// as new.
    pub fn reset(&mut self) {
        self.watermark = None;
        self.announced.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::model::is_valid_uuid;

    fn node(config: NodeConfig) -> LocalNode {
        LocalNode::new(&config, ApiVersion::V1_2, Arc::new(ManualClock::new(1000)))
    }

    fn full() -> NodeConfig {
        NodeConfig {
            self_id: Some("00000000-0000-4000-8000-0000000000aa".into()),
            label: Some("studio".into()),
            devices: 2,
            sources: 2,
            flows: 3,
            senders: 3,
            receivers: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_generated_resources_reference_each_other() {
        let n = node(full());
        assert_eq!(n.id(), "00000000-0000-4000-8000-0000000000aa");
        assert_eq!(n.resources().len(), 1 + 2 + 2 + 3 + 3 + 1);

        let devices = n.list(ResourceType::Device);
        assert!(devices.iter().all(|d| d["node_id"] == n.id()));
        assert!(devices.iter().all(|d| is_valid_uuid(d["id"].as_str().unwrap())));

        for flow in n.list(ResourceType::Flow) {
            let source_id = flow["source_id"].as_str().unwrap();
            let source = n.get(ResourceType::Source, source_id).unwrap();
            assert_eq!(source["device_id"], flow["device_id"]);
        }
        for sender in n.list(ResourceType::Sender) {
            assert!(n.get(ResourceType::Flow, sender["flow_id"].as_str().unwrap()).is_some());
        }
        assert_eq!(n.self_resource().unwrap()["label"], "studio");
        assert_eq!(n.self_resource().unwrap()["api"]["versions"], json!(["v1.0", "v1.1", "v1.2"]));
    }

    #[test]
    fn test_versions_strictly_increase() {
        let n = node(full());
        let versions: Vec<VersionStamp> = n.resources().iter().map(|r| r.version).collect();
        assert!(versions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_announcements_advance_watermark() {
        let mut n = node(full());
        let first = n.announcements();
        assert_eq!(first.len(), n.resources().len());
        assert_eq!(first[0].resource_type, ResourceType::Node);
        assert!(first.iter().all(|a| !a.update));
        assert_eq!(first[0].body["type"], "node");
        assert_eq!(n.watermark(), first.iter().map(|a| a.version).max());

        assert!(n.announcements().is_empty());

        let device_id = n.list(ResourceType::Device)[0]["id"].as_str().unwrap().to_string();
        let bumped = n.bump(ResourceType::Device, &device_id).unwrap();
        let next = n.announcements();
        assert_eq!(next.len(), 1);
        assert!(next[0].update);
        assert_eq!(next[0].version, bumped);
        assert_eq!(next[0].body["data"]["version"], bumped.to_string());
    }

    #[test]
    fn test_reset_reannounces_everything() {
        let mut n = node(full());
        let count = n.announcements().len();
        n.reset();
        let again = n.announcements();
        assert_eq!(again.len(), count);
        assert!(again.iter().all(|a| !a.update));
    }

    #[test]
    fn test_rewind_reannounces_as_updates() {
        let mut n = node(full());
        let count = n.announcements().len();
        n.rewind();
        let again = n.announcements();
        assert_eq!(again.len(), count);
        assert!(again.iter().all(|a| a.update));
    }

    #[test]
    fn test_touch_all_issues_newer_versions() {
        let mut n = node(full());
        let before = n.announcements();
        n.touch_all();
        n.reset();
        let after = n.announcements();
        assert_eq!(after.len(), before.len());
        for (old, new) in before.iter().zip(&after) {
            assert_eq!(old.id, new.id);
            assert!(new.version > old.version);
        }
    }

    #[test]
    fn test_bump_unknown() {
        let mut n = node(NodeConfig::default());
        assert!(n.bump(ResourceType::Device, "missing").is_none());
        assert_eq!(n.resources().len(), 1);
        assert!(is_valid_uuid(n.id()));
    }
}
