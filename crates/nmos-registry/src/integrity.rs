// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Referential integrity checks between resources.
//!
//! Checks are advisory: a dangling reference never blocks or undoes the
//! write that introduced it. Each check yields [`IntegrityEvent`]s and every
//! reference that resolved is remembered in a [`ReverseIndex`], so that the
//! dependents of a deleted resource can be re-checked.

use crate::config::IntegrityConfig;
use crate::model::ResourceType;
use crate::store::ResourceLookup;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Whether a reference property holds one id or an array of ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multiplicity {
    Single,
    Array,
}

/// `source.property` must name existing resource(s) of `target` type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceRule {
    pub source: ResourceType,
    pub property: &'static str,
    pub target: ResourceType,
    pub multiplicity: Multiplicity,
}

const fn rule(
    source: ResourceType,
    property: &'static str,
    target: ResourceType,
    multiplicity: Multiplicity,
) -> ReferenceRule {
    ReferenceRule {
        source,
        property,
        target,
        multiplicity,
    }
}

pub const REFERENCE_RULES: [ReferenceRule; 9] = [
    rule(ResourceType::Device, "node_id", ResourceType::Node, Multiplicity::Single),
    rule(ResourceType::Source, "device_id", ResourceType::Device, Multiplicity::Single),
    rule(ResourceType::Source, "parents", ResourceType::Source, Multiplicity::Array),
    rule(ResourceType::Receiver, "device_id", ResourceType::Device, Multiplicity::Single),
    rule(ResourceType::Sender, "device_id", ResourceType::Device, Multiplicity::Single),
    rule(ResourceType::Sender, "flow_id", ResourceType::Flow, Multiplicity::Single),
    rule(ResourceType::Flow, "source_id", ResourceType::Source, Multiplicity::Single),
    rule(ResourceType::Flow, "device_id", ResourceType::Device, Multiplicity::Single),
    rule(ResourceType::Flow, "parents", ResourceType::Flow, Multiplicity::Array),
];

impl ReferenceRule {
    /// `"<source>.<property>"`, e.g. `device.node_id`.
    pub fn path(&self) -> String {
        format!("{}.{}", self.source.singular(), self.property)
    }

    /// Referenced ids in `payload`. Null, absent and non-string values are
    /// skipped.
    pub fn targets(&self, payload: &Value) -> Vec<String> {
        match (self.multiplicity, payload.get(self.property)) {
            (Multiplicity::Single, Some(Value::String(id))) => vec![id.clone()],
            (Multiplicity::Array, Some(Value::Array(ids))) => ids
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// A resource that references another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Referrer {
    pub id: String,
    pub resource_type: ResourceType,
}

/// Target id to the set of resources that reference it.
#[derive(Debug, Default)]
pub struct ReverseIndex {
    refs: HashMap<String, HashSet<Referrer>>,
}

impl ReverseIndex {
    pub fn record(&mut self, target_id: &str, referrer: Referrer) {
        self.refs
            .entry(target_id.to_string())
            .or_default()
            .insert(referrer);
    }

    /// Resources referencing `target_id`, sorted.
    pub fn dependents(&self, target_id: &str) -> Vec<Referrer> {
        let mut out: Vec<Referrer> = self
            .refs
            .get(target_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        out.sort();
        out
    }

    pub fn contains(&self, target_id: &str, referrer: &Referrer) -> bool {
        self.refs
            .get(target_id)
            .map_or(false, |set| set.contains(referrer))
    }

    /// Number of distinct referenced targets.
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn clear(&mut self) {
        self.refs.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityStatus {
    Passed,
    /// A referenced resource was never registered.
    Missing,
    /// A referenced resource was deleted after the reference was recorded.
    Deleted,
}

/// Outcome of one rule applied to one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityEvent {
    pub status: IntegrityStatus,
    /// `"<source>.<property>"`
    pub property: String,
    pub source_id: String,
    pub source_type: ResourceType,
    pub target_type: ResourceType,
    /// Unresolved ids on failure, all referenced ids on success.
    pub target_ids: Vec<String>,
    pub message: String,
}

impl IntegrityEvent {
    pub fn is_failure(&self) -> bool {
        self.status != IntegrityStatus::Passed
    }
}

/// Applies [`REFERENCE_RULES`] and maintains the reverse index.
#[derive(Debug)]
pub struct IntegrityEngine {
    config: IntegrityConfig,
    index: ReverseIndex,
}

impl IntegrityEngine {
    pub fn new(config: IntegrityConfig) -> Self {
        Self {
            config,
            index: ReverseIndex::default(),
        }
    }

    pub fn index(&self) -> &ReverseIndex {
        &self.index
    }

    pub fn clear(&mut self) {
        self.index.clear();
    }

    /// Check the references of a newly stored resource.
    pub fn on_created<L: ResourceLookup>(
        &mut self,
        store: &L,
        resource_type: ResourceType,
        payload: &Value,
    ) -> Vec<IntegrityEvent> {
        self.check(store, resource_type, payload, false)
    }

    /// Re-check every recorded dependent of a deleted resource. Does nothing
    /// unless re-checking on delete is enabled.
    pub fn on_deleted<L: ResourceLookup>(
        &mut self,
        store: &L,
        resource_type: ResourceType,
        id: &str,
    ) -> Vec<IntegrityEvent> {
        if !self.config.recheck_on_delete {
            return Vec::new();
        }
        let dependents = self.index.dependents(id);
        tracing::debug!(
            resource = %resource_type,
            id,
            dependents = dependents.len(),
            "re-checking dependents of deleted resource"
        );
        let mut events = Vec::new();
        for dependent in dependents {
            if let Some(payload) = store.payload(dependent.resource_type, &dependent.id) {
                events.extend(self.check(store, dependent.resource_type, payload, true));
            }
        }
        events
    }

    fn check<L: ResourceLookup>(
        &mut self,
        store: &L,
        resource_type: ResourceType,
        payload: &Value,
        deleting: bool,
    ) -> Vec<IntegrityEvent> {
        let Some(source_id) = payload.get("id").and_then(Value::as_str) else {
            return Vec::new();
        };
        let mut events = Vec::new();

        for rule in REFERENCE_RULES.iter().filter(|r| r.source == resource_type) {
            let targets = rule.targets(payload);
            if targets.is_empty() {
                continue;
            }
            let (found, missing): (Vec<String>, Vec<String>) = targets
                .into_iter()
                .partition(|id| store.exists(rule.target, id));
            for target in &found {
                self.index.record(
                    target,
                    Referrer {
                        id: source_id.to_string(),
                        resource_type,
                    },
                );
            }

            let property = rule.path();
            let target = rule.target.singular();
            if !missing.is_empty() {
                let (status, message) = if deleting {
                    (
                        IntegrityStatus::Deleted,
                        format!("Property '{property}' references deleted destination {target}(s) no longer in the registry."),
                    )
                } else {
                    (
                        IntegrityStatus::Missing,
                        format!("Property '{property}' references missing destination {target}(s) not known in the registry."),
                    )
                };
                tracing::warn!(
                    property = %property,
                    source_id,
                    missing = ?missing,
                    "integrity check failed"
                );
                events.push(IntegrityEvent {
                    status,
                    property,
                    source_id: source_id.to_string(),
                    source_type: resource_type,
                    target_type: rule.target,
                    target_ids: missing,
                    message,
                });
            } else if self.config.diagnostics {
                tracing::debug!(property = %property, source_id, "integrity check passed");
                events.push(IntegrityEvent {
                    status: IntegrityStatus::Passed,
                    message: format!("Property '{property}' references known {target}(s)."),
                    property,
                    source_id: source_id.to_string(),
                    source_type: resource_type,
                    target_type: rule.target,
                    target_ids: found,
                });
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Minimal lookup over a fixed set of live resources.
    struct Fixture(HashMap<(ResourceType, String), Value>);

    impl Fixture {
        fn new(items: &[(ResourceType, Value)]) -> Self {
            Self(
                items
                    .iter()
                    .map(|(t, v)| ((*t, v["id"].as_str().unwrap().to_string()), v.clone()))
                    .collect(),
            )
        }
    }

    impl ResourceLookup for Fixture {
        fn exists(&self, resource_type: ResourceType, id: &str) -> bool {
            self.0.contains_key(&(resource_type, id.to_string()))
        }

        fn payload(&self, resource_type: ResourceType, id: &str) -> Option<&Value> {
            self.0.get(&(resource_type, id.to_string()))
        }
    }

    const NODE: &str = "00000000-0000-4000-8000-000000000001";
    const DEVICE: &str = "00000000-0000-4000-8000-000000000002";

    fn engine(diagnostics: bool, recheck_on_delete: bool) -> IntegrityEngine {
        IntegrityEngine::new(IntegrityConfig {
            diagnostics,
            recheck_on_delete,
        })
    }

    #[test]
    fn test_rule_table() {
        assert_eq!(REFERENCE_RULES.len(), 9);
        let flow_rules: Vec<String> = REFERENCE_RULES
            .iter()
            .filter(|r| r.source == ResourceType::Flow)
            .map(ReferenceRule::path)
            .collect();
        assert_eq!(flow_rules, vec!["flow.source_id", "flow.device_id", "flow.parents"]);
        assert!(REFERENCE_RULES.iter().all(|r| r.source != ResourceType::Node));
    }

    #[test]
    fn test_missing_reference_is_reported() {
        let store = Fixture::new(&[]);
        let device = json!({ "id": DEVICE, "node_id": NODE });
        let events = engine(false, false).on_created(&store, ResourceType::Device, &device);
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.status, IntegrityStatus::Missing);
        assert_eq!(event.property, "device.node_id");
        assert_eq!(event.source_id, DEVICE);
        assert_eq!(event.target_ids, vec![NODE.to_string()]);
        assert!(event.message.contains("missing destination node(s)"));
    }

    #[test]
    fn test_absent_single_reference_is_skipped() {
        let store = Fixture::new(&[]);
        let flow = json!({ "id": DEVICE, "source_id": null });
        let mut e = engine(true, false);
        assert!(e.on_created(&store, ResourceType::Flow, &flow).is_empty());
        assert!(e.index().is_empty());
    }

    #[test]
    fn test_valid_reference_indexed() {
        let store = Fixture::new(&[(ResourceType::Node, json!({ "id": NODE }))]);
        let device = json!({ "id": DEVICE, "node_id": NODE });

        let mut quiet = engine(false, false);
        assert!(quiet.on_created(&store, ResourceType::Device, &device).is_empty());

        let mut verbose = engine(true, false);
        let events = verbose.on_created(&store, ResourceType::Device, &device);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, IntegrityStatus::Passed);
        assert_eq!(
            verbose.index().dependents(NODE),
            vec![Referrer {
                id: DEVICE.to_string(),
                resource_type: ResourceType::Device
            }]
        );
    }

    #[test]
    fn test_array_references_index_only_existing() {
        let parent = "00000000-0000-4000-8000-000000000010";
        let ghost = "00000000-0000-4000-8000-000000000011";
        let store = Fixture::new(&[(ResourceType::Source, json!({ "id": parent }))]);
        let source = json!({
            "id": "00000000-0000-4000-8000-000000000012",
            "device_id": null,
            "parents": [parent, ghost],
        });
        let mut e = engine(false, false);
        let events = e.on_created(&store, ResourceType::Source, &source);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].property, "source.parents");
        assert_eq!(events[0].target_ids, vec![ghost.to_string()]);
        assert_eq!(e.index().dependents(parent).len(), 1);
        assert!(e.index().dependents(ghost).is_empty());
    }

    #[test]
    fn test_recheck_on_delete() {
        let device = json!({ "id": DEVICE, "node_id": NODE });
        let before = Fixture::new(&[(ResourceType::Node, json!({ "id": NODE })), (ResourceType::Device, device.clone())]);
        let after = Fixture::new(&[(ResourceType::Device, device.clone())]);

        let mut off = engine(false, false);
        off.on_created(&before, ResourceType::Device, &device);
        assert!(off.on_deleted(&after, ResourceType::Node, NODE).is_empty());

        let mut on = engine(false, true);
        on.on_created(&before, ResourceType::Device, &device);
        let events = on.on_deleted(&after, ResourceType::Node, NODE);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, IntegrityStatus::Deleted);
        assert!(events[0].message.contains("deleted destination node(s)"));
    }

    #[test]
    fn test_event_serializes() {
        let event = IntegrityEvent {
            status: IntegrityStatus::Missing,
            property: "sender.flow_id".into(),
            source_id: "s".into(),
            source_type: ResourceType::Sender,
            target_type: ResourceType::Flow,
            target_ids: vec!["f".into()],
            message: "m".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["status"], "missing");
        assert_eq!(json["source_type"], "sender");
    }
}
