// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Heartbeat tracking for registered nodes.
//!
//! A node is tracked from its registration until it is deleted or evicted.
//! [`LivenessMonitor::sweep`] evicts every node whose last heartbeat is older
//! than the timeout; the caller turns evictions into garbage collection.

use crate::config::LivenessConfig;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Tracked {
    /// Id as registered.
    node_id: String,
    last_seen: u64,
}

/// Per-node last-renewal times, in whole seconds since the Unix epoch.
///
/// Ids are matched case-insensitively; a UUID in a heartbeat path may be
/// written in either case.
#[derive(Debug)]
pub struct LivenessMonitor {
    timeout_secs: u64,
    nodes: HashMap<String, Tracked>,
}

fn fold(node_id: &str) -> String {
    node_id.to_ascii_lowercase()
}

impl LivenessMonitor {
    pub fn new(config: &LivenessConfig) -> Self {
        Self {
            timeout_secs: config.gc_interval_secs,
            nodes: HashMap::new(),
        }
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    /// Start (or restart) tracking a node.
    pub fn track(&mut self, node_id: &str, now_secs: u64) {
        let tracked = Tracked {
            node_id: node_id.to_string(),
            last_seen: now_secs,
        };
        if self.nodes.insert(fold(node_id), tracked).is_none() {
            tracing::debug!(node_id, "tracking node heartbeats");
        }
    }

    /// Stop tracking a node. Returns whether it was tracked.
    pub fn untrack(&mut self, node_id: &str) -> bool {
        self.nodes.remove(&fold(node_id)).is_some()
    }

    /// Refresh a tracked node. Returns the new last-seen time, or `None`
    /// when the node is not tracked.
    pub fn renew(&mut self, node_id: &str, now_secs: u64) -> Option<u64> {
        let tracked = self.nodes.get_mut(&fold(node_id))?;
        tracked.last_seen = now_secs;
        Some(now_secs)
    }

    pub fn last_seen(&self, node_id: &str) -> Option<u64> {
        self.nodes.get(&fold(node_id)).map(|t| t.last_seen)
    }

    pub fn is_tracked(&self, node_id: &str) -> bool {
        self.nodes.contains_key(&fold(node_id))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Remove every node last seen before `now - timeout` and return their
    /// registered ids, sorted.
    pub fn sweep(&mut self, now_secs: u64) -> Vec<String> {
        let threshold = now_secs.saturating_sub(self.timeout_secs);
        let mut expired: Vec<String> = self
            .nodes
            .iter()
            .filter(|(_, t)| t.last_seen < threshold)
            .map(|(key, _)| key.clone())
            .collect();
        expired.sort();

        let mut evicted = Vec::with_capacity(expired.len());
        for key in expired {
            if let Some(tracked) = self.nodes.remove(&key) {
                tracing::info!(
                    node_id = %tracked.node_id,
                    timeout_secs = self.timeout_secs,
                    "no heartbeat within timeout, requesting garbage collection"
                );
                evicted.push(tracked.node_id);
            }
        }
        evicted
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}
