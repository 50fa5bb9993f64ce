// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Node agent: keeps the local node registered with an upstream registry.

use crate::client::{Announced, ClientError, ClientEvent, RegistrationClient};
use crate::config::RegistrationTarget;
use nmos_registry::{LocalNode, Registry};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, RwLock};
use tracing::{debug, info, warn};

/// Outcome of one registration round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registration {
    /// Announcements the registry accepted.
    pub sent: usize,
    /// The registry already held a registration for something sent as new.
    pub cycle_requested: bool,
}

/// Announces the local node's resources and runs its heartbeats. When the
/// registry garbage collects the node, or holds a stale registration of it,
/// everything is re-registered with fresh versions.
pub struct NodeAgent {
    registry: Arc<RwLock<Registry>>,
    client: RegistrationClient,
    heart_rate: Duration,
}

impl NodeAgent {
    pub fn new(registry: Arc<RwLock<Registry>>, target: &RegistrationTarget) -> Result<Self, ClientError> {
        Ok(Self {
            registry,
            client: RegistrationClient::new(target)?,
            heart_rate: target.heart_rate(),
        })
    }

    pub fn client(&self) -> &RegistrationClient {
        &self.client
    }

    /// Id of the local node, if the registry hosts one.
    pub async fn node_id(&self) -> Option<String> {
        self.registry
            .read()
            .await
            .local_node()
            .map(|n| n.id().to_string())
    }

    /// Send every pending announcement.
    pub async fn register(&self) -> Result<Registration, ClientError> {
        let announcements = {
            let mut registry = self.registry.write().await;
            registry
                .local_node_mut()
                .map(LocalNode::announcements)
                .unwrap_or_default()
        };
        let mut round = Registration::default();
        for announcement in &announcements {
            match self.client.announce(announcement).await {
                Ok(Announced::CycleRequested) => round.cycle_requested = true,
                Ok(_) => {}
                Err(e) => {
                    // Send everything again on the next attempt.
                    if let Some(local) = self.registry.write().await.local_node_mut() {
                        local.rewind();
                    }
                    return Err(e);
                }
            }
            round.sent += 1;
        }
        if round.sent > 0 {
            info!(count = round.sent, "announced local resources");
        }
        Ok(round)
    }

    /// Re-issue every version and announce everything again as updates.
    pub async fn reissue(&self) {
        if let Some(local) = self.registry.write().await.local_node_mut() {
            local.touch_all();
            local.rewind();
        }
    }

    /// Register, then cycle once if the registry held a stale registration.
    async fn settle(&self) -> Result<(), ClientError> {
        if !self.register().await?.cycle_requested {
            return Ok(());
        }
        info!("registry held a stale registration, re-registering with fresh versions");
        self.reissue().await;
        if self.register().await?.cycle_requested {
            warn!("registry still reports stale registrations after a cycle");
        }
        Ok(())
    }

    /// Register, heartbeat and re-register until `shutdown` is set or a
    /// heartbeat fails.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), ClientError> {
        let Some(node_id) = self.node_id().await else {
            warn!("no local node configured, nothing to register");
            return Ok(());
        };

        loop {
            self.settle().await?;
            let (events_tx, mut events) = mpsc::channel(16);
            let heartbeats = self
                .client
                .spawn_heartbeats(node_id.clone(), self.heart_rate, events_tx);

            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Some(ClientEvent::HeartbeatRoundtrip { health, .. }) => {
                            debug!(node_id = %node_id, health, "heartbeat acknowledged");
                            // Push local changes made since the last round.
                            if let Err(e) = self.settle().await {
                                heartbeats.stop();
                                return Err(e);
                            }
                        }
                        Some(ClientEvent::GarbageCollected { .. }) => {
                            info!(node_id = %node_id, "re-registering after garbage collection");
                            self.reissue().await;
                            break;
                        }
                        Some(ClientEvent::HeartbeatFailed { error, .. }) => {
                            return Err(ClientError::Heartbeat(error));
                        }
                        None => return Ok(()),
                    },
                    _ = async { shutdown.wait_for(|stop| *stop).await.map(|_| ()) } => {
                        heartbeats.stop();
                        return Ok(());
                    }
                }
            }
        }
    }
}
