// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Registration client: announces local resources to an upstream registry
//! and keeps the node alive with heartbeats.

use crate::config::RegistrationTarget;
use nmos_registry::{Announcement, ApiError, ApiVersion, ResourceType};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Heartbeat outcomes reported by a [`HeartbeatTask`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The registry acknowledged a heartbeat at `health` (Unix seconds).
    HeartbeatRoundtrip { node_id: String, health: u64 },
    /// The registry no longer knows the node. Heartbeats stop.
    GarbageCollected { node_id: String },
    /// A heartbeat could not be delivered. Heartbeats stop.
    HeartbeatFailed { node_id: String, error: String },
}

/// How the registry answered one announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Announced {
    /// A creation answered 201.
    Created,
    /// An update answered 200.
    Updated,
    /// An update answered 201: the registry had lost the resource.
    UnexpectedCreate,
    /// A creation answered 200: the registry held a stale registration and
    /// the node should re-register with fresh versions.
    CycleRequested,
}

impl Announced {
    fn from_reply(status: u16, update: bool) -> Option<Self> {
        match (status, update) {
            (201, false) => Some(Self::Created),
            (200, true) => Some(Self::Updated),
            (201, true) => Some(Self::UnexpectedCreate),
            (200, false) => Some(Self::CycleRequested),
            _ => None,
        }
    }

    /// HTTP status the registry answered with.
    pub fn status(self) -> u16 {
        match self {
            Self::Created | Self::UnexpectedCreate => 201,
            Self::Updated | Self::CycleRequested => 200,
        }
    }
}

/// Registration client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("registry answered {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("node {node_id} is not registered")]
    NotRegistered { node_id: String },

    #[error("malformed heartbeat reply: {0}")]
    BadHealth(String),

    #[error("heartbeat failed: {0}")]
    Heartbeat(String),
}

#[derive(Deserialize)]
struct HealthReply {
    health: String,
}

/// HTTP client for one upstream Registration API.
#[derive(Debug, Clone)]
pub struct RegistrationClient {
    http: reqwest::Client,
    base_url: String,
    api_version: ApiVersion,
}

impl RegistrationClient {
    pub fn new(target: &RegistrationTarget) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: target.base_url.trim_end_matches('/').to_string(),
            api_version: target.api_version,
        })
    }

    fn url(&self, tail: &str) -> String {
        format!(
            "{}/x-nmos/registration/{}/{}",
            self.base_url, self.api_version, tail
        )
    }

    /// POST one announcement.
    pub async fn announce(&self, announcement: &Announcement) -> Result<Announced, ClientError> {
        let resp = self
            .http
            .post(self.url("resource"))
            .json(&announcement.body)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let resource = announcement.resource_type;
        let id = &announcement.id;

        let Some(answer) = Announced::from_reply(status, announcement.update) else {
            return Err(rejected(status, resp).await);
        };
        match answer {
            Announced::UnexpectedCreate => warn!(
                resource = %resource,
                id = %id,
                "update answered 201, the registry had lost the resource"
            ),
            Announced::CycleRequested => warn!(
                resource = %resource,
                id = %id,
                "creation answered 200, the registry held a stale registration"
            ),
            Announced::Created | Announced::Updated => {
                debug!(resource = %resource, id = %id, status, "announced")
            }
        }
        Ok(answer)
    }

    /// DELETE a resource from the registry.
    pub async fn delete(&self, resource_type: ResourceType, id: &str) -> Result<(), ClientError> {
        let resp = self
            .http
            .delete(self.url(&format!("resource/{}/{}", resource_type.plural(), id)))
            .send()
            .await?;
        match resp.status().as_u16() {
            204 => {
                debug!(resource = %resource_type, id, "unregistered");
                Ok(())
            }
            status => Err(rejected(status, resp).await),
        }
    }

    /// POST one heartbeat. Returns the registry's health timestamp.
    pub async fn heartbeat(&self, node_id: &str) -> Result<u64, ClientError> {
        let resp = self
            .http
            .post(self.url(&format!("health/nodes/{}", node_id)))
            .send()
            .await?;
        match resp.status().as_u16() {
            200 => {
                let reply: HealthReply = resp.json().await?;
                reply
                    .health
                    .parse()
                    .map_err(|_| ClientError::BadHealth(reply.health))
            }
            404 => Err(ClientError::NotRegistered {
                node_id: node_id.to_string(),
            }),
            status => Err(rejected(status, resp).await),
        }
    }

    /// Send heartbeats for `node_id` every `period` until stopped or until
    /// one fails. Outcomes go to `events`.
    pub fn spawn_heartbeats(
        &self,
        node_id: impl Into<String>,
        period: Duration,
        events: mpsc::Sender<ClientEvent>,
    ) -> HeartbeatTask {
        let client = self.clone();
        let node_id = node_id.into();
        let cancel = Arc::new(Notify::new());
        let stop = Arc::clone(&cancel);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(node_id = %node_id, period_ms = period.as_millis() as u64, "heartbeats started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stop.notified() => {
                        debug!(node_id = %node_id, "heartbeats cancelled");
                        return;
                    }
                }

                let event = match client.heartbeat(&node_id).await {
                    Ok(health) => ClientEvent::HeartbeatRoundtrip {
                        node_id: node_id.clone(),
                        health,
                    },
                    Err(ClientError::NotRegistered { node_id }) => {
                        warn!(node_id = %node_id, "registry garbage collected the node");
                        ClientEvent::GarbageCollected { node_id }
                    }
                    Err(e) => {
                        warn!(node_id = %node_id, error = %e, "heartbeat failed");
                        ClientEvent::HeartbeatFailed {
                            node_id: node_id.clone(),
                            error: e.to_string(),
                        }
                    }
                };
                let last = !matches!(event, ClientEvent::HeartbeatRoundtrip { .. });
                if events.send(event).await.is_err() || last {
                    return;
                }
            }
        });

        HeartbeatTask { cancel, handle }
    }
}

async fn rejected(status: u16, resp: reqwest::Response) -> ClientError {
    let message = match resp.json::<ApiError>().await {
        Ok(body) => body.error,
        Err(_) => "no error body".to_string(),
    };
    ClientError::Rejected { status, message }
}

/// A running heartbeat loop.
#[derive(Debug)]
pub struct HeartbeatTask {
    cancel: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl HeartbeatTask {
    /// Stop sending heartbeats.
    pub fn stop(&self) {
        self.cancel.notify_one();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the loop to end.
    pub async fn join(self) {
        // A panicked or aborted loop has nothing left to report.
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let mut target = RegistrationTarget::new("http://registry.local:3000/");
        target.api_version = ApiVersion::V1_1;
        let client = RegistrationClient::new(&target).unwrap();
        assert_eq!(
            client.url("resource"),
            "http://registry.local:3000/x-nmos/registration/v1.1/resource"
        );
        assert_eq!(
            client.url("health/nodes/abc"),
            "http://registry.local:3000/x-nmos/registration/v1.1/health/nodes/abc"
        );
    }

    #[test]
    fn test_announce_replies() {
        assert_eq!(Announced::from_reply(201, false), Some(Announced::Created));
        assert_eq!(Announced::from_reply(200, true), Some(Announced::Updated));
        assert_eq!(Announced::from_reply(201, true), Some(Announced::UnexpectedCreate));
        assert_eq!(Announced::from_reply(200, false), Some(Announced::CycleRequested));
        assert_eq!(Announced::from_reply(400, false), None);
        assert_eq!(Announced::CycleRequested.status(), 200);
    }

    #[tokio::test]
    async fn test_unreachable_registry_fails_heartbeat() {
        // Port 9 (discard) is not expected to run an HTTP server.
        let client = RegistrationClient::new(&RegistrationTarget::new("http://127.0.0.1:9")).unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        let task = client.spawn_heartbeats("node", Duration::from_millis(10), tx);
        match rx.recv().await {
            Some(ClientEvent::HeartbeatFailed { node_id, .. }) => assert_eq!(node_id, "node"),
            other => panic!("unexpected {:?}", other),
        }
        task.join().await;
    }

    #[tokio::test]
    async fn test_stop_cancels_loop() {
        let client = RegistrationClient::new(&RegistrationTarget::new("http://127.0.0.1:9")).unwrap();
        let (tx, _rx) = mpsc::channel(4);
        let task = client.spawn_heartbeats("node", Duration::from_secs(3600), tx);
        task.stop();
        task.join().await;
    }
}
