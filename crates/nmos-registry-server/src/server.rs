// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Registry server lifecycle: HTTP listener, liveness sweep, node agent.

use crate::agent::NodeAgent;
use crate::config::{ConfigError, ServerConfig};
use crate::http;
use nmos_registry::{ApiRequest, ApiResponse, Clock, Registry, RegistryEvent, SystemClock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Registry server. Cheap to clone; clones share one registry.
#[derive(Clone)]
pub struct RegistryServer {
    config: Arc<ServerConfig>,
    registry: Arc<RwLock<Registry>>,
    /// Set once; a stopped server stays stopped.
    shutdown: Arc<watch::Sender<bool>>,
    running: Arc<AtomicBool>,
}

impl RegistryServer {
    /// Create a server on the system clock.
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: ServerConfig, clock: Arc<dyn Clock>) -> Result<Self, ServerError> {
        config.validate()?;
        let registry = Registry::with_clock(config.registry.clone(), clock);

        Ok(Self {
            config: Arc::new(config),
            registry: Arc::new(RwLock::new(registry)),
            shutdown: Arc::new(watch::channel(false).0),
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Shared registry state.
    pub fn registry(&self) -> Arc<RwLock<Registry>> {
        Arc::clone(&self.registry)
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        let addr = format!("{}:{}", self.config.bind_address, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ServerError::AlreadyRunning);
        }
        info!(addr = ?listener.local_addr().ok(), "registry listening");

        let sweeper = self.spawn_sweeper();
        let agent = self.spawn_agent();

        let result = axum::serve(listener, http::router(self.clone()))
            .with_graceful_shutdown(stopped(self.shutdown.subscribe()))
            .await;

        sweeper.abort();
        if let Some(agent) = agent {
            agent.abort();
        }
        self.running.store(false, Ordering::SeqCst);
        info!("registry stopped");
        result.map_err(ServerError::Io)
    }

    /// Periodic liveness sweep.
    fn spawn_sweeper(&self) -> JoinHandle<()> {
        let registry = Arc::clone(&self.registry);
        let mut shutdown = self.shutdown.subscribe();
        let check_rate = self.config.check_rate();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(check_rate);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = registry.write().await.sweep();
                        if !report.is_empty() {
                            info!(
                                evicted = report.evicted.len(),
                                removed = report.removed,
                                "evicted nodes without heartbeat"
                            );
                        }
                    }
                    _ = async { shutdown.wait_for(|stop| *stop).await.map(|_| ()) } => {
                        debug!("liveness sweep shutting down");
                        break;
                    }
                }
            }
        })
    }

    /// Register the local node upstream when configured.
    fn spawn_agent(&self) -> Option<JoinHandle<()>> {
        let target = self.config.registration.as_ref()?;
        let agent = match NodeAgent::new(Arc::clone(&self.registry), target) {
            Ok(agent) => agent,
            Err(e) => {
                warn!(error = %e, "node agent disabled");
                return None;
            }
        };
        let shutdown = self.shutdown.subscribe();
        Some(tokio::spawn(async move {
            if let Err(e) = agent.run(shutdown).await {
                warn!(error = %e, "node registration stopped");
            }
        }))
    }

    /// Handle one request against the shared registry.
    pub async fn handle(&self, request: &ApiRequest) -> ApiResponse {
        self.registry.write().await.handle(request)
    }

    /// Subscribe to registry events.
    pub async fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.registry.read().await.subscribe()
    }

    /// Stop the listener, the sweep and the node agent, then drop all
    /// registry state.
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);
        self.registry.write().await.clear();
    }

    /// Check if server is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Resolves once `shutdown` is set, or when its sender is gone.
async fn stopped(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Bind error on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server already running")]
    AlreadyRunning,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use nmos_registry::ManualClock;
    use serde_json::json;

    const NODE: &str = "3b8be755-08ff-452b-b217-c9151eb21193";

    #[test]
    fn test_invalid_config_rejected() {
        let config = ServerConfig {
            port: 0,
            ..Default::default()
        };
        assert!(matches!(
            RegistryServer::new(config),
            Err(ServerError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_handle_and_shutdown_clears_state() {
        let server =
            RegistryServer::with_clock(ServerConfig::default(), Arc::new(ManualClock::new(10))).unwrap();
        let body = json!({ "type": "node", "data": { "id": NODE, "version": "1:0" } });
        let resp = server
            .handle(&ApiRequest::post("/x-nmos/registration/v1.2/resource", body))
            .await;
        assert_eq!(resp.status, 201);
        assert!(!server.is_running());

        server.shutdown().await;
        let registry = server.registry();
        let registry = registry.read().await;
        assert!(registry.liveness().is_empty());
    }

    #[tokio::test]
    async fn test_serve_twice_rejected() {
        let server = RegistryServer::new(ServerConfig::default()).unwrap();
        let first = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let second = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let running = server.clone();
        let handle = tokio::spawn(async move { running.serve(first).await });
        while !server.is_running() {
            tokio::task::yield_now().await;
        }
        assert!(matches!(server.serve(second).await, Err(ServerError::AlreadyRunning)));

        server.shutdown().await;
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_before_serve_is_kept() {
        let server = RegistryServer::new(ServerConfig::default()).unwrap();
        server.shutdown().await;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let result = tokio::time::timeout(std::time::Duration::from_secs(5), server.serve(listener))
            .await
            .expect("serve ignored an earlier shutdown");
        assert!(result.is_ok());
        assert!(!server.is_running());
    }
}
