// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test readability
#![allow(clippy::missing_panics_doc)] // Tests panic on failure

//! HTTP front end integration tests
//!
//! Runs a registry server on a loopback socket and talks to it with reqwest.

use nmos_registry::{ManualClock, RegistryEvent, ResourceType};
use nmos_registry_server::{RegistryServer, ServerConfig, ServerError};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

const NODE: &str = "3b8be755-08ff-452b-b217-c9151eb21193";
const T0: u64 = 1_700_000_000;

struct Harness {
    server: RegistryServer,
    clock: Arc<ManualClock>,
    base: String,
    http: reqwest::Client,
    task: JoinHandle<Result<(), ServerError>>,
}

impl Harness {
    async fn start(config: ServerConfig) -> Self {
        let clock = Arc::new(ManualClock::new(T0));
        let server = RegistryServer::with_clock(config, clock.clone()).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        let serving = server.clone();
        let task = tokio::spawn(async move { serving.serve(listener).await });
        while !server.is_running() {
            tokio::task::yield_now().await;
        }
        Self {
            server,
            clock,
            base,
            http: reqwest::Client::new(),
            task,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn register_node(&self, id: &str, version: &str) -> reqwest::Response {
        self.http
            .post(self.url("/x-nmos/registration/v1.2/resource"))
            .json(&json!({ "type": "node", "data": { "id": id, "version": version, "label": "cam" } }))
            .send()
            .await
            .unwrap()
    }

    async fn stop(self) {
        self.server.shutdown().await;
        let result = tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("server did not stop")
            .unwrap();
        assert!(result.is_ok());
    }
}

#[tokio::test]
async fn test_register_read_delete_over_http() {
    let h = Harness::start(ServerConfig::default()).await;

    let resp = h.register_node(NODE, "1:0").await;
    assert_eq!(resp.status(), 201);
    assert_eq!(
        resp.headers()["location"],
        format!("/x-nmos/registration/v1.2/resource/nodes/{}", NODE).as_str()
    );

    let resp = h
        .http
        .get(h.url(&format!("/x-nmos/query/v1.2/nodes/{}", NODE)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["label"], "cam");

    let resp = h
        .http
        .delete(h.url(&format!("/x-nmos/registration/v1.2/resource/nodes/{}", NODE)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let resp = h
        .http
        .get(h.url(&format!("/x-nmos/query/v1.2/nodes/{}", NODE)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], 404);
    assert!(body["error"].as_str().unwrap().contains("deleted"));

    h.stop().await;
}

#[tokio::test]
async fn test_listing_and_paging_headers() {
    let h = Harness::start(ServerConfig::default()).await;

    let roles: Value = h.http.get(h.url("/x-nmos/")).send().await.unwrap().json().await.unwrap();
    assert_eq!(roles, json!(["registration/", "query/"]));

    let resp = h.http.get(h.url("/x-nmos/query/v1.2/flows")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["x-paging-limit"], "10");
    assert!(resp.headers().get("link").is_none());

    h.register_node(NODE, "5:0").await;
    let resp = h
        .http
        .get(h.url("/x-nmos/query/v1.2/nodes?paging.limit=1"))
        .send()
        .await
        .unwrap();
    let link = resp.headers()["link"].to_str().unwrap().to_string();
    assert!(link.contains("rel=\"first\""));
    assert!(link.contains("rel=\"last\""));
    assert!(link.contains(&format!("{}/x-nmos/query/v1.2/nodes/", h.base)));
    assert_eq!(resp.headers()["x-paging-until"], "5:000000000");

    let resp = h
        .http
        .get(h.url("/x-nmos/query/v1.2/nodes?query.rql=eq(label,cam)"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 501);

    h.stop().await;
}

#[tokio::test]
async fn test_malformed_requests() {
    let h = Harness::start(ServerConfig::default()).await;

    let resp = h
        .http
        .post(h.url("/x-nmos/registration/v1.2/resource"))
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], 400);
    assert_eq!(body["debug"], "/x-nmos/registration/v1.2/resource");

    let resp = h
        .http
        .post(h.url("/x-nmos/registration/v1.2/resource"))
        .header("content-type", "text/plain")
        .body("hello")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = h.http.get(h.url("/x-nmos/query/v1.2/nodes/not-a-uuid")).send().await.unwrap();
    assert_eq!(resp.status(), 400);

    let resp = h.http.get(h.url("/elsewhere")).send().await.unwrap();
    assert_eq!(resp.status(), 404);

    h.stop().await;
}

#[tokio::test]
async fn test_sweep_evicts_silent_node() {
    let h = Harness::start(ServerConfig::default()).await;
    let mut events = h.server.subscribe().await;
    h.register_node(NODE, "1:0").await;

    let health = format!("/x-nmos/registration/v1.2/health/nodes/{}", NODE);
    let resp = h.http.post(h.url(&health)).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["health"], T0.to_string());

    h.clock.set_secs(T0 + 12 + 1);
    let evicted = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(RegistryEvent::Evicted { node_id }) => break node_id,
                Ok(_) => continue,
                Err(e) => panic!("event stream ended: {}", e),
            }
        }
    })
    .await
    .expect("node was not evicted");
    assert_eq!(evicted, NODE);

    let resp = h.http.post(h.url(&health)).send().await.unwrap();
    assert_eq!(resp.status(), 404);

    let registry = h.server.registry();
    assert_eq!(registry.read().await.store().live_count(ResourceType::Node), 0);
    h.stop().await;
}

#[tokio::test]
async fn test_shutdown_clears_registry() {
    let h = Harness::start(ServerConfig::default()).await;
    h.register_node(NODE, "1:0").await;
    let registry = h.server.registry();
    let server = h.server.clone();
    h.stop().await;

    assert!(!server.is_running());
    let registry = registry.read().await;
    assert_eq!(registry.store().live_count(ResourceType::Node), 0);
    assert!(registry.liveness().is_empty());
}
