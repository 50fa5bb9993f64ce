// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! NMOS Registry Server
//!
//! Serves the Registration, Query and (optionally) Node APIs of an
//! [`nmos_registry::Registry`] over HTTP.
//!
//! # Features
//!
//! - **HTTP front end**: axum fallback router, every `/x-nmos` path is
//!   dispatched to the registry
//! - **Liveness sweep**: periodic eviction of nodes that stopped sending
//!   heartbeats
//! - **Node agent**: registers the locally hosted node with an upstream
//!   registry and keeps it alive
//! - **JSON configuration**: file-based config with defaults for every field
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use nmos_registry_server::{RegistryServer, ServerConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let server = RegistryServer::new(ServerConfig::default())?;
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod client;
pub mod config;
pub mod http;
pub mod server;

pub use agent::{NodeAgent, Registration};
pub use client::{Announced, ClientError, ClientEvent, HeartbeatTask, RegistrationClient};
pub use config::{ConfigError, RegistrationTarget, ServerConfig};
pub use server::{RegistryServer, ServerError};
