// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Time sources.
//!
//! The store stamps creation/update times and the liveness monitor ages
//! nodes out using a [`Clock`], so tests can drive time explicitly.

use crate::model::VersionStamp;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Wall-clock source.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time as `(seconds, nanoseconds)` since the Unix epoch.
    fn now(&self) -> VersionStamp;

    /// Whole seconds since the Unix epoch.
    fn now_secs(&self) -> u64 {
        self.now().seconds
    }
}

/// The system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> VersionStamp {
        VersionStamp::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    pub fn new(start_secs: u64) -> Self {
        Self {
            nanos: AtomicU64::new(start_secs.saturating_mul(NANOS_PER_SEC)),
        }
    }

    pub fn set_secs(&self, secs: u64) {
        self.nanos
            .store(secs.saturating_mul(NANOS_PER_SEC), Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        let by = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.nanos.fetch_add(by, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> VersionStamp {
        let nanos = self.nanos.load(Ordering::SeqCst);
        VersionStamp::new(nanos / NANOS_PER_SEC, nanos % NANOS_PER_SEC)
    }
}
