// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Version stamps (`"<seconds>:<subseconds>"`).
//!
//! A stamp is a logical clock value: resources carry one as their `version`,
//! and the store compares them for conflict detection and pagination cursors.
//! Ordering is lexicographic on `(seconds, subseconds)`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Largest subseconds value of a nanosecond-resolution stamp.
pub const MAX_SUBSECONDS: u64 = 999_999_999;

/// Logical version stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VersionStamp {
    pub seconds: u64,
    pub subseconds: u64,
}

/// Error returned when a string is not of the form `^\d+:\d+$`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid version stamp '{0}'")]
pub struct ParseVersionError(pub String);

impl VersionStamp {
    pub const ZERO: VersionStamp = VersionStamp {
        seconds: 0,
        subseconds: 0,
    };

    /// Upper bound used when a query has no `paging.until`.
    pub const MAX: VersionStamp = VersionStamp {
        seconds: u64::MAX,
        subseconds: u64::MAX,
    };

    pub const fn new(seconds: u64, subseconds: u64) -> Self {
        Self {
            seconds,
            subseconds,
        }
    }

    /// Stamp for a duration since the Unix epoch (nanosecond subseconds).
    pub fn from_duration(since_epoch: Duration) -> Self {
        Self::new(since_epoch.as_secs(), u64::from(since_epoch.subsec_nanos()))
    }

    /// Stamp for the current wall-clock time.
    pub fn now() -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self::from_duration(since_epoch)
    }

    /// One unit less than `self`.
    ///
    /// On borrow the subseconds wrap to [`MAX_SUBSECONDS`]. `0:0` saturates.
    pub fn decrement(self) -> Self {
        match (self.seconds, self.subseconds) {
            (_, n) if n > 0 => Self::new(self.seconds, n - 1),
            (0, _) => Self::ZERO,
            (s, _) => Self::new(s - 1, MAX_SUBSECONDS),
        }
    }

    /// One unit more than `self`, carrying into seconds past [`MAX_SUBSECONDS`].
    pub fn increment(self) -> Self {
        if self.subseconds >= MAX_SUBSECONDS {
            Self::new(self.seconds.saturating_add(1), 0)
        } else {
            Self::new(self.seconds, self.subseconds + 1)
        }
    }

    /// Check whether `s` has the version stamp shape.
    pub fn is_valid(s: &str) -> bool {
        s.parse::<VersionStamp>().is_ok()
    }
}

impl fmt::Display for VersionStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:09}", self.seconds, self.subseconds)
    }
}

impl FromStr for VersionStamp {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseVersionError(s.to_string());
        let (secs, subs) = s.split_once(':').ok_or_else(err)?;
        let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if !digits(secs) || !digits(subs) {
            return Err(err());
        }
        Ok(Self::new(
            secs.parse().map_err(|_| err())?,
            subs.parse().map_err(|_| err())?,
        ))
    }
}

impl Serialize for VersionStamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionStamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
