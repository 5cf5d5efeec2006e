// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Hybrid Logical Clock (HLC) for distributed ordering.
//!
//! HLC combines wall clock time with a logical counter to provide causally
//! consistent timestamps even in the presence of clock skew.
//!
//! Format: `{physical_ms}-{logical}-{node_id}`
//!
//! Ordering rules (total order):
//! 1. Higher `physical` wins
//! 2. If `physical` equal, higher `logical` wins
//! 3. If both equal, higher `node_id` wins (deterministic tiebreaker, not a
//!    causality signal)

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Error, Result};

/// A Hybrid Logical Clock timestamp: `(physical, logical, node_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hlc {
    /// Wall clock time in milliseconds since Unix epoch.
    pub physical: i64,
    /// Logical counter for ordering events at the same wall time.
    pub logical: u32,
    /// Identifier of the node that produced this timestamp.
    pub node_id: String,
}

impl Hlc {
    /// Creates a new HLC with the given components.
    pub fn new(physical: i64, logical: u32, node_id: impl Into<String>) -> Self {
        Hlc { physical, logical, node_id: node_id.into() }
    }

    /// Creates an HLC representing the earliest possible time (for queries).
    pub fn min() -> Self {
        Hlc { physical: 0, logical: 0, node_id: String::new() }
    }

    /// Parses an HLC from its string representation.
    pub fn parse(s: &str) -> Result<Self> {
        s.parse()
    }

    /// Returns true if this HLC is strictly greater than the other.
    pub fn is_after(&self, other: &Hlc) -> bool {
        self > other
    }

    /// Returns true if this HLC is strictly less than the other.
    pub fn is_before(&self, other: &Hlc) -> bool {
        self < other
    }
}

impl Ord for Hlc {
    fn cmp(&self, other: &Self) -> Ordering {
        self.physical
            .cmp(&other.physical)
            .then_with(|| self.logical.cmp(&other.logical))
            .then_with(|| self.node_id.cmp(&other.node_id))
    }
}

impl PartialOrd for Hlc {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Hlc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.physical, self.logical, self.node_id)
    }
}

impl FromStr for Hlc {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.splitn(3, '-');
        let (Some(physical), Some(logical), Some(node_id)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::InvalidHlc(format!(
                "expected format 'physical-logical-node_id', got '{s}'"
            )));
        };

        let physical = physical
            .parse::<i64>()
            .map_err(|_| Error::InvalidHlc(format!("invalid physical '{physical}' in '{s}'")))?;

        let logical = logical
            .parse::<u32>()
            .map_err(|_| Error::InvalidHlc(format!("invalid logical '{logical}' in '{s}'")))?;

        if node_id.is_empty() {
            return Err(Error::InvalidHlc(format!("empty node_id in '{s}'")));
        }

        Ok(Hlc::new(physical, logical, node_id))
    }
}

/// Trait for getting the current wall clock time.
///
/// This allows injecting a mock clock for testing.
pub trait ClockSource: Send + Sync {
    /// Returns the current time in milliseconds since Unix epoch.
    fn now_ms(&self) -> i64;
}

/// System clock implementation using `std::time::SystemTime`.
#[derive(Debug, Default)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
    }
}

impl<C: ClockSource> ClockSource for &C {
    fn now_ms(&self) -> i64 {
        (*self).now_ms()
    }
}

/// A clock generator that produces monotonically increasing HLC timestamps.
///
/// Thread-safe and handles clock skew by advancing the logical counter
/// when the wall clock does not advance or goes backwards.
pub struct HlcClock<C: ClockSource = SystemClock> {
    clock: C,
    node_id: String,
    last_physical: Mutex<i64>,
    last_logical: AtomicU32,
}

impl HlcClock<SystemClock> {
    /// Creates a new HLC clock with the system clock and given node ID.
    pub fn new(node_id: impl Into<String>) -> Self {
        Self::with_clock(SystemClock, node_id)
    }
}

impl<C: ClockSource> HlcClock<C> {
    /// Creates a new HLC clock with a custom clock source.
    pub fn with_clock(clock: C, node_id: impl Into<String>) -> Self {
        HlcClock {
            clock,
            node_id: node_id.into(),
            last_physical: Mutex::new(0),
            last_logical: AtomicU32::new(0),
        }
    }

    /// Returns the node ID for this clock.
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Generates a new HLC timestamp.
    ///
    /// Guarantees monotonically increasing timestamps even if the wall clock
    /// goes backwards.
    pub fn now(&self) -> Hlc {
        let physical = self.clock.now_ms();
        let mut last = self.last_physical.lock().unwrap_or_else(|e| e.into_inner());

        let (out_physical, logical) = if physical > *last {
            *last = physical;
            self.last_logical.store(0, AtomicOrdering::SeqCst);
            (physical, 0)
        } else {
            let logical = self.last_logical.fetch_add(1, AtomicOrdering::SeqCst) + 1;
            (*last, logical)
        };

        Hlc::new(out_physical, logical, self.node_id.clone())
    }

    /// Updates the clock based on a received HLC timestamp.
    ///
    /// This ensures causality: any timestamp generated after observing
    /// a remote timestamp will be greater than it:
    /// `(max(l.phys, r.phys, wall()), l.log+1 if max==previous max else 0, self)`.
    pub fn receive(&self, received: &Hlc) -> Hlc {
        let physical = self.clock.now_ms();
        let mut last = self.last_physical.lock().unwrap_or_else(|e| e.into_inner());

        let (out_physical, logical) = if physical > *last && physical > received.physical {
            *last = physical;
            self.last_logical.store(0, AtomicOrdering::SeqCst);
            (physical, 0)
        } else if received.physical > *last {
            *last = received.physical;
            let logical = received.logical + 1;
            self.last_logical.store(logical, AtomicOrdering::SeqCst);
            (received.physical, logical)
        } else if received.physical == *last {
            let ours = self.last_logical.load(AtomicOrdering::SeqCst);
            let logical = ours.max(received.logical) + 1;
            self.last_logical.store(logical, AtomicOrdering::SeqCst);
            (*last, logical)
        } else {
            let logical = self.last_logical.fetch_add(1, AtomicOrdering::SeqCst) + 1;
            (*last, logical)
        };

        Hlc::new(out_physical, logical, self.node_id.clone())
    }
}

#[cfg(test)]
#[path = "hlc_tests.rs"]
mod tests;
