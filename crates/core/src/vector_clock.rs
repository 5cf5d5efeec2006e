// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Vector clock: per-node summary of the latest HLC timestamp seen for
//! every author, used to drive anti-entropy.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::hlc::Hlc;

/// Result of comparing two vector clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorOrdering {
    Equal,
    Before,
    After,
    Concurrent,
}

/// Map from author `node_id` to the latest `Hlc` known to have been
/// authored by that node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorClock {
    entries: BTreeMap<String, Hlc>,
}

impl VectorClock {
    /// Creates an empty vector clock.
    pub fn new() -> Self {
        VectorClock::default()
    }

    /// Returns the latest known timestamp for `node_id`, if any.
    pub fn get(&self, node_id: &str) -> Option<&Hlc> {
        self.entries.get(node_id)
    }

    /// Records `ts` as the latest timestamp seen for its author, if it is
    /// newer than what is already recorded.
    pub fn set(&mut self, ts: Hlc) {
        match self.entries.get(&ts.node_id) {
            Some(existing) if *existing >= ts => {}
            _ => {
                self.entries.insert(ts.node_id.clone(), ts);
            }
        }
    }

    /// Iterates over `(node_id, latest_ts)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Hlc)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Componentwise comparison against another vector clock.
    pub fn compare(&self, other: &VectorClock) -> VectorOrdering {
        let mut self_ahead = false;
        let mut other_ahead = false;

        let mut nodes: Vec<&str> =
            self.entries.keys().chain(other.entries.keys()).map(String::as_str).collect();
        nodes.sort_unstable();
        nodes.dedup();

        for node in nodes {
            let ours = self.entries.get(node);
            let theirs = other.entries.get(node);
            match (ours, theirs) {
                (Some(a), Some(b)) => {
                    if a > b {
                        self_ahead = true;
                    } else if b > a {
                        other_ahead = true;
                    }
                }
                (Some(_), None) => self_ahead = true,
                (None, Some(_)) => other_ahead = true,
                (None, None) => {}
            }
        }

        match (self_ahead, other_ahead) {
            (false, false) => VectorOrdering::Equal,
            (true, false) => VectorOrdering::After,
            (false, true) => VectorOrdering::Before,
            (true, true) => VectorOrdering::Concurrent,
        }
    }

    /// Nodes for which `other` has a strictly newer timestamp than we do —
    /// i.e. the set we should pull from `other`.
    pub fn nodes_peer_is_ahead_of(&self, other: &VectorClock) -> Vec<String> {
        let mut out = Vec::new();
        for (node, their_ts) in other.entries.iter() {
            match self.entries.get(node) {
                Some(our_ts) if our_ts >= their_ts => {}
                _ => out.push(node.clone()),
            }
        }
        out.sort_unstable();
        out
    }

    /// Nodes for which we have a strictly newer timestamp than `other` —
    /// i.e. the set we should push to `other`.
    pub fn nodes_we_are_ahead_of(&self, other: &VectorClock) -> Vec<String> {
        other.nodes_peer_is_ahead_of(self)
    }
}

#[cfg(test)]
#[path = "vector_clock_tests.rs"]
mod tests;
