// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Operator-visible counters and per-peer status. Counters are plain
//! atomics sampled into a snapshot struct; no metrics-exporter crate is
//! pulled in since shipping these over HTTP is out of scope here.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Default)]
pub struct Metrics {
    connections_accepted: AtomicU64,
    connections_rejected: AtomicU64,
    bytes_in: AtomicU64,
    bytes_out: AtomicU64,
    compressed_frames: AtomicU64,
    uncompressed_frames: AtomicU64,
    handshake_count: AtomicU64,
    handshake_total_micros: AtomicU64,
}

/// Point-in-time read of [`Metrics`]' counters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub connections_accepted: u64,
    pub connections_rejected: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub compression_ratio: f64,
    pub avg_handshake_millis: f64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_connection_accepted(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection_rejected(&self) {
        self.connections_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bytes_in(&self, n: u64) {
        self.bytes_in.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_bytes_out(&self, n: u64) {
        self.bytes_out.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_frame_compression(&self, compressed: bool) {
        if compressed {
            self.compressed_frames.fetch_add(1, Ordering::Relaxed);
        } else {
            self.uncompressed_frames.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_handshake(&self, elapsed: Duration) {
        self.handshake_count.fetch_add(1, Ordering::Relaxed);
        self.handshake_total_micros.fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let compressed = self.compressed_frames.load(Ordering::Relaxed);
        let uncompressed = self.uncompressed_frames.load(Ordering::Relaxed);
        let total_frames = compressed + uncompressed;
        let compression_ratio = if total_frames == 0 { 0.0 } else { compressed as f64 / total_frames as f64 };

        let handshake_count = self.handshake_count.load(Ordering::Relaxed);
        let avg_handshake_millis = if handshake_count == 0 {
            0.0
        } else {
            (self.handshake_total_micros.load(Ordering::Relaxed) as f64 / handshake_count as f64) / 1000.0
        };

        MetricsSnapshot {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            connections_rejected: self.connections_rejected.load(Ordering::Relaxed),
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
            bytes_out: self.bytes_out.load(Ordering::Relaxed),
            compression_ratio,
            avg_handshake_millis,
        }
    }
}

/// Operator-visible state of one remote peer: up, backoff,
/// unreachable, or requiring a snapshot merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerStatus {
    Connected,
    Backoff { until: tokio::time::Instant },
    Unreachable,
    RequiresSnapshot,
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
