// Copyright 2026 Forage Contributors
// SPDX-License-Identifier: Apache-2.0

//! Forage event bus — typed events from every pipeline stage.
//!
//! The EventBus is a `tokio::sync::broadcast` channel carrying
//! [`ForageEvent`] values. Any consumer — the REST SSE endpoint, log files,
//! a dashboard — can subscribe independently. When no subscribers exist,
//! events are silently dropped (zero overhead).

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Every event the runtime emits. Serialized to JSON for SSE streaming.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ForageEvent {
    /// An acquisition request passed validation and entered the pipeline.
    AcquireStarted {
        session_id: String,
        query: String,
    },
    /// The request was answered from cache; no session was created.
    CacheHit { key: String },
    /// A search backend began looking for candidate URLs.
    SearchStarted { session_id: String, source: String },
    /// A search backend or page load failed. Recovered, never surfaced.
    SourceFailed {
        session_id: String,
        source: String,
        reason: String,
    },
    /// A candidate page yielded usable text.
    PageExtracted {
        session_id: String,
        url: String,
        chars: usize,
    },
    /// A fallback tier produced nothing and the chain moved on.
    TierEscalated {
        session_id: String,
        from: String,
        to: String,
    },
    /// The request completed with content.
    AcquireComplete {
        session_id: String,
        origin: String,
        chars: usize,
        elapsed_ms: u64,
    },
    /// The runtime started serving.
    RuntimeStarted { version: String, http_port: u16 },
    /// Periodic maintenance pass finished.
    MaintenanceTick {
        cache_entries: usize,
        expired_removed: usize,
        snapshots_pruned: usize,
    },
}

/// The central event bus.
pub struct EventBus {
    sender: broadcast::Sender<ForageEvent>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers. Silently ignores if none.
    pub fn emit(&self, event: ForageEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<ForageEvent> {
        self.sender.subscribe()
    }
}

/// Check whether an event belongs to a specific session.
pub fn event_matches_session(event: &ForageEvent, session_id: &str) -> bool {
    match event {
        ForageEvent::AcquireStarted { session_id: s, .. }
        | ForageEvent::SearchStarted { session_id: s, .. }
        | ForageEvent::SourceFailed { session_id: s, .. }
        | ForageEvent::PageExtracted { session_id: s, .. }
        | ForageEvent::TierEscalated { session_id: s, .. }
        | ForageEvent::AcquireComplete { session_id: s, .. } => s == session_id,
        // System-wide events reach every subscriber
        ForageEvent::CacheHit { .. }
        | ForageEvent::RuntimeStarted { .. }
        | ForageEvent::MaintenanceTick { .. } => true,
    }
}
