//! Per-request session tracking.
//!
//! A session is an ephemeral state machine created for each cache miss:
//! `Starting → Searching(source) → Extracting(url) → Aggregating →
//! Completed | Failed`. Transitions only move forward; attempts to go
//! backward are dropped. Reaching a terminal state removes the session from
//! the active set, but its transition history stays available to
//! diagnostics through a bounded recent list.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

/// Completed sessions kept around for `/diagnostics`.
const RECENT_KEEP: usize = 20;

/// Pipeline stage of one acquisition request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Starting,
    Searching(String),
    Extracting(String),
    Aggregating,
    Completed,
    Failed,
}

impl SessionState {
    /// Ordering rank; transitions may never decrease it. Searching and
    /// Extracting share a rank because concurrent sources interleave them.
    fn rank(&self) -> u8 {
        match self {
            Self::Starting => 0,
            Self::Searching(_) | Self::Extracting(_) => 1,
            Self::Aggregating => 2,
            Self::Completed | Self::Failed => 3,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn label(&self) -> String {
        match self {
            Self::Starting => "starting".to_string(),
            Self::Searching(source) => format!("searching:{source}"),
            Self::Extracting(url) => format!("extracting:{url}"),
            Self::Aggregating => "aggregating".to_string(),
            Self::Completed => "completed".to_string(),
            Self::Failed => "failed".to_string(),
        }
    }
}

/// One recorded state transition.
#[derive(Debug, Clone, Serialize)]
pub struct Transition {
    pub state: String,
    pub at: DateTime<Utc>,
}

/// Ephemeral per-request tracking record.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: String,
    pub query: String,
    pub source_hint: Option<String>,
    #[serde(skip)]
    pub state: SessionState,
    pub started_at: DateTime<Utc>,
    pub history: Vec<Transition>,
    pub snapshots: Vec<String>,
}

impl Session {
    fn new(query: &str, source_hint: Option<&str>) -> Self {
        let state = SessionState::Starting;
        Self {
            id: Uuid::new_v4().to_string(),
            query: query.to_string(),
            source_hint: source_hint.map(String::from),
            started_at: Utc::now(),
            history: vec![Transition {
                state: state.label(),
                at: Utc::now(),
            }],
            state,
            snapshots: Vec::new(),
        }
    }
}

/// Tracks active sessions in a concurrent map keyed by generated id.
pub struct SessionTracker {
    active: DashMap<String, Session>,
    recent: Mutex<VecDeque<Session>>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self {
            active: DashMap::new(),
            recent: Mutex::new(VecDeque::new()),
        }
    }

    /// Create a session and return its id.
    pub fn start(&self, query: &str, source_hint: Option<&str>) -> String {
        let session = Session::new(query, source_hint);
        let id = session.id.clone();
        self.active.insert(id.clone(), session);
        id
    }

    /// Attempt a transition. Backward attempts and transitions on unknown or
    /// already-terminal sessions are dropped; returns whether the transition
    /// was recorded. A terminal transition moves the session out of the
    /// active set.
    pub fn advance(&self, id: &str, state: SessionState) -> bool {
        let finished = {
            let Some(mut session) = self.active.get_mut(id) else {
                return false;
            };
            if session.state.is_terminal() || state.rank() < session.state.rank() {
                return false;
            }
            session.history.push(Transition {
                state: state.label(),
                at: Utc::now(),
            });
            session.state = state;
            session.state.is_terminal()
        };

        if finished {
            if let Some((_, session)) = self.active.remove(id) {
                self.remember(session);
            }
        }
        true
    }

    /// Mark a session completed.
    pub fn complete(&self, id: &str) {
        self.advance(id, SessionState::Completed);
    }

    /// Mark a session failed.
    pub fn fail(&self, id: &str) {
        self.advance(id, SessionState::Failed);
    }

    /// Record a snapshot reference on a live session.
    pub fn attach_snapshot(&self, id: &str, path: &str) {
        if let Some(mut session) = self.active.get_mut(id) {
            session.snapshots.push(path.to_string());
        }
    }

    /// Number of live (non-terminal) sessions.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Fail out sessions that have been live longer than `max_age`.
    /// A stuck request should not pin registry memory forever.
    pub fn sweep_stale(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now() - chrono::Duration::from_std(max_age).unwrap_or_default();
        let stale: Vec<String> = self
            .active
            .iter()
            .filter(|entry| entry.started_at < cutoff)
            .map(|entry| entry.id.clone())
            .collect();
        for id in &stale {
            tracing::warn!("failing stale session {id}");
            self.fail(id);
        }
        stale.len()
    }

    /// Snapshot of active sessions plus recent history, for `/diagnostics`.
    pub fn diagnostics(&self) -> serde_json::Value {
        let active: Vec<serde_json::Value> = self
            .active
            .iter()
            .map(|entry| session_json(&entry, entry.state.label()))
            .collect();
        let recent: Vec<serde_json::Value> = self
            .recent
            .lock()
            .map(|r| {
                r.iter()
                    .map(|s| session_json(s, s.state.label()))
                    .collect()
            })
            .unwrap_or_default();
        serde_json::json!({ "active": active, "recent": recent })
    }

    fn remember(&self, session: Session) {
        if let Ok(mut recent) = self.recent.lock() {
            recent.push_back(session);
            while recent.len() > RECENT_KEEP {
                recent.pop_front();
            }
        }
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn session_json(session: &Session, state: String) -> serde_json::Value {
    serde_json::json!({
        "id": session.id,
        "query": session.query,
        "sourceHint": session.source_hint,
        "state": state,
        "startedAt": session.started_at.to_rfc3339(),
        "history": session.history,
        "snapshots": session.snapshots,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions_recorded() {
        let tracker = SessionTracker::new();
        let id = tracker.start("fog", None);

        assert!(tracker.advance(&id, SessionState::Searching("duckduckgo".into())));
        assert!(tracker.advance(&id, SessionState::Extracting("https://a".into())));
        assert!(tracker.advance(&id, SessionState::Aggregating));
        assert_eq!(tracker.active_count(), 1);

        tracker.complete(&id);
        assert_eq!(tracker.active_count(), 0);
    }

    #[test]
    fn test_backward_transition_dropped() {
        let tracker = SessionTracker::new();
        let id = tracker.start("fog", None);
        assert!(tracker.advance(&id, SessionState::Aggregating));
        // Aggregating → Searching would go backward
        assert!(!tracker.advance(&id, SessionState::Searching("bing".into())));
    }

    #[test]
    fn test_terminal_state_absorbs() {
        let tracker = SessionTracker::new();
        let id = tracker.start("fog", None);
        tracker.fail(&id);
        assert!(!tracker.advance(&id, SessionState::Aggregating));
        assert!(!tracker.advance(&id, SessionState::Completed));
    }

    #[test]
    fn test_searching_and_extracting_interleave() {
        // Concurrent sources produce interleaved same-rank transitions
        let tracker = SessionTracker::new();
        let id = tracker.start("fog", None);
        assert!(tracker.advance(&id, SessionState::Searching("duckduckgo".into())));
        assert!(tracker.advance(&id, SessionState::Extracting("https://a".into())));
        assert!(tracker.advance(&id, SessionState::Searching("bing".into())));
    }

    #[test]
    fn test_history_survives_completion() {
        let tracker = SessionTracker::new();
        let id = tracker.start("fog", Some("remote"));
        tracker.advance(&id, SessionState::Searching("brave".into()));
        tracker.complete(&id);

        let diag = tracker.diagnostics();
        let recent = diag["recent"].as_array().unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0]["id"], id.as_str());
        let history = recent[0]["history"].as_array().unwrap();
        // starting, searching, completed
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_sweep_stale_fails_old_sessions() {
        let tracker = SessionTracker::new();
        let id = tracker.start("fog", None);
        // Zero max age: everything is stale
        assert_eq!(tracker.sweep_stale(Duration::from_secs(0)), 1);
        assert_eq!(tracker.active_count(), 0);
        let _ = id;
    }
}
