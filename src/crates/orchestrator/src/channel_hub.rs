//! Multiplexed bidirectional live-channel transport (spec §4.8).
//!
//! Session handles are stored in a lock-free concurrent map so a `send` can
//! never block behind connection churn elsewhere in the hub — the same
//! "don't hold a transport-specific lock while invoking a handle's send
//! primitive" requirement the teacher's websocket connection pool satisfies
//! with `DashMap` + atomics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of client holding a live channel session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    Editor,
    Web,
    Cli,
}

/// Wire frame exchanged in both directions over a live channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelFrame {
    pub event: String,
    pub data: Value,
}

/// Close codes used by the hub (spec §6): 1000 clean shutdown, 1008 auth
/// failure.
pub const CLOSE_NORMAL: u16 = 1000;
pub const CLOSE_AUTH_FAILED: u16 = 1008;

/// A transport-agnostic handle to one connected session. Implementations
/// wrap a websocket, an in-process channel, or anything that can deliver
/// text frames and be closed.
pub trait SessionHandle: Send + Sync + std::fmt::Debug {
    fn send(&self, text: &str) -> Result<(), String>;
    fn close(&self, code: u16);
}

struct Session {
    client_type: ClientType,
    handle: Arc<dyn SessionHandle>,
    connected_at: i64,
    last_activity: Arc<AtomicU64>,
    metadata: Value,
}

/// Connections for one user, indexed by `connection_id`.
type UserSessions = DashMap<String, Session>;

/// Live channel hub: `user_id -> connection_id -> session`.
///
/// Grounded on the teacher's `ConnectionPool` (DashMap + atomic counters for
/// lock-free reads under registration churn), generalized from a single flat
/// pool to a per-user session map as the approval protocol requires.
pub struct LiveChannelHub {
    sessions: DashMap<String, Arc<UserSessions>>,
    total_registered: AtomicU64,
}

impl Default for LiveChannelHub {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveChannelHub {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            total_registered: AtomicU64::new(0),
        }
    }

    pub fn register_client(
        &self,
        user_id: &str,
        client_type: ClientType,
        connection_id: &str,
        metadata: Value,
        handle: Arc<dyn SessionHandle>,
    ) {
        let user_sessions = self
            .sessions
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(DashMap::new()))
            .clone();

        user_sessions.insert(
            connection_id.to_string(),
            Session {
                client_type,
                handle,
                connected_at: chrono::Utc::now().timestamp(),
                last_activity: Arc::new(AtomicU64::new(chrono::Utc::now().timestamp() as u64)),
                metadata,
            },
        );
        self.total_registered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn unregister_client(&self, user_id: &str, connection_id: &str) {
        if let Some(user_sessions) = self.sessions.get(user_id) {
            if let Some((_, session)) = user_sessions.remove(connection_id) {
                session.handle.close(CLOSE_NORMAL);
            }
        }
    }

    pub fn is_connected(&self, user_id: &str, client_type: Option<ClientType>) -> bool {
        let Some(user_sessions) = self.sessions.get(user_id) else {
            return false;
        };
        match client_type {
            None => !user_sessions.is_empty(),
            Some(wanted) => user_sessions.iter().any(|s| s.client_type == wanted),
        }
    }

    /// Deliver `event`/`data` to every session for `user_id` matching
    /// `client_type` (or all, when `None`). Silently drops if none match —
    /// the approval protocol treats "no open session" as expected, not an
    /// error.
    pub fn send_to_user(
        &self,
        user_id: &str,
        client_type: Option<ClientType>,
        event: &str,
        data: Value,
    ) {
        let Some(user_sessions) = self.sessions.get(user_id) else {
            return;
        };
        let frame = ChannelFrame {
            event: event.to_string(),
            data,
        };
        let Ok(text) = serde_json::to_string(&frame) else {
            return;
        };

        // Collect handles first so we never hold the map's read guard while
        // invoking a handle's `send`, which may block on I/O.
        let targets: Vec<Arc<dyn SessionHandle>> = user_sessions
            .iter()
            .filter(|s| client_type.map(|wanted| s.client_type == wanted).unwrap_or(true))
            .map(|s| s.handle.clone())
            .collect();

        for handle in targets {
            if let Err(err) = handle.send(&text) {
                tracing::warn!(user_id, event, error = %err, "failed to deliver live channel frame");
            }
        }
    }

    /// Best-effort delivery to every open session across every user.
    pub fn broadcast(&self, event: &str, data: Value) {
        let frame = ChannelFrame {
            event: event.to_string(),
            data,
        };
        let Ok(text) = serde_json::to_string(&frame) else {
            return;
        };
        let targets: Vec<Arc<dyn SessionHandle>> = self
            .sessions
            .iter()
            .flat_map(|entry| entry.value().iter().map(|s| s.handle.clone()).collect::<Vec<_>>())
            .collect();
        for handle in targets {
            let _ = handle.send(&text);
        }
    }

    /// Total open connections across every user, exported as a gauge.
    pub fn active_connections(&self) -> usize {
        self.sessions.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn total_registered(&self) -> u64 {
        self.total_registered.load(Ordering::Relaxed)
    }
}
