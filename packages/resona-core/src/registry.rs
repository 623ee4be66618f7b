//! Registry of configured device sessions.
//!
//! The registry is owned by the process's composition root and passed by
//! reference to whatever needs it - there is no global device map. Removal
//! tears the session down; `connect_all`/`disconnect_all` implement the
//! host's standby enter/exit semantics across every configured receiver.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::join_all;

use crate::session::DeviceSession;

/// Maps stable device ids to their sessions.
#[derive(Default)]
pub struct DeviceRegistry {
    sessions: DashMap<String, Arc<DeviceSession>>,
}

impl DeviceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session under its device id, returning the session it
    /// replaced (if any). The caller shuts a replaced session down.
    pub fn insert(&self, session: Arc<DeviceSession>) -> Option<Arc<DeviceSession>> {
        self.sessions.insert(session.id().to_string(), session)
    }

    /// Looks a session up by device id.
    pub fn get(&self, id: &str) -> Option<Arc<DeviceSession>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Whether a session is registered for this id.
    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Snapshot of all registered sessions.
    pub fn sessions(&self) -> Vec<Arc<DeviceSession>> {
        self.sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Removes a session and shuts it down. Returns whether it existed.
    pub async fn remove(&self, id: &str) -> bool {
        match self.sessions.remove(id) {
            Some((_, session)) => {
                session.shutdown().await;
                true
            }
            None => false,
        }
    }

    /// Connects every registered session.
    ///
    /// Sessions that are already available only re-announce `Connected`, so
    /// a returning host learns their state without a connection churn.
    pub async fn connect_all(&self) {
        let sessions = self.sessions();
        join_all(sessions.iter().map(|session| async move {
            if session.is_available() {
                log::debug!("[{}] already connected, announcing state", session.id());
                session.announce_connected();
            } else {
                session.connect().await;
            }
        }))
        .await;
    }

    /// Disconnects every registered session (host entered standby).
    pub async fn disconnect_all(&self) {
        let sessions = self.sessions();
        join_all(sessions.iter().map(|session| session.disconnect())).await;
    }
}
