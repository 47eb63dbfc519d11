//! In-process registry of open live connections, keyed by user.

pub mod socket;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::geo::Coordinates;

/// Transport side of a live connection.
pub trait ConnectionHandle: Send + Sync {
    fn connection_id(&self) -> String;

    fn emit(&self, event: &str, payload: &serde_json::Value) -> Result<(), String>;
}

#[derive(Clone)]
pub struct LiveConnection {
    pub user_id: Uuid,
    pub handle: Arc<dyn ConnectionHandle>,
    pub last_known_location: Option<Coordinates>,
    pub connected_at: DateTime<Utc>,
}

/// One live connection per user. A second authentication for the same
/// user replaces the first (last writer wins).
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<Uuid, LiveConnection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the connection this one replaced, if any.
    pub fn register(&self, user_id: Uuid, handle: Arc<dyn ConnectionHandle>) -> Option<LiveConnection> {
        let connection_id = handle.connection_id();
        let replaced = self.connections.insert(
            user_id,
            LiveConnection {
                user_id,
                handle,
                last_known_location: None,
                connected_at: Utc::now(),
            },
        );

        match &replaced {
            Some(old) if old.handle.connection_id() != connection_id => {
                tracing::warn!(
                    user_id = %user_id,
                    old_connection = %old.handle.connection_id(),
                    new_connection = %connection_id,
                    "live connection replaced by newer session"
                );
            }
            _ => tracing::debug!(user_id = %user_id, connection = %connection_id, "live connection registered"),
        }

        replaced
    }

    /// Remove the user's entry only if `connection_id` is still the registered one.
    pub fn unregister(&self, user_id: Uuid, connection_id: &str) -> bool {
        let removed = self
            .connections
            .remove_if(&user_id, |_, conn| conn.handle.connection_id() == connection_id)
            .is_some();

        if removed {
            tracing::debug!(user_id = %user_id, connection = %connection_id, "live connection removed");
        }
        removed
    }

    pub fn update_location(&self, user_id: Uuid, location: Coordinates) -> bool {
        match self.connections.get_mut(&user_id) {
            Some(mut conn) => {
                conn.last_known_location = Some(location);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, user_id: Uuid) -> Option<LiveConnection> {
        self.connections.get(&user_id).map(|c| c.clone())
    }

    pub fn is_connected(&self, user_id: Uuid) -> bool {
        self.connections.contains_key(&user_id)
    }

    /// Emit to the user's connection if there is one. Returns whether the emit went out.
    pub fn emit_to(&self, user_id: Uuid, event: &str, payload: &serde_json::Value) -> bool {
        // Clone the handle out so no shard lock is held during the emit.
        let Some(handle) = self.connections.get(&user_id).map(|c| c.handle.clone()) else {
            return false;
        };

        match handle.emit(event, payload) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(user_id = %user_id, event = %event, error = %e, "live emit failed");
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingHandle;

    #[test]
    fn reauthentication_replaces_previous_connection() {
        let registry = ConnectionRegistry::new();
        let user = Uuid::new_v4();
        let first = Arc::new(RecordingHandle::new("conn-1"));
        let second = Arc::new(RecordingHandle::new("conn-2"));

        assert!(registry.register(user, first.clone()).is_none());
        let replaced = registry.register(user, second.clone()).unwrap();
        assert_eq!(replaced.handle.connection_id(), "conn-1");

        assert!(registry.emit_to(user, "new_like", &serde_json::json!({})));
        assert!(first.emitted().is_empty());
        assert_eq!(second.emitted().len(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn stale_disconnect_keeps_newer_connection() {
        let registry = ConnectionRegistry::new();
        let user = Uuid::new_v4();
        registry.register(user, Arc::new(RecordingHandle::new("conn-1")));
        registry.register(user, Arc::new(RecordingHandle::new("conn-2")));

        assert!(!registry.unregister(user, "conn-1"));
        assert!(registry.is_connected(user));
        assert!(registry.unregister(user, "conn-2"));
        assert!(!registry.is_connected(user));
    }

    #[test]
    fn emit_to_offline_user_is_noop() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.emit_to(Uuid::new_v4(), "new_like", &serde_json::json!({})));
    }

    #[test]
    fn failed_emit_reports_false() {
        let registry = ConnectionRegistry::new();
        let user = Uuid::new_v4();
        let handle = Arc::new(RecordingHandle::new("conn-1"));
        handle.fail_emits();
        registry.register(user, handle);

        assert!(!registry.emit_to(user, "new_like", &serde_json::json!({})));
    }

    #[test]
    fn tracks_last_known_location() {
        let registry = ConnectionRegistry::new();
        let user = Uuid::new_v4();
        let here = Coordinates::new(48.85, 2.35).unwrap();

        assert!(!registry.update_location(user, here));
        registry.register(user, Arc::new(RecordingHandle::new("conn-1")));
        assert!(registry.update_location(user, here));
        assert_eq!(registry.get(user).unwrap().last_known_location, Some(here));
    }
}
