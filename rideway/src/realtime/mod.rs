//! Real-time delivery to connected riders and captains.
//!
//! Each WebSocket session owns a bounded outbound channel. After the client sends `join`, the
//! session registers that channel in the [`Hub`] under its account, and any request handler can
//! then push events to that account with [`Hub::send`]. Sends never wait: when the recipient is
//! not connected or its channel is full the event is dropped and a warning is logged.
//!
//! One account holds at most one registration. A newer connection replaces an older one, and the
//! older session's disconnect does not remove the newer registration.

pub mod messages;
pub mod session;

use dashmap::DashMap;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::types::{AccountKind, abbrev_uuid};
pub use messages::{ClientEvent, ServerEvent};

/// Key a connection is registered under
pub type AccountKey = (AccountKind, Uuid);

#[derive(Debug)]
struct Registration {
    connection_id: u64,
    sender: mpsc::Sender<String>,
}

/// Registry of live socket connections, keyed by account.
#[derive(Debug, Clone, Default)]
pub struct Hub {
    connections: Arc<DashMap<AccountKey, Registration>>,
    next_connection_id: Arc<AtomicU64>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifier for a new session, used to tell its registration apart from later ones.
    pub fn next_connection_id(&self) -> u64 {
        self.next_connection_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Route events for `key` to `sender`, replacing any earlier registration.
    pub fn register(&self, key: AccountKey, connection_id: u64, sender: mpsc::Sender<String>) {
        let previous = self.connections.insert(key, Registration { connection_id, sender });
        if previous.is_some() {
            debug!("Replaced socket registration for {} {}", key.0, abbrev_uuid(&key.1));
        }
        metrics::gauge!("rideway_socket_registrations").set(self.connections.len() as f64);
    }

    /// Remove the registration for `key` if it still belongs to `connection_id`.
    ///
    /// Returns whether anything was removed.
    pub fn unregister(&self, key: AccountKey, connection_id: u64) -> bool {
        let removed = self
            .connections
            .remove_if(&key, |_, registration| registration.connection_id == connection_id)
            .is_some();
        metrics::gauge!("rideway_socket_registrations").set(self.connections.len() as f64);
        removed
    }

    pub fn is_connected(&self, kind: AccountKind, id: Uuid) -> bool {
        self.connections.contains_key(&(kind, id))
    }

    /// Number of registered connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Queue `event` for an account. Returns whether it was queued.
    pub fn send(&self, kind: AccountKind, id: Uuid, event: &ServerEvent) -> bool {
        let Some(sender) = self.connections.get(&(kind, id)).map(|r| r.sender.clone()) else {
            debug!("No socket for {} {}, dropping {}", kind, abbrev_uuid(&id), event.name());
            return false;
        };

        let frame = match serde_json::to_string(event) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to serialize {} event: {}", event.name(), e);
                return false;
            }
        };

        match sender.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Socket for {} {} is not keeping up, dropping {}", kind, abbrev_uuid(&id), event.name());
                metrics::counter!("rideway_socket_events_dropped_total", "reason" => "full").increment(1);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Socket for {} {} is closed, dropping {}", kind, abbrev_uuid(&id), event.name());
                metrics::counter!("rideway_socket_events_dropped_total", "reason" => "closed").increment(1);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::messages::ErrorPayload;

    fn error_event(message: &str) -> ServerEvent {
        ServerEvent::Error(ErrorPayload {
            message: message.to_string(),
        })
    }

    #[tokio::test]
    async fn test_send_reaches_registered_account() {
        let hub = Hub::new();
        let captain = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel(4);
        hub.register((AccountKind::Captain, captain), hub.next_connection_id(), tx);

        assert!(hub.send(AccountKind::Captain, captain, &error_event("hello")));
        let frame = rx.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["event"], "error");
        assert_eq!(value["data"]["message"], "hello");

        // Same id under the other account kind is a different recipient
        assert!(!hub.send(AccountKind::User, captain, &error_event("nope")));
    }

    #[tokio::test]
    async fn test_full_channel_drops_without_blocking() {
        let hub = Hub::new();
        let user = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel(1);
        hub.register((AccountKind::User, user), hub.next_connection_id(), tx);

        assert!(hub.send(AccountKind::User, user, &error_event("first")));
        assert!(!hub.send(AccountKind::User, user, &error_event("second")));

        assert!(rx.recv().await.unwrap().contains("first"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_receiver_is_reported() {
        let hub = Hub::new();
        let user = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(1);
        hub.register((AccountKind::User, user), hub.next_connection_id(), tx);
        drop(rx);

        assert!(!hub.send(AccountKind::User, user, &error_event("gone")));
    }

    #[test]
    fn test_stale_session_does_not_remove_newer_registration() {
        let hub = Hub::new();
        let key = (AccountKind::Captain, Uuid::new_v4());

        let old = hub.next_connection_id();
        let (old_tx, _old_rx) = mpsc::channel(1);
        hub.register(key, old, old_tx);

        let new = hub.next_connection_id();
        let (new_tx, _new_rx) = mpsc::channel(1);
        hub.register(key, new, new_tx);

        assert!(!hub.unregister(key, old));
        assert!(hub.is_connected(key.0, key.1));
        assert!(hub.unregister(key, new));
        assert!(hub.is_empty());
    }
}
