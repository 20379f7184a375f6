pub mod actor;
pub mod broadcast;
pub mod handler;
pub mod protocol;

use dashmap::DashMap;
use tokio::sync::mpsc;

/// Type alias for the sender half of a WebSocket connection's channel.
/// Other parts of the system can clone this to push messages to a specific client.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;

/// Connection registry: tracks the active WebSocket connection per user.
/// One entry per user — a second connection for the same user overwrites
/// the first (last writer wins), orphaning the earlier handle.
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: DashMap<String, ConnectionSender>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Register a connection for a user, unconditionally replacing any
    /// existing entry.
    pub fn put(&self, user_id: &str, handle: ConnectionSender) {
        self.inner.insert(user_id.to_string(), handle);
    }

    /// Remove a user's entry. No-op when absent.
    pub fn remove(&self, user_id: &str) {
        self.inner.remove(user_id);
    }

    /// Remove a user's entry only if it still holds the given handle.
    /// An orphaned connection tearing down must not knock a newer
    /// connection for the same user offline.
    pub fn remove_if_same(&self, user_id: &str, handle: &ConnectionSender) -> bool {
        self.inner
            .remove_if(user_id, |_, current| current.same_channel(handle))
            .is_some()
    }

    /// Clone the sender for a user's connection, if one is registered.
    pub fn get(&self, user_id: &str) -> Option<ConnectionSender> {
        self.inner.get(user_id).map(|entry| entry.value().clone())
    }

    /// The online-set: ids of all users with a registered connection.
    pub fn snapshot(&self) -> Vec<String> {
        self.inner.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Visit every registered connection.
    pub fn for_each(&self, mut f: impl FnMut(&str, &ConnectionSender)) {
        for entry in self.inner.iter() {
            f(entry.key(), entry.value());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> ConnectionSender {
        mpsc::unbounded_channel().0
    }

    #[test]
    fn put_is_idempotent_per_user() {
        let registry = ConnectionRegistry::new();
        registry.put("u1", sender());
        let first = registry.snapshot();
        registry.put("u1", sender());
        let second = registry.snapshot();
        assert_eq!(first, vec!["u1".to_string()]);
        assert_eq!(second, first);
    }

    #[test]
    fn remove_is_noop_when_absent() {
        let registry = ConnectionRegistry::new();
        registry.put("u1", sender());
        registry.remove("u2");
        assert_eq!(registry.snapshot(), vec!["u1".to_string()]);
    }

    #[test]
    fn snapshot_reflects_connects_and_disconnects() {
        let registry = ConnectionRegistry::new();
        for id in ["a", "b", "c"] {
            registry.put(id, sender());
        }
        registry.remove("b");
        let mut online = registry.snapshot();
        online.sort();
        assert_eq!(online, vec!["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn last_writer_wins_and_guarded_removal_spares_newer_handle() {
        let registry = ConnectionRegistry::new();
        let (old_tx, _old_rx) = mpsc::unbounded_channel();
        let (new_tx, _new_rx) = mpsc::unbounded_channel();

        registry.put("u1", old_tx.clone());
        registry.put("u1", new_tx.clone());

        // The orphaned old handle must not remove the newer entry.
        assert!(!registry.remove_if_same("u1", &old_tx));
        assert_eq!(registry.snapshot(), vec!["u1".to_string()]);

        // The live handle removes its own entry.
        assert!(registry.remove_if_same("u1", &new_tx));
        assert!(registry.snapshot().is_empty());
    }
}
