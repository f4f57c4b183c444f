//! Sticky-session affinity between instances and backend shards.
//!
//! The load balancer pins an instance to the shard that created it by issuing
//! a sticky cookie. Every later request for that instance must replay the
//! cookie, otherwise it is routed to a shard that knows nothing about it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Load-balancer cookie binding a client to one shard.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StickyCookie {
    pub name: String,
    pub value: String,
}

impl StickyCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Value for a `Cookie` request header.
    pub fn header_value(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

impl fmt::Display for StickyCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Concurrent map of instance id to sticky cookie.
///
/// Cloning is cheap and clones share the same entries. Each mutation is atomic
/// on its own; sequences of operations are not.
#[derive(Debug, Clone, Default)]
pub struct AffinityStore {
    entries: Arc<RwLock<HashMap<String, StickyCookie>>>,
}

impl AffinityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an instance to a cookie, replacing any previous binding.
    pub async fn put(&self, instance_id: &str, cookie: StickyCookie) {
        let mut entries = self.entries.write().await;
        entries.insert(instance_id.to_string(), cookie);
    }

    /// Bind an instance only if it has no binding yet.
    ///
    /// Returns `true` if the entry was inserted.
    pub async fn insert_if_absent(&self, instance_id: &str, cookie: StickyCookie) -> bool {
        let mut entries = self.entries.write().await;
        if entries.contains_key(instance_id) {
            return false;
        }
        entries.insert(instance_id.to_string(), cookie);
        true
    }

    pub async fn get(&self, instance_id: &str) -> Option<StickyCookie> {
        let entries = self.entries.read().await;
        entries.get(instance_id).cloned()
    }

    /// Drop the binding for an instance. Removing an unknown id is a no-op.
    pub async fn remove(&self, instance_id: &str) -> Option<StickyCookie> {
        let mut entries = self.entries.write().await;
        entries.remove(instance_id)
    }

    pub async fn contains(&self, instance_id: &str) -> bool {
        self.entries.read().await.contains_key(instance_id)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_header_value() {
        let cookie = StickyCookie::new("SERVERID", "c2");
        assert_eq!(cookie.header_value(), "SERVERID=c2");
        assert_eq!(cookie.to_string(), "SERVERID=c2");
    }

    #[tokio::test]
    async fn test_put_get_remove() {
        let store = AffinityStore::new();
        store.put("abc123", StickyCookie::new("SERVERID", "c2")).await;

        assert_eq!(
            store.get("abc123").await,
            Some(StickyCookie::new("SERVERID", "c2"))
        );
        assert_eq!(store.len().await, 1);

        let removed = store.remove("abc123").await;
        assert_eq!(removed, Some(StickyCookie::new("SERVERID", "c2")));
        assert!(store.get("abc123").await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let store = AffinityStore::new();
        assert!(store.remove("never-added").await.is_none());

        store.put("abc123", StickyCookie::new("SERVERID", "c1")).await;
        assert!(store.remove("abc123").await.is_some());
        assert!(store.remove("abc123").await.is_none());
    }

    #[tokio::test]
    async fn test_put_replaces_single_entry() {
        let store = AffinityStore::new();
        store.put("abc123", StickyCookie::new("SERVERID", "c1")).await;
        store.put("abc123", StickyCookie::new("SERVERID", "c3")).await;

        assert_eq!(store.len().await, 1);
        assert_eq!(
            store.get("abc123").await.map(|c| c.value),
            Some("c3".to_string())
        );
    }

    #[tokio::test]
    async fn test_insert_if_absent_keeps_existing() {
        let store = AffinityStore::new();
        store.put("abc123", StickyCookie::new("SERVERID", "c2")).await;

        let inserted = store
            .insert_if_absent("abc123", StickyCookie::new("SERVERID", "c4"))
            .await;
        assert!(!inserted);
        assert_eq!(
            store.get("abc123").await.map(|c| c.value),
            Some("c2".to_string())
        );

        assert!(
            store
                .insert_if_absent("def456", StickyCookie::new("SERVERID", "c4"))
                .await
        );
        assert!(store.contains("def456").await);
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let store = AffinityStore::new();
        let other = store.clone();
        other.put("abc123", StickyCookie::new("SERVERID", "c1")).await;

        assert!(store.contains("abc123").await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_puts_and_removes() {
        let store = AffinityStore::new();

        let mut handles = Vec::new();
        for i in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let id = format!("instance-{i}");
                store.put(&id, StickyCookie::new("SERVERID", "c1")).await;
                if i % 2 == 0 {
                    store.remove(&id).await;
                    store.remove(&id).await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.len().await, 25);
        assert!(store.contains("instance-1").await);
        assert!(!store.contains("instance-0").await);
    }
}
