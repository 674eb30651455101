//! An in-memory node, for exercising the protocol without Redis.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::time::{self, Instant};

use crate::{
    scripts::{DELETE_IF_VALUE_MATCHES, EXPIRE_IF_VALUE_MATCHES},
    Conn, NodeError, Pool, Script,
};

#[derive(Debug, Clone)]
struct Entry {
    value:      String,
    expires_at: Option<Instant>,
}

#[derive(Debug, Default)]
struct MemoryNode {
    entries:      Mutex<HashMap<String, Entry>>,
    latency:      Mutex<Option<Duration>>,
    disconnected: AtomicBool,
    calls:        AtomicUsize,
}

impl MemoryNode {
    #[inline]
    fn with_entries<T>(&self, f: impl FnOnce(&mut HashMap<String, Entry>, Instant) -> T) -> T {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();

        entries.retain(|_, entry| entry.expires_at.map_or(true, |expires_at| expires_at > now));

        f(&mut entries, now)
    }

    #[inline]
    fn check_connected(&self) -> Result<(), NodeError> {
        if self.disconnected.load(Ordering::Relaxed) {
            Err(NodeError::Unavailable(String::from("connection refused")))
        } else {
            Ok(())
        }
    }
}

/// A node which keeps its keys in memory and expires them against the Tokio clock.
///
/// Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryPool {
    node: Arc<MemoryNode>,
}

impl MemoryPool {
    /// Creates an empty, connected node.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following call fail with [`NodeError::Unavailable`].
    #[inline]
    pub fn disconnect(&self) {
        self.node.disconnected.store(true, Ordering::Relaxed);
    }

    /// Undoes [`MemoryPool::disconnect`]. Keys written before the disconnect are kept.
    #[inline]
    pub fn reconnect(&self) {
        self.node.disconnected.store(false, Ordering::Relaxed);
    }

    /// Delays every connection handed out by this pool.
    #[inline]
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.node.latency.lock().unwrap_or_else(|e| e.into_inner()) = latency;
    }

    /// The number of connections requested so far, including refused ones.
    #[inline]
    pub fn calls(&self) -> usize {
        self.node.calls.load(Ordering::Relaxed)
    }

    /// Reads a live value directly, bypassing connectivity.
    pub fn value(&self, key: &str) -> Option<String> {
        self.node.with_entries(|entries, _| entries.get(key).map(|entry| entry.value.clone()))
    }

    /// Reads the remaining TTL of a live key directly, bypassing connectivity.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        self.node.with_entries(|entries, now| {
            entries.get(key).and_then(|entry| entry.expires_at).map(|expires_at| expires_at - now)
        })
    }

    /// Writes a value directly, bypassing connectivity.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>, ttl: Option<Duration>) {
        self.node.with_entries(|entries, now| {
            entries.insert(key.into(), Entry {
                value:      value.into(),
                expires_at: ttl.map(|ttl| now + ttl),
            });
        });
    }
}

#[async_trait]
impl Pool for MemoryPool {
    async fn get(&self) -> Result<Box<dyn Conn>, NodeError> {
        self.node.calls.fetch_add(1, Ordering::Relaxed);
        self.node.check_connected()?;

        let latency = *self.node.latency.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(latency) = latency {
            time::sleep(latency).await;
        }

        Ok(Box::new(MemoryConn {
            node: self.node.clone(),
        }))
    }
}

struct MemoryConn {
    node: Arc<MemoryNode>,
}

#[async_trait]
impl Conn for MemoryConn {
    async fn get(&mut self, key: &str) -> Result<Option<String>, NodeError> {
        self.node.check_connected()?;

        Ok(self.node.with_entries(|entries, _| entries.get(key).map(|entry| entry.value.clone())))
    }

    async fn set(&mut self, key: &str, value: &str) -> Result<bool, NodeError> {
        self.node.check_connected()?;

        self.node.with_entries(|entries, _| {
            entries.insert(key.to_string(), Entry {
                value:      value.to_string(),
                expires_at: None,
            });
        });

        Ok(true)
    }

    async fn set_nx(
        &mut self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, NodeError> {
        self.node.check_connected()?;

        Ok(self.node.with_entries(|entries, now| {
            if entries.contains_key(key) {
                return false;
            }

            entries.insert(key.to_string(), Entry {
                value:      value.to_string(),
                expires_at: Some(now + ttl),
            });

            true
        }))
    }

    async fn eval(
        &mut self,
        script: &Script,
        keys: &[&str],
        args: &[&str],
    ) -> Result<i64, NodeError> {
        self.node.check_connected()?;

        let (Some(key), Some(token)) = (keys.first(), args.first()) else {
            return Err(NodeError::Rejected(String::from("wrong number of keys or arguments")));
        };

        let hash = script.hash();

        if hash == DELETE_IF_VALUE_MATCHES.hash() {
            Ok(self.node.with_entries(|entries, _| {
                if entries.get(*key).is_some_and(|entry| entry.value == *token) {
                    entries.remove(*key);

                    1
                } else {
                    0
                }
            }))
        } else if hash == EXPIRE_IF_VALUE_MATCHES.hash() {
            let ttl = args
                .get(1)
                .and_then(|ttl| ttl.parse::<u64>().ok())
                .map(Duration::from_millis)
                .ok_or_else(|| NodeError::Rejected(String::from("value is not an integer")))?;

            Ok(self.node.with_entries(|entries, now| match entries.get_mut(*key) {
                Some(entry) if entry.value == *token => {
                    entry.expires_at = Some(now + ttl);

                    1
                },
                _ => 0,
            }))
        } else {
            Err(NodeError::UnknownScript(hash.to_string()))
        }
    }

    async fn pttl(&mut self, key: &str) -> Result<Option<Duration>, NodeError> {
        self.node.check_connected()?;

        Ok(self.node.with_entries(|entries, now| {
            entries.get(key).and_then(|entry| entry.expires_at).map(|expires_at| expires_at - now)
        }))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_set_nx_respects_existing_keys_and_ttl() {
        let pool = MemoryPool::new();
        let mut conn = pool.get().await.unwrap();

        assert!(conn.set_nx("k", "a", Duration::from_secs(1)).await.unwrap());
        assert!(!conn.set_nx("k", "b", Duration::from_secs(1)).await.unwrap());
        assert_eq!(Some(String::from("a")), conn.get("k").await.unwrap());

        time::advance(Duration::from_millis(1001)).await;

        assert_eq!(None, conn.get("k").await.unwrap());
        assert!(conn.set_nx("k", "b", Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_set_clears_ttl() {
        let pool = MemoryPool::new();
        let mut conn = pool.get().await.unwrap();

        assert!(conn.set_nx("k", "a", Duration::from_secs(5)).await.unwrap());
        assert!(conn.pttl("k").await.unwrap().is_some());

        assert!(conn.set("k", "b").await.unwrap());
        assert_eq!(None, conn.pttl("k").await.unwrap());
        assert_eq!(Some(String::from("b")), pool.value("k"));
    }

    #[tokio::test]
    async fn test_unknown_script_is_an_error() {
        let pool = MemoryPool::new();
        let mut conn = pool.get().await.unwrap();

        let script = Script::new(1, "return 1");

        assert!(matches!(
            conn.eval(&script, &["k"], &["v"]).await,
            Err(NodeError::UnknownScript(_))
        ));
    }

    #[tokio::test]
    async fn test_disconnected_node_refuses_connections() {
        let pool = MemoryPool::new();

        pool.disconnect();

        assert!(matches!(pool.get().await, Err(NodeError::Unavailable(_))));

        pool.reconnect();

        assert!(pool.get().await.is_ok());
        assert_eq!(2, pool.calls());
    }
}
