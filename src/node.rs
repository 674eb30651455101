use std::time::Duration;

use async_trait::async_trait;

use crate::{NodeError, Script};

/// A handle to one independent key-value node.
///
/// Connections obtained from [`Pool::get`] are handed back to the pool when they are dropped, so every exit path returns them.
#[async_trait]
pub trait Pool: Send + Sync {
    /// Obtains a connection to the node.
    async fn get(&self) -> Result<Box<dyn Conn>, NodeError>;
}

/// A connection to one node.
#[async_trait]
pub trait Conn: Send {
    /// Reads the value of `key`. Returns `None` if the key does not exist.
    async fn get(&mut self, key: &str) -> Result<Option<String>, NodeError>;

    /// Writes `value` into `key` unconditionally, dropping any TTL.
    async fn set(&mut self, key: &str, value: &str) -> Result<bool, NodeError>;

    /// Writes `value` into `key` with the given TTL only if `key` does not exist. Returns whether the key was created.
    async fn set_nx(&mut self, key: &str, value: &str, ttl: Duration)
        -> Result<bool, NodeError>;

    /// Evaluates `script` atomically and returns its integer reply.
    async fn eval(&mut self, script: &Script, keys: &[&str], args: &[&str])
        -> Result<i64, NodeError>;

    /// The remaining TTL of `key`. Returns `None` if the key does not exist or never expires.
    async fn pttl(&mut self, key: &str) -> Result<Option<Duration>, NodeError>;
}
