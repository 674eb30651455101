use std::sync::Arc;

use educe::Educe;
use futures::future::try_join_all;
use redis::{IntoConnectionInfo, RedisError};

use super::{fmt_nodes, Mutex};
use crate::{quorum, MutexOptions, Pool, RedisPool};

/// A set of independent nodes to create distributed mutexes on.
///
/// Cloning is cheap, and every clone shares the same nodes.
#[derive(Educe, Clone)]
#[educe(Debug)]
pub struct RedLock {
    #[educe(Debug(method(fmt_nodes)))]
    nodes: Arc<[Arc<dyn Pool>]>,
}

impl RedLock {
    /// Connects to every Redis server in `redis_urls`, one node per server.
    ///
    /// The servers should be independent masters. Replicas of each other do not count as separate nodes.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use redmutex::RedLock;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let redlock = RedLock::new([
    ///     "redis://10.0.0.1:6379/0",
    ///     "redis://10.0.0.2:6379/0",
    ///     "redis://10.0.0.3:6379/0",
    /// ])
    /// .await
    /// .unwrap();
    ///
    /// assert_eq!(2, redlock.quorum());
    /// # }
    /// ```
    pub async fn new<I>(redis_urls: I) -> Result<Self, RedisError>
    where
        I: IntoIterator,
        I::Item: IntoConnectionInfo, {
        let pools = try_join_all(redis_urls.into_iter().map(RedisPool::open)).await?;

        tracing::trace!(nodes = pools.len(), "connected to the Redis nodes");

        Ok(Self::with_pools(pools.into_iter().map(|pool| Arc::new(pool) as Arc<dyn Pool>)))
    }

    /// Uses already built nodes.
    #[inline]
    pub fn with_pools(pools: impl IntoIterator<Item = Arc<dyn Pool>>) -> Self {
        Self {
            nodes: pools.into_iter().collect(),
        }
    }

    /// The number of nodes.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The number of nodes which have to agree, `⌊N/2⌋ + 1`.
    #[inline]
    pub fn quorum(&self) -> usize {
        quorum(self.nodes.len())
    }

    /// Creates a mutex handle for the lock `name` with the default options.
    #[inline]
    pub fn new_mutex(&self, name: impl Into<String>) -> Mutex {
        self.new_mutex_with_options(name, MutexOptions::default())
    }

    /// Creates a mutex handle for the lock `name`.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use std::time::Duration;
    ///
    /// use redmutex::{MutexOptions, RedLock, RetryDelay};
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let redlock = RedLock::new(["redis://127.0.0.1:6379/0"]).await.unwrap();
    ///
    /// let mutex = redlock.new_mutex_with_options(
    ///     "redmutex:example",
    ///     MutexOptions::new()
    ///         .expiry(Duration::from_secs(3))
    ///         .retry_delay(RetryDelay::Fixed(Duration::from_millis(100)))
    ///         .node_timeout(Some(Duration::from_millis(50))),
    /// );
    /// # }
    /// ```
    #[inline]
    pub fn new_mutex_with_options(&self, name: impl Into<String>, options: MutexOptions) -> Mutex {
        Mutex::new(name.into(), self.nodes.clone(), options)
    }
}
