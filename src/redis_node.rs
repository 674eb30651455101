use std::{
    fmt::{self, Formatter},
    time::Duration,
};

use async_trait::async_trait;
use educe::Educe;
use redis::{aio::ConnectionManager, Client, IntoConnectionInfo, RedisError};

use crate::{functions::ttl_millis, Conn, NodeError, Pool, Script};

#[inline]
fn fmt_connection_manager(_s: &ConnectionManager, f: &mut Formatter<'_>) -> fmt::Result {
    f.write_str("ConnectionManager")
}

/// A Redis server used as one node of the quorum.
///
/// The underlying [`ConnectionManager`] multiplexes every connection obtained from this pool and reconnects by itself.
#[derive(Educe, Clone)]
#[educe(Debug)]
pub struct RedisPool {
    #[educe(Debug(method(fmt_connection_manager)))]
    connection_manager: ConnectionManager,
}

impl RedisPool {
    /// Parses the Redis URL (`redis_url`) and builds a connection manager for it.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use redmutex::RedisPool;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let pool = RedisPool::open("redis://127.0.0.1:6379/0").await.unwrap();
    /// # }
    /// ```
    #[inline]
    pub async fn open(redis_url: impl IntoConnectionInfo) -> Result<Self, RedisError> {
        let client = Client::open(redis_url)?;
        let connection_manager = client.get_connection_manager().await?;

        Ok(Self::with_connection_manager(connection_manager))
    }

    /// See [`RedisPool::open`].
    #[inline]
    pub const fn with_connection_manager(connection_manager: ConnectionManager) -> Self {
        Self {
            connection_manager,
        }
    }
}

#[async_trait]
impl Pool for RedisPool {
    #[inline]
    async fn get(&self) -> Result<Box<dyn Conn>, NodeError> {
        Ok(Box::new(RedisConn {
            connection_manager: self.connection_manager.clone(),
        }))
    }
}

struct RedisConn {
    connection_manager: ConnectionManager,
}

#[async_trait]
impl Conn for RedisConn {
    #[inline]
    async fn get(&mut self, key: &str) -> Result<Option<String>, NodeError> {
        Ok(redis::cmd("GET").arg(key).query_async(&mut self.connection_manager).await?)
    }

    #[inline]
    async fn set(&mut self, key: &str, value: &str) -> Result<bool, NodeError> {
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query_async::<()>(&mut self.connection_manager)
            .await?;

        Ok(true)
    }

    #[inline]
    async fn set_nx(
        &mut self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, NodeError> {
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            // the reply is nil when the key already exists
            .query_async(&mut self.connection_manager)
            .await?;

        Ok(reply.is_some())
    }

    async fn eval(
        &mut self,
        script: &Script,
        keys: &[&str],
        args: &[&str],
    ) -> Result<i64, NodeError> {
        let mut invocation = script.redis_script().prepare_invoke();

        for key in keys {
            invocation.key(*key);
        }

        for arg in args {
            invocation.arg(*arg);
        }

        Ok(invocation.invoke_async::<i64>(&mut self.connection_manager).await?)
    }

    async fn pttl(&mut self, key: &str) -> Result<Option<Duration>, NodeError> {
        let reply: i64 = redis::cmd("PTTL").arg(key).query_async(&mut self.connection_manager).await?;

        // -2: the key does not exist, -1: the key has no TTL
        Ok(u64::try_from(reply).ok().map(Duration::from_millis))
    }
}
