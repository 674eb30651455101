/*!
# RedMutex

A distributed mutex which lives on several independent Redis servers at once (the Redlock algorithm). A lock is granted only when a majority of the servers accept it, so it survives any minority of them being unreachable.

## Examples

```rust,no_run
use redmutex::{LockError, RedLock};

#[tokio::main]
async fn main() {
    let redlock = RedLock::new([
        "redis://10.0.0.1:6379/0",
        "redis://10.0.0.2:6379/0",
        "redis://10.0.0.3:6379/0",
        "redis://10.0.0.4:6379/0",
        "redis://10.0.0.5:6379/0",
    ])
    .await
    .unwrap();

    let mut mutex = redlock.new_mutex("lock:invoice:42");

    match mutex.lock().await {
        Ok(()) => {
            // ----- critical section, valid until `mutex.until()` -----

            // -----------------------------------------------------------

            mutex.unlock().await.unwrap();
        },
        Err(LockError::RetryExhausted { .. }) => {
            // somebody else holds the lock
        },
        Err(error) => panic!("{error}"),
    }
}
```

## Safety

Mutual exclusion is probabilistic. It holds as long as clocks drift less than `drift_factor` of the expiry and the holder finishes before [`Mutex::until`]. It is not a consensus protocol.

A [`Mutex`] is a single-owner handle. Create one handle per task that competes for the lock.

## Other Nodes

Any key-value store can take part by implementing [`Pool`] and [`Conn`]. With the `test-util` feature, [`MemoryPool`] provides an in-memory node.
*/

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod errors;
mod functions;
#[cfg(any(test, feature = "test-util"))]
mod memory;
mod node;
mod options;
mod redis_node;
mod redlock;
mod scripts;

pub use errors::*;
pub use functions::*;
#[cfg(any(test, feature = "test-util"))]
pub use memory::*;
pub use node::*;
pub use options::*;
pub use redis::{ConnectionInfo, IntoConnectionInfo};
pub use redis_node::*;
pub use redlock::*;
pub use scripts::*;
