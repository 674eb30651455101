use std::sync::Arc;

use educe::Educe;
use tokio::time::{self, Instant};

use super::{fan_out::act_on_nodes, fmt_nodes, operations::*};
use crate::{functions::validity_deadline, quorum, LockError, MutexOptions, NodeErrors, Pool};

/// The verdict of [`Mutex::valid`].
#[derive(Debug)]
pub struct Validity {
    /// Whether a quorum of nodes still holds this handle's token.
    pub is_valid: bool,
    /// The errors of the nodes which could not be asked, if any.
    pub errors:   Option<NodeErrors>,
}

/// A distributed mutex spread over a set of independent nodes.
///
/// The lock is held when a quorum (`⌊N/2⌋ + 1`) of the `N` nodes stores this handle's token under the lock name, and only until [`Mutex::until`]. The deadline accounts for the time spent acquiring and for clock drift, so it comes earlier than the TTL on the nodes.
///
/// # Ownership
///
/// A `Mutex` is a single-owner handle: every state-changing method takes `&mut self`, so one handle never has two operations in flight. Independent handles, even with the same name, never interfere because each one tracks its own token.
#[derive(Educe)]
#[educe(Debug)]
pub struct Mutex {
    name:    String,
    options: MutexOptions,
    quorum:  usize,
    #[educe(Debug(method(fmt_nodes)))]
    nodes:   Arc<[Arc<dyn Pool>]>,
    #[educe(Debug(ignore))]
    value:   Option<String>,
    until:   Option<Instant>,
}

impl Mutex {
    #[inline]
    pub(crate) fn new(name: String, nodes: Arc<[Arc<dyn Pool>]>, options: MutexOptions) -> Self {
        Self {
            name,
            options,
            quorum: quorum(nodes.len()),
            nodes,
            value: None,
            until: None,
        }
    }

    /// The name of the lock, used as the key on every node.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The token written by the last successful acquisition, if the lock has not been released since.
    #[inline]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// The instant after which the lock must not be assumed to be held.
    #[inline]
    pub const fn until(&self) -> Option<Instant> {
        self.until
    }

    /// The number of nodes which have to agree.
    #[inline]
    pub const fn quorum(&self) -> usize {
        self.quorum
    }

    /// The options this handle was created with.
    #[inline]
    pub const fn options(&self) -> &MutexOptions {
        &self.options
    }

    /// Acquires the lock, retrying up to `options.tries` times.
    ///
    /// # Errors
    ///
    /// * [`LockError::Token`] if no token can be generated. No node is contacted.
    /// * [`LockError::Nodes`] if, in one attempt, no node accepted the lock and at least one failed. Contention alone never ends the retries early.
    /// * [`LockError::RetryExhausted`] if no attempt got a quorum in time.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use redmutex::RedLock;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let redlock = RedLock::new([
    ///     "redis://127.0.0.1:6379/0",
    ///     "redis://127.0.0.1:6380/0",
    ///     "redis://127.0.0.1:6381/0",
    /// ])
    /// .await
    /// .unwrap();
    ///
    /// let mut mutex = redlock.new_mutex("redmutex:example");
    ///
    /// mutex.lock().await.unwrap();
    ///
    /// // critical section, until `mutex.until()`
    ///
    /// mutex.unlock().await.unwrap();
    /// # }
    /// ```
    #[inline]
    pub async fn lock(&mut self) -> Result<(), LockError> {
        self.acquire(self.options.tries).await
    }

    /// Makes exactly one acquisition attempt. Errors are reported like [`Mutex::lock`] with a single try.
    #[inline]
    pub async fn try_lock(&mut self) -> Result<(), LockError> {
        self.acquire(1).await
    }

    async fn acquire(&mut self, tries: u32) -> Result<(), LockError> {
        let value = (self.options.value_generator)()?;

        let expiry = self.options.expiry;

        for attempt in 0..tries {
            if attempt != 0 {
                time::sleep(self.options.retry_delay.delay(attempt)).await;
            }

            tracing::trace!(name = %self.name, attempt = attempt + 1, "trying to acquire the lock");

            let start = Instant::now();

            let round = act_on_nodes(&self.nodes, self.options.node_timeout, |pool| {
                acquire_lock(pool, &self.name, &value, expiry)
            })
            .await;

            if round.successes == 0 {
                if let Some(errors) = round.errors {
                    return Err(LockError::Nodes(errors));
                }
            }

            let now = Instant::now();

            if round.successes >= self.quorum {
                if let Some(until) = validity_deadline(start, now, expiry, self.options.drift_factor)
                    .filter(|until| now < *until)
                {
                    if let Some(errors) = round.errors {
                        tracing::warn!(name = %self.name, "acquired the lock while some nodes failed: {errors}");
                    }

                    tracing::debug!(
                        name = %self.name,
                        attempt = attempt + 1,
                        successes = round.successes,
                        "acquired the lock"
                    );

                    self.value = Some(value);
                    self.until = Some(until);

                    return Ok(());
                }
            }

            // the attempt failed, so give back whatever was taken
            let rollback = act_on_nodes(&self.nodes, self.options.node_timeout, |pool| {
                release_lock(pool, &self.name, &value)
            })
            .await;

            if let Some(errors) = rollback.errors {
                tracing::debug!(name = %self.name, "ignored errors while rolling back: {errors}");
            }
        }

        Err(LockError::RetryExhausted {
            tries,
        })
    }

    /// Releases the lock.
    ///
    /// Returns `Ok(true)` if a quorum of nodes deleted the key; the token is then forgotten, so calling this again returns `Ok(false)` without contacting any node. If the quorum is not reached, the lock may be partially released and the token is kept for a retry: `Err` carries the node errors, `Ok(false)` means the nodes only refused.
    pub async fn unlock(&mut self) -> Result<bool, NodeErrors> {
        let Some(value) = self.value.as_deref() else {
            tracing::trace!(name = %self.name, "no lock to release");

            return Ok(false);
        };

        let round = act_on_nodes(&self.nodes, self.options.node_timeout, |pool| {
            release_lock(pool, &self.name, value)
        })
        .await;

        if round.successes >= self.quorum {
            tracing::debug!(name = %self.name, successes = round.successes, "released the lock");

            self.value = None;
            self.until = None;

            return Ok(true);
        }

        round.errors.map_or(Ok(false), Err)
    }

    /// Resets the TTL of the lock to `options.expiry` on every node which still holds this handle's token, and moves [`Mutex::until`] forward.
    ///
    /// Returns `Ok(true)` if a quorum of nodes was touched. Otherwise `Err` carries the node errors, and `Ok(false)` means the nodes only refused.
    ///
    /// The new deadline is computed from a clock read taken before the round. If the round outlived it, the nodes are still renewed but [`Mutex::until`] is already in the past, so the caller must not keep assuming the lock is held.
    pub async fn extend(&mut self) -> Result<bool, NodeErrors> {
        let Some(value) = self.value.as_deref() else {
            return Ok(false);
        };

        let expiry = self.options.expiry;

        let start = Instant::now();

        let round = act_on_nodes(&self.nodes, self.options.node_timeout, |pool| {
            touch_lock(pool, &self.name, value, expiry)
        })
        .await;

        if round.successes < self.quorum {
            return round.errors.map_or(Ok(false), Err);
        }

        let now = Instant::now();

        let until = validity_deadline(start, now, expiry, self.options.drift_factor).unwrap_or(start);

        if until > now {
            tracing::debug!(name = %self.name, successes = round.successes, "extended the lock");
        } else {
            tracing::warn!(name = %self.name, "extended the lock but the round outlived its validity time");
        }

        self.until = Some(until);

        Ok(true)
    }

    /// Checks how many nodes still hold this handle's token.
    pub async fn valid(&self) -> Validity {
        let Some(value) = self.value.as_deref() else {
            return Validity {
                is_valid: false,
                errors:   None,
            };
        };

        let round = act_on_nodes(&self.nodes, self.options.node_timeout, |pool| {
            validate_lock(pool, &self.name, value)
        })
        .await;

        Validity {
            is_valid: round.successes >= self.quorum,
            errors:   round.errors,
        }
    }
}
