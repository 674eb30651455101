use std::time::Duration;

use rand::Rng;

use crate::generate_token;

const DEFAULT_EXPIRY: Duration = Duration::from_secs(8);
const DEFAULT_TRIES: u32 = 32;
const DEFAULT_RETRY_DELAY: RetryDelay = RetryDelay::Random {
    min: Duration::from_millis(50),
    max: Duration::from_millis(250),
};
const DEFAULT_DRIFT_FACTOR: f64 = 0.01;
const DEFAULT_NODE_TIMEOUT: Option<Duration> = None;

/// The signature of a token generator.
pub type ValueGenerator = fn() -> Result<String, rand::Error>;

/// Decides how long to wait before a retry.
#[derive(Debug, Clone, Copy)]
pub enum RetryDelay {
    /// Always wait the same duration.
    Fixed(Duration),
    /// Wait a uniformly random duration in `min..=max`.
    Random { min: Duration, max: Duration },
    /// Computes the delay from the index of the upcoming attempt (starting from `1`).
    Custom(fn(u32) -> Duration),
}

impl RetryDelay {
    /// Computes the delay before the attempt `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Self::Fixed(duration) => duration,
            Self::Random {
                min,
                max,
            } => {
                let (min, max) = if min <= max { (min, max) } else { (max, min) };

                let min_ms = min.as_millis() as u64;
                let max_ms = max.as_millis() as u64;

                Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
            },
            Self::Custom(f) => f(attempt),
        }
    }
}

/// Options used when creating a [`Mutex`](crate::Mutex).
#[derive(Debug, Clone)]
pub struct MutexOptions {
    /// How long a granted lock is trusted without being extended. This is also the TTL of the key on every node.
    ///
    /// Default: **8 seconds**.
    pub expiry:          Duration,
    /// The number of acquisition attempts made by `lock`.
    ///
    /// Default: **32**.
    pub tries:           u32,
    /// The waiting strategy between two attempts.
    ///
    /// Default: a random delay between **50** and **250 milliseconds**.
    pub retry_delay:     RetryDelay,
    /// The fraction of `expiry` subtracted from the validity time to cover clock drift between nodes.
    ///
    /// Values outside `[0, 1)` are clamped.
    ///
    /// Default: **0.01**.
    pub drift_factor:    f64,
    /// The deadline of every call made to a single node.
    ///
    /// If `None`, a node which never answers stalls the whole round.
    ///
    /// Default: `None`.
    pub node_timeout:    Option<Duration>,
    /// Produces the token written into the lock key.
    ///
    /// Default: [`generate_token`].
    pub value_generator: ValueGenerator,
}

impl Default for MutexOptions {
    /// ```rust
    /// use std::time::Duration;
    ///
    /// use redmutex::{MutexOptions, RetryDelay};
    ///
    /// let options = MutexOptions::default();
    ///
    /// assert_eq!(Duration::from_secs(8), options.expiry);
    /// assert_eq!(32, options.tries);
    /// assert_eq!(0.01, options.drift_factor);
    /// assert_eq!(None, options.node_timeout);
    /// assert!(matches!(options.retry_delay, RetryDelay::Random { .. }));
    /// ```
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl MutexOptions {
    /// See [`MutexOptions::default`].
    #[inline]
    pub const fn new() -> Self {
        Self {
            expiry:          DEFAULT_EXPIRY,
            tries:           DEFAULT_TRIES,
            retry_delay:     DEFAULT_RETRY_DELAY,
            drift_factor:    DEFAULT_DRIFT_FACTOR,
            node_timeout:    DEFAULT_NODE_TIMEOUT,
            value_generator: generate_token,
        }
    }

    /// How long a granted lock is trusted without being extended.
    #[inline]
    pub const fn expiry(mut self, duration: Duration) -> Self {
        self.expiry = duration;

        self
    }

    /// The number of acquisition attempts made by `lock`.
    #[inline]
    pub const fn tries(mut self, tries: u32) -> Self {
        self.tries = tries;

        self
    }

    /// The waiting strategy between two attempts.
    #[inline]
    pub const fn retry_delay(mut self, retry_delay: RetryDelay) -> Self {
        self.retry_delay = retry_delay;

        self
    }

    /// The fraction of `expiry` reserved for clock drift.
    #[inline]
    pub const fn drift_factor(mut self, factor: f64) -> Self {
        self.drift_factor = factor;

        self
    }

    /// The deadline of every call made to a single node.
    #[inline]
    pub const fn node_timeout(mut self, duration: Option<Duration>) -> Self {
        self.node_timeout = duration;

        self
    }

    /// Replaces the token generator.
    #[inline]
    pub const fn value_generator(mut self, value_generator: ValueGenerator) -> Self {
        self.value_generator = value_generator;

        self
    }
}
