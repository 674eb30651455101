use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use rand::{rngs::OsRng, RngCore};
use tokio::time::Instant;

const TOKEN_LENGTH: usize = 16;

/// Generates a lock token from 16 bytes of the operating system's CSPRNG, encoded in standard Base64.
///
/// # Examples
///
/// ```rust
/// let token = redmutex::generate_token().unwrap();
///
/// assert_eq!(24, token.len());
/// assert_ne!(token, redmutex::generate_token().unwrap());
/// ```
#[inline]
pub fn generate_token() -> Result<String, rand::Error> {
    let mut buffer = [0u8; TOKEN_LENGTH];

    OsRng.try_fill_bytes(&mut buffer)?;

    Ok(STANDARD.encode(buffer))
}

/// The smallest majority of `node_count` nodes.
///
/// # Examples
///
/// ```rust
/// assert_eq!(1, redmutex::quorum(1));
/// assert_eq!(2, redmutex::quorum(2));
/// assert_eq!(3, redmutex::quorum(5));
/// ```
#[inline]
pub const fn quorum(node_count: usize) -> usize {
    node_count / 2 + 1
}

/// Converts a TTL to the whole milliseconds sent with `PX` and `PEXPIRE`. A sub-millisecond TTL becomes 1 instead of 0, which a node would reject or treat as already expired.
#[inline]
pub(crate) fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// The part of `expiry` reserved for clock drift.
#[inline]
pub(crate) fn drift(expiry: Duration, factor: f64) -> Duration {
    // NaN fails the comparison and falls through to zero
    if factor > 0.0 {
        expiry.mul_f64(factor.min(1.0))
    } else {
        Duration::ZERO
    }
}

/// Computes the instant after which a lock granted by a round started at `start` and finished at `now` must no longer be trusted.
///
/// The deadline is `start + (expiry - (now - start)) - expiry * factor`. Returns `None` if the round and the drift allowance together used up the whole expiry.
pub(crate) fn validity_deadline(
    start: Instant,
    now: Instant,
    expiry: Duration,
    factor: f64,
) -> Option<Instant> {
    let elapsed = now.saturating_duration_since(start);

    let remaining = expiry.checked_sub(elapsed)?.checked_sub(drift(expiry, factor))?;

    start.checked_add(remaining)
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_generate_token_is_unique() {
        let mut tokens = HashSet::with_capacity(10_000);

        for _ in 0..10_000 {
            let token = generate_token().unwrap();

            assert_eq!(24, token.len());
            assert!(tokens.insert(token));
        }
    }

    #[test]
    fn test_quorum() {
        for (n, q) in [(0, 1), (1, 1), (2, 2), (3, 2), (4, 3), (5, 3), (7, 4)] {
            assert_eq!(q, quorum(n), "n = {n}");
        }
    }

    #[test]
    fn test_ttl_millis() {
        assert_eq!(1, ttl_millis(Duration::ZERO));
        assert_eq!(1, ttl_millis(Duration::from_micros(10)));
        assert_eq!(1, ttl_millis(Duration::from_micros(1_999)));
        assert_eq!(8_000, ttl_millis(Duration::from_secs(8)));
        assert_eq!(u64::MAX, ttl_millis(Duration::MAX));
    }

    #[test]
    fn test_drift_clamps_factor() {
        let expiry = Duration::from_secs(10);

        assert_eq!(Duration::ZERO, drift(expiry, -0.5));
        assert_eq!(Duration::ZERO, drift(expiry, f64::NAN));
        assert_eq!(Duration::from_millis(100), drift(expiry, 0.01));
        assert_eq!(expiry, drift(expiry, 3.0));
    }

    #[test]
    fn test_validity_deadline_never_exceeds_the_drift_adjusted_expiry() {
        let start = Instant::now();

        for expiry_ms in [1u64, 10, 500, 1_000, 8_000, 60_000] {
            let expiry = Duration::from_millis(expiry_ms);

            for factor in [0.0, 0.001, 0.01, 0.1, 0.25, 0.5, 0.9, 0.999] {
                for elapsed_ms in [0u64, 1, 5, 100, 999, 5_000] {
                    let now = start + Duration::from_millis(elapsed_ms);

                    let Some(until) = validity_deadline(start, now, expiry, factor) else {
                        continue;
                    };

                    assert!(until <= start + (expiry - drift(expiry, factor)));
                    assert!(until < start + expiry || (factor == 0.0 && elapsed_ms == 0));
                }
            }
        }
    }

    #[test]
    fn test_validity_deadline_subtracts_elapsed_and_drift() {
        let start = Instant::now();
        let expiry = Duration::from_secs(1);

        let until = validity_deadline(start, start + Duration::from_millis(100), expiry, 0.01);

        assert_eq!(Some(start + Duration::from_millis(890)), until);
    }

    #[test]
    fn test_validity_deadline_exhausted() {
        let start = Instant::now();
        let expiry = Duration::from_secs(1);

        assert_eq!(None, validity_deadline(start, start + Duration::from_secs(2), expiry, 0.01));
        assert_eq!(None, validity_deadline(start, start + Duration::from_millis(995), expiry, 0.01));
    }
}
