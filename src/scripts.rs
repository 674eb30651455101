use once_cell::sync::Lazy;

/// A check-then-act step that a node evaluates as one indivisible operation.
///
/// The content hash is the SHA-1 hex digest of the source, the way Redis addresses cached scripts.
#[derive(Debug, Clone)]
pub struct Script {
    key_count: usize,
    source:    &'static str,
    inner:     redis::Script,
}

impl Script {
    /// Creates a script which takes `key_count` keys.
    #[inline]
    pub fn new(key_count: usize, source: &'static str) -> Self {
        Self {
            key_count,
            source,
            inner: redis::Script::new(source),
        }
    }

    /// The number of keys the script expects.
    #[inline]
    pub const fn key_count(&self) -> usize {
        self.key_count
    }

    /// The Lua source of the script.
    #[inline]
    pub const fn source(&self) -> &'static str {
        self.source
    }

    /// The SHA-1 hex digest of the source.
    #[inline]
    pub fn hash(&self) -> &str {
        self.inner.get_hash()
    }

    #[inline]
    pub(crate) fn redis_script(&self) -> &redis::Script {
        &self.inner
    }
}

/// Deletes the lock key if it still holds the caller's token.
pub static DELETE_IF_VALUE_MATCHES: Lazy<Script> = Lazy::new(|| {
    // KEYS[1] = the lock key to release
    // ARGV[1] = token of the lock owner
    Script::new(
        1,
        r#"
            if redis.call("GET", KEYS[1]) == ARGV[1] then
                return redis.call("DEL", KEYS[1])
            else
                return 0
            end
        "#,
    )
});

/// Resets the TTL of the lock key if it still holds the caller's token.
pub static EXPIRE_IF_VALUE_MATCHES: Lazy<Script> = Lazy::new(|| {
    // KEYS[1] = the lock key to extend
    // ARGV[1] = token of the lock owner
    // ARGV[2] = new TTL (milliseconds)
    Script::new(
        1,
        r#"
            if redis.call("GET", KEYS[1]) == ARGV[1] then
                return redis.call("PEXPIRE", KEYS[1], ARGV[2])
            else
                return 0
            end
        "#,
    )
});

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_script_hashes_are_stable_and_distinct() {
        let delete_hash = DELETE_IF_VALUE_MATCHES.hash();

        assert_eq!(40, delete_hash.len());
        assert_eq!(delete_hash, Script::new(1, DELETE_IF_VALUE_MATCHES.source()).hash());
        assert_ne!(delete_hash, EXPIRE_IF_VALUE_MATCHES.hash());
        assert_eq!(1, DELETE_IF_VALUE_MATCHES.key_count());
        assert_eq!(1, EXPIRE_IF_VALUE_MATCHES.key_count());
    }
}
