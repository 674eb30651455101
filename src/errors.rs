use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    time::Duration,
};

use redis::RedisError;

/// Errors reported by a single node.
#[derive(Debug)]
pub enum NodeError {
    /// Error that occurred when interacting with Redis.
    RedisError(RedisError),
    /// The per-node deadline elapsed before the node answered.
    Timeout(Duration),
    /// The node cannot be reached.
    Unavailable(String),
    /// The node does not know how to evaluate the given script.
    UnknownScript(String),
    /// The node refused a malformed command.
    Rejected(String),
}

impl From<RedisError> for NodeError {
    #[inline]
    fn from(value: RedisError) -> Self {
        Self::RedisError(value)
    }
}

impl Display for NodeError {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::RedisError(error) => Display::fmt(error, f),
            Self::Timeout(timeout) => {
                f.write_fmt(format_args!("the node did not answer within {timeout:?}"))
            },
            Self::Unavailable(reason) => {
                f.write_fmt(format_args!("the node is unavailable: {reason}"))
            },
            Self::UnknownScript(hash) => {
                f.write_fmt(format_args!("the node cannot evaluate the script {hash}"))
            },
            Self::Rejected(reason) => {
                f.write_fmt(format_args!("the node rejected the command: {reason}"))
            },
        }
    }
}

impl Error for NodeError {
    #[inline]
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::RedisError(error) => Some(error),
            _ => None,
        }
    }
}

/// A [`NodeError`] tagged with the position of the node that produced it.
#[derive(Debug)]
pub struct NodeFailure {
    /// Index of the node in the node set.
    pub node:  usize,
    /// What went wrong on that node.
    pub error: NodeError,
}

impl Display for NodeFailure {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("node #{}: {}", self.node, self.error))
    }
}

impl Error for NodeFailure {
    #[inline]
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.error)
    }
}

/// Every node failure collected during one fan-out round.
///
/// It is never empty. Failures are kept in node order.
#[derive(Debug)]
pub struct NodeErrors {
    failures: Vec<NodeFailure>,
}

impl NodeErrors {
    #[inline]
    pub(crate) fn from_failures(failures: Vec<NodeFailure>) -> Option<Self> {
        if failures.is_empty() {
            None
        } else {
            Some(Self {
                failures,
            })
        }
    }

    /// The collected failures.
    #[inline]
    pub fn failures(&self) -> &[NodeFailure] {
        &self.failures
    }

    /// Indexes of the nodes which failed.
    #[inline]
    pub fn nodes(&self) -> impl Iterator<Item = usize> + '_ {
        self.failures.iter().map(|failure| failure.node)
    }

    /// The number of collected failures.
    #[inline]
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// Whether no failure was collected.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

impl IntoIterator for NodeErrors {
    type IntoIter = std::vec::IntoIter<NodeFailure>;
    type Item = NodeFailure;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.failures.into_iter()
    }
}

impl Display for NodeErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let len = self.failures.len();

        if len == 1 {
            f.write_str("1 node failed:")?;
        } else {
            f.write_fmt(format_args!("{len} nodes failed:"))?;
        }

        for failure in self.failures.iter() {
            f.write_fmt(format_args!("\n\t* {failure}"))?;
        }

        Ok(())
    }
}

impl Error for NodeErrors {}

/// Errors for handling lock acquisition failures.
#[derive(Debug)]
pub enum LockError {
    /// The entropy source failed while generating a token. No node has been contacted.
    Token(rand::Error),
    /// No node accepted the lock and every refusal was an error.
    Nodes(NodeErrors),
    /// No attempt reached the quorum within the validity time of the lock.
    RetryExhausted {
        /// The number of attempts made.
        tries: u32,
    },
}

impl From<rand::Error> for LockError {
    #[inline]
    fn from(value: rand::Error) -> Self {
        Self::Token(value)
    }
}

impl From<NodeErrors> for LockError {
    #[inline]
    fn from(value: NodeErrors) -> Self {
        Self::Nodes(value)
    }
}

impl Display for LockError {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(error) => {
                f.write_fmt(format_args!("cannot generate a lock token: {error}"))
            },
            Self::Nodes(errors) => Display::fmt(errors, f),
            Self::RetryExhausted {
                tries,
            } => f.write_fmt(format_args!("failed to acquire the lock after {tries} attempt(s)")),
        }
    }
}

impl Error for LockError {
    #[inline]
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Token(error) => Some(error),
            Self::Nodes(errors) => Some(errors),
            Self::RetryExhausted {
                ..
            } => None,
        }
    }
}
