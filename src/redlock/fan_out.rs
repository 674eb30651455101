use std::{future::Future, sync::Arc, time::Duration};

use futures::future::join_all;
use tokio::time;

use crate::{NodeError, NodeErrors, NodeFailure, Pool};

/// The outcome of running one operation against every node.
#[derive(Debug)]
pub(crate) struct FanOut {
    pub(crate) successes: usize,
    pub(crate) errors:    Option<NodeErrors>,
}

/// Runs `act` against every node concurrently and waits for all of them.
///
/// A node counts as a success when `act` yields `Ok(true)`. `Ok(false)` is a refusal and contributes nothing. Every `Err` is kept, tagged with the index of its node.
pub(crate) async fn act_on_nodes<'a, F, Fut>(
    nodes: &'a [Arc<dyn Pool>],
    node_timeout: Option<Duration>,
    act: F,
) -> FanOut
where
    F: Fn(&'a dyn Pool) -> Fut,
    Fut: Future<Output = Result<bool, NodeError>>, {
    // all units are built before the first one is polled; `join_all` gives each its own slot
    let units = nodes.iter().map(|node| {
        let unit = act(node.as_ref());

        async move {
            match node_timeout {
                Some(timeout) => time::timeout(timeout, unit)
                    .await
                    .unwrap_or_else(|_| Err(NodeError::Timeout(timeout))),
                None => unit.await,
            }
        }
    });

    let results = join_all(units).await;

    let mut successes = 0;
    let mut failures = Vec::new();

    for (node, result) in results.into_iter().enumerate() {
        match result {
            Ok(true) => successes += 1,
            Ok(false) => (),
            Err(error) => failures.push(NodeFailure {
                node,
                error,
            }),
        }
    }

    tracing::trace!(nodes = nodes.len(), successes, failures = failures.len(), "finished a round");

    FanOut {
        successes,
        errors: NodeErrors::from_failures(failures),
    }
}
