//! Bounded cross-node fan-out.
//!
//! Fires one operation against every target node in parallel, each
//! invocation racing a per-node timeout. A slow or unreachable peer costs
//! the whole call at most that one timeout; its failure is recorded per
//! node instead of surfacing as an error. Retry policy belongs to the
//! caller — nothing here retries.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use pact_types::NodeId;
use tokio::sync::Semaphore;

/// Per-node outcome summary of one fan-out call.
#[derive(Debug, Default)]
pub struct FanOutReport {
    /// Nodes whose operation completed without error.
    pub successes: Vec<NodeId>,
    /// Nodes that failed or timed out, with a diagnostic message.
    pub failures: HashMap<NodeId, String>,
}

impl FanOutReport {
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Shared bounded worker pool for cross-node operations.
pub struct FanOutExecutor {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

impl FanOutExecutor {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Run `op` against every node concurrently, each bounded by
    /// `per_node_timeout`.
    ///
    /// The timeout covers queueing for a worker slot as well as the
    /// operation itself, so the overall call returns within roughly one
    /// timeout regardless of how many nodes are slow. An in-flight
    /// operation that times out is not cancelled mid-step by the caller —
    /// it runs to completion in the background and its result is ignored.
    pub async fn run<F, Fut>(
        &self,
        nodes: Vec<NodeId>,
        per_node_timeout: Duration,
        op: F,
    ) -> FanOutReport
    where
        F: Fn(NodeId) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        let mut handles = Vec::with_capacity(nodes.len());
        for node in nodes {
            let semaphore = Arc::clone(&self.semaphore);
            let op = op.clone();
            let handle = tokio::spawn(async move {
                let bounded = async {
                    let _permit = semaphore
                        .acquire()
                        .await
                        .expect("fan-out semaphore closed");
                    op(node.clone()).await
                };
                let outcome = match tokio::time::timeout(per_node_timeout, bounded).await {
                    Ok(result) => result,
                    Err(_) => Err(format!(
                        "timed out after {}ms",
                        per_node_timeout.as_millis()
                    )),
                };
                (node, outcome)
            });
            handles.push(handle);
        }

        let mut report = FanOutReport::default();
        for handle in handles {
            match handle.await {
                Ok((node, Ok(()))) => report.successes.push(node),
                Ok((node, Err(message))) => {
                    tracing::warn!(node = %node, error = %message, "fan-out target failed");
                    report.failures.insert(node, message);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "fan-out task panicked");
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Instant;

    fn node(s: &str) -> NodeId {
        NodeId::new(s).unwrap()
    }

    #[tokio::test]
    async fn all_nodes_succeed() {
        let executor = FanOutExecutor::new(4);
        let report = executor
            .run(
                vec![node("a"), node("b"), node("c")],
                Duration::from_secs(1),
                |_| async { Ok(()) },
            )
            .await;
        assert_eq!(report.successes.len(), 3);
        assert!(report.all_succeeded());
    }

    #[tokio::test]
    async fn hung_node_times_out_without_stalling_the_others() {
        let executor = FanOutExecutor::new(4);
        let timeout = Duration::from_millis(100);

        let start = Instant::now();
        let report = executor
            .run(vec![node("n1"), node("n2"), node("n3")], timeout, |n| async move {
                if n.as_str() == "n2" {
                    // Never responds.
                    std::future::pending::<()>().await;
                }
                Ok(())
            })
            .await;
        let elapsed = start.elapsed();

        assert_eq!(report.successes.len(), 2);
        assert!(report.failures.contains_key(&node("n2")));
        assert!(report.failures[&node("n2")].contains("timed out"));
        // Bounded by roughly one timeout, not one per slow node.
        assert!(
            elapsed < timeout * 3,
            "fan-out took {elapsed:?}, expected ≈{timeout:?}"
        );
    }

    #[tokio::test]
    async fn errors_are_recorded_per_node() {
        let executor = FanOutExecutor::new(4);
        let report = executor
            .run(
                vec![node("good"), node("bad")],
                Duration::from_secs(1),
                |n| async move {
                    if n.as_str() == "bad" {
                        Err("connection refused".to_string())
                    } else {
                        Ok(())
                    }
                },
            )
            .await;
        assert_eq!(report.successes, vec![node("good")]);
        assert_eq!(report.failures[&node("bad")], "connection refused");
    }

    #[tokio::test]
    async fn concurrency_stays_bounded() {
        let executor = FanOutExecutor::new(2);
        let concurrent = Arc::new(AtomicU64::new(0));
        let max_seen = Arc::new(AtomicU64::new(0));

        let report = executor
            .run(
                (0..6).map(|i| node(&format!("n{i}"))).collect(),
                Duration::from_secs(1),
                {
                    let concurrent = Arc::clone(&concurrent);
                    let max_seen = Arc::clone(&max_seen);
                    move |_| {
                        let concurrent = Arc::clone(&concurrent);
                        let max_seen = Arc::clone(&max_seen);
                        async move {
                            let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                            max_seen.fetch_max(now, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            concurrent.fetch_sub(1, Ordering::SeqCst);
                            Ok(())
                        }
                    }
                },
            )
            .await;

        assert_eq!(report.successes.len(), 6);
        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn empty_node_list_returns_immediately() {
        let executor = FanOutExecutor::new(2);
        let report = executor
            .run(Vec::new(), Duration::from_millis(10), |_| async { Ok(()) })
            .await;
        assert!(report.successes.is_empty());
        assert!(report.all_succeeded());
    }
}
