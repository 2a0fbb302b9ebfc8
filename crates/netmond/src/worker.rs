//! Probe worker task.
//!
//! The control loop never awaits a probe directly. It hands a
//! [`RoundPlan`] to the worker and later receives a [`RoundOutcome`] on a
//! channel, so a slow or timed-out probe cannot stall display refresh or
//! link polling.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use netmon_probe::{Probe, ProbeOutcome};

use crate::schedule::RoundPlan;

/// Results of one round. `None` means the target was not due.
#[derive(Debug)]
pub struct RoundOutcome {
    pub upstream: Option<ProbeOutcome>,
    pub downstream: Option<ProbeOutcome>,
}

pub struct ProbeWorker {
    requests: mpsc::Sender<RoundPlan>,
    results: mpsc::Receiver<RoundOutcome>,
    handle: JoinHandle<()>,
}

impl ProbeWorker {
    pub fn spawn<U: Probe, D: Probe>(upstream: U, downstream: D) -> Self {
        let (requests, mut request_rx) = mpsc::channel::<RoundPlan>(1);
        let (result_tx, results) = mpsc::channel(1);

        let handle = tokio::spawn(async move {
            while let Some(plan) = request_rx.recv().await {
                let up = async {
                    if plan.upstream {
                        Some(upstream.probe().await)
                    } else {
                        None
                    }
                };
                let down = async {
                    if plan.downstream {
                        Some(downstream.probe().await)
                    } else {
                        None
                    }
                };
                let (up_result, down_result) = tokio::join!(up, down);
                let outcome = RoundOutcome {
                    upstream: up_result,
                    downstream: down_result,
                };
                if result_tx.send(outcome).await.is_err() {
                    break;
                }
            }
            debug!("probe worker stopped");
        });

        Self {
            requests,
            results,
            handle,
        }
    }

    /// Queue a round. Returns `false` if the worker is gone or busy.
    pub fn dispatch(&self, plan: RoundPlan) -> bool {
        self.requests.try_send(plan).is_ok()
    }

    /// Next completed round, or `None` once the worker has exited.
    pub async fn next_outcome(&mut self) -> Option<RoundOutcome> {
        self.results.recv().await
    }

    pub fn shutdown(self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use netmon_core::ProbeResult;

    use super::*;

    #[derive(Clone, Default)]
    struct CountingProbe {
        calls: Arc<AtomicUsize>,
    }

    impl Probe for CountingProbe {
        async fn probe(&self) -> ProbeOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ProbeResult::Reachable { latency_ms: 7 })
        }
    }

    #[tokio::test]
    async fn round_only_probes_due_targets() {
        let upstream = CountingProbe::default();
        let downstream = CountingProbe::default();
        let mut worker = ProbeWorker::spawn(upstream.clone(), downstream.clone());

        assert!(worker.dispatch(RoundPlan {
            upstream: false,
            downstream: true
        }));
        let outcome = worker.next_outcome().await.unwrap();
        assert!(outcome.upstream.is_none());
        assert!(matches!(outcome.downstream, Some(Ok(ProbeResult::Reachable { latency_ms: 7 }))));

        assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);
        assert_eq!(downstream.calls.load(Ordering::SeqCst), 1);
        worker.shutdown();
    }
}
