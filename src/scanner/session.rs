use super::cancel::CancelToken;
use super::probe::{ProbeOutcome, ProbeResult, Prober};
use super::result::{ScanOutcome, ScanResult, SessionState};
use crate::target::Target;

use futures::FutureExt;
use log::debug;
use std::{
    collections::HashSet,
    iter::Peekable,
    net::SocketAddr,
    panic::AssertUnwindSafe,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{
    sync::{watch, OwnedSemaphorePermit, Semaphore},
    task::{JoinError, JoinSet},
    time,
};

/// State of one `scan()` call. The engine loop is the only writer of
/// `results`; probe tasks hand their result back through the `JoinSet`.
pub(super) struct ScanSession {
    target: Target,
    prober: Arc<dyn Prober>,
    gate: Arc<Semaphore>,
    in_flight: JoinSet<ProbeResult>,
    results: Vec<ProbeResult>,
    grace_period: Duration,
    state: watch::Sender<SessionState>,
}

impl ScanSession {
    pub(super) fn new(
        target: Target,
        prober: Arc<dyn Prober>,
        max_concurrent_probes: usize,
        grace_period: Duration,
        state: watch::Sender<SessionState>,
    ) -> Self {
        Self {
            target,
            prober,
            gate: Arc::new(Semaphore::new(max_concurrent_probes.max(1))),
            in_flight: JoinSet::new(),
            results: Vec::with_capacity(target.len()),
            grace_period,
            state,
        }
    }

    pub(super) async fn run<I>(mut self, ports: I, cancel: &CancelToken) -> ScanOutcome
    where
        I: Iterator<Item = u16>,
    {
        let started = Instant::now();
        let mut cancelled = self.dispatch_all(ports.peekable(), cancel).await;

        if !cancelled {
            cancelled = self.settle(cancel).await;
        }

        if cancelled {
            debug!(
                "Cancelled with {} probes in flight, waiting up to {:?}",
                self.in_flight.len(),
                self.grace_period
            );
            if time::timeout(self.grace_period, self.drain()).await.is_err() {
                debug!("Grace period over, aborting {} probes", self.in_flight.len());
                self.abort_remaining().await;
            }
        }

        // every port resolved anyway
        let cancelled = cancelled && self.results.len() < self.target.len();
        self.finish(cancelled, started.elapsed())
    }

    /// Spawns one probe per port while permits are available. Returns
    /// `true` if cancellation stopped the dispatch early.
    async fn dispatch_all<I>(&mut self, mut ports: Peekable<I>, cancel: &CancelToken) -> bool
    where
        I: Iterator<Item = u16>,
    {
        while ports.peek().is_some() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return true,
                Some(joined) = self.in_flight.join_next() => self.fold(joined),
                permit = Arc::clone(&self.gate).acquire_owned() => {
                    let Ok(permit) = permit else { break };
                    if let Some(port) = ports.next() {
                        self.dispatch(port, permit);
                    }
                }
            }
        }
        false
    }

    fn dispatch(&mut self, port: u16, permit: OwnedSemaphorePermit) {
        if *self.state.borrow() == SessionState::Idle {
            self.state.send_replace(SessionState::Running);
        }

        let socket = SocketAddr::new(self.target.address(), port);
        let prober = Arc::clone(&self.prober);
        self.in_flight.spawn(async move {
            let outcome = AssertUnwindSafe(prober.probe(socket))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| ProbeOutcome::Error(String::from("probe panicked")));
            // the permit covers the whole attempt, socket close included
            drop(permit);
            ProbeResult::new(port, outcome)
        });
    }

    /// Waits for every dispatched probe. Returns `true` if cancellation
    /// arrived before they all resolved.
    async fn settle(&mut self, cancel: &CancelToken) -> bool {
        loop {
            tokio::select! {
                biased;
                joined = self.in_flight.join_next() => match joined {
                    Some(joined) => self.fold(joined),
                    None => return false,
                },
                _ = cancel.cancelled(), if !self.in_flight.is_empty() => return true,
            }
        }
    }

    async fn drain(&mut self) {
        while let Some(joined) = self.in_flight.join_next().await {
            self.fold(joined);
        }
    }

    /// Aborted tasks drop their sockets. Probes that finished before the
    /// abort reached them are still collected.
    async fn abort_remaining(&mut self) {
        self.in_flight.abort_all();
        self.drain().await;
    }

    fn fold(&mut self, joined: Result<ProbeResult, JoinError>) {
        match joined {
            Ok(result) => self.results.push(result),
            Err(e) => debug!("Probe task did not finish: {e}"),
        }
    }

    fn finish(self, cancelled: bool, elapsed: Duration) -> ScanOutcome {
        let errors: HashSet<&str> = self
            .results
            .iter()
            .filter_map(|result| match &result.outcome {
                ProbeOutcome::Error(reason) => Some(reason.as_str()),
                _ => None,
            })
            .collect();
        if !errors.is_empty() {
            debug!("Typical socket connection errors {errors:?}");
        }

        let result = ScanResult::from_probes(self.results, elapsed);
        debug!("Open ports found on {}: {:?}", self.target, result.open_ports());

        let outcome = if cancelled {
            ScanOutcome::Cancelled(result)
        } else {
            ScanOutcome::Completed(result)
        };
        self.state.send_replace(outcome.state());
        outcome
    }
}
