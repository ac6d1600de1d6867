//! Core functionality for actual scanning behaviour.
use crate::port_strategy::{PortStrategy, ScanOrder};
use crate::target::Target;
use log::debug;

mod cancel;
mod probe;
mod result;
mod session;

pub use cancel::CancelToken;
pub use probe::{ProbeOutcome, ProbeResult, Prober, TcpProber};
pub use result::{ScanOutcome, ScanResult, SessionState};
use session::ScanSession;

use std::{sync::Arc, time::Duration};
use tokio::{
    sync::watch,
    task::{JoinError, JoinHandle},
};

/// Default cap on simultaneously in-flight connection attempts.
pub const DEFAULT_MAX_CONCURRENT_PROBES: usize = 1_000;
/// Default time to wait for a handshake before a port counts as timed out.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1_500);
/// Default time in-flight probes get to finish after cancellation.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(500);

/// Tunables of a scan.
///
/// `max_concurrent_probes` caps simultaneous socket attempts, which bounds
/// descriptor use locally and the connection backlog hit on the remote host.
/// A value of 0 is treated as 1.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub max_concurrent_probes: usize,
    pub timeout: Duration,
    pub tries: u8,
    pub grace_period: Duration,
    pub order: ScanOrder,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_concurrent_probes: DEFAULT_MAX_CONCURRENT_PROBES,
            timeout: DEFAULT_TIMEOUT,
            tries: 1,
            grace_period: DEFAULT_GRACE_PERIOD,
            order: ScanOrder::Serial,
        }
    }
}

/// Scans one [`Target`] once.
///
/// `scan` consumes the engine: a new target, or a second run against the
/// same one, needs a new engine. Engines share nothing, so any number of
/// them may run side by side.
///
/// ```rust
/// # use portprobe::scanner::{CancelToken, ScanConfig, ScanEngine};
/// # use portprobe::target::Target;
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let target = Target::new("127.0.0.1", 1, 1_000)?;
/// let engine = ScanEngine::new(target, ScanConfig::default());
///
/// let outcome = engine.scan(CancelToken::new()).await;
/// println!("open: {:?}", outcome.result().open_ports());
/// # Ok(())
/// # }
/// ```
pub struct ScanEngine {
    target: Target,
    config: ScanConfig,
    prober: Arc<dyn Prober>,
    state: watch::Sender<SessionState>,
}

impl ScanEngine {
    /// An engine that probes with real TCP handshakes.
    pub fn new(target: Target, config: ScanConfig) -> Self {
        let prober = TcpProber::new(config.timeout, config.tries);
        Self::with_prober(target, config, prober)
    }

    /// An engine that asks `prober` about each port instead.
    /// `timeout` and `tries` of `config` are left to the prober.
    pub fn with_prober<P: Prober>(target: Target, config: ScanConfig, prober: P) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            target,
            config,
            prober: Arc::new(prober),
            state,
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Observe the session moving through its states.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Probes every port of the target and returns once all of them are
    /// resolved, or once `cancel` fires and the grace period is over.
    ///
    /// Per-port failures never surface as errors; they are recorded in
    /// [`ScanResult::probes`].
    pub async fn scan(self, cancel: CancelToken) -> ScanOutcome {
        let strategy = PortStrategy::pick(&self.target, self.config.order);

        debug!(
            "Start scanning {}.\nMax concurrent probes {}\nTimeout {:?}\nNumber of ports {}",
            self.target.address(),
            self.config.max_concurrent_probes,
            self.config.timeout,
            self.target.len()
        );

        let session = ScanSession::new(
            self.target,
            self.prober,
            self.config.max_concurrent_probes,
            self.config.grace_period,
            self.state,
        );
        session.run(strategy.ordered_iter(), &cancel).await
    }

    /// Runs the scan as a task on the current tokio runtime so the caller
    /// is free to do other work while it progresses.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn spawn(self) -> ScanHandle {
        let cancel = CancelToken::new();
        let state = self.subscribe();
        let token = cancel.clone();
        let join = tokio::spawn(async move { self.scan(token).await });

        ScanHandle {
            cancel,
            state,
            join,
        }
    }
}

/// A scan running in the background.
#[derive(Debug)]
pub struct ScanHandle {
    cancel: CancelToken,
    state: watch::Receiver<SessionState>,
    join: JoinHandle<ScanOutcome>,
}

impl ScanHandle {
    /// Asks the scan to stop; it still returns what it found.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Waits for the outcome. Fails only if the scan task itself panicked.
    pub async fn join(self) -> Result<ScanOutcome, JoinError> {
        self.join.await
    }
}
