use super::probe::{ProbeOutcome, ProbeResult};
use serde_derive::Serialize;
use std::time::Duration;

/// Lifecycle of one scan. Terminal states are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Running,
    Completed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Cancelled)
    }
}

/// Everything a finished (or cancelled) scan found out.
///
/// `open_ports` is strictly ascending. `probes` holds one entry per port
/// that was resolved, sorted by port, for diagnostics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanResult {
    open_ports: Vec<u16>,
    probes: Vec<ProbeResult>,
    #[serde(serialize_with = "as_millis")]
    elapsed: Duration,
}

impl ScanResult {
    pub(crate) fn from_probes(mut probes: Vec<ProbeResult>, elapsed: Duration) -> Self {
        probes.sort_unstable_by_key(|result| result.port);
        probes.dedup_by_key(|result| result.port);

        let open_ports = probes
            .iter()
            .filter(|result| result.outcome.is_open())
            .map(|result| result.port)
            .collect();

        Self {
            open_ports,
            probes,
            elapsed,
        }
    }

    pub fn open_ports(&self) -> &[u16] {
        &self.open_ports
    }

    pub fn probes(&self) -> &[ProbeResult] {
        &self.probes
    }

    /// Probes that ended in [`ProbeOutcome::Error`].
    pub fn errors(&self) -> impl Iterator<Item = &ProbeResult> {
        self.probes
            .iter()
            .filter(|result| matches!(result.outcome, ProbeOutcome::Error(_)))
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// No open port was found.
    pub fn is_empty(&self) -> bool {
        self.open_ports.is_empty()
    }
}

/// How a scan ended.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ScanOutcome {
    /// Every port in the range was resolved.
    Completed(ScanResult),
    /// Cancellation stopped the scan before every port was resolved; holds
    /// what was confirmed until then.
    Cancelled(ScanResult),
}

impl ScanOutcome {
    pub fn result(&self) -> &ScanResult {
        match self {
            ScanOutcome::Completed(result) | ScanOutcome::Cancelled(result) => result,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ScanOutcome::Cancelled(_))
    }

    pub fn state(&self) -> SessionState {
        match self {
            ScanOutcome::Completed(_) => SessionState::Completed,
            ScanOutcome::Cancelled(_) => SessionState::Cancelled,
        }
    }
}

fn as_millis<S: serde::Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}
