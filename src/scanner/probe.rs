//! A single bounded TCP connect attempt.
use async_trait::async_trait;
use log::{debug, warn};
use serde_derive::Serialize;
use std::{fmt, io::ErrorKind, net::SocketAddr, num::NonZero, time::Duration};
use tokio::{
    io::{self, AsyncWriteExt},
    net::TcpStream,
    time,
};

/// Classification of one connect attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "reason")]
pub enum ProbeOutcome {
    /// The handshake completed within the timeout.
    Open,
    /// The remote actively refused or reset the connection.
    Closed,
    /// Nothing came back before the timeout elapsed.
    TimedOut,
    /// A local or environmental fault, e.g. descriptor exhaustion.
    Error(String),
}

impl ProbeOutcome {
    pub fn is_open(&self) -> bool {
        matches!(self, ProbeOutcome::Open)
    }

    /// Whether another try could plausibly change the answer.
    fn is_retryable(&self) -> bool {
        matches!(self, ProbeOutcome::TimedOut | ProbeOutcome::Error(_))
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::Open => write!(f, "open"),
            ProbeOutcome::Closed => write!(f, "closed"),
            ProbeOutcome::TimedOut => write!(f, "timed out"),
            ProbeOutcome::Error(reason) => write!(f, "error: {reason}"),
        }
    }
}

/// The outcome for one port. Produced exactly once per attempted port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub port: u16,
    #[serde(flatten)]
    pub outcome: ProbeOutcome,
}

impl ProbeResult {
    pub fn new(port: u16, outcome: ProbeOutcome) -> Self {
        Self { port, outcome }
    }
}

/// Something that can tell whether a socket address accepts connections.
///
/// Implementations must always return, and must not keep any connection
/// open after returning.
#[async_trait]
pub trait Prober: Send + Sync + 'static {
    async fn probe(&self, socket: SocketAddr) -> ProbeOutcome;
}

/// Probes by performing a full TCP handshake.
#[derive(Debug, Clone)]
pub struct TcpProber {
    timeout: Duration,
    tries: NonZero<u8>,
}

impl TcpProber {
    /// A `tries` of 0 is corrected to 1.
    pub fn new(timeout: Duration, tries: u8) -> Self {
        Self {
            timeout,
            tries: NonZero::new(tries).unwrap_or(NonZero::<u8>::MIN),
        }
    }

    /// Performs the connection to the socket with timeout.
    /// The outer error is the elapsed timer, the inner one the connect error.
    async fn connect(&self, socket: SocketAddr) -> Result<io::Result<TcpStream>, time::error::Elapsed> {
        time::timeout(self.timeout, TcpStream::connect(socket)).await
    }

    async fn try_once(&self, socket: SocketAddr) -> ProbeOutcome {
        match self.connect(socket).await {
            Ok(Ok(tcp_stream)) => {
                debug!("Connection was successful, shutting down stream {socket}");
                if let Err(e) = { tcp_stream }.shutdown().await {
                    debug!("Shutdown stream error {e}");
                }
                ProbeOutcome::Open
            }
            Ok(Err(e)) => classify(&e),
            Err(_elapsed) => ProbeOutcome::TimedOut,
        }
    }
}

#[async_trait]
impl Prober for TcpProber {
    /// Given a socket, probe it up to `tries` times.
    /// Open and Closed are definitive; timeouts and errors are retried.
    async fn probe(&self, socket: SocketAddr) -> ProbeOutcome {
        let tries = self.tries.get();
        let mut outcome = ProbeOutcome::TimedOut;
        for nr_try in 1..=tries {
            outcome = self.try_once(socket).await;
            if !outcome.is_retryable() {
                debug!("{socket} is {outcome} after {nr_try} tries");
                break;
            }
        }
        outcome
    }
}

/// Maps a connect error onto an outcome.
///
/// Refusals and resets are the remote answering "no". Running out of
/// descriptors is reported as an error rather than aborting the scan.
fn classify(err: &io::Error) -> ProbeOutcome {
    match err.kind() {
        ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
            ProbeOutcome::Closed
        }
        ErrorKind::TimedOut => ProbeOutcome::TimedOut,
        _ => {
            let reason = err.to_string();
            if reason.to_lowercase().contains("too many open files") {
                warn!("Too many open files. Please reduce the number of concurrent probes.");
            }
            ProbeOutcome::Error(reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use tokio::net::TcpListener;

    #[test]
    fn classify_refusal_and_faults() {
        let refused = io::Error::from(ErrorKind::ConnectionRefused);
        assert_eq!(classify(&refused), ProbeOutcome::Closed);

        let reset = io::Error::from(ErrorKind::ConnectionReset);
        assert_eq!(classify(&reset), ProbeOutcome::Closed);

        let timed_out = io::Error::from(ErrorKind::TimedOut);
        assert_eq!(classify(&timed_out), ProbeOutcome::TimedOut);

        let exhausted = io::Error::other("Too many open files (os error 24)");
        assert_eq!(
            classify(&exhausted),
            ProbeOutcome::Error("Too many open files (os error 24)".to_owned())
        );
    }

    #[test]
    fn zero_tries_is_corrected() {
        let prober = TcpProber::new(Duration::from_millis(100), 0);
        assert_eq!(prober.tries.get(), 1);
    }

    #[tokio::test]
    async fn probe_open_port() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let socket = listener.local_addr().unwrap();

        let prober = TcpProber::new(Duration::from_millis(500), 1);
        assert_eq!(prober.probe(socket).await, ProbeOutcome::Open);
    }

    #[tokio::test]
    async fn probe_closed_port() {
        // bind and release to get a port nobody listens on
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let socket = listener.local_addr().unwrap();
        drop(listener);

        let prober = TcpProber::new(Duration::from_millis(500), 2);
        let outcome = prober.probe(socket).await;
        assert!(
            matches!(outcome, ProbeOutcome::Closed | ProbeOutcome::TimedOut),
            "unexpected outcome {outcome}"
        );
    }

    #[tokio::test]
    async fn probe_never_exceeds_timeout() {
        // TEST-NET-3, never routed
        let socket = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 1)), 443);
        let prober = TcpProber::new(Duration::from_millis(100), 1);

        let started = std::time::Instant::now();
        let outcome = prober.probe(socket).await;
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(!outcome.is_open());
    }

    #[test]
    fn outcome_serializes_with_reason() {
        let result = ProbeResult::new(22, ProbeOutcome::Error("boom".to_owned()));
        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(json, r#"{"port":22,"state":"error","reason":"boom"}"#);

        let result = ProbeResult::new(80, ProbeOutcome::Open);
        assert_eq!(serde_json::to_string(&result).unwrap(), r#"{"port":80,"state":"open"}"#);
    }
}
