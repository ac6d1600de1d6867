//! Whole scans against loopback, plus the canonical scenarios with an
//! injected prober for ports that need privileges to bind.
use async_trait::async_trait;
use parameterized::parameterized;
use portprobe::port_strategy::ScanOrder;
use portprobe::scanner::{
    CancelToken, ProbeOutcome, Prober, ScanConfig, ScanEngine, ScanOutcome, SessionState,
};
use portprobe::target::{Target, ValidationError};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

fn fast_config() -> ScanConfig {
    ScanConfig {
        max_concurrent_probes: 64,
        timeout: Duration::from_millis(500),
        grace_period: Duration::from_millis(200),
        ..ScanConfig::default()
    }
}

async fn scan(target: Target, config: ScanConfig) -> ScanOutcome {
    ScanEngine::new(target, config).scan(CancelToken::new()).await
}

/// Answers "open" for a fixed set of ports, as if listeners were bound there.
struct ListenersOn(Vec<u16>);

#[async_trait]
impl Prober for ListenersOn {
    async fn probe(&self, socket: SocketAddr) -> ProbeOutcome {
        // later ports finish first to shuffle completion order
        tokio::time::sleep(Duration::from_millis(u64::from(100 - socket.port() % 100) / 10)).await;
        if self.0.contains(&socket.port()) {
            ProbeOutcome::Open
        } else {
            ProbeOutcome::Closed
        }
    }
}

#[tokio::test]
async fn single_listening_port_is_found() {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let target = Target::new("127.0.0.1", u32::from(port), u32::from(port)).unwrap();
    let outcome = scan(target, fast_config()).await;

    assert!(!outcome.is_cancelled());
    assert_eq!(outcome.result().open_ports(), &[port]);
    assert_eq!(outcome.result().probes().len(), 1);
}

#[tokio::test]
async fn port_one_listener_scenario() {
    let target = Target::new("127.0.0.1", 1, 1).unwrap();
    let outcome = ScanEngine::with_prober(target, fast_config(), ListenersOn(vec![1]))
        .scan(CancelToken::new())
        .await;

    assert_eq!(outcome.result().open_ports(), &[1]);
}

#[tokio::test]
async fn nothing_listening_yields_empty_result() {
    let target = Target::new("127.0.0.1", 50_000, 50_010).unwrap();
    let outcome = scan(target, fast_config()).await;

    let result = outcome.result();
    assert!(!outcome.is_cancelled());
    assert_eq!(result.probes().len(), 11);
    assert!(result.is_empty());
    assert!(result
        .probes()
        .iter()
        .all(|r| matches!(r.outcome, ProbeOutcome::Closed | ProbeOutcome::TimedOut)));
}

#[tokio::test]
async fn two_listeners_in_hundred_ports_scenario() {
    let target = Target::new("127.0.0.1", 1, 100).unwrap();
    let config = ScanConfig {
        order: ScanOrder::Random,
        ..fast_config()
    };
    let outcome = ScanEngine::with_prober(target, config, ListenersOn(vec![42, 7]))
        .scan(CancelToken::new())
        .await;

    assert_eq!(outcome.result().open_ports(), &[7, 42]);
    assert_eq!(outcome.result().probes().len(), 100);
}

#[tokio::test]
async fn two_real_listeners_are_reported_in_order() {
    let first = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let low = first.local_addr().unwrap().port();

    // find a second free port close above the first one
    let mut second = None;
    for candidate in low.saturating_add(1)..low.saturating_add(64) {
        if let Ok(listener) = TcpListener::bind((Ipv4Addr::LOCALHOST, candidate)).await {
            second = Some(listener);
            break;
        }
    }
    let second = second.expect("no free port near the first listener");
    let high = second.local_addr().unwrap().port();

    let target = Target::new("127.0.0.1", u32::from(low), u32::from(high)).unwrap();
    let config = ScanConfig {
        order: ScanOrder::Random,
        ..fast_config()
    };
    let outcome = scan(target, config).await;
    let open = outcome.result().open_ports();

    assert!(open.contains(&low) && open.contains(&high), "{open:?}");
    assert!(open.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(outcome.result().probes().len(), target.len());
}

#[tokio::test]
async fn cancelling_a_real_scan_returns_partial_result() {
    // TEST-NET-3 never answers, so probes sit in their timeout
    let target = Target::new("203.0.113.1", 1, 65_535).unwrap();
    let config = ScanConfig {
        max_concurrent_probes: 32,
        timeout: Duration::from_secs(5),
        grace_period: Duration::from_millis(100),
        ..ScanConfig::default()
    };
    let handle = ScanEngine::new(target, config).spawn();
    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.cancel();

    let outcome = tokio::time::timeout(Duration::from_secs(2), handle.join())
        .await
        .expect("cancellation should be honoured within the grace period")
        .unwrap();

    assert!(outcome.is_cancelled());
    assert_eq!(outcome.state(), SessionState::Cancelled);
    assert!(outcome.result().probes().len() < target.len());
}

#[tokio::test]
async fn independent_engines_do_not_interfere() {
    let calls = Arc::new(AtomicUsize::new(0));

    struct Counting(Arc<AtomicUsize>, u16);

    #[async_trait]
    impl Prober for Counting {
        async fn probe(&self, socket: SocketAddr) -> ProbeOutcome {
            self.0.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(1)).await;
            if socket.port() == self.1 {
                ProbeOutcome::Open
            } else {
                ProbeOutcome::Closed
            }
        }
    }

    let a = ScanEngine::with_prober(
        Target::new("127.0.0.1", 1, 200).unwrap(),
        fast_config(),
        Counting(Arc::clone(&calls), 10),
    )
    .spawn();
    let b = ScanEngine::with_prober(
        Target::new("::1", 100, 300).unwrap(),
        fast_config(),
        Counting(Arc::clone(&calls), 250),
    )
    .spawn();

    let (a, b) = (a.join().await.unwrap(), b.join().await.unwrap());
    assert_eq!(a.result().open_ports(), &[10]);
    assert_eq!(b.result().open_ports(), &[250]);
    assert_eq!(calls.load(Ordering::SeqCst), 200 + 201);
}

#[parameterized(input = {
    ("127.0.0.1", 0, 10),
    ("127.0.0.1", 1, 65_536),
    ("127.0.0.1", 10, 1),
    ("999.999.999.999", 1, 10),
})]
fn invalid_targets_never_reach_the_engine(input: (&str, u32, u32)) {
    let (address, start, end) = input;
    let err = Target::new(address, start, end).unwrap_err();
    assert!(matches!(
        err,
        ValidationError::PortOutOfRange(_)
            | ValidationError::InvertedRange { .. }
            | ValidationError::InvalidAddress(_)
    ));
}
