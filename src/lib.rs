//! This crate exposes the internal functionality of the `portprobe`
//! TCP port scanner.
//!
//! `portprobe` answers one question: which ports of a given host accept a
//! TCP connection? It does so with full handshakes (no raw sockets, no
//! privileges needed), many at a time, without ever letting the number of
//! open sockets grow past a fixed cap.
//!
//! ## Architecture Overview
//!
//! The core scanning behaviour is managed by
//! [`ScanEngine`](crate::scanner::ScanEngine), which is built from a
//! validated [`Target`](crate::target::Target). The scanning process
//! follows this flow:
//!
//! 1. **Input Processing**: the address and port bounds are parsed and
//!    validated; nothing touches the network if they are wrong
//! 2. **Port Strategy**: determines the order in which ports are dispatched
//! 3. **Probing**: each port gets one bounded connect attempt, run as its
//!    own task while holding a slot of the concurrency cap
//! 4. **Result Processing**: outcomes are folded by the engine and the open
//!    ports are returned in ascending order
//!
//! ## Basic Usage Example
//!
//! ```rust
//! use portprobe::scanner::{CancelToken, ScanConfig, ScanEngine};
//! use portprobe::target::Target;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Fails right here for a bad address or port range
//!     let target = Target::new("127.0.0.1", 1, 1_000)?;
//!
//!     let config = ScanConfig {
//!         max_concurrent_probes: 100,          // sockets in flight at most
//!         timeout: Duration::from_millis(200), // per connect attempt
//!         ..ScanConfig::default()
//!     };
//!
//!     let outcome = ScanEngine::new(target, config).scan(CancelToken::new()).await;
//!
//!     println!("Discovered {} open ports:", outcome.result().open_ports().len());
//!     for port in outcome.result().open_ports() {
//!         println!("  {}", port);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Background Scans and Cancellation
//!
//! A caller that must stay responsive (a UI loop, a request handler) spawns
//! the scan and keeps the handle. Cancelling stops new probes from being
//! dispatched, gives in-flight ones a grace period, and still returns what
//! was found:
//!
//! ```rust
//! # use portprobe::scanner::{ScanConfig, ScanEngine};
//! # use portprobe::target::Target;
//! # #[tokio::main]
//! # async fn main() {
//! let target = Target::new("127.0.0.1", 1, 65_535).unwrap();
//! let handle = ScanEngine::new(target, ScanConfig::default()).spawn();
//!
//! // ... the user pressed "stop"
//! handle.cancel();
//!
//! let outcome = handle.join().await.unwrap();
//! assert!(outcome.is_cancelled());
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Only an invalid [`Target`](crate::target::Target) is an error. Refused,
//! silent and failing ports are recorded per port as a
//! [`ProbeOutcome`](crate::scanner::ProbeOutcome) and never abort a scan.
#![allow(clippy::needless_doctest_main)]

pub mod tui;

pub mod input;

pub mod scanner;

pub mod port_strategy;

pub mod limits;

pub mod target;
