//! Keeps the concurrency cap within what the process may open.
//!
//! Every in-flight probe holds one file descriptor, so a cap above the
//! `NOFILE` soft limit only produces "too many open files" errors.
use log::{info, warn};
use std::io;

/// Above this many descriptors we assume a tuned system and allow the
/// average cap.
pub const DEFAULT_FILE_DESCRIPTORS_LIMIT: u64 = 8000;
/// A cap that behaves well on most systems.
pub const AVERAGE_CONCURRENCY: u64 = 3000;
/// Descriptors left for everything that isn't a probe.
pub const RESERVED_DESCRIPTORS: u64 = 100;

/// The current soft `NOFILE` limit, where the platform has one.
#[cfg(unix)]
pub fn current_file_limit() -> Option<u64> {
    rlimit::Resource::NOFILE.get().ok().map(|(soft, _hard)| soft)
}

#[cfg(not(unix))]
pub fn current_file_limit() -> Option<u64> {
    None
}

/// Sets both `NOFILE` limits to `limit`.
#[cfg(unix)]
pub fn raise_file_limit(limit: u64) -> io::Result<()> {
    rlimit::Resource::NOFILE.set(limit, limit)
}

#[cfg(not(unix))]
pub fn raise_file_limit(_limit: u64) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "file limits cannot be changed on this platform",
    ))
}

/// Lowers `requested` so that the probes fit under `ulimit` with
/// [`RESERVED_DESCRIPTORS`] left over for the runtime, stdio and the like.
///
/// - `requested` fits next to the reserve: unchanged.
/// - `ulimit` is large: [`AVERAGE_CONCURRENCY`].
/// - `ulimit` is too small to spare the reserve: half of it.
/// - otherwise: `ulimit` minus [`RESERVED_DESCRIPTORS`].
pub fn infer_max_concurrency(requested: usize, ulimit: u64) -> usize {
    let requested_u64 = u64::try_from(requested).unwrap_or(u64::MAX);
    let budget = ulimit.saturating_sub(RESERVED_DESCRIPTORS);

    if requested_u64 <= budget {
        return requested;
    }

    warn!("File limit {ulimit} leaves room for fewer than {requested} concurrent probes");

    let cap = if ulimit > DEFAULT_FILE_DESCRIPTORS_LIMIT {
        info!("Concurrency is now the average cap");
        AVERAGE_CONCURRENCY
    } else if budget < ulimit / 2 {
        info!("Halving concurrency because the file limit is very small");
        ulimit / 2
    } else {
        budget
    };

    usize::try_from(cap.max(1)).unwrap_or(requested)
}
