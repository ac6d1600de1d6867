//! Validated scan targets.
//!
//! A [`Target`] can only be built from an IP literal and a port range that
//! lies inside `1..=65535` with `start <= end`. Anything else is rejected with
//! a [`ValidationError`] before a single socket is opened.
use std::fmt;
use std::net::IpAddr;
use std::ops::RangeInclusive;
use std::str::FromStr;

use thiserror::Error;

/// Lowest port a target range may start at.
pub const LOWEST_PORT_NUMBER: u16 = 1;
/// Highest port a target range may end at.
pub const TOP_PORT_NUMBER: u16 = 65535;

/// Reasons a target is refused before any network activity happens.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The address is not an IPv4 or IPv6 literal.
    #[error("'{0}' is not a valid IPv4 or IPv6 address")]
    InvalidAddress(String),

    /// A port bound lies outside 1-65535.
    #[error("port {0} must be between {LOWEST_PORT_NUMBER} and {TOP_PORT_NUMBER}")]
    PortOutOfRange(u32),

    /// The start of the range is greater than its end.
    #[error("start port {start} is greater than end port {end}")]
    InvertedRange {
        /// Requested first port.
        start: u32,
        /// Requested last port.
        end: u32,
    },
}

/// The address and inclusive port range of one scan request.
///
/// Immutable once built.
///
/// ```rust
/// # use portprobe::target::Target;
/// let target = Target::new("127.0.0.1", 1, 1_000).unwrap();
/// assert_eq!(target.len(), 1_000);
///
/// assert!(Target::new("999.999.999.999", 1, 10).is_err());
/// assert!(Target::new("127.0.0.1", 0, 10).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    address: IpAddr,
    start: u16,
    end: u16,
}

impl Target {
    /// Parses `address` as an IP literal and validates the port bounds.
    ///
    /// Bounds are taken as `u32` so callers can hand over whatever the user
    /// typed (0, 65536, ...) and get a descriptive error back.
    pub fn new(address: &str, start: u32, end: u32) -> Result<Self, ValidationError> {
        let address = IpAddr::from_str(address.trim())
            .map_err(|_| ValidationError::InvalidAddress(address.to_owned()))?;

        Self::from_parts(address, start, end)
    }

    /// Validates the port bounds for an already parsed address.
    pub fn from_parts(address: IpAddr, start: u32, end: u32) -> Result<Self, ValidationError> {
        let start_port = checked_port(start)?;
        let end_port = checked_port(end)?;

        if start_port > end_port {
            return Err(ValidationError::InvertedRange { start, end });
        }

        Ok(Self {
            address,
            start: start_port,
            end: end_port,
        })
    }

    /// The host being scanned.
    pub fn address(&self) -> IpAddr {
        self.address
    }

    /// First port of the range.
    pub fn start(&self) -> u16 {
        self.start
    }

    /// Last port of the range, inclusive.
    pub fn end(&self) -> u16 {
        self.end
    }

    /// All ports in ascending order.
    pub fn ports(&self) -> RangeInclusive<u16> {
        self.start..=self.end
    }

    /// Number of ports in the range. Never zero.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        usize::from(self.end - self.start) + 1
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ports {}-{}", self.address, self.start, self.end)
    }
}

fn checked_port(port: u32) -> Result<u16, ValidationError> {
    match u16::try_from(port) {
        Ok(p) if p >= LOWEST_PORT_NUMBER => Ok(p),
        _ => Err(ValidationError::PortOutOfRange(port)),
    }
}

#[cfg(test)]
mod tests {
    use super::{Target, ValidationError};
    use parameterized::parameterized;
    use std::net::{IpAddr, Ipv6Addr};

    #[parameterized(input = {
        ("127.0.0.1", 0, 10),
        ("127.0.0.1", 1, 65_536),
        ("127.0.0.1", 100, 10),
        ("999.999.999.999", 1, 10),
        ("localhost", 1, 10),
        ("", 1, 10),
    }, expected = {
        ValidationError::PortOutOfRange(0),
        ValidationError::PortOutOfRange(65_536),
        ValidationError::InvertedRange { start: 100, end: 10 },
        ValidationError::InvalidAddress("999.999.999.999".to_owned()),
        ValidationError::InvalidAddress("localhost".to_owned()),
        ValidationError::InvalidAddress(String::new()),
    })]
    fn rejects_bad_targets(input: (&str, u32, u32), expected: ValidationError) {
        let (address, start, end) = input;
        assert_eq!(Target::new(address, start, end), Err(expected));
    }

    #[test]
    fn accepts_full_range() {
        let target = Target::new("127.0.0.1", 1, 65_535).unwrap();
        assert_eq!(target.len(), 65_535);
        assert_eq!(target.ports().count(), 65_535);
    }

    #[test]
    fn accepts_single_port_and_ipv6() {
        let target = Target::new(" ::1 ", 443, 443).unwrap();
        assert_eq!(target.address(), IpAddr::V6(Ipv6Addr::LOCALHOST));
        assert_eq!(target.len(), 1);
        assert_eq!(target.to_string(), "::1 ports 443-443");
    }

    #[test]
    fn error_messages_are_descriptive() {
        let err = Target::new("127.0.0.1", 5, 1).unwrap_err();
        assert_eq!(err.to_string(), "start port 5 is greater than end port 1");

        let err = Target::new("127.0.0.1", 0, 1).unwrap_err();
        assert_eq!(err.to_string(), "port 0 must be between 1 and 65535");
    }
}
