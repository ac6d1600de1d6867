//! Decides the order in which the ports of a target are dispatched.
mod range_iterator;
use crate::target::Target;
use range_iterator::RangeIterator;
use serde_derive::Deserialize;

/// Represents the order in which port probing will run.
///   - Serial will run from start to end, for example 1 to 1_000.
///   - Random will visit every port of the range exactly once in a shuffled order.
#[derive(Deserialize, Debug, clap::ValueEnum, Clone, Copy, PartialEq, Eq)]
pub enum ScanOrder {
    Serial,
    Random,
}

/// A dispatch order for one target's port range.
#[derive(Debug, Clone, Copy)]
pub enum PortStrategy {
    Serial(SerialRange),
    Random(RandomRange),
}

impl PortStrategy {
    pub fn pick(target: &Target, order: ScanOrder) -> Self {
        let (start, end) = (target.start(), target.end());
        match order {
            ScanOrder::Serial => PortStrategy::Serial(SerialRange { start, end }),
            ScanOrder::Random => PortStrategy::Random(RandomRange { start, end }),
        }
    }

    /// Yields every port of the range exactly once.
    pub fn ordered_iter(&self) -> Box<dyn Iterator<Item = u16> + Send> {
        match *self {
            PortStrategy::Serial(range) => Box::new(range.start..=range.end),
            PortStrategy::Random(range) => Box::new(RangeIterator::new(range.start, range.end)),
        }
    }
}

/// As the name implies SerialRange will always generate ports in
/// ascending order.
#[derive(Debug, Clone, Copy)]
pub struct SerialRange {
    start: u16,
    end: u16,
}

/// As the name implies RandomRange generates ports in a random order,
/// following an additive congruential walk over the range.
#[derive(Debug, Clone, Copy)]
pub struct RandomRange {
    start: u16,
    end: u16,
}
