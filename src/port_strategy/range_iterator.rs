use gcd::Gcd;
use rand::Rng;

/// Yields every port of an inclusive `u16` range exactly once, in a
/// randomized order.
///
/// The walk is the additive congruential step `x_{i+1} = (x_i + step) % N`
/// over the indices `0..N`, with `gcd(step, N) == 1` so the sequence is a
/// full-length cycle. `x_0` is chosen uniformly in `0..N`.
///
/// For more information: <https://en.wikipedia.org/wiki/Linear_congruential_generator>
pub struct RangeIterator {
    active: bool,
    start: u32,
    total: u32,
    normalized_first_pick: u32,
    normalized_pick: u32,
    step: u32,
}

impl RangeIterator {
    /// Preconditions: `start <= end`.
    pub fn new(start: u16, end: u16) -> Self {
        let start = u32::from(start);
        let total = u32::from(end) + 1 - start;

        let step = pick_random_coprime(total);
        let first = rand::rng().random_range(0..total);

        Self {
            active: true,
            start,
            total,
            normalized_first_pick: first,
            normalized_pick: first,
            step,
        }
    }
}

impl Iterator for RangeIterator {
    type Item = u16;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.active {
            return None;
        }

        let cur = self.normalized_pick;
        let next = (cur + self.step) % self.total;

        // back at the seed: the cycle is complete once `cur` is returned
        if next == self.normalized_first_pick {
            self.active = false;
        }
        self.normalized_pick = next;

        u16::try_from(self.start + cur).ok()
    }
}

/// The probability that two random integers are coprime to one another
/// works out to be around 61%, so we can safely pick a random number and
/// test it. If we cannot find a coprime after 10 tries we return
/// "end - 1", which is always coprime with "end" but won't give ideal
/// randomization.
///
/// Candidates are drawn away from the boundaries, since steps close to
/// 0 or to "end" walk the range almost serially.
fn pick_random_coprime(end: u32) -> u32 {
    if end <= 2 {
        return end - 1;
    }

    let range_boundary = end / 4;
    let lower_range = range_boundary;
    let upper_range = end - range_boundary;
    let mut rng = rand::rng();

    for _ in 0..10 {
        let candidate = rng.random_range(lower_range..upper_range);
        if candidate != 0 && end.gcd(candidate) == 1 {
            return candidate;
        }
    }

    end - 1
}
