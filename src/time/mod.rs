//! Tick time: a 32-bit counter kept as two 16-bit halves.
//!
//! The tick counter is incremented from interrupt context and read from
//! thread context, so the two halves can tear; [`clock::TickClock::now`]
//! wraps the retry protocol. Arithmetic on snapshots lives on [`Tick`].

pub mod clock;
pub mod notify;

/// Timer overflow interrupts per second.
pub const TICKS_PER_SECOND: u16 = 128;

/// Whole seconds represented by one increment of the upper half.
pub const SECONDS_PER_UPPER_TICK: u16 = (65536u32 / TICKS_PER_SECOND as u32) as u16;

/// A snapshot of the tick counter.
///
/// Ordering compares the most-significant half first, identical to viewing
/// the pair as one unsigned 32-bit value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tick {
    pub upper: u16,
    pub lower: u16,
}

impl Tick {
    pub const ZERO: Tick = Tick { upper: 0, lower: 0 };

    pub const fn new(upper: u16, lower: u16) -> Self {
        Self { upper, lower }
    }

    /// The snapshot as a single unsigned 32-bit value.
    pub fn as_u32(self) -> u32 {
        ((self.upper as u32) << 16) | self.lower as u32
    }

    /// Three-way comparison, most-significant half first.
    pub fn compare(self, other: Tick) -> i8 {
        match self.cmp(&other) {
            core::cmp::Ordering::Less => -1,
            core::cmp::Ordering::Equal => 0,
            core::cmp::Ordering::Greater => 1,
        }
    }

    /// Advance by a number of whole seconds, carrying into the upper half
    /// on lower-half overflow.
    pub fn add_seconds(self, seconds: u16) -> Tick {
        let mut upper = self
            .upper
            .wrapping_add(seconds / SECONDS_PER_UPPER_TICK);
        let lower = self
            .lower
            .wrapping_add((seconds % SECONDS_PER_UPPER_TICK) * TICKS_PER_SECOND);
        if lower < self.lower {
            upper = upper.wrapping_add(1);
        }
        Tick { upper, lower }
    }

    /// Whole seconds between two snapshots.
    ///
    /// Precondition: `self >= earlier`. This is not checked; the result is
    /// garbage otherwise.
    pub fn diff_seconds(self, earlier: Tick) -> u16 {
        let mut diff = self
            .upper
            .wrapping_sub(earlier.upper)
            .wrapping_mul(SECONDS_PER_UPPER_TICK);
        if self.lower >= earlier.lower {
            diff = diff.wrapping_add((self.lower - earlier.lower) / TICKS_PER_SECOND);
        } else {
            diff = diff.wrapping_sub((earlier.lower - self.lower) / TICKS_PER_SECOND);
        }
        diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_matches_u32_view() {
        let a = Tick::new(0, 0xffff);
        let b = Tick::new(1, 0);
        let c = Tick::new(1, 1);

        assert!(a < b && b < c);
        assert_eq!(a.compare(a), 0);
        assert_eq!(a.compare(b), -(b.compare(a)));
        assert_eq!(b.compare(c), -1);
        assert!(a.as_u32() < b.as_u32() && b.as_u32() < c.as_u32());
    }

    #[test]
    fn add_seconds_carries_into_upper_half() {
        // One hour at 128 ticks/s is 460800 ticks: 7 upper increments plus
        // 2048 in the lower half.
        let t = Tick::ZERO.add_seconds(3600);
        assert_eq!(t, Tick::new(7, 2048));

        // Forced carry on the lower half.
        let t = Tick::new(0, 65000).add_seconds(5);
        assert_eq!(t, Tick::new(1, (65000u16).wrapping_add(5 * TICKS_PER_SECOND)));
    }

    #[test]
    fn diff_seconds_round_trips_add_seconds() {
        for &s in &[0u16, 1, 100, 511, 512, 3600, 43200] {
            let base = Tick::new(3, 60000);
            assert_eq!(base.add_seconds(s).diff_seconds(base), s);
        }
    }

    #[test]
    fn diff_seconds_borrows_across_halves() {
        let earlier = Tick::new(0, 65000);
        let later = Tick::new(1, 104);
        assert_eq!(later.diff_seconds(earlier), 5);
    }
}
