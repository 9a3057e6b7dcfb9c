//! The free-running tick counter and its wake-slot scan.

use portable_atomic::{AtomicU16, Ordering};

use super::notify::{WakeHandle, WakeSlots};
use super::Tick;
use crate::errors::WakeError;

/// The tick counter plus the deadline notification slots serviced by the
/// tick interrupt.
///
/// The counter halves are written only from interrupt context;
/// thread-context readers go through the retry protocol in [`now`].
///
/// [`now`]: TickClock::now
pub struct TickClock {
    upper: AtomicU16,
    lower: AtomicU16,
    slots: WakeSlots,
}

impl TickClock {
    pub(crate) fn new() -> Self {
        Self {
            upper: AtomicU16::new(0),
            lower: AtomicU16::new(0),
            slots: WakeSlots::new(),
        }
    }

    /// Torn-read-safe snapshot of the counter.
    ///
    /// An interrupt can land between the two half reads, so the snapshot is
    /// re-read until two consecutive reads agree. The retry loop can in
    /// principle run as long as ticks outrun it; that is part of the
    /// contract, not something recovered elsewhere.
    pub fn now(&self) -> Tick {
        let mut snap = self.raw();
        loop {
            let again = self.raw();
            if again == snap {
                return snap;
            }
            snap = again;
        }
    }

    /// Low byte of the tick count, fed to the entropy sink each interrupt.
    pub(crate) fn lsbyte(&self) -> u8 {
        self.lower.load(Ordering::Relaxed) as u8
    }

    /// Increment the counter with carry. Interrupt side only.
    pub(crate) fn advance(&self) {
        let lower = self.lower.load(Ordering::Relaxed).wrapping_add(1);
        if lower == 0 {
            // Publish the carry before the wrapped lower half so a stable
            // double-read never pairs the old upper with the new lower.
            let upper = self.upper.load(Ordering::Relaxed).wrapping_add(1);
            self.upper.store(upper, Ordering::Release);
        }
        self.lower.store(lower, Ordering::Release);
    }

    /// Reserve one of the notification slots for a deadline.
    ///
    /// The interrupt scan sets the handle's flag and clears the slot once
    /// the counter reaches or passes `deadline`. Fails when all
    /// [`WAKE_SLOT_COUNT`](super::notify::WAKE_SLOT_COUNT) slots are
    /// occupied.
    pub fn register_wake(&self, deadline: Tick) -> Result<WakeHandle, WakeError> {
        self.slots.register(deadline)
    }

    /// Number of outstanding wake registrations.
    pub fn registered_count(&self) -> usize {
        self.slots.count()
    }

    /// Fire and clear every slot whose deadline has passed. Interrupt side
    /// only; the raw read is stable because the interrupt is the counter's
    /// sole writer.
    pub(crate) fn fire_due(&self) {
        self.slots.fire_due(self.raw());
    }

    fn raw(&self) -> Tick {
        Tick::new(
            self.upper.load(Ordering::Acquire),
            self.lower.load(Ordering::Acquire),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::super::notify::WAKE_SLOT_COUNT;
    use super::*;

    fn advance_by(clock: &TickClock, n: u32) {
        for _ in 0..n {
            clock.advance();
        }
    }

    #[test]
    fn advance_carries_into_upper_half() {
        let clock = TickClock::new();
        advance_by(&clock, 0xffff);
        assert_eq!(clock.now(), Tick::new(0, 0xffff));

        clock.advance();
        assert_eq!(clock.now(), Tick::new(1, 0));
    }

    #[test]
    fn wake_fires_at_or_past_deadline() {
        let clock = TickClock::new();
        let wake = clock.register_wake(Tick::new(0, 3)).unwrap();
        assert_eq!(clock.registered_count(), 1);

        advance_by(&clock, 2);
        clock.fire_due();
        assert!(!wake.fired());

        clock.advance();
        clock.fire_due();
        assert!(wake.fired());
        assert_eq!(clock.registered_count(), 0);
    }

    #[test]
    fn register_fails_on_fifth_outstanding_wake() {
        let clock = TickClock::new();
        let deadline = Tick::new(0, 10);

        let held: Vec<_> = (0..WAKE_SLOT_COUNT)
            .map(|_| clock.register_wake(deadline).unwrap())
            .collect();
        assert_eq!(clock.registered_count(), WAKE_SLOT_COUNT);
        assert!(matches!(
            clock.register_wake(deadline),
            Err(WakeError::CapacityExceeded)
        ));

        // Once the pending set fires, slots are free again.
        advance_by(&clock, 10);
        clock.fire_due();
        assert!(held.iter().all(|w| w.fired()));
        assert!(clock.register_wake(Tick::new(1, 0)).is_ok());
        assert_eq!(clock.registered_count(), 1);
    }
}
