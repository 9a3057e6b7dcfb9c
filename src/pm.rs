//! Idle wait and wake accounting.
//!
//! [`IdlePark`] is the hosted form of the low-power sleep instruction: a
//! waiter parks on the event gate and any interrupt-side wake releases it.
//! [`WakeStats`] keeps the rolling idle-vs-busy sample the tick interrupt
//! updates, so the shell can report how often the CPU actually slept.

use std::sync::{Condvar, Mutex};

use portable_atomic::{AtomicBool, AtomicU8, Ordering};

const WAKE_TRACK_VALUE_COUNT: usize = 16;

/// Ticks per sampling window.
const SAMPLE_WINDOW: u8 = 0xff;

/// Event gate for the low-power wait.
pub(crate) struct IdlePark {
    events: Mutex<u64>,
    cv: Condvar,
    sleeping: AtomicBool,
}

impl IdlePark {
    pub(crate) fn new() -> Self {
        Self {
            events: Mutex::new(0),
            cv: Condvar::new(),
            sleeping: AtomicBool::new(false),
        }
    }

    /// Block until the next interrupt-side wake. Exits on any event, like
    /// the sleep instruction it stands in for.
    pub(crate) fn wait_for_event(&self) {
        self.sleeping.store(true, Ordering::Release);
        let guard = self.events.lock().unwrap_or_else(|e| e.into_inner());
        let seen = *guard;
        let guard = self
            .cv
            .wait_while(guard, |n| *n == seen)
            .unwrap_or_else(|e| e.into_inner());
        drop(guard);
        self.sleeping.store(false, Ordering::Release);
    }

    /// Block until `ready` holds.
    ///
    /// The predicate is evaluated under the event lock, before first
    /// parking and again on every wake, so an interrupt landing between a
    /// caller's outside poll and the park is still observed.
    pub(crate) fn wait_until<F: Fn() -> bool>(&self, ready: F) {
        self.sleeping.store(true, Ordering::Release);
        let guard = self.events.lock().unwrap_or_else(|e| e.into_inner());
        let guard = self
            .cv
            .wait_while(guard, |_| !ready())
            .unwrap_or_else(|e| e.into_inner());
        drop(guard);
        self.sleeping.store(false, Ordering::Release);
    }

    /// Interrupt side: release any parked waiter.
    pub(crate) fn wake(&self) {
        let mut n = self.events.lock().unwrap_or_else(|e| e.into_inner());
        *n = n.wrapping_add(1);
        drop(n);
        self.cv.notify_all();
    }

    /// Whether a waiter is currently parked. Sampled by the tick interrupt.
    pub(crate) fn is_sleeping(&self) -> bool {
        self.sleeping.load(Ordering::Acquire)
    }
}

struct SampleRing {
    samples: [u8; WAKE_TRACK_VALUE_COUNT],
    pos: u8,
}

/// Rolling record of how many ticks per window found the CPU awake.
///
/// The tick interrupt bumps a counter pair; every 255 ticks the awake count
/// is pushed into a 16-entry ring and the pair resets.
pub struct WakeStats {
    tick_count: AtomicU8,
    idle_ticks: AtomicU8,
    ring: spin::Mutex<SampleRing>,
}

impl WakeStats {
    pub(crate) fn new() -> Self {
        Self {
            tick_count: AtomicU8::new(0),
            idle_ticks: AtomicU8::new(0),
            ring: spin::Mutex::new(SampleRing {
                samples: [0; WAKE_TRACK_VALUE_COUNT],
                pos: 0,
            }),
        }
    }

    /// Record one tick. Interrupt side only.
    pub(crate) fn sample(&self, was_idle: bool) {
        let ticks = self.tick_count.load(Ordering::Relaxed).wrapping_add(1);
        self.tick_count.store(ticks, Ordering::Relaxed);
        if was_idle {
            let idle = self.idle_ticks.load(Ordering::Relaxed).wrapping_add(1);
            self.idle_ticks.store(idle, Ordering::Relaxed);
        }

        if ticks == SAMPLE_WINDOW {
            let awake = SAMPLE_WINDOW - self.idle_ticks.load(Ordering::Relaxed);
            let mut ring = self.ring.lock();
            let pos = ring.pos as usize;
            ring.samples[pos] = awake;
            ring.pos = (ring.pos + 1) & 0x0f;
            drop(ring);
            self.tick_count.store(0, Ordering::Relaxed);
            self.idle_ticks.store(0, Ordering::Relaxed);
        }
    }

    /// Awake ticks summed over the tracked windows, paired with the window
    /// total (`16 * 255`).
    pub fn wake_count(&self) -> (u16, u16) {
        let ring = self.ring.lock();
        let sum = ring.samples.iter().map(|&s| s as u16).sum();
        (sum, 0x1000 - 0x0010)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_rolls_over_after_255_ticks() {
        let stats = WakeStats::new();
        for i in 0..255 {
            stats.sample(i < 100);
        }
        // 100 idle ticks out of 255 leaves 155 awake.
        assert_eq!(stats.wake_count(), (155, 4080));

        // A second window accumulates alongside the first.
        for _ in 0..255 {
            stats.sample(true);
        }
        assert_eq!(stats.wake_count(), (155, 4080));
    }

    #[test]
    fn wait_until_checks_the_condition_before_parking() {
        let park = IdlePark::new();
        // No wake ever arrives; the under-lock check must see the
        // condition and return instead of parking.
        park.wait_until(|| true);
        assert!(!park.is_sleeping());
    }

    #[test]
    fn wait_until_rechecks_on_every_wake() {
        use std::sync::Arc;

        let park = Arc::new(IdlePark::new());
        let flag = Arc::new(AtomicBool::new(false));
        let (peer, cond) = (park.clone(), flag.clone());
        let waiter =
            std::thread::spawn(move || peer.wait_until(|| cond.load(Ordering::Acquire)));

        while !park.is_sleeping() {
            std::thread::yield_now();
        }
        // A wake with the condition still false must not release the waiter.
        park.wake();
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert!(park.is_sleeping());

        flag.store(true, Ordering::Release);
        park.wake();
        waiter.join().unwrap();
        assert!(!park.is_sleeping());
    }

    #[test]
    fn idle_park_round_trip() {
        use std::sync::Arc;

        let park = Arc::new(IdlePark::new());
        let peer = park.clone();
        let waiter = std::thread::spawn(move || peer.wait_for_event());

        while !park.is_sleeping() {
            std::thread::yield_now();
        }
        park.wake();
        waiter.join().unwrap();
        assert!(!park.is_sleeping());
    }
}
