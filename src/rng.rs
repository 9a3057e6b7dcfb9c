//! A 16-bit linear congruential random source.
//!
//! Deliberately tiny and deliberately weak: it seeds shell prompts and
//! jitter, nothing security-relevant. The tick interrupt folds the low bit
//! of the tick counter into the state each tick, so the stream diverges
//! from the fixed seed as soon as real interrupt timing is involved.

use portable_atomic::{AtomicU16, Ordering};

const MULTIPLIER: u16 = 3677;
const INCREMENT: u16 = 17863;
const SEED: u16 = 8161;

/// 16-bit LCG state with interrupt-fed entropy mixing.
pub struct Lcg16 {
    state: AtomicU16,
}

impl Lcg16 {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU16::new(SEED),
        }
    }

    /// Shift one bit of entropy into the state. Interrupt side.
    pub(crate) fn add_entropy(&self, entropy: u8) {
        let bit = (entropy & 1) as u16;
        // fetch_update never fails with a closure that always returns Some
        let _ = self
            .state
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |s| {
                Some((s << 1) | bit)
            });
    }

    /// Next value in the sequence.
    pub fn rand(&self) -> i16 {
        let mut out = 0u16;
        let _ = self
            .state
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |s| {
                let next = s.wrapping_mul(MULTIPLIER).wrapping_add(INCREMENT);
                out = next;
                Some(next)
            });
        out as i16
    }
}
