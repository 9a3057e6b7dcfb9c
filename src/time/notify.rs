//! Tick-deadline wake registrations.
//!
//! A fixed set of slots holds pending deadlines. The tick interrupt scans
//! them, sets the fired flag, and frees the slot; the waiter owns the
//! [`WakeHandle`] and polls its flag from a yield loop. Registration
//! storage is caller-owned; the slot only keeps a shared reference while
//! the registration is pending.

use std::sync::Arc;

use portable_atomic::{AtomicBool, Ordering};

use super::Tick;
use crate::errors::WakeError;

/// Maximum number of outstanding registrations.
pub const WAKE_SLOT_COUNT: usize = 4;

struct WakeInner {
    deadline: Tick,
    fired: AtomicBool,
}

/// Caller-owned end of a wake registration.
pub struct WakeHandle {
    inner: Arc<WakeInner>,
}

impl WakeHandle {
    /// Whether the deadline has been reached and the slot released.
    pub fn fired(&self) -> bool {
        self.inner.fired.load(Ordering::Acquire)
    }

    pub fn deadline(&self) -> Tick {
        self.inner.deadline
    }
}

/// The pending-registration table scanned by the tick interrupt.
pub(crate) struct WakeSlots {
    slots: spin::Mutex<[Option<Arc<WakeInner>>; WAKE_SLOT_COUNT]>,
}

impl WakeSlots {
    pub(crate) fn new() -> Self {
        Self {
            slots: spin::Mutex::new([None, None, None, None]),
        }
    }

    pub(crate) fn register(&self, deadline: Tick) -> Result<WakeHandle, WakeError> {
        let mut slots = self.slots.lock();
        for slot in slots.iter_mut() {
            if slot.is_none() {
                let inner = Arc::new(WakeInner {
                    deadline,
                    fired: AtomicBool::new(false),
                });
                *slot = Some(inner.clone());
                return Ok(WakeHandle { inner });
            }
        }
        Err(WakeError::CapacityExceeded)
    }

    pub(crate) fn count(&self) -> usize {
        self.slots.lock().iter().filter(|s| s.is_some()).count()
    }

    /// Fire every slot whose deadline has been reached or passed.
    pub(crate) fn fire_due(&self, now: Tick) {
        let mut slots = self.slots.lock();
        for slot in slots.iter_mut() {
            let due = slot.as_ref().map_or(false, |w| now >= w.deadline);
            if due {
                if let Some(w) = slot.take() {
                    w.fired.store(true, Ordering::Release);
                }
            }
        }
    }
}
