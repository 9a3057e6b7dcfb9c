//! The two-context cooperative core.
//!
//! Exactly one spare context can exist at a time. A context switch is a
//! symmetric handoff of a single run token between the primary context and
//! the spare one; whichever side holds the token runs, the other is parked
//! on its gate. Nothing here preempts: control moves only when the running
//! side calls [`ThreadCore::switch`].
//!
//! Identity is a single shared byte. The running side reads it to know
//! which role it is currently playing, and the switch flips it before the
//! handoff so the resumed side observes its own role.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use portable_atomic::{AtomicI8, AtomicU16, Ordering};

use crate::diag;

/// Which role is currently running, as seen by shared state.
///
/// The discriminants are the raw values stored in the identity byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i8)]
pub enum Identity {
    /// The spare context's entry function has returned; the primary runs
    /// alone until it reaps.
    Returned = -2,
    /// No spare context exists.
    NotRunning = -1,
    /// The pipeline's compute side. After a spawn the primary context runs
    /// under this identity.
    Background = 0,
    /// The pipeline's serial-owning side, run by the spare context.
    Foreground = 1,
}

impl Identity {
    fn from_raw(raw: i8) -> Identity {
        match raw {
            -2 => Identity::Returned,
            0 => Identity::Background,
            1 => Identity::Foreground,
            _ => Identity::NotRunning,
        }
    }
}

/// One side's parking spot. The boolean is the run token.
struct Gate {
    token: Mutex<bool>,
    cv: Condvar,
}

impl Gate {
    fn new() -> Self {
        Self {
            token: Mutex::new(false),
            cv: Condvar::new(),
        }
    }

    fn grant(&self) {
        let mut token = self.token.lock().unwrap_or_else(|e| e.into_inner());
        *token = true;
        drop(token);
        self.cv.notify_one();
    }

    fn wait(&self) {
        let token = self.token.lock().unwrap_or_else(|e| e.into_inner());
        let mut token = self
            .cv
            .wait_while(token, |granted| !*granted)
            .unwrap_or_else(|e| e.into_inner());
        *token = false;
    }
}

/// The gate pair for one spawn. Both sides hold it for the lifetime of the
/// spare context.
pub(crate) struct GatePair {
    primary: Gate,
    spare: Gate,
}

impl GatePair {
    /// Park the spare context until the primary first switches to it.
    pub(crate) fn wait_spare(&self) {
        self.spare.wait();
    }
}

/// Shared state of the two-context machine.
pub(crate) struct ThreadCore {
    identity: AtomicI8,
    switch_count: AtomicU16,
    gates: spin::Mutex<Option<Arc<GatePair>>>,
    runner: spin::Mutex<Option<JoinHandle<()>>>,
}

impl ThreadCore {
    pub(crate) fn new() -> Self {
        Self {
            identity: AtomicI8::new(Identity::NotRunning as i8),
            switch_count: AtomicU16::new(0),
            gates: spin::Mutex::new(None),
            runner: spin::Mutex::new(None),
        }
    }

    pub(crate) fn identity(&self) -> Identity {
        Identity::from_raw(self.identity.load(Ordering::Acquire))
    }

    /// Whether a spare context exists, live or returned.
    pub(crate) fn is_running(&self) -> bool {
        self.identity() != Identity::NotRunning
    }

    /// Lifetime count of completed switches, wrapping.
    pub(crate) fn switch_count(&self) -> u16 {
        self.switch_count.load(Ordering::Relaxed)
    }

    /// Create the gate pair for a new spawn.
    pub(crate) fn install(&self) -> Arc<GatePair> {
        let pair = Arc::new(GatePair {
            primary: Gate::new(),
            spare: Gate::new(),
        });
        *self.gates.lock() = Some(pair.clone());
        pair
    }

    /// Arm the machine once the spare context's runner exists. From here on
    /// the primary runs as the background side.
    pub(crate) fn activate(&self, runner: JoinHandle<()>) {
        *self.runner.lock() = Some(runner);
        self.identity
            .store(Identity::Background as i8, Ordering::Release);
    }

    /// Hand the run token to the peer context and park until it comes back.
    ///
    /// Pinned once the spare context has returned: the count still advances
    /// but control stays with the primary.
    pub(crate) fn switch(&self) {
        let pair = match self.gates.lock().as_ref() {
            Some(pair) => pair.clone(),
            None => {
                diag::dump_state(
                    "switch with no spare context",
                    self.identity(),
                    self.switch_count(),
                );
            }
        };

        match self.identity() {
            Identity::Background => {
                log::trace!("switch -> foreground ({})", self.switch_count());
                self.identity
                    .store(Identity::Foreground as i8, Ordering::Release);
                self.switch_count.fetch_add(1, Ordering::Relaxed);
                pair.spare.grant();
                pair.primary.wait();
            }
            Identity::Foreground => {
                log::trace!("switch -> background ({})", self.switch_count());
                self.identity
                    .store(Identity::Background as i8, Ordering::Release);
                self.switch_count.fetch_add(1, Ordering::Relaxed);
                pair.primary.grant();
                pair.spare.wait();
            }
            Identity::Returned => {
                self.switch_count.fetch_add(1, Ordering::Relaxed);
            }
            Identity::NotRunning => {
                diag::dump_state(
                    "switch with no spare context",
                    Identity::NotRunning,
                    self.switch_count(),
                );
            }
        }
    }

    /// Spare-side epilogue, run when the entry function returns.
    ///
    /// The entry must return while its own identity is current; anything
    /// else means the run token protocol was violated.
    pub(crate) fn finish_spare(&self) {
        let identity = self.identity();
        if identity != Identity::Foreground {
            diag::dump_state(
                "thread returned outside the foreground context",
                identity,
                self.switch_count(),
            );
        }
        let pair = self.gates.lock().as_ref().map(Arc::clone);
        self.identity
            .store(Identity::Returned as i8, Ordering::Release);
        self.switch_count.fetch_add(1, Ordering::Relaxed);
        if let Some(pair) = pair {
            pair.primary.grant();
        }
    }

    /// Tear down after the spare context has returned.
    pub(crate) fn reap(&self) {
        self.identity
            .store(Identity::NotRunning as i8, Ordering::Release);
        *self.gates.lock() = None;
        let runner = self.runner.lock().take();
        if let Some(handle) = runner {
            // The runner exits right after finish_spare grants the token,
            // so this join cannot block on thread work.
            let _ = handle.join();
        }
    }
}
