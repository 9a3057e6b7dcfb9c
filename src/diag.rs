//! Fatal-state diagnostics.
//!
//! Misuse of the two-context protocol (double spawn, stray join, a thread
//! body returning in the wrong context) is not recoverable. The handler
//! logs the machine state that a crash dump would carry and aborts the
//! calling thread.

use crate::thread::Identity;

pub(crate) fn dump_state(reason: &str, identity: Identity, switch_count: u16) -> ! {
    log::error!(
        "fatal: {} (identity={:?} switches={})",
        reason,
        identity,
        switch_count
    );
    panic!("{}", reason);
}
