#![deny(unsafe_op_in_unsafe_fn)]
#![forbid(unreachable_pub)]

//! Two-thread cooperative multitasking core for an interactive serial shell.
//!
//! This library provides the concurrency core of a small serial-line shell:
//! exactly two cooperating execution contexts, a byte pipe between them, a
//! tick-driven clock with deadline notifications, and a low-power yield
//! primitive that doubles as the context handoff.
//!
//! # Model
//!
//! - **Primary context**: runs the shell. After [`ShellCore::spawn`] it keeps
//!   running as the *background* (compute/producer) side of a command
//!   pipeline; its transmitted bytes are redirected into the pipe.
//! - **Spare context**: created by `spawn`, parked until first switched to,
//!   then runs the entry function as the *foreground* (serial-owning,
//!   consumer) side; its received bytes come from the pipe and its
//!   transmitted bytes go to the real port.
//! - A [`ShellCore::yield_now`] either hands the run token to the peer
//!   context or, when no peer is runnable, parks until the next interrupt
//!   (tick or serial receive).
//!
//! There is no preemption and no third thread. Interrupt handlers
//! ([`ShellCore::tick_isr`], [`ShellCore::rx_isr`]) only mutate shared state
//! and raise the event gate; they never switch contexts.
//!
//! # Quick Start
//!
//! ```
//! use coop_threads::{CapturePort, ShellCore, PIPE_END};
//!
//! let core = ShellCore::new(CapturePort::new());
//! core.spawn(|c| {
//!     // consumer side: drain the pipe to the real port
//!     let mut b = c.recv_byte();
//!     while b != PIPE_END {
//!         c.send_byte(b);
//!         b = c.recv_byte();
//!     }
//! });
//! core.send_all(b"ping");
//! core.join();
//! assert_eq!(core.port().contents(), b"ping");
//! ```

// Core modules
mod diag;
mod pipe;

pub mod errors;
pub mod pm;
pub mod rng;
pub mod serial;
pub mod shell;
pub mod thread;
pub mod ticker;
pub mod time;

#[cfg(test)]
mod tests;

// ============================================================================
// Public API
// ============================================================================

// Core context
pub use shell::ShellCore;

// Thread identity
pub use thread::Identity;

// Serial transport
pub use serial::{CapturePort, NullPort, SerialPort};

// Pipe end-of-transmission sentinel
pub use pipe::PIPE_END;

// Time
pub use time::{Tick, SECONDS_PER_UPPER_TICK, TICKS_PER_SECOND};
pub use time::clock::TickClock;
pub use time::notify::WakeHandle;

// Idle accounting
pub use pm::WakeStats;

// Random source
pub use rng::Lcg16;

// Hosted tick driver
pub use ticker::{Ticker, TICK_PERIOD};

// Errors
pub use errors::{CoreError, CoreResult, WakeError};
