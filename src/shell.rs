//! The shell core: the handle tying the clock, the two-context machine,
//! the pipe, and the serial transport together.
//!
//! Every public operation goes through [`ShellCore`], a cheaply clonable
//! handle over the shared state. Interrupt entry points ([`tick_isr`],
//! [`rx_isr`]) may be called from any thread; the cooperative operations
//! (`spawn`, `join`, `switch`, the byte I/O) follow the two-context
//! protocol documented on each method.
//!
//! [`tick_isr`]: ShellCore::tick_isr
//! [`rx_isr`]: ShellCore::rx_isr

use std::sync::Arc;

use crate::diag;
use crate::errors::WakeError;
use crate::pipe::{BytePipe, PIPE_END};
use crate::pm::{IdlePark, WakeStats};
use crate::rng::Lcg16;
use crate::serial::{RxRing, SerialPort};
use crate::thread::{Identity, ThreadCore};
use crate::time::clock::TickClock;

struct Inner<P> {
    clock: TickClock,
    idle: IdlePark,
    stats: WakeStats,
    threads: ThreadCore,
    pipe: BytePipe,
    rx: RxRing,
    rng: Lcg16,
    port: P,
}

/// Handle to the cooperative core. Clones share the same state.
pub struct ShellCore<P: SerialPort> {
    inner: Arc<Inner<P>>,
}

impl<P: SerialPort> Clone for ShellCore<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<P: SerialPort> ShellCore<P> {
    pub fn new(port: P) -> Self {
        Self {
            inner: Arc::new(Inner {
                clock: TickClock::new(),
                idle: IdlePark::new(),
                stats: WakeStats::new(),
                threads: ThreadCore::new(),
                pipe: BytePipe::new(),
                rx: RxRing::new(),
                rng: Lcg16::new(),
                port,
            }),
        }
    }

    pub fn clock(&self) -> &TickClock {
        &self.inner.clock
    }

    pub fn stats(&self) -> &WakeStats {
        &self.inner.stats
    }

    pub fn rng(&self) -> &Lcg16 {
        &self.inner.rng
    }

    pub fn port(&self) -> &P {
        &self.inner.port
    }

    // ------------------------------------------------------------------
    // Interrupt entry points
    // ------------------------------------------------------------------

    /// Timer overflow handler. Call once per tick from the tick driver.
    ///
    /// Samples the idle flag before advancing so the tick is attributed to
    /// the state the CPU was in when the interrupt fired.
    pub fn tick_isr(&self) {
        let was_idle = self.inner.idle.is_sleeping();
        self.inner.clock.advance();
        self.inner.stats.sample(was_idle);
        self.inner.rng.add_entropy(self.inner.clock.lsbyte());
        self.inner.clock.fire_due();
        self.inner.idle.wake();
    }

    /// Receive-complete handler. The byte is dropped when the ring is full.
    pub fn rx_isr(&self, byte: u8) {
        if !self.inner.rx.try_push(byte) {
            log::warn!("rx ring full, dropped 0x{:02x}", byte);
        }
        // Arrival timing, not the byte value, is the entropy here.
        self.inner.rng.add_entropy(self.inner.clock.lsbyte());
        self.inner.idle.wake();
    }

    // ------------------------------------------------------------------
    // Cooperative scheduling
    // ------------------------------------------------------------------

    /// Give up the CPU.
    ///
    /// With a live peer context this is a context switch; otherwise the
    /// caller parks until the next interrupt-side event.
    pub fn yield_now(&self) {
        match self.inner.threads.identity() {
            Identity::Background | Identity::Foreground => self.inner.threads.switch(),
            Identity::NotRunning | Identity::Returned => self.inner.idle.wait_for_event(),
        }
    }

    /// Yield with a parked-wake condition.
    ///
    /// With a runnable peer this is a plain switch. Otherwise the caller
    /// parks with `ready` re-checked under the event lock, so an interrupt
    /// that lands between the caller's own poll and the park cannot be
    /// lost.
    fn yield_or_park<F: Fn() -> bool>(&self, ready: F) {
        match self.inner.threads.identity() {
            Identity::Background | Identity::Foreground => self.inner.threads.switch(),
            Identity::NotRunning | Identity::Returned => self.inner.idle.wait_until(ready),
        }
    }

    /// Explicit context switch. Fatal when no spare context exists.
    pub fn switch(&self) {
        self.inner.threads.switch();
    }

    /// Create the spare context and arm the pipeline.
    ///
    /// The caller continues as the background (producer) side; `entry`
    /// starts on the first switch and runs as the foreground (consumer)
    /// side. Fatal if a spare context already exists.
    pub fn spawn<F>(&self, entry: F)
    where
        F: FnOnce(ShellCore<P>) + Send + 'static,
    {
        if self.inner.threads.is_running() {
            diag::dump_state(
                "spawn while a thread is live",
                self.inner.threads.identity(),
                self.inner.threads.switch_count(),
            );
        }
        log::debug!("spawning spare context");

        self.inner.pipe.reset();
        let pair = self.inner.threads.install();
        let core = self.clone();
        let runner = std::thread::Builder::new()
            .name("coop-spare".into())
            .spawn(move || {
                pair.wait_spare();
                entry(core.clone());
                core.inner.threads.finish_spare();
            });
        match runner {
            Ok(handle) => self.inner.threads.activate(handle),
            Err(e) => {
                log::error!("spare context allocation failed: {}", e);
                diag::dump_state(
                    "spare context allocation failed",
                    self.inner.threads.identity(),
                    self.inner.threads.switch_count(),
                );
            }
        }
    }

    /// End the pipeline and reclaim the spare context.
    ///
    /// Marks the pipe ended, keeps yielding until the entry function
    /// returns, then tears the context down. Fatal when no spare context
    /// exists.
    pub fn join(&self) {
        if !self.inner.threads.is_running() {
            diag::dump_state(
                "join with no thread running",
                Identity::NotRunning,
                self.inner.threads.switch_count(),
            );
        }
        self.inner.pipe.mark_end();
        while self.inner.threads.identity() != Identity::Returned {
            self.yield_now();
        }
        self.inner.threads.reap();
        log::debug!("spare context reaped");
    }

    /// Whether a spare context exists, live or returned.
    pub fn is_running(&self) -> bool {
        self.inner.threads.is_running()
    }

    /// The identity of the currently running side.
    pub fn which_is_running(&self) -> Identity {
        self.inner.threads.identity()
    }

    /// Lifetime count of completed switches, wrapping.
    pub fn switch_count(&self) -> u16 {
        self.inner.threads.switch_count()
    }

    // ------------------------------------------------------------------
    // Byte I/O
    // ------------------------------------------------------------------

    /// Send one byte through the pipeline.
    ///
    /// From the background side the byte goes into the pipe, blocking
    /// (by yielding) while the pipe is full; writes after the pipe has
    /// ended or the consumer has returned are silently dropped. From any
    /// other identity the byte goes to the real port.
    pub fn send_byte(&self, byte: u8) {
        if self.inner.threads.identity() == Identity::Background {
            self.write_pipe(byte);
        } else {
            while !self.inner.port.tx_ready() {
                std::hint::spin_loop();
            }
            self.inner.port.tx(byte);
        }
    }

    /// Receive one byte.
    ///
    /// From the foreground side this drains the pipe, yielding while it is
    /// empty and resolving to [`PIPE_END`] once the stream has ended. From
    /// any other identity it drains the interrupt-fed receive ring,
    /// yielding while that is empty.
    pub fn recv_byte(&self) -> u8 {
        if self.inner.threads.identity() == Identity::Foreground {
            return self.read_pipe();
        }
        loop {
            if let Some(byte) = self.inner.rx.try_pop() {
                return byte;
            }
            self.yield_or_park(|| self.inner.rx.has_next());
        }
    }

    /// Send a byte slice via [`send_byte`].
    ///
    /// [`send_byte`]: ShellCore::send_byte
    pub fn send_all(&self, bytes: &[u8]) {
        for &byte in bytes {
            self.send_byte(byte);
        }
    }

    /// Send a carriage-return line-feed pair.
    pub fn send_newline(&self) {
        self.send_byte(0x0d);
        self.send_byte(0x0a);
    }

    /// Block (cooperatively) for a number of whole seconds.
    ///
    /// Uses a clock wake registration when a slot is free; degrades to
    /// polling the clock against the deadline otherwise.
    pub fn sleep_seconds(&self, seconds: u16) {
        let deadline = self.inner.clock.now().add_seconds(seconds);
        match self.inner.clock.register_wake(deadline) {
            Ok(wake) => {
                while !wake.fired() {
                    self.yield_or_park(|| wake.fired());
                }
            }
            Err(WakeError::CapacityExceeded) => {
                log::warn!("wake slots exhausted, polling until deadline");
                while self.inner.clock.now() < deadline {
                    self.yield_or_park(|| self.inner.clock.now() >= deadline);
                }
            }
        }
    }

    fn read_pipe(&self) -> u8 {
        loop {
            if let Some(byte) = self.inner.pipe.try_pop() {
                return byte;
            }
            if self.inner.pipe.is_ended() {
                return PIPE_END;
            }
            self.yield_now();
        }
    }

    fn write_pipe(&self, byte: u8) {
        loop {
            // Checked inside the loop: the consumer can end the stream while
            // the producer is parked on a full pipe.
            if self.inner.pipe.is_ended()
                || self.inner.threads.identity() == Identity::Returned
            {
                return;
            }
            if self.inner.pipe.try_push(byte) {
                return;
            }
            self.yield_now();
        }
    }
}
