//! Serial transport: the port abstraction and the receive ring.
//!
//! The core only needs two things from hardware: a ready poll and a byte
//! transmit. Receive is interrupt-driven and lands in a small ring that the
//! foreground context drains.

use portable_atomic::{AtomicU8, Ordering};

/// Byte-level transmit interface to a serial port.
///
/// Implementations must be callable from any thread; the core polls
/// [`tx_ready`] from a busy loop before each [`tx`].
///
/// [`tx_ready`]: SerialPort::tx_ready
/// [`tx`]: SerialPort::tx
pub trait SerialPort: Send + Sync + 'static {
    /// Whether the transmitter can accept a byte right now.
    fn tx_ready(&self) -> bool;

    /// Transmit one byte. Only called after [`tx_ready`] returned true.
    ///
    /// [`tx_ready`]: SerialPort::tx_ready
    fn tx(&self, byte: u8);
}

pub(crate) const RX_BUF_SIZE: usize = 16;

/// Interrupt-fed receive ring. Bytes arriving while full are dropped.
pub(crate) struct RxRing {
    buf: [AtomicU8; RX_BUF_SIZE],
    next_write: AtomicU8,
    next_read: AtomicU8,
}

impl RxRing {
    pub(crate) fn new() -> Self {
        Self {
            buf: std::array::from_fn(|_| AtomicU8::new(0)),
            next_write: AtomicU8::new(0),
            next_read: AtomicU8::new(0),
        }
    }

    /// Interrupt side. Returns false when the byte was dropped.
    pub(crate) fn try_push(&self, byte: u8) -> bool {
        let write = self.next_write.load(Ordering::Relaxed);
        let next = write.wrapping_add(1) % RX_BUF_SIZE as u8;
        if next == self.next_read.load(Ordering::Acquire) {
            return false;
        }
        self.buf[write as usize].store(byte, Ordering::Relaxed);
        self.next_write.store(next, Ordering::Release);
        true
    }

    pub(crate) fn has_next(&self) -> bool {
        self.next_read.load(Ordering::Acquire) != self.next_write.load(Ordering::Acquire)
    }

    pub(crate) fn try_pop(&self) -> Option<u8> {
        let read = self.next_read.load(Ordering::Relaxed);
        if read == self.next_write.load(Ordering::Acquire) {
            return None;
        }
        let byte = self.buf[read as usize].load(Ordering::Relaxed);
        self.next_read
            .store(read.wrapping_add(1) % RX_BUF_SIZE as u8, Ordering::Release);
        Some(byte)
    }
}

/// A port that is always ready and discards everything.
pub struct NullPort;

impl SerialPort for NullPort {
    fn tx_ready(&self) -> bool {
        true
    }

    fn tx(&self, _byte: u8) {}
}

/// A port that records transmitted bytes, for tests and demos.
pub struct CapturePort {
    buf: spin::Mutex<Vec<u8>>,
}

impl CapturePort {
    pub fn new() -> Self {
        Self {
            buf: spin::Mutex::new(Vec::new()),
        }
    }

    /// Everything transmitted so far.
    pub fn contents(&self) -> Vec<u8> {
        self.buf.lock().clone()
    }

    /// Drain and return everything transmitted so far.
    pub fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.buf.lock())
    }
}

impl Default for CapturePort {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialPort for CapturePort {
    fn tx_ready(&self) -> bool {
        true
    }

    fn tx(&self, byte: u8) {
        self.buf.lock().push(byte);
    }
}
