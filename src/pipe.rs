//! The byte pipe between the two cooperative contexts.
//!
//! A fixed circular buffer with one producer (the background context) and
//! one consumer (the foreground context). Each index is written by exactly
//! one side, so plain atomic loads and stores are enough; there is no lock.
//! Blocking semantics (yield while full/empty, the end sentinel) live in
//! [`crate::shell`], which owns the yield primitive.

use portable_atomic::{AtomicBool, AtomicU8, Ordering};

pub(crate) const PIPE_BUF_SIZE: usize = 64;

/// End-of-transmission sentinel returned by a pipe read once the buffer is
/// drained and the stream has been marked ended.
pub const PIPE_END: u8 = 0x04;

pub(crate) struct BytePipe {
    buf: [AtomicU8; PIPE_BUF_SIZE],
    next_write: AtomicU8,
    next_read: AtomicU8,
    ended: AtomicBool,
}

impl BytePipe {
    pub(crate) fn new() -> Self {
        Self {
            buf: std::array::from_fn(|_| AtomicU8::new(0)),
            next_write: AtomicU8::new(0),
            next_read: AtomicU8::new(0),
            ended: AtomicBool::new(false),
        }
    }

    /// Reset to the empty, not-ended state. Called at thread spawn.
    pub(crate) fn reset(&self) {
        self.next_write.store(0, Ordering::Release);
        self.next_read.store(0, Ordering::Release);
        self.ended.store(false, Ordering::Release);
    }

    pub(crate) fn has_next(&self) -> bool {
        self.next_read.load(Ordering::Acquire) != self.next_write.load(Ordering::Acquire)
    }

    pub(crate) fn is_full(&self) -> bool {
        let write = self.next_write.load(Ordering::Acquire);
        let read = self.next_read.load(Ordering::Acquire);
        write.wrapping_add(1) % PIPE_BUF_SIZE as u8 == read
    }

    /// Producer side. Returns false when the buffer is full.
    pub(crate) fn try_push(&self, byte: u8) -> bool {
        if self.is_full() {
            return false;
        }
        let write = self.next_write.load(Ordering::Relaxed);
        self.buf[write as usize].store(byte, Ordering::Relaxed);
        self.next_write
            .store(write.wrapping_add(1) % PIPE_BUF_SIZE as u8, Ordering::Release);
        true
    }

    /// Consumer side. Returns None when the buffer is empty.
    pub(crate) fn try_pop(&self) -> Option<u8> {
        if !self.has_next() {
            return None;
        }
        let read = self.next_read.load(Ordering::Relaxed);
        let byte = self.buf[read as usize].load(Ordering::Relaxed);
        self.next_read
            .store(read.wrapping_add(1) % PIPE_BUF_SIZE as u8, Ordering::Release);
        Some(byte)
    }

    /// Mark the stream ended: empty reads resolve to [`PIPE_END`] and
    /// further writes are dropped. Set at join initiation.
    pub(crate) fn mark_end(&self) {
        self.ended.store(true, Ordering::Release);
    }

    pub(crate) fn is_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }
}
