//! Hosted tick driver.
//!
//! Stands in for the hardware timer: a dedicated thread invokes the tick
//! interrupt entry point at a fixed period until the [`Ticker`] is dropped.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use portable_atomic::{AtomicBool, Ordering};

use crate::serial::SerialPort;
use crate::shell::ShellCore;

/// Period matching the 128 Hz timer overflow rate.
pub const TICK_PERIOD: Duration = Duration::from_nanos(7_812_500);

/// Running tick driver. Dropping it stops the driver thread.
pub struct Ticker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Start driving `core.tick_isr()` every `period`.
    pub fn start<P: SerialPort>(core: ShellCore<P>, period: Duration) -> std::io::Result<Ticker> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let handle = std::thread::Builder::new()
            .name("tick".into())
            .spawn(move || {
                while !flag.load(Ordering::Acquire) {
                    std::thread::sleep(period);
                    core.tick_isr();
                }
            })?;
        Ok(Ticker {
            stop,
            handle: Some(handle),
        })
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
