//! Error handling for the cooperative core.
//!
//! The core surfaces exactly one recoverable error across its public
//! contract: wake-slot exhaustion on the tick clock. Everything else is
//! either handled locally (torn tick reads, dropped pipe writes) or is a
//! documented precondition violation that aborts through the diagnostic
//! dump instead of returning.

use core::fmt;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Top-level error type for core operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreError {
    /// Wake registration errors from the tick clock.
    Wake(WakeError),
}

/// Errors that can occur when registering a tick-deadline wake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeError {
    /// All notification slots are occupied. The caller must degrade to
    /// polling `now()` against its own deadline.
    CapacityExceeded,
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::Wake(e) => write!(f, "wake registration error: {}", e),
        }
    }
}

impl fmt::Display for WakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WakeError::CapacityExceeded => write!(f, "all wake slots are occupied"),
        }
    }
}

impl From<WakeError> for CoreError {
    fn from(error: WakeError) -> Self {
        CoreError::Wake(error)
    }
}

impl std::error::Error for CoreError {}
impl std::error::Error for WakeError {}
