//! Crate error type.
//!
//! Deliberately small. Per-frame faults (short frames, bad CRCs,
//! malformed addresses, watchdog resets) are recovered invisibly inside
//! [`crate::hdlc::HdlcFramer`] and never become an `Ax25Error` — they
//! surface, if at all, as `Record { valid: false, .. }` data, not as an
//! `Err`. This type exists for failures the facade itself can't recover
//! from: bad configuration, and I/O in the `ax25dump` demonstrator.

use thiserror::Error;

/// Errors the facade itself cannot recover from.
#[derive(Debug, Error)]
pub enum Ax25Error {
    /// A watchdog timeout of zero was configured; the state machine would
    /// never be able to arm it.
    #[error("watchdog timeout must be positive")]
    InvalidTimeout,

    /// I/O failure, surfaced only by the `ax25dump` demonstrator binary.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, Ax25Error>;
