//! Error types for serial port access
//!
//! Every failure is returned to the immediate caller. Nothing here is logged
//! or retried; the [`ErrorKind`] classifier lets callers pick a policy.

use std::io;

use thiserror::Error;

use crate::frequency::Frequency;

/// Result alias used throughout the crate
pub type Result<T, E = SerialError> = std::result::Result<T, E>;

/// Broad classification of a [`SerialError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The platform or device cannot do what was asked
    CapabilityAbsent,
    /// A requested setting is outside the supported range
    InvalidConfig,
    /// The port is in the wrong lifecycle state for the operation
    StateConflict,
    /// The operating system reported a failure
    Io,
}

/// Errors returned by ports, connections and the device enumerator
#[derive(Debug, Error)]
pub enum SerialError {
    #[error("sysfs-uart: not implemented")]
    NotImplemented,

    #[error("sysfs-uart: {0} is not supported on this platform")]
    Unsupported(&'static str),

    #[error("sysfs-uart: invalid speed {0}; maximum supported clock is 1GHz")]
    SpeedTooHigh(Frequency),

    #[error(
        "sysfs-uart: invalid speed {0}; minimum supported clock is 50Hz; did you forget to multiply by KILOHERTZ?"
    )]
    SpeedTooLow(Frequency),

    #[error("sysfs-uart: invalid bits {0}; must be between 5 and 8")]
    InvalidBits(u8),

    #[error("sysfs-uart: already closed")]
    AlreadyClosed,

    #[error("sysfs-uart: already connected")]
    AlreadyConnected,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl SerialError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SerialError::NotImplemented | SerialError::Unsupported(_) => {
                ErrorKind::CapabilityAbsent
            }
            SerialError::SpeedTooHigh(_)
            | SerialError::SpeedTooLow(_)
            | SerialError::InvalidBits(_) => ErrorKind::InvalidConfig,
            SerialError::AlreadyClosed | SerialError::AlreadyConnected => {
                ErrorKind::StateConflict
            }
            SerialError::Io(_) => ErrorKind::Io,
        }
    }
}

impl From<SerialError> for io::Error {
    fn from(err: SerialError) -> Self {
        match err {
            SerialError::Io(e) => e,
            SerialError::NotImplemented | SerialError::Unsupported(_) => {
                io::Error::new(io::ErrorKind::Unsupported, err)
            }
            SerialError::SpeedTooHigh(_)
            | SerialError::SpeedTooLow(_)
            | SerialError::InvalidBits(_) => io::Error::new(io::ErrorKind::InvalidInput, err),
            SerialError::AlreadyClosed | SerialError::AlreadyConnected => io::Error::other(err),
        }
    }
}
