//! Error types for the remote session capability

use thiserror::Error;

/// How a caller should react to a [`RemoteError`]
///
/// The dispatcher matches on this instead of on individual variants, so new
/// transport failures only need to pick the bucket they belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The session dropped mid-command; reconnecting and resending may work
    SessionBroken,
    /// The device answered but refused the command, so it is powered and reachable
    Rejected,
    /// The device could not be contacted at all
    Unreachable,
    /// The value handed to the device was malformed
    InvalidValue,
}

/// Errors that can occur while talking to the device
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The remote end closed the session
    #[error("Session closed by device: {0}")]
    ConnectionClosed(String),

    /// Write on a half-closed socket, typically when keys are sent too fast
    #[error("Broken pipe while sending to device")]
    BrokenPipe,

    /// The device replied with something the session did not understand
    #[error("Unhandled response from device: {0}")]
    UnhandledResponse(String),

    /// The device refused to pair with or obey this controller
    #[error("Access denied by device")]
    AccessDenied,

    /// Network-level failure (refused, unreachable, reset)
    #[error("Device unreachable: {0}")]
    Unreachable(#[from] std::io::Error),

    /// No answer within the configured timeout
    #[error("Timed out waiting for device")]
    Timeout,

    /// Property value the device (or the session) could not accept
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

impl RemoteError {
    /// Classify this error for retry and power-state decisions
    pub fn kind(&self) -> ErrorKind {
        match self {
            RemoteError::ConnectionClosed(_) | RemoteError::BrokenPipe => ErrorKind::SessionBroken,
            RemoteError::UnhandledResponse(_) | RemoteError::AccessDenied => ErrorKind::Rejected,
            RemoteError::Unreachable(_) | RemoteError::Timeout => ErrorKind::Unreachable,
            RemoteError::InvalidValue(_) => ErrorKind::InvalidValue,
        }
    }
}

/// Type alias for results that can return a RemoteError
pub type Result<T> = std::result::Result<T, RemoteError>;
