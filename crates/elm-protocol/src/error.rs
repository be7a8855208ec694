//! ELM327 Link Error Types

use thiserror::Error;

/// Errors that can occur on an adapter link
///
/// The reply assembler never fails; these cover the transport and the
/// session that drives it.
#[derive(Debug, Error)]
pub enum ElmError {
    /// Serial port could not be opened or read
    #[error("Serial port error: {0}")]
    Serial(String),

    /// No complete reply arrived in time
    #[error("Timeout waiting for adapter reply after {0}ms")]
    Timeout(u64),

    /// No transport is attached to the session
    #[error("Adapter is not connected")]
    NotConnected,

    /// The link's writer side has gone away
    #[error("Adapter link closed")]
    LinkClosed,
}

impl From<std::io::Error> for ElmError {
    fn from(err: std::io::Error) -> Self {
        ElmError::Serial(err.to_string())
    }
}

impl From<tokio_serial::Error> for ElmError {
    fn from(err: tokio_serial::Error) -> Self {
        ElmError::Serial(err.to_string())
    }
}
