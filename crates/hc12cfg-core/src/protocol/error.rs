//! Protocol errors

use thiserror::Error;

/// Errors that can occur while configuring the module.
///
/// None of these are fatal to the process: every failure is recovered
/// locally and the caller decides whether to retry a configuration pass.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No SET line (or no transport) is wired up; the operation was a no-op.
    #[error("module not wired: no SET line configured")]
    NotWired,

    /// No valid handshake response within the wait budget at any tried baud.
    #[error("command mode not available: no handshake response at any baud rate")]
    HandshakeTimeout,

    /// The module answered, but not with the expected literal. The affected
    /// parameter is abandoned for this call; there is no retry.
    #[error("unexpected response from module")]
    UnexpectedResponse,

    /// The transport never became ready to write within budget; nothing was
    /// transmitted.
    #[error("transport not available for write")]
    WriteNotReady,

    /// Input rejected before any transport I/O took place.
    #[error("parameter out of range: {0}")]
    InvalidParameter(String),

    /// Opening or reconfiguring the serial port failed.
    #[error("serial port error: {0}")]
    Serial(String),

    /// Underlying transport I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
