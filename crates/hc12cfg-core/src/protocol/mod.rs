//! HC-12 AT-Command Protocol
//!
//! Implements the module's configuration protocol: baud rate discovery,
//! hardware command-mode transitions, and idempotent query-before-set
//! parameter configuration.
//!
//! The wire format is literal ASCII with no framing. Every module response
//! is CR LF terminated; resynchronizing on the expected literal is the only
//! recovery from noise or stale bytes.

pub mod commands;
mod error;
mod matcher;
mod params;
mod reader;
mod session;

pub use error::ConfigError;
pub use matcher::{ByteMatcher, MatchStep};
pub use params::{BaudRate, Channel, TransmissionMode, TransmissionPower, Verbosity};
pub use reader::{ReadOutcome, ResponseReader, RESPONSE_WAIT_CYCLES, TERMINATOR_WAIT_CYCLES};
pub use session::{
    ModeState, ModuleSettings, Session, SessionConfig, BAUD_CHANGE_SETTLE_MS, ENTER_SETTLE_MS,
    EXIT_GUARD_MS, READ_CONFIG_WINDOW_MS,
};
