//! # hc12cfg Core Library
//!
//! Protocol engine for configuring HC-12 wireless serial transceiver
//! modules over a half-duplex, AT-command-driven serial link.

//!
//! This library provides:
//! - Baud rate discovery across all 8 standard HC-12 rates
//! - Hardware command-mode entry/exit via the module's SET line
//! - Literal AT command exchange with tolerant resynchronization
//! - Idempotent query-before-set configuration of baud rate, RF channel,
//!   transmission power, and transmission mode
//!
//! The engine is single-threaded and blocking: the HC-12 exposes no framing
//! and no read-with-timeout primitive, so every wait is a poll-and-sleep
//! loop. Expect any configuration call to stall the caller for tens to
//! hundreds of milliseconds.
//!
//! ## Example
//!
//! ```rust,ignore
//! use hc12cfg_core::prelude::*;
//!
//! let mut transport = SerialTransport::open("/dev/ttyUSB0", 9600)?;
//! let mut set_line = transport.modem_control_line(SetLineDriver::Rts)?;
//! let mut clock = SystemClock::new();
//!
//! let mut session = Session::new(&mut transport, &mut clock, SessionConfig::default())
//!     .with_set_line(&mut set_line);
//! session.set_baud_rate(BaudRate::Bps115200)?;
//! ```

#![warn(missing_docs)]

pub mod protocol;
pub mod transport;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::protocol::{
        BaudRate, Channel, ConfigError, ModeState, ModuleSettings, Session, SessionConfig,
        TransmissionMode, TransmissionPower, Verbosity,
    };
    pub use crate::transport::serial::{SerialTransport, SetLineDriver};
    pub use crate::transport::{Clock, ControlLine, Level, SystemClock, Transport};
}
