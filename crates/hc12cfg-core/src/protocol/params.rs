//! Module parameters
//!
//! Closed enumerations for everything the HC-12 can be configured with.
//! All wire mappings are fixed by the datasheet and encoded as match
//! tables, never computed from arbitrary input.

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// UART baud rates supported by the module.
///
/// This also sets the air baud rate in FU3 mode; see the datasheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BaudRate {
    /// 1200 bps
    Bps1200,
    /// 2400 bps
    Bps2400,
    /// 4800 bps
    Bps4800,
    /// 9600 bps (module factory default)
    Bps9600,
    /// 19200 bps
    Bps19200,
    /// 38400 bps
    Bps38400,
    /// 57600 bps
    Bps57600,
    /// 115200 bps
    Bps115200,
}

impl BaudRate {
    /// All rates in ascending order, matching the negotiation sweep.
    pub const ALL: [BaudRate; 8] = [
        BaudRate::Bps1200,
        BaudRate::Bps2400,
        BaudRate::Bps4800,
        BaudRate::Bps9600,
        BaudRate::Bps19200,
        BaudRate::Bps38400,
        BaudRate::Bps57600,
        BaudRate::Bps115200,
    ];

    /// Rate the module ships with.
    pub const FACTORY_DEFAULT: BaudRate = BaudRate::Bps9600;

    /// Numeric rate in bits per second.
    pub fn bps(self) -> u32 {
        match self {
            BaudRate::Bps1200 => 1200,
            BaudRate::Bps2400 => 2400,
            BaudRate::Bps4800 => 4800,
            BaudRate::Bps9600 => 9600,
            BaudRate::Bps19200 => 19200,
            BaudRate::Bps38400 => 38400,
            BaudRate::Bps57600 => 57600,
            BaudRate::Bps115200 => 115200,
        }
    }

    /// Look up a standard rate by its numeric value.
    pub fn from_bps(bps: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|rate| rate.bps() == bps)
    }
}

/// Transmission power levels.
///
/// Totally ordered; each level maps to a fixed dBm figure and wire code
/// 1..=8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TransmissionPower {
    /// -1 dBm (0.8 mW)
    DbmMinus1,
    /// 2 dBm (1.6 mW)
    Dbm2,
    /// 5 dBm (3.2 mW)
    Dbm5,
    /// 8 dBm (6.3 mW)
    Dbm8,
    /// 11 dBm (12 mW)
    Dbm11,
    /// 14 dBm (25 mW)
    Dbm14,
    /// 17 dBm (50 mW)
    Dbm17,
    /// 20 dBm (100 mW, module factory default)
    Dbm20,
}

impl TransmissionPower {
    /// All levels in ascending order.
    pub const ALL: [TransmissionPower; 8] = [
        TransmissionPower::DbmMinus1,
        TransmissionPower::Dbm2,
        TransmissionPower::Dbm5,
        TransmissionPower::Dbm8,
        TransmissionPower::Dbm11,
        TransmissionPower::Dbm14,
        TransmissionPower::Dbm17,
        TransmissionPower::Dbm20,
    ];

    /// Level digit used in `AT+P` commands.
    pub fn wire_code(self) -> u8 {
        match self {
            TransmissionPower::DbmMinus1 => 1,
            TransmissionPower::Dbm2 => 2,
            TransmissionPower::Dbm5 => 3,
            TransmissionPower::Dbm8 => 4,
            TransmissionPower::Dbm11 => 5,
            TransmissionPower::Dbm14 => 6,
            TransmissionPower::Dbm17 => 7,
            TransmissionPower::Dbm20 => 8,
        }
    }

    /// Output power in dBm.
    pub fn dbm(self) -> i8 {
        match self {
            TransmissionPower::DbmMinus1 => -1,
            TransmissionPower::Dbm2 => 2,
            TransmissionPower::Dbm5 => 5,
            TransmissionPower::Dbm8 => 8,
            TransmissionPower::Dbm11 => 11,
            TransmissionPower::Dbm14 => 14,
            TransmissionPower::Dbm17 => 17,
            TransmissionPower::Dbm20 => 20,
        }
    }

    /// Output power in milliwatts, for display.
    pub fn milliwatts(self) -> f32 {
        match self {
            TransmissionPower::DbmMinus1 => 0.8,
            TransmissionPower::Dbm2 => 1.6,
            TransmissionPower::Dbm5 => 3.2,
            TransmissionPower::Dbm8 => 6.3,
            TransmissionPower::Dbm11 => 12.0,
            TransmissionPower::Dbm14 => 25.0,
            TransmissionPower::Dbm17 => 50.0,
            TransmissionPower::Dbm20 => 100.0,
        }
    }

    /// Look up a level by its dBm figure.
    pub fn from_dbm(dbm: i8) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.dbm() == dbm)
    }
}

/// Transmission mode profiles, trading UART/air rate against idle power.
///
/// Mutually exclusive; exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransmissionMode {
    /// Moderate power saving, air rate fixed at 250 kbps, ~3.6 mA idle.
    Fu1,
    /// Deep power saving, UART limited to 1200/2400/4800 bps, ~80 µA idle.
    Fu2,
    /// Full speed (factory default): flexible air rate, ~16 mA idle.
    Fu3,
    /// Ultra long range: UART fixed at 1200 bps, air rate 500 bps.
    Fu4,
}

impl TransmissionMode {
    /// Mode digit used in `AT+FU` commands.
    pub fn wire_code(self) -> u8 {
        match self {
            TransmissionMode::Fu1 => 1,
            TransmissionMode::Fu2 => 2,
            TransmissionMode::Fu3 => 3,
            TransmissionMode::Fu4 => 4,
        }
    }

    /// Look up a mode by its digit.
    pub fn from_wire_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(TransmissionMode::Fu1),
            2 => Some(TransmissionMode::Fu2),
            3 => Some(TransmissionMode::Fu3),
            4 => Some(TransmissionMode::Fu4),
            _ => None,
        }
    }
}

/// Validated RF channel number.
///
/// Channels step 400 kHz from 433.4 MHz. The module accepts 1..=127,
/// though the datasheet recommends staying at or below 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Channel(u8);

impl Channel {
    /// Lowest valid channel.
    pub const MIN: u8 = 1;
    /// Highest valid channel.
    pub const MAX: u8 = 127;

    /// Validate a raw channel number. Rejection happens here, before any
    /// transport I/O.
    pub fn new(channel: u8) -> Result<Self, ConfigError> {
        if (Self::MIN..=Self::MAX).contains(&channel) {
            Ok(Self(channel))
        } else {
            Err(ConfigError::InvalidParameter(format!(
                "channel {} outside {}..={}",
                channel,
                Self::MIN,
                Self::MAX
            )))
        }
    }

    /// The raw channel number.
    pub fn get(self) -> u8 {
        self.0
    }
}

/// Diagnostic verbosity carried by a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Verbosity {
    /// Echo unexpected incoming bytes to the diagnostic sink.
    pub show_unexpected_bytes: bool,
    /// Print activity messages to the diagnostic sink.
    pub log_activity: bool,
    pub(crate) baud_confirmed: bool,
}

impl Verbosity {
    /// Whether baud negotiation has succeeded this session, i.e. the
    /// transport's rate is known-good. Never reset mid-session.
    pub fn baud_confirmed(&self) -> bool {
        self.baud_confirmed
    }
}

impl Default for Verbosity {
    fn default() -> Self {
        Self {
            show_unexpected_bytes: true,
            log_activity: true,
            baud_confirmed: false,
        }
    }
}
