//! AT command literals
//!
//! Everything the module understands, bit-exact. Commands are plain ASCII;
//! only the handshake carries a CR LF terminator (without it the module
//! cannot tell `AT` apart from the start of a longer command). Responses
//! are always CR LF terminated, and set/query acknowledgements echo the
//! value with no separator.

use super::{BaudRate, Channel, TransmissionMode, TransmissionPower};

/// Handshake command.
pub const COMMAND_AT: &str = "AT\r\n";
/// Handshake success response.
pub const RESPONSE_OK: &str = "OK\r\n";

/// Query the configured baud rate; answered with [`OK_BAUD`] + value.
pub const QUERY_BAUD: &str = "AT+RB";
/// Set-baud command stem; the decimal rate is appended.
pub const SET_BAUD: &str = "AT+B";
/// Acknowledgement prefix for both baud query and set.
pub const OK_BAUD: &str = "OK+B";

/// Query the RF channel; answered with [`OK_QUERY_CHANNEL`] + value.
pub const QUERY_CHANNEL: &str = "AT+RC";
/// Set-channel command stem; the zero-padded channel is appended.
pub const SET_CHANNEL: &str = "AT+C";
/// Acknowledgement prefix for the channel query.
pub const OK_QUERY_CHANNEL: &str = "OK+RC";
/// Acknowledgement prefix for the channel set.
pub const OK_SET_CHANNEL: &str = "OK+C";

/// Query the transmission power; answered with [`OK_QUERY_POWER`] + dBm value.
pub const QUERY_POWER: &str = "AT+RP";
/// Set-power command stem; the level digit is appended.
pub const SET_POWER: &str = "AT+P";
/// Acknowledgement prefix for the power query (note the colon).
pub const OK_QUERY_POWER: &str = "OK+RP:";
/// Acknowledgement prefix for the power set.
pub const OK_SET_POWER: &str = "OK+P";

/// Query the transmission mode; answered with [`OK_MODE`] + digit.
pub const QUERY_MODE: &str = "AT+RF";
/// Set-mode command stem; the mode digit is appended.
pub const SET_MODE: &str = "AT+FU";
/// Acknowledgement prefix for both mode query and set.
pub const OK_MODE: &str = "OK+FU";

/// Dump the full module configuration (four CR LF terminated lines).
pub const READ_ALL: &str = "AT+RX\r\n";

/// Decimal baud value, e.g. `9600`.
pub fn baud_value(baud: BaudRate) -> String {
    baud.bps().to_string()
}

/// Three-digit zero-padded channel value, e.g. `021`.
pub fn channel_value(channel: Channel) -> String {
    format!("{:03}", channel.get())
}

/// Single level digit for `AT+P`, e.g. `6`.
pub fn power_set_value(power: TransmissionPower) -> String {
    power.wire_code().to_string()
}

/// Signed fixed-width dBm value as echoed by the power query,
/// e.g. `+14dBm` or `-01dBm`.
pub fn power_query_value(power: TransmissionPower) -> String {
    format!("{:+03}dBm", power.dbm())
}

/// Single mode digit for `AT+FU`, e.g. `3`.
pub fn mode_value(mode: TransmissionMode) -> String {
    format!("{}", mode.wire_code())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baud_value_plain_decimal() {
        assert_eq!(baud_value(BaudRate::Bps1200), "1200");
        assert_eq!(baud_value(BaudRate::Bps115200), "115200");
    }

    #[test]
    fn test_channel_value_zero_padded() {
        let ch = Channel::new(21).unwrap();
        assert_eq!(channel_value(ch), "021");
        let ch = Channel::new(127).unwrap();
        assert_eq!(channel_value(ch), "127");
    }

    #[test]
    fn test_power_values() {
        assert_eq!(power_set_value(TransmissionPower::Dbm14), "6");
        assert_eq!(power_query_value(TransmissionPower::Dbm14), "+14dBm");
        assert_eq!(power_query_value(TransmissionPower::Dbm2), "+02dBm");
        // Sign counts toward the width, so -1 dBm pads to two digits
        assert_eq!(power_query_value(TransmissionPower::DbmMinus1), "-01dBm");
        assert_eq!(power_query_value(TransmissionPower::Dbm20), "+20dBm");
    }

    #[test]
    fn test_mode_value() {
        assert_eq!(mode_value(TransmissionMode::Fu1), "1");
        assert_eq!(mode_value(TransmissionMode::Fu4), "4");
    }
}
