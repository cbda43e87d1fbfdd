//! Session management
//!
//! Holds the long-lived state for one wired-up module and drives the whole
//! configuration flow: command-mode entry via the SET line, baud rate
//! negotiation, query-before-set parameter configuration, and the guarded
//! return to transparent mode.

use serde::{Deserialize, Serialize};
use std::io;

use super::commands;
use super::reader::{ReadOutcome, ResponseReader, RESPONSE_WAIT_CYCLES, TERMINATOR_WAIT_CYCLES};
use super::{BaudRate, Channel, ConfigError, TransmissionMode, TransmissionPower, Verbosity};
use crate::transport::{Clock, ControlLine, Level, Transport};

/// Settle delay after asserting the SET line, before the module accepts
/// commands.
pub const ENTER_SETTLE_MS: u64 = 40;

/// Guard delay after releasing the SET line. Deliberately well above the
/// 80 ms the module needs: releasing and quickly re-asserting the line can
/// bounce the module straight back into command mode at its default UART
/// settings.
pub const EXIT_GUARD_MS: u64 = 220;

/// Settle delay after retuning the local port during negotiation.
pub const BAUD_CHANGE_SETTLE_MS: u64 = 10;

/// Collection window for the full configuration dump (`AT+RX`).
pub const READ_CONFIG_WINDOW_MS: u64 = 300;

/// Module state as tracked by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModeState {
    /// SET line released; serial bytes are relayed over the air.
    Transparent,
    /// SET line asserted, settle/negotiation in progress.
    Entering,
    /// Handshake confirmed; AT commands are accepted.
    CommandMode,
    /// SET line released, guard delay in progress.
    Exiting,
}

/// Session configuration.
///
/// All hardware timing lives here as named values so it can be tuned per
/// target without touching protocol logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Baud rate to fall back to locally when command mode turns out to be
    /// unavailable. `None` disables the fallback.
    pub fallback_baud: Option<u32>,

    /// Wait budget (1 ms cycles) for the transport to report write
    /// readiness before a command. 0 disables the wait, which is required
    /// for transports that never report readiness.
    pub write_ready_cycles: u32,

    /// Settle delay after asserting the SET line.
    pub enter_settle_ms: u64,

    /// Guard delay after releasing the SET line.
    pub exit_guard_ms: u64,

    /// Settle delay after each local baud change in the negotiation sweep.
    pub baud_settle_ms: u64,

    /// Wait budget (1 ms cycles) for an expected response.
    pub response_cycles: u32,

    /// Wait budget (1 ms cycles) for trailing-terminator consumption.
    pub terminator_cycles: u32,

    /// Collection window for the full configuration dump.
    pub read_config_window_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            fallback_baud: Some(BaudRate::FACTORY_DEFAULT.bps()),
            write_ready_cycles: 0,
            enter_settle_ms: ENTER_SETTLE_MS,
            exit_guard_ms: EXIT_GUARD_MS,
            baud_settle_ms: BAUD_CHANGE_SETTLE_MS,
            response_cycles: RESPONSE_WAIT_CYCLES,
            terminator_cycles: TERMINATOR_WAIT_CYCLES,
            read_config_window_ms: READ_CONFIG_WINDOW_MS,
        }
    }
}

/// One pass worth of settings for [`Session::apply`].
///
/// Parameters left as `None` are not touched. Configuration order is fixed:
/// channel, power, mode, and baud rate last, because a confirmed baud set
/// retunes the transport itself.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ModuleSettings {
    /// UART/air baud rate.
    pub baud: Option<BaudRate>,
    /// RF channel.
    pub channel: Option<Channel>,
    /// Transmission power level.
    pub power: Option<TransmissionPower>,
    /// Transmission mode profile.
    pub mode: Option<TransmissionMode>,
}

/// A configuration session against one wired-up module.
///
/// The session never owns its collaborators; it is handed the transport,
/// clock, optional SET line, and optional diagnostic sink at construction
/// and keeps only its own mutable [`Verbosity`] and mode state across
/// calls. Must not be driven from two execution contexts at once: the wire
/// protocol has no multiplexing, and interleaved exchanges desynchronize
/// response matching.
pub struct Session<'a> {
    transport: &'a mut dyn Transport,
    clock: &'a mut dyn Clock,
    set_line: Option<&'a mut dyn ControlLine>,
    sink: Option<&'a mut dyn io::Write>,
    config: SessionConfig,
    verbosity: Verbosity,
    state: ModeState,
}

impl<'a> Session<'a> {
    /// Create a session. Without a SET line (see [`Session::with_set_line`])
    /// every configuration call fails with [`ConfigError::NotWired`].
    pub fn new(
        transport: &'a mut dyn Transport,
        clock: &'a mut dyn Clock,
        config: SessionConfig,
    ) -> Self {
        Self {
            transport,
            clock,
            set_line: None,
            sink: None,
            config,
            verbosity: Verbosity::default(),
            state: ModeState::Transparent,
        }
    }

    /// Wire up the control line connected to the module's SET pin.
    pub fn with_set_line(mut self, set_line: &'a mut dyn ControlLine) -> Self {
        self.set_line = Some(set_line);
        self
    }

    /// Attach a diagnostic sink for activity messages and unexpected bytes.
    pub fn with_sink(mut self, sink: &'a mut dyn io::Write) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Configure diagnostic verbosity for subsequent calls.
    pub fn set_verbosity(&mut self, log_activity: bool, show_unexpected_bytes: bool) {
        self.verbosity.log_activity = log_activity;
        self.verbosity.show_unexpected_bytes = show_unexpected_bytes;
    }

    /// Current verbosity, including whether the baud is known-good.
    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Current mode state.
    pub fn state(&self) -> ModeState {
        self.state
    }

    /// Apply the given settings in one command-mode pass.
    ///
    /// All requested parameters are attempted even if one fails; command
    /// mode is always exited, and the first error (if any) is returned.
    pub fn apply(&mut self, settings: &ModuleSettings) -> Result<(), ConfigError> {
        let target = settings.baud.unwrap_or(BaudRate::FACTORY_DEFAULT);
        self.enter_command_mode(target)?;

        let mut first_error: Option<ConfigError> = None;
        if let Some(channel) = settings.channel {
            if let Err(e) = self.configure_channel(channel) {
                first_error.get_or_insert(e);
            }
        }
        if let Some(power) = settings.power {
            if let Err(e) = self.configure_power(power) {
                first_error.get_or_insert(e);
            }
        }
        if let Some(mode) = settings.mode {
            if let Err(e) = self.configure_mode(mode) {
                first_error.get_or_insert(e);
            }
        }
        if let Some(baud) = settings.baud {
            // last, as a confirmed set retunes the transport itself
            if let Err(e) = self.configure_baud(baud) {
                first_error.get_or_insert(e);
            }
        }

        let exit_result = self.exit_command_mode();
        match first_error {
            // the configuration error is the one the caller can act on; an
            // exit failure on top of it is only logged
            Some(e) => {
                if let Err(exit_err) = exit_result {
                    tracing::debug!(%exit_err, "command mode exit failed after configuration error");
                }
                Err(e)
            }
            None => exit_result,
        }
    }

    /// Configure the module's (and the transport's) baud rate.
    pub fn set_baud_rate(&mut self, baud: BaudRate) -> Result<(), ConfigError> {
        self.apply(&ModuleSettings {
            baud: Some(baud),
            ..Default::default()
        })
    }

    /// Configure the RF channel. Range-checked before any transport I/O.
    pub fn set_channel(&mut self, channel: u8) -> Result<(), ConfigError> {
        let channel = Channel::new(channel)?;
        self.apply(&ModuleSettings {
            channel: Some(channel),
            ..Default::default()
        })
    }

    /// Configure the transmission power.
    pub fn set_power(&mut self, power: TransmissionPower) -> Result<(), ConfigError> {
        self.apply(&ModuleSettings {
            power: Some(power),
            ..Default::default()
        })
    }

    /// Configure the transmission mode.
    pub fn set_mode(&mut self, mode: TransmissionMode) -> Result<(), ConfigError> {
        self.apply(&ModuleSettings {
            mode: Some(mode),
            ..Default::default()
        })
    }

    /// Pull the module into command mode and negotiate a working baud rate.
    ///
    /// Pending bytes are drained before and around each negotiation attempt;
    /// they are noise from stale exchanges. On success the session's
    /// `baud_confirmed` flag is set. On total failure the configured
    /// fallback baud (if any) is applied locally, the SET line is released,
    /// and [`ConfigError::HandshakeTimeout`] is returned.
    pub fn enter_command_mode(&mut self, target: BaudRate) -> Result<(), ConfigError> {
        if self.set_line.is_none() {
            return Err(ConfigError::NotWired);
        }
        self.dump_pending();
        self.log_activity("\nConfiguring HC-12: ");

        let negotiated = match self.assert_line() {
            Ok(()) => self.negotiate_baud(target),
            Err(e) => Err(e),
        };
        match negotiated {
            Ok(()) => {
                self.verbosity.baud_confirmed = true;
                self.state = ModeState::CommandMode;
                tracing::debug!("command mode entered");
                Ok(())
            }
            Err(e) => {
                if let Some(fallback) = self.config.fallback_baud {
                    self.log_activity(" -> command mode not available, setting local to fallback");
                    if let Err(fallback_err) = self.change_baud(fallback) {
                        tracing::debug!(%fallback_err, "could not apply fallback baud");
                    }
                } else {
                    self.log_activity(" -> command mode not available");
                }
                // release the line so the state machine ends Transparent
                // on every path
                self.release_after_error();
                Err(e)
            }
        }
    }

    /// Assert the SET line and wait out the settle delay.
    fn assert_line(&mut self) -> Result<(), ConfigError> {
        self.state = ModeState::Entering;
        if let Some(line) = self.set_line.as_deref_mut() {
            line.set_output_mode();
            line.write_level(Level::Low)?;
        }
        self.clock.sleep_ms(self.config.enter_settle_ms);
        Ok(())
    }

    /// Best-effort SET line release for error paths; a secondary release
    /// failure is logged, not returned.
    fn release_after_error(&mut self) {
        if let Err(exit_err) = self.exit_command_mode() {
            tracing::debug!(%exit_err, "SET line release failed");
        }
    }

    /// Release the SET line and wait out the guard interval.
    pub fn exit_command_mode(&mut self) -> Result<(), ConfigError> {
        self.state = ModeState::Exiting;
        if let Some(line) = self.set_line.as_deref_mut() {
            line.write_level(Level::High)?;
        }
        self.clock.sleep_ms(self.config.exit_guard_ms);
        self.state = ModeState::Transparent;
        Ok(())
    }

    /// Dump the module's full configuration into `buf`.
    ///
    /// Requires a known-good baud rate, so best called after one of the
    /// `set_*` operations. Collects response bytes for a bounded window,
    /// stripping the repeated `OK+` prefixes, and returns the number of
    /// bytes written. A full buffer ends collection early. The SET line is
    /// released even when collection fails.
    pub fn read_configuration(&mut self, buf: &mut [u8]) -> Result<usize, ConfigError> {
        if self.set_line.is_none() {
            return Err(ConfigError::NotWired);
        }
        self.dump_pending();
        let collected = match self.assert_line() {
            Ok(()) => {
                self.state = ModeState::CommandMode;
                self.collect_configuration(buf)
            }
            Err(e) => Err(e),
        };
        match collected {
            Ok(pos) => {
                self.exit_command_mode()?;
                Ok(pos)
            }
            Err(e) => {
                self.release_after_error();
                Err(e)
            }
        }
    }

    fn collect_configuration(&mut self, buf: &mut [u8]) -> Result<usize, ConfigError> {
        self.send_command(commands::READ_ALL.as_bytes())?;

        let start = self.clock.now_ms();
        let mut pos = 0usize;
        loop {
            while self.transport.available() > 0 && pos < buf.len() {
                let Some(byte) = self.transport.read_byte() else {
                    break;
                };
                buf[pos] = byte;
                pos += 1;
                if pos >= 3 && &buf[pos - 3..pos] == b"OK+" {
                    pos -= 3;
                }
            }
            if pos >= buf.len() {
                break;
            }
            // the deadline only bounds the wait for silence; bytes already
            // on the line are still drained
            let elapsed =
                self.clock.now_ms().saturating_sub(start) >= self.config.read_config_window_ms;
            if elapsed && self.transport.available() == 0 {
                break;
            }
            self.clock.sleep_ms(1);
        }
        Ok(pos)
    }

    /// Try the handshake at the rates most likely to work, then sweep.
    ///
    /// Order: the transport's current rate (only if it is listening), the
    /// caller's target, the factory default, then all standard rates
    /// ascending. The sweep uses strict matching; the earlier attempts
    /// tolerate noise from a mistuned link.
    fn negotiate_baud(&mut self, target: BaudRate) -> Result<(), ConfigError> {
        if self.transport.is_listening() && self.attempt_handshake(true)? {
            return Ok(());
        }

        self.dump_pending();
        self.change_baud(target.bps())?;
        if self.attempt_handshake(true)? {
            self.log_activity("  hc12serial found at preferred baudrate, ");
            return Ok(());
        }

        self.change_baud(BaudRate::FACTORY_DEFAULT.bps())?;
        if self.attempt_handshake(true)? {
            self.log_activity("  hc12serial found at 9600 baud, ");
            return Ok(());
        }

        for rate in BaudRate::ALL {
            self.change_baud(rate.bps())?;
            self.transport.flush()?;
            self.clock.sleep_ms(self.config.baud_settle_ms);
            self.dump_pending();
            if self.attempt_handshake(false)? {
                self.log_activity(&format!(" found hc12serial at {} baud, ", rate.bps()));
                return Ok(());
            }
        }

        Err(ConfigError::HandshakeTimeout)
    }

    /// One `AT` → `OK` exchange. Write-readiness trouble counts as a plain
    /// miss so the negotiation ladder moves on to its next rung.
    fn attempt_handshake(&mut self, tolerant: bool) -> Result<bool, ConfigError> {
        match self.send_validated(
            commands::COMMAND_AT.as_bytes(),
            commands::RESPONSE_OK.as_bytes(),
            tolerant,
        ) {
            Ok(outcome) => Ok(outcome.is_match()),
            Err(ConfigError::WriteNotReady) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Query-before-set primitive shared by every parameter.
    ///
    /// If the query response already carries the expected value, nothing is
    /// written (the module stores settings in EEPROM; redundant sets wear
    /// it). Otherwise the rest of the query response is flushed and the set
    /// command is sent and validated against its echoed value.
    #[allow(clippy::too_many_arguments)]
    fn configure(
        &mut self,
        query_cmd: &str,
        query_ok_prefix: &str,
        expected_value: &str,
        set_cmd: &str,
        value: &str,
        set_ok_prefix: &str,
        label: &str,
    ) -> Result<(), ConfigError> {
        self.send_command(query_cmd.as_bytes())?;
        let prefix_seen = self
            .reader()
            .read_expected(query_ok_prefix.as_bytes(), false, false)
            .is_match();
        let already = prefix_seen
            && self
                .reader()
                .read_expected(expected_value.as_bytes(), false, true)
                .is_match();
        if already {
            self.log_activity(&format!("  {}{} already set\n", label, expected_value));
            return Ok(());
        }

        // discard the remainder of the query response; the module rejects
        // set commands while its previous answer is still in flight
        self.reader().consume_line(true);
        self.dump_pending();

        let command = format!("{}{}", set_cmd, value);
        match self.send_validated(command.as_bytes(), set_ok_prefix.as_bytes(), false) {
            Ok(outcome) if outcome.is_match() => {
                if self
                    .reader()
                    .read_expected(value.as_bytes(), false, true)
                    .is_match()
                {
                    self.log_activity(&format!("  successfully set {}{}\n", label, value));
                    Ok(())
                } else {
                    self.log_activity(&format!("unexpected response to {}\n", command));
                    tracing::debug!(%command, "set command not acknowledged");
                    Err(ConfigError::UnexpectedResponse)
                }
            }
            Ok(_) => {
                self.log_activity(&format!("unexpected response to {}\n", command));
                tracing::debug!(%command, "set command not acknowledged");
                Err(ConfigError::UnexpectedResponse)
            }
            Err(e) => {
                self.log_activity(&format!("failed sending command {}\n", command));
                Err(e)
            }
        }
    }

    fn configure_baud(&mut self, baud: BaudRate) -> Result<(), ConfigError> {
        let value = commands::baud_value(baud);
        let result = self.configure(
            commands::QUERY_BAUD,
            commands::OK_BAUD,
            &value,
            commands::SET_BAUD,
            &value,
            commands::OK_BAUD,
            "baudrate ",
        );
        match result {
            // retune the local side only after the module confirmed
            Ok(()) => self.change_baud(baud.bps()),
            Err(e) => {
                if let Some(fallback) = self.config.fallback_baud {
                    self.log_activity("  setting baudrate to fallback\n");
                    self.change_baud(fallback)?;
                }
                Err(e)
            }
        }
    }

    fn configure_channel(&mut self, channel: Channel) -> Result<(), ConfigError> {
        let value = commands::channel_value(channel);
        self.configure(
            commands::QUERY_CHANNEL,
            commands::OK_QUERY_CHANNEL,
            &value,
            commands::SET_CHANNEL,
            &value,
            commands::OK_SET_CHANNEL,
            "channel ",
        )
    }

    fn configure_power(&mut self, power: TransmissionPower) -> Result<(), ConfigError> {
        // the query echoes dBm, the set echoes the level digit
        let query_value = commands::power_query_value(power);
        let set_value = commands::power_set_value(power);
        self.configure(
            commands::QUERY_POWER,
            commands::OK_QUERY_POWER,
            &query_value,
            commands::SET_POWER,
            &set_value,
            commands::OK_SET_POWER,
            "transmission power ",
        )
    }

    fn configure_mode(&mut self, mode: TransmissionMode) -> Result<(), ConfigError> {
        let value = commands::mode_value(mode);
        self.configure(
            commands::QUERY_MODE,
            commands::OK_MODE,
            &value,
            commands::SET_MODE,
            &value,
            commands::OK_MODE,
            "transmission mode FU",
        )
    }

    /// Write a command and wait for the expected response.
    ///
    /// When tolerant and a write-ready budget is configured, first waits for
    /// the transport to accept writes; budget exhaustion fails fast with
    /// nothing transmitted.
    fn send_validated(
        &mut self,
        command: &[u8],
        expected: &[u8],
        tolerant: bool,
    ) -> Result<ReadOutcome, ConfigError> {
        if tolerant && self.config.write_ready_cycles > 0 {
            let mut cycles = self.config.write_ready_cycles;
            while !self.transport.available_for_write() && cycles > 0 {
                cycles -= 1;
                self.clock.sleep_ms(1);
            }
            if cycles == 0 {
                self.log_activity("hc12serial not available for write");
                return Err(ConfigError::WriteNotReady);
            }
        }
        self.send_command(command)?;
        Ok(self.reader().read_expected(expected, tolerant, false))
    }

    /// Write the literal bytes and block until physically transmitted.
    fn send_command(&mut self, command: &[u8]) -> Result<(), ConfigError> {
        self.transport.write(command)?;
        self.transport.flush()?;
        Ok(())
    }

    /// Retune the local side, never losing pending transmit bytes.
    fn change_baud(&mut self, baud: u32) -> Result<(), ConfigError> {
        self.transport.flush()?;
        self.transport.set_baud(baud)?;
        self.log_activity(&format!("  set serial-baudrate to {}\n", baud));
        Ok(())
    }

    fn reader(&mut self) -> ResponseReader<'_> {
        let reader = ResponseReader::new(&mut *self.transport, &mut *self.clock)
            .with_budget(self.config.response_cycles, self.config.terminator_cycles);
        match self.sink.as_deref_mut() {
            Some(sink) => reader.with_sink(sink, self.verbosity.show_unexpected_bytes),
            None => reader,
        }
    }

    /// Drain bytes left over from a stale exchange, echoing them to the
    /// sink when unexpected-byte logging is on.
    fn dump_pending(&mut self) {
        let echo = self.verbosity.show_unexpected_bytes && self.sink.is_some();
        if echo && self.transport.available() > 0 {
            if let Some(sink) = self.sink.as_deref_mut() {
                let _ = sink.write_all(b"<unexpected>");
            }
            while self.transport.available() > 0 {
                let Some(byte) = self.transport.read_byte() else {
                    break;
                };
                if let Some(sink) = self.sink.as_deref_mut() {
                    let _ = sink.write_all(&[byte]);
                }
            }
            if let Some(sink) = self.sink.as_deref_mut() {
                let _ = sink.write_all(b"</unexpected>\n");
            }
        } else {
            while self.transport.available() > 0 {
                if self.transport.read_byte().is_none() {
                    break;
                }
            }
        }
    }

    fn log_activity(&mut self, message: &str) {
        if self.verbosity.log_activity {
            if let Some(sink) = self.sink.as_deref_mut() {
                let _ = sink.write_all(message.as_bytes());
            }
        }
    }
}
