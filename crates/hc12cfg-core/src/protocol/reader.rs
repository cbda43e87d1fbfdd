//! Bounded response reading
//!
//! Wraps [`ByteMatcher`] with the engine's cooperative timeout: poll the
//! transport, and when nothing is available burn one wait cycle and sleep
//! 1 ms. The cycle budgets are design constants tuned for the module's
//! response latency, not hard real-time guarantees.

use std::io;

use super::matcher::{ByteMatcher, MatchStep};
use crate::transport::{Clock, Transport};

/// Default wait budget for an expected response, in 1 ms poll cycles.
pub const RESPONSE_WAIT_CYCLES: u32 = 100;

/// Default wait budget for trailing-terminator consumption. The slowest
/// response needing this is the power query, which takes at least 4 cycles.
pub const TERMINATOR_WAIT_CYCLES: u32 = 30;

/// How a bounded read ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The expected literal was seen in full.
    Matched,
    /// A strict match failed on an unexpected byte.
    Mismatched,
    /// The wait budget ran out before the literal completed.
    TimedOut,
}

impl ReadOutcome {
    /// Convenience predicate for the success case.
    pub fn is_match(self) -> bool {
        self == ReadOutcome::Matched
    }
}

/// Reads expected literals off the transport within a cycle budget.
pub struct ResponseReader<'a> {
    transport: &'a mut dyn Transport,
    clock: &'a mut dyn Clock,
    sink: Option<&'a mut dyn io::Write>,
    echo_unexpected: bool,
    response_cycles: u32,
    terminator_cycles: u32,
}

impl<'a> ResponseReader<'a> {
    /// Create a reader with the default budgets and no diagnostic sink.
    pub fn new(transport: &'a mut dyn Transport, clock: &'a mut dyn Clock) -> Self {
        Self {
            transport,
            clock,
            sink: None,
            echo_unexpected: false,
            response_cycles: RESPONSE_WAIT_CYCLES,
            terminator_cycles: TERMINATOR_WAIT_CYCLES,
        }
    }

    /// Echo unexpected bytes to `sink` while scanning.
    pub fn with_sink(mut self, sink: &'a mut dyn io::Write, echo_unexpected: bool) -> Self {
        self.sink = Some(sink);
        self.echo_unexpected = echo_unexpected;
        self
    }

    /// Override the wait budgets.
    pub fn with_budget(mut self, response_cycles: u32, terminator_cycles: u32) -> Self {
        self.response_cycles = response_cycles;
        self.terminator_cycles = terminator_cycles;
        self
    }

    /// Wait for the expected literal.
    ///
    /// With `tolerant` set, unexpected bytes are treated as noise and
    /// scanning resynchronizes; otherwise the first unexpected byte aborts.
    /// With `consume_terminator` set, a successful match additionally
    /// consumes input up to the next CR LF pair, for responses followed by
    /// module chatter that must not leak into the next exchange.
    pub fn read_expected(
        &mut self,
        expected: &[u8],
        tolerant: bool,
        consume_terminator: bool,
    ) -> ReadOutcome {
        let mut matcher = ByteMatcher::new(expected, tolerant);
        let mut cycles = self.response_cycles;

        while !matcher.is_complete() && cycles > 0 {
            if self.transport.available() == 0 {
                cycles -= 1;
                self.clock.sleep_ms(1);
            }
            while !matcher.is_complete() && self.transport.available() > 0 {
                let Some(byte) = self.transport.read_byte() else {
                    break;
                };
                match matcher.push(byte) {
                    MatchStep::Progress | MatchStep::Complete => {}
                    MatchStep::Noise => self.echo(byte),
                    MatchStep::Mismatch => {
                        self.echo(byte);
                        return ReadOutcome::Mismatched;
                    }
                }
            }
        }

        if matcher.is_complete() {
            if consume_terminator {
                self.consume_line(false);
            }
            ReadOutcome::Matched
        } else {
            ReadOutcome::TimedOut
        }
    }

    /// Consume input up to the next CR LF pair, within the terminator
    /// budget.
    ///
    /// Non-terminator bytes are discarded (echoed to the sink when
    /// enabled). With `consume_other_chars` they are eaten greedily, which
    /// is how the remainder of a failed query response is flushed before a
    /// set command; without it, at most one stray byte is consumed per
    /// cycle.
    pub fn consume_line(&mut self, consume_other_chars: bool) {
        let mut cycles = self.terminator_cycles;
        let mut saw_cr = false;
        while cycles > 0 {
            while let Some(byte) = self.next_available() {
                match byte {
                    b'\r' => saw_cr = true,
                    b'\n' if saw_cr => return,
                    other => {
                        saw_cr = false;
                        self.echo(other);
                        if !consume_other_chars {
                            break;
                        }
                    }
                }
            }
            self.clock.sleep_ms(1);
            cycles -= 1;
        }
    }

    fn next_available(&mut self) -> Option<u8> {
        if self.transport.available() > 0 {
            self.transport.read_byte()
        } else {
            None
        }
    }

    fn echo(&mut self, byte: u8) {
        if self.echo_unexpected {
            if let Some(sink) = self.sink.as_deref_mut() {
                let _ = sink.write_all(&[byte]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Clock;
    use std::collections::VecDeque;

    struct TestClock {
        now: u64,
    }

    impl Clock for TestClock {
        fn now_ms(&self) -> u64 {
            self.now
        }

        fn sleep_ms(&mut self, ms: u64) {
            self.now += ms;
        }
    }

    /// Transport that releases scripted bytes, optionally gated on time.
    struct ScriptedTransport {
        pending: VecDeque<u8>,
    }

    impl ScriptedTransport {
        fn new(bytes: &[u8]) -> Self {
            Self {
                pending: bytes.iter().copied().collect(),
            }
        }
    }

    impl Transport for ScriptedTransport {
        fn is_listening(&self) -> bool {
            true
        }

        fn available(&mut self) -> usize {
            self.pending.len()
        }

        fn read_byte(&mut self) -> Option<u8> {
            self.pending.pop_front()
        }

        fn write(&mut self, _bytes: &[u8]) -> std::io::Result<()> {
            Ok(())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }

        fn set_baud(&mut self, _baud: u32) -> std::io::Result<()> {
            Ok(())
        }

        fn available_for_write(&mut self) -> bool {
            true
        }
    }

    #[test]
    fn test_matches_clean_response() {
        let mut transport = ScriptedTransport::new(b"OK\r\n");
        let mut clock = TestClock { now: 0 };
        let outcome =
            ResponseReader::new(&mut transport, &mut clock).read_expected(b"OK\r\n", true, false);
        assert_eq!(outcome, ReadOutcome::Matched);
    }

    #[test]
    fn test_tolerant_scans_past_noise() {
        let mut transport = ScriptedTransport::new(b"XAT\r\nOK\r\n");
        let mut clock = TestClock { now: 0 };
        let mut sink = Vec::new();
        let outcome = ResponseReader::new(&mut transport, &mut clock)
            .with_sink(&mut sink, true)
            .read_expected(b"OK\r\n", true, false);
        assert_eq!(outcome, ReadOutcome::Matched);
        // the scanned-over noise went to the sink
        assert_eq!(sink, b"XAT\r\n");
    }

    #[test]
    fn test_strict_fails_on_first_unexpected_byte() {
        let mut transport = ScriptedTransport::new(b"ERROR\r\n");
        let mut clock = TestClock { now: 0 };
        let outcome =
            ResponseReader::new(&mut transport, &mut clock).read_expected(b"OK\r\n", false, false);
        assert_eq!(outcome, ReadOutcome::Mismatched);
    }

    #[test]
    fn test_budget_exhaustion_with_silent_transport() {
        let mut transport = ScriptedTransport::new(b"");
        let mut clock = TestClock { now: 0 };
        let outcome = ResponseReader::new(&mut transport, &mut clock)
            .with_budget(5, 3)
            .read_expected(b"OK\r\n", true, false);
        assert_eq!(outcome, ReadOutcome::TimedOut);
        // one 1 ms sleep per cycle, and not a cycle more
        assert_eq!(clock.now, 5);
    }

    #[test]
    fn test_partial_response_times_out() {
        let mut transport = ScriptedTransport::new(b"OK\r");
        let mut clock = TestClock { now: 0 };
        let outcome = ResponseReader::new(&mut transport, &mut clock)
            .with_budget(10, 3)
            .read_expected(b"OK\r\n", true, false);
        assert_eq!(outcome, ReadOutcome::TimedOut);
    }

    #[test]
    fn test_consume_terminator_eats_trailing_crlf() {
        let mut transport = ScriptedTransport::new(b"OK+B9600\r\n");
        let mut clock = TestClock { now: 0 };
        let outcome = ResponseReader::new(&mut transport, &mut clock)
            .read_expected(b"OK+B9600", false, true);
        assert_eq!(outcome, ReadOutcome::Matched);
        assert_eq!(transport.pending.len(), 0);
    }

    #[test]
    fn test_consume_line_discards_chatter_before_terminator() {
        let mut transport = ScriptedTransport::new(b"600\r\nAT");
        let mut clock = TestClock { now: 0 };
        let mut sink = Vec::new();
        ResponseReader::new(&mut transport, &mut clock)
            .with_sink(&mut sink, true)
            .consume_line(true);
        assert_eq!(sink, b"600");
        // bytes after the terminator stay on the wire
        assert_eq!(transport.pending, VecDeque::from(vec![b'A', b'T']));
    }
}
