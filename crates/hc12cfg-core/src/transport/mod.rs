//! Transport abstraction
//!
//! The engine never owns real hardware: it is handed a byte-oriented
//! [`Transport`], an optional [`ControlLine`] wired to the module's SET pin,
//! and a [`Clock`]. Production implementations over a USB-serial adapter
//! live in [`serial`]; tests substitute deterministic fakes.

use std::io;
use std::time::{Duration, Instant};

pub mod serial;

/// Logic level driven onto the module's SET line.
///
/// Low holds the module in command mode, high releases it back to
/// transparent mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Line asserted (module in command mode).
    Low,
    /// Line released (module in transparent mode).
    High,
}

/// Byte-oriented serial transport the module is reachable through.
///
/// Modeled on a UART that exposes no blocking-read-with-timeout primitive:
/// readers poll [`Transport::available`] and sleep between polls. The wire
/// carries no framing, so stray bytes from stale exchanges are the caller's
/// problem to drain.
pub trait Transport {
    /// Whether the transport is actively listening at some baud rate.
    ///
    /// False means the local UART was never brought up; negotiation then
    /// skips the current-rate handshake attempt.
    fn is_listening(&self) -> bool;

    /// Number of received bytes ready to read without blocking.
    fn available(&mut self) -> usize;

    /// Pop one received byte, if any.
    fn read_byte(&mut self) -> Option<u8>;

    /// Queue bytes for transmission.
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Block until all queued bytes have been physically transmitted.
    fn flush(&mut self) -> io::Result<()>;

    /// Retune the local side of the link. Does not touch the module.
    fn set_baud(&mut self, baud: u32) -> io::Result<()>;

    /// Whether the transport can accept a write right now.
    fn available_for_write(&mut self) -> bool;
}

/// Output line wired to the module's SET pin.
pub trait ControlLine {
    /// Configure the line for output. Idempotent.
    fn set_output_mode(&mut self);

    /// Drive the line to the given level.
    fn write_level(&mut self, level: Level) -> io::Result<()>;
}

/// Millisecond clock and sleep primitive.
///
/// Injected so the engine's poll loops and settle delays are testable with
/// a deterministic fake.
pub trait Clock {
    /// Milliseconds elapsed since some fixed origin.
    fn now_ms(&self) -> u64;

    /// Block the calling thread for `ms` milliseconds.
    fn sleep_ms(&mut self, ms: u64);
}

/// Wall clock backed by `std::time`.
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    /// Create a clock with its origin at the call site.
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn sleep_ms(&mut self, ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }
}

/// Copy bytes from the transport to `target` until the line goes quiet,
/// waiting up to `max_wait_ms` for at least `min_bytes` to arrive.
///
/// Useful for forwarding module chatter to a log while waiting out a
/// transmission. Returns the number of bytes copied; write errors on the
/// target are ignored (it is a diagnostic sink).
pub fn drain_to(
    transport: &mut dyn Transport,
    target: &mut dyn io::Write,
    clock: &mut dyn Clock,
    min_bytes: usize,
    max_wait_ms: u64,
) -> usize {
    let start = clock.now_ms();
    let mut copied = 0usize;
    loop {
        let mut idle = true;
        while transport.available() > 0 {
            if let Some(byte) = transport.read_byte() {
                let _ = target.write_all(&[byte]);
                copied += 1;
                idle = false;
            }
        }
        if copied >= min_bytes || clock.now_ms().saturating_sub(start) >= max_wait_ms {
            break;
        }
        if idle {
            clock.sleep_ms(1);
        }
    }
    copied
}

#[cfg(test)]
mod tests {
    use super::*;

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

    struct ScriptedTransport {
        pending: Vec<u8>,
    }

    impl Transport for ScriptedTransport {
        fn is_listening(&self) -> bool {
            true
        }

        fn available(&mut self) -> usize {
            self.pending.len()
        }

        fn read_byte(&mut self) -> Option<u8> {
            if self.pending.is_empty() {
                None
            } else {
                Some(self.pending.remove(0))
            }
        }

        fn write(&mut self, _bytes: &[u8]) -> io::Result<()> {
            Ok(())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn set_baud(&mut self, _baud: u32) -> io::Result<()> {
            Ok(())
        }

        fn available_for_write(&mut self) -> bool {
            true
        }
    }

    #[test]
    fn test_drain_to_copies_pending_bytes() {
        let mut transport = ScriptedTransport {
            pending: b"OK+B9600\r\n".to_vec(),
        };
        let mut clock = TestClock { now: 0 };
        let mut target = Vec::new();

        let copied = drain_to(&mut transport, &mut target, &mut clock, 1, 100);
        assert_eq!(copied, 10);
        assert_eq!(target, b"OK+B9600\r\n");
    }

    #[test]
    fn test_drain_to_times_out_when_quiet() {
        let mut transport = ScriptedTransport {
            pending: Vec::new(),
        };
        let mut clock = TestClock { now: 0 };
        let mut target = Vec::new();

        let copied = drain_to(&mut transport, &mut target, &mut clock, 4, 25);
        assert_eq!(copied, 0);
        assert_eq!(clock.now, 25);
    }

    #[test]
    fn test_drain_to_returns_once_minimum_met() {
        let mut transport = ScriptedTransport {
            pending: b"ab".to_vec(),
        };
        let mut clock = TestClock { now: 0 };
        let mut target = Vec::new();

        let copied = drain_to(&mut transport, &mut target, &mut clock, 2, 1000);
        assert_eq!(copied, 2);
        assert_eq!(clock.now, 0);
    }
}
