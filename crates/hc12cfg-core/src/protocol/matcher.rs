//! Streaming literal matcher
//!
//! The wire carries no length or frame markers, so the only way to find an
//! expected response among noise, echoes, or the tail of a previous
//! exchange is to scan for the literal byte sequence and resynchronize on
//! mismatch.

/// Result of feeding one byte to a [`ByteMatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStep {
    /// Byte matched; more expected bytes remain.
    Progress,
    /// Byte matched and completed the expected sequence.
    Complete,
    /// Byte did not match; treated as noise, scanning restarts from the
    /// beginning of the expected sequence (tolerant mode only).
    Noise,
    /// Byte did not match and the matcher is strict; matching is aborted.
    Mismatch,
}

/// Matches an expected literal byte sequence against a stream, one byte at
/// a time.
///
/// In tolerant mode a mismatched byte resets the cursor and scanning
/// continues; in strict mode it aborts immediately. Note the reset is
/// naive: the mismatched byte itself is consumed as noise and not
/// re-examined against the start of the sequence.
#[derive(Debug)]
pub struct ByteMatcher<'a> {
    expected: &'a [u8],
    cursor: usize,
    tolerant: bool,
}

impl<'a> ByteMatcher<'a> {
    /// Create a matcher for `expected`.
    pub fn new(expected: &'a [u8], tolerant: bool) -> Self {
        Self {
            expected,
            cursor: 0,
            tolerant,
        }
    }

    /// Feed one byte from the stream.
    pub fn push(&mut self, byte: u8) -> MatchStep {
        if self.is_complete() {
            return MatchStep::Complete;
        }
        if byte == self.expected[self.cursor] {
            self.cursor += 1;
            if self.is_complete() {
                MatchStep::Complete
            } else {
                MatchStep::Progress
            }
        } else if self.tolerant {
            self.cursor = 0;
            MatchStep::Noise
        } else {
            MatchStep::Mismatch
        }
    }

    /// Whether the whole expected sequence has been seen.
    pub fn is_complete(&self) -> bool {
        self.cursor == self.expected.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(matcher: &mut ByteMatcher<'_>, input: &[u8]) -> Vec<MatchStep> {
        input.iter().map(|b| matcher.push(*b)).collect()
    }

    #[test]
    fn test_exact_match() {
        let mut m = ByteMatcher::new(b"OK\r\n", false);
        let steps = feed(&mut m, b"OK\r\n");
        assert_eq!(steps.last(), Some(&MatchStep::Complete));
        assert!(m.is_complete());
    }

    #[test]
    fn test_tolerant_resynchronizes_after_noise() {
        let mut m = ByteMatcher::new(b"AT\r\n", true);
        let steps = feed(&mut m, b"XAT\r\n");
        assert_eq!(steps[0], MatchStep::Noise);
        assert!(m.is_complete());
    }

    #[test]
    fn test_strict_aborts_on_noise() {
        let mut m = ByteMatcher::new(b"AT\r\n", false);
        assert_eq!(m.push(b'X'), MatchStep::Mismatch);
        assert!(!m.is_complete());
    }

    #[test]
    fn test_tolerant_restarts_from_scratch() {
        // Partial match followed by noise drops the partial progress
        let mut m = ByteMatcher::new(b"OK\r\n", true);
        feed(&mut m, b"OX");
        assert!(!m.is_complete());
        feed(&mut m, b"OK\r\n");
        assert!(m.is_complete());
    }

    #[test]
    fn test_reset_does_not_reexamine_noise_byte() {
        // "AAT": the second 'A' breaks the match and is consumed, so the
        // remaining "T" alone cannot complete the sequence
        let mut m = ByteMatcher::new(b"AT", true);
        feed(&mut m, b"AAT");
        assert!(!m.is_complete());
    }
}
