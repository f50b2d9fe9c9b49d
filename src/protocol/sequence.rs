//! Frame sequence numbers.
//!
//! The device uses the sequence byte to detect duplicated or stale requests.
//! Values stay in the printable range `0x20..=0x7F` and wrap back to `0x20`.

/// First sequence number after (re)initialization.
pub const SEQUENCE_MIN: u8 = 0x20;

/// Last sequence number before wrapping.
pub const SEQUENCE_MAX: u8 = 0x7F;

/// Cyclic sequence counter owned by a printer session.
#[derive(Debug, Clone)]
pub struct SequenceCounter {
    current: u8,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self {
            current: SEQUENCE_MIN,
        }
    }

    /// Return the current value and advance, wrapping after [`SEQUENCE_MAX`].
    pub fn next(&mut self) -> u8 {
        let seq = self.current;
        self.current = if seq >= SEQUENCE_MAX {
            SEQUENCE_MIN
        } else {
            seq + 1
        };
        seq
    }

    /// The value the next call to [`next`](Self::next) will return.
    pub fn peek(&self) -> u8 {
        self.current
    }

    /// Back to [`SEQUENCE_MIN`]; only on channel re-initialization.
    pub fn reset(&mut self) {
        self.current = SEQUENCE_MIN;
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}
