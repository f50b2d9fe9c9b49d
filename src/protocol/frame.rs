//! # Protocol Frames
//!
//! A [`Frame`] is one complete protocol message, as sent or as received:
//!
//! ```text
//! ┌─────┬──────────────────────────────┬─────┬──────────┐
//! │ STX │ SEQ CMD [FS f1 FS f2 ...]    │ ETX │ checksum │
//! └─────┴──────────────────────────────┴─────┴──────────┘
//! ```
//!
//! Frames are immutable once built. Received frames are only constructed by
//! the assembler after their checksum has been verified.

use std::fmt;

use super::checksum::Checksum;
use super::commands::{ACK, BUSY, Command, ETX, FS, NAK, STX, UNUSED};

/// One complete protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Vec<u8>,
    checksum_width: usize,
}

impl Frame {
    /// # Build a Request Frame
    ///
    /// Payload = sequence byte + opcode + (if any fields) FS + fields joined
    /// by FS, with no trailing separator.
    ///
    /// ## Example
    ///
    /// ```
    /// use fiscalia::protocol::{checksum::Checksum, commands, frame::Frame};
    ///
    /// let frame = Frame::build(0x20, &commands::status_query(), Checksum::Additive);
    /// assert_eq!(frame.as_bytes(), b"\x02\x208\x1cN\x0300C5");
    /// ```
    pub fn build(seq: u8, command: &Command, checksum: Checksum) -> Self {
        let field_len: usize = command.fields.iter().map(|f| f.len() + 1).sum();
        let mut bytes = Vec::with_capacity(4 + field_len + checksum.width());

        bytes.push(STX);
        bytes.push(seq);
        bytes.push(command.opcode);
        for field in &command.fields {
            bytes.push(FS);
            bytes.extend_from_slice(field);
        }
        bytes.push(ETX);

        let trailer = checksum.compute(&bytes[1..]);
        bytes.extend(trailer);

        Self {
            bytes,
            checksum_width: checksum.width(),
        }
    }

    /// Wrap received bytes. The caller has already located ETX and verified
    /// the trailer.
    pub(crate) fn from_verified(bytes: Vec<u8>, checksum_width: usize) -> Self {
        Self {
            bytes,
            checksum_width,
        }
    }

    /// Full frame bytes, STX through checksum.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Bytes between STX and ETX (exclusive).
    pub fn payload(&self) -> &[u8] {
        &self.bytes[1..self.etx_index()]
    }

    /// Bytes covered by the checksum: after STX through ETX inclusive.
    pub fn checked_body(&self) -> &[u8] {
        &self.bytes[1..=self.etx_index()]
    }

    /// Trailing checksum bytes.
    pub fn checksum_bytes(&self) -> &[u8] {
        &self.bytes[self.etx_index() + 1..]
    }

    /// Sequence number byte.
    pub fn sequence(&self) -> u8 {
        self.bytes[1]
    }

    /// Opcode byte.
    pub fn opcode(&self) -> u8 {
        self.bytes[2]
    }

    fn etx_index(&self) -> usize {
        self.bytes.len() - self.checksum_width - 1
    }
}

/// Renders control bytes symbolically for logs: `<STX> 8|N<ETX>00C5`.
impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render_bytes(&self.bytes))
    }
}

/// Human-readable rendering of raw protocol bytes.
pub fn render_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 8);
    for &b in bytes {
        match b {
            STX => out.push_str("<STX>"),
            ETX => out.push_str("<ETX>"),
            ACK => out.push_str("<ACK>"),
            NAK => out.push_str("<NAK>"),
            BUSY => out.push_str("<BUSY>"),
            FS => out.push('|'),
            UNUSED => out.push('~'),
            0x20..=0x7E => out.push(b as char),
            _ => out.push_str(&format!("<{:02X}>", b)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::sequence::{SEQUENCE_MAX, SEQUENCE_MIN};

    fn open_command() -> Command {
        Command::new(0x40)
            .field(b"ACME C.A.".to_vec())
            .field(b"J000000000".to_vec())
            .unused(7)
    }

    #[test]
    fn test_frame_shape() {
        let frame = Frame::build(0x21, &open_command(), Checksum::Additive);
        let bytes = frame.as_bytes();
        assert_eq!(bytes[0], STX);
        assert_eq!(bytes[1], 0x21);
        assert_eq!(bytes[2], 0x40);
        assert_eq!(bytes[3], FS);
        assert_eq!(bytes[bytes.len() - 5], ETX);
        assert_eq!(frame.checksum_bytes().len(), 4);
    }

    #[test]
    fn test_no_fields_means_no_separator() {
        let frame = Frame::build(0x20, &Command::new(0x48), Checksum::Additive);
        // STX SEQ CMD ETX + 4
        assert_eq!(frame.as_bytes().len(), 8);
        assert_eq!(frame.payload(), &[0x20, 0x48]);
    }

    #[test]
    fn test_no_trailing_separator() {
        let frame = Frame::build(0x20, &Command::new(0x49).field(b"HOLA".to_vec()), Checksum::Additive);
        assert_eq!(frame.payload(), b"\x20\x49\x1cHOLA");
    }

    #[test]
    fn test_checksum_round_trip_over_sequence_range() {
        for checksum in [Checksum::Additive, Checksum::Xor] {
            for seq in SEQUENCE_MIN..=SEQUENCE_MAX {
                let frame = Frame::build(seq, &open_command(), checksum);
                assert_eq!(frame.sequence(), seq);
                assert_eq!(
                    checksum.compute(frame.checked_body()),
                    frame.checksum_bytes(),
                    "seq 0x{:02X} with {:?}",
                    seq,
                    checksum
                );
            }
        }
    }

    #[test]
    fn test_known_status_frame() {
        // 0x20 + 0x38 + 0x1C + 'N'(0x4E) + 0x03 = 0x00C5
        let frame = Frame::build(0x20, &Command::new(0x38).field(b"N".to_vec()), Checksum::Additive);
        assert_eq!(frame.checksum_bytes(), b"00C5");
    }

    #[test]
    fn test_xor_frame_width() {
        let frame = Frame::build(0x20, &Command::new(0x38), Checksum::Xor);
        assert_eq!(frame.as_bytes(), &[STX, 0x20, 0x38, ETX, 0x20 ^ 0x38 ^ ETX]);
    }

    #[test]
    fn test_display_renders_control_bytes() {
        let frame = Frame::build(0x20, &Command::new(0x38).field(b"N".to_vec()), Checksum::Additive);
        assert_eq!(frame.to_string(), "<STX> 8|N<ETX>00C5");
    }
}
