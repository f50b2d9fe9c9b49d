//! # Frame Checksum (BCC)
//!
//! Every frame ends with a block check code computed over the bytes that
//! follow STX, up to and including ETX:
//!
//! ```text
//! STX │ SEQ CMD FS ... ETX │ BCC
//!     └──── covered ─────┘
//! ```
//!
//! Two schemes exist across printer firmwares and they are not
//! interchangeable, so the scheme is chosen by the device profile:
//!
//! | Scheme | Computation | Trailer |
//! |--------|-------------|---------|
//! | [`Checksum::Additive`] | sum of byte values, low 16 bits | 4 uppercase hex ASCII chars |
//! | [`Checksum::Xor`] | XOR of byte values | 1 raw byte |

use serde::{Deserialize, Serialize};

/// Checksum strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Checksum {
    /// 16-bit additive sum rendered as 4 hex ASCII characters (e.g. `"05D9"`)
    #[default]
    Additive,
    /// Single-byte XOR
    Xor,
}

impl Checksum {
    /// Number of trailer bytes following ETX.
    #[inline]
    pub fn width(self) -> usize {
        match self {
            Self::Additive => 4,
            Self::Xor => 1,
        }
    }

    /// Whether the trailer is printable ASCII, so control bytes can never
    /// appear in it.
    #[inline]
    pub fn is_textual(self) -> bool {
        matches!(self, Self::Additive)
    }

    /// Compute the trailer for `body` (bytes after STX through ETX inclusive).
    ///
    /// ## Example
    ///
    /// ```
    /// use fiscalia::protocol::checksum::Checksum;
    ///
    /// // ' ' (0x20) + '8' (0x38) + ETX (0x03) = 0x005B
    /// assert_eq!(Checksum::Additive.compute(&[0x20, 0x38, 0x03]), b"005B");
    /// assert_eq!(Checksum::Xor.compute(&[0x20, 0x38, 0x03]), vec![0x1B]);
    /// ```
    pub fn compute(self, body: &[u8]) -> Vec<u8> {
        match self {
            Self::Additive => {
                let sum = body
                    .iter()
                    .fold(0u16, |acc, &b| acc.wrapping_add(u16::from(b)));
                format!("{:04X}", sum).into_bytes()
            }
            Self::Xor => vec![body.iter().fold(0u8, |acc, &b| acc ^ b)],
        }
    }

    /// Check a received trailer against `body`.
    pub fn verify(self, body: &[u8], trailer: &[u8]) -> bool {
        self.compute(body) == trailer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_additive_is_uppercase_hex() {
        // 0xFA + 0x03 = 0x00FD
        assert_eq!(Checksum::Additive.compute(&[0xFA, 0x03]), b"00FD");
    }

    #[test]
    fn test_additive_wraps_at_16_bits() {
        let body = vec![0xFF; 258]; // 258 * 255 = 65790 = 0x100FE
        assert_eq!(Checksum::Additive.compute(&body), b"00FE");
    }

    #[test]
    fn test_xor_single_byte() {
        assert_eq!(Checksum::Xor.compute(&[0x21, 0x40, 0x03]), vec![0x21 ^ 0x40 ^ 0x03]);
        assert_eq!(Checksum::Xor.compute(&[0x55, 0x55]), vec![0x00]);
    }

    #[test]
    fn test_widths() {
        assert_eq!(Checksum::Additive.width(), 4);
        assert_eq!(Checksum::Xor.width(), 1);
    }

    #[test]
    fn test_schemes_disagree() {
        let body = [0x20, 0x40, 0x1C, b'A', 0x03];
        assert_ne!(
            Checksum::Additive.compute(&body),
            Checksum::Xor.compute(&body)
        );
    }

    #[test]
    fn test_verify() {
        let body = [0x20, 0x38, 0x03];
        assert!(Checksum::Additive.verify(&body, b"005B"));
        assert!(!Checksum::Additive.verify(&body, b"005C"));
    }
}
