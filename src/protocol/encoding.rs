//! # Field Text Encoding
//!
//! Converts Unicode strings to the single-byte Latin-1 (ISO 8859-1) encoding
//! the fiscal printer expects inside frame fields.
//!
//! ASCII and the Latin-1 upper half (U+00A0–U+00FF) map to their own byte
//! value. A few typographic characters that commonly sneak in from copy-paste
//! are folded to ASCII. Everything else is rejected: a fiscal document is a
//! legal record, so silently printing `?` is not acceptable.
//!
//! Control characters (including STX, ETX, FS and the `0x7F` placeholder)
//! are never allowed in field text since they would break the framing.

use thiserror::Error;

/// Why a string could not be placed in a frame field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("control character U+{0:04X} is not allowed")]
    Control(u32),

    #[error("character '{0}' (U+{1:04X}) has no Latin-1 representation")]
    Unmapped(char, u32),
}

/// Encode a Unicode string as Latin-1 field bytes.
pub fn encode(s: &str) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::with_capacity(s.len());
    for ch in s.chars() {
        let code = ch as u32;
        if code < 0x20 || (0x7F..0xA0).contains(&code) {
            return Err(EncodeError::Control(code));
        }
        if code <= 0xFF {
            out.push(code as u8);
        } else if let Some(ascii) = fold_typographic(ch) {
            out.push(ascii);
        } else {
            return Err(EncodeError::Unmapped(ch, code));
        }
    }
    Ok(out)
}

/// Decode Latin-1 bytes received from the device.
///
/// Every byte is a valid Latin-1 code point, so this never fails.
pub fn decode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Fold punctuation outside Latin-1 to its closest ASCII form.
fn fold_typographic(ch: char) -> Option<u8> {
    let byte = match ch {
        '\u{2018}' | '\u{2019}' => b'\'', // ‘ ’
        '\u{201C}' | '\u{201D}' => b'"',  // “ ”
        '\u{2013}' | '\u{2014}' => b'-',
        '\u{2022}' => b'*',               // •
        _ => return None,
    };
    Some(byte)
}
