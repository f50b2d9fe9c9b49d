//! # Response Parsing
//!
//! Decomposes a verified response [`Frame`] into its parts:
//!
//! ```text
//! STX │ SEQ CMD │ FS printer-status │ FS fiscal-status │ FS data ... │ ETX BCC
//!       header      status words                        data fields
//! ```
//!
//! ## Legacy Error Text
//!
//! Some firmwares report rejections by embedding the literal text `ERROR`
//! in a field instead of (or as well as) setting status bits. The parser
//! scans for this token before decoding anything else and reports it as
//! [`ProtocolFault::ErrorToken`], even though the frame is checksum-valid.

use crate::error::{FiscalError, ProtocolFault};

use super::commands::FS;
use super::encoding;
use super::frame::Frame;
use super::status::{self, Condition, StatusWord};

/// Literal token legacy firmwares embed in rejected responses.
pub const ERROR_TOKEN: &[u8] = b"ERROR";

/// A decoded response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    /// Echoed sequence number
    pub sequence: u8,
    /// Echoed opcode
    pub command: u8,
    pub printer_status: StatusWord,
    pub fiscal_status: StatusWord,
    /// Data fields following the status words
    pub fields: Vec<Vec<u8>>,
    /// The frame as received
    pub frame: Frame,
}

impl ParsedResponse {
    /// Fault conditions encoded in the status words.
    pub fn conditions(&self) -> Vec<Condition> {
        status::classify(self.printer_status, self.fiscal_status)
    }

    /// Data field `index` decoded as Latin-1 text.
    pub fn field_text(&self, index: usize) -> Option<String> {
        self.fields.get(index).map(|f| encoding::decode(f))
    }
}

/// Parse a verified response frame.
pub fn parse(frame: &Frame) -> Result<ParsedResponse, FiscalError> {
    let payload = frame.payload();
    if payload.len() < 2 {
        return Err(malformed("missing sequence/command header"));
    }
    let (sequence, command) = (payload[0], payload[1]);

    let rest = &payload[2..];
    let fields: Vec<&[u8]> = match rest.split_first() {
        Some((&FS, tail)) => tail.split(|&b| b == FS).collect(),
        Some(_) => return Err(malformed("header not followed by field separator")),
        None => Vec::new(),
    };

    if let Some(field) = fields.iter().find(|f| contains_token(f)) {
        return Err(FiscalError::Protocol(ProtocolFault::ErrorToken(
            encoding::decode(field),
        )));
    }

    if fields.len() < 2 {
        return Err(malformed(&format!(
            "expected 2 status words, found {} fields",
            fields.len()
        )));
    }

    Ok(ParsedResponse {
        sequence,
        command,
        printer_status: StatusWord::parse(fields[0])?,
        fiscal_status: StatusWord::parse(fields[1])?,
        fields: fields[2..].iter().map(|f| f.to_vec()).collect(),
        frame: frame.clone(),
    })
}

fn contains_token(field: &[u8]) -> bool {
    field
        .windows(ERROR_TOKEN.len())
        .any(|window| window == ERROR_TOKEN)
}

fn malformed(reason: &str) -> FiscalError {
    FiscalError::Protocol(ProtocolFault::Malformed(reason.to_string()))
}
