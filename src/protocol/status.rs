//! # Status Words
//!
//! Every response carries two 16-bit status words, each sent as four
//! hexadecimal ASCII characters:
//!
//! ```text
//! STX SEQ CMD FS "0004" FS "0800" [FS data ...] ETX BCC
//!                 │           └── fiscal status
//!                 └────────────── printer status
//! ```
//!
//! ## Fault Bits
//!
//! | Word | Bit mask | Condition |
//! |------|----------|-----------|
//! | printer | `0x0004` | Printer hardware fault |
//! | printer | `0x0008` | Printer offline |
//! | printer | `0x4000` | Paper out |
//! | fiscal | `0x0001` | Fiscal memory error |
//! | fiscal | `0x0002` | Working memory error |
//! | fiscal | `0x0008` | Unrecognized command |
//! | fiscal | `0x0010` | Invalid field data |
//! | fiscal | `0x0040` | Totals overflow |
//! | fiscal | `0x0080` | Fiscal memory full |
//! | fiscal | `0x0800` | Z report required before new invoices |
//!
//! Bits not listed are informational and ignored.

use std::fmt;

use serde::Serialize;

use crate::error::{FiscalError, ProtocolFault};

/// A decoded 16-bit status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatusWord(pub u16);

impl StatusWord {
    /// Width of a status word on the wire.
    pub const WIRE_LEN: usize = 4;

    /// Decode four hexadecimal ASCII characters.
    pub fn parse(field: &[u8]) -> Result<Self, FiscalError> {
        let malformed = || {
            FiscalError::Protocol(ProtocolFault::Malformed(format!(
                "status word {:?} is not {} hex digits",
                String::from_utf8_lossy(field),
                Self::WIRE_LEN
            )))
        };
        if field.len() != Self::WIRE_LEN || !field.iter().all(u8::is_ascii_hexdigit) {
            return Err(malformed());
        }
        let text = std::str::from_utf8(field).map_err(|_| malformed())?;
        u16::from_str_radix(text, 16)
            .map(Self)
            .map_err(|_| malformed())
    }

    #[inline]
    pub fn has(self, mask: u16) -> bool {
        self.0 & mask != 0
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}

/// Symbolic fault condition reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    PrinterFault,
    PrinterOffline,
    PaperOut,
    FiscalMemoryError,
    WorkingMemoryError,
    UnknownCommand,
    InvalidFieldData,
    TotalsOverflow,
    FiscalMemoryFull,
    /// A Z (daily closing) report must be printed before opening invoices
    ZReportRequired,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::PrinterFault => "printer fault",
            Self::PrinterOffline => "printer offline",
            Self::PaperOut => "paper out",
            Self::FiscalMemoryError => "fiscal memory error",
            Self::WorkingMemoryError => "working memory error",
            Self::UnknownCommand => "unrecognized command",
            Self::InvalidFieldData => "invalid field data",
            Self::TotalsOverflow => "totals overflow",
            Self::FiscalMemoryFull => "fiscal memory full",
            Self::ZReportRequired => "Z report required",
        };
        f.write_str(text)
    }
}

const PRINTER_BITS: &[(u16, Condition)] = &[
    (0x0004, Condition::PrinterFault),
    (0x0008, Condition::PrinterOffline),
    (0x4000, Condition::PaperOut),
];

const FISCAL_BITS: &[(u16, Condition)] = &[
    (0x0001, Condition::FiscalMemoryError),
    (0x0002, Condition::WorkingMemoryError),
    (0x0008, Condition::UnknownCommand),
    (0x0010, Condition::InvalidFieldData),
    (0x0040, Condition::TotalsOverflow),
    (0x0080, Condition::FiscalMemoryFull),
    (0x0800, Condition::ZReportRequired),
];

/// Map both status words to fault conditions, printer conditions first,
/// each group in bit order. Empty means no fault.
pub fn classify(printer: StatusWord, fiscal: StatusWord) -> Vec<Condition> {
    let printer_faults = PRINTER_BITS.iter().filter(|(mask, _)| printer.has(*mask));
    let fiscal_faults = FISCAL_BITS.iter().filter(|(mask, _)| fiscal.has(*mask));
    printer_faults
        .chain(fiscal_faults)
        .map(|(_, condition)| *condition)
        .collect()
}
