//! # PnP Fiscal Protocol Commands
//!
//! This module implements the command set of the PnP fiscal printer protocol
//! used by certified fiscal printers (Venezuelan SENIAT homologated devices).
//!
//! ## Protocol Overview
//!
//! Unlike a plain receipt printer, a fiscal printer only accepts framed
//! requests and answers each one with a framed response:
//!
//! ```text
//! STX  SEQ  CMD  [FS field FS field ...]  ETX  BCC
//! 0x02 0x20 0x40  0x1C ...                0x03 "05D9"
//! ```
//!
//! - **SEQ**: sequence number, `0x20..=0x7F`
//! - **CMD**: single opcode byte
//! - **FS**: field separator `0x1C`, never trailing
//! - **BCC**: checksum over everything after STX up to and including ETX
//!
//! Commands are executed strictly one at a time; the device has no pipelining.
//!
//! ## Numeric Fields
//!
//! Quantities and amounts are sent as fixed-width digit strings with an
//! implied decimal point. `1.5` as a 13/3 quantity is `0000000001500`.
//!
//! ## Unused Fields
//!
//! Commands with optional trailing fields still expect them to be present.
//! Unused ones carry the placeholder byte `0x7F`.

use crate::error::FiscalError;
use crate::fiscal::invoice::{Customer, InvoiceLineItem, LineQualifier, Payment, PaymentMethod};

use super::encoding;

// ============================================================================
// FRAMING CONSTANTS
// ============================================================================

/// STX (Start of Text) - First byte of every frame
pub const STX: u8 = 0x02;

/// ETX (End of Text) - Closes the payload; the checksum follows it
pub const ETX: u8 = 0x03;

/// ACK (Acknowledge) - Positive acknowledgment
pub const ACK: u8 = 0x06;

/// DC2 - "Still processing" signal sent while the device works on a
/// long command (closing an invoice, Z report).
pub const BUSY: u8 = 0x12;

/// NAK (Negative Acknowledge) - Frame rejected (bad checksum, sequence or format)
pub const NAK: u8 = 0x15;

/// FS (Field Separator) - Separates fields inside the payload
pub const FS: u8 = 0x1C;

/// Placeholder for unused fields
pub const UNUSED: u8 = 0x7F;

// ============================================================================
// OPCODES
// ============================================================================

/// Status query
pub const CMD_STATUS: u8 = 0x38;
/// Open fiscal invoice
pub const CMD_OPEN_INVOICE: u8 = 0x40;
/// Add invoice line item
pub const CMD_ADD_ITEM: u8 = 0x42;
/// Totalize and close (legacy firmware)
pub const CMD_TOTALIZE: u8 = 0x44;
/// Close with qualifier
pub const CMD_CLOSE_INVOICE: u8 = 0x45;
/// Open non-fiscal document
pub const CMD_OPEN_NON_FISCAL: u8 = 0x48;
/// Print non-fiscal text line
pub const CMD_NON_FISCAL_TEXT: u8 = 0x49;
/// Close non-fiscal document
pub const CMD_CLOSE_NON_FISCAL: u8 = 0x4A;

// ============================================================================
// FIELD LIMITS
// ============================================================================

/// Customer name (razón social)
pub const MAX_NAME_LEN: usize = 38;
/// Customer tax id (RIF)
pub const MAX_TAX_ID_LEN: usize = 12;
/// Line item description
pub const MAX_DESCRIPTION_LEN: usize = 20;
/// Non-fiscal text line
pub const MAX_TEXT_LEN: usize = 40;

/// Fixed-point layout of a numeric field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPoint {
    /// Total number of digits transmitted
    pub digits: usize,
    /// How many of those digits are decimals
    pub decimals: u32,
}

/// Item quantity: 13 digits, 3 implied decimals
pub const QUANTITY: FixedPoint = FixedPoint {
    digits: 13,
    decimals: 3,
};

/// Money amounts: 12 digits, 2 implied decimals
pub const AMOUNT: FixedPoint = FixedPoint {
    digits: 12,
    decimals: 2,
};

/// Tax rate percentage: 4 digits, 2 implied decimals (16% → `1600`)
pub const TAX_RATE: FixedPoint = FixedPoint {
    digits: 4,
    decimals: 2,
};

// ============================================================================
// COMMAND
// ============================================================================

/// A request ready to be framed: opcode plus already-encoded fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub opcode: u8,
    pub fields: Vec<Vec<u8>>,
}

impl Command {
    pub fn new(opcode: u8) -> Self {
        Self {
            opcode,
            fields: Vec::new(),
        }
    }

    /// Append an already-encoded field.
    pub fn field(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.fields.push(bytes.into());
        self
    }

    /// Append `n` unused-field placeholders.
    pub fn unused(mut self, n: usize) -> Self {
        self.fields.extend(std::iter::repeat_n(vec![UNUSED], n));
        self
    }
}

/// How an invoice is closed; depends on the printer firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseCommand {
    /// `0x44`: payment method code + amount
    Totalize,
    /// `0x45`: qualifier + amount + payment method code
    Qualified,
}

/// Close qualifiers for `0x45`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseQualifier {
    /// `T` - closes whatever fiscal document is active
    Terminate,
    /// `U` - closes and applies the foreign-currency surcharge (IGTF)
    Surcharge,
}

impl CloseQualifier {
    /// Foreign-currency payments carry the IGTF surcharge.
    pub fn for_payment(payment: &Payment) -> Self {
        if payment.method == PaymentMethod::ForeignCurrency {
            Self::Surcharge
        } else {
            Self::Terminate
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Terminate => b'T',
            Self::Surcharge => b'U',
        }
    }
}

// ============================================================================
// COMMAND BUILDERS
// ============================================================================

/// # Status Query (0x38)
///
/// Asks for the current printer and fiscal status words. The `N` field
/// requests the normal (short) report.
pub fn status_query() -> Command {
    Command::new(CMD_STATUS).field(*b"N")
}

/// # Open Fiscal Invoice (0x40)
///
/// | # | Field | Limit |
/// |---|-------|-------|
/// | 1 | Customer name | 38 |
/// | 2 | Customer tax id | 12 |
/// | 3-6 | Credit note references (unused) | `0x7F` |
/// | 7 | Document qualifier (unused) | `0x7F` |
/// | 8-9 | Reserved | `0x7F` |
pub fn open_invoice(customer: &Customer) -> Result<Command, FiscalError> {
    Ok(Command::new(CMD_OPEN_INVOICE)
        .field(text_field("customer name", &customer.name, MAX_NAME_LEN)?)
        .field(text_field("tax id", &customer.tax_id, MAX_TAX_ID_LEN)?)
        .unused(7))
}

/// # Add Line Item (0x42)
///
/// | # | Field | Format |
/// |---|-------|--------|
/// | 1 | Description | ≤20 chars |
/// | 2 | Quantity | 13 digits, 3 decimals |
/// | 3 | Unit amount | 12 digits, 2 decimals |
/// | 4 | Tax rate | 4 digits, 2 decimals |
/// | 5 | Qualifier | `M` add, `m` void |
/// | 6-8 | Reserved | `0x7F` |
pub fn add_item(item: &InvoiceLineItem) -> Result<Command, FiscalError> {
    let qualifier = match item.qualifier {
        LineQualifier::Add => b'M',
        LineQualifier::Void => b'm',
    };
    Ok(Command::new(CMD_ADD_ITEM)
        .field(text_field(
            "description",
            &item.description,
            MAX_DESCRIPTION_LEN,
        )?)
        .field(format_fixed("quantity", item.quantity, QUANTITY)?)
        .field(format_fixed("unit amount", item.unit_amount, AMOUNT)?)
        .field(format_fixed("tax rate", item.tax_rate, TAX_RATE)?)
        .field([qualifier])
        .unused(3))
}

/// # Close Invoice (0x44 / 0x45)
///
/// The opcode and field order depend on the printer firmware; see [`CloseCommand`].
pub fn close_invoice(style: CloseCommand, payment: &Payment) -> Result<Command, FiscalError> {
    let amount = format_fixed("payment amount", payment.amount, AMOUNT)?;
    let method = vec![payment.method.code()];
    Ok(match style {
        CloseCommand::Totalize => Command::new(CMD_TOTALIZE).field(method).field(amount),
        CloseCommand::Qualified => Command::new(CMD_CLOSE_INVOICE)
            .field([CloseQualifier::for_payment(payment).code()])
            .field(amount)
            .field(method),
    })
}

/// # Terminate Close (0x45 T)
///
/// Releases whatever fiscal document the device has open. Used for recovery
/// after an interrupted invoice; carries a zero payment amount.
pub fn terminate_close() -> Command {
    Command::new(CMD_CLOSE_INVOICE)
        .field([CloseQualifier::Terminate.code()])
        .field(vec![b'0'; AMOUNT.digits])
}

/// Open non-fiscal document (0x48)
pub fn open_non_fiscal() -> Command {
    Command::new(CMD_OPEN_NON_FISCAL)
}

/// Print one line in the open non-fiscal document (0x49)
pub fn non_fiscal_text(line: &str) -> Result<Command, FiscalError> {
    Ok(Command::new(CMD_NON_FISCAL_TEXT).field(text_field("text line", line, MAX_TEXT_LEN)?))
}

/// Close non-fiscal document (0x4A)
pub fn close_non_fiscal() -> Command {
    Command::new(CMD_CLOSE_NON_FISCAL)
}

// ============================================================================
// FIELD FORMATTING
// ============================================================================

/// Encode a text field, enforcing the device's length limit.
fn text_field(name: &str, value: &str, max: usize) -> Result<Vec<u8>, FiscalError> {
    let len = value.chars().count();
    if len > max {
        return Err(FiscalError::InvalidField(format!(
            "{} is {} characters, maximum is {}",
            name, len, max
        )));
    }
    encoding::encode(value)
        .map_err(|e| FiscalError::InvalidField(format!("{}: {}", name, e)))
}

/// Render a value as a zero-padded digit string with implied decimals.
///
/// The value is scaled by `10^decimals` and rounded half away from zero.
/// Rounding works on the value's shortest decimal form, so `1.005` with two
/// decimals is `101` even though the nearest `f64` sits just below it.
///
/// ## Example
///
/// ```
/// use fiscalia::protocol::commands::{format_fixed, QUANTITY, AMOUNT};
///
/// assert_eq!(format_fixed("qty", 1.0, QUANTITY).unwrap(), b"0000000001000");
/// assert_eq!(format_fixed("amount", 11.6, AMOUNT).unwrap(), b"000000001160");
/// assert_eq!(format_fixed("amount", 1.005, AMOUNT).unwrap(), b"000000000101");
/// ```
pub fn format_fixed(name: &str, value: f64, layout: FixedPoint) -> Result<Vec<u8>, FiscalError> {
    if !value.is_finite() || value < 0.0 {
        return Err(FiscalError::InvalidField(format!(
            "{} must be a non-negative number, got {}",
            name, value
        )));
    }
    let overflow = || {
        FiscalError::InvalidField(format!(
            "{} {} does not fit in {} digits",
            name, value, layout.digits
        ))
    };
    let scaled = to_minor_units(value, layout.decimals as usize).ok_or_else(overflow)?;
    if scaled >= 10u64.pow(layout.digits as u32) {
        return Err(overflow());
    }
    Ok(format!("{:0width$}", scaled, width = layout.digits).into_bytes())
}

/// `value * 10^decimals` as an integer, rounded half away from zero on the
/// decimal digits. `None` when the result does not fit in a `u64`.
///
/// `value` must be finite and non-negative.
pub fn to_minor_units(value: f64, decimals: usize) -> Option<u64> {
    // Display for f64 is the shortest round-trip form and never uses exponents
    let text = value.abs().to_string();
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), ""));
    let fraction = fraction.as_bytes();

    let mut digits = whole.to_string();
    digits.extend((0..decimals).map(|i| char::from(fraction.get(i).copied().unwrap_or(b'0'))));
    let scaled: u64 = digits.parse().ok()?;

    match fraction.get(decimals) {
        Some(&next) if next >= b'5' => scaled.checked_add(1),
        _ => Some(scaled),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn widget() -> InvoiceLineItem {
        InvoiceLineItem {
            description: "Widget".to_string(),
            quantity: 1.0,
            unit_amount: 10.0,
            tax_rate: 16.0,
            qualifier: LineQualifier::Add,
        }
    }

    #[test]
    fn test_format_quantity() {
        assert_eq!(format_fixed("q", 1.0, QUANTITY).unwrap(), b"0000000001000");
        assert_eq!(format_fixed("q", 2.5, QUANTITY).unwrap(), b"0000000002500");
        assert_eq!(format_fixed("q", 0.25, QUANTITY).unwrap(), b"0000000000250");
    }

    #[test]
    fn test_format_amount_rounds() {
        assert_eq!(format_fixed("a", 11.6, AMOUNT).unwrap(), b"000000001160");
        assert_eq!(format_fixed("a", 0.125, AMOUNT).unwrap(), b"000000000013");
    }

    #[test]
    fn test_format_amount_rounds_decimal_midpoints() {
        // Neither value is exact in binary; both sit just below the midpoint
        assert_eq!(format_fixed("a", 1.005, AMOUNT).unwrap(), b"000000000101");
        assert_eq!(format_fixed("a", 0.285, AMOUNT).unwrap(), b"000000000029");
        assert_eq!(format_fixed("a", 2.675, AMOUNT).unwrap(), b"000000000268");
        assert_eq!(format_fixed("q", 0.0015, QUANTITY).unwrap(), b"0000000000002");
        assert_eq!(format_fixed("a", 1.004, AMOUNT).unwrap(), b"000000000100");
    }

    #[test]
    fn test_minor_units() {
        assert_eq!(to_minor_units(0.0, 2), Some(0));
        assert_eq!(to_minor_units(-0.0, 2), Some(0));
        assert_eq!(to_minor_units(11.6, 2), Some(1160));
        assert_eq!(to_minor_units(9.995, 2), Some(1000));
        assert_eq!(to_minor_units(1e30, 2), None);
    }

    #[test]
    fn test_format_tax_rate() {
        assert_eq!(format_fixed("r", 16.0, TAX_RATE).unwrap(), b"1600");
        assert_eq!(format_fixed("r", 8.0, TAX_RATE).unwrap(), b"0800");
        assert_eq!(format_fixed("r", 0.0, TAX_RATE).unwrap(), b"0000");
    }

    #[test]
    fn test_format_rejects_overflow_and_negative() {
        assert!(matches!(
            format_fixed("r", 100.0, TAX_RATE),
            Err(FiscalError::InvalidField(_))
        ));
        assert!(matches!(
            format_fixed("a", -1.0, AMOUNT),
            Err(FiscalError::InvalidField(_))
        ));
        assert!(matches!(
            format_fixed("a", f64::NAN, AMOUNT),
            Err(FiscalError::InvalidField(_))
        ));
    }

    #[test]
    fn test_open_invoice_fields() {
        let customer = Customer {
            name: "ACME C.A.".to_string(),
            tax_id: "J000000000".to_string(),
        };
        let cmd = open_invoice(&customer).unwrap();
        assert_eq!(cmd.opcode, 0x40);
        assert_eq!(cmd.fields.len(), 9);
        assert_eq!(cmd.fields[0], b"ACME C.A.");
        assert_eq!(cmd.fields[1], b"J000000000");
        assert!(cmd.fields[2..].iter().all(|f| f == &[UNUSED]));
    }

    #[test]
    fn test_open_invoice_rejects_long_tax_id() {
        let customer = Customer {
            name: "ACME".to_string(),
            tax_id: "J-0000000000-1".to_string(),
        };
        assert!(matches!(
            open_invoice(&customer),
            Err(FiscalError::InvalidField(_))
        ));
    }

    #[test]
    fn test_add_item_fields() {
        let cmd = add_item(&widget()).unwrap();
        assert_eq!(cmd.opcode, 0x42);
        assert_eq!(cmd.fields.len(), 8);
        assert_eq!(cmd.fields[0], b"Widget");
        assert_eq!(cmd.fields[1], b"0000000001000");
        assert_eq!(cmd.fields[2], b"000000001000");
        assert_eq!(cmd.fields[3], b"1600");
        assert_eq!(cmd.fields[4], b"M");
    }

    #[test]
    fn test_void_item_qualifier() {
        let item = InvoiceLineItem {
            qualifier: LineQualifier::Void,
            ..widget()
        };
        assert_eq!(add_item(&item).unwrap().fields[4], b"m");
    }

    #[test]
    fn test_description_limit() {
        let item = InvoiceLineItem {
            description: "A description that is too long".to_string(),
            ..widget()
        };
        assert!(add_item(&item).is_err());
    }

    #[test]
    fn test_close_qualified() {
        let payment = Payment {
            method: PaymentMethod::Cash,
            amount: 11.6,
        };
        let cmd = close_invoice(CloseCommand::Qualified, &payment).unwrap();
        assert_eq!(cmd.opcode, 0x45);
        assert_eq!(cmd.fields[0], b"T");
        assert_eq!(cmd.fields[1], b"000000001160");
        assert_eq!(cmd.fields[2], b"E");
    }

    #[test]
    fn test_close_foreign_currency_uses_surcharge() {
        let payment = Payment {
            method: PaymentMethod::ForeignCurrency,
            amount: 20.0,
        };
        let cmd = close_invoice(CloseCommand::Qualified, &payment).unwrap();
        assert_eq!(cmd.fields[0], b"U");
        assert_eq!(cmd.fields[2], b"D");
    }

    #[test]
    fn test_close_totalize() {
        let payment = Payment {
            method: PaymentMethod::Card,
            amount: 3.25,
        };
        let cmd = close_invoice(CloseCommand::Totalize, &payment).unwrap();
        assert_eq!(cmd.opcode, 0x44);
        assert_eq!(cmd.fields, vec![b"T".to_vec(), b"000000000325".to_vec()]);
    }

    #[test]
    fn test_terminate_close() {
        let cmd = terminate_close();
        assert_eq!(cmd.opcode, 0x45);
        assert_eq!(cmd.fields, vec![b"T".to_vec(), b"000000000000".to_vec()]);
    }

    #[test]
    fn test_non_fiscal_text_limit() {
        assert!(non_fiscal_text("PRUEBA DE IMPRESION").is_ok());
        assert!(non_fiscal_text(&"X".repeat(41)).is_err());
    }
}
