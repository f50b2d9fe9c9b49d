//! # Invoice Data
//!
//! Plain data describing one fiscal invoice. These types are deserialized
//! from the JSON accepted by the CLI (`invoice <file.json>`) and the HTTP API
//! (`POST /api/invoice`):
//!
//! ```json
//! {
//!   "customer": { "name": "ACME C.A.", "tax_id": "J000000000" },
//!   "items": [
//!     { "description": "Widget", "quantity": 1, "unit_amount": 10.0, "tax_rate": 16.0 }
//!   ],
//!   "payment": { "method": "cash", "amount": 11.6 }
//! }
//! ```
//!
//! Field limits and numeric layouts are enforced when the commands are built,
//! see [`crate::protocol::commands`].

use serde::{Deserialize, Serialize};

use crate::error::FiscalError;

/// Buyer identification printed in the invoice header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    /// Legal name, up to 38 characters
    pub name: String,
    /// Tax identifier (RIF/CI), up to 12 characters
    pub tax_id: String,
}

/// Whether a line adds to or voids from the invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineQualifier {
    #[default]
    Add,
    Void,
}

/// One invoice line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLineItem {
    /// Up to 20 characters
    pub description: String,
    pub quantity: f64,
    /// Price per unit, before tax
    pub unit_amount: f64,
    /// Percent, e.g. `16.0`
    pub tax_rate: f64,
    #[serde(default)]
    pub qualifier: LineQualifier,
}

/// Payment method, sent as a single-letter code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Check,
    /// Foreign currency; attracts the IGTF surcharge on qualified closes
    ForeignCurrency,
    Other,
}

impl PaymentMethod {
    pub fn code(self) -> u8 {
        match self {
            Self::Cash => b'E',
            Self::Card => b'T',
            Self::Check => b'C',
            Self::ForeignCurrency => b'D',
            Self::Other => b'O',
        }
    }
}

/// How the invoice is paid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub method: PaymentMethod,
    pub amount: f64,
}

/// A complete invoice: header, lines, payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub customer: Customer,
    pub items: Vec<InvoiceLineItem>,
    pub payment: Payment,
}

impl Invoice {
    /// Checks that do not depend on the device.
    pub fn validate(&self) -> Result<(), FiscalError> {
        if self.items.is_empty() {
            return Err(FiscalError::InvalidField(
                "invoice has no line items".to_string(),
            ));
        }
        if self
            .items
            .iter()
            .all(|item| item.qualifier == LineQualifier::Void)
        {
            return Err(FiscalError::InvalidField(
                "invoice has only void lines".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice() -> Invoice {
        serde_json::from_str(
            r#"{
                "customer": { "name": "ACME C.A.", "tax_id": "J000000000" },
                "items": [
                    { "description": "Widget", "quantity": 2, "unit_amount": 10.0, "tax_rate": 16.0 },
                    { "description": "Widget", "quantity": 1, "unit_amount": 10.0, "tax_rate": 16.0, "qualifier": "void" }
                ],
                "payment": { "method": "foreign_currency", "amount": 11.6 }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_deserialize_defaults_qualifier() {
        let invoice = invoice();
        assert_eq!(invoice.items[0].qualifier, LineQualifier::Add);
        assert_eq!(invoice.items[1].qualifier, LineQualifier::Void);
        assert_eq!(invoice.payment.method, PaymentMethod::ForeignCurrency);
    }

    #[test]
    fn test_payment_codes() {
        assert_eq!(PaymentMethod::Cash.code(), b'E');
        assert_eq!(PaymentMethod::Card.code(), b'T');
        assert_eq!(PaymentMethod::Check.code(), b'C');
        assert_eq!(PaymentMethod::ForeignCurrency.code(), b'D');
        assert_eq!(PaymentMethod::Other.code(), b'O');
    }

    #[test]
    fn test_validate() {
        assert!(invoice().validate().is_ok());

        let mut empty = invoice();
        empty.items.clear();
        assert!(matches!(empty.validate(), Err(FiscalError::InvalidField(_))));

        let mut voids = invoice();
        voids.items.remove(0);
        assert!(voids.validate().is_err());
    }
}
