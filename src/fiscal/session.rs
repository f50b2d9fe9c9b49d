//! # Printer Session
//!
//! [`FiscalPrinter`] owns everything that must stay consistent across one
//! conversation with a device: the transport, the sequence counter and the
//! transaction state. Requests are strictly one at a time; a frame is only
//! sent after the previous one reached a terminal outcome.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::TransactionState;
use super::invoice::{Customer, Invoice, InvoiceLineItem, Payment};
use crate::error::{FiscalError, ProtocolFault};
use crate::printer::DeviceProfile;
use crate::protocol::assembler::ResponseAssembler;
use crate::protocol::commands::{self, Command};
use crate::protocol::frame::Frame;
use crate::protocol::response::{self, ParsedResponse};
use crate::protocol::sequence::SequenceCounter;
use crate::protocol::status::{Condition, StatusWord};
use crate::transport::Transport;

/// Lines printed by a test print when none are given.
pub const DEFAULT_TEST_LINES: &[&str] = &["PRUEBA DE IMPRESION FISCAL", "FISCALIA"];

/// Default test page: the fixed lines plus a timestamp.
pub fn test_page() -> Vec<String> {
    let mut lines: Vec<String> = DEFAULT_TEST_LINES.iter().map(|s| s.to_string()).collect();
    lines.push(chrono::Local::now().format("FECHA %d-%m-%Y %H:%M").to_string());
    lines
}

/// A session shared between threads. Holding the lock for a whole invoice
/// keeps other callers from interleaving frames.
pub type SharedPrinter<T> = Arc<Mutex<FiscalPrinter<T>>>;

/// What recovery did after a failed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recovery {
    /// Nothing to clean up
    #[default]
    None,
    /// Document close accepted (terminate close, or `0x4A` after a test print)
    Terminated,
    /// Device rejected the cleanup close; no escalation
    TerminateRejected,
    /// Cleanup close failed on the link; hardware reset sent
    HardwareReset,
    /// Even the hardware reset could not be written
    ResetFailed,
}

impl Recovery {
    /// Whether the device is believed to be out of any fiscal document.
    pub fn succeeded(self) -> bool {
        matches!(self, Self::None | Self::Terminated | Self::HardwareReset)
    }
}

/// Result of [`FiscalPrinter::print_invoice`], shaped for API responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceOutcome {
    pub ok: bool,
    pub state: TransactionState,
    /// Fault conditions reported by the device, printer first
    pub conditions: Vec<Condition>,
    pub recovery: Recovery,
    /// Whether the recovery left the device usable
    pub recovered: bool,
    pub message: String,
}

/// Decoded answer to a status query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub printer: StatusWord,
    pub fiscal: StatusWord,
    pub conditions: Vec<Condition>,
}

impl StatusReport {
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// One conversation with a fiscal printer.
///
/// ## Example
///
/// ```
/// use fiscalia::fiscal::{Customer, FiscalPrinter, InvoiceLineItem, LineQualifier, Payment, PaymentMethod};
/// use fiscalia::fiscal::TransactionState;
/// use fiscalia::printer::DeviceProfile;
/// use fiscalia::transport::{Reply, ScriptedTransport};
///
/// let profile = DeviceProfile::pnp();
/// let device = ScriptedTransport::new(profile.checksum, [Reply::Ok, Reply::Ok, Reply::Ok]);
/// let mut printer = FiscalPrinter::new(device, profile);
///
/// printer.open_invoice(&Customer { name: "ACME C.A.".into(), tax_id: "J000000000".into() })?;
/// printer.add_item(&InvoiceLineItem {
///     description: "Widget".into(),
///     quantity: 1.0,
///     unit_amount: 10.0,
///     tax_rate: 16.0,
///     qualifier: LineQualifier::Add,
/// })?;
/// printer.close(&Payment { method: PaymentMethod::Cash, amount: 11.6 })?;
///
/// assert_eq!(printer.state(), TransactionState::Committed);
/// # Ok::<(), fiscalia::error::FiscalError>(())
/// ```
pub struct FiscalPrinter<T: Transport> {
    transport: T,
    profile: DeviceProfile,
    sequence: SequenceCounter,
    state: TransactionState,
    last_recovery: Recovery,
}

impl<T: Transport> FiscalPrinter<T> {
    /// Start a session. The sequence counter starts at its minimum.
    pub fn new(transport: T, profile: DeviceProfile) -> Self {
        Self {
            transport,
            profile,
            sequence: SequenceCounter::new(),
            state: TransactionState::Idle,
            last_recovery: Recovery::None,
        }
    }

    #[inline]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    #[inline]
    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    /// Recovery performed by the most recent failure.
    #[inline]
    pub fn last_recovery(&self) -> Recovery {
        self.last_recovery
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    // ========================================================================
    // TRANSACTION STEPS
    // ========================================================================

    /// Open a fiscal invoice for `customer`.
    pub fn open_invoice(&mut self, customer: &Customer) -> Result<(), FiscalError> {
        self.require(self.state.is_settled(), "open invoice")?;
        let command = commands::open_invoice(customer)?;
        self.send_open(&command)
    }

    /// Add one line to the open invoice.
    pub fn add_item(&mut self, item: &InvoiceLineItem) -> Result<(), FiscalError> {
        self.require(
            matches!(
                self.state,
                TransactionState::Open | TransactionState::Itemizing
            ),
            "add item",
        )?;
        let command = commands::add_item(item)?;
        self.send_item(&command)
    }

    /// Close the invoice with `payment`, committing it to fiscal memory.
    pub fn close(&mut self, payment: &Payment) -> Result<(), FiscalError> {
        self.require(self.state == TransactionState::Itemizing, "close invoice")?;
        let command = commands::close_invoice(self.profile.close, payment)?;
        self.send_close(&command)
    }

    /// # Print a Complete Invoice
    ///
    /// 1. Validate the invoice and build every command (no I/O on failure)
    /// 2. Query status; refuse to start if the device reports any fault
    /// 3. Open, add each line, close
    ///
    /// Failures are folded into the returned [`InvoiceOutcome`].
    pub fn print_invoice(&mut self, invoice: &Invoice) -> InvoiceOutcome {
        match self.run_invoice(invoice) {
            Ok(()) => {
                info!(
                    "invoice for {} committed ({} lines, paid {:?} {})",
                    invoice.customer.name,
                    invoice.items.len(),
                    invoice.payment.method,
                    invoice.payment.amount
                );
                self.outcome(None)
            }
            Err(err) => self.outcome(Some(&err)),
        }
    }

    fn run_invoice(&mut self, invoice: &Invoice) -> Result<(), FiscalError> {
        self.last_recovery = Recovery::None;
        self.require(self.state.is_settled(), "print invoice")?;

        invoice.validate()?;
        let open = commands::open_invoice(&invoice.customer)?;
        let items = invoice
            .items
            .iter()
            .map(commands::add_item)
            .collect::<Result<Vec<_>, _>>()?;
        let close = commands::close_invoice(self.profile.close, &invoice.payment)?;

        let status = self.query_status()?;
        if !status.is_ready() {
            warn!("device not ready: {:?}", status.conditions);
            return Err(FiscalError::Status {
                command: commands::CMD_STATUS,
                conditions: status.conditions,
            });
        }

        self.send_open(&open)?;
        for item in &items {
            self.send_item(item)?;
        }
        self.send_close(&close)
    }

    fn outcome(&self, err: Option<&FiscalError>) -> InvoiceOutcome {
        let recovery = self.last_recovery;
        match err {
            None => InvoiceOutcome {
                ok: true,
                state: self.state,
                conditions: Vec::new(),
                recovery,
                recovered: true,
                message: "Invoice committed".to_string(),
            },
            Some(err) => InvoiceOutcome {
                ok: false,
                state: self.state,
                conditions: err.conditions().to_vec(),
                recovery,
                recovered: recovery.succeeded(),
                message: err.to_string(),
            },
        }
    }

    // ========================================================================
    // NON-FISCAL AND STATUS
    // ========================================================================

    /// Print a non-fiscal test document (`0x48`, `0x49` per line, `0x4A`).
    ///
    /// Does not touch the transaction state. Rejected while a fiscal
    /// document is open. Cleanup after a link failure is recorded in
    /// [`last_recovery`](Self::last_recovery).
    pub fn test_print<S: AsRef<str>>(&mut self, lines: &[S]) -> Result<(), FiscalError> {
        self.last_recovery = Recovery::None;
        self.require(self.state.is_settled(), "test print")?;
        let text = lines
            .iter()
            .map(|line| commands::non_fiscal_text(line.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        let timeout = self.profile.response_timeout();
        if let Err(err) = self.exchange(&commands::open_non_fiscal(), timeout) {
            // Lost on the link: the device may have opened the document anyway
            if err.is_communication_failure() {
                warn!("non-fiscal open failed: {}", err);
                self.last_recovery = self.release_non_fiscal();
            }
            return Err(err);
        }

        let printed = text
            .iter()
            .try_for_each(|command| self.exchange(command, timeout).map(drop));
        let closed = self
            .exchange(&commands::close_non_fiscal(), self.profile.close_timeout())
            .map(drop);

        match (printed, closed) {
            (Ok(()), Ok(())) => {
                info!("test print done ({} lines)", text.len());
                Ok(())
            }
            (Err(err), Ok(())) => Err(err),
            (printed, Err(err)) => {
                if err.is_communication_failure() {
                    self.last_recovery = self.hardware_reset();
                }
                Err(printed.err().unwrap_or(err))
            }
        }
    }

    /// Read both status words. Fault bits are reported, not raised.
    pub fn query_status(&mut self) -> Result<StatusReport, FiscalError> {
        let response = self.transact(&commands::status_query(), self.profile.response_timeout())?;
        let report = StatusReport {
            printer: response.printer_status,
            fiscal: response.fiscal_status,
            conditions: response.conditions(),
        };
        debug!(
            "status printer={} fiscal={} conditions={:?}",
            report.printer, report.fiscal, report.conditions
        );
        Ok(report)
    }

    // ========================================================================
    // STEP EXECUTION
    // ========================================================================

    fn send_open(&mut self, command: &Command) -> Result<(), FiscalError> {
        match self.exchange(command, self.profile.response_timeout()) {
            Ok(_) => {
                self.state = TransactionState::Open;
                info!("fiscal document opened");
                Ok(())
            }
            // An explicit rejection means no document exists on the device
            Err(err) => {
                let document_open = err.is_communication_failure();
                Err(self.fail(err, document_open))
            }
        }
    }

    fn send_item(&mut self, command: &Command) -> Result<(), FiscalError> {
        match self.exchange(command, self.profile.response_timeout()) {
            Ok(_) => {
                self.state = TransactionState::Itemizing;
                Ok(())
            }
            Err(err) => Err(self.fail(err, true)),
        }
    }

    fn send_close(&mut self, command: &Command) -> Result<(), FiscalError> {
        self.state = TransactionState::Closing;
        match self.exchange(command, self.profile.close_timeout()) {
            Ok(_) => {
                self.state = TransactionState::Committed;
                info!("fiscal document committed");
                Ok(())
            }
            Err(err) => Err(self.fail(err, true)),
        }
    }

    fn require(&self, allowed: bool, operation: &'static str) -> Result<(), FiscalError> {
        if allowed {
            Ok(())
        } else {
            Err(FiscalError::State {
                operation,
                state: self.state,
            })
        }
    }

    // ========================================================================
    // RECOVERY
    // ========================================================================

    /// Mark the transaction failed, clean up the device, and hand the
    /// original error back.
    fn fail(&mut self, err: FiscalError, document_open: bool) -> FiscalError {
        warn!("transaction failed while {}: {}", self.state, err);
        self.state = TransactionState::Failed;
        self.last_recovery = if document_open {
            self.recover()
        } else {
            Recovery::None
        };
        self.state = TransactionState::Aborted;
        warn!("transaction aborted, recovery: {:?}", self.last_recovery);
        err
    }

    fn recover(&mut self) -> Recovery {
        match self.exchange(&commands::terminate_close(), self.profile.close_timeout()) {
            Ok(_) => {
                info!("open document terminated");
                Recovery::Terminated
            }
            Err(err) if err.is_communication_failure() => {
                warn!("terminate close failed: {}", err);
                self.hardware_reset()
            }
            Err(err) => {
                warn!("device rejected terminate close: {}", err);
                Recovery::TerminateRejected
            }
        }
    }

    /// Close a non-fiscal document that may or may not be open.
    fn release_non_fiscal(&mut self) -> Recovery {
        match self.exchange(&commands::close_non_fiscal(), self.profile.close_timeout()) {
            Ok(_) => {
                info!("non-fiscal document closed");
                Recovery::Terminated
            }
            Err(err) if err.is_communication_failure() => {
                warn!("non-fiscal close failed: {}", err);
                self.hardware_reset()
            }
            Err(err) => {
                warn!("device rejected non-fiscal close: {}", err);
                Recovery::TerminateRejected
            }
        }
    }

    /// Write the reset sequence, wait for the device, restart sequencing.
    fn hardware_reset(&mut self) -> Recovery {
        warn!("sending hardware reset");
        if let Err(err) = self.transport.write_all(&self.profile.reset_sequence) {
            error!("hardware reset failed: {}", err);
            return Recovery::ResetFailed;
        }
        thread::sleep(self.profile.reset_settle());
        self.sequence.reset();
        if let Err(err) = self.transport.discard_input() {
            debug!("discard after reset failed: {}", err);
        }
        Recovery::HardwareReset
    }

    // ========================================================================
    // REQUEST / RESPONSE
    // ========================================================================

    /// One request/response round trip, with status faults raised as errors.
    fn exchange(
        &mut self,
        command: &Command,
        timeout: Duration,
    ) -> Result<ParsedResponse, FiscalError> {
        let response = self.transact(command, timeout)?;
        let conditions = response.conditions();
        if !conditions.is_empty() {
            return Err(FiscalError::Status {
                command: command.opcode,
                conditions,
            });
        }
        Ok(response)
    }

    /// One request/response round trip.
    fn transact(
        &mut self,
        command: &Command,
        timeout: Duration,
    ) -> Result<ParsedResponse, FiscalError> {
        let sent = self.sequence.next();
        let frame = Frame::build(sent, command, self.profile.checksum);

        self.transport.discard_input()?;
        debug!("tx {}", frame);
        self.transport.write_all(frame.as_bytes())?;

        let reply = ResponseAssembler::new(
            command.opcode,
            self.profile.checksum,
            timeout,
            self.profile.busy_extension(),
            Instant::now(),
        )
        .read_from(&mut self.transport)?;
        debug!("rx {}", reply);

        let parsed = response::parse(&reply)?;
        if parsed.sequence != sent {
            return Err(ProtocolFault::SequenceMismatch {
                sent,
                received: parsed.sequence,
            }
            .into());
        }
        if parsed.command != command.opcode {
            return Err(ProtocolFault::Malformed(format!(
                "response echoes command 0x{:02X}, expected 0x{:02X}",
                parsed.command, command.opcode
            ))
            .into());
        }
        Ok(parsed)
    }
}

// ============================================================================
// TESTS
// ============================================================================
