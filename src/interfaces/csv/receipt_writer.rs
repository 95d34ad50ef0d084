use crate::application::orchestrator::Outcome;
use crate::error::{Result, VendError};
use serde::Serialize;
use std::io::Write;

/// One output line of a batch run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Receipt {
    pub line: usize,
    pub meter: String,
    pub transaction_id: Option<String>,
    pub success: bool,
    pub hub_state: Option<i32>,
    pub hub_code: Option<String>,
    /// Tokens in display order, space separated.
    pub tokens: String,
    pub invoice: Option<String>,
    pub error: Option<String>,
}

impl Receipt {
    pub fn from_outcome(line: usize, meter: &str, outcome: &Outcome) -> Self {
        let tokens: Vec<&str> = outcome.tokens.iter().map(|t| t.value.as_str()).collect();
        Self {
            line,
            meter: meter.to_string(),
            transaction_id: Some(outcome.transaction_id.to_string()),
            success: outcome.success,
            hub_state: Some(outcome.hub_state),
            hub_code: outcome.hub_code.clone(),
            tokens: tokens.join(" "),
            invoice: outcome.invoice.clone(),
            error: outcome.ledger_error.clone(),
        }
    }

    pub fn from_error(line: usize, meter: &str, error: &VendError) -> Self {
        let transaction_id = match error {
            VendError::Aborted { transaction_id, .. } => Some(transaction_id.to_string()),
            _ => None,
        };
        Self {
            line,
            meter: meter.to_string(),
            transaction_id,
            success: false,
            hub_state: None,
            hub_code: None,
            tokens: String::new(),
            invoice: None,
            error: Some(error.to_string()),
        }
    }
}

/// Writes receipts as CSV with a header row.
pub struct ReceiptWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReceiptWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_receipts(&mut self, receipts: impl IntoIterator<Item = Receipt>) -> Result<()> {
        for receipt in receipts {
            self.writer.serialize(receipt)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
