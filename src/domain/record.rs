use super::transaction::{Action, Amount, MeterNumber, TransactionId};
use crate::error::{Result, VendError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

/// What the orchestrator hands the ledger before the first network call.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEntry {
    pub transaction_id: TransactionId,
    pub meter_number: Option<MeterNumber>,
    pub action: Action,
    pub two_step: bool,
    pub amount: Option<Amount>,
    pub request_payload: String,
}

/// Terminal information written back once the hub (or a local fault) resolves.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerOutcome {
    pub status: TransactionStatus,
    pub hub_state: Option<i32>,
    pub hub_error_code: Option<String>,
    pub token: Option<String>,
    pub invoice: Option<String>,
    pub response_payload: Option<String>,
}

impl LedgerOutcome {
    /// Closes an entry that never got a usable hub response.
    pub fn local_failure(code: &str, detail: impl Into<String>) -> Self {
        Self {
            status: TransactionStatus::Failed,
            hub_state: None,
            hub_error_code: Some(code.to_string()),
            token: None,
            invoice: None,
            response_payload: Some(detail.into()),
        }
    }
}

/// Returned by `record_pending`; identifies the open audit entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHandle {
    pub transaction_id: TransactionId,
    pub recorded_at: DateTime<Utc>,
}

/// Audit record of one logical transaction.
///
/// Created `Pending`, resolved exactly once to `Success` or `Failed`, never deleted.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct TransactionRecord {
    pub transaction_id: TransactionId,
    pub meter_number: Option<MeterNumber>,
    pub action: Action,
    pub two_step: bool,
    pub amount: Option<Amount>,
    pub request_payload: String,
    pub status: TransactionStatus,
    pub hub_state: Option<i32>,
    pub hub_error_code: Option<String>,
    pub token_received: Option<String>,
    pub invoice_number: Option<String>,
    pub response_payload: Option<String>,
    pub request_timestamp: DateTime<Utc>,
    pub response_timestamp: Option<DateTime<Utc>>,
}

impl TransactionRecord {
    pub fn pending(entry: PendingEntry, now: DateTime<Utc>) -> Self {
        Self {
            transaction_id: entry.transaction_id,
            meter_number: entry.meter_number,
            action: entry.action,
            two_step: entry.two_step,
            amount: entry.amount,
            request_payload: entry.request_payload,
            status: TransactionStatus::Pending,
            hub_state: None,
            hub_error_code: None,
            token_received: None,
            invoice_number: None,
            response_payload: None,
            request_timestamp: now,
            response_timestamp: None,
        }
    }

    pub fn handle(&self) -> RecordHandle {
        RecordHandle {
            transaction_id: self.transaction_id.clone(),
            recorded_at: self.request_timestamp,
        }
    }

    /// Applies the terminal outcome. A record can only be resolved once.
    pub fn resolve(&mut self, outcome: LedgerOutcome, now: DateTime<Utc>) -> Result<()> {
        if self.status != TransactionStatus::Pending {
            return Err(VendError::ledger(format!(
                "transaction {} is already {:?}",
                self.transaction_id, self.status
            )));
        }
        if outcome.status == TransactionStatus::Pending {
            return Err(VendError::ledger(format!(
                "transaction {} cannot be resolved to Pending",
                self.transaction_id
            )));
        }
        self.status = outcome.status;
        self.hub_state = outcome.hub_state;
        self.hub_error_code = outcome.hub_error_code;
        self.token_received = outcome.token;
        self.invoice_number = outcome.invoice;
        self.response_payload = outcome.response_payload;
        self.response_timestamp = Some(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> PendingEntry {
        PendingEntry {
            transaction_id: TransactionId::generate(),
            meter_number: Some(MeterNumber::parse("01234").unwrap()),
            action: Action::Purchase,
            two_step: false,
            amount: None,
            request_payload: "<xml/>".to_string(),
        }
    }

    fn success() -> LedgerOutcome {
        LedgerOutcome {
            status: TransactionStatus::Success,
            hub_state: Some(0),
            hub_error_code: Some("0".to_string()),
            token: Some("1234".to_string()),
            invoice: Some("INV-1".to_string()),
            response_payload: Some("<xml state=\"0\"/>".to_string()),
        }
    }

    #[test]
    fn test_record_resolves_once() {
        let mut record = TransactionRecord::pending(entry(), Utc::now());
        assert_eq!(record.status, TransactionStatus::Pending);

        record.resolve(success(), Utc::now()).unwrap();
        assert_eq!(record.status, TransactionStatus::Success);
        assert_eq!(record.token_received.as_deref(), Some("1234"));
        assert!(record.response_timestamp.is_some());

        let again = record.resolve(LedgerOutcome::local_failure("LOCAL", "late"), Utc::now());
        assert!(matches!(again, Err(VendError::Ledger(_))));
        assert_eq!(record.status, TransactionStatus::Success);
    }

    #[test]
    fn test_record_rejects_pending_outcome() {
        let mut record = TransactionRecord::pending(entry(), Utc::now());
        let mut outcome = success();
        outcome.status = TransactionStatus::Pending;
        assert!(record.resolve(outcome, Utc::now()).is_err());
    }

    #[test]
    fn test_record_json_round_trip() {
        let record = TransactionRecord::pending(entry(), Utc::now());
        let bytes = serde_json::to_vec(&record).unwrap();
        let restored: TransactionRecord = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(restored, record);
    }
}
