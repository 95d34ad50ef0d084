use crate::application::session::VendPhase;
use crate::domain::transaction::TransactionId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, VendError>;

/// A single failed attempt to reach the hub.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("DNS resolution failed: {0}")]
    Dns(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("TLS failure: {0}")]
    Tls(String),
    #[error("hub returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("transport failure: {0}")]
    Other(String),
}

impl TransportError {
    /// Only these are worth another attempt; everything else is terminal.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::Dns(_) | Self::Timeout(_))
    }
}

#[derive(Error, Debug)]
pub enum VendError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Hub unreachable after {attempts} attempts: {source}")]
    TransportExhausted {
        attempts: u32,
        #[source]
        source: TransportError,
    },
    #[error("Failed to encode hub request: {0}")]
    Encode(String),
    #[error("Malformed hub response: {reason}")]
    Parse { reason: String, raw: String },
    #[error("Ledger error: {0}")]
    Ledger(String),
    #[error("Transaction {0} is already recorded")]
    DuplicateTransaction(String),
    #[error("Transaction {0} not found")]
    NotFound(String),
    #[error("Invalid transition from {from:?} to {to:?}")]
    InvalidTransition { from: VendPhase, to: VendPhase },
    #[error("Transaction {transaction_id} failed in phase {phase:?}: {source}")]
    Aborted {
        transaction_id: TransactionId,
        phase: VendPhase,
        #[source]
        source: Box<VendError>,
        /// Set when closing the ledger entry failed as well.
        ledger_error: Option<String>,
    },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("Storage error: {0}")]
    Storage(#[from] rocksdb::Error),
}

impl VendError {
    pub fn parse(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::Parse {
            reason: reason.into(),
            raw: raw.into(),
        }
    }

    pub fn ledger(msg: impl Into<String>) -> Self {
        Self::Ledger(msg.into())
    }

    /// Routine outcomes (bad input) versus faults that need operational attention.
    pub fn is_system_fault(&self) -> bool {
        !matches!(self, Self::Validation(_) | Self::NotFound(_))
    }

    /// True when the failure happened while talking to the hub.
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Transport(_) | Self::TransportExhausted { .. } => true,
            Self::Aborted { source, .. } => source.is_transport(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(TransportError::Connect("refused".into()).is_transient());
        assert!(TransportError::Dns("no such host".into()).is_transient());
        assert!(TransportError::Timeout("15s".into()).is_transient());
        assert!(!TransportError::Tls("bad certificate".into()).is_transient());
        assert!(
            !TransportError::Status {
                status: 503,
                body: String::new()
            }
            .is_transient()
        );
    }

    #[test]
    fn test_system_fault_classification() {
        assert!(!VendError::Validation("amount".into()).is_system_fault());
        assert!(VendError::parse("no state", "<x/>").is_system_fault());
        assert!(
            VendError::TransportExhausted {
                attempts: 3,
                source: TransportError::Timeout("t".into())
            }
            .is_transport()
        );
    }
}
