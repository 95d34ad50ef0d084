use super::record::{LedgerOutcome, PendingEntry, RecordHandle, TransactionRecord};
use super::transaction::{Action, MeterNumber, TransactionId};
use crate::error::{Result, TransportError};
use async_trait::async_trait;
use std::sync::Arc;

/// Durable audit log of vend attempts, keyed by transaction id.
///
/// Implementations must be safe for concurrent writers and must never delete
/// records.
#[async_trait]
pub trait TransactionLedger: Send + Sync {
    /// Opens a `Pending` record. Fails if the id is already recorded.
    async fn record_pending(&self, entry: PendingEntry) -> Result<RecordHandle>;
    /// Resolves a `Pending` record. Fails if it is unknown or already resolved.
    async fn record_outcome(&self, id: &TransactionId, outcome: LedgerOutcome) -> Result<()>;
    async fn find_by_id(&self, id: &TransactionId) -> Result<Option<TransactionRecord>>;
    /// Most recent record for a meter. Used by inquiries, not by the orchestrator.
    async fn find_latest_by_meter(&self, meter: &MeterNumber) -> Result<Option<TransactionRecord>>;
}

/// One HTTP round trip to the hub. No retries at this level.
#[async_trait]
pub trait HubTransport: Send + Sync {
    async fn post(&self, action: Action, body: &[u8]) -> std::result::Result<Vec<u8>, TransportError>;
}

#[async_trait]
impl<T: HubTransport + ?Sized> HubTransport for Arc<T> {
    async fn post(&self, action: Action, body: &[u8]) -> std::result::Result<Vec<u8>, TransportError> {
        (**self).post(action, body).await
    }
}

pub type TransactionLedgerBox = Box<dyn TransactionLedger>;
pub type HubTransportBox = Box<dyn HubTransport>;
