use crate::domain::ports::TransactionLedger;
use crate::domain::record::{LedgerOutcome, PendingEntry, RecordHandle, TransactionRecord};
use crate::domain::transaction::{MeterNumber, TransactionId};
use crate::error::{Result, VendError};
use async_trait::async_trait;
use chrono::Utc;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory transaction ledger.
///
/// Uses `Arc<RwLock<HashMap<TransactionId, TransactionRecord>>>` so clones share
/// the same records. Nothing survives a restart; use it for tests, mock runs and
/// deployments without the `storage-rocksdb` feature.
#[derive(Default, Clone)]
pub struct InMemoryLedger {
    records: Arc<RwLock<HashMap<TransactionId, TransactionRecord>>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

/// Orders by request time; ids break ties.
fn by_recency(a: &TransactionRecord, b: &TransactionRecord) -> Ordering {
    a.request_timestamp
        .cmp(&b.request_timestamp)
        .then_with(|| a.transaction_id.cmp(&b.transaction_id))
}

#[async_trait]
impl TransactionLedger for InMemoryLedger {
    async fn record_pending(&self, entry: PendingEntry) -> Result<RecordHandle> {
        let mut records = self.records.write().await;
        match records.entry(entry.transaction_id.clone()) {
            Entry::Occupied(_) => Err(VendError::DuplicateTransaction(
                entry.transaction_id.to_string(),
            )),
            Entry::Vacant(slot) => {
                let record = slot.insert(TransactionRecord::pending(entry, Utc::now()));
                Ok(record.handle())
            }
        }
    }

    async fn record_outcome(&self, id: &TransactionId, outcome: LedgerOutcome) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| VendError::NotFound(id.to_string()))?;
        record.resolve(outcome, Utc::now())
    }

    async fn find_by_id(&self, id: &TransactionId) -> Result<Option<TransactionRecord>> {
        let records = self.records.read().await;
        Ok(records.get(id).cloned())
    }

    async fn find_latest_by_meter(&self, meter: &MeterNumber) -> Result<Option<TransactionRecord>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|record| record.meter_number.as_ref() == Some(meter))
            .max_by(|a, b| by_recency(a, b))
            .cloned())
    }
}
