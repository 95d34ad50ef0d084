#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use vendgate::domain::ports::{HubTransport, TransactionLedger};
use vendgate::domain::record::{LedgerOutcome, PendingEntry, RecordHandle, TransactionRecord};
use vendgate::domain::signer::{Credentials, Signer};
use vendgate::domain::transaction::{Action, MeterNumber, TransactionId};
use vendgate::error::{Result, TransportError, VendError};
use vendgate::infrastructure::in_memory::InMemoryLedger;

pub fn signer() -> Signer {
    Signer::new(Credentials::new("vendor01", "s3cret", "K3Y").unwrap())
}

/// Replies from a script, one entry per call, and records what was sent.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<std::result::Result<String, TransportError>>>,
    sent: Mutex<Vec<(Action, String)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, xml: &str) -> Self {
        self.script.lock().unwrap().push_back(Ok(xml.to_string()));
        self
    }

    pub fn fail(self, error: TransportError) -> Self {
        self.script.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn calls(&self, action: Action) -> usize {
        self.sent.lock().unwrap().iter().filter(|(a, _)| *a == action).count()
    }

    pub fn sent(&self) -> Vec<(Action, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl HubTransport for ScriptedTransport {
    async fn post(&self, action: Action, body: &[u8]) -> std::result::Result<Vec<u8>, TransportError> {
        self.sent
            .lock()
            .unwrap()
            .push((action, String::from_utf8_lossy(body).into_owned()));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Other("script exhausted".to_string())))
            .map(String::into_bytes)
    }
}

/// In-memory ledger whose writes can be made to fail.
#[derive(Default, Clone)]
pub struct FlakyLedger {
    pub inner: InMemoryLedger,
    pub fail_pending: bool,
    pub fail_outcome: bool,
}

#[async_trait]
impl TransactionLedger for FlakyLedger {
    async fn record_pending(&self, entry: PendingEntry) -> Result<RecordHandle> {
        if self.fail_pending {
            return Err(VendError::ledger("disk full"));
        }
        self.inner.record_pending(entry).await
    }

    async fn record_outcome(&self, id: &TransactionId, outcome: LedgerOutcome) -> Result<()> {
        if self.fail_outcome {
            return Err(VendError::ledger("connection lost"));
        }
        self.inner.record_outcome(id, outcome).await
    }

    async fn find_by_id(&self, id: &TransactionId) -> Result<Option<TransactionRecord>> {
        self.inner.find_by_id(id).await
    }

    async fn find_latest_by_meter(&self, meter: &MeterNumber) -> Result<Option<TransactionRecord>> {
        self.inner.find_latest_by_meter(meter).await
    }
}
