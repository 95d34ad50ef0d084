use crate::domain::ports::TransactionLedger;
use crate::domain::record::{LedgerOutcome, PendingEntry, RecordHandle, TransactionRecord};
use crate::domain::transaction::{MeterNumber, TransactionId};
use crate::error::{Result, VendError};
use async_trait::async_trait;
use chrono::Utc;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Options, WriteBatch};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Column Family holding every record, keyed by transaction id.
pub const CF_RECORDS: &str = "records";
/// Column Family mapping a meter number to its most recent transaction id.
pub const CF_METERS: &str = "meters";

/// A persistent transaction ledger backed by RocksDB.
///
/// Records are stored as JSON. Writes go through a single lock so the
/// duplicate check and the insert cannot interleave; reads are lock-free.
///
/// `Clone` shares the underlying `Arc<DB>`.
#[derive(Clone)]
pub struct RocksDbLedger {
    db: Arc<DB>,
    writes: Arc<Mutex<()>>,
}

impl RocksDbLedger {
    /// Opens or creates a ledger at `path`, creating the column families if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_records = ColumnFamilyDescriptor::new(CF_RECORDS, Options::default());
        let cf_meters = ColumnFamilyDescriptor::new(CF_METERS, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_records, cf_meters])?;

        Ok(Self {
            db: Arc::new(db),
            writes: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| VendError::ledger(format!("{name} column family not found")))
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.writes
            .lock()
            .map_err(|_| VendError::ledger("ledger write lock poisoned"))
    }

    fn load(&self, id: &TransactionId) -> Result<Option<TransactionRecord>> {
        let cf = self.cf(CF_RECORDS)?;
        match self.db.get_cf(cf, id.as_str().as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl TransactionLedger for RocksDbLedger {
    async fn record_pending(&self, entry: PendingEntry) -> Result<RecordHandle> {
        let _guard = self.lock()?;
        let records = self.cf(CF_RECORDS)?;
        let meters = self.cf(CF_METERS)?;

        let key = entry.transaction_id.as_str().as_bytes().to_vec();
        if self.db.get_pinned_cf(records, &key)?.is_some() {
            return Err(VendError::DuplicateTransaction(
                entry.transaction_id.to_string(),
            ));
        }

        let record = TransactionRecord::pending(entry, Utc::now());
        let mut batch = WriteBatch::default();
        batch.put_cf(records, &key, serde_json::to_vec(&record)?);
        if let Some(meter) = &record.meter_number {
            batch.put_cf(meters, meter.as_str().as_bytes(), &key);
        }
        self.db.write(batch)?;

        Ok(record.handle())
    }

    async fn record_outcome(&self, id: &TransactionId, outcome: LedgerOutcome) -> Result<()> {
        let _guard = self.lock()?;
        let mut record = self
            .load(id)?
            .ok_or_else(|| VendError::NotFound(id.to_string()))?;
        record.resolve(outcome, Utc::now())?;

        let records = self.cf(CF_RECORDS)?;
        self.db
            .put_cf(records, id.as_str().as_bytes(), serde_json::to_vec(&record)?)?;
        Ok(())
    }

    async fn find_by_id(&self, id: &TransactionId) -> Result<Option<TransactionRecord>> {
        self.load(id)
    }

    async fn find_latest_by_meter(&self, meter: &MeterNumber) -> Result<Option<TransactionRecord>> {
        let meters = self.cf(CF_METERS)?;
        let Some(id) = self.db.get_cf(meters, meter.as_str().as_bytes())? else {
            return Ok(None);
        };
        let id = String::from_utf8(id)
            .map_err(|e| VendError::ledger(format!("corrupt meter index for {meter}: {e}")))?;
        self.load(&TransactionId::parse(&id)?)
    }
}
