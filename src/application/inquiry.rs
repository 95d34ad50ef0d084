use crate::domain::ports::TransactionLedgerBox;
use crate::domain::record::TransactionRecord;
use crate::domain::transaction::{MeterNumber, TransactionId};
use crate::error::{Result, VendError};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchKey {
    TransactionId(TransactionId),
    /// Matches the most recent transaction for the meter.
    MeterNumber(MeterNumber),
}

impl SearchKey {
    /// Accepts either an id or a meter number, preferring the id.
    pub fn from_parts(id: Option<&str>, meter: Option<&str>) -> Result<Self> {
        match (id, meter) {
            (Some(id), _) => Ok(Self::TransactionId(TransactionId::parse(id)?)),
            (None, Some(meter)) => Ok(Self::MeterNumber(MeterNumber::parse(meter)?)),
            (None, None) => Err(VendError::Validation(
                "a transaction id or meter number is required".to_string(),
            )),
        }
    }
}

/// Read-only view over the ledger for status lookups.
pub struct Inquiry {
    ledger: TransactionLedgerBox,
}

impl Inquiry {
    pub fn new(ledger: TransactionLedgerBox) -> Self {
        Self { ledger }
    }

    /// Returns the matching record or [`VendError::NotFound`].
    pub async fn search(&self, key: &SearchKey) -> Result<TransactionRecord> {
        debug!(?key, "Searching ledger");
        let found = match key {
            SearchKey::TransactionId(id) => self.ledger.find_by_id(id).await?,
            SearchKey::MeterNumber(meter) => self.ledger.find_latest_by_meter(meter).await?,
        };
        found.ok_or_else(|| match key {
            SearchKey::TransactionId(id) => VendError::NotFound(id.to_string()),
            SearchKey::MeterNumber(meter) => VendError::NotFound(format!("meter {meter}")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::TransactionLedger;
    use crate::domain::record::PendingEntry;
    use crate::domain::transaction::Action;
    use crate::infrastructure::in_memory::InMemoryLedger;

    async fn seeded() -> Inquiry {
        let ledger = InMemoryLedger::new();
        for (id, meter) in [("A1", "0101"), ("A2", "0101")] {
            ledger
                .record_pending(PendingEntry {
                    transaction_id: TransactionId::parse(id).unwrap(),
                    meter_number: Some(MeterNumber::parse(meter).unwrap()),
                    action: Action::GetTrans,
                    two_step: false,
                    amount: None,
                    request_payload: "<xml/>".to_string(),
                })
                .await
                .unwrap();
        }
        Inquiry::new(Box::new(ledger))
    }

    #[tokio::test]
    async fn test_search_by_id_and_meter() {
        let inquiry = seeded().await;

        let by_id = SearchKey::from_parts(Some("A1"), None).unwrap();
        assert_eq!(inquiry.search(&by_id).await.unwrap().transaction_id.as_str(), "A1");

        let by_meter = SearchKey::from_parts(None, Some("0101")).unwrap();
        assert_eq!(inquiry.search(&by_meter).await.unwrap().transaction_id.as_str(), "A2");
    }

    #[tokio::test]
    async fn test_search_not_found() {
        let inquiry = seeded().await;
        let key = SearchKey::from_parts(Some("ZZZ"), None).unwrap();
        let err = inquiry.search(&key).await.unwrap_err();
        assert!(matches!(err, VendError::NotFound(_)));
        assert!(!err.is_system_fault());
    }

    #[test]
    fn test_search_key_requires_input() {
        assert!(matches!(
            SearchKey::from_parts(None, None),
            Err(VendError::Validation(_))
        ));
    }
}
