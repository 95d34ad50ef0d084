use crate::domain::ports::HubTransport;
use crate::domain::transaction::Action;
use crate::error::TransportError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

/// Sample dual (key-change + credit) token returned for PURCHASE.
pub const MOCK_TOKEN: &str = "12345678901234567890 24680246802468024680";

/// Offline stand-in for the hub with a canned reply for every action.
///
/// Replies can be overridden per action; each call is counted so tests can
/// assert which actions were sent.
#[derive(Debug, Default)]
pub struct MockHubTransport {
    overrides: HashMap<Action, String>,
    calls: [AtomicUsize; 4],
}

fn slot(action: Action) -> usize {
    match action {
        Action::Check => 0,
        Action::Purchase => 1,
        Action::Balance => 2,
        Action::GetTrans => 3,
    }
}

impl MockHubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, action: Action, xml: impl Into<String>) -> Self {
        self.overrides.insert(action, xml.into());
        self
    }

    pub fn calls(&self, action: Action) -> usize {
        self.calls[slot(action)].load(Ordering::SeqCst)
    }

    /// The built-in reply for `action`. `serial` keeps invoices distinct.
    pub fn canned_response(action: Action, serial: usize) -> String {
        match action {
            Action::Check => {
                r#"<xml state="0" code="0" meterNum="MOCK" customerName="MOCK CUSTOMER" verifyData="MOCKVERIFY"/>"#
                    .to_string()
            }
            Action::Purchase => format!(
                r#"<xml state="0" code="0" invoice="INV-MOCK-{serial:06}" vendQty="50.00" feeAMT="0.00" balance="500.00"><Property name="token" value="{MOCK_TOKEN}"/><Property name="meterInfo" value="SUCCESSFUL MOCK TRANSACTION"/></xml>"#
            ),
            Action::Balance => {
                r#"<xml state="0" username="MOCK" balance="102803.62"/>"#.to_string()
            }
            Action::GetTrans => r#"<xml><trans state="0" count="2" transID1="20250101000000MOCK000000000001" time1="2025-01-01 10:00:00" transID2="20250102000000MOCK000000000002" time2="2025-01-02 11:00:00"/></xml>"#
                .to_string(),
        }
    }
}

#[async_trait]
impl HubTransport for MockHubTransport {
    async fn post(&self, action: Action, body: &[u8]) -> Result<Vec<u8>, TransportError> {
        let serial = self.calls[slot(action)].fetch_add(1, Ordering::SeqCst) + 1;
        info!(%action, bytes = body.len(), "Mock hub answering request");
        let reply = match self.overrides.get(&action) {
            Some(xml) => xml.clone(),
            None => Self::canned_response(action, serial),
        };
        Ok(reply.into_bytes())
    }
}
