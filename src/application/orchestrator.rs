use crate::application::session::{VendPhase, VendSession};
use crate::domain::hub::HubResult;
use crate::domain::ports::{HubTransportBox, TransactionLedgerBox};
use crate::domain::record::{LedgerOutcome, PendingEntry, TransactionStatus};
use crate::domain::signer::Signer;
use crate::domain::token::{TokenSet, normalize};
use crate::domain::transaction::{
    Action, Amount, MeterNumber, SKIP_VERIFY_DATA, TransactionId, VendRequest,
};
use crate::error::{Result, VendError};
use crate::infrastructure::retry::{RetryPolicy, send_with_retry};
use crate::interfaces::xml;
use serde::Serialize;
use tracing::{error, info, warn};

/// Ledger codes for entries closed without a usable hub answer.
pub const CODE_TRANSPORT_EXHAUSTED: &str = "TRANSPORT_EXHAUSTED";
pub const CODE_TRANSPORT_ERROR: &str = "TRANSPORT_ERROR";
pub const CODE_PARSE_ERROR: &str = "PARSE_ERROR";
pub const CODE_LOCAL_ERROR: &str = "LOCAL_ERROR";

/// Result of one logical transaction that reached the hub and got a readable answer.
///
/// `success` mirrors `hub_state == 0`. A hub rejection is an `Outcome` with
/// `success == false`, not an error.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub transaction_id: TransactionId,
    /// The step whose answer this is. CHECK when a two-step vend stops early.
    pub action: Action,
    pub two_step: bool,
    pub phase: VendPhase,
    pub success: bool,
    pub hub_state: i32,
    pub hub_code: Option<String>,
    pub tokens: TokenSet,
    pub invoice: Option<String>,
    pub result: HubResult,
    pub raw_response: String,
    /// Set when the hub answered but the ledger could not record it.
    pub ledger_error: Option<String>,
}

/// Drives a request through signing, encoding, the ledger and the hub.
///
/// Holds no per-request state; one instance can serve any number of
/// concurrent calls.
pub struct VendOrchestrator {
    signer: Signer,
    transport: HubTransportBox,
    retry: RetryPolicy,
    ledger: TransactionLedgerBox,
}

impl VendOrchestrator {
    /// Creates an orchestrator with the default retry policy.
    pub fn new(signer: Signer, transport: HubTransportBox, ledger: TransactionLedgerBox) -> Self {
        Self {
            signer,
            transport,
            retry: RetryPolicy::default(),
            ledger,
        }
    }

    /// Replaces the default retry policy used for every hub round trip.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Runs `request` to a terminal outcome. A [`Action::Check`] request runs
    /// as a two-step vend.
    ///
    /// Validation failures return before anything is recorded. Once the
    /// pending ledger entry exists, every failure closes it as `FAILED` and is
    /// returned as [`VendError::Aborted`].
    pub async fn execute(&self, request: VendRequest) -> Result<Outcome> {
        request.validate()?;
        match request.action {
            Action::Check => self.run_two_step(request).await,
            Action::Purchase | Action::Balance | Action::GetTrans => {
                self.run_single(request).await
            }
        }
    }

    /// Sends one PURCHASE for `meter` under a fresh transaction id.
    ///
    /// # Arguments
    ///
    /// * `meter` - The meter to credit.
    /// * `amount` - The amount to vend, already checked positive.
    ///
    /// A hub rejection comes back as an [`Outcome`] with `success == false`.
    pub async fn execute_single_step(&self, meter: MeterNumber, amount: Amount) -> Result<Outcome> {
        self.execute(VendRequest::purchase(meter, amount)).await
    }

    /// Sends CHECK, then PURCHASE under the same transaction id.
    ///
    /// PURCHASE is only sent when CHECK returns `state == 0`. When CHECK is
    /// rejected the outcome's `action` is [`Action::Check`] and carries
    /// CHECK's code, while the ledger entry stays a two-step PURCHASE.
    pub async fn execute_two_step(&self, meter: MeterNumber, amount: Amount) -> Result<Outcome> {
        self.execute(VendRequest::check(meter, amount)).await
    }

    /// Queries the vendor account balance.
    pub async fn execute_balance(&self) -> Result<Outcome> {
        self.execute(VendRequest::balance()).await
    }

    /// Lists the hub's recent transactions for `meter`.
    ///
    /// The entries are in `outcome.result.transactions`, ordered by their
    /// index on the wire.
    pub async fn execute_last_transactions(&self, meter: MeterNumber) -> Result<Outcome> {
        self.execute(VendRequest::last_transactions(meter)).await
    }

    fn encode(&self, request: &VendRequest) -> Result<Vec<u8>> {
        let signature = self
            .signer
            .sign(&request.transaction_id, request.meter_number.as_ref());
        xml::encode(request, self.signer.username(), &signature)
    }

    /// Opens the ledger entry. Nothing goes on the wire if this fails.
    async fn open(&self, session: &mut VendSession, request: &VendRequest, payload: &[u8]) -> Result<()> {
        let action = if session.is_two_step() {
            Action::Purchase
        } else {
            request.action
        };
        let entry = PendingEntry {
            transaction_id: request.transaction_id.clone(),
            meter_number: request.meter_number.clone(),
            action,
            two_step: session.is_two_step(),
            amount: request.amount,
            request_payload: String::from_utf8_lossy(payload).into_owned(),
        };
        if let Err(e) = self.ledger.record_pending(entry).await {
            error!(transaction_id = %request.transaction_id, error = %e, "Failed to record pending transaction");
            session.advance(VendPhase::FailedLocal)?;
            return Err(e);
        }
        session.advance(VendPhase::Pending)
    }

    async fn run_single(&self, request: VendRequest) -> Result<Outcome> {
        let mut session = VendSession::new(request.transaction_id.clone(), false);
        let payload = self.encode(&request)?;
        self.open(&mut session, &request, &payload).await?;
        info!(transaction_id = %request.transaction_id, action = %request.action, "Sending request to hub");

        let (result, raw) = self.round_trip(&mut session, request.action, &payload).await?;
        self.finish(&mut session, request.action, result, raw).await
    }

    async fn run_two_step(&self, request: VendRequest) -> Result<Outcome> {
        let mut session = VendSession::new(request.transaction_id.clone(), true);
        let check_payload = self.encode(&request)?;
        self.open(&mut session, &request, &check_payload).await?;

        if let Err(e) = session.advance(VendPhase::Checking) {
            return Err(self.abort(&mut session, VendPhase::FailedLocal, e).await);
        }
        info!(transaction_id = %request.transaction_id, "Sending CHECK to hub");
        let (check, check_raw) = self
            .round_trip(&mut session, Action::Check, &check_payload)
            .await?;
        if !check.is_success() {
            warn!(
                transaction_id = %request.transaction_id,
                state = check.state,
                code = check.error_code.as_deref().unwrap_or_default(),
                "CHECK rejected by hub, PURCHASE not sent"
            );
            return self.finish(&mut session, Action::Check, check, check_raw).await;
        }

        if let Err(e) = session.advance(VendPhase::Purchasing) {
            return Err(self.abort(&mut session, VendPhase::FailedLocal, e).await);
        }
        let verify_data = match check.extra("verifyData").filter(|v| !v.is_empty()) {
            Some(value) => value.to_string(),
            None if request.verify_data.is_empty() => SKIP_VERIFY_DATA.to_string(),
            None => request.verify_data.clone(),
        };
        let mut purchase = request;
        purchase.action = Action::Purchase;
        purchase.verify_data = verify_data;

        let purchase_payload = match self.encode(&purchase) {
            Ok(payload) => payload,
            Err(e) => return Err(self.abort(&mut session, VendPhase::FailedLocal, e).await),
        };
        info!(transaction_id = %purchase.transaction_id, "Sending PURCHASE to hub");
        let (result, raw) = self
            .round_trip(&mut session, Action::Purchase, &purchase_payload)
            .await?;
        self.finish(&mut session, Action::Purchase, result, raw).await
    }

    /// Sends and decodes one request. Failures close the ledger entry.
    async fn round_trip(
        &self,
        session: &mut VendSession,
        action: Action,
        payload: &[u8],
    ) -> Result<(HubResult, String)> {
        let bytes = match send_with_retry(self.transport.as_ref(), &self.retry, action, payload).await {
            Ok(bytes) => bytes,
            Err(e) => return Err(self.abort(session, VendPhase::FailedTransport, e).await),
        };
        match xml::decode(&bytes) {
            Ok(result) => Ok((result, String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) => {
                if let VendError::Parse { reason, raw } = &e {
                    error!(
                        transaction_id = %session.transaction_id(),
                        %action,
                        reason = %reason,
                        raw = %raw,
                        "Unparsable hub response"
                    );
                }
                Err(self.abort(session, VendPhase::FailedLocal, e).await)
            }
        }
    }

    /// Records the hub's verdict. A ledger failure here is reported on the
    /// outcome instead of replacing it.
    async fn finish(
        &self,
        session: &mut VendSession,
        action: Action,
        result: HubResult,
        raw: String,
    ) -> Result<Outcome> {
        let success = result.is_success();
        let phase = if success {
            VendPhase::Succeeded
        } else {
            VendPhase::FailedProtocol
        };
        if let Err(e) = session.advance(phase) {
            return Err(self.abort(session, VendPhase::FailedLocal, e).await);
        }

        let ledger_outcome = LedgerOutcome {
            status: if success {
                TransactionStatus::Success
            } else {
                TransactionStatus::Failed
            },
            hub_state: Some(result.state),
            hub_error_code: result.error_code.clone(),
            token: result.raw_token.clone(),
            invoice: result.invoice_number.clone(),
            response_payload: Some(raw.clone()),
        };
        let ledger_error = match self
            .ledger
            .record_outcome(session.transaction_id(), ledger_outcome)
            .await
        {
            Ok(()) => None,
            Err(e) => {
                error!(
                    transaction_id = %session.transaction_id(),
                    error = %e,
                    "Failed to record transaction outcome; hub result still returned"
                );
                Some(e.to_string())
            }
        };

        if success {
            info!(transaction_id = %session.transaction_id(), %action, "Transaction succeeded");
        } else {
            warn!(
                transaction_id = %session.transaction_id(),
                %action,
                state = result.state,
                code = result.error_code.as_deref().unwrap_or_default(),
                "Hub rejected transaction"
            );
        }

        Ok(Outcome {
            transaction_id: session.transaction_id().clone(),
            action,
            two_step: session.is_two_step(),
            phase,
            success,
            hub_state: result.state,
            hub_code: result.error_code.clone(),
            tokens: normalize(result.raw_token.as_deref()),
            invoice: result.invoice_number.clone(),
            result,
            raw_response: raw,
            ledger_error,
        })
    }

    /// Closes the open ledger entry as `FAILED` and wraps `cause`.
    async fn abort(&self, session: &mut VendSession, phase: VendPhase, cause: VendError) -> VendError {
        let (code, detail) = match &cause {
            VendError::TransportExhausted { .. } => (CODE_TRANSPORT_EXHAUSTED, cause.to_string()),
            VendError::Transport(_) => (CODE_TRANSPORT_ERROR, cause.to_string()),
            VendError::Parse { raw, .. } => (CODE_PARSE_ERROR, raw.clone()),
            _ => (CODE_LOCAL_ERROR, cause.to_string()),
        };
        warn!(transaction_id = %session.transaction_id(), ?phase, code, error = %cause, "Aborting transaction");

        let ledger_error = match self
            .ledger
            .record_outcome(session.transaction_id(), LedgerOutcome::local_failure(code, detail))
            .await
        {
            Ok(()) => None,
            Err(e) => {
                error!(
                    transaction_id = %session.transaction_id(),
                    error = %e,
                    "Failed to close ledger entry after error"
                );
                Some(e.to_string())
            }
        };
        if let Err(e) = session.advance(phase) {
            warn!(transaction_id = %session.transaction_id(), error = %e, "Session already terminal");
        }

        VendError::Aborted {
            transaction_id: session.transaction_id().clone(),
            phase,
            source: Box::new(cause),
            ledger_error,
        }
    }
}
