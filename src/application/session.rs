use crate::domain::transaction::TransactionId;
use crate::error::{Result, VendError};
use serde::Serialize;

/// Lifecycle of one logical vend, from id allocation to a terminal outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VendPhase {
    Created,
    /// The ledger holds an open entry for this transaction.
    Pending,
    Checking,
    Purchasing,
    Succeeded,
    FailedProtocol,
    FailedTransport,
    FailedLocal,
}

impl VendPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::FailedProtocol | Self::FailedTransport | Self::FailedLocal
        )
    }

    fn can_advance_to(&self, next: VendPhase) -> bool {
        use VendPhase::*;
        match self {
            Created => matches!(next, Pending | FailedLocal),
            Pending => matches!(next, Checking) || next.is_terminal(),
            Checking => matches!(next, Purchasing) || next.is_terminal(),
            Purchasing => next.is_terminal(),
            _ => false,
        }
    }
}

/// Per-call state for one transaction. Lives on the orchestrating call's stack
/// and is dropped with it; two-step vends reuse its id for both round trips.
#[derive(Debug)]
pub struct VendSession {
    transaction_id: TransactionId,
    phase: VendPhase,
    two_step: bool,
}

impl VendSession {
    pub fn new(transaction_id: TransactionId, two_step: bool) -> Self {
        Self {
            transaction_id,
            phase: VendPhase::Created,
            two_step,
        }
    }

    pub fn transaction_id(&self) -> &TransactionId {
        &self.transaction_id
    }

    pub fn phase(&self) -> VendPhase {
        self.phase
    }

    pub fn is_two_step(&self) -> bool {
        self.two_step
    }

    pub fn advance(&mut self, next: VendPhase) -> Result<()> {
        let allowed = self.phase.can_advance_to(next)
            && (self.two_step || !matches!(next, VendPhase::Checking | VendPhase::Purchasing));
        if !allowed {
            return Err(VendError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        self.phase = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(two_step: bool) -> VendSession {
        VendSession::new(TransactionId::generate(), two_step)
    }

    #[test]
    fn test_two_step_path() {
        let mut s = session(true);
        for phase in [
            VendPhase::Pending,
            VendPhase::Checking,
            VendPhase::Purchasing,
            VendPhase::Succeeded,
        ] {
            s.advance(phase).unwrap();
        }
        assert!(s.phase().is_terminal());
    }

    #[test]
    fn test_single_step_skips_checking() {
        let mut s = session(false);
        s.advance(VendPhase::Pending).unwrap();
        assert!(matches!(
            s.advance(VendPhase::Checking),
            Err(VendError::InvalidTransition { .. })
        ));
        s.advance(VendPhase::FailedTransport).unwrap();
    }

    #[test]
    fn test_terminal_phases_are_final() {
        let mut s = session(false);
        s.advance(VendPhase::Pending).unwrap();
        s.advance(VendPhase::FailedProtocol).unwrap();
        for next in [VendPhase::Pending, VendPhase::Succeeded, VendPhase::FailedLocal] {
            assert!(s.advance(next).is_err());
        }
        assert_eq!(s.phase(), VendPhase::FailedProtocol);
    }

    #[test]
    fn test_no_network_phase_before_pending() {
        let mut s = session(true);
        assert!(s.advance(VendPhase::Checking).is_err());
        assert!(s.advance(VendPhase::Succeeded).is_err());
        s.advance(VendPhase::FailedLocal).unwrap();
    }
}
