//! Application layer: the vend orchestrator, its per-request session, and
//! ledger inquiries.

pub mod inquiry;
pub mod orchestrator;
pub mod session;
