//! Domain layer: protocol values, the audit record lifecycle, token rules,
//! request signing and the ports adapters plug into.

pub mod hub;
pub mod ports;
pub mod record;
pub mod signer;
pub mod token;
pub mod transaction;
