//! Adapters for the domain ports: hub transports and ledger backends.

pub mod http;
pub mod in_memory;
pub mod mock;
pub mod retry;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
