//! Adapters for the domain ports: history stores and device stand-ins.

pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod simulated;
