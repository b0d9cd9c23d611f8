//! Ledger store adapters implementing the ports in [`crate::domain::ports`].

pub mod in_memory;
#[cfg(feature = "storage-postgres")]
pub mod postgres;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod row_locks;
