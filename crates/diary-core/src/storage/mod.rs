//! Storage layer
//!
//! Durable key-value persistence for the four record collections plus the
//! remembered-names list. Each key maps to one JSON document in the data
//! directory; there is no partial write at this layer, callers
//! read-modify-write through [`LocalStore::modify`].

pub mod error;
pub mod local;

pub use error::{StorageError, StorageResult};
pub use local::{LocalStore, StorageStats, StoreKey};
