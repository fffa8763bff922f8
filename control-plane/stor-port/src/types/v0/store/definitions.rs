//! The driver's only durable state is a handful of per-volume admin
//! metadata keys owned by the volume manager's database. The store trait
//! below is the seam through which they are read and written.

use crate::types::v0::transport::VolumeId;
use async_trait::async_trait;
use snafu::Snafu;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Error type for all store operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StoreError {
    /// Failed to read an entry from the store.
    #[snafu(display("Failed to get metadata key '{}' of volume '{}': {}", key, volume, reason))]
    Get {
        /// The volume whose metadata was read.
        volume: VolumeId,
        /// The metadata key.
        key: String,
        /// Failure detail.
        reason: String,
    },
    /// Failed to write an entry to the store.
    #[snafu(display("Failed to put metadata key '{}' of volume '{}': {}", key, volume, reason))]
    Put {
        /// The volume whose metadata was written.
        volume: VolumeId,
        /// The metadata key.
        key: String,
        /// Failure detail.
        reason: String,
    },
}

/// Admin metadata of a volume, keyed by name. Absence of a key means the
/// corresponding state does not exist.
#[async_trait]
pub trait AdminMetadataStore: Send + Sync {
    /// Get one metadata value of a volume.
    async fn get(&self, volume: &VolumeId, key: &str) -> Result<Option<String>, StoreError>;
    /// Set one metadata value of a volume.
    async fn put(&self, volume: &VolumeId, key: &str, value: &str) -> Result<(), StoreError>;
    /// Delete one metadata value of a volume.
    async fn delete(&self, volume: &VolumeId, key: &str) -> Result<(), StoreError>;
}

/// In-memory metadata store, used by tests and single-process deployments.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    entries: Arc<Mutex<HashMap<(VolumeId, String), String>>>,
}

impl InMemoryStore {
    /// Return a new empty `Self`.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AdminMetadataStore for InMemoryStore {
    async fn get(&self, volume: &VolumeId, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().unwrap();
        Ok(entries.get(&(volume.clone(), key.to_string())).cloned())
    }
    async fn put(&self, volume: &VolumeId, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert((volume.clone(), key.to_string()), value.to_string());
        Ok(())
    }
    async fn delete(&self, volume: &VolumeId, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap();
        entries.remove(&(volume.clone(), key.to_string()));
        Ok(())
    }
}
