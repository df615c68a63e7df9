//! Record persistence.
//!
//! The desk reads and writes whole records; the store never sees a partial
//! renewal. Each save replaces the stored record.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use validity::{DrivingLicence, NationalPermit};

/// Error types for record storage.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backend not reachable
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Stored data could not be decoded
    #[error("Corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

/// Persistence for permits and licences.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn load_permit(&self, id: &str) -> Result<Option<NationalPermit>, StoreError>;

    async fn save_permit(&self, permit: &NationalPermit) -> Result<(), StoreError>;

    async fn list_permits(&self) -> Result<Vec<NationalPermit>, StoreError>;

    async fn load_licence(&self, id: &str) -> Result<Option<DrivingLicence>, StoreError>;

    async fn save_licence(&self, licence: &DrivingLicence) -> Result<(), StoreError>;

    async fn list_licences(&self) -> Result<Vec<DrivingLicence>, StoreError>;
}

/// In-memory store.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    permits: Arc<RwLock<HashMap<String, NationalPermit>>>,
    licences: Arc<RwLock<HashMap<String, DrivingLicence>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing records.
    pub async fn load(&self, permits: Vec<NationalPermit>, licences: Vec<DrivingLicence>) {
        let mut stored = self.permits.write().await;
        for permit in permits {
            stored.insert(permit.id.clone(), permit);
        }
        drop(stored);

        let mut stored = self.licences.write().await;
        for licence in licences {
            stored.insert(licence.id.clone(), licence);
        }
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn load_permit(&self, id: &str) -> Result<Option<NationalPermit>, StoreError> {
        Ok(self.permits.read().await.get(id).cloned())
    }

    async fn save_permit(&self, permit: &NationalPermit) -> Result<(), StoreError> {
        self.permits
            .write()
            .await
            .insert(permit.id.clone(), permit.clone());
        Ok(())
    }

    async fn list_permits(&self) -> Result<Vec<NationalPermit>, StoreError> {
        let mut permits: Vec<_> = self.permits.read().await.values().cloned().collect();
        permits.sort_by(|a, b| a.permit_number.cmp(&b.permit_number));
        Ok(permits)
    }

    async fn load_licence(&self, id: &str) -> Result<Option<DrivingLicence>, StoreError> {
        Ok(self.licences.read().await.get(id).cloned())
    }

    async fn save_licence(&self, licence: &DrivingLicence) -> Result<(), StoreError> {
        self.licences
            .write()
            .await
            .insert(licence.id.clone(), licence.clone());
        Ok(())
    }

    async fn list_licences(&self) -> Result<Vec<DrivingLicence>, StoreError> {
        let mut licences: Vec<_> = self.licences.read().await.values().cloned().collect();
        licences.sort_by(|a, b| a.licence_number.cmp(&b.licence_number));
        Ok(licences)
    }
}
