//! Bill generation.
//!
//! The generator runs after a record is saved. Its reference is attached to
//! the active renewal record; a failure leaves the record without one.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use validity::{Money, ValidityWindow};

/// Error types for document generation.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// Generator not reachable
    #[error("Document generator unavailable: {0}")]
    Unavailable(String),

    /// Generator rejected the request
    #[error("Document rejected: {0}")]
    Rejected(String),
}

/// What a bill is generated for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillRequest {
    /// Record the bill belongs to
    pub record_id: String,
    /// Segment identifier printed on the bill
    pub identifier: String,
    pub holder_name: String,
    pub segment: ValidityWindow,
    pub fees: Money,
}

/// Produces a bill and returns a reference to it.
#[async_trait]
pub trait DocumentGenerator: Send + Sync {
    async fn generate(&self, request: &BillRequest) -> Result<String, DocumentError>;
}

/// Mock generator for testing.
pub struct MockDocumentGenerator {
    prefix: String,
    available: AtomicBool,
    call_count: AtomicU32,
}

impl MockDocumentGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            available: AtomicBool::new(true),
            call_count: AtomicU32::new(0),
        }
    }

    /// Set availability.
    pub fn with_available(self, available: bool) -> Self {
        self.available.store(available, Ordering::SeqCst);
        self
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of times generate was called.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }
}

impl Default for MockDocumentGenerator {
    fn default() -> Self {
        Self::new("bills")
    }
}

#[async_trait]
impl DocumentGenerator for MockDocumentGenerator {
    async fn generate(&self, request: &BillRequest) -> Result<String, DocumentError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        if !self.available.load(Ordering::SeqCst) {
            return Err(DocumentError::Unavailable("Mock generator disabled".to_string()));
        }
        Ok(format!("{}/{}.pdf", self.prefix, request.identifier))
    }
}
