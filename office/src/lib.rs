//! Renewal desk for a transport office
//!
//! Wraps the [`validity`] engine with the collaborators a request handler
//! needs:
//!
//! - [`RecordStore`]: Whole-record persistence for permits and licences
//! - [`Clock`]: Today's date for classification, timestamps for records
//! - [`DocumentGenerator`]: Bills for issued and renewed segments
//! - [`RenewalAudit`]: Bounded trail of issuances and renewals
//!
//! # Example
//!
//! ```ignore
//! use office::{InMemoryStore, OfficeConfig, RenewalDesk, SystemClock};
//!
//! let desk = RenewalDesk::new(config, Arc::new(InMemoryStore::new()), Arc::new(SystemClock))?;
//! let permit = desk.issue_permit(&draft).await?;
//! let outcome = desk.renew_permit(&permit.id, PermitPart::PartB, &request).await?;
//! let summary = desk.permit_dashboard().await?;
//! ```

pub mod audit;
pub mod clock;
pub mod config;
pub mod documents;
pub mod service;
pub mod store;
pub mod types;

// Re-export main types
pub use audit::{AuditAction, AuditEntry, RenewalAudit};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{AuditConfig, ConfigError, DocumentConfig, GeneralConfig, OfficeConfig};
pub use documents::{BillRequest, DocumentError, DocumentGenerator, MockDocumentGenerator};
pub use service::RenewalDesk;
pub use store::{InMemoryStore, RecordStore, StoreError};
pub use types::*;
