//! Shared types for the renewal desk.

use serde::{Deserialize, Serialize};
use std::fmt;

use validity::{
    Classification, DrivingLicence, ExpiryContext, InvariantViolation, Money, NationalPermit,
    RenewalError, RenewalRecord, ThresholdError, ValidationError, ValidityWindow,
};

use crate::config::ConfigError;
use crate::documents::DocumentError;
use crate::store::StoreError;

/// Kind of record the desk manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Permit,
    Licence,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Permit => "permit",
            Self::Licence => "licence",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of one track as of today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackStatus {
    pub context: ExpiryContext,
    pub window: ValidityWindow,
    pub classification: Classification,
    /// Whether the renew action is shown
    pub renew_offered: bool,
    /// "12 days left", "Expired 3 days ago"
    pub label: String,
}

/// Status of a permit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitStatus {
    pub permit_id: String,
    pub part_a: TrackStatus,
    pub part_b: Option<TrackStatus>,
    pub balance: Money,
    pub pending_payment: bool,
}

/// Status of a licence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenceStatus {
    pub licence_id: String,
    pub licence: TrackStatus,
    pub learning: Option<TrackStatus>,
    pub balance: Money,
    pub pending_payment: bool,
}

/// Result of a renewal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalOutcome<T> {
    /// The saved record
    pub record: T,
    /// The record that was in force before the renewal
    pub archived: RenewalRecord,
    /// Bill reference, if one was generated
    pub document: Option<String>,
}

pub type PermitRenewal = RenewalOutcome<NationalPermit>;
pub type LicenceRenewal = RenewalOutcome<DrivingLicence>;

/// Error types for the renewal desk.
#[derive(Debug, thiserror::Error)]
pub enum OfficeError {
    /// No record with that ID
    #[error("{kind} not found: {id}")]
    NotFound { kind: RecordKind, id: String },

    #[error(transparent)]
    Renewal(#[from] RenewalError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Stored record is malformed
    #[error("Stored record violates an invariant: {0}")]
    Invariant(#[from] InvariantViolation),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Threshold error: {0}")]
    Threshold(#[from] ThresholdError),
}

impl OfficeError {
    pub fn not_found(kind: RecordKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, OfficeError>;
