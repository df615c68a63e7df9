//! Validity windows and renewals for transport-office permits and licences
//!
//! The engine is pure and synchronous. It covers five concerns:
//!
//! - **Normalize**: Free-typed dates (`24/1/25`, `24012025`) into calendar dates
//! - **Duration**: Policy-derived end dates, `(start + span) - 1 day`
//! - **Classify**: Days remaining into urgency buckets per expiry context
//! - **Renewal**: Append-only history of segments per validity track
//! - **Aggregate**: Dashboard counts and filtered lists sharing one predicate
//!
//! # Key Components
//!
//! - [`normalize()`]: Parse a typed date, rejecting anything not on the calendar
//! - [`DurationPolicy`]: Five-year permit, one-year authorization, 30-day window
//! - [`Classifier`]: Applies a [`ThresholdTable`] to an end date
//! - [`ValidityTrack`]: One renewable track (Part A, Part B, a licence)
//! - [`NationalPermit`] / [`DrivingLicence`]: The records the office keeps
//! - [`DashboardSummary`]: Tile counts over a set of records
//!
//! # Example
//!
//! ```ignore
//! use validity::{Classifier, ExpiryContext, NationalPermit, PermitPart, SegmentRequest};
//!
//! let permit = NationalPermit::issue("p-1", &draft, Utc::now())?;
//! let request = SegmentRequest::new("NP-B-0043", "01-03-2025", fees);
//! let (permit, archived) = permit.renew(PermitPart::PartB, &request, Utc::now())?;
//!
//! let classifier = Classifier::default();
//! if let Some(part_b) = permit.part_b() {
//!     let end = part_b.current_window()?.end_date();
//!     let status = classifier.classify(end, today, ExpiryContext::PermitPartB);
//! }
//! ```

pub mod aggregate;
pub mod classify;
pub mod duration;
pub mod fields;
pub mod normalize;
pub mod record;
pub mod renewal;
pub mod types;

// Re-export main types
pub use aggregate::{
    aggregate, bucket_of, filter, licence_tiles, permit_tiles, BucketCounts, DashboardSummary,
    Tile, TileCount, Tracked,
};
pub use classify::{
    days_remaining, describe_remaining, Classification, Classifier, ContextBounds, ExpiryContext,
    ThresholdError, ThresholdTable, UrgencyBucket,
};
pub use duration::{compute_end, DurationPolicy, WindowDraft};
pub use fields::{has_value, optional_text, NOT_APPLICABLE};
pub use normalize::{
    expand_year, normalize, normalize_optional, reformat, to_canonical, DateComponent,
    NormalizationError,
};
pub use record::{Billing, DrivingLicence, LicenceDraft, NationalPermit, PermitDraft, PermitPart};
pub use renewal::{
    RenewalError, RenewalHistory, RenewalRecord, SegmentRequest, ValidationError, ValidityTrack,
};
pub use types::*;
