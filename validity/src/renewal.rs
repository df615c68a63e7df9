//! Renewal history.
//!
//! Each validity track (a permit part, a licence) owns an append-only list of
//! [`RenewalRecord`]s. The first one is the original issuance and stays at the
//! head of the list forever; every renewal appends a record for the new
//! segment and hands back the record it superseded.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[cfg(feature = "typescript")]
use ts_rs::TS;

use crate::duration::{compute_end, DurationPolicy};
use crate::fields::{deserialize_optional_text, has_value, present};
use crate::normalize::{normalize, NormalizationError};
use crate::types::{InvariantViolation, Money, PaymentStatus, ValidityWindow};

/// Rejected issuance or renewal input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A required field was blank
    #[error("{0} is required")]
    MissingField(&'static str),

    /// Fees of zero or less
    #[error("Fees must be greater than zero, got {0}")]
    NonPositiveFee(Money),

    /// Negative amount collected
    #[error("Amount paid cannot be negative, got {0}")]
    NegativePayment(Money),

    /// A date field that does not normalize
    #[error("Invalid {field}: {source}")]
    InvalidDate {
        field: &'static str,
        #[source]
        source: NormalizationError,
    },

    /// An explicit end before the start
    #[error("Valid to ({end}) is before valid from ({start})")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },

    /// No policy to derive the end from and none supplied
    #[error("Valid to is required when no duration policy applies")]
    MissingEndDate,

    /// Renewing a part that was never issued
    #[error("{0} has not been issued")]
    MissingTrack(String),

    /// Issuing a part that already exists
    #[error("{0} has already been issued")]
    AlreadyIssued(String),

    /// A payment of zero or less
    #[error("Payment must be greater than zero, got {0}")]
    NonPositivePayment(Money),

    /// Running totals would overflow
    #[error("{field} is out of range")]
    AmountOutOfRange { field: &'static str },
}

/// Failure of an issuance or renewal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenewalError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

/// Raw input for a new segment, as typed at the counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct SegmentRequest {
    /// Permit / licence / receipt number for this segment
    pub identifier: String,
    /// Start date in any accepted shorthand
    pub valid_from: String,
    /// Explicit end date; derived from the policy when absent
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    pub valid_to: Option<String>,
    /// Fee charged for this segment
    pub fees: Money,
    /// Amount collected with the application
    #[serde(default)]
    pub amount_paid: Money,
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    pub notes: Option<String>,
}

impl SegmentRequest {
    pub fn new(identifier: impl Into<String>, valid_from: impl Into<String>, fees: Money) -> Self {
        Self {
            identifier: identifier.into(),
            valid_from: valid_from.into(),
            valid_to: None,
            fees,
            amount_paid: Money::ZERO,
            notes: None,
        }
    }

    /// Builder: explicit end date.
    pub fn with_valid_to(mut self, valid_to: impl Into<String>) -> Self {
        self.valid_to = Some(valid_to.into());
        self
    }

    /// Builder: amount collected up front.
    pub fn with_amount_paid(mut self, amount_paid: Money) -> Self {
        self.amount_paid = amount_paid;
        self
    }

    /// Builder: free-text notes.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Validate the input and resolve the segment it describes.
    ///
    /// An explicit `valid_to` wins over the policy; without one the end is
    /// derived from the start. The segment may start anywhere relative to the
    /// previous one: gaps and backdating are accepted.
    pub fn resolve(&self, policy: Option<DurationPolicy>) -> Result<ValidityWindow, RenewalError> {
        if !has_value(&self.identifier) {
            return Err(ValidationError::MissingField("identifier").into());
        }
        if !self.fees.is_positive() {
            return Err(ValidationError::NonPositiveFee(self.fees).into());
        }
        if self.amount_paid.is_negative() {
            return Err(ValidationError::NegativePayment(self.amount_paid).into());
        }

        let start = normalize(&self.valid_from).map_err(|source| ValidationError::InvalidDate {
            field: "valid_from",
            source,
        })?;

        let explicit_end = present(self.valid_to.clone())
            .map(|raw| normalize(&raw))
            .transpose()
            .map_err(|source| ValidationError::InvalidDate {
                field: "valid_to",
                source,
            })?;

        let end = match (explicit_end, policy) {
            (Some(end), _) => end,
            (None, Some(policy)) => compute_end(start, policy)?,
            (None, None) => return Err(ValidationError::MissingEndDate.into()),
        };
        if end < start {
            return Err(ValidationError::EndBeforeStart { start, end }.into());
        }

        Ok(ValidityWindow::new(start, end)?)
    }
}

/// One segment in a track's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct RenewalRecord {
    /// Set only on the issuance record
    pub is_original: bool,
    pub segment: ValidityWindow,
    pub identifier: String,
    pub fees: Money,
    pub payment_status: PaymentStatus,
    /// When the record was created
    pub renewal_date: DateTime<Utc>,
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    pub notes: Option<String>,
    /// Bill / document reference produced after the fact
    #[serde(default)]
    pub document: Option<String>,
}

impl RenewalRecord {
    fn from_request(
        is_original: bool,
        segment: ValidityWindow,
        request: &SegmentRequest,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            is_original,
            segment,
            identifier: request.identifier.trim().to_string(),
            fees: request.fees,
            payment_status: PaymentStatus::for_amounts(request.fees, request.amount_paid),
            renewal_date: at,
            notes: present(request.notes.clone()),
            document: None,
        }
    }
}

/// Append-only, oldest-first list of renewal records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(transparent)]
pub struct RenewalHistory {
    records: Vec<RenewalRecord>,
}

impl RenewalHistory {
    fn starting_with(original: RenewalRecord) -> Self {
        Self {
            records: vec![original],
        }
    }

    fn append(&mut self, record: RenewalRecord) {
        self.records.push(record);
    }

    /// The record currently in force.
    pub fn active(&self) -> Option<&RenewalRecord> {
        self.records.last()
    }

    /// The issuance record.
    pub fn original(&self) -> Option<&RenewalRecord> {
        self.records.iter().find(|r| r.is_original)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn oldest_first(&self) -> impl Iterator<Item = &RenewalRecord> {
        self.records.iter()
    }

    pub fn newest_first(&self) -> impl Iterator<Item = &RenewalRecord> {
        self.records.iter().rev()
    }

    /// SHA-256 over the ordered history, for the audit trail.
    pub fn digest(&self) -> String {
        let json = serde_json::to_string(&self.records).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// A validity track: its duration rule and its history.
///
/// `policy` is `None` for tracks whose end dates are always typed in
/// (a driving licence).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ValidityTrack {
    policy: Option<DurationPolicy>,
    history: RenewalHistory,
}

impl ValidityTrack {
    /// Issue a track: its first record is the original.
    pub fn issue(
        policy: Option<DurationPolicy>,
        request: &SegmentRequest,
        issued_at: DateTime<Utc>,
    ) -> Result<Self, RenewalError> {
        let segment = request.resolve(policy)?;
        let original = RenewalRecord::from_request(true, segment, request, issued_at);
        Ok(Self {
            policy,
            history: RenewalHistory::starting_with(original),
        })
    }

    /// Renew into a new segment.
    ///
    /// Returns the renewed track and the record it superseded; `self` is left
    /// as it was.
    pub fn renew(
        &self,
        request: &SegmentRequest,
        renewed_at: DateTime<Utc>,
    ) -> Result<(Self, RenewalRecord), RenewalError> {
        let segment = request.resolve(self.policy)?;
        let previous = match self.history.active() {
            Some(record) => record.clone(),
            None => {
                tracing::error!("Renewal attempted on a track with no history");
                return Err(InvariantViolation::EmptyHistory.into());
            }
        };

        let mut renewed = self.clone();
        renewed
            .history
            .append(RenewalRecord::from_request(false, segment, request, renewed_at));

        tracing::debug!(
            previous = %previous.identifier,
            identifier = %request.identifier.trim(),
            segment = %segment,
            "Appended renewal record"
        );

        Ok((renewed, previous))
    }

    pub fn policy(&self) -> Option<DurationPolicy> {
        self.policy
    }

    pub fn history(&self) -> &RenewalHistory {
        &self.history
    }

    pub fn active(&self) -> Option<&RenewalRecord> {
        self.history.active()
    }

    /// The window in force.
    ///
    /// Fails on a track loaded from storage with no records or with a
    /// reversed segment.
    pub fn current_window(&self) -> Result<ValidityWindow, InvariantViolation> {
        let window = self
            .history
            .active()
            .ok_or(InvariantViolation::EmptyHistory)?
            .segment;
        window.check()?;
        Ok(window)
    }

    /// Mark every pending record as paid once the record's balance is settled.
    pub(crate) fn settle(&mut self) {
        for record in &mut self.history.records {
            record.payment_status = PaymentStatus::Paid;
        }
    }

    /// Attach a generated document to the active record.
    ///
    /// Only the record with `identifier` can take it, and only once.
    pub fn attach_document(&mut self, identifier: &str, reference: impl Into<String>) -> bool {
        match self.history.records.last_mut() {
            Some(record) if record.identifier == identifier && record.document.is_none() => {
                record.document = Some(reference.into());
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn part_b_issue() -> SegmentRequest {
        SegmentRequest::new("AUTH-001", "24-01-2025", Money::from_major(15_000))
            .with_amount_paid(Money::from_major(15_000))
    }

    #[test]
    fn test_issue_creates_original() {
        let track = ValidityTrack::issue(
            Some(DurationPolicy::OneYearAuthorization),
            &part_b_issue(),
            at(2025, 1, 24),
        )
        .unwrap();

        assert_eq!(track.history().len(), 1);
        let original = track.history().original().unwrap();
        assert!(original.is_original);
        assert_eq!(original.segment.end_date(), date(2026, 1, 23));
        assert_eq!(original.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn test_renew_appends_and_returns_previous() {
        let track = ValidityTrack::issue(
            Some(DurationPolicy::OneYearAuthorization),
            &part_b_issue(),
            at(2025, 1, 24),
        )
        .unwrap();

        let request = SegmentRequest::new("AUTH-002", "01-03-2025", Money::from_major(15_000));
        let (renewed, previous) = track.renew(&request, at(2025, 3, 1)).unwrap();

        assert_eq!(previous.identifier, "AUTH-001");
        assert!(previous.is_original);
        assert_eq!(track.history().len(), 1);
        assert_eq!(renewed.history().len(), 2);

        let active = renewed.active().unwrap();
        assert!(!active.is_original);
        assert_eq!(active.segment.start_date(), date(2025, 3, 1));
        assert_eq!(active.segment.end_date(), date(2026, 2, 28));
        assert_eq!(active.payment_status, PaymentStatus::Pending);
        assert_eq!(renewed.history().original(), track.history().original());
    }

    #[test]
    fn test_renew_accepts_gaps_and_backdating() {
        let track = ValidityTrack::issue(
            Some(DurationPolicy::OneYearAuthorization),
            &part_b_issue(),
            at(2025, 1, 24),
        )
        .unwrap();

        let backdated = SegmentRequest::new("AUTH-000", "01-01-2024", Money::from_major(100));
        assert!(track.renew(&backdated, at(2025, 2, 1)).is_ok());

        let gapped = SegmentRequest::new("AUTH-009", "01-06-2027", Money::from_major(100));
        assert!(track.renew(&gapped, at(2025, 2, 1)).is_ok());
    }

    #[test]
    fn test_renew_validation() {
        let track = ValidityTrack::issue(
            Some(DurationPolicy::OneYearAuthorization),
            &part_b_issue(),
            at(2025, 1, 24),
        )
        .unwrap();
        let now = at(2025, 3, 1);

        let blank = SegmentRequest::new("  ", "01-03-2025", Money::from_major(10));
        assert_eq!(
            track.renew(&blank, now).unwrap_err(),
            RenewalError::Validation(ValidationError::MissingField("identifier"))
        );

        let free = SegmentRequest::new("AUTH-2", "01-03-2025", Money::ZERO);
        assert!(matches!(
            track.renew(&free, now),
            Err(RenewalError::Validation(ValidationError::NonPositiveFee(_)))
        ));

        let bad_date = SegmentRequest::new("AUTH-2", "31-02-2025", Money::from_major(10));
        assert!(matches!(
            track.renew(&bad_date, now),
            Err(RenewalError::Validation(ValidationError::InvalidDate {
                field: "valid_from",
                ..
            }))
        ));

        let bad_end = SegmentRequest::new("AUTH-2", "01-03-2025", Money::from_major(10))
            .with_valid_to("1-2");
        assert!(matches!(
            track.renew(&bad_end, now),
            Err(RenewalError::Validation(ValidationError::InvalidDate {
                field: "valid_to",
                ..
            }))
        ));

        let reversed = SegmentRequest::new("AUTH-2", "01-03-2025", Money::from_major(10))
            .with_valid_to("01-02-2025");
        assert!(matches!(
            track.renew(&reversed, now),
            Err(RenewalError::Validation(ValidationError::EndBeforeStart { .. }))
        ));
    }

    #[test]
    fn test_explicit_end_track() {
        let request = SegmentRequest::new("DL-1420110012345", "10-05-2020", Money::from_major(200));
        assert_eq!(
            ValidityTrack::issue(None, &request, at(2020, 5, 10)).unwrap_err(),
            RenewalError::Validation(ValidationError::MissingEndDate)
        );

        let request = request.with_valid_to("09-05-2040").with_notes("N/A");
        let track = ValidityTrack::issue(None, &request, at(2020, 5, 10)).unwrap();
        assert_eq!(track.current_window().unwrap().end_date(), date(2040, 5, 9));
        assert_eq!(track.active().unwrap().notes, None);
    }

    #[test]
    fn test_history_order_and_digest() {
        let track = ValidityTrack::issue(
            Some(DurationPolicy::FiveYearPermit),
            &SegmentRequest::new("NP-1", "24-01-2015", Money::from_major(1000)),
            at(2015, 1, 24),
        )
        .unwrap();
        let digest_before = track.history().digest();

        let (track, _) = track
            .renew(
                &SegmentRequest::new("NP-2", "24-01-2020", Money::from_major(1000)),
                at(2020, 1, 20),
            )
            .unwrap();

        let history = track.history();
        let oldest: Vec<_> = history.oldest_first().map(|r| r.identifier.as_str()).collect();
        let newest: Vec<_> = history.newest_first().map(|r| r.identifier.as_str()).collect();
        assert_eq!(oldest, vec!["NP-1", "NP-2"]);
        assert_eq!(newest, vec!["NP-2", "NP-1"]);

        assert_ne!(track.history().digest(), digest_before);
        assert_eq!(track.history().digest().len(), 64);
    }

    #[test]
    fn test_attach_document_once() {
        let mut track = ValidityTrack::issue(
            Some(DurationPolicy::FiveYearPermit),
            &SegmentRequest::new("NP-1", "24-01-2025", Money::from_major(1000)),
            at(2025, 1, 24),
        )
        .unwrap();

        assert!(!track.attach_document("NP-9", "bills/np-9.pdf"));
        assert!(track.attach_document("NP-1", "bills/np-1.pdf"));
        assert!(!track.attach_document("NP-1", "bills/np-1-again.pdf"));
        assert_eq!(track.active().unwrap().document.as_deref(), Some("bills/np-1.pdf"));
    }

    #[test]
    fn test_empty_track_cannot_renew() {
        let track: ValidityTrack =
            serde_json::from_str(r#"{"policy":"five_year_permit","history":[]}"#).unwrap();
        let request = SegmentRequest::new("NP-2", "24-01-2030", Money::from_major(1000));
        assert_eq!(
            track.renew(&request, at(2030, 1, 1)).unwrap_err(),
            RenewalError::Invariant(InvariantViolation::EmptyHistory)
        );
        assert_eq!(track.current_window(), Err(InvariantViolation::EmptyHistory));
    }
}
