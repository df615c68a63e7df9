//! National permits and driving licences.
//!
//! A national permit carries two independent tracks: Part A (five years) and
//! Part B (the annual authorization). A driving licence carries one track with
//! typed-in dates plus an optional learning-licence window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "typescript")]
use ts_rs::TS;

use crate::aggregate::Tracked;
use crate::classify::ExpiryContext;
use crate::duration::DurationPolicy;
use crate::fields::{deserialize_optional_text, has_value, present};
use crate::normalize::normalize_optional;
use crate::renewal::{RenewalError, RenewalRecord, SegmentRequest, ValidationError, ValidityTrack};
use crate::types::{InvariantViolation, Money, ValidityWindow};

/// The two halves of a national permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum PermitPart {
    /// Base five-year permit
    PartA,
    /// Annual goods-transport authorization
    PartB,
}

impl PermitPart {
    pub fn policy(&self) -> DurationPolicy {
        match self {
            Self::PartA => DurationPolicy::FiveYearPermit,
            Self::PartB => DurationPolicy::OneYearAuthorization,
        }
    }

    pub fn context(&self) -> ExpiryContext {
        match self {
            Self::PartA => ExpiryContext::PermitPartA,
            Self::PartB => ExpiryContext::PermitPartB,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PartA => "Part A",
            Self::PartB => "Part B",
        }
    }
}

/// Fees charged against a record and what has been collected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Billing {
    pub total_fees: Money,
    pub amount_paid: Money,
}

impl Billing {
    fn charge(&mut self, request: &SegmentRequest) -> Result<(), ValidationError> {
        let total_fees = self
            .total_fees
            .checked_add(request.fees)
            .ok_or(ValidationError::AmountOutOfRange { field: "fees" })?;
        let amount_paid = self
            .amount_paid
            .checked_add(request.amount_paid)
            .ok_or(ValidationError::AmountOutOfRange {
                field: "amount_paid",
            })?;
        self.total_fees = total_fees;
        self.amount_paid = amount_paid;
        Ok(())
    }

    /// Outstanding amount; negative when overpaid.
    pub fn balance(&self) -> Money {
        Money::from_minor(
            self.total_fees
                .minor()
                .saturating_sub(self.amount_paid.minor()),
        )
    }

    pub fn has_pending_payment(&self) -> bool {
        self.balance().is_positive()
    }

    /// Record a later payment.
    pub fn record_payment(&mut self, amount: Money) -> Result<(), ValidationError> {
        if !amount.is_positive() {
            return Err(ValidationError::NonPositivePayment(amount));
        }
        self.amount_paid = self
            .amount_paid
            .checked_add(amount)
            .ok_or(ValidationError::AmountOutOfRange {
                field: "amount_paid",
            })?;
        Ok(())
    }
}

fn require(value: &str, field: &'static str) -> Result<String, ValidationError> {
    if !has_value(value) {
        return Err(ValidationError::MissingField(field));
    }
    Ok(value.trim().to_string())
}

/// Input for a new national permit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct PermitDraft {
    pub permit_number: String,
    pub holder_name: String,
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    pub vehicle_number: Option<String>,
    pub part_a: SegmentRequest,
    #[serde(default)]
    pub part_b: Option<SegmentRequest>,
}

/// A national goods-transport permit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct NationalPermit {
    pub id: String,
    pub permit_number: String,
    pub holder_name: String,
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    pub vehicle_number: Option<String>,
    part_a: ValidityTrack,
    #[serde(default)]
    part_b: Option<ValidityTrack>,
    #[serde(default)]
    billing: Billing,
}

impl NationalPermit {
    /// Issue a permit; each part's first record is its original.
    pub fn issue(
        id: impl Into<String>,
        draft: &PermitDraft,
        issued_at: DateTime<Utc>,
    ) -> Result<Self, RenewalError> {
        let permit_number = require(&draft.permit_number, "permit_number")?;
        let holder_name = require(&draft.holder_name, "holder_name")?;

        let part_a =
            ValidityTrack::issue(Some(PermitPart::PartA.policy()), &draft.part_a, issued_at)?;
        let part_b = draft
            .part_b
            .as_ref()
            .map(|request| {
                ValidityTrack::issue(Some(PermitPart::PartB.policy()), request, issued_at)
            })
            .transpose()?;

        let mut billing = Billing::default();
        billing.charge(&draft.part_a)?;
        if let Some(request) = &draft.part_b {
            billing.charge(request)?;
        }

        Ok(Self {
            id: id.into(),
            permit_number,
            holder_name,
            vehicle_number: present(draft.vehicle_number.clone()),
            part_a,
            part_b,
            billing,
        })
    }

    pub fn part(&self, part: PermitPart) -> Option<&ValidityTrack> {
        match part {
            PermitPart::PartA => Some(&self.part_a),
            PermitPart::PartB => self.part_b.as_ref(),
        }
    }

    pub fn part_a(&self) -> &ValidityTrack {
        &self.part_a
    }

    pub fn part_b(&self) -> Option<&ValidityTrack> {
        self.part_b.as_ref()
    }

    pub fn billing(&self) -> &Billing {
        &self.billing
    }

    /// Issue Part B on a permit that has none yet.
    pub fn attach_part_b(
        &self,
        request: &SegmentRequest,
        issued_at: DateTime<Utc>,
    ) -> Result<Self, RenewalError> {
        if self.part_b.is_some() {
            let part = PermitPart::PartB.as_str().to_string();
            return Err(ValidationError::AlreadyIssued(part).into());
        }
        let track = ValidityTrack::issue(Some(PermitPart::PartB.policy()), request, issued_at)?;

        let mut updated = self.clone();
        updated.part_b = Some(track);
        updated.billing.charge(request)?;
        Ok(updated)
    }

    /// Renew one part.
    ///
    /// Returns the updated permit and the record that was in force before.
    pub fn renew(
        &self,
        part: PermitPart,
        request: &SegmentRequest,
        renewed_at: DateTime<Utc>,
    ) -> Result<(Self, RenewalRecord), RenewalError> {
        let track = self
            .part(part)
            .ok_or_else(|| ValidationError::MissingTrack(part.as_str().to_string()))?;
        let (renewed_track, previous) = track.renew(request, renewed_at)?;

        let mut updated = self.clone();
        match part {
            PermitPart::PartA => updated.part_a = renewed_track,
            PermitPart::PartB => updated.part_b = Some(renewed_track),
        }
        updated.billing.charge(request)?;
        Ok((updated, previous))
    }

    /// Record a later payment; a settled balance marks every segment paid.
    pub fn record_payment(&mut self, amount: Money) -> Result<(), ValidationError> {
        self.billing.record_payment(amount)?;
        if !self.billing.has_pending_payment() {
            self.part_a.settle();
            if let Some(part_b) = self.part_b.as_mut() {
                part_b.settle();
            }
        }
        Ok(())
    }

    /// Attach a generated bill to the active record of `part`.
    pub fn attach_document(
        &mut self,
        part: PermitPart,
        identifier: &str,
        reference: impl Into<String>,
    ) -> bool {
        let track = match part {
            PermitPart::PartA => Some(&mut self.part_a),
            PermitPart::PartB => self.part_b.as_mut(),
        };
        track.is_some_and(|track| track.attach_document(identifier, reference))
    }
}

impl Tracked for NationalPermit {
    fn record_id(&self) -> &str {
        &self.id
    }

    fn window(&self, context: ExpiryContext) -> Result<Option<ValidityWindow>, InvariantViolation> {
        match context {
            ExpiryContext::PermitPartA => self.part_a.current_window().map(Some),
            ExpiryContext::PermitPartB => self
                .part_b
                .as_ref()
                .map(ValidityTrack::current_window)
                .transpose(),
            ExpiryContext::DrivingLicence | ExpiryContext::LearningLicence => Ok(None),
        }
    }

    fn balance(&self) -> Money {
        self.billing.balance()
    }
}

/// Input for a new driving licence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct LicenceDraft {
    pub licence_number: String,
    pub holder_name: String,
    /// Licence segment; `valid_to` is required
    pub licence: SegmentRequest,
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    pub learning_from: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    pub learning_to: Option<String>,
}

/// A driving licence with its optional learning-licence window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct DrivingLicence {
    pub id: String,
    pub licence_number: String,
    pub holder_name: String,
    licence: ValidityTrack,
    #[serde(default)]
    learning: Option<ValidityWindow>,
    #[serde(default)]
    billing: Billing,
}

impl DrivingLicence {
    pub fn issue(
        id: impl Into<String>,
        draft: &LicenceDraft,
        issued_at: DateTime<Utc>,
    ) -> Result<Self, RenewalError> {
        let licence_number = require(&draft.licence_number, "licence_number")?;
        let holder_name = require(&draft.holder_name, "holder_name")?;
        let licence = ValidityTrack::issue(None, &draft.licence, issued_at)?;
        let learning =
            learning_window(draft.learning_from.as_deref(), draft.learning_to.as_deref())?;

        let mut billing = Billing::default();
        billing.charge(&draft.licence)?;

        Ok(Self {
            id: id.into(),
            licence_number,
            holder_name,
            licence,
            learning,
            billing,
        })
    }

    pub fn licence(&self) -> &ValidityTrack {
        &self.licence
    }

    pub fn learning(&self) -> Option<ValidityWindow> {
        self.learning
    }

    pub fn billing(&self) -> &Billing {
        &self.billing
    }

    /// Renew the licence; the request must carry its own `valid_to`.
    pub fn renew(
        &self,
        request: &SegmentRequest,
        renewed_at: DateTime<Utc>,
    ) -> Result<(Self, RenewalRecord), RenewalError> {
        let (renewed_track, previous) = self.licence.renew(request, renewed_at)?;
        let mut updated = self.clone();
        updated.licence = renewed_track;
        updated.billing.charge(request)?;
        Ok((updated, previous))
    }

    pub fn record_payment(&mut self, amount: Money) -> Result<(), ValidationError> {
        self.billing.record_payment(amount)?;
        if !self.billing.has_pending_payment() {
            self.licence.settle();
        }
        Ok(())
    }

    pub fn attach_document(&mut self, identifier: &str, reference: impl Into<String>) -> bool {
        self.licence.attach_document(identifier, reference)
    }
}

/// A learning licence runs thirty days from its start unless an end is typed in.
fn learning_window(
    from: Option<&str>,
    to: Option<&str>,
) -> Result<Option<ValidityWindow>, RenewalError> {
    let parse = |raw: Option<&str>, field: &'static str| {
        normalize_optional(raw.unwrap_or_default())
            .map_err(|source| ValidationError::InvalidDate { field, source })
    };
    let start = parse(from, "learning_from")?;
    let end = parse(to, "learning_to")?;

    match (start, end) {
        (None, None) => Ok(None),
        (Some(start), None) => {
            Ok(ValidityWindow::from_policy(start, DurationPolicy::ThirtyDayWindow).map(Some)?)
        }
        (None, Some(_)) => Err(ValidationError::MissingField("learning_from").into()),
        (Some(start), Some(end)) => ValidityWindow::new(start, end)
            .map(Some)
            .map_err(|_| ValidationError::EndBeforeStart { start, end }.into()),
    }
}

impl Tracked for DrivingLicence {
    fn record_id(&self) -> &str {
        &self.id
    }

    fn window(&self, context: ExpiryContext) -> Result<Option<ValidityWindow>, InvariantViolation> {
        match context {
            ExpiryContext::DrivingLicence => self.licence.current_window().map(Some),
            ExpiryContext::LearningLicence => match self.learning {
                Some(window) => window.check().map(|_| Some(window)),
                None => Ok(None),
            },
            ExpiryContext::PermitPartA | ExpiryContext::PermitPartB => Ok(None),
        }
    }

    fn balance(&self) -> Money {
        self.billing.balance()
    }
}
