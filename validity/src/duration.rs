//! Duration policies and end-date derivation.
//!
//! Every policy follows the same rule: add the span to the start date, then
//! step back one day. A five-year permit from 24-01-2025 runs to 23-01-2030.

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

#[cfg(feature = "typescript")]
use ts_rs::TS;

use crate::normalize::{normalize, reformat};
use crate::types::{InvariantViolation, ValidityWindow};

/// Named validity spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum DurationPolicy {
    /// National permit Part A, issuance and renewal
    FiveYearPermit,
    /// National permit Part B authorization
    OneYearAuthorization,
    /// Learning licence window when no end date is typed in
    ThirtyDayWindow,
}

enum Span {
    Years(i32),
    Days(u64),
}

impl DurationPolicy {
    fn span(&self) -> Span {
        match self {
            Self::FiveYearPermit => Span::Years(5),
            Self::OneYearAuthorization => Span::Years(1),
            Self::ThirtyDayWindow => Span::Days(30),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FiveYearPermit => "five_year_permit",
            Self::OneYearAuthorization => "one_year_authorization",
            Self::ThirtyDayWindow => "thirty_day_window",
        }
    }

    /// Last valid day for a segment starting on `start`.
    pub fn compute_end(&self, start: NaiveDate) -> Result<NaiveDate, InvariantViolation> {
        compute_end(start, *self)
    }
}

/// Last valid day of a segment: `(start + span) - 1 day`.
///
/// A 29 February start has its anniversary on 1 March in non-leap years, so
/// the segment ends on 28 February.
pub fn compute_end(
    start: NaiveDate,
    policy: DurationPolicy,
) -> Result<NaiveDate, InvariantViolation> {
    let out_of_range = || InvariantViolation::OutOfRange { start };

    let next_start = match policy.span() {
        Span::Years(years) => anniversary(start, years).ok_or_else(out_of_range)?,
        Span::Days(days) => start
            .checked_add_days(Days::new(days))
            .ok_or_else(out_of_range)?,
    };
    let end = next_start.pred_opt().ok_or_else(out_of_range)?;

    if end < start {
        let violation = InvariantViolation::EndBeforeStart { start, end };
        tracing::error!(%start, %end, policy = policy.as_str(), "Computed end precedes start");
        return Err(violation);
    }
    Ok(end)
}

fn anniversary(start: NaiveDate, years: i32) -> Option<NaiveDate> {
    let year = start.year().checked_add(years)?;
    NaiveDate::from_ymd_opt(year, start.month(), start.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, 3, 1))
}

impl ValidityWindow {
    /// Window starting on `start` whose end follows from `policy`.
    pub fn from_policy(
        start: NaiveDate,
        policy: DurationPolicy,
    ) -> Result<Self, InvariantViolation> {
        let end = compute_end(start, policy)?;
        Self::new(start, end)
    }
}

/// Form state for a new segment.
///
/// Only the start and the policy are stored; the end is derived on every
/// read, so it can never go stale against the start. Editing flows one way:
/// nothing here feeds an end date back into the start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowDraft {
    policy: DurationPolicy,
    start: Option<NaiveDate>,
    start_text: String,
}

impl WindowDraft {
    pub fn new(policy: DurationPolicy) -> Self {
        Self {
            policy,
            start: None,
            start_text: String::new(),
        }
    }

    /// Feed the raw "valid from" text as the user types.
    ///
    /// Returns the reformatted text to show back. The start (and therefore the
    /// end) only moves once the text parses; a half-typed value keeps the last
    /// good start.
    pub fn set_start_text(&mut self, raw: &str) -> &str {
        self.start_text = reformat(raw);
        if let Ok(start) = normalize(&self.start_text) {
            self.start = Some(start);
        }
        &self.start_text
    }

    pub fn set_start(&mut self, start: NaiveDate) {
        self.start = Some(start);
        self.start_text = crate::normalize::to_canonical(start);
    }

    pub fn policy(&self) -> DurationPolicy {
        self.policy
    }

    pub fn start(&self) -> Option<NaiveDate> {
        self.start
    }

    pub fn start_text(&self) -> &str {
        &self.start_text
    }

    /// Derived end date, `None` until a start has parsed.
    pub fn end(&self) -> Option<NaiveDate> {
        self.start
            .and_then(|start| compute_end(start, self.policy).ok())
    }

    /// The finished window, once a start is known.
    pub fn window(&self) -> Result<Option<ValidityWindow>, InvariantViolation> {
        self.start
            .map(|start| ValidityWindow::from_policy(start, self.policy))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_five_year_permit_ends_day_before_anniversary() {
        assert_eq!(
            compute_end(date(2025, 1, 24), DurationPolicy::FiveYearPermit).unwrap(),
            date(2030, 1, 23)
        );
        assert_eq!(
            DurationPolicy::FiveYearPermit.compute_end(date(2025, 1, 1)).unwrap(),
            date(2029, 12, 31)
        );
    }

    #[test]
    fn test_one_year_authorization() {
        assert_eq!(
            compute_end(date(2025, 3, 1), DurationPolicy::OneYearAuthorization).unwrap(),
            date(2026, 2, 28)
        );
        // Leap day inside the span
        assert_eq!(
            compute_end(date(2023, 3, 1), DurationPolicy::OneYearAuthorization).unwrap(),
            date(2024, 2, 29)
        );
    }

    #[test]
    fn test_leap_day_start() {
        assert_eq!(
            compute_end(date(2024, 2, 29), DurationPolicy::OneYearAuthorization).unwrap(),
            date(2025, 2, 28)
        );
        assert_eq!(
            compute_end(date(2024, 2, 29), DurationPolicy::FiveYearPermit).unwrap(),
            date(2029, 2, 28)
        );
    }

    #[test]
    fn test_thirty_day_window() {
        let window =
            ValidityWindow::from_policy(date(2025, 1, 15), DurationPolicy::ThirtyDayWindow)
                .unwrap();
        assert_eq!(window.end_date(), date(2025, 2, 13));
        assert_eq!(window.length_days(), 30);
    }

    #[test]
    fn test_out_of_range_start() {
        let err = compute_end(NaiveDate::MAX, DurationPolicy::FiveYearPermit).unwrap_err();
        assert!(matches!(err, InvariantViolation::OutOfRange { .. }));
    }

    #[test]
    fn test_draft_derives_end_from_start() {
        let mut draft = WindowDraft::new(DurationPolicy::FiveYearPermit);
        assert_eq!(draft.end(), None);
        assert_eq!(draft.window().unwrap(), None);

        assert_eq!(draft.set_start_text("24/1/25"), "24-01-2025");
        assert_eq!(draft.end(), Some(date(2030, 1, 23)));

        // Mid-typing a new start keeps the last good one.
        assert_eq!(draft.set_start_text("01-0"), "01-0");
        assert_eq!(draft.start(), Some(date(2025, 1, 24)));

        draft.set_start_text("01-03-2025");
        assert_eq!(draft.end(), Some(date(2030, 2, 28)));
        let window = draft.window().unwrap().unwrap();
        assert_eq!(window.start_date(), date(2025, 3, 1));
    }
}
