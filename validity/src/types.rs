//! Core value types for the validity engine.
//!
//! Dates are calendar dates (`NaiveDate`), never instants: a validity window
//! runs from one day to another regardless of the office's timezone.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Internal consistency failures.
///
/// These should never surface given correct duration arithmetic; when one is
/// detected the operation is abandoned and the violation logged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    /// A window whose end precedes its start
    #[error("Validity window ends ({end}) before it starts ({start})")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },

    /// Date arithmetic left the representable calendar range
    #[error("Date arithmetic out of range from {start}")]
    OutOfRange { start: NaiveDate },

    /// A validity track without any renewal record
    #[error("Validity track has no renewal records")]
    EmptyHistory,
}

/// A single validity segment: `start_date ..= end_date`.
///
/// Fields are private so a window can only be built through [`ValidityWindow::new`]
/// or the duration policies; a renewal creates a new window, never edits one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ValidityWindow {
    start_date: NaiveDate,
    end_date: NaiveDate,
}

impl ValidityWindow {
    /// Build a window, rejecting one that ends before it starts.
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Result<Self, InvariantViolation> {
        let window = Self {
            start_date,
            end_date,
        };
        window.check()?;
        Ok(window)
    }

    /// First day of validity.
    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    /// Last day of validity (inclusive).
    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    /// Re-check the ordering invariant.
    ///
    /// Windows loaded from storage bypass [`ValidityWindow::new`], so readers
    /// that must not trust persisted data call this first.
    pub fn check(&self) -> Result<(), InvariantViolation> {
        if self.end_date < self.start_date {
            return Err(InvariantViolation::EndBeforeStart {
                start: self.start_date,
                end: self.end_date,
            });
        }
        Ok(())
    }

    /// Whether `date` falls inside the window.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    /// Number of calendar days covered, both ends included.
    pub fn length_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }
}

impl fmt::Display for ValidityWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start_date.format("%d-%m-%Y"),
            self.end_date.format("%d-%m-%Y")
        )
    }
}

/// An amount of money in minor units (paise).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// From minor units (paise).
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// From whole rupees.
    pub const fn from_major(major: i64) -> Self {
        Self(major * 100)
    }

    /// Amount in minor units.
    pub fn minor(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Sum, or `None` on overflow.
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Money)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

/// Payment state of a single renewal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Pending,
}

impl PaymentStatus {
    /// `Paid` once the amount collected covers the fee.
    pub fn for_amounts(fees: Money, paid: Money) -> Self {
        if paid >= fees {
            Self::Paid
        } else {
            Self::Pending
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::Pending => "pending",
        }
    }
}

impl Default for PaymentStatus {
    fn default() -> Self {
        Self::Pending
    }
}
