//! Expiry classification.
//!
//! The [`ThresholdTable`] is the one place bucket boundaries live. The
//! classifier, the renew-button check and the dashboard aggregator all read
//! from it, so a tile count and its filtered list cannot disagree.
//!
//! | Context                 | Critical | Warning | Attention | Renew offer |
//! |-------------------------|----------|---------|-----------|-------------|
//! | Driving licence         | 0-30     | 31-60   | 61-90     | always      |
//! | Learning licence        | -        | 0-30    | -         | always      |
//! | National permit Part A  | 0-7      | 8-60    | -         | <= 35       |
//! | National permit Part B  | 0-7      | 8-30    | -         | <= 35       |
//!
//! Anything below zero days is `Expired`; anything past the last bound is
//! `Valid`. "Expiring soon" on the dashboard means `Critical` or `Warning`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Which boundary row applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum ExpiryContext {
    DrivingLicence,
    LearningLicence,
    PermitPartA,
    PermitPartB,
}

impl ExpiryContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DrivingLicence => "driving_licence",
            Self::LearningLicence => "learning_licence",
            Self::PermitPartA => "permit_part_a",
            Self::PermitPartB => "permit_part_b",
        }
    }

    pub fn all() -> [Self; 4] {
        [
            Self::DrivingLicence,
            Self::LearningLicence,
            Self::PermitPartA,
            Self::PermitPartB,
        ]
    }
}

impl fmt::Display for ExpiryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Urgency of a validity window, most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum UrgencyBucket {
    Expired,
    Critical,
    Warning,
    Attention,
    Valid,
}

impl UrgencyBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expired => "expired",
            Self::Critical => "critical",
            Self::Warning => "warning",
            Self::Attention => "attention",
            Self::Valid => "valid",
        }
    }

    /// The dashboard's "expiring soon" set.
    pub fn is_expiring_soon(&self) -> bool {
        matches!(self, Self::Critical | Self::Warning)
    }

    pub fn all() -> [Self; 5] {
        [
            Self::Expired,
            Self::Critical,
            Self::Warning,
            Self::Attention,
            Self::Valid,
        ]
    }
}

impl fmt::Display for UrgencyBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive upper bounds (in days remaining) for one context.
///
/// A `None` bucket is skipped. `renew_offer_days` is independent of the
/// bucket bounds; `None` there means renewal is always on offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ContextBounds {
    pub critical_days: Option<i64>,
    pub warning_days: Option<i64>,
    pub attention_days: Option<i64>,
    pub renew_offer_days: Option<i64>,
}

impl ContextBounds {
    /// Bucket for a signed days-remaining count.
    pub fn bucket(&self, days_remaining: i64) -> UrgencyBucket {
        if days_remaining < 0 {
            return UrgencyBucket::Expired;
        }
        self.bounds()
            .into_iter()
            .find_map(|(bucket, bound)| match bound {
                Some(upper) if days_remaining <= upper => Some(bucket),
                _ => None,
            })
            .unwrap_or(UrgencyBucket::Valid)
    }

    /// Whether the renew action should be shown.
    pub fn renew_offered(&self, days_remaining: i64) -> bool {
        self.renew_offer_days
            .map_or(true, |limit| days_remaining <= limit)
    }

    fn bounds(&self) -> [(UrgencyBucket, Option<i64>); 3] {
        [
            (UrgencyBucket::Critical, self.critical_days),
            (UrgencyBucket::Warning, self.warning_days),
            (UrgencyBucket::Attention, self.attention_days),
        ]
    }

    fn validate(&self, context: ExpiryContext) -> Result<(), ThresholdError> {
        let mut previous: Option<i64> = None;
        for (bucket, bound) in self.bounds() {
            let Some(upper) = bound else { continue };
            if upper < 0 {
                return Err(ThresholdError::Negative { context, bucket });
            }
            if let Some(lower) = previous {
                if upper <= lower {
                    return Err(ThresholdError::NotIncreasing { context, bucket });
                }
            }
            previous = Some(upper);
        }
        if let Some(limit) = self.renew_offer_days {
            if limit < 0 {
                return Err(ThresholdError::NegativeRenewOffer { context });
            }
        }
        Ok(())
    }
}

/// Misconfigured boundary table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ThresholdError {
    #[error("{context} {bucket} bound is negative")]
    Negative {
        context: ExpiryContext,
        bucket: UrgencyBucket,
    },

    #[error("{context} {bucket} bound must exceed the bound before it")]
    NotIncreasing {
        context: ExpiryContext,
        bucket: UrgencyBucket,
    },

    #[error("{context} renew offer window is negative")]
    NegativeRenewOffer { context: ExpiryContext },
}

/// Boundary table for every context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(default)]
pub struct ThresholdTable {
    pub driving_licence: ContextBounds,
    pub learning_licence: ContextBounds,
    pub permit_part_a: ContextBounds,
    pub permit_part_b: ContextBounds,
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self {
            driving_licence: ContextBounds {
                critical_days: Some(30),
                warning_days: Some(60),
                attention_days: Some(90),
                renew_offer_days: None,
            },
            learning_licence: ContextBounds {
                critical_days: None,
                warning_days: Some(30),
                attention_days: None,
                renew_offer_days: None,
            },
            permit_part_a: ContextBounds {
                critical_days: Some(7),
                warning_days: Some(60),
                attention_days: None,
                renew_offer_days: Some(35),
            },
            permit_part_b: ContextBounds {
                critical_days: Some(7),
                warning_days: Some(30),
                attention_days: None,
                renew_offer_days: Some(35),
            },
        }
    }
}

impl ThresholdTable {
    pub fn bounds(&self, context: ExpiryContext) -> &ContextBounds {
        match context {
            ExpiryContext::DrivingLicence => &self.driving_licence,
            ExpiryContext::LearningLicence => &self.learning_licence,
            ExpiryContext::PermitPartA => &self.permit_part_a,
            ExpiryContext::PermitPartB => &self.permit_part_b,
        }
    }

    /// Check every row has non-negative, strictly increasing bounds.
    pub fn validate(&self) -> Result<(), ThresholdError> {
        for context in ExpiryContext::all() {
            self.bounds(context).validate(context)?;
        }
        Ok(())
    }
}

/// Days remaining plus the bucket they fall in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Classification {
    pub days_remaining: i64,
    pub bucket: UrgencyBucket,
}

impl Classification {
    pub fn is_expired(&self) -> bool {
        self.bucket == UrgencyBucket::Expired
    }

    pub fn is_expiring_soon(&self) -> bool {
        self.bucket.is_expiring_soon()
    }

    pub fn label(&self) -> String {
        describe_remaining(self.days_remaining)
    }
}

/// Signed whole days from `today` to `end`. Zero on the last valid day.
pub fn days_remaining(end: NaiveDate, today: NaiveDate) -> i64 {
    (end - today).num_days()
}

/// Classifier bound to one threshold table.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    table: ThresholdTable,
}

impl Classifier {
    pub fn new(table: ThresholdTable) -> Result<Self, ThresholdError> {
        table.validate()?;
        Ok(Self { table })
    }

    pub fn table(&self) -> &ThresholdTable {
        &self.table
    }

    pub fn classify(
        &self,
        end: NaiveDate,
        today: NaiveDate,
        context: ExpiryContext,
    ) -> Classification {
        let days_remaining = days_remaining(end, today);
        Classification {
            days_remaining,
            bucket: self.table.bounds(context).bucket(days_remaining),
        }
    }

    /// Renew-button visibility, independent of the bucket bounds.
    pub fn renew_offered(&self, end: NaiveDate, today: NaiveDate, context: ExpiryContext) -> bool {
        self.table
            .bounds(context)
            .renew_offered(days_remaining(end, today))
    }
}

/// Human label for a days-remaining count.
pub fn describe_remaining(days_remaining: i64) -> String {
    match days_remaining {
        d if d < -1 => format!("Expired {} days ago", -d),
        -1 => "Expired yesterday".to_string(),
        0 => "Expires today".to_string(),
        1 => "1 day left".to_string(),
        d => format!("{d} days left"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn bucket(context: ExpiryContext, days: i64) -> UrgencyBucket {
        ThresholdTable::default().bounds(context).bucket(days)
    }

    #[test]
    fn test_days_remaining_is_signed() {
        let today = date(2025, 6, 10);
        assert_eq!(days_remaining(date(2025, 6, 10), today), 0);
        assert_eq!(days_remaining(date(2025, 6, 11), today), 1);
        assert_eq!(days_remaining(date(2025, 6, 1), today), -9);
    }

    #[test]
    fn test_driving_licence_rows() {
        use ExpiryContext::DrivingLicence as Dl;
        assert_eq!(bucket(Dl, -1), UrgencyBucket::Expired);
        assert_eq!(bucket(Dl, 0), UrgencyBucket::Critical);
        assert_eq!(bucket(Dl, 30), UrgencyBucket::Critical);
        assert_eq!(bucket(Dl, 31), UrgencyBucket::Warning);
        assert_eq!(bucket(Dl, 60), UrgencyBucket::Warning);
        assert_eq!(bucket(Dl, 61), UrgencyBucket::Attention);
        assert_eq!(bucket(Dl, 90), UrgencyBucket::Attention);
        assert_eq!(bucket(Dl, 91), UrgencyBucket::Valid);
    }

    #[test]
    fn test_learning_licence_rows() {
        use ExpiryContext::LearningLicence as Ll;
        assert_eq!(bucket(Ll, -3), UrgencyBucket::Expired);
        assert_eq!(bucket(Ll, 0), UrgencyBucket::Warning);
        assert_eq!(bucket(Ll, 30), UrgencyBucket::Warning);
        assert!(bucket(Ll, 30).is_expiring_soon());
        assert_eq!(bucket(Ll, 31), UrgencyBucket::Valid);
    }

    #[test]
    fn test_permit_rows() {
        use ExpiryContext::{PermitPartA as A, PermitPartB as B};
        assert_eq!(bucket(A, 7), UrgencyBucket::Critical);
        assert_eq!(bucket(A, 8), UrgencyBucket::Warning);
        assert_eq!(bucket(A, 60), UrgencyBucket::Warning);
        assert_eq!(bucket(A, 61), UrgencyBucket::Valid);

        assert_eq!(bucket(B, 7), UrgencyBucket::Critical);
        assert!(bucket(B, 30).is_expiring_soon());
        assert!(!bucket(B, 31).is_expiring_soon());
        assert_eq!(bucket(B, 31), UrgencyBucket::Valid);
    }

    #[test]
    fn test_renew_offer_is_independent_of_buckets() {
        let classifier = Classifier::default();
        let today = date(2025, 1, 1);
        let end = date(2025, 2, 2); // 32 days out

        let part_a = classifier.classify(end, today, ExpiryContext::PermitPartA);
        let part_b = classifier.classify(end, today, ExpiryContext::PermitPartB);
        assert_eq!(part_a.days_remaining, 32);
        assert!(part_a.is_expiring_soon());
        assert!(!part_b.is_expiring_soon());
        assert!(classifier.renew_offered(end, today, ExpiryContext::PermitPartA));
        assert!(classifier.renew_offered(end, today, ExpiryContext::PermitPartB));

        let later = date(2025, 2, 6); // 36 days out
        assert!(!classifier.renew_offered(later, today, ExpiryContext::PermitPartB));
        assert!(classifier.renew_offered(date(2024, 12, 1), today, ExpiryContext::PermitPartB));
        assert!(classifier.renew_offered(date(2030, 1, 1), today, ExpiryContext::DrivingLicence));
    }

    #[test]
    fn test_validate_rejects_bad_tables() {
        let mut table = ThresholdTable::default();
        table.permit_part_b.warning_days = Some(5);
        assert_eq!(
            table.validate(),
            Err(ThresholdError::NotIncreasing {
                context: ExpiryContext::PermitPartB,
                bucket: UrgencyBucket::Warning,
            })
        );

        let mut table = ThresholdTable::default();
        table.learning_licence.warning_days = Some(-1);
        assert!(Classifier::new(table).is_err());

        assert!(Classifier::new(ThresholdTable::default()).is_ok());
    }

    #[test]
    fn test_table_from_yaml_keeps_missing_rows() {
        let yaml = r#"
driving_licence:
  critical_days: 15
  warning_days: 45
  attention_days: 90
  renew_offer_days: null
"#;
        let table: ThresholdTable = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(table.driving_licence.critical_days, Some(15));
        assert_eq!(table.permit_part_b, ThresholdTable::default().permit_part_b);
        assert!(table.validate().is_ok());
    }

    #[test]
    fn test_describe_remaining() {
        assert_eq!(describe_remaining(-3), "Expired 3 days ago");
        assert_eq!(describe_remaining(-1), "Expired yesterday");
        assert_eq!(describe_remaining(0), "Expires today");
        assert_eq!(describe_remaining(1), "1 day left");
        assert_eq!(describe_remaining(12), "12 days left");
    }
}
