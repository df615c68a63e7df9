//! Dashboard counters and filtered lists.
//!
//! Counting and filtering go through the same predicate, so a tile's count is
//! always the length of the list behind it. Records whose stored windows are
//! malformed are left out of every bucket instead of failing the whole scan.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[cfg(feature = "typescript")]
use ts_rs::TS;

use crate::classify::{Classifier, ExpiryContext, UrgencyBucket};
use crate::types::{InvariantViolation, Money, ValidityWindow};

/// Anything with validity windows the dashboard can classify.
pub trait Tracked {
    /// Stable identifier, for logs.
    fn record_id(&self) -> &str;

    /// Window in force for `context`.
    ///
    /// `Ok(None)` when the context does not apply (no Part B yet, no learning
    /// licence); `Err` when the stored data is malformed.
    fn window(&self, context: ExpiryContext) -> Result<Option<ValidityWindow>, InvariantViolation>;

    /// Outstanding amount.
    fn balance(&self) -> Money;

    /// Pending payment is `balance > 0`, independent of any date bucket.
    fn has_pending_payment(&self) -> bool {
        self.balance().is_positive()
    }
}

/// Bucket of `record` under `context`, `None` when not applicable or malformed.
pub fn bucket_of<T: Tracked>(
    record: &T,
    context: ExpiryContext,
    today: NaiveDate,
    classifier: &Classifier,
) -> Option<UrgencyBucket> {
    match record.window(context) {
        Ok(Some(window)) => Some(classifier.classify(window.end_date(), today, context).bucket),
        Ok(None) | Err(_) => None,
    }
}

/// Per-bucket counts for one context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct BucketCounts {
    counts: BTreeMap<UrgencyBucket, usize>,
    /// Records skipped because their stored window is malformed
    excluded: usize,
}

impl BucketCounts {
    pub fn get(&self, bucket: UrgencyBucket) -> usize {
        self.counts.get(&bucket).copied().unwrap_or(0)
    }

    /// Number of records that landed in some bucket.
    pub fn classified(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn excluded(&self) -> usize {
        self.excluded
    }

    pub fn iter(&self) -> impl Iterator<Item = (UrgencyBucket, usize)> + '_ {
        UrgencyBucket::all()
            .into_iter()
            .map(move |bucket| (bucket, self.get(bucket)))
    }
}

/// Count `records` per bucket under `context`.
pub fn aggregate<T: Tracked>(
    records: &[T],
    context: ExpiryContext,
    today: NaiveDate,
    classifier: &Classifier,
) -> BucketCounts {
    let mut counts = BucketCounts::default();
    for record in records {
        match record.window(context) {
            Ok(Some(window)) => {
                let bucket = classifier.classify(window.end_date(), today, context).bucket;
                *counts.counts.entry(bucket).or_insert(0) += 1;
            }
            Ok(None) => {}
            Err(violation) => {
                tracing::warn!(
                    record_id = %record.record_id(),
                    context = %context,
                    error = %violation,
                    "Excluding malformed record from aggregation"
                );
                counts.excluded += 1;
            }
        }
    }
    counts
}

/// Records of `records` in `bucket` under `context`.
pub fn filter<'a, T: Tracked>(
    records: &'a [T],
    context: ExpiryContext,
    bucket: UrgencyBucket,
    today: NaiveDate,
    classifier: &Classifier,
) -> Vec<&'a T> {
    records
        .iter()
        .filter(|record| bucket_of(*record, context, today, classifier) == Some(bucket))
        .collect()
}

/// A dashboard tile and the list view behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum Tile {
    /// Every record
    Total,
    /// Not expired under the context
    Active(ExpiryContext),
    /// Critical or Warning under the context
    ExpiringSoon(ExpiryContext),
    Expired(ExpiryContext),
    /// One specific bucket
    InBucket(ExpiryContext, UrgencyBucket),
    /// Outstanding balance
    PendingPayment,
}

impl Tile {
    /// The single predicate behind both the count and the list.
    pub fn matches<T: Tracked>(
        &self,
        record: &T,
        today: NaiveDate,
        classifier: &Classifier,
    ) -> bool {
        let bucket = |context: ExpiryContext| bucket_of(record, context, today, classifier);
        match *self {
            Self::Total => true,
            Self::PendingPayment => record.has_pending_payment(),
            Self::Active(context) => {
                matches!(bucket(context), Some(b) if b != UrgencyBucket::Expired)
            }
            Self::ExpiringSoon(context) => {
                matches!(bucket(context), Some(b) if b.is_expiring_soon())
            }
            Self::Expired(context) => bucket(context) == Some(UrgencyBucket::Expired),
            Self::InBucket(context, wanted) => bucket(context) == Some(wanted),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Total => "Total".to_string(),
            Self::PendingPayment => "Pending payment".to_string(),
            Self::Active(context) => format!("Active {}", context_label(*context)),
            Self::ExpiringSoon(context) => format!("{} expiring", context_label(*context)),
            Self::Expired(context) => format!("{} expired", context_label(*context)),
            Self::InBucket(context, bucket) => {
                format!("{} {}", context_label(*context), bucket.as_str())
            }
        }
    }

    pub fn count<T: Tracked>(
        &self,
        records: &[T],
        today: NaiveDate,
        classifier: &Classifier,
    ) -> usize {
        records
            .iter()
            .filter(|record| self.matches(*record, today, classifier))
            .count()
    }

    pub fn filter<'a, T: Tracked>(
        &self,
        records: &'a [T],
        today: NaiveDate,
        classifier: &Classifier,
    ) -> Vec<&'a T> {
        records
            .iter()
            .filter(|record| self.matches(*record, today, classifier))
            .collect()
    }
}

fn context_label(context: ExpiryContext) -> &'static str {
    match context {
        ExpiryContext::DrivingLicence => "Licence",
        ExpiryContext::LearningLicence => "Learning licence",
        ExpiryContext::PermitPartA => "Part A",
        ExpiryContext::PermitPartB => "Part B",
    }
}

/// Tiles on the national-permit dashboard.
pub fn permit_tiles() -> Vec<Tile> {
    vec![
        Tile::Total,
        Tile::Active(ExpiryContext::PermitPartA),
        Tile::ExpiringSoon(ExpiryContext::PermitPartA),
        Tile::ExpiringSoon(ExpiryContext::PermitPartB),
        Tile::PendingPayment,
    ]
}

/// Tiles on the driving-licence dashboard.
pub fn licence_tiles() -> Vec<Tile> {
    vec![
        Tile::Total,
        Tile::Active(ExpiryContext::DrivingLicence),
        Tile::ExpiringSoon(ExpiryContext::DrivingLicence),
        Tile::Expired(ExpiryContext::DrivingLicence),
        Tile::ExpiringSoon(ExpiryContext::LearningLicence),
        Tile::PendingPayment,
    ]
}

/// One counted tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct TileCount {
    pub tile: Tile,
    pub label: String,
    pub count: usize,
}

/// Counted tiles for a dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct DashboardSummary {
    pub as_of: NaiveDate,
    pub tiles: Vec<TileCount>,
    /// Records with at least one malformed window
    pub excluded: usize,
}

impl DashboardSummary {
    pub fn compute<T: Tracked>(
        records: &[T],
        tiles: &[Tile],
        today: NaiveDate,
        classifier: &Classifier,
    ) -> Self {
        let excluded = records
            .iter()
            .filter(|record| {
                let malformed = ExpiryContext::all()
                    .into_iter()
                    .find_map(|context| record.window(context).err());
                if let Some(violation) = &malformed {
                    tracing::warn!(
                        record_id = %record.record_id(),
                        error = %violation,
                        "Record excluded from dashboard buckets"
                    );
                }
                malformed.is_some()
            })
            .count();

        let tiles = tiles
            .iter()
            .map(|tile| TileCount {
                tile: *tile,
                label: tile.label(),
                count: tile.count(records, today, classifier),
            })
            .collect();

        Self {
            as_of: today,
            tiles,
            excluded,
        }
    }

    /// Count for `tile`, if it is on this dashboard.
    pub fn count(&self, tile: Tile) -> Option<usize> {
        self.tiles.iter().find(|t| t.tile == tile).map(|t| t.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row {
        id: String,
        end: Option<NaiveDate>,
        malformed: bool,
        balance: Money,
    }

    impl Tracked for Row {
        fn record_id(&self) -> &str {
            &self.id
        }

        fn window(
            &self,
            context: ExpiryContext,
        ) -> Result<Option<ValidityWindow>, InvariantViolation> {
            if context != ExpiryContext::PermitPartB {
                return Ok(None);
            }
            if self.malformed {
                return Err(InvariantViolation::EmptyHistory);
            }
            Ok(self.end.map(|end| {
                ValidityWindow::new(end - chrono::Duration::days(364), end).unwrap()
            }))
        }

        fn balance(&self) -> Money {
            self.balance
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn row(id: &str, days: Option<i64>) -> Row {
        Row {
            id: id.to_string(),
            end: days.map(|d| today() + chrono::Duration::days(d)),
            malformed: false,
            balance: Money::ZERO,
        }
    }

    fn rows() -> Vec<Row> {
        let mut rows = vec![
            row("expired", Some(-1)),
            row("urgent", Some(3)),
            row("soon", Some(30)),
            row("later", Some(31)),
            row("no-part-b", None),
        ];
        rows.push(Row {
            malformed: true,
            ..row("broken", Some(10))
        });
        rows[2].balance = Money::from_major(250);
        rows
    }

    #[test]
    fn test_aggregate_counts() {
        let classifier = Classifier::default();
        let counts = aggregate(&rows(), ExpiryContext::PermitPartB, today(), &classifier);

        assert_eq!(counts.get(UrgencyBucket::Expired), 1);
        assert_eq!(counts.get(UrgencyBucket::Critical), 1);
        assert_eq!(counts.get(UrgencyBucket::Warning), 1);
        assert_eq!(counts.get(UrgencyBucket::Attention), 0);
        assert_eq!(counts.get(UrgencyBucket::Valid), 1);
        assert_eq!(counts.classified(), 4);
        assert_eq!(counts.excluded(), 1);
    }

    #[test]
    fn test_aggregate_matches_filter() {
        let classifier = Classifier::default();
        let records = rows();
        let counts = aggregate(&records, ExpiryContext::PermitPartB, today(), &classifier);
        for (bucket, count) in counts.iter() {
            let listed = filter(&records, ExpiryContext::PermitPartB, bucket, today(), &classifier);
            assert_eq!(listed.len(), count, "bucket {bucket}");
        }
    }

    #[test]
    fn test_tiles() {
        let classifier = Classifier::default();
        let records = rows();
        let expiring = Tile::ExpiringSoon(ExpiryContext::PermitPartB);

        let listed: Vec<_> = expiring
            .filter(&records, today(), &classifier)
            .into_iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(listed, vec!["urgent", "soon"]);
        assert_eq!(expiring.count(&records, today(), &classifier), 2);

        assert_eq!(Tile::Total.count(&records, today(), &classifier), 6);
        assert_eq!(Tile::PendingPayment.count(&records, today(), &classifier), 1);
        assert_eq!(
            Tile::Active(ExpiryContext::PermitPartB).count(&records, today(), &classifier),
            3
        );
        assert_eq!(
            Tile::Expired(ExpiryContext::PermitPartB).count(&records, today(), &classifier),
            1
        );
    }

    #[test]
    fn test_dashboard_summary() {
        let classifier = Classifier::default();
        let summary = DashboardSummary::compute(&rows(), &permit_tiles(), today(), &classifier);

        assert_eq!(summary.tiles.len(), 5);
        assert_eq!(summary.count(Tile::Total), Some(6));
        assert_eq!(summary.count(Tile::ExpiringSoon(ExpiryContext::PermitPartB)), Some(2));
        assert_eq!(summary.count(Tile::ExpiringSoon(ExpiryContext::PermitPartA)), Some(0));
        assert_eq!(summary.count(Tile::Expired(ExpiryContext::DrivingLicence)), None);
        assert_eq!(summary.excluded, 1);
        assert_eq!(summary.tiles[3].label, "Part B expiring");
    }
}
