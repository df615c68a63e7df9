//! Audit trail for renewals.
//!
//! Every issuance and renewal leaves an entry naming the identifiers involved
//! and the digest of the resulting history, so a later edit to stored history
//! shows up as a digest mismatch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

use validity::{ExpiryContext, RenewalHistory};

/// What happened to the track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Issued,
    Renewed,
}

/// An entry in the renewal audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique entry ID
    pub entry_id: String,
    /// Office that performed the action
    pub office_id: String,
    pub action: AuditAction,
    /// Permit or licence ID
    pub record_id: String,
    /// Track that changed
    pub context: ExpiryContext,
    /// Identifier of the record in force before, if any
    pub previous_identifier: Option<String>,
    /// Identifier of the new active record
    pub new_identifier: String,
    /// Digest of the track history after the change
    pub history_digest: String,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        office_id: impl Into<String>,
        action: AuditAction,
        record_id: impl Into<String>,
        context: ExpiryContext,
        history: &RenewalHistory,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        let mut newest = history.newest_first();
        let new_identifier = newest
            .next()
            .map(|record| record.identifier.clone())
            .unwrap_or_default();
        let previous_identifier = newest.next().map(|record| record.identifier.clone());

        Self {
            entry_id: uuid::Uuid::new_v4().to_string(),
            office_id: office_id.into(),
            action,
            record_id: record_id.into(),
            context,
            previous_identifier,
            new_identifier,
            history_digest: history.digest(),
            recorded_at,
        }
    }
}

/// Bounded audit trail (newest first).
pub struct RenewalAudit {
    entries: Arc<RwLock<VecDeque<AuditEntry>>>,
    max_entries: usize,
}

impl RenewalAudit {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(VecDeque::new())),
            max_entries,
        }
    }

    pub async fn record(&self, entry: AuditEntry) {
        let mut entries = self.entries.write().await;
        entries.push_front(entry);

        // Prune if over limit
        while entries.len() > self.max_entries {
            entries.pop_back();
        }
    }

    /// Most recent entries, newest first.
    pub async fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        let entries = self.entries.read().await;
        entries.iter().take(limit).cloned().collect()
    }

    /// Entries for one record, newest first.
    pub async fn for_record(&self, record_id: &str) -> Vec<AuditEntry> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .filter(|e| e.record_id == record_id)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for RenewalAudit {
    fn default() -> Self {
        Self::new(10_000)
    }
}
