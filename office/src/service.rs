//! The renewal desk.
//!
//! Orchestrates issuance, renewal, payments and dashboards over a
//! [`RecordStore`]. Each operation loads the whole record, applies one engine
//! step and saves the result; a failed step leaves the stored record as it
//! was. Bills are generated after the save, so a generator outage never
//! blocks a renewal. The audit entry is written last, over the history as
//! finally stored.

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use validity::{
    describe_remaining, licence_tiles, permit_tiles, Classifier, DashboardSummary, DrivingLicence,
    ExpiryContext, InvariantViolation, LicenceDraft, Money, NationalPermit, PermitDraft,
    PermitPart, RenewalHistory, RenewalRecord, SegmentRequest, Tile, ValidityWindow,
};

use crate::audit::{AuditAction, AuditEntry, RenewalAudit};
use crate::clock::Clock;
use crate::config::OfficeConfig;
use crate::documents::{BillRequest, DocumentGenerator};
use crate::store::RecordStore;
use crate::types::{
    LicenceRenewal, LicenceStatus, OfficeError, PermitRenewal, PermitStatus, RecordKind,
    RenewalOutcome, Result, TrackStatus,
};

/// Entry point for request handlers.
pub struct RenewalDesk {
    config: OfficeConfig,
    classifier: Classifier,
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    documents: Option<Arc<dyn DocumentGenerator>>,
    audit: RenewalAudit,
}

impl RenewalDesk {
    /// Create a desk; fails if the config is invalid.
    pub fn new(
        config: OfficeConfig,
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let classifier = Classifier::new(config.thresholds.clone())?;
        let audit = RenewalAudit::new(config.audit.max_entries);

        Ok(Self {
            config,
            classifier,
            store,
            clock,
            documents: None,
            audit,
        })
    }

    /// Generate bills with `generator`.
    pub fn with_documents(mut self, generator: Arc<dyn DocumentGenerator>) -> Self {
        self.documents = Some(generator);
        self
    }

    pub fn config(&self) -> &OfficeConfig {
        &self.config
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    // =========================================================================
    // National permits
    // =========================================================================

    pub async fn issue_permit(&self, draft: &PermitDraft) -> Result<NationalPermit> {
        let id = uuid::Uuid::new_v4().to_string();
        let permit = NationalPermit::issue(id, draft, self.clock.now())?;
        self.store.save_permit(&permit).await?;

        info!(
            permit_id = %permit.id,
            permit_number = %permit.permit_number,
            has_part_b = permit.part_b().is_some(),
            "Permit issued"
        );

        let parts: Vec<PermitPart> = [PermitPart::PartA, PermitPart::PartB]
            .into_iter()
            .filter(|part| permit.part(*part).is_some())
            .collect();

        let (permit, _) = if self.config.documents.on_issue {
            self.with_permit_bills(permit, &parts).await
        } else {
            (permit, Vec::new())
        };

        for part in &parts {
            if let Some(track) = permit.part(*part) {
                self.audit_change(AuditAction::Issued, &permit.id, part.context(), track.history())
                    .await;
            }
        }

        Ok(permit)
    }

    /// Issue Part B on a permit that has none.
    pub async fn attach_part_b(
        &self,
        permit_id: &str,
        request: &SegmentRequest,
    ) -> Result<NationalPermit> {
        let permit = self.load_permit(permit_id).await?;
        let updated = permit.attach_part_b(request, self.clock.now())?;
        self.store.save_permit(&updated).await?;

        info!(permit_id = %permit_id, identifier = %request.identifier, "Part B attached");

        let (updated, _) = if self.config.documents.on_issue {
            self.with_permit_bills(updated, &[PermitPart::PartB]).await
        } else {
            (updated, Vec::new())
        };

        if let Some(track) = updated.part_b() {
            self.audit_change(
                AuditAction::Issued,
                permit_id,
                ExpiryContext::PermitPartB,
                track.history(),
            )
            .await;
        }

        Ok(updated)
    }

    /// Renew one part of a permit.
    ///
    /// The other part is untouched. The returned outcome carries the record
    /// that was in force before as `archived`.
    pub async fn renew_permit(
        &self,
        permit_id: &str,
        part: PermitPart,
        request: &SegmentRequest,
    ) -> Result<PermitRenewal> {
        let permit = self.load_permit(permit_id).await?;
        let (renewed, archived) = permit.renew(part, request, self.clock.now())?;
        self.store.save_permit(&renewed).await?;

        info!(
            permit_id = %permit_id,
            part = ?part,
            previous = %archived.identifier,
            identifier = %request.identifier,
            "Permit renewed"
        );

        let (renewed, mut references) = if self.config.documents.on_renewal {
            self.with_permit_bills(renewed, &[part]).await
        } else {
            (renewed, Vec::new())
        };

        if let Some(track) = renewed.part(part) {
            self.audit_change(AuditAction::Renewed, permit_id, part.context(), track.history())
                .await;
        }

        Ok(RenewalOutcome {
            record: renewed,
            archived,
            document: references.pop(),
        })
    }

    pub async fn permit_status(&self, permit_id: &str) -> Result<PermitStatus> {
        let permit = self.load_permit(permit_id).await?;
        let today = self.clock.today();

        let context = ExpiryContext::PermitPartA;
        let window = stored_window(&permit.id, context, permit.part_a().current_window())?;
        let part_a = self.track_status(context, window, today);

        let part_b = match permit.part_b() {
            Some(track) => {
                let context = ExpiryContext::PermitPartB;
                let window = stored_window(&permit.id, context, track.current_window())?;
                Some(self.track_status(context, window, today))
            }
            None => None,
        };

        Ok(PermitStatus {
            permit_id: permit.id.clone(),
            part_a,
            part_b,
            balance: permit.billing().balance(),
            pending_payment: permit.billing().has_pending_payment(),
        })
    }

    pub async fn permit_dashboard(&self) -> Result<DashboardSummary> {
        let permits = self.store.list_permits().await?;
        let today = self.clock.today();
        let summary =
            DashboardSummary::compute(&permits, &permit_tiles(), today, &self.classifier);
        debug!(
            records = permits.len(),
            excluded = summary.excluded,
            "Permit dashboard computed"
        );
        Ok(summary)
    }

    /// Permits behind a dashboard tile.
    pub async fn permits_for(&self, tile: Tile) -> Result<Vec<NationalPermit>> {
        let permits = self.store.list_permits().await?;
        let today = self.clock.today();
        Ok(tile
            .filter(&permits, today, &self.classifier)
            .into_iter()
            .cloned()
            .collect())
    }

    pub async fn record_permit_payment(
        &self,
        permit_id: &str,
        amount: Money,
    ) -> Result<NationalPermit> {
        let mut permit = self.load_permit(permit_id).await?;
        permit.record_payment(amount)?;
        self.store.save_permit(&permit).await?;

        info!(
            permit_id = %permit_id,
            amount = %amount,
            balance = %permit.billing().balance(),
            "Permit payment recorded"
        );
        Ok(permit)
    }

    // =========================================================================
    // Driving licences
    // =========================================================================

    pub async fn issue_licence(&self, draft: &LicenceDraft) -> Result<DrivingLicence> {
        let id = uuid::Uuid::new_v4().to_string();
        let licence = DrivingLicence::issue(id, draft, self.clock.now())?;
        self.store.save_licence(&licence).await?;

        info!(
            licence_id = %licence.id,
            licence_number = %licence.licence_number,
            has_learning = licence.learning().is_some(),
            "Licence issued"
        );

        let (licence, _) = if self.config.documents.on_issue {
            self.with_licence_bill(licence).await
        } else {
            (licence, None)
        };

        self.audit_change(
            AuditAction::Issued,
            &licence.id,
            ExpiryContext::DrivingLicence,
            licence.licence().history(),
        )
        .await;

        Ok(licence)
    }

    /// Renew a licence; the request must carry its `valid_to`.
    pub async fn renew_licence(
        &self,
        licence_id: &str,
        request: &SegmentRequest,
    ) -> Result<LicenceRenewal> {
        let licence = self.load_licence(licence_id).await?;
        let (renewed, archived) = licence.renew(request, self.clock.now())?;
        self.store.save_licence(&renewed).await?;

        info!(
            licence_id = %licence_id,
            previous = %archived.identifier,
            identifier = %request.identifier,
            "Licence renewed"
        );

        let (renewed, document) = if self.config.documents.on_renewal {
            self.with_licence_bill(renewed).await
        } else {
            (renewed, None)
        };

        self.audit_change(
            AuditAction::Renewed,
            licence_id,
            ExpiryContext::DrivingLicence,
            renewed.licence().history(),
        )
        .await;

        Ok(RenewalOutcome {
            record: renewed,
            archived,
            document,
        })
    }

    pub async fn licence_status(&self, licence_id: &str) -> Result<LicenceStatus> {
        let licence = self.load_licence(licence_id).await?;
        let today = self.clock.today();

        let context = ExpiryContext::DrivingLicence;
        let window = stored_window(&licence.id, context, licence.licence().current_window())?;
        let status = self.track_status(context, window, today);

        let learning = match licence.learning() {
            Some(window) => {
                let context = ExpiryContext::LearningLicence;
                let window = stored_window(&licence.id, context, window.check().map(|_| window))?;
                Some(self.track_status(context, window, today))
            }
            None => None,
        };

        Ok(LicenceStatus {
            licence_id: licence.id.clone(),
            licence: status,
            learning,
            balance: licence.billing().balance(),
            pending_payment: licence.billing().has_pending_payment(),
        })
    }

    pub async fn licence_dashboard(&self) -> Result<DashboardSummary> {
        let licences = self.store.list_licences().await?;
        let today = self.clock.today();
        let summary =
            DashboardSummary::compute(&licences, &licence_tiles(), today, &self.classifier);
        debug!(
            records = licences.len(),
            excluded = summary.excluded,
            "Licence dashboard computed"
        );
        Ok(summary)
    }

    /// Licences behind a dashboard tile.
    pub async fn licences_for(&self, tile: Tile) -> Result<Vec<DrivingLicence>> {
        let licences = self.store.list_licences().await?;
        let today = self.clock.today();
        Ok(tile
            .filter(&licences, today, &self.classifier)
            .into_iter()
            .cloned()
            .collect())
    }

    pub async fn record_licence_payment(
        &self,
        licence_id: &str,
        amount: Money,
    ) -> Result<DrivingLicence> {
        let mut licence = self.load_licence(licence_id).await?;
        licence.record_payment(amount)?;
        self.store.save_licence(&licence).await?;

        info!(
            licence_id = %licence_id,
            amount = %amount,
            balance = %licence.billing().balance(),
            "Licence payment recorded"
        );
        Ok(licence)
    }

    // =========================================================================
    // Audit
    // =========================================================================

    /// Most recent audit entries, newest first.
    pub async fn audit_entries(&self, limit: usize) -> Vec<AuditEntry> {
        self.audit.recent(limit).await
    }

    async fn audit_change(
        &self,
        action: AuditAction,
        record_id: &str,
        context: ExpiryContext,
        history: &RenewalHistory,
    ) {
        if !self.config.audit.enabled {
            return;
        }
        let entry = AuditEntry::new(
            self.config.office_id.clone(),
            action,
            record_id,
            context,
            history,
            self.clock.now(),
        );
        self.audit.record(entry).await;
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn track_status(
        &self,
        context: ExpiryContext,
        window: ValidityWindow,
        today: NaiveDate,
    ) -> TrackStatus {
        let end = window.end_date();
        let classification = self.classifier.classify(end, today, context);
        TrackStatus {
            context,
            window,
            classification,
            renew_offered: self.classifier.renew_offered(end, today, context),
            label: describe_remaining(classification.days_remaining),
        }
    }

    async fn load_permit(&self, permit_id: &str) -> Result<NationalPermit> {
        self.store
            .load_permit(permit_id)
            .await?
            .ok_or_else(|| OfficeError::not_found(RecordKind::Permit, permit_id))
    }

    async fn load_licence(&self, licence_id: &str) -> Result<DrivingLicence> {
        self.store
            .load_licence(licence_id)
            .await?
            .ok_or_else(|| OfficeError::not_found(RecordKind::Licence, licence_id))
    }

    async fn bill_permit(&self, permit: &NationalPermit, part: PermitPart) -> Option<String> {
        let active = permit.part(part)?.active()?;
        self.generate_bill(&permit.id, &permit.holder_name, active).await
    }

    async fn bill_licence(&self, licence: &DrivingLicence) -> Option<String> {
        let active = licence.licence().active()?;
        self.generate_bill(&licence.id, &licence.holder_name, active).await
    }

    /// Generate a bill for `record`; failures are logged, not returned.
    async fn generate_bill(
        &self,
        record_id: &str,
        holder_name: &str,
        record: &RenewalRecord,
    ) -> Option<String> {
        let generator = self.documents.as_ref()?;
        let request = BillRequest {
            record_id: record_id.to_string(),
            identifier: record.identifier.clone(),
            holder_name: holder_name.to_string(),
            segment: record.segment,
            fees: record.fees,
        };

        match generator.generate(&request).await {
            Ok(reference) => {
                info!(
                    record_id = %record_id,
                    identifier = %record.identifier,
                    reference = %reference,
                    "Bill generated"
                );
                Some(reference)
            }
            Err(e) => {
                warn!(
                    record_id = %record_id,
                    identifier = %record.identifier,
                    error = %e,
                    "Bill generation failed, record saved without document"
                );
                None
            }
        }
    }

    /// Attach bills for `parts` and save the billed permit.
    ///
    /// Returns the saved permit with the attached references. When nothing
    /// could be attached or the save fails, the permit comes back unchanged.
    async fn with_permit_bills(
        &self,
        permit: NationalPermit,
        parts: &[PermitPart],
    ) -> (NationalPermit, Vec<String>) {
        let mut billed = permit.clone();
        let mut references = Vec::new();
        for part in parts {
            if let Some(reference) = self.bill_permit(&billed, *part).await {
                if attach_permit_bill(&mut billed, *part, reference.clone()) {
                    references.push(reference);
                }
            }
        }

        if references.is_empty() || !self.save_permit_after_bill(&billed).await {
            return (permit, Vec::new());
        }
        (billed, references)
    }

    /// Attach a bill to the active licence record and save it.
    async fn with_licence_bill(&self, licence: DrivingLicence) -> (DrivingLicence, Option<String>) {
        let Some(reference) = self.bill_licence(&licence).await else {
            return (licence, None);
        };
        let mut billed = licence.clone();
        if !attach_licence_bill(&mut billed, reference.clone())
            || !self.save_licence_after_bill(&billed).await
        {
            return (licence, None);
        }
        (billed, Some(reference))
    }

    async fn save_permit_after_bill(&self, permit: &NationalPermit) -> bool {
        match self.store.save_permit(permit).await {
            Ok(()) => true,
            Err(e) => {
                warn!(permit_id = %permit.id, error = %e, "Failed to save bill reference");
                false
            }
        }
    }

    async fn save_licence_after_bill(&self, licence: &DrivingLicence) -> bool {
        match self.store.save_licence(licence).await {
            Ok(()) => true,
            Err(e) => {
                warn!(licence_id = %licence.id, error = %e, "Failed to save bill reference");
                false
            }
        }
    }
}

/// Surface a persisted window that breaks its ordering invariant.
fn stored_window(
    record_id: &str,
    context: ExpiryContext,
    window: std::result::Result<ValidityWindow, InvariantViolation>,
) -> Result<ValidityWindow> {
    window.map_err(|violation| {
        error!(
            record_id = %record_id,
            context = context.as_str(),
            error = %violation,
            "Stored record violates an invariant"
        );
        OfficeError::Invariant(violation)
    })
}

fn attach_permit_bill(permit: &mut NationalPermit, part: PermitPart, reference: String) -> bool {
    let identifier = permit
        .part(part)
        .and_then(|track| track.active())
        .map(|record| record.identifier.clone());
    identifier.is_some_and(|identifier| permit.attach_document(part, &identifier, reference))
}

fn attach_licence_bill(licence: &mut DrivingLicence, reference: String) -> bool {
    let identifier = licence
        .licence()
        .active()
        .map(|record| record.identifier.clone());
    identifier.is_some_and(|identifier| licence.attach_document(&identifier, reference))
}
