//! Pull-based expiration sweep.
//!
//! `check_due` reads a bounded window of the active index and reports which
//! certificates have passed their deadline. `commit_due` then expires them
//! one at a time, each under its own write lock. The pair is deliberately
//! not atomic: anything revoked or expired between the two calls is skipped
//! and audited, never treated as a failure of the batch.
//!
//! The scheduler holds no state and runs no loop; an external timer decides
//! when to call it.

use certum_core::{AuditEventKind, CertificateId};
use tracing::{debug, info, warn};

use crate::error::RegistryResult;
use crate::registry::{Registry, RegistryState};
use crate::types::{CertificateStatus, DueScan, SkipReason, SkippedExpiry, SweepReport};

pub struct ExpirationScheduler<'a> {
    registry: &'a Registry,
}

impl<'a> ExpirationScheduler<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Due ids among the first `max_batch` active entries.
    pub fn check_due(&self, max_batch: usize) -> RegistryResult<Vec<CertificateId>> {
        Ok(self.check_due_from(0, max_batch)?.due)
    }

    /// Due ids within the window `[offset, offset + max_batch)` of the
    /// active index.
    pub fn check_due_from(&self, offset: usize, max_batch: usize) -> RegistryResult<DueScan> {
        let now = self.registry.clock().now_secs();
        let state = self.registry.read()?;
        let active = state.store.active();

        let window = active.page(offset, max_batch);
        let due: Vec<CertificateId> = window
            .iter()
            .copied()
            .filter(|id| {
                state
                    .store
                    .get(*id)
                    .map(|cert| cert.is_due_at(now))
                    .unwrap_or(false)
            })
            .collect();

        let end = offset.saturating_add(window.len());
        let next_offset = if end >= active.count() { 0 } else { end };

        debug!(
            offset,
            scanned = window.len(),
            due = due.len(),
            next_offset,
            "expiration scan"
        );

        Ok(DueScan {
            due,
            scanned: window.len(),
            next_offset,
        })
    }

    /// Expire every id that is still active and past its deadline; skip the
    /// rest. Never aborts part-way.
    pub fn commit_due(&self, ids: &[CertificateId]) -> SweepReport {
        let mut report = SweepReport::default();

        for &id in ids {
            match self.commit_one(id) {
                Ok(()) => report.committed.push(id),
                Err(reason) => {
                    info!(certificate_id = %id, reason = %reason, "expiry skipped");
                    report.skipped.push(SkippedExpiry {
                        certificate_id: id,
                        reason,
                    });
                }
            }
        }

        if !report.is_empty() {
            info!(
                committed = report.committed.len(),
                skipped = report.skipped.len(),
                "expiration batch processed"
            );
        }
        report
    }

    fn commit_one(&self, id: CertificateId) -> Result<(), SkipReason> {
        let mut state = self
            .registry
            .write()
            .map_err(|e| SkipReason::Failed(e.message))?;
        let now = self.registry.clock().now();

        match Self::revalidate(&state, id, now.seconds_since_epoch) {
            Ok(()) => self
                .registry
                .expire_locked(&mut state, id, now, None)
                .map_err(|e| SkipReason::Failed(e.to_string())),
            Err(reason) => {
                let kind = AuditEventKind::SweepSkipped {
                    certificate_id: id,
                    reason: reason.to_string(),
                };
                if let Err(e) = self.registry.record(now, kind) {
                    warn!(certificate_id = %id, error = %e, "failed to audit skipped expiry");
                }
                Err(reason)
            }
        }
    }

    fn revalidate(state: &RegistryState, id: CertificateId, now_secs: u64) -> Result<(), SkipReason> {
        let cert = state.store.get(id).map_err(|_| SkipReason::Unknown)?;
        match cert.status {
            CertificateStatus::Revoked => Err(SkipReason::Revoked),
            CertificateStatus::Expired => Err(SkipReason::AlreadyExpired),
            CertificateStatus::Active if !cert.is_due_at(now_secs) => Err(SkipReason::NotDue),
            CertificateStatus::Active => Ok(()),
        }
    }

    /// `check_due` followed by `commit_due`, from the start of the index.
    pub fn sweep(&self, max_batch: usize) -> RegistryResult<SweepReport> {
        let due = self.check_due(max_batch)?;
        Ok(self.commit_due(&due))
    }

    /// Scan one window and commit what is due in it. Returns the report and
    /// the offset the next call should start from.
    pub fn sweep_window(
        &self,
        offset: usize,
        max_batch: usize,
    ) -> RegistryResult<(SweepReport, usize)> {
        let scan = self.check_due_from(offset, max_batch)?;
        let report = self.commit_due(&scan.due);
        // Committed ids were swap-removed out of the window, pulling entries
        // from the tail in; step back so those get scanned next time.
        let next = scan.next_offset.saturating_sub(report.committed.len());
        Ok((report, next))
    }

    /// Whether any certificate in the first `max_batch` active entries is due.
    pub fn upkeep_needed(&self, max_batch: usize) -> RegistryResult<bool> {
        Ok(!self.check_due(max_batch)?.is_empty())
    }
}
