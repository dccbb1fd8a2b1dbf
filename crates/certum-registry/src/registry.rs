//! The registry: one lock over issuer roster, certificate store and indexes.
//!
//! Every mutation takes the write side of the lock, validates, appends its
//! audit entry, then applies. A failed validation or a failed audit append
//! leaves state untouched. Reads take the shared side and always see a fully
//! applied state.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use certum_core::{
    AuditChainWriter, AuditEvent, AuditEventKind, CertificateId, Clock, ContentHash, Identity,
    Timestamp,
};
use tracing::{info, warn};

use crate::access::AccessController;
use crate::error::{RegistryError, RegistryErrorDetail, RegistryResult};
use crate::scheduler::ExpirationScheduler;
use crate::store::CertificateStore;
use crate::types::{
    Certificate, CertificateStatus, DueScan, HashVerification, IssuerRecord, MintRequest,
    SweepReport,
};

pub(crate) struct RegistryState {
    pub(crate) access: AccessController,
    pub(crate) store: CertificateStore,
}

pub struct Registry {
    superadmin: Identity,
    state: RwLock<RegistryState>,
    clock: Arc<dyn Clock>,
    audit: Arc<dyn AuditChainWriter>,
}

impl Registry {
    pub fn new(
        superadmin: Identity,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn AuditChainWriter>,
    ) -> Self {
        info!(superadmin = %superadmin, "certificate registry created");
        Self {
            state: RwLock::new(RegistryState {
                access: AccessController::new(superadmin.clone()),
                store: CertificateStore::new(),
            }),
            superadmin,
            clock,
            audit,
        }
    }

    pub fn superadmin(&self) -> &Identity {
        &self.superadmin
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub(crate) fn read(&self) -> RegistryResult<RwLockReadGuard<'_, RegistryState>> {
        self.state
            .read()
            .map_err(|_| RegistryErrorDetail::internal("registry lock poisoned"))
    }

    pub(crate) fn write(&self) -> RegistryResult<RwLockWriteGuard<'_, RegistryState>> {
        self.state
            .write()
            .map_err(|_| RegistryErrorDetail::internal("registry lock poisoned"))
    }

    /// Append an audit entry. Called with the write lock held so the audit
    /// order matches the mutation order.
    pub(crate) fn record(&self, at: Timestamp, kind: AuditEventKind) -> RegistryResult<()> {
        self.audit
            .append(AuditEvent::new(at, kind))
            .map(|_| ())
            .map_err(|e| RegistryErrorDetail::new(RegistryError::AuditFailure, e.to_string()))
    }

    // -----------------------------------------------------------------------
    // Issuer roster
    // -----------------------------------------------------------------------

    pub fn register_issuer(
        &self,
        caller: &Identity,
        identity: &Identity,
        name: &str,
    ) -> RegistryResult<IssuerRecord> {
        let mut state = self.write()?;
        let now = self.clock.now();
        let record = state
            .access
            .authorize_registration(caller, identity, name, now)
            .inspect_err(|e| warn!(caller = %caller, issuer = %identity, error = %e, "issuer registration rejected"))?;

        self.record(
            now,
            AuditEventKind::IssuerRegistered {
                identity: record.identity.clone(),
                name: record.display_name.clone(),
            },
        )?;
        state.access.insert_issuer(record.clone());

        info!(issuer = %record.identity, name = %record.display_name, "issuer registered");
        Ok(record)
    }

    pub fn revoke_issuer(&self, caller: &Identity, identity: &Identity) -> RegistryResult<()> {
        let mut state = self.write()?;
        let now = self.clock.now();
        state
            .access
            .authorize_issuer_revocation(caller, identity)
            .inspect_err(|e| warn!(caller = %caller, issuer = %identity, error = %e, "issuer revocation rejected"))?;

        self.record(
            now,
            AuditEventKind::IssuerRevoked {
                identity: identity.clone(),
            },
        )?;
        state.access.deactivate_issuer(identity, now);

        info!(issuer = %identity, "issuer revoked");
        Ok(())
    }

    pub fn is_registered_issuer(&self, identity: &Identity) -> RegistryResult<bool> {
        Ok(self.read()?.access.is_registered_issuer(identity))
    }

    pub fn issuer_name(&self, identity: &Identity) -> RegistryResult<String> {
        Ok(self.read()?.access.issuer_name(identity)?.to_string())
    }

    pub fn issuer(&self, identity: &Identity) -> RegistryResult<IssuerRecord> {
        Ok(self.read()?.access.issuer(identity)?.clone())
    }

    pub fn issuers(&self) -> RegistryResult<Vec<IssuerRecord>> {
        Ok(self.read()?.access.issuers().cloned().collect())
    }

    // -----------------------------------------------------------------------
    // Certificate lifecycle
    // -----------------------------------------------------------------------

    /// Issue a certificate as `caller`, who must be an active issuer.
    pub fn mint(&self, caller: &Identity, request: &MintRequest) -> RegistryResult<CertificateId> {
        let mut state = self.write()?;
        let now = self.clock.now();

        let cert = state
            .access
            .ensure_active_issuer(caller)
            .and_then(|()| state.store.prepare_mint(caller, request, now))
            .inspect_err(|e| warn!(caller = %caller, error = %e, "mint rejected"))?;

        self.record(
            now,
            AuditEventKind::CertificateMinted {
                certificate_id: cert.id,
                issuer: cert.issuer.clone(),
                holder: cert.holder.clone(),
                expiration_timestamp: cert.expiration_timestamp,
            },
        )?;
        let id = state.store.commit_mint(cert);

        info!(
            certificate_id = %id,
            issuer = %caller,
            holder = %request.holder,
            expiration = request.expiration_timestamp,
            "certificate minted"
        );
        Ok(id)
    }

    /// Revoke as the original issuer or the superadmin. Irreversible.
    pub fn revoke(&self, caller: &Identity, id: CertificateId) -> RegistryResult<()> {
        let mut state = self.write()?;
        let now = self.clock.now();
        let is_superadmin = state.access.is_superadmin(caller);

        state
            .store
            .check_revocable(caller, is_superadmin, id)
            .inspect_err(|e| warn!(caller = %caller, error = %e, "revocation rejected"))?;

        self.record(
            now,
            AuditEventKind::CertificateRevoked {
                certificate_id: id,
                revoked_by: caller.clone(),
            },
        )?;
        state
            .store
            .commit_transition(id, CertificateStatus::Revoked, now)?;

        info!(certificate_id = %id, revoked_by = %caller, "certificate revoked");
        Ok(())
    }

    /// Commit the expiry of a certificate whose deadline has passed.
    /// Anyone may call this; `caller` is only recorded.
    pub fn expire(&self, caller: Option<&Identity>, id: CertificateId) -> RegistryResult<()> {
        let mut state = self.write()?;
        let now = self.clock.now();
        self.expire_locked(&mut state, id, now, caller)
            .inspect_err(|e| warn!(error = %e, "expiry rejected"))
    }

    pub(crate) fn expire_locked(
        &self,
        state: &mut RegistryState,
        id: CertificateId,
        now: Timestamp,
        triggered_by: Option<&Identity>,
    ) -> RegistryResult<()> {
        state.store.check_expirable(id, now.seconds_since_epoch)?;

        self.record(
            now,
            AuditEventKind::CertificateExpired {
                certificate_id: id,
                triggered_by: triggered_by.cloned(),
            },
        )?;
        state
            .store
            .commit_transition(id, CertificateStatus::Expired, now)?;

        info!(certificate_id = %id, "certificate expired");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Certificate reads
    // -----------------------------------------------------------------------

    /// Whether the deadline has passed right now, regardless of whether the
    /// expiry has been committed.
    pub fn is_expired_computed(&self, id: CertificateId) -> RegistryResult<bool> {
        let now = self.clock.now_secs();
        self.read()?.store.is_expired_computed(id, now)
    }

    /// Whether the expiry has been committed. This is the flag verifiers
    /// should trust.
    pub fn is_expired_official(&self, id: CertificateId) -> RegistryResult<bool> {
        self.read()?.store.is_expired_official(id)
    }

    pub fn is_revoked(&self, id: CertificateId) -> RegistryResult<bool> {
        self.read()?.store.is_revoked(id)
    }

    pub fn certificate(&self, id: CertificateId) -> RegistryResult<Certificate> {
        Ok(self.read()?.store.get(id)?.clone())
    }

    pub fn status(&self, id: CertificateId) -> RegistryResult<CertificateStatus> {
        Ok(self.read()?.store.get(id)?.status)
    }

    pub fn expiration_timestamp(&self, id: CertificateId) -> RegistryResult<u64> {
        Ok(self.read()?.store.get(id)?.expiration_timestamp)
    }

    pub fn content_uri(&self, id: CertificateId) -> RegistryResult<String> {
        Ok(self.read()?.store.get(id)?.content_uri.clone())
    }

    pub fn holder_of(&self, id: CertificateId) -> RegistryResult<Identity> {
        Ok(self.read()?.store.get(id)?.holder.clone())
    }

    pub fn total_issued(&self) -> RegistryResult<usize> {
        Ok(self.read()?.store.total_issued())
    }

    // -----------------------------------------------------------------------
    // Active-set enumeration
    // -----------------------------------------------------------------------

    pub fn active_count(&self) -> RegistryResult<usize> {
        Ok(self.read()?.store.active().count())
    }

    /// Order is unspecified and changes whenever a certificate leaves the
    /// active set.
    pub fn active_id_at(&self, index: usize) -> RegistryResult<CertificateId> {
        let state = self.read()?;
        let active = state.store.active();
        active.id_at(index).ok_or_else(|| {
            RegistryErrorDetail::not_found(format!(
                "active index {} out of range (count {})",
                index,
                active.count()
            ))
        })
    }

    pub fn active_page(&self, offset: usize, limit: usize) -> RegistryResult<Vec<CertificateId>> {
        Ok(self.read()?.store.active().page(offset, limit).to_vec())
    }

    // -----------------------------------------------------------------------
    // Content verification
    // -----------------------------------------------------------------------

    pub fn lookup(&self, hash: &ContentHash) -> RegistryResult<Option<CertificateId>> {
        Ok(self.read()?.store.verification().lookup(hash))
    }

    pub fn verify_by_hash(&self, hash: &ContentHash) -> RegistryResult<HashVerification> {
        Ok(self.read()?.store.verify_by_hash(hash))
    }

    /// Hash raw file content and verify it.
    pub fn verify_file(&self, content: &[u8]) -> RegistryResult<HashVerification> {
        self.verify_by_hash(&ContentHash::of_bytes(content))
    }

    // -----------------------------------------------------------------------
    // Expiration sweep
    // -----------------------------------------------------------------------

    pub fn scheduler(&self) -> ExpirationScheduler<'_> {
        ExpirationScheduler::new(self)
    }

    pub fn check_due(&self, max_batch: usize) -> RegistryResult<Vec<CertificateId>> {
        self.scheduler().check_due(max_batch)
    }

    pub fn check_due_from(&self, offset: usize, max_batch: usize) -> RegistryResult<DueScan> {
        self.scheduler().check_due_from(offset, max_batch)
    }

    pub fn commit_due(&self, ids: &[CertificateId]) -> SweepReport {
        self.scheduler().commit_due(ids)
    }

    pub fn sweep(&self, max_batch: usize) -> RegistryResult<SweepReport> {
        self.scheduler().sweep(max_batch)
    }

    pub fn upkeep_needed(&self, max_batch: usize) -> RegistryResult<bool> {
        self.scheduler().upkeep_needed(max_batch)
    }
}
