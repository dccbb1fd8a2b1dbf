//! Certificate records and their lifecycle transitions.
//!
//! The store is append-only: records are never deleted, only moved from
//! `Active` to one of the terminal states. It owns both indexes and keeps
//! them in step with the records: an id is in the active index exactly when
//! its record is `Active`.

use certum_core::{CertificateId, ContentHash, Identity, Timestamp};

use crate::active_index::ActiveIndex;
use crate::error::{RegistryErrorDetail, RegistryResult};
use crate::status;
use crate::types::{Certificate, CertificateStatus, HashVerification, MintRequest};
use crate::verification::VerificationIndex;

const MAX_CONTENT_URI_LEN: usize = 2048;

#[derive(Debug, Clone)]
pub struct CertificateStore {
    /// `records[i]` holds certificate id `i + 1`.
    records: Vec<Certificate>,
    active: ActiveIndex,
    verification: VerificationIndex,
}

impl Default for CertificateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CertificateStore {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            active: ActiveIndex::new(),
            verification: VerificationIndex::new(),
        }
    }

    pub fn get(&self, id: CertificateId) -> RegistryResult<&Certificate> {
        id.value()
            .checked_sub(1)
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| self.records.get(i))
            .ok_or_else(|| {
                RegistryErrorDetail::not_found("unknown certificate").with_certificate_id(id)
            })
    }

    fn get_mut(&mut self, id: CertificateId) -> RegistryResult<&mut Certificate> {
        id.value()
            .checked_sub(1)
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| self.records.get_mut(i))
            .ok_or_else(|| {
                RegistryErrorDetail::not_found("unknown certificate").with_certificate_id(id)
            })
    }

    /// The id the next successful mint will receive.
    pub fn next_id(&self) -> CertificateId {
        CertificateId(self.records.len() as u64 + 1)
    }

    pub fn total_issued(&self) -> usize {
        self.records.len()
    }

    pub fn active(&self) -> &ActiveIndex {
        &self.active
    }

    pub fn verification(&self) -> &VerificationIndex {
        &self.verification
    }

    // -----------------------------------------------------------------------
    // Predicates
    // -----------------------------------------------------------------------

    /// Whether the deadline has passed at `now_secs`, regardless of status.
    pub fn is_expired_computed(&self, id: CertificateId, now_secs: u64) -> RegistryResult<bool> {
        Ok(self.get(id)?.is_due_at(now_secs))
    }

    pub fn is_expired_official(&self, id: CertificateId) -> RegistryResult<bool> {
        Ok(self.get(id)?.status == CertificateStatus::Expired)
    }

    pub fn is_revoked(&self, id: CertificateId) -> RegistryResult<bool> {
        Ok(self.get(id)?.status == CertificateStatus::Revoked)
    }

    pub fn verify_by_hash(&self, hash: &ContentHash) -> HashVerification {
        match self
            .verification
            .lookup(hash)
            .and_then(|id| self.get(id).ok())
        {
            Some(cert) => HashVerification {
                is_valid: true,
                certificate_id: Some(cert.id),
                holder: Some(cert.holder.clone()),
            },
            None => HashVerification::unknown(),
        }
    }

    // -----------------------------------------------------------------------
    // Mint
    // -----------------------------------------------------------------------

    /// Validate a mint and build the record it would create. Does not
    /// touch the store; pair with `commit_mint`.
    pub fn prepare_mint(
        &self,
        issuer: &Identity,
        request: &MintRequest,
        now: Timestamp,
    ) -> RegistryResult<Certificate> {
        if request.expiration_timestamp != 0
            && request.expiration_timestamp <= now.seconds_since_epoch
        {
            return Err(RegistryErrorDetail::validation(format!(
                "expiration {} is not in the future (now {})",
                request.expiration_timestamp, now.seconds_since_epoch
            )));
        }

        validate_content_uri(&request.content_uri)?;

        if let Some(hash) = &request.content_hash {
            if let Some(existing) = self.verification.lookup(hash) {
                return Err(RegistryErrorDetail::validation(format!(
                    "content hash {} is already registered",
                    hash
                ))
                .with_certificate_id(existing));
            }
        }

        Ok(Certificate {
            id: self.next_id(),
            holder: request.holder.clone(),
            issuer: issuer.clone(),
            content_uri: request.content_uri.clone(),
            content_hash: request.content_hash,
            expiration_timestamp: request.expiration_timestamp,
            status: CertificateStatus::Active,
            issued_at: now,
            status_changed_at: None,
        })
    }

    /// Store a record produced by `prepare_mint` and index it.
    pub(crate) fn commit_mint(&mut self, cert: Certificate) -> CertificateId {
        let id = cert.id;
        debug_assert_eq!(id, self.next_id());
        let inserted = self.active.insert(id);
        debug_assert!(inserted, "fresh id already in active index");
        if let Some(hash) = cert.content_hash {
            self.verification.insert(hash, id);
        }
        self.records.push(cert);
        id
    }

    // -----------------------------------------------------------------------
    // Revoke / expire
    // -----------------------------------------------------------------------

    /// Check that `caller` may revoke `id` and that it is still active.
    pub fn check_revocable(
        &self,
        caller: &Identity,
        is_superadmin: bool,
        id: CertificateId,
    ) -> RegistryResult<()> {
        let cert = self.get(id)?;
        if !is_superadmin && cert.issuer != *caller {
            return Err(RegistryErrorDetail::unauthorized(format!(
                "{} is neither the issuer of this certificate nor the superadmin",
                caller
            ))
            .with_certificate_id(id));
        }
        status::transition_to_revoked(cert.status).map_err(|e| e.with_certificate_id(id))?;
        Ok(())
    }

    /// Check that `id` is active and past its deadline at `now_secs`.
    pub fn check_expirable(&self, id: CertificateId, now_secs: u64) -> RegistryResult<()> {
        let cert = self.get(id)?;
        status::transition_to_expired(cert.status).map_err(|e| e.with_certificate_id(id))?;
        if !cert.is_due_at(now_secs) {
            let msg = if cert.never_expires() {
                "certificate has no expiration".to_string()
            } else {
                format!(
                    "deadline {} not reached (now {})",
                    cert.expiration_timestamp, now_secs
                )
            };
            return Err(RegistryErrorDetail::precondition(msg).with_certificate_id(id));
        }
        Ok(())
    }

    /// Move `id` out of `Active` and drop it from the active index.
    pub(crate) fn commit_transition(
        &mut self,
        id: CertificateId,
        to: CertificateStatus,
        at: Timestamp,
    ) -> RegistryResult<()> {
        let cert = self.get_mut(id)?;
        let new_status =
            status::transition(cert.status, to).map_err(|e| e.with_certificate_id(id))?;
        cert.status = new_status;
        cert.status_changed_at = Some(at);
        let removed = self.active.remove(id);
        debug_assert!(removed, "active certificate missing from active index");
        Ok(())
    }
}

fn validate_content_uri(uri: &str) -> RegistryResult<()> {
    if uri.is_empty() {
        return Err(RegistryErrorDetail::validation(
            "content URI must not be empty",
        ));
    }
    if uri.len() > MAX_CONTENT_URI_LEN {
        return Err(RegistryErrorDetail::validation(format!(
            "content URI must be at most {} bytes",
            MAX_CONTENT_URI_LEN
        )));
    }
    if uri.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(RegistryErrorDetail::validation(
            "content URI must not contain whitespace or control characters",
        ));
    }
    Ok(())
}
