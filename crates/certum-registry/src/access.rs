//! Issuer access control.
//!
//! Two fixed roles: one superadmin, injected at construction, and a roster
//! of issuers that only the superadmin can change. Mutations are split into
//! an `authorize_*` step that validates without touching state and an
//! infallible apply step, so the registry can write its audit entry between
//! the two.

use certum_core::{Identity, Timestamp};
use std::collections::BTreeMap;

use crate::error::{RegistryErrorDetail, RegistryResult};
use crate::types::IssuerRecord;

const MAX_DISPLAY_NAME_LEN: usize = 128;

#[derive(Debug, Clone)]
pub struct AccessController {
    superadmin: Identity,
    issuers: BTreeMap<Identity, IssuerRecord>,
}

impl AccessController {
    pub fn new(superadmin: Identity) -> Self {
        Self {
            superadmin,
            issuers: BTreeMap::new(),
        }
    }

    pub fn superadmin(&self) -> &Identity {
        &self.superadmin
    }

    pub fn is_superadmin(&self, caller: &Identity) -> bool {
        *caller == self.superadmin
    }

    /// True only for issuers that are currently active.
    pub fn is_registered_issuer(&self, identity: &Identity) -> bool {
        self.issuers.get(identity).is_some_and(|r| r.is_active)
    }

    pub fn issuer(&self, identity: &Identity) -> RegistryResult<&IssuerRecord> {
        self.issuers
            .get(identity)
            .ok_or_else(|| RegistryErrorDetail::not_found(format!("unknown issuer {}", identity)))
    }

    /// Display name of a known issuer. Revoked issuers keep their name.
    pub fn issuer_name(&self, identity: &Identity) -> RegistryResult<&str> {
        self.issuer(identity).map(|r| r.display_name.as_str())
    }

    pub fn issuers(&self) -> impl Iterator<Item = &IssuerRecord> {
        self.issuers.values()
    }

    pub fn ensure_superadmin(&self, caller: &Identity) -> RegistryResult<()> {
        if self.is_superadmin(caller) {
            Ok(())
        } else {
            Err(RegistryErrorDetail::unauthorized(format!(
                "{} is not the superadmin",
                caller
            )))
        }
    }

    pub fn ensure_active_issuer(&self, caller: &Identity) -> RegistryResult<()> {
        if self.is_registered_issuer(caller) {
            Ok(())
        } else {
            Err(RegistryErrorDetail::unauthorized(format!(
                "{} is not an active issuer",
                caller
            )))
        }
    }

    /// Validate a registration and build the record that would be stored.
    ///
    /// Re-registering a known identity is rejected whether the existing
    /// record is active or revoked: reactivation is not supported.
    pub fn authorize_registration(
        &self,
        caller: &Identity,
        identity: &Identity,
        name: &str,
        now: Timestamp,
    ) -> RegistryResult<IssuerRecord> {
        self.ensure_superadmin(caller)?;

        let name = name.trim();
        if name.is_empty() {
            return Err(RegistryErrorDetail::validation(
                "issuer name must not be empty",
            ));
        }
        if name.len() > MAX_DISPLAY_NAME_LEN {
            return Err(RegistryErrorDetail::validation(format!(
                "issuer name must be at most {} bytes",
                MAX_DISPLAY_NAME_LEN
            )));
        }

        if let Some(existing) = self.issuers.get(identity) {
            let msg = if existing.is_active {
                format!("{} is already a registered issuer", identity)
            } else {
                format!("{} was revoked; issuer reactivation is not supported", identity)
            };
            return Err(RegistryErrorDetail::invalid_state(msg));
        }

        Ok(IssuerRecord {
            identity: identity.clone(),
            display_name: name.to_string(),
            is_active: true,
            registered_at: now,
            revoked_at: None,
        })
    }

    pub(crate) fn insert_issuer(&mut self, record: IssuerRecord) {
        self.issuers.insert(record.identity.clone(), record);
    }

    pub fn authorize_issuer_revocation(
        &self,
        caller: &Identity,
        identity: &Identity,
    ) -> RegistryResult<()> {
        self.ensure_superadmin(caller)?;
        let record = self.issuer(identity)?;
        if !record.is_active {
            return Err(RegistryErrorDetail::invalid_state(format!(
                "issuer {} is already revoked",
                identity
            )));
        }
        Ok(())
    }

    pub(crate) fn deactivate_issuer(&mut self, identity: &Identity, now: Timestamp) {
        if let Some(record) = self.issuers.get_mut(identity) {
            record.is_active = false;
            record.revoked_at = Some(now);
        }
    }
}
