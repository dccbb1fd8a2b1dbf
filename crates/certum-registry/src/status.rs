//! Three-state certificate status machine.
//!
//! States: Active, Revoked, Expired
//! Terminal states: Revoked, Expired (no outbound transitions)
//!
//! Valid transitions:
//!   Active -> Revoked
//!   Active -> Expired

use crate::error::{RegistryErrorDetail, RegistryResult};
use crate::types::CertificateStatus;

/// Check whether a status transition is valid.
pub fn is_valid_transition(from: CertificateStatus, to: CertificateStatus) -> bool {
    matches!(
        (from, to),
        (CertificateStatus::Active, CertificateStatus::Revoked)
            | (CertificateStatus::Active, CertificateStatus::Expired)
    )
}

/// Attempt a status transition, returning the new status or an error.
pub fn transition(
    from: CertificateStatus,
    to: CertificateStatus,
) -> RegistryResult<CertificateStatus> {
    if is_valid_transition(from, to) {
        Ok(to)
    } else {
        Err(RegistryErrorDetail::invalid_state(format!(
            "transition from {} to {} is not allowed",
            from, to
        )))
    }
}

pub fn transition_to_revoked(current: CertificateStatus) -> RegistryResult<CertificateStatus> {
    transition(current, CertificateStatus::Revoked)
}

pub fn transition_to_expired(current: CertificateStatus) -> RegistryResult<CertificateStatus> {
    transition(current, CertificateStatus::Expired)
}
