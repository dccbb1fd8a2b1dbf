use std::fmt;
use thiserror::Error;

use certum_core::{CertificateId, CoreError};

/// Failure kinds of the registry.
///
/// The first five are the caller-facing taxonomy; every rejected mutation
/// leaves registry state untouched. `AuditFailure` and `Internal` are
/// infrastructure faults and are also raised before any state is changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum RegistryError {
    /// Caller lacks the required role or ownership.
    #[error("authorization error")]
    Authorization,

    /// Unknown certificate id, content hash, or issuer.
    #[error("not found")]
    NotFound,

    /// Transition attempted from a terminal or otherwise wrong state.
    #[error("invalid state")]
    InvalidState,

    /// Malformed input.
    #[error("validation error")]
    Validation,

    /// Expiry attempted before the certificate's deadline.
    #[error("precondition failed")]
    Precondition,

    #[error("audit log unavailable")]
    AuditFailure,

    #[error("internal error")]
    Internal,
}

/// Structured error with a `RegistryError` kind and a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryErrorDetail {
    pub kind: RegistryError,
    pub message: String,
    pub certificate_id: Option<CertificateId>,
}

impl fmt::Display for RegistryErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(id) = self.certificate_id {
            write!(f, " (certificate: {})", id)?;
        }
        Ok(())
    }
}

impl std::error::Error for RegistryErrorDetail {}

impl RegistryErrorDetail {
    pub fn new(kind: RegistryError, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            certificate_id: None,
        }
    }

    pub fn with_certificate_id(mut self, id: CertificateId) -> Self {
        self.certificate_id = Some(id);
        self
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(RegistryError::Authorization, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(RegistryError::NotFound, message)
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(RegistryError::InvalidState, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(RegistryError::Validation, message)
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::new(RegistryError::Precondition, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(RegistryError::Internal, message)
    }
}

impl From<RegistryError> for RegistryErrorDetail {
    fn from(kind: RegistryError) -> Self {
        let message = kind.to_string();
        Self {
            kind,
            message,
            certificate_id: None,
        }
    }
}

impl From<CoreError> for RegistryErrorDetail {
    fn from(err: CoreError) -> Self {
        let kind = match err {
            CoreError::InvalidIdentity(_) | CoreError::InvalidContentHash(_) => {
                RegistryError::Validation
            }
            CoreError::Audit(_) => RegistryError::AuditFailure,
            CoreError::Serialization(_) | CoreError::Internal(_) => RegistryError::Internal,
        };
        Self::new(kind, err.to_string())
    }
}

pub type RegistryResult<T> = Result<T, RegistryErrorDetail>;
