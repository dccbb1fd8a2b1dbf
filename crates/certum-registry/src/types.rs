use certum_core::{CertificateId, ContentHash, Identity, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// CertificateStatus — three-state lifecycle, two terminal states
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateStatus {
    Active,
    Revoked,
    Expired,
}

impl CertificateStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, CertificateStatus::Active)
    }
}

impl fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertificateStatus::Active => write!(f, "Active"),
            CertificateStatus::Revoked => write!(f, "Revoked"),
            CertificateStatus::Expired => write!(f, "Expired"),
        }
    }
}

// ---------------------------------------------------------------------------
// Certificate — one issued credential record
// ---------------------------------------------------------------------------

/// Expiration value meaning "never expires".
pub const NO_EXPIRATION: u64 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub id: CertificateId,
    pub holder: Identity,
    pub issuer: Identity,
    pub content_uri: String,
    pub content_hash: Option<ContentHash>,
    /// Seconds since epoch; `NO_EXPIRATION` for certificates that never lapse.
    pub expiration_timestamp: u64,
    pub status: CertificateStatus,
    pub issued_at: Timestamp,
    /// When the certificate left `Active`.
    pub status_changed_at: Option<Timestamp>,
}

impl Certificate {
    pub fn never_expires(&self) -> bool {
        self.expiration_timestamp == NO_EXPIRATION
    }

    /// Whether the deadline has been reached at `now_secs`, whatever the
    /// current status.
    pub fn is_due_at(&self, now_secs: u64) -> bool {
        !self.never_expires() && now_secs >= self.expiration_timestamp
    }
}

/// Parameters for issuing a certificate. The issuer is the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintRequest {
    pub holder: Identity,
    pub content_uri: String,
    #[serde(default)]
    pub content_hash: Option<ContentHash>,
    #[serde(default)]
    pub expiration_timestamp: u64,
}

// ---------------------------------------------------------------------------
// IssuerRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerRecord {
    pub identity: Identity,
    pub display_name: String,
    pub is_active: bool,
    pub registered_at: Timestamp,
    pub revoked_at: Option<Timestamp>,
}

// ---------------------------------------------------------------------------
// HashVerification — answer to "was this exact content registered?"
// ---------------------------------------------------------------------------

/// Result of a content-hash lookup.
///
/// `is_valid` only says the content was registered; it says nothing about
/// whether the certificate is still active. Callers check revocation and
/// expiry separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashVerification {
    pub is_valid: bool,
    pub certificate_id: Option<CertificateId>,
    pub holder: Option<Identity>,
}

impl HashVerification {
    pub fn unknown() -> Self {
        Self {
            is_valid: false,
            certificate_id: None,
            holder: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Sweep types
// ---------------------------------------------------------------------------

/// One bounded window over the active index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueScan {
    pub due: Vec<CertificateId>,
    /// How many active entries were examined.
    pub scanned: usize,
    /// Where the next window starts; 0 once the end of the index is reached.
    pub next_offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    Unknown,
    Revoked,
    AlreadyExpired,
    NotDue,
    Failed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Unknown => write!(f, "unknown certificate"),
            SkipReason::Revoked => write!(f, "revoked before commit"),
            SkipReason::AlreadyExpired => write!(f, "already expired"),
            SkipReason::NotDue => write!(f, "deadline not reached"),
            SkipReason::Failed(msg) => write!(f, "failed: {}", msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedExpiry {
    pub certificate_id: CertificateId,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub committed: Vec<CertificateId>,
    pub skipped: Vec<SkippedExpiry>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.committed.is_empty() && self.skipped.is_empty()
    }
}
