use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Timestamp — canonical time representation (seconds + nanoseconds)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds_since_epoch: u64,
    pub nanoseconds: u32,
}

impl Timestamp {
    pub fn now() -> Self {
        let now = chrono::Utc::now();
        Self {
            seconds_since_epoch: u64::try_from(now.timestamp()).unwrap_or(0),
            nanoseconds: now.timestamp_subsec_nanos(),
        }
    }

    pub fn from_seconds(seconds: u64) -> Self {
        Self {
            seconds_since_epoch: seconds,
            nanoseconds: 0,
        }
    }

    pub fn to_rfc3339(&self) -> String {
        i64::try_from(self.seconds_since_epoch)
            .ok()
            .and_then(|secs| chrono::DateTime::from_timestamp(secs, self.nanoseconds))
            .map(|d| d.to_rfc3339())
            .unwrap_or_else(|| "invalid".to_string())
    }
}

impl From<chrono::DateTime<chrono::Utc>> for Timestamp {
    fn from(dt: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            seconds_since_epoch: u64::try_from(dt.timestamp()).unwrap_or(0),
            nanoseconds: dt.timestamp_subsec_nanos(),
        }
    }
}

// ---------------------------------------------------------------------------
// Identity — account address: "0x" + 40 hex digits, stored lowercase
// ---------------------------------------------------------------------------

/// An authenticated account identity.
///
/// Parsing is case-insensitive and normalises to lowercase, so two spellings
/// of the same address compare equal. The all-zero address is rejected: it is
/// the conventional "nobody" account and can never hold or issue anything.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    const HEX_LEN: usize = 40;

    pub fn parse(value: impl AsRef<str>) -> Result<Self, CoreError> {
        let value = value.as_ref().trim();
        let digits = value
            .strip_prefix("0x")
            .or_else(|| value.strip_prefix("0X"))
            .ok_or_else(|| CoreError::InvalidIdentity("identity must start with 0x".into()))?;
        if digits.len() != Self::HEX_LEN {
            return Err(CoreError::InvalidIdentity(format!(
                "identity must have {} hex digits, got {}",
                Self::HEX_LEN,
                digits.len()
            )));
        }
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CoreError::InvalidIdentity(
                "identity must be hexadecimal".into(),
            ));
        }
        if digits.chars().all(|c| c == '0') {
            return Err(CoreError::InvalidIdentity(
                "the zero address is not a valid identity".into(),
            ));
        }
        Ok(Self(format!("0x{}", digits.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Identity {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Identity {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Identity> for String {
    fn from(id: Identity) -> Self {
        id.0
    }
}

// ---------------------------------------------------------------------------
// CertificateId — sequential, starts at 1, never reused
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CertificateId(pub u64);

impl CertificateId {
    pub const FIRST: CertificateId = CertificateId(1);

    pub fn value(self) -> u64 {
        self.0
    }

    /// The id assigned after this one.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for CertificateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for CertificateId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

// ---------------------------------------------------------------------------
// ContentHash — SHA-256 of the certificate file
// ---------------------------------------------------------------------------

/// Fixed-width digest of the file a certificate is bound to.
///
/// Textual form is 64 hex digits with an optional `0x` prefix on input;
/// output always carries the prefix.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    /// Hash raw file content.
    pub fn of_bytes(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Self(out)
    }

    pub fn parse(value: impl AsRef<str>) -> Result<Self, CoreError> {
        let value = value.as_ref().trim();
        let digits = value
            .strip_prefix("0x")
            .or_else(|| value.strip_prefix("0X"))
            .unwrap_or(value);
        let bytes = hex::decode(digits)
            .map_err(|e| CoreError::InvalidContentHash(format!("not hex: {}", e)))?;
        let arr: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            CoreError::InvalidContentHash(format!("expected 32 bytes, got {}", v.len()))
        })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", hex::encode(&self.0[..8]))
    }
}

impl FromStr for ContentHash {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ContentHash> for String {
    fn from(h: ContentHash) -> Self {
        h.to_hex()
    }
}

// ---------------------------------------------------------------------------
// AuditEventKind — types of events in the audit chain
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEventKind {
    IssuerRegistered {
        identity: Identity,
        name: String,
    },
    IssuerRevoked {
        identity: Identity,
    },
    CertificateMinted {
        certificate_id: CertificateId,
        issuer: Identity,
        holder: Identity,
        expiration_timestamp: u64,
    },
    CertificateRevoked {
        certificate_id: CertificateId,
        revoked_by: Identity,
    },
    CertificateExpired {
        certificate_id: CertificateId,
        /// `None` when the scheduler committed the expiry.
        triggered_by: Option<Identity>,
    },
    /// A sweep left a certificate alone because it went stale between
    /// check and commit.
    SweepSkipped {
        certificate_id: CertificateId,
        reason: String,
    },
}

impl AuditEventKind {
    /// Short stable label, used for log lines and listing filters.
    pub fn label(&self) -> &'static str {
        match self {
            AuditEventKind::IssuerRegistered { .. } => "issuer_registered",
            AuditEventKind::IssuerRevoked { .. } => "issuer_revoked",
            AuditEventKind::CertificateMinted { .. } => "certificate_minted",
            AuditEventKind::CertificateRevoked { .. } => "certificate_revoked",
            AuditEventKind::CertificateExpired { .. } => "certificate_expired",
            AuditEventKind::SweepSkipped { .. } => "sweep_skipped",
        }
    }
}

// ---------------------------------------------------------------------------
// AuditHash — hash of an audit entry (for chain integrity)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuditHash(#[serde(with = "hex_bytes")] pub [u8; 32]);

impl fmt::Display for AuditHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

mod hex_bytes {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S, const N: usize>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom(format!("expected {} bytes", N)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str = "0x1111111111111111111111111111111111111111";

    #[test]
    fn test_timestamp_ordering() {
        let t1 = Timestamp::from_seconds(100);
        let t2 = Timestamp::from_seconds(200);
        assert!(t1 < t2);
    }

    #[test]
    fn test_timestamp_rfc3339() {
        let ts = Timestamp::from_seconds(0);
        assert!(ts.to_rfc3339().starts_with("1970-01-01T00:00:00"));
    }

    #[test]
    fn test_identity_normalises_case() {
        let upper = Identity::parse("0xABCDEFabcdef0123456789abcdef0123456789AB").unwrap();
        let lower = Identity::parse("0xabcdefabcdef0123456789abcdef0123456789ab").unwrap();
        assert_eq!(upper, lower);
        assert_eq!(upper.as_str(), "0xabcdefabcdef0123456789abcdef0123456789ab");
    }

    #[test]
    fn test_identity_rejects_malformed() {
        assert!(Identity::parse("1111111111111111111111111111111111111111").is_err());
        assert!(Identity::parse("0x1234").is_err());
        assert!(Identity::parse("0xzz11111111111111111111111111111111111111").is_err());
        assert!(Identity::parse("").is_err());
    }

    #[test]
    fn test_identity_rejects_zero_address() {
        let err = Identity::parse("0x0000000000000000000000000000000000000000").unwrap_err();
        assert!(matches!(err, CoreError::InvalidIdentity(_)));
    }

    #[test]
    fn test_identity_serde_validates() {
        let id: Identity = serde_json::from_str(&format!("\"{}\"", ALICE)).unwrap();
        assert_eq!(id.as_str(), ALICE);
        assert!(serde_json::from_str::<Identity>("\"alice\"").is_err());
    }

    #[test]
    fn test_certificate_id_next() {
        assert_eq!(CertificateId::FIRST.next(), CertificateId(2));
        assert_eq!(CertificateId(u64::MAX).next(), CertificateId(u64::MAX));
    }

    #[test]
    fn test_content_hash_of_bytes_is_sha256() {
        // SHA-256("abc")
        let h = ContentHash::of_bytes(b"abc");
        assert_eq!(
            h.to_hex(),
            "0xba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_content_hash_parse_with_and_without_prefix() {
        let digits = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
        let a = ContentHash::parse(digits).unwrap();
        let b = ContentHash::parse(format!("0x{}", digits)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_content_hash_parse_wrong_width() {
        let err = ContentHash::parse("0xdeadbeef").unwrap_err();
        assert!(matches!(err, CoreError::InvalidContentHash(_)));
        assert!(ContentHash::parse("0xnothex").is_err());
    }

    #[test]
    fn test_audit_event_kind_labels() {
        let kind = AuditEventKind::CertificateExpired {
            certificate_id: CertificateId(3),
            triggered_by: None,
        };
        assert_eq!(kind.label(), "certificate_expired");
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["event"], "certificate_expired");
        assert_eq!(json["certificate_id"], 3);
    }
}
