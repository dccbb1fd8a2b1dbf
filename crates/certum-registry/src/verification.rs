//! Content-hash verification index.
//!
//! Entries are written once at issuance and never removed: the index attests
//! that a file was registered under an id, not that the certificate is still
//! valid.

use certum_core::{CertificateId, ContentHash};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct VerificationIndex {
    by_hash: HashMap<ContentHash, CertificateId>,
}

impl VerificationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, hash: &ContentHash) -> Option<CertificateId> {
        self.by_hash.get(hash).copied()
    }

    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.by_hash.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }

    /// Bind `hash` to `id`. An existing binding is never overwritten;
    /// returns false in that case.
    pub(crate) fn insert(&mut self, hash: ContentHash, id: CertificateId) -> bool {
        if self.by_hash.contains_key(&hash) {
            return false;
        }
        self.by_hash.insert(hash, id);
        true
    }
}
