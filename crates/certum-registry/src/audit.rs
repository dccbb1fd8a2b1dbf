use certum_core::{AuditChainWriter, AuditEvent, AuditHash, CoreError, CoreResult};
use sha2::{Digest, Sha256};
use std::sync::Mutex;

/// Hash-chained append-only audit log.
///
/// Each entry includes the hash of the previous entry for tamper evidence.
/// The chain can be verified by recomputing all hashes from the genesis entry.
pub struct AuditChain {
    entries: Mutex<Vec<AuditEntry>>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct AuditEntry {
    pub event: AuditEvent,
    pub hash: AuditHash,
}

impl AuditChain {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Compute the hash of an audit event including the previous hash.
    fn compute_hash(event: &AuditEvent, previous: Option<&AuditHash>) -> AuditHash {
        let mut hasher = Sha256::new();

        if let Some(prev) = previous {
            hasher.update(prev.0);
        }

        hasher.update(event.timestamp.seconds_since_epoch.to_le_bytes());
        hasher.update(event.timestamp.nanoseconds.to_le_bytes());

        let kind_bytes = serde_json::to_vec(&event.kind).unwrap_or_default();
        hasher.update(&kind_bytes);

        let hash = hasher.finalize();
        let mut result = [0u8; 32];
        result.copy_from_slice(&hash);
        AuditHash(result)
    }

    fn lock(&self) -> CoreResult<std::sync::MutexGuard<'_, Vec<AuditEntry>>> {
        self.entries
            .lock()
            .map_err(|e| CoreError::Audit(format!("audit lock poisoned: {}", e)))
    }
}

impl Default for AuditChain {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditChainWriter for AuditChain {
    fn append(&self, mut event: AuditEvent) -> CoreResult<AuditHash> {
        let mut entries = self.lock()?;

        let previous = entries.last().map(|e| &e.hash);
        event.previous_hash = previous.cloned();

        let hash = Self::compute_hash(&event, previous);

        entries.push(AuditEntry {
            event,
            hash: hash.clone(),
        });

        Ok(hash)
    }

    fn verify_chain(&self) -> CoreResult<bool> {
        let entries = self.lock()?;

        let Some(genesis) = entries.first() else {
            return Ok(true);
        };
        if Self::compute_hash(&genesis.event, None) != genesis.hash {
            return Ok(false);
        }

        for pair in entries.windows(2) {
            let (prev, cur) = (&pair[0], &pair[1]);
            if Self::compute_hash(&cur.event, Some(&prev.hash)) != cur.hash {
                return Ok(false);
            }
            if cur.event.previous_hash.as_ref() != Some(&prev.hash) {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn head(&self) -> CoreResult<Option<AuditHash>> {
        Ok(self.lock()?.last().map(|e| e.hash.clone()))
    }
}

impl AuditChain {
    /// Get the number of entries in the chain.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get all entries (for export).
    pub fn entries(&self) -> CoreResult<Vec<AuditEntry>> {
        Ok(self.lock()?.clone())
    }

    /// The last `limit` entries, oldest first.
    pub fn recent(&self, limit: usize) -> CoreResult<Vec<AuditEntry>> {
        let entries = self.lock()?;
        let start = entries.len().saturating_sub(limit);
        Ok(entries[start..].to_vec())
    }
}
