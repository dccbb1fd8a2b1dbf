use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::CoreResult;
use crate::types::{AuditEventKind, AuditHash, Timestamp};

// ---------------------------------------------------------------------------
// Clock — the registry's only source of "now"
//
// Expiry is evaluated against this clock, never against the wall clock
// directly, so hosts and tests can control time.
// ---------------------------------------------------------------------------

pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Timestamp;

    fn now_secs(&self) -> u64 {
        self.now().seconds_since_epoch
    }
}

/// Production clock backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Manually driven clock with whole-second resolution.
#[derive(Debug, Default)]
pub struct ManualClock {
    seconds: AtomicU64,
}

impl ManualClock {
    pub fn new(seconds: u64) -> Self {
        Self {
            seconds: AtomicU64::new(seconds),
        }
    }

    pub fn advance(&self, seconds: u64) {
        self.seconds.fetch_add(seconds, Ordering::SeqCst);
    }

    pub fn set(&self, seconds: u64) {
        self.seconds.store(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_seconds(self.seconds.load(Ordering::SeqCst))
    }
}

// ---------------------------------------------------------------------------
// AuditChainWriter — append-only hash-chained audit log
//
// Each entry includes the hash of the previous entry for tamper evidence.
// ---------------------------------------------------------------------------

pub trait AuditChainWriter: Send + Sync {
    fn append(&self, event: AuditEvent) -> CoreResult<AuditHash>;
    fn verify_chain(&self) -> CoreResult<bool>;
    fn head(&self) -> CoreResult<Option<AuditHash>>;
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AuditEvent {
    pub timestamp: Timestamp,
    pub kind: AuditEventKind,
    pub previous_hash: Option<AuditHash>,
}

impl AuditEvent {
    pub fn new(timestamp: Timestamp, kind: AuditEventKind) -> Self {
        Self {
            timestamp,
            kind,
            previous_hash: None,
        }
    }
}
