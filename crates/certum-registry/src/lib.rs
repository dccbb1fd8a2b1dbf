//! Certum Registry
//!
//! Lifecycle engine for issued certificates. Issuers are admitted and
//! removed by a single superadmin; each certificate moves from `Active` to
//! either `Revoked` or `Expired` exactly once and never back.
//!
//! Two indexes sit next to the record store: a swap-remove index of active
//! ids for bounded enumeration, and a content-hash index for verifiers.
//! Expiry is split into a pure deadline check and a committed transition,
//! driven by an external timer through `ExpirationScheduler`.
//!
//! Every mutation is written to the hash-chained audit log before it is
//! applied.

pub mod access;
pub mod active_index;
pub mod audit;
pub mod error;
pub mod registry;
pub mod scheduler;
pub mod status;
pub mod store;
pub mod types;
pub mod verification;

pub use access::AccessController;
pub use active_index::ActiveIndex;
pub use audit::{AuditChain, AuditEntry};
pub use error::{RegistryError, RegistryErrorDetail, RegistryResult};
pub use registry::Registry;
pub use scheduler::ExpirationScheduler;
pub use status::is_valid_transition;
pub use store::CertificateStore;
pub use types::*;
pub use verification::VerificationIndex;
