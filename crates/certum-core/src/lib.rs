//! Certum Core
//!
//! Shared vocabulary for the Certum credential registry: identities,
//! certificate ids, content hashes, timestamps, the injectable clock, and
//! the append-only audit chain interface.

pub mod error;
pub mod traits;
pub mod types;

pub use error::*;
pub use traits::*;
pub use types::*;
