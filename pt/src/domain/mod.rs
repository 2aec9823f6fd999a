//! Domain types for Petitioner
//!
//! The draft being edited, the petition records produced from it, and the
//! account/profile documents kept for each identity. Persisted types
//! implement the Record trait for PetitionStore.

mod account;
mod draft;
mod id;
mod petition;
mod profile;

pub use account::{CustomToken, UserAccount};
pub use draft::{CaseType, Defendant, Draft, Lawyer, Plaintiff};
pub use id::{generate_id, generate_token};
pub use petition::{PetitionRecord, PetitionStatus};
pub use profile::{DEFAULT_PLAN, Profile};

// Re-export petitionstore types for convenience
pub use petitionstore::{Filter, FilterOp, IndexValue, Record, Store, now_ms};
