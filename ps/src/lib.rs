//! PetitionStore - document persistence for Petitioner
//!
//! A small document store on top of SQLite. Each record type lives in its own
//! collection as a JSON document, and exposes a set of indexed fields that can
//! be used to filter `list` queries.
//!
//! ```rust,ignore
//! use petitionstore::{Filter, Store};
//!
//! let mut store = Store::open("/tmp/petitions")?;
//! store.create(record)?;
//! let mine: Vec<MyRecord> = store.list(&[Filter::eq("owner", "uid-1")])?;
//! ```

mod record;
mod store;

pub use record::{Filter, FilterOp, IndexValue, Record, now_ms};
pub use store::{DB_FILE_NAME, Store};
