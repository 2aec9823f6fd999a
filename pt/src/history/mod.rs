//! History feed
//!
//! Live, read-only view of an identity's petition records. Every
//! subscription emits the full set right away and again after each create
//! that touches that identity.

mod feed;

pub use feed::{HistoryFeed, HistorySubscription, sort_newest_first};
