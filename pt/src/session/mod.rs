//! Authentication session
//!
//! `SessionManager` tracks the signed-in identity on top of an
//! `IdentityProvider`: the local store-backed provider or the hosted
//! Identity Toolkit.

mod identity;
mod local;
mod manager;
mod persist;
mod toolkit;

pub use identity::{AuthError, Identity, IdentityProvider};
pub use local::LocalIdentityProvider;
pub use manager::{IdentitySubscription, SessionManager};
pub use persist::{SESSION_FILE_NAME, SessionFile};
pub use toolkit::{IdentityToolkitProvider, map_error_code};
