//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

/// Initial petition prompt
pub const PETITION: &str = include_str!("../../prompts/petition.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "petition" => Some(PETITION),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}
