//! Record id and token generation

use rand::Rng;

/// Generate a fresh record id
///
/// UUID v7: unique, and lexical order follows creation time.
pub fn generate_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// Generate an opaque 128-bit token, hex encoded
pub fn generate_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
