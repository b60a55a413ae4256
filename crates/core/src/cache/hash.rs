//! Body digests for stored entries.

use sha2::{Digest, Sha256};

/// Hex SHA-256 of a stored response body.
pub fn body_digest(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    hex::encode(hasher.finalize())
}
