//! ID generation for tasks.

use chrono::{DateTime, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Prefix shared by every generated task ID.
pub const ID_PREFIX: &str = "t-";

/// Issue an ID for a task created at `created_at`.
///
/// The title and creation time are salted with random bytes, so tasks created in the same
/// tick with the same title still get different IDs.
pub fn generate_id(title: &str, created_at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(created_at.timestamp_nanos_opt().unwrap_or(0).to_le_bytes());
    hasher.update(rand::rng().random::<[u8; 8]>());
    let hash = hasher.finalize();
    // First 6 bytes of the digest
    format!(
        "{}{:012x}",
        ID_PREFIX,
        u64::from_be_bytes([0, 0, hash[0], hash[1], hash[2], hash[3], hash[4], hash[5]])
    )
}
