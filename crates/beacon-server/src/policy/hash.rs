//! Deterministic change hash of a policy's observable fields.

use beacon_core::{Policy, format_timestamp};
use md5::{Digest, Md5};

const SEPARATOR: &str = "|";

/// Canonical string fed to the digest:
/// `id|name|description|status|version|priority|updatedAt`, absent values empty.
pub fn hash_input(policy: &Policy) -> String {
    let updated_at = format_timestamp(policy.updated_at).unwrap_or_default();
    [
        policy.id.to_string(),
        policy.name.clone(),
        policy.description.clone().unwrap_or_default(),
        policy.status.as_str().to_string(),
        policy.version.clone().unwrap_or_default(),
        policy.priority.to_string(),
        updated_at,
    ]
    .join(SEPARATOR)
}

/// MD5 of [`hash_input`] as 32 lowercase hex characters.
pub fn policy_hash(policy: &Policy) -> String {
    hex::encode(Md5::digest(hash_input(policy).as_bytes()))
}
