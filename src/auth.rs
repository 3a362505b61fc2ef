use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Fresh random salt for a new credential. Uuid v4 gives 122 bits of
/// randomness without pulling in another crate.
pub fn new_salt() -> String {
    Uuid::new_v4().simple().to_string()
}

/// SHA-256 over `salt:password`, hex-encoded. Plaintext is never stored.
pub fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

pub fn verify_password(salt: &str, stored_hash: &str, candidate: &str) -> bool {
    hash_password(salt, candidate) == stored_hash
}
