use sha2::{Digest, Sha256};

/// SHA-256 hex digest of an API key or session token.
///
/// Raw credentials are never stored; both `api_keys.key_hash` and
/// `auth_sessions.token_hash` hold this digest.
pub fn hash_secret(raw: &str) -> String {
    let hash = Sha256::digest(raw.as_bytes());
    hex::encode(hash)
}
