// web-server/src/utils/token.rs
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

/// Random alphanumeric string from the thread-local CSPRNG
pub fn generate_secure_token(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

pub fn hash_string(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Opaque browser session token. Doubles as the identity store key, so it
/// must never be derivable from anything the browser sends.
pub fn create_session_token() -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();

    hash_string(&format!("{}-{}", timestamp, generate_secure_token(32)))
}
