//! SHA-256 helpers and API token generation

use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::models::types::ApiKeyTier;
use crate::utils::constants::{KEY_PREFIX_LEN, TOKEN_RANDOM_BYTES};

/// Lower-case hex SHA-256 of `input`
pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Content hash recorded on stored scans
#[inline]
pub fn hash_source(source: &str) -> String {
    sha256_hex(source)
}

/// Stored hash of a bearer token
#[inline]
pub fn hash_api_token(token: &str) -> String {
    sha256_hex(token)
}

/// `<prefix>_<tier>_<48 hex chars>`
pub fn generate_api_token(prefix: &str, tier: ApiKeyTier) -> String {
    let mut bytes = [0u8; TOKEN_RANDOM_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}_{}_{}", prefix, tier, hex::encode(bytes))
}

/// Visible prefix kept next to the hash
pub fn token_prefix(token: &str) -> String {
    token.chars().take(KEY_PREFIX_LEN).collect()
}
