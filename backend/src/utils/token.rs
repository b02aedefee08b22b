//! Opaque secret generation and one-way lookup ids.
//!
//! Bearer secrets (session secrets, booking cancellation secrets) are only ever
//! handed to the client. The store keeps `derive_lookup_id(secret)` and
//! verification compares lookup ids in constant time.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Random bytes per secret (256 bits).
pub const TOKEN_BYTES: usize = 32;

/// Generates a URL-safe secret from the operating system CSPRNG.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generates a secret together with its lookup id.
pub fn generate_secret_with_lookup_id() -> (String, String) {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    let lookup_id = URL_SAFE_NO_PAD.encode(Sha256::digest(bytes));
    (URL_SAFE_NO_PAD.encode(bytes), lookup_id)
}

/// SHA-256 of the secret's raw bytes, re-encoded URL-safe without padding.
///
/// Returns `None` when the secret is not valid URL-safe base64, which callers
/// treat the same as a mismatch.
pub fn derive_lookup_id(secret: &str) -> Option<String> {
    let raw = URL_SAFE_NO_PAD.decode(secret.trim_end_matches('=')).ok()?;
    let digest = Sha256::digest(&raw);
    Some(URL_SAFE_NO_PAD.encode(digest))
}

/// Checks a presented secret against a stored lookup id without leaking timing.
pub fn secret_matches(presented_secret: &str, stored_lookup_id: &str) -> bool {
    let Some(presented) = derive_lookup_id(presented_secret) else {
        return false;
    };
    constant_time_eq(presented.as_bytes(), stored_lookup_id.as_bytes())
}

pub fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    // Length is not secret: lookup ids have a fixed size.
    left.len() == right.len() && bool::from(left.ct_eq(right))
}
