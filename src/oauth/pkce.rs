//! PKCE (Proof Key for Code Exchange) verification, S256 only (RFC 7636).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use constant_time_eq::constant_time_eq;
use sha2::{Digest, Sha256};

/// Derive the S256 challenge for a verifier: `BASE64URL(SHA256(verifier))`.
pub fn challenge_for(code_verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes()))
}

/// Check a verifier against the challenge bound into an authorization code.
///
/// Exact comparison, no case folding.
pub fn verify(code_verifier: &str, stored_challenge: &str) -> bool {
    constant_time_eq(
        challenge_for(code_verifier).as_bytes(),
        stored_challenge.as_bytes(),
    )
}
