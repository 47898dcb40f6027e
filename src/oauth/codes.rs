//! Stateless signed authorization codes.
//!
//! The code handed to the client is a signed token carrying the whole grant:
//! who approved it, which client and redirect URI it is bound to, and the
//! proof of possession the redemption must present. On `/token` the server
//! verifies the signature and expiry and checks the bindings. There is no
//! code table to look up or delete from.
//!
//! The one optional piece of state is [`RedeemedCodes`], which remembers the
//! `jti` of redeemed codes until they expire so a code cannot be exchanged
//! twice within its lifetime.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use super::jwt::TokenClaims;

/// Grant context embedded in an authorization code.
///
/// `code_challenge` and `client_secret` are omitted from the token, not
/// serialized as null, when the authorization request did not use them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationCodeClaims {
    pub sub: String,
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub jti: String,
}

impl TokenClaims for AuthorizationCodeClaims {
    const TYPE: &'static str = "code+jwt";
}

/// Random 128-bit identifier, hex encoded.
pub fn random_id() -> String {
    let bytes: [u8; 16] = rand::random();
    hex::encode(bytes)
}

/// Code identifiers already exchanged, each kept until its code can no longer
/// verify.
#[derive(Debug, Default)]
pub struct RedeemedCodes {
    seen: Mutex<HashMap<String, u64>>,
}

impl RedeemedCodes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a redemption. Returns `false` if `jti` was already redeemed.
    ///
    /// `forget_after` is the last unix second at which the code could still
    /// pass verification. Entries past that are pruned on every call.
    pub fn redeem(&self, jti: &str, forget_after: u64, now: u64) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        seen.retain(|_, until| *until >= now);
        if seen.contains_key(jti) {
            return false;
        }
        seen.insert(jti.to_string(), forget_after);
        true
    }

    pub fn len(&self) -> usize {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
