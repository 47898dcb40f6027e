//! Which proof-of-possession mechanisms bind a code to its requester.

use constant_time_eq::constant_time_eq;
use serde::Deserialize;

use super::codes::AuthorizationCodeClaims;
use super::error::{
    OAuthError, CLIENT_SECRET_MISMATCH, PKCE_FAILED, PROOF_NOT_BOUND, PROOF_REQUIRED,
};
use super::pkce;
use super::validate::{AuthorizationRequest, Proof};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofMechanism {
    Pkce,
    ClientSecret,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofPolicy {
    pkce: bool,
    client_secret: bool,
    require_proof: bool,
}

impl Default for ProofPolicy {
    /// Both mechanisms allowed, neither mandatory at authorization time.
    fn default() -> Self {
        Self {
            pkce: true,
            client_secret: true,
            require_proof: false,
        }
    }
}

impl ProofPolicy {
    pub fn new(allowed: &[ProofMechanism], require_proof: bool) -> Self {
        Self {
            pkce: allowed.contains(&ProofMechanism::Pkce),
            client_secret: allowed.contains(&ProofMechanism::ClientSecret),
            require_proof,
        }
    }

    pub fn allows(&self, mechanism: ProofMechanism) -> bool {
        match mechanism {
            ProofMechanism::Pkce => self.pkce,
            ProofMechanism::ClientSecret => self.client_secret,
        }
    }

    /// Reject authorization requests that use a disabled mechanism, or no
    /// mechanism at all when one is required.
    pub fn check_authorization(&self, request: &AuthorizationRequest) -> Result<(), OAuthError> {
        if request.code_challenge.is_some() && !self.pkce {
            return Err(OAuthError::invalid_request(
                "code_challenge: PKCE is not supported",
            ));
        }
        if request.client_secret.is_some() && !self.client_secret {
            return Err(OAuthError::invalid_request(
                "client_secret: client secrets are not supported",
            ));
        }
        if self.require_proof && request.code_challenge.is_none() && request.client_secret.is_none()
        {
            let description = if self.pkce && self.client_secret {
                "Either code_challenge or client_secret is required"
            } else if self.pkce {
                "code_challenge: Required"
            } else {
                "client_secret: Required"
            };
            return Err(OAuthError::invalid_request(description));
        }
        Ok(())
    }

    /// Check the token request's proof against what the code was bound to.
    ///
    /// A stored client secret takes precedence over a stored challenge. A
    /// code bound to neither can never be redeemed.
    pub fn check_redemption(
        &self,
        grant: &AuthorizationCodeClaims,
        proof: Option<&Proof>,
    ) -> Result<(), OAuthError> {
        if let Some(stored) = &grant.client_secret {
            return match proof {
                Some(Proof::ClientSecret(secret))
                    if self.client_secret
                        && constant_time_eq(secret.as_bytes(), stored.as_bytes()) =>
                {
                    Ok(())
                }
                _ => Err(OAuthError::InvalidGrant(CLIENT_SECRET_MISMATCH)),
            };
        }

        if let Some(challenge) = &grant.code_challenge {
            return match proof {
                Some(Proof::CodeVerifier(verifier))
                    if self.pkce && pkce::verify(verifier, challenge) =>
                {
                    Ok(())
                }
                _ => Err(OAuthError::InvalidGrant(PKCE_FAILED)),
            };
        }

        match proof {
            None => Err(OAuthError::invalid_request(PROOF_REQUIRED)),
            Some(_) => Err(OAuthError::InvalidGrant(PROOF_NOT_BOUND)),
        }
    }
}
