//! OAuth 2.0 authorization code flow with self-contained signed codes.

pub mod access;
pub mod codes;
pub mod error;
pub mod jwt;
pub mod pkce;
pub mod policy;
pub mod validate;

pub use access::{AccessTokenClaims, TokenResponse};
pub use codes::{AuthorizationCodeClaims, RedeemedCodes};
pub use error::OAuthError;
pub use jwt::{CodecConfig, ExpiresIn, Signed, TokenCodec, VerifyError};
pub use policy::{ProofMechanism, ProofPolicy};
pub use validate::{AuthorizationRequest, Params, Proof, TokenRequest, ValidationErrors};
