//! HS256 signed JWTs.
//!
//! Both the authorization code and the access token are tokens of this shape,
//! so no server-side record of either exists. Everything the redemption check
//! needs travels inside the signed payload.
//!
//! The header is `{"typ":<claim set type>,"alg":"HS256"}`. The payload is the
//! caller's claims flattened next to `iss`, `aud`, `iat` and `exp`, all
//! injected by the codec.

use std::str::FromStr;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// The only algorithm this codec signs with or accepts.
pub const ALGORITHM: Algorithm = Algorithm::HS256;

/// Tokens stay valid this many seconds past their nominal `exp`.
pub const CLOCK_SKEW_SECS: u64 = 5 * 60;

/// A claim set that can be carried in a signed token.
///
/// `TYPE` lands in the header's `typ` field and is checked on verify, so a
/// token minted for one purpose never decodes as another.
pub trait TokenClaims: Serialize + DeserializeOwned + Clone {
    const TYPE: &'static str;
}

/// Token lifetime in whole seconds.
///
/// Parses `"90"`, `"30s"`, `"10m"`, `"24h"` or `"7d"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiresIn(u64);

impl ExpiresIn {
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    pub const fn as_secs(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid duration '{0}': expected a number of seconds or <n>s, <n>m, <n>h, <n>d")]
pub struct DurationError(String);

impl FromStr for ExpiresIn {
    type Err = DurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        static PATTERN: OnceLock<regex_lite::Regex> = OnceLock::new();
        let pattern = PATTERN.get_or_init(|| {
            regex_lite::Regex::new(r"^\s*(\d+)\s*([smhd]?)\s*$").expect("duration pattern is valid")
        });

        let caps = pattern
            .captures(s)
            .ok_or_else(|| DurationError(s.to_string()))?;
        let value: u64 = caps[1].parse().map_err(|_| DurationError(s.to_string()))?;
        let unit = match &caps[2] {
            "" | "s" => 1,
            "m" => 60,
            "h" => 60 * 60,
            _ => 24 * 60 * 60,
        };
        value
            .checked_mul(unit)
            .map(Self)
            .ok_or_else(|| DurationError(s.to_string()))
    }
}

/// Secret and fixed identity values the codec is built from.
#[derive(Clone)]
pub struct CodecConfig {
    pub secret: Vec<u8>,
    pub issuer: String,
    pub audience: String,
}

impl std::fmt::Debug for CodecConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish()
    }
}

/// A verified token: the caller's claims plus the values the codec injected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signed<C> {
    pub iss: String,
    pub aud: String,
    pub iat: u64,
    pub exp: u64,
    #[serde(flatten)]
    pub claims: C,
}

#[derive(Debug, thiserror::Error)]
pub enum SignError {
    #[error("failed to encode token: {0}")]
    Encode(#[from] jsonwebtoken::errors::Error),
    #[error("system time error: {0}")]
    Clock(#[from] std::time::SystemTimeError),
    #[error("expiry overflows the timestamp range")]
    ExpiryOverflow,
}

/// Why a token was rejected. Never carries a partial payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("token is not three base64url segments")]
    Malformed,
    #[error("algorithm '{0}' is not allowed")]
    UnsupportedAlgorithm(String),
    #[error("token type '{0}' was not expected here")]
    WrongType(String),
    #[error("signature does not match")]
    BadSignature,
    #[error("claims are missing or malformed")]
    InvalidClaims,
    #[error("issuer does not match")]
    IssuerMismatch,
    #[error("audience does not match")]
    AudienceMismatch,
    #[error("token expired")]
    Expired,
}

impl From<jsonwebtoken::errors::Error> for VerifyError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => Self::BadSignature,
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidIssuer => Self::IssuerMismatch,
            ErrorKind::InvalidAudience => Self::AudienceMismatch,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                Self::UnsupportedAlgorithm(err.to_string())
            }
            ErrorKind::Json(_) | ErrorKind::MissingRequiredClaim(_) => Self::InvalidClaims,
            _ => Self::Malformed,
        }
    }
}

/// Current unix time in whole seconds.
pub fn unix_now() -> Result<u64, std::time::SystemTimeError> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

/// Signs and verifies tokens for one issuer/audience pair.
#[derive(Debug, Clone)]
pub struct TokenCodec {
    config: CodecConfig,
}

impl TokenCodec {
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn issuer(&self) -> &str {
        &self.config.issuer
    }

    pub fn audience(&self) -> &str {
        &self.config.audience
    }

    pub fn sign<C: TokenClaims>(&self, claims: &C, expires_in: ExpiresIn) -> Result<String, SignError> {
        self.sign_at(claims, expires_in, unix_now()?)
    }

    /// Sign with an explicit issued-at time. Deterministic for identical inputs.
    pub fn sign_at<C: TokenClaims>(
        &self,
        claims: &C,
        expires_in: ExpiresIn,
        now: u64,
    ) -> Result<String, SignError> {
        let mut header = Header::new(ALGORITHM);
        header.typ = Some(C::TYPE.to_string());

        let payload = Signed {
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            iat: now,
            exp: now
                .checked_add(expires_in.as_secs())
                .ok_or(SignError::ExpiryOverflow)?,
            claims,
        };

        Ok(encode(
            &header,
            &payload,
            &EncodingKey::from_secret(&self.config.secret),
        )?)
    }

    /// Verify against the system clock.
    pub fn verify<C: TokenClaims>(&self, token: &str) -> Result<Signed<C>, VerifyError> {
        let mut validation = self.validation();
        validation.validate_exp = true;
        self.decode_signed(token, &validation)
    }

    /// Verify against an explicit current time.
    ///
    /// Checks run in order: structure, algorithm allow-list, token type,
    /// signature, claim shape, issuer, audience, expiry (with skew tolerance).
    pub fn verify_at<C: TokenClaims>(&self, token: &str, now: u64) -> Result<Signed<C>, VerifyError> {
        let validation = self.validation();
        let signed: Signed<C> = self.decode_signed(token, &validation)?;
        if now > signed.exp.saturating_add(validation.leeway) {
            return Err(VerifyError::Expired);
        }
        Ok(signed)
    }

    /// HS256 only, bound to our issuer and audience. Expiry is left to the
    /// caller so `verify_at` can supply its own clock.
    fn validation(&self) -> Validation {
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = CLOCK_SKEW_SECS;
        validation.validate_exp = false;
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation
    }

    fn decode_signed<C: TokenClaims>(
        &self,
        token: &str,
        validation: &Validation,
    ) -> Result<Signed<C>, VerifyError> {
        let header = decode_header(token).map_err(|_| VerifyError::Malformed)?;
        if header.alg != ALGORITHM {
            return Err(VerifyError::UnsupportedAlgorithm(format!("{:?}", header.alg)));
        }
        if header.typ.as_deref() != Some(C::TYPE) {
            return Err(VerifyError::WrongType(header.typ.unwrap_or_default()));
        }

        let data = decode::<Signed<C>>(
            token,
            &DecodingKey::from_secret(&self.config.secret),
            validation,
        )?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestClaims {
        sub: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    }

    impl TokenClaims for TestClaims {
        const TYPE: &'static str = "test+jwt";
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct OtherClaims {
        sub: String,
    }

    impl TokenClaims for OtherClaims {
        const TYPE: &'static str = "other+jwt";
    }

    const NOW: u64 = 1_700_000_000;

    fn codec() -> TokenCodec {
        TokenCodec::new(CodecConfig {
            secret: vec![0xAA; 32],
            issuer: "https://auth.example.com".to_string(),
            audience: "https://api.example.com".to_string(),
        })
    }

    fn claims() -> TestClaims {
        TestClaims {
            sub: "user-1".to_string(),
            note: Some("hello".to_string()),
        }
    }

    #[test]
    fn test_round_trip_returns_claims_and_injected_fields() {
        let codec = codec();
        let token = codec.sign_at(&claims(), "1h".parse().unwrap(), NOW).unwrap();

        let signed: Signed<TestClaims> = codec.verify_at(&token, NOW + 10).unwrap();
        assert_eq!(signed.claims, claims());
        assert_eq!(signed.iss, "https://auth.example.com");
        assert_eq!(signed.aud, "https://api.example.com");
        assert_eq!(signed.iat, NOW);
        assert_eq!(signed.exp, NOW + 3600);
    }

    #[test]
    fn test_absent_optional_claims_round_trip_as_none() {
        let codec = codec();
        let bare = TestClaims {
            sub: "user-2".to_string(),
            note: None,
        };
        let token = codec.sign_at(&bare, ExpiresIn::from_secs(60), NOW).unwrap();

        let payload = token.split('.').nth(1).unwrap();
        let json = String::from_utf8(URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap();
        assert!(!json.contains("note"));

        let signed: Signed<TestClaims> = codec.verify_at(&token, NOW).unwrap();
        assert_eq!(signed.claims.note, None);
    }

    #[test]
    fn test_signing_is_deterministic() {
        let codec = codec();
        let a = codec.sign_at(&claims(), ExpiresIn::from_secs(60), NOW).unwrap();
        let b = codec.sign_at(&claims(), ExpiresIn::from_secs(60), NOW).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_any_altered_byte_is_rejected() {
        let codec = codec();
        let token = codec.sign_at(&claims(), ExpiresIn::from_secs(600), NOW).unwrap();

        for i in 0..token.len() {
            let mut bytes = token.clone().into_bytes();
            bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
            let altered = String::from_utf8(bytes).unwrap();
            assert!(
                codec.verify_at::<TestClaims>(&altered, NOW).is_err(),
                "altered byte {i} was accepted"
            );
        }
    }

    #[test]
    fn test_expiry_respects_skew_window() {
        let codec = codec();
        let token = codec.sign_at(&claims(), ExpiresIn::from_secs(600), NOW).unwrap();
        let exp = NOW + 600;

        assert!(codec.verify_at::<TestClaims>(&token, exp + 1).is_ok());
        assert!(codec.verify_at::<TestClaims>(&token, exp + CLOCK_SKEW_SECS).is_ok());
        assert_eq!(
            codec.verify_at::<TestClaims>(&token, exp + CLOCK_SKEW_SECS + 1),
            Err(VerifyError::Expired)
        );
    }

    #[test]
    fn test_wrong_secret_fails() {
        let token = codec().sign_at(&claims(), ExpiresIn::from_secs(60), NOW).unwrap();
        let other = TokenCodec::new(CodecConfig {
            secret: vec![0xBB; 32],
            ..codec().config
        });
        assert_eq!(
            other.verify_at::<TestClaims>(&token, NOW),
            Err(VerifyError::BadSignature)
        );
    }

    #[test]
    fn test_issuer_and_audience_are_checked() {
        let token = codec().sign_at(&claims(), ExpiresIn::from_secs(60), NOW).unwrap();

        let other_issuer = TokenCodec::new(CodecConfig {
            issuer: "https://elsewhere.example.com".to_string(),
            ..codec().config
        });
        assert_eq!(
            other_issuer.verify_at::<TestClaims>(&token, NOW),
            Err(VerifyError::IssuerMismatch)
        );

        let other_audience = TokenCodec::new(CodecConfig {
            audience: "https://other-api.example.com".to_string(),
            ..codec().config
        });
        assert_eq!(
            other_audience.verify_at::<TestClaims>(&token, NOW),
            Err(VerifyError::AudienceMismatch)
        );
    }

    #[test]
    fn test_alg_none_is_rejected() {
        let codec = codec();
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"test+jwt"}"#);
        let payload = URL_SAFE_NO_PAD.encode(
            format!(
                r#"{{"iss":"https://auth.example.com","aud":"https://api.example.com","iat":{NOW},"exp":{},"sub":"attacker"}}"#,
                NOW + 600
            )
            .as_bytes(),
        );
        let forged = format!("{header}.{payload}.");

        // "none" is not an algorithm the header parser knows
        assert_eq!(
            codec.verify_at::<TestClaims>(&forged, NOW),
            Err(VerifyError::Malformed)
        );
    }

    #[test]
    fn test_other_hmac_algorithms_are_rejected() {
        let codec = codec();
        let mut header = Header::new(Algorithm::HS512);
        header.typ = Some(TestClaims::TYPE.to_string());
        let payload = Signed {
            iss: "https://auth.example.com".to_string(),
            aud: "https://api.example.com".to_string(),
            iat: NOW,
            exp: NOW + 600,
            claims: claims(),
        };
        let forged = encode(&header, &payload, &EncodingKey::from_secret(&[0xAA; 32])).unwrap();

        assert_eq!(
            codec.verify_at::<TestClaims>(&forged, NOW),
            Err(VerifyError::UnsupportedAlgorithm("HS512".to_string()))
        );
    }

    #[test]
    fn test_header_carries_claim_set_type() {
        let token = codec().sign_at(&claims(), ExpiresIn::from_secs(60), NOW).unwrap();
        let header = decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::HS256);
        assert_eq!(header.typ.as_deref(), Some("test+jwt"));
    }

    #[test]
    fn test_system_clock_verify_rejects_expired_token() {
        let codec = codec();
        let now = unix_now().unwrap();

        let fresh = codec.sign_at(&claims(), ExpiresIn::from_secs(60), now).unwrap();
        assert!(codec.verify::<TestClaims>(&fresh).is_ok());

        let stale = codec
            .sign_at(&claims(), ExpiresIn::from_secs(60), now - 60 - CLOCK_SKEW_SECS - 30)
            .unwrap();
        assert_eq!(
            codec.verify::<TestClaims>(&stale),
            Err(VerifyError::Expired)
        );

        let within_skew = codec
            .sign_at(&claims(), ExpiresIn::from_secs(60), now - 60 - CLOCK_SKEW_SECS + 30)
            .unwrap();
        assert!(codec.verify::<TestClaims>(&within_skew).is_ok());
    }

    #[test]
    fn test_token_type_is_enforced() {
        let codec = codec();
        let token = codec.sign_at(&claims(), ExpiresIn::from_secs(60), NOW).unwrap();
        assert_eq!(
            codec.verify_at::<OtherClaims>(&token, NOW).unwrap_err(),
            VerifyError::WrongType("test+jwt".to_string())
        );
    }

    #[test]
    fn test_garbage_input_fails() {
        let codec = codec();
        for garbage in ["", "abc", "a.b", "a.b.c.d", "!!!.???.***", "e30.e30.e30"] {
            assert!(codec.verify_at::<TestClaims>(garbage, NOW).is_err(), "{garbage}");
        }
    }

    #[test]
    fn test_parse_durations() {
        assert_eq!("90".parse::<ExpiresIn>().unwrap().as_secs(), 90);
        assert_eq!("30s".parse::<ExpiresIn>().unwrap().as_secs(), 30);
        assert_eq!("10m".parse::<ExpiresIn>().unwrap().as_secs(), 600);
        assert_eq!("24h".parse::<ExpiresIn>().unwrap().as_secs(), 86_400);
        assert_eq!("7d".parse::<ExpiresIn>().unwrap().as_secs(), 604_800);
        assert!("".parse::<ExpiresIn>().is_err());
        assert!("10 minutes".parse::<ExpiresIn>().is_err());
        assert!("-5m".parse::<ExpiresIn>().is_err());
    }
}
