//! Who is logged in. Supplied by whatever fronts the authorization endpoint.

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderName};

/// Resolves the authenticated end user for an inbound request.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// The subject identifier of the logged-in user, if any.
    async fn authenticated_subject(&self, headers: &HeaderMap) -> Option<String>;
}

/// Trusts a header set by the login/session layer in front of this service.
///
/// The fronting proxy must strip this header from client requests.
#[derive(Debug, Clone)]
pub struct TrustedHeaderSession {
    header: HeaderName,
}

impl TrustedHeaderSession {
    pub fn new(header: HeaderName) -> Self {
        Self { header }
    }
}

#[async_trait]
impl SessionProvider for TrustedHeaderSession {
    async fn authenticated_subject(&self, headers: &HeaderMap) -> Option<String> {
        let value = headers.get(&self.header)?.to_str().ok()?.trim();
        (!value.is_empty()).then(|| value.to_string())
    }
}

/// Always reports the same subject.
#[derive(Debug, Clone, Default)]
pub struct StaticSession(pub Option<String>);

#[async_trait]
impl SessionProvider for StaticSession {
    async fn authenticated_subject(&self, _headers: &HeaderMap) -> Option<String> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[tokio::test]
    async fn test_trusted_header() {
        let session = TrustedHeaderSession::new(HeaderName::from_static("x-authenticated-user"));

        let mut headers = HeaderMap::new();
        assert_eq!(session.authenticated_subject(&headers).await, None);

        headers.insert("x-authenticated-user", HeaderValue::from_static("   "));
        assert_eq!(session.authenticated_subject(&headers).await, None);

        headers.insert("x-authenticated-user", HeaderValue::from_static("user-42"));
        assert_eq!(
            session.authenticated_subject(&headers).await.as_deref(),
            Some("user-42")
        );
    }

    #[tokio::test]
    async fn test_static_session() {
        let headers = HeaderMap::new();
        assert_eq!(StaticSession(None).authenticated_subject(&headers).await, None);
        assert_eq!(
            StaticSession(Some("u".to_string()))
                .authenticated_subject(&headers)
                .await
                .as_deref(),
            Some("u")
        );
    }
}
