//! Stateless OAuth 2.0 authorization server.
//!
//! Authorization codes and access tokens are HMAC-signed tokens that carry
//! their own validity claims, so the server keeps no session or code store.

pub mod config;
pub mod oauth;
pub mod routes;
pub mod session;
