//! Bearer token extraction.
//!
//! ```rust,ignore
//! use rmcp_oidc::auth::{AuthLayer, BearerAuth};
//!
//! let app = axum::Router::new()
//!     .nest_service("/mcp", service)
//!     .layer(AuthLayer::new(BearerAuth::new(verifier)));
//! ```

use crate::auth::{Authenticator, Rejection, Validator};

/// Bearer token authenticator.
///
/// Extracts the token from `Authorization: Bearer <token>` and passes it
/// to the inner [`Validator`].
#[derive(Clone)]
pub struct BearerAuth<V> {
    validator: V,
}

impl<V> BearerAuth<V> {
    pub fn new(validator: V) -> Self {
        Self { validator }
    }
}

/// The credential of an `Authorization: Bearer` header; the scheme is
/// matched case-insensitively.
pub fn bearer_token(parts: &http::request::Parts) -> Option<&str> {
    let value = parts
        .headers
        .get(http::header::AUTHORIZATION)?
        .to_str()
        .ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

impl<V> Authenticator for BearerAuth<V>
where
    V: Validator,
{
    type Claims = V::Claims;

    async fn authenticate(
        &self,
        parts: &http::request::Parts,
    ) -> Result<Self::Claims, Rejection> {
        let token = bearer_token(parts).ok_or(Rejection::Missing)?;
        self.validator.validate(token).await.ok_or(Rejection::Invalid)
    }
}
