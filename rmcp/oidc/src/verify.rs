//! Bearer token verification.
//!
//! [`TokenVerifier::verify`] is the only entry point the MCP mount relies
//! on. It resolves the signing key, checks the signature and the standard
//! claims, then normalizes the provider-specific claims into an
//! [`AccessGrant`]. Every failure collapses to `None`; the reason is only
//! logged.

use crate::auth::Validator;
use crate::config::Settings;
use crate::discovery::{DiscoveryCache, DiscoveryDocument};
use crate::error::{Error, Result};
use crate::jwks::{JwksSource, KeyResolver};
use jsonwebtoken::{TokenData, Validation, decode, decode_header, get_current_timestamp};
use serde::Deserialize;
use std::{collections::BTreeSet, sync::Arc};
use tracing::{debug, warn};

/// Sentinel client id for tokens carrying no identifying claim.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// The normalized result of a successful verification.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessGrant {
    pub raw_token: String,
    pub client_id: String,
    pub scopes: BTreeSet<String>,
    /// `exp` in seconds since the epoch, when the token carries one.
    pub expires_at: Option<u64>,
    /// The audience this grant is valid for.
    pub resource: String,
}

impl std::fmt::Debug for AccessGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGrant")
            .field("raw_token", &"<redacted>")
            .field("client_id", &self.client_id)
            .field("scopes", &self.scopes)
            .field("expires_at", &self.expires_at)
            .field("resource", &self.resource)
            .finish()
    }
}

impl AccessGrant {
    /// Whether every scope in `required` was granted.
    pub fn has_scopes<S: AsRef<str>>(&self, required: &[S]) -> bool {
        required.iter().all(|s| self.scopes.contains(s.as_ref()))
    }
}

/// RFC 7519 NumericDate: integral or fractional seconds since the epoch.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(untagged)]
enum NumericDate {
    Seconds(u64),
    Fractional(f64),
}

impl NumericDate {
    fn as_secs(self) -> u64 {
        match self {
            NumericDate::Seconds(secs) => secs,
            NumericDate::Fractional(secs) if secs.is_finite() && secs > 0.0 => secs as u64,
            NumericDate::Fractional(_) => 0,
        }
    }
}

/// `scope` as a space-delimited string, or as a JSON array some providers
/// emit.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScopeClaim {
    Delimited(String),
    List(Vec<String>),
}

impl ScopeClaim {
    fn to_set(&self) -> BTreeSet<String> {
        match self {
            ScopeClaim::Delimited(scope) => scope.split_whitespace().map(String::from).collect(),
            ScopeClaim::List(scopes) => scopes
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        }
    }
}

/// Claims read after `jsonwebtoken` has checked `iss`, `aud`, `exp`, `nbf`.
#[derive(Debug, Default, Deserialize)]
struct GrantClaims {
    sub: Option<String>,
    azp: Option<String>,
    client_id: Option<String>,
    scope: Option<ScopeClaim>,
    permissions: Option<Vec<String>>,
    exp: Option<NumericDate>,
    iat: Option<NumericDate>,
}

impl GrantClaims {
    /// A non-blank `scope` wins over `permissions`; neither yields an
    /// empty set.
    fn scopes(&self) -> BTreeSet<String> {
        let scope = self.scope.as_ref().map(ScopeClaim::to_set).unwrap_or_default();
        if !scope.is_empty() {
            return scope;
        }
        self.permissions
            .iter()
            .flatten()
            .filter(|p| !p.is_empty())
            .cloned()
            .collect()
    }

    fn expires_at(&self) -> Option<u64> {
        self.exp.map(NumericDate::as_secs)
    }

    fn issued_at(&self) -> Option<u64> {
        self.iat.map(NumericDate::as_secs)
    }

    /// `azp`, then `client_id`, then `sub`, then [`UNKNOWN_CLIENT`].
    fn client_id(&self) -> String {
        [&self.azp, &self.client_id, &self.sub]
            .into_iter()
            .flatten()
            .find(|id| !id.is_empty())
            .cloned()
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
    }

    fn into_grant(self, token: &str, resource: &str) -> AccessGrant {
        AccessGrant {
            raw_token: token.to_string(),
            client_id: self.client_id(),
            scopes: self.scopes(),
            expires_at: self.expires_at(),
            resource: resource.to_string(),
        }
    }
}

struct VerifierInner {
    settings: Arc<Settings>,
    discovery: Arc<DiscoveryCache>,
    keys: KeyResolver,
}

/// Verifies bearer tokens issued by the configured identity provider.
#[derive(Clone)]
pub struct TokenVerifier {
    inner: Arc<VerifierInner>,
}

impl TokenVerifier {
    /// Build a verifier sharing `discovery` with the rest of the facade.
    ///
    /// Keys come from the configured JWKS override when set. With a static
    /// issuer discovery is bypassed and the issuer's conventional
    /// `/.well-known/jwks.json` is used; otherwise the discovered `jwks_uri`.
    pub fn new(
        settings: Arc<Settings>,
        discovery: Arc<DiscoveryCache>,
        http: reqwest::Client,
    ) -> Self {
        let source = match (&settings.jwks_uri, &settings.static_issuer) {
            (Some(uri), _) => JwksSource::Url(uri.clone()),
            (None, Some(_)) => JwksSource::Url(settings.fallback_jwks_uri()),
            (None, None) => JwksSource::Discovered {
                fallback: settings.fallback_jwks_uri(),
            },
        };
        Self {
            inner: Arc::new(VerifierInner {
                keys: KeyResolver::new(http, source),
                settings,
                discovery,
            }),
        }
    }

    pub fn key_resolver(&self) -> &KeyResolver {
        &self.inner.keys
    }

    /// Verify `token`, returning `None` for any token that is not valid.
    pub async fn verify(&self, token: &str) -> Option<AccessGrant> {
        match self.try_verify(token).await {
            Ok(grant) => {
                debug!(client_id = %grant.client_id, scopes = ?grant.scopes, "token verified");
                Some(grant)
            }
            Err(e) => {
                warn!(reason = %e, "token verification failed");
                None
            }
        }
    }

    async fn try_verify(&self, token: &str) -> Result<AccessGrant> {
        let settings = &self.inner.settings;
        let header = decode_header(token)?;
        if header.kid.is_none() {
            return Err(Error::TokenRejected("JWT missing kid header".into()));
        }
        if !settings.algorithms.contains(&header.alg) {
            return Err(Error::TokenRejected(format!(
                "algorithm {:?} is not accepted",
                header.alg
            )));
        }

        // One discovery lookup per verification serves both the key source
        // and the issuer.
        let discovered = self.discovered().await;
        let key = self
            .inner
            .keys
            .resolve_key(token, discovered.as_deref())
            .await?;
        if key.algorithm.is_some_and(|alg| alg != header.alg) {
            return Err(Error::TokenRejected(format!(
                "header algorithm {:?} does not match key `{}`",
                header.alg, key.key_id
            )));
        }

        let issuer = self.expected_issuer(discovered.as_deref());
        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[&issuer]);
        validation.set_audience(&[&settings.audience]);
        validation.set_required_spec_claims(&["iss", "aud"]);
        validation.validate_nbf = true;
        validation.leeway = settings.clock_skew.as_secs();

        let data: TokenData<GrantClaims> = decode(token, &key.key, &validation)?;
        let claims = data.claims;

        if let Some(iat) = claims.issued_at() {
            if iat > get_current_timestamp() + validation.leeway {
                return Err(Error::TokenRejected("token issued in the future".into()));
            }
        }

        Ok(claims.into_grant(token, &settings.audience))
    }

    /// The discovery document, unless a static issuer bypasses discovery.
    /// A failed lookup yields `None` and the configured fallbacks apply.
    async fn discovered(&self) -> Option<Arc<DiscoveryDocument>> {
        if self.inner.settings.static_issuer.is_some() {
            return None;
        }
        match self.inner.discovery.get_config().await {
            Ok(doc) => Some(doc),
            Err(e) => {
                warn!(
                    error = %e,
                    "discovery unavailable, using configured issuer and fallback JWKS URI"
                );
                None
            }
        }
    }

    /// The issuer `iss` must match: the static override, else the
    /// discovered issuer, else the configured one.
    fn expected_issuer(&self, discovered: Option<&DiscoveryDocument>) -> String {
        let settings = &self.inner.settings;
        if let Some(ref issuer) = settings.static_issuer {
            return issuer.clone();
        }
        discovered
            .and_then(|doc| doc.issuer.clone())
            .unwrap_or_else(|| settings.issuer.clone())
    }
}

impl Validator for TokenVerifier {
    type Claims = AccessGrant;

    async fn validate(&self, token: &str) -> Option<AccessGrant> {
        self.verify(token).await
    }
}

#[cfg(test)]
mod tests {
    use crate::verify::{AccessGrant, GrantClaims, UNKNOWN_CLIENT};
    use serde_json::json;
    use std::collections::BTreeSet;

    fn claims(value: serde_json::Value) -> GrantClaims {
        serde_json::from_value(value).unwrap()
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn scope_claim_is_split_on_whitespace() {
        let c = claims(json!({ "scope": "read  write" }));
        assert_eq!(c.scopes(), set(&["read", "write"]));
    }

    #[test]
    fn permissions_used_without_scope() {
        let c = claims(json!({ "permissions": ["a", "b"] }));
        assert_eq!(c.scopes(), set(&["a", "b"]));
    }

    #[test]
    fn scope_preferred_over_permissions() {
        let c = claims(json!({ "scope": "read", "permissions": ["admin"] }));
        assert_eq!(c.scopes(), set(&["read"]));
    }

    #[test]
    fn blank_scope_defers_to_permissions() {
        let c = claims(json!({ "scope": "", "permissions": ["a"] }));
        assert_eq!(c.scopes(), set(&["a"]));
        let c = claims(json!({ "scope": "   ", "permissions": ["a"] }));
        assert_eq!(c.scopes(), set(&["a"]));
    }

    #[test]
    fn scope_array_is_accepted() {
        let c = claims(json!({ "scope": ["read", "write", ""] }));
        assert_eq!(c.scopes(), set(&["read", "write"]));
    }

    #[test]
    fn fractional_dates_are_truncated() {
        let c = claims(json!({ "exp": 1_900_000_000.75, "iat": 1_800_000_000.5 }));
        assert_eq!(c.expires_at(), Some(1_900_000_000));
        assert_eq!(c.issued_at(), Some(1_800_000_000));
    }

    #[test]
    fn no_scope_information_is_empty() {
        assert!(claims(json!({ "sub": "u1" })).scopes().is_empty());
    }

    #[test]
    fn client_id_fallback_chain() {
        let c = claims(json!({ "azp": "app", "client_id": "cid", "sub": "user" }));
        assert_eq!(c.client_id(), "app");
        let c = claims(json!({ "client_id": "cid", "sub": "user" }));
        assert_eq!(c.client_id(), "cid");
        let c = claims(json!({ "azp": "", "sub": "user" }));
        assert_eq!(c.client_id(), "user");
        assert_eq!(claims(json!({})).client_id(), UNKNOWN_CLIENT);
    }

    #[test]
    fn grant_keeps_expiry_and_resource() {
        let grant = claims(json!({ "sub": "u1", "exp": 1_900_000_000u64 }))
            .into_grant("tok", "https://mcp.example.com");
        assert_eq!(grant.expires_at, Some(1_900_000_000));
        assert_eq!(grant.resource, "https://mcp.example.com");
        assert_eq!(grant.raw_token, "tok");

        let grant = claims(json!({ "sub": "u1" })).into_grant("tok", "r");
        assert_eq!(grant.expires_at, None);
    }

    #[test]
    fn debug_redacts_token() {
        let grant = AccessGrant {
            raw_token: "secret-token".into(),
            client_id: "c".into(),
            scopes: set(&["read"]),
            expires_at: None,
            resource: "r".into(),
        };
        let printed = format!("{grant:?}");
        assert!(!printed.contains("secret-token"));
        assert!(grant.has_scopes(&["read"]));
        assert!(!grant.has_scopes(&["read", "write"]));
        assert!(grant.has_scopes::<&str>(&[]));
    }
}
