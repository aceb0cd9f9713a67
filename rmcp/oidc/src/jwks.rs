//! Signing-key resolution against the provider's JWKS endpoint.
//!
//! Keys are cached by `kid`. A token naming an unknown `kid` triggers one
//! wholesale refresh of the set (key rotation); a second miss is final.

use crate::discovery::DiscoveryDocument;
use crate::error::{Error, Result};
use jsonwebtoken::{
    Algorithm, DecodingKey,
    jwk::{Jwk, JwkSet, KeyAlgorithm, PublicKeyUse},
};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// A verification key published by the identity provider.
#[derive(Clone)]
pub struct SigningKey {
    pub key_id: String,
    pub key: DecodingKey,
    /// The JWK `alg`, when the provider declares one.
    pub algorithm: Option<Algorithm>,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("key_id", &self.key_id)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl SigningKey {
    /// Build a key from a JWK. Encryption keys and keys without `kid` are
    /// not usable for signature verification.
    pub fn from_jwk(jwk: &Jwk) -> Result<Self> {
        let key_id = jwk
            .common
            .key_id
            .clone()
            .ok_or_else(|| Error::TokenRejected("JWK has no kid".into()))?;
        if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
            return Err(Error::TokenRejected(format!("JWK `{key_id}` is an encryption key")));
        }
        let key = DecodingKey::from_jwk(jwk)?;
        let algorithm = jwk.common.key_algorithm.clone().and_then(signing_algorithm);
        Ok(Self {
            key_id,
            key,
            algorithm,
        })
    }
}

fn signing_algorithm(alg: KeyAlgorithm) -> Option<Algorithm> {
    match alg {
        KeyAlgorithm::HS256 => Some(Algorithm::HS256),
        KeyAlgorithm::HS384 => Some(Algorithm::HS384),
        KeyAlgorithm::HS512 => Some(Algorithm::HS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    }
}

type KeySet = HashMap<String, Arc<SigningKey>>;

/// Index the usable keys of a JWKS document by `kid`.
fn index_keys(jwks: &JwkSet) -> KeySet {
    let mut keys = KeySet::new();
    for jwk in &jwks.keys {
        match SigningKey::from_jwk(jwk) {
            Ok(key) => {
                keys.insert(key.key_id.clone(), Arc::new(key));
            }
            Err(e) => debug!(error = %e, "skipping JWK"),
        }
    }
    keys
}

/// Where the JWKS document is fetched from.
#[derive(Clone, Debug)]
pub enum JwksSource {
    /// A fixed URL.
    Url(String),
    /// The discovered `jwks_uri`, falling back to `fallback` when no
    /// discovery document is at hand or it does not name one.
    Discovered { fallback: String },
}

impl JwksSource {
    fn url(&self, discovered: Option<&DiscoveryDocument>) -> String {
        match self {
            JwksSource::Url(url) => url.clone(),
            JwksSource::Discovered { fallback } => discovered
                .and_then(|doc| doc.jwks_uri.clone())
                .unwrap_or_else(|| fallback.clone()),
        }
    }
}

/// Resolves the signing key for a token, caching the provider's key set.
#[derive(Debug)]
pub struct KeyResolver {
    http: reqwest::Client,
    source: JwksSource,
    keys: RwLock<Arc<KeySet>>,
    refresh: Mutex<()>,
}

impl KeyResolver {
    pub fn new(http: reqwest::Client, source: JwksSource) -> Self {
        Self {
            http,
            source,
            keys: RwLock::new(Arc::new(KeySet::new())),
            refresh: Mutex::new(()),
        }
    }

    /// Locate the key named by the token's `kid` header. `discovered` is
    /// the document the caller already holds; the resolver never fetches
    /// it itself.
    pub async fn resolve_key(
        &self,
        token: &str,
        discovered: Option<&DiscoveryDocument>,
    ) -> Result<Arc<SigningKey>> {
        let header = jsonwebtoken::decode_header(token)?;
        let kid = header
            .kid
            .ok_or_else(|| Error::TokenRejected("JWT missing kid header".into()))?;

        let seen = self.keys.read().await.clone();
        if let Some(key) = seen.get(&kid) {
            return Ok(key.clone());
        }

        let _guard = self.refresh.lock().await;
        // Another caller may have refreshed while we waited for the lock.
        let current = self.keys.read().await.clone();
        if !Arc::ptr_eq(&seen, &current) {
            return current
                .get(&kid)
                .cloned()
                .ok_or(Error::UnknownKeyId(kid));
        }

        let fresh = self.refresh_keys(discovered).await?;
        fresh.get(&kid).cloned().ok_or(Error::UnknownKeyId(kid))
    }

    /// Refetch the JWKS and replace the cached set wholesale.
    pub async fn refresh_keys(
        &self,
        discovered: Option<&DiscoveryDocument>,
    ) -> Result<Arc<KeySet>> {
        let url = self.source.url(discovered);
        debug!(url = %url, "fetching JWKS");
        let resp = self.http.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::UpstreamUnavailable(format!(
                "JWKS endpoint returned {status}"
            )));
        }
        let jwks: JwkSet = resp
            .json()
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("invalid JWKS: {e}")))?;

        let keys = Arc::new(index_keys(&jwks));
        info!(url = %url, keys = keys.len(), "refreshed JWKS");
        *self.keys.write().await = keys.clone();
        Ok(keys)
    }

    /// Number of keys currently cached.
    pub async fn cached_len(&self) -> usize {
        self.keys.read().await.len()
    }
}
