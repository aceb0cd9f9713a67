//! OpenID Connect discovery document cache.
//!
//! The provider's `/.well-known/openid-configuration` is fetched on first
//! use and kept for the life of the process. Concurrent first callers share
//! one outstanding request; a failed fetch leaves the cache empty so the
//! next caller retries.

use crate::error::{Error, Result};
use axum::body::Bytes;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// The subset of an OIDC discovery document the facade relies on.
///
/// The upstream bytes are retained so the document can be republished
/// without a parse/re-encode round trip.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DiscoveryDocument {
    pub issuer: Option<String>,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: Option<String>,
    pub scopes_supported: Option<Vec<String>>,
    pub response_types_supported: Option<Vec<String>>,
    pub response_modes_supported: Option<Vec<String>>,
    pub grant_types_supported: Option<Vec<String>>,
    pub token_endpoint_auth_methods_supported: Option<Vec<String>>,
    pub code_challenge_methods_supported: Option<Vec<String>>,
    #[serde(skip)]
    raw: Bytes,
}

impl DiscoveryDocument {
    /// Parse a discovery document, rejecting one without usable endpoints.
    pub fn parse(raw: Bytes) -> Result<Self> {
        let mut doc: DiscoveryDocument = serde_json::from_slice(&raw)
            .map_err(|e| Error::MalformedDiscoveryDocument(e.to_string()))?;
        if doc.authorization_endpoint.trim().is_empty() {
            return Err(Error::MalformedDiscoveryDocument(
                "empty authorization_endpoint".into(),
            ));
        }
        if doc.token_endpoint.trim().is_empty() {
            return Err(Error::MalformedDiscoveryDocument(
                "empty token_endpoint".into(),
            ));
        }
        doc.raw = raw;
        Ok(doc)
    }

    /// The document exactly as the provider served it.
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }
}

/// Lazily populated, process-lifetime cache of the discovery document.
#[derive(Debug)]
pub struct DiscoveryCache {
    http: reqwest::Client,
    url: String,
    document: OnceCell<Arc<DiscoveryDocument>>,
}

impl DiscoveryCache {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            document: OnceCell::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Return the cached document, fetching it if no fetch has succeeded yet.
    pub async fn get_config(&self) -> Result<Arc<DiscoveryDocument>> {
        self.document
            .get_or_try_init(|| self.fetch())
            .await
            .map(Arc::clone)
    }

    /// The document if one has already been fetched.
    pub fn cached(&self) -> Option<Arc<DiscoveryDocument>> {
        self.document.get().cloned()
    }

    async fn fetch(&self) -> Result<Arc<DiscoveryDocument>> {
        info!(url = %self.url, "fetching OIDC discovery document");
        let result: Result<DiscoveryDocument> = async {
            let resp = self.http.get(&self.url).send().await?;
            let status = resp.status();
            if !status.is_success() {
                return Err(Error::UpstreamUnavailable(format!(
                    "discovery endpoint returned {status}"
                )));
            }
            let body = resp.bytes().await?;
            DiscoveryDocument::parse(body)
        }
        .await;

        match result {
            Ok(doc) => {
                info!(
                    issuer = doc.issuer.as_deref().unwrap_or("<unset>"),
                    "cached OIDC discovery document"
                );
                Ok(Arc::new(doc))
            }
            Err(e) => {
                warn!(url = %self.url, error = %e, "OIDC discovery failed");
                Err(e)
            }
        }
    }
}
