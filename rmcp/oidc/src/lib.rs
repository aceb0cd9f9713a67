//! # rmcp-oidc
//!
//! An OAuth 2.0 / OpenID Connect facade for MCP servers built with
//! [rmcp](https://docs.rs/rmcp) and [axum](https://docs.rs/axum).
//!
//! The facade sits between MCP clients and a third-party identity provider:
//!
//! - it verifies bearer tokens against the provider's JWKS and hands the
//!   MCP service a normalized [`AccessGrant`];
//! - it publishes RFC 8414 / RFC 9728 metadata and proxies `/authorize` and
//!   `/token`, so generic OAuth clients can log in without knowing the
//!   provider's URLs.
//!
//! ```rust,ignore
//! use rmcp_oidc::{Facade, Settings};
//!
//! let facade = Facade::new(Settings::new(
//!     "https://tenant.auth0.com/",
//!     "https://mcp.example.com",
//!     "https://mcp.example.com",
//! ))?;
//! facade.prefetch().await;
//!
//! let app = facade.app(mcp_service);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//! axum::serve(listener, app).await?;
//! ```

pub use axum;

pub mod auth;
pub mod config;
pub mod discovery;
pub mod error;
pub mod jwks;
pub mod metadata;
pub mod proxy;
pub mod router;
pub mod verify;

pub use config::{OidcArgs, Settings};
pub use discovery::{DiscoveryCache, DiscoveryDocument};
pub use error::{Error, ErrorBody, Result};
pub use jwks::{KeyResolver, SigningKey};
pub use verify::{AccessGrant, TokenVerifier};

use auth::{AuthLayer, BearerAuth, ResourceServerConfig};
use axum::{Router, extract::Request, response::IntoResponse};
use router::FacadeState;
use std::{convert::Infallible, sync::Arc, time::Duration};
use tracing::{info, warn};

/// Outbound client shared by every call to the identity provider.
pub fn upstream_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("rmcp-oidc/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::Config(format!("cannot build HTTP client: {e}")))
}

/// The assembled facade: settings, the shared discovery cache and the
/// token verifier.
#[derive(Clone)]
pub struct Facade {
    settings: Arc<Settings>,
    http: reqwest::Client,
    discovery: Arc<DiscoveryCache>,
    verifier: TokenVerifier,
}

impl Facade {
    pub fn new(settings: Settings) -> Result<Self> {
        let settings = Arc::new(settings);
        let http = upstream_client(settings.upstream_timeout)?;
        let discovery = Arc::new(DiscoveryCache::new(http.clone(), settings.discovery_url()));
        let verifier = TokenVerifier::new(settings.clone(), discovery.clone(), http.clone());
        Ok(Self {
            settings,
            http,
            discovery,
            verifier,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn discovery(&self) -> &Arc<DiscoveryCache> {
        &self.discovery
    }

    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    /// Warm the discovery cache. Failure is logged; the facade keeps
    /// serving and retries on the next request.
    pub async fn prefetch(&self) {
        match self.discovery.get_config().await {
            Ok(doc) => info!(
                issuer = doc.issuer.as_deref().unwrap_or(&self.settings.issuer),
                authorization_endpoint = %doc.authorization_endpoint,
                token_endpoint = %doc.token_endpoint,
                "identity provider configuration loaded"
            ),
            Err(e) => warn!(
                error = %e,
                "failed to load identity provider configuration; OAuth will not work until the provider is reachable"
            ),
        }
    }

    /// Health, metadata and flow routes, without CORS.
    pub fn facade_router(&self) -> Router {
        router::facade_router(FacadeState {
            settings: self.settings.clone(),
            discovery: self.discovery.clone(),
            http: self.http.clone(),
        })
    }

    /// The bearer layer guarding the MCP endpoint.
    pub fn auth_layer(&self) -> AuthLayer<BearerAuth<TokenVerifier>> {
        AuthLayer::new(BearerAuth::new(self.verifier.clone()))
            .with_resource_server(ResourceServerConfig::from_settings(&self.settings))
    }

    /// The full application: the facade routes plus `mcp` mounted at the
    /// configured path behind [`Facade::auth_layer`], all under CORS.
    pub fn app<S>(&self, mcp: S) -> Router
    where
        S: tower::Service<Request, Error = Infallible> + Clone + Send + Sync + 'static,
        S::Response: IntoResponse,
        S::Future: Send + 'static,
    {
        Router::new()
            .nest_service(&self.settings.mcp_path, mcp)
            .route_layer(self.auth_layer())
            .merge(self.facade_router())
            .layer(router::cors_layer())
    }
}
