//! Authentication middleware for the MCP endpoint.
//!
//! The MCP framework owns its own wire protocol; all it needs from this
//! crate is a token check in front of it. [`AuthLayer`] runs an
//! [`Authenticator`] on every request, inserts the resulting claims into the
//! request extensions, and answers failures with RFC 6750 / RFC 9728
//! challenges.
//!
//! # Example
//!
//! ```rust,ignore
//! use rmcp_oidc::auth::{AuthLayer, BearerAuth, ResourceServerConfig};
//!
//! let app = axum::Router::new()
//!     .nest_service("/mcp", service)
//!     .layer(
//!         AuthLayer::new(BearerAuth::new(verifier))
//!             .with_resource_server(ResourceServerConfig::from_settings(&settings)),
//!     );
//! ```

mod bearer;
mod challenge;

pub use bearer::{BearerAuth, bearer_token};
pub use challenge::{ResourceServerConfig, www_authenticate_401, www_authenticate_403};

use crate::verify::AccessGrant;
use futures::future::BoxFuture;
use http::{Request, Response};
use std::task::{Context, Poll};

/// Why a request was not authenticated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// No usable credential was presented.
    Missing,
    /// A credential was presented and did not verify.
    Invalid,
}

/// Claims that can be checked against required scopes.
pub trait ScopedClaims {
    fn has_scope(&self, scope: &str) -> bool;
}

impl ScopedClaims for AccessGrant {
    fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }
}

/// Authenticates an incoming request from its head.
pub trait Authenticator: Clone + Send + Sync + 'static {
    /// The claims type produced on successful authentication.
    type Claims: ScopedClaims + Clone + Send + Sync + 'static;

    fn authenticate(
        &self,
        parts: &http::request::Parts,
    ) -> impl Future<Output = Result<Self::Claims, Rejection>> + Send;
}

/// Validates a credential string (e.g. a bearer token).
///
/// Validation never reports why a credential failed: every failure is
/// `None`.
pub trait Validator: Clone + Send + Sync + 'static {
    type Claims: ScopedClaims + Clone + Send + Sync + 'static;

    fn validate(&self, credential: &str) -> impl Future<Output = Option<Self::Claims>> + Send;
}

/// Tower [`Layer`](tower::Layer) that applies [`AuthService`].
#[derive(Clone)]
pub struct AuthLayer<A> {
    authenticator: A,
    resource_server: Option<ResourceServerConfig>,
}

impl<A> AuthLayer<A> {
    pub fn new(authenticator: A) -> Self {
        Self {
            authenticator,
            resource_server: None,
        }
    }

    /// Advertise the protected-resource metadata in 401 challenges and
    /// enforce its required scopes with 403 `insufficient_scope`.
    pub fn with_resource_server(mut self, config: ResourceServerConfig) -> Self {
        self.resource_server = Some(config);
        self
    }
}

impl<A, S> tower::Layer<S> for AuthLayer<A>
where
    A: Clone,
{
    type Service = AuthService<A, S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            authenticator: self.authenticator.clone(),
            resource_server: self.resource_server.clone(),
            inner,
        }
    }
}

/// Tower service that authenticates requests before forwarding them.
#[derive(Clone)]
pub struct AuthService<A, S> {
    authenticator: A,
    resource_server: Option<ResourceServerConfig>,
    inner: S,
}

impl<A, S, B> tower::Service<Request<B>> for AuthService<A, S>
where
    A: Authenticator,
    S: tower::Service<Request<B>, Response = Response<axum::body::Body>> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Send,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let authenticator = self.authenticator.clone();
        let resource_server = self.resource_server.clone();
        let mut inner = self.inner.clone();
        // swap to ensure poll_ready state is preserved
        std::mem::swap(&mut self.inner, &mut inner);

        Box::pin(async move {
            let (parts, body) = req.into_parts();

            let claims = match authenticator.authenticate(&parts).await {
                Ok(claims) => claims,
                Err(rejection) => {
                    let description = match rejection {
                        Rejection::Missing => "missing bearer token",
                        Rejection::Invalid => "invalid or expired token",
                    };
                    return Ok(challenge::unauthorized(
                        resource_server.as_ref(),
                        rejection == Rejection::Invalid,
                        description,
                    ));
                }
            };

            if let Some(ref config) = resource_server {
                if !config.required_scopes.iter().all(|s| claims.has_scope(s)) {
                    return Ok(challenge::insufficient_scope(config));
                }
            }

            let mut req = Request::from_parts(parts, body);
            req.extensions_mut().insert(claims);
            inner.call(req).await
        })
    }
}
