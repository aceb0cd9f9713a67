//! HTTP surface of the facade.

use crate::config::Settings;
use crate::discovery::DiscoveryCache;
use crate::metadata::{
    AuthorizationServerMetadata, METADATA_CACHE_CONTROL, ProtectedResourceMetadata,
};
use crate::proxy;
use axum::{
    Json, Router,
    body::Body,
    extract::State,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use http::{HeaderName, HeaderValue, header};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Shared by every facade handler.
#[derive(Clone, Debug)]
pub struct FacadeState {
    pub settings: Arc<Settings>,
    pub discovery: Arc<DiscoveryCache>,
    pub http: reqwest::Client,
}

/// Routes for health, metadata and the authorization flow.
pub fn facade_router(state: FacadeState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/.well-known/oauth-authorization-server",
            get(authorization_server_metadata),
        )
        .route(
            "/.well-known/oauth-protected-resource",
            get(protected_resource_metadata),
        )
        .route(
            "/.well-known/oauth-protected-resource/{*resource}",
            get(protected_resource_metadata),
        )
        .route("/.well-known/openid-configuration", get(openid_configuration))
        .route("/register", post(proxy::register))
        .route("/authorize", get(proxy::authorize))
        .route("/token", post(proxy::token))
        .with_state(state)
}

/// Any origin, method and header; exposes the MCP session id and
/// `WWW-Authenticate` to browser clients.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([
            HeaderName::from_static("mcp-session-id"),
            header::WWW_AUTHENTICATE,
        ])
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

fn cached(resp: impl IntoResponse) -> Response {
    (
        [(
            header::CACHE_CONTROL,
            HeaderValue::from_static(METADATA_CACHE_CONTROL),
        )],
        resp,
    )
        .into_response()
}

async fn authorization_server_metadata(State(state): State<FacadeState>) -> Response {
    info!("GET /.well-known/oauth-authorization-server");
    match state.discovery.get_config().await {
        Ok(doc) => cached(Json(AuthorizationServerMetadata::from_discovery(
            &doc,
            &state.settings,
        ))),
        Err(e) => {
            warn!(error = %e, "authorization server metadata unavailable");
            e.into_response()
        }
    }
}

async fn protected_resource_metadata(State(state): State<FacadeState>) -> Response {
    info!("GET /.well-known/oauth-protected-resource");
    cached(Json(ProtectedResourceMetadata::from_settings(&state.settings)))
}

async fn openid_configuration(State(state): State<FacadeState>) -> Response {
    info!("GET /.well-known/openid-configuration");
    match state.discovery.get_config().await {
        Ok(doc) => cached((
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )],
            Body::from(doc.raw().clone()),
        )),
        Err(e) => {
            warn!(error = %e, "openid configuration unavailable");
            e.into_response()
        }
    }
}
