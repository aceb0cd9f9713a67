//! Authorization flow forwarding.
//!
//! `/authorize` redirects the browser to the provider with the query string
//! untouched, `/token` relays the exchange byte for byte, and `/register`
//! is refused because the provider takes no dynamic registrations.

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::router::FacadeState;
use axum::{
    body::{Body, Bytes},
    extract::{RawQuery, State},
    response::{IntoResponse, Response},
};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use tracing::{debug, info, warn};

/// Content type assumed for token requests that do not declare one.
const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Request headers relayed to the token endpoint.
const FORWARDED_REQUEST_HEADERS: [HeaderName; 2] = [header::AUTHORIZATION, header::ACCEPT];

/// Hop-by-hop headers (RFC 9110 §7.6.1) plus `Content-Length`, which the
/// local transport recomputes.
const DROPPED_RESPONSE_HEADERS: [HeaderName; 9] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::CONTENT_LENGTH,
];

/// Append `query` to the upstream authorization endpoint verbatim.
pub fn authorize_redirect_url(endpoint: &str, query: Option<&str>) -> String {
    match query.filter(|q| !q.is_empty()) {
        None => endpoint.to_string(),
        Some(query) => {
            let separator = if endpoint.contains('?') { '&' } else { '?' };
            format!("{endpoint}{separator}{query}")
        }
    }
}

/// `GET /authorize`: 302 to the provider's authorization endpoint.
pub async fn authorize(State(state): State<FacadeState>, RawQuery(query): RawQuery) -> Response {
    info!("GET /authorize");
    let doc = match state.discovery.get_config().await {
        Ok(doc) => doc,
        Err(e) => {
            warn!(error = %e, "cannot resolve authorization endpoint");
            return e.into_response();
        }
    };
    let location = authorize_redirect_url(&doc.authorization_endpoint, query.as_deref());
    debug!(location = %location, "redirecting to identity provider");
    match HeaderValue::try_from(location) {
        Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
        Err(e) => Error::MalformedDiscoveryDocument(format!("unusable authorization endpoint: {e}"))
            .into_response(),
    }
}

/// `POST /token`: relay the exchange to the provider.
pub async fn token(
    State(state): State<FacadeState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    info!("POST /token");
    match forward_token(&state, &headers, body).await {
        Ok(resp) => resp,
        Err(e) => {
            warn!(error = %e, "token exchange failed");
            e.into_response()
        }
    }
}

async fn forward_token(state: &FacadeState, headers: &HeaderMap, body: Bytes) -> Result<Response> {
    let doc = state.discovery.get_config().await?;

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static(FORM_URLENCODED));
    let mut request = state
        .http
        .post(&doc.token_endpoint)
        .header(header::CONTENT_TYPE, content_type)
        .body(body);
    for name in FORWARDED_REQUEST_HEADERS {
        if let Some(value) = headers.get(&name) {
            request = request.header(name, value.clone());
        }
    }

    let upstream = request.send().await?;
    let status = upstream.status();
    let upstream_headers = upstream.headers().clone();
    let bytes = upstream.bytes().await?;
    info!(status = status.as_u16(), "token endpoint responded");

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    let out = response.headers_mut();
    for (name, value) in upstream_headers.iter() {
        if !DROPPED_RESPONSE_HEADERS.contains(name) {
            out.append(name.clone(), value.clone());
        }
    }
    Ok(response)
}

/// The fixed answer to any registration attempt.
pub fn registration_unsupported(settings: &Settings) -> Error {
    Error::RegistrationUnsupported(format!(
        "The identity provider does not support dynamic client registration. \
         Register your application at {} and use the client_id provided.",
        settings.registration_url()
    ))
}

/// `POST /register`: always 400 `registration_not_supported`.
pub async fn register(State(state): State<FacadeState>) -> Response {
    info!("POST /register");
    registration_unsupported(&state.settings).into_response()
}
