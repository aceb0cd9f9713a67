//! `WWW-Authenticate` challenges for 401 and 403 responses.
//!
//! Formats follow [RFC 6750 §3](https://datatracker.ietf.org/doc/html/rfc6750#section-3)
//! and [RFC 9728 §5.1](https://datatracker.ietf.org/doc/html/rfc9728#name-www-authenticate-response).

use crate::config::Settings;
use crate::error::ErrorBody;
use axum::{
    Json,
    response::{IntoResponse, Response},
};
use http::{HeaderValue, StatusCode, header};

/// How the protected MCP endpoint describes itself in challenges.
#[derive(Clone, Debug, Default)]
pub struct ResourceServerConfig {
    /// URL of the Protected Resource Metadata document.
    pub resource_metadata_url: String,
    /// Scopes a grant must carry; advertised in the `scope` parameter.
    pub required_scopes: Vec<String>,
}

impl ResourceServerConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            resource_metadata_url: settings.resource_metadata_url(),
            required_scopes: settings.required_scopes.clone(),
        }
    }

    fn scope_param(&self) -> Option<String> {
        (!self.required_scopes.is_empty()).then(|| self.required_scopes.join(" "))
    }
}

/// `Bearer [error="invalid_token", ]resource_metadata="<url>"[, scope="<scopes>"]`
pub fn www_authenticate_401(config: &ResourceServerConfig, invalid_token: bool) -> HeaderValue {
    let mut value = String::from("Bearer ");
    if invalid_token {
        value.push_str("error=\"invalid_token\", ");
    }
    value.push_str(&format!(
        "resource_metadata=\"{}\"",
        config.resource_metadata_url
    ));
    if let Some(scope) = config.scope_param() {
        value.push_str(&format!(", scope=\"{scope}\""));
    }
    header_value(value)
}

/// `Bearer error="insufficient_scope", scope="<required>", resource_metadata="<url>"`
pub fn www_authenticate_403(config: &ResourceServerConfig) -> HeaderValue {
    let value = format!(
        "Bearer error=\"insufficient_scope\", scope=\"{}\", resource_metadata=\"{}\"",
        config.scope_param().unwrap_or_default(),
        config.resource_metadata_url,
    );
    header_value(value)
}

fn header_value(value: String) -> HeaderValue {
    // Configured URLs and scopes can carry bytes a header cannot.
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("Bearer"))
}

pub(crate) fn unauthorized(
    config: Option<&ResourceServerConfig>,
    invalid_token: bool,
    description: &str,
) -> Response {
    let challenge = match config {
        Some(config) => www_authenticate_401(config, invalid_token),
        None => HeaderValue::from_static("Bearer"),
    };
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, challenge)],
        Json(ErrorBody::new("invalid_token", description)),
    )
        .into_response()
}

pub(crate) fn insufficient_scope(config: &ResourceServerConfig) -> Response {
    (
        StatusCode::FORBIDDEN,
        [(header::WWW_AUTHENTICATE, www_authenticate_403(config))],
        Json(ErrorBody::new(
            "insufficient_scope",
            format!(
                "token lacks required scopes: {}",
                config.required_scopes.join(" ")
            ),
        )),
    )
        .into_response()
}
