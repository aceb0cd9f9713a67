//! Authorization-server and protected-resource metadata.
//!
//! - [RFC 8414](https://datatracker.ietf.org/doc/html/rfc8414) metadata is
//!   mapped from the provider's discovery document, with defaults for any
//!   field the provider leaves out.
//! - [RFC 9728](https://datatracker.ietf.org/doc/html/rfc9728) metadata is
//!   built from local settings only.

use crate::config::{DEFAULT_SCOPES, Settings};
use crate::discovery::DiscoveryDocument;
use serde::{Deserialize, Serialize};

/// `Cache-Control` for every metadata response.
pub const METADATA_CACHE_CONTROL: &str = "public, max-age=3600";

/// OAuth 2.0 Authorization Server Metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationServerMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,
    pub scopes_supported: Vec<String>,
    pub response_types_supported: Vec<String>,
    pub response_modes_supported: Vec<String>,
    pub grant_types_supported: Vec<String>,
    pub token_endpoint_auth_methods_supported: Vec<String>,
    pub code_challenge_methods_supported: Vec<String>,
}

fn or_default(value: &Option<Vec<String>>, default: &[&str]) -> Vec<String> {
    value
        .clone()
        .unwrap_or_else(|| default.iter().map(|s| s.to_string()).collect())
}

impl AuthorizationServerMetadata {
    pub fn from_discovery(doc: &DiscoveryDocument, settings: &Settings) -> Self {
        Self {
            issuer: doc.issuer.clone().unwrap_or_else(|| settings.issuer.clone()),
            authorization_endpoint: doc.authorization_endpoint.clone(),
            token_endpoint: doc.token_endpoint.clone(),
            jwks_uri: doc.jwks_uri.clone(),
            scopes_supported: or_default(&doc.scopes_supported, &DEFAULT_SCOPES),
            response_types_supported: or_default(&doc.response_types_supported, &["code"]),
            response_modes_supported: or_default(&doc.response_modes_supported, &["query"]),
            grant_types_supported: or_default(
                &doc.grant_types_supported,
                &["authorization_code", "refresh_token"],
            ),
            token_endpoint_auth_methods_supported: or_default(
                &doc.token_endpoint_auth_methods_supported,
                &["client_secret_post", "client_secret_basic", "none"],
            ),
            code_challenge_methods_supported: or_default(
                &doc.code_challenge_methods_supported,
                &["S256"],
            ),
        }
    }
}

/// OAuth 2.0 Protected Resource Metadata.
///
/// `authorization_servers` always holds at least one entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedResourceMetadata {
    /// The resource identifier, this server's public base URL.
    pub resource: String,
    pub authorization_servers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,
    /// Only `header` is supported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearer_methods_supported: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_documentation: Option<String>,
}

impl ProtectedResourceMetadata {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            resource: settings.public_url.clone(),
            authorization_servers: settings.authorization_servers(),
            scopes_supported: Some(settings.scopes_supported()),
            bearer_methods_supported: Some(vec!["header".into()]),
            resource_documentation: None,
        }
    }
}
