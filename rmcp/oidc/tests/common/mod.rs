//! Mock identity provider shared by the integration tests.
//!
//! RSA keys under `tests/fixtures/` are test-only and are NOT used anywhere
//! else.

#![allow(dead_code)]

use jsonwebtoken::{Algorithm, EncodingKey, Header, get_current_timestamp};
use rmcp_oidc::{Facade, Settings};
use serde_json::{Value, json};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

pub const AUDIENCE: &str = "https://mcp.example.com";
pub const SIGNING_KID: &str = "signing-key";
pub const OTHER_KID: &str = "other-key";
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

pub fn signing_key() -> EncodingKey {
    EncodingKey::from_rsa_pem(include_bytes!("../fixtures/rsa_signing.pem")).unwrap()
}

pub fn other_key() -> EncodingKey {
    EncodingKey::from_rsa_pem(include_bytes!("../fixtures/rsa_other.pem")).unwrap()
}

pub fn signing_jwk() -> Value {
    serde_json::from_str(include_str!("../fixtures/rsa_signing.jwk.json")).unwrap()
}

pub fn other_jwk() -> Value {
    serde_json::from_str(include_str!("../fixtures/rsa_other.jwk.json")).unwrap()
}

pub fn now() -> u64 {
    get_current_timestamp()
}

/// Sign `claims` with RS256 under `kid`.
pub fn mint(claims: &Value, key: &EncodingKey, kid: Option<&str>) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(String::from);
    jsonwebtoken::encode(&header, claims, key).unwrap()
}

/// A mock provider with its issuer at `{uri}/`.
pub struct Provider {
    pub server: MockServer,
}

impl Provider {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn issuer(&self) -> String {
        format!("{}/", self.server.uri())
    }

    pub fn discovery_document(&self) -> Value {
        let base = self.uri();
        json!({
            "issuer": self.issuer(),
            "authorization_endpoint": format!("{base}/authorize"),
            "token_endpoint": format!("{base}/oauth/token"),
            "jwks_uri": format!("{base}{JWKS_PATH}"),
            "scopes_supported": ["openid", "profile", "offline_access"],
            "response_types_supported": ["code", "token"],
        })
    }

    /// Serve the discovery document, expecting exactly `times` fetches.
    pub async fn mount_discovery(&self, times: u64) {
        Mock::given(method("GET"))
            .and(path(DISCOVERY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(self.discovery_document()))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Answer discovery with 500, expecting exactly `times` attempts.
    pub async fn mount_failing_discovery(&self, times: u64) {
        Mock::given(method("GET"))
            .and(path(DISCOVERY_PATH))
            .respond_with(ResponseTemplate::new(500))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Serve `keys` as the JWKS document.
    pub async fn mount_jwks(&self, keys: Vec<Value>) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": keys })))
            .mount(&self.server)
            .await;
    }

    /// Serve `keys` for at most `times` fetches, expecting all of them.
    pub async fn mount_jwks_times(&self, keys: Vec<Value>, times: u64) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": keys })))
            .up_to_n_times(times)
            .expect(times)
            .mount(&self.server)
            .await;
    }

    pub fn settings(&self) -> Settings {
        Settings::new(self.issuer(), AUDIENCE, AUDIENCE)
    }

    pub fn facade(&self) -> Facade {
        Facade::new(self.settings()).unwrap()
    }

    /// Claims a token from this provider would normally carry.
    pub fn claims(&self) -> Value {
        json!({
            "iss": self.issuer(),
            "sub": "auth0|user-1",
            "azp": "client-abc",
            "aud": [AUDIENCE, format!("{}/userinfo", self.uri())],
            "scope": "read write",
            "iat": now() - 10,
            "exp": now() + 3600,
        })
    }
}
