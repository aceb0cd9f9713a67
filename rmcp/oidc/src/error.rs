//! Error taxonomy and the OAuth error envelope.
//!
//! Every facade-originated error is rendered as
//! `{"error": "<code>", "error_description": "<text>"}` per
//! [RFC 6749 §5.2](https://datatracker.ietf.org/doc/html/rfc6749#section-5.2).

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use http::StatusCode;
use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The identity provider could not be reached, timed out, or answered
    /// with a non-success status.
    #[error("identity provider unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("malformed discovery document: {0}")]
    MalformedDiscoveryDocument(String),

    #[error("no signing key matches kid `{0}`")]
    UnknownKeyId(String),

    #[error("token rejected: {0}")]
    TokenRejected(String),

    #[error("{0}")]
    RegistrationUnsupported(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Short machine code placed in the `error` field of the envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Error::UnknownKeyId(_) | Error::TokenRejected(_) => "invalid_token",
            Error::RegistrationUnsupported(_) => "registration_not_supported",
            Error::UpstreamUnavailable(_)
            | Error::MalformedDiscoveryDocument(_)
            | Error::Config(_) => "server_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::UnknownKeyId(_) | Error::TokenRejected(_) => StatusCode::UNAUTHORIZED,
            Error::RegistrationUnsupported(_) => StatusCode::BAD_REQUEST,
            Error::UpstreamUnavailable(_)
            | Error::MalformedDiscoveryDocument(_)
            | Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        let description = match self {
            Error::RegistrationUnsupported(text) => text.clone(),
            other => other.to_string(),
        };
        ErrorBody::new(self.code(), description)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::UpstreamUnavailable(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Error::TokenRejected(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (self.status(), Json(self.to_body())).into_response()
    }
}

/// The `{"error", "error_description"}` envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub error_description: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            error_description: description.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use http::StatusCode;

    #[test]
    fn upstream_failures_are_server_errors() {
        let err = Error::UpstreamUnavailable("connection refused".into());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "server_error");
        assert!(err.to_body().error_description.contains("connection refused"));

        let err = Error::MalformedDiscoveryDocument("missing token_endpoint".into());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "server_error");
    }

    #[test]
    fn registration_description_is_verbatim() {
        let err = Error::RegistrationUnsupported("register out of band".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let body = err.to_body();
        assert_eq!(body.error, "registration_not_supported");
        assert_eq!(body.error_description, "register out of band");
    }

    #[test]
    fn token_errors_share_one_code() {
        assert_eq!(Error::UnknownKeyId("k1".into()).code(), "invalid_token");
        assert_eq!(Error::TokenRejected("expired".into()).code(), "invalid_token");
    }
}
