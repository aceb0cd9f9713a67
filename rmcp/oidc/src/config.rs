//! Facade configuration.
//!
//! Every option is read from the environment; the same names are accepted
//! as long flags for local runs.

use crate::error::{Error, Result};
use clap::Args;
use jsonwebtoken::Algorithm;
use reqwest::Url;
use std::{str::FromStr, time::Duration};

/// Scopes advertised when no required scopes are configured.
pub const DEFAULT_SCOPES: [&str; 3] = ["openid", "profile", "email"];

/// Identity-provider and resource-server options.
#[derive(Args, Debug, Clone)]
pub struct OidcArgs {
    /// Full issuer URL of the identity provider (e.g. "https://tenant.auth0.com/").
    #[arg(long, env = "OIDC_ISSUER_URL")]
    pub issuer_url: Option<String>,

    /// Identity-provider domain; the issuer becomes `https://<domain>/`.
    #[arg(long, env = "OIDC_DOMAIN", conflicts_with = "issuer_url")]
    pub domain: Option<String>,

    /// Audience (resource identifier) tokens must be issued for.
    #[arg(long, env = "OIDC_AUDIENCE")]
    pub audience: String,

    /// Public base URL this facade is reachable at.
    #[arg(long, env = "PUBLIC_BASE_URL")]
    pub public_url: String,

    /// Scopes a token must carry to reach the MCP endpoint.
    #[arg(long, env = "OIDC_REQUIRED_SCOPES", value_delimiter = ',')]
    pub required_scopes: Vec<String>,

    /// Validate `iss` against this value instead of the discovered issuer.
    #[arg(long, env = "OIDC_STATIC_ISSUER")]
    pub static_issuer: Option<String>,

    /// Additional issuers listed in the protected-resource metadata.
    #[arg(long, env = "OIDC_TRUSTED_ISSUERS", value_delimiter = ',')]
    pub trusted_issuers: Vec<String>,

    /// JWKS endpoint override; defaults to the discovered `jwks_uri`.
    #[arg(long, env = "OIDC_JWKS_URI")]
    pub jwks_uri: Option<String>,

    /// Accepted JWS algorithms.
    #[arg(
        long,
        env = "OIDC_ALGORITHMS",
        value_delimiter = ',',
        default_value = "RS256"
    )]
    pub algorithms: Vec<String>,

    /// Clock skew tolerated on `exp`, `nbf` and `iat`, in seconds.
    #[arg(long, env = "OIDC_CLOCK_SKEW_SECS", default_value_t = 0)]
    pub clock_skew_secs: u64,

    /// Timeout applied to every call to the identity provider, in seconds.
    #[arg(long, env = "OIDC_UPSTREAM_TIMEOUT_SECS", default_value_t = 10)]
    pub upstream_timeout_secs: u64,

    /// Where operators register clients out of band.
    #[arg(long, env = "OIDC_REGISTRATION_URL")]
    pub registration_url: Option<String>,

    /// Path the MCP endpoint is mounted at.
    #[arg(long, env = "MCP_PATH", default_value = "/mcp")]
    pub mcp_path: String,
}

impl OidcArgs {
    /// Validate the arguments and produce [`Settings`].
    pub fn into_settings(self) -> Result<Settings> {
        let issuer = match (self.issuer_url, self.domain) {
            (Some(url), _) => url,
            (None, Some(domain)) => format!("https://{}/", domain.trim_end_matches('/')),
            (None, None) => {
                return Err(Error::Config(
                    "one of OIDC_ISSUER_URL or OIDC_DOMAIN is required".into(),
                ));
            }
        };
        check_url("issuer", &issuer)?;
        check_url("public url", &self.public_url)?;
        if let Some(ref uri) = self.jwks_uri {
            check_url("jwks uri", uri)?;
        }
        if !self.mcp_path.starts_with('/') || self.mcp_path == "/" {
            return Err(Error::Config(format!(
                "MCP path `{}` must start with `/` and name a sub-path",
                self.mcp_path
            )));
        }

        let algorithms = self
            .algorithms
            .iter()
            .map(|name| {
                Algorithm::from_str(name.trim())
                    .map_err(|_| Error::Config(format!("unknown algorithm `{name}`")))
            })
            .collect::<Result<Vec<_>>>()?;
        if algorithms.is_empty() {
            return Err(Error::Config("at least one algorithm is required".into()));
        }

        let mut settings = Settings::new(issuer, self.audience, self.public_url);
        settings.required_scopes = clean_list(self.required_scopes);
        settings.trusted_issuers = clean_list(self.trusted_issuers);
        settings.static_issuer = self.static_issuer;
        settings.jwks_uri = self.jwks_uri;
        settings.algorithms = algorithms;
        settings.clock_skew = Duration::from_secs(self.clock_skew_secs);
        settings.upstream_timeout = Duration::from_secs(self.upstream_timeout_secs);
        settings.registration_url = self.registration_url;
        settings.mcp_path = self.mcp_path;
        Ok(settings)
    }
}

/// Validated, immutable facade settings.
#[derive(Clone, Debug)]
pub struct Settings {
    pub issuer: String,
    pub audience: String,
    pub public_url: String,
    pub required_scopes: Vec<String>,
    pub trusted_issuers: Vec<String>,
    pub static_issuer: Option<String>,
    pub jwks_uri: Option<String>,
    pub algorithms: Vec<Algorithm>,
    pub clock_skew: Duration,
    pub upstream_timeout: Duration,
    pub registration_url: Option<String>,
    pub mcp_path: String,
}

impl Settings {
    pub fn new(
        issuer: impl Into<String>,
        audience: impl Into<String>,
        public_url: impl Into<String>,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            public_url: public_url.into(),
            required_scopes: Vec::new(),
            trusted_issuers: Vec::new(),
            static_issuer: None,
            jwks_uri: None,
            algorithms: vec![Algorithm::RS256],
            clock_skew: Duration::ZERO,
            upstream_timeout: Duration::from_secs(10),
            registration_url: None,
            mcp_path: "/mcp".into(),
        }
    }

    pub fn discovery_url(&self) -> String {
        format!(
            "{}/.well-known/openid-configuration",
            self.issuer.trim_end_matches('/')
        )
    }

    /// JWKS location used when neither an override nor discovery supplies one.
    pub fn fallback_jwks_uri(&self) -> String {
        format!("{}/.well-known/jwks.json", self.issuer.trim_end_matches('/'))
    }

    pub fn resource_metadata_url(&self) -> String {
        format!(
            "{}/.well-known/oauth-protected-resource",
            self.public_url.trim_end_matches('/')
        )
    }

    /// Issuers advertised as trusted authorization servers.
    pub fn authorization_servers(&self) -> Vec<String> {
        let mut servers = vec![self.issuer.clone()];
        for issuer in &self.trusted_issuers {
            if !servers.contains(issuer) {
                servers.push(issuer.clone());
            }
        }
        servers
    }

    /// Scopes advertised in the protected-resource metadata.
    pub fn scopes_supported(&self) -> Vec<String> {
        if self.required_scopes.is_empty() {
            DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect()
        } else {
            self.required_scopes.clone()
        }
    }

    pub fn registration_url(&self) -> &str {
        self.registration_url.as_deref().unwrap_or(&self.issuer)
    }

    /// Settings that work but that an operator should revisit.
    pub fn startup_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.registration_url.is_none() {
            warnings.push(format!(
                "OIDC_REGISTRATION_URL is not set; /register will direct clients to the issuer {}",
                self.issuer
            ));
        }
        warnings
    }
}

fn check_url(what: &str, value: &str) -> Result<()> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|e| Error::Config(format!("{what} `{value}` is not a valid URL: {e}")))
}

fn clean_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}
