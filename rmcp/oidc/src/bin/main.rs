//! Binary entry point for the rmcp-oidc facade.

use anyhow::Context;
use clap::Parser;
use rmcp::{
    ServerHandler,
    model::{Implementation, ServerCapabilities, ServerInfo},
    transport::streamable_http_server::{
        StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
    },
};
use rmcp_oidc::{Facade, OidcArgs};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// MCP server whose endpoint is guarded by an OAuth 2.0 / OIDC identity provider.
#[derive(Parser)]
#[command(name = "rmcp-oidc", version, about)]
struct Cli {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8000")]
    bind: String,

    #[command(flatten)]
    oidc: OidcArgs,
}

/// The MCP service mounted behind the facade.
#[derive(Debug, Clone, Default)]
struct OidcServer;

impl ServerHandler for OidcServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities::default(),
            server_info: Implementation {
                name: "rmcp-oidc".into(),
                title: Some("Walrus MCP OIDC Facade".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            instructions: Some(
                "MCP endpoint authenticated through an external OpenID Connect provider.".into(),
            ),
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    if let Err(e) = run(Cli::parse()).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = cli.oidc.into_settings()?;
    let facade = Facade::new(settings)?;
    let settings = facade.settings();
    let public = settings.public_url.trim_end_matches('/');
    info!(
        public_url = %settings.public_url,
        issuer = %settings.issuer,
        audience = %settings.audience,
        mcp_endpoint = %format!("{public}{}", settings.mcp_path),
        required_scopes = ?settings.required_scopes,
        registration_url = %settings.registration_url(),
        "starting MCP server with OIDC facade"
    );
    for warning in settings.startup_warnings() {
        warn!("{warning}");
    }
    facade.prefetch().await;

    let mcp = StreamableHttpService::new(
        || Ok(OidcServer),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default(),
    );
    let app = facade.app(mcp);

    let listener = tokio::net::TcpListener::bind(&cli.bind)
        .await
        .with_context(|| format!("failed to bind {}", cli.bind))?;
    info!(addr = %cli.bind, "listening");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
