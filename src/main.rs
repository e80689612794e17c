use anyhow::Context;
use clap::Parser;
use diagramshot::config::ServiceConfig;
use diagramshot::provision::provisioner_for;
use diagramshot::render::MermaidRenderer;
use diagramshot::server::{self, AppState, PAGE_PATH, RENDER_PATH};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::parse();

    // Also collects `log` records from the library
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("diagramshot=info,tower_http=info")),
        )
        .init();

    config.validate()?;

    let provisioner = provisioner_for(&config);
    info!(
        "Using {} browser provisioning, mermaid from {}",
        provisioner.name(),
        config.mermaid_url
    );

    let renderer = MermaidRenderer::new(provisioner, config.render_settings());
    let app = server::router(AppState::new(Arc::new(renderer)));

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!(
        "Listening on http://{} (POST {}, page at {})",
        config.bind, RENDER_PATH, PAGE_PATH
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
    }
}
