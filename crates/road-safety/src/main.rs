mod analytics;
mod assembler;
mod cache;
mod catalog;
mod checklist;
mod config;
mod error;
mod matcher;
mod model;
mod server;

use std::sync::Arc;

use rmcp::{ServiceExt, transport::stdio};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use safety_common::ollama::{OllamaClient, OllamaClientConfig};
use safety_common::redis::RedisStore;

use catalog::Catalog;
use config::Config;
use server::RoadSafetyServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout is reserved for MCP JSON-RPC
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting road-safety MCP server");

    let config = Config::from_env()?;
    info!(
        catalog_path = %config.catalog_path.display(),
        redis = config.redis_url.is_some(),
        default_top_k = config.default_top_k,
        "configuration loaded"
    );

    // Fatal on a missing or malformed catalog: never serve an empty one.
    let catalog = Arc::new(Catalog::load(&config.catalog_path)?);

    let redis = RedisStore::new(config.redis_url.as_deref());
    if redis.is_available().await {
        info!("redis connected");
    } else {
        info!("redis unavailable, running without cache and analytics");
    }

    let ollama_config = OllamaClientConfig::from_env();
    info!(
        base_url = %ollama_config.base_url,
        model = %ollama_config.model,
        timeout_ms = ollama_config.default_timeout.as_millis(),
        "ollama client configured"
    );
    let ollama = Arc::new(OllamaClient::new(ollama_config)?);
    if ollama.is_model_available().await {
        info!("ollama connection successful");
    } else {
        warn!("ollama unreachable or model not pulled, answers will degrade to structured lists");
    }

    let server = RoadSafetyServer::new(catalog, ollama, &config);

    if let Ok(addr) = std::env::var("MCP_TCP_LISTEN_ADDR") {
        let listener = TcpListener::bind(&addr).await?;
        info!(listen_addr = %addr, "MCP server ready, serving on TCP");
        loop {
            let (stream, peer) = listener.accept().await?;
            let server = server.clone();
            tokio::spawn(async move {
                tracing::info!(peer = %peer, "MCP client connected");
                let service = server.serve(stream).await.inspect_err(|e| {
                    tracing::error!(error = %e, "MCP server error");
                })?;
                service.waiting().await?;
                tracing::info!(peer = %peer, "MCP client disconnected");
                Ok::<(), anyhow::Error>(())
            });
        }
    } else {
        info!("MCP server ready, serving on stdio");
        let service = server.serve(stdio()).await.inspect_err(|e| {
            tracing::error!(error = %e, "MCP server error");
        })?;
        service.waiting().await?;
        info!("MCP server shut down");
    }
    Ok(())
}
