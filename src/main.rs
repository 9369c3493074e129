// src/main.rs
// memento - graph-backed memory layer for LLM proxies

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{Level, warn};
use tracing_subscriber::FmtSubscriber;

use memento::config::{ApiKeys, MementoConfig};
use memento::embeddings::EmbeddingProvider;
use memento::engine::MemoryEngine;
use memento::graph::InMemoryGraphStore;
use memento::proxy::ProxyServer;

#[derive(Parser)]
#[command(name = "memento", about = "Graph-backed memory layer for LLM proxies")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the proxy server
    Serve {
        /// Config file path (default: ~/.config/memento/config.toml)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Override the listen port
        #[arg(long, env = "MEMENTO_PORT")]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env from ~/.memento/.env only (never from CWD - a hostile
    // directory could override API keys)
    if let Some(home) = dirs::home_dir()
        && let Err(e) = dotenvy::from_path(home.join(".memento/.env"))
    {
        tracing::debug!("no global .env file loaded: {}", e);
    }

    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    match cli.command {
        None => serve(None, None).await,
        Some(Commands::Serve { config, port }) => serve(config, port).await,
    }
}

async fn serve(config_path: Option<PathBuf>, port: Option<u16>) -> Result<()> {
    let mut config = match config_path {
        Some(path) => MementoConfig::load_from(&path)?,
        None => MementoConfig::load()?,
    };
    if let Some(port) = port {
        config.proxy.port = port;
    }

    let api_keys = ApiKeys::from_env();

    let engine = build_engine(&config, &api_keys).map(Arc::new);
    if engine.is_none() {
        warn!("memory engine disabled - requests will be forwarded without memories");
    }

    let server = ProxyServer::new(config.proxy.clone(), engine);
    server.run().await
}

/// Assemble the memory engine when both an embedding and an LLM provider
/// are configured.
fn build_engine(config: &MementoConfig, api_keys: &ApiKeys) -> Option<MemoryEngine> {
    let embedder = EmbeddingProvider::from_config(api_keys, &config.embeddings)?;
    let llm = memento::llm::from_config(api_keys, &config.llm)?;

    let store = Arc::new(InMemoryGraphStore::new());
    Some(MemoryEngine::new(
        store,
        Arc::new(embedder),
        Arc::new(llm),
        config.clone(),
    ))
}
