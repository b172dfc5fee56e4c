mod backend;
mod config;
mod error;
mod fallback;
mod history;
mod model;
mod orchestrator;
mod prompt;
mod repository;
mod selector;
mod server;
mod variants;

use std::sync::Arc;

use rmcp::{ServiceExt, transport::stdio};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use backend::OpenAiBackend;
use config::Config;
use history::HistoryLedger;
use mcp_common::kv::{KeyValueStore, MemoryStore};
use mcp_common::openai::OpenAiClientConfig;
use mcp_common::redis::RedisCache;
use orchestrator::Orchestrator;
use repository::RuleIndex;
use selector::RuleSelector;
use server::VoiceGuidelinesServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing to stderr (stdout is reserved for MCP JSON-RPC)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting voice-guidelines MCP server");

    // 1. Load config from environment
    let config = Config::from_env()?;
    info!(
        corpus_path = %config.corpus_path,
        model = %config.model,
        timeout_ms = config.generation_timeout.as_millis(),
        max_rules = config.max_rules,
        history_capacity = config.history_capacity,
        redis = config.redis_url.is_some(),
        "configuration loaded"
    );

    // 2. Load the voice corpus. There is no useful fallback without it.
    let index = Arc::new(RuleIndex::load_file(&config.corpus_path())?);
    info!(
        dataset_version = index.dataset_version(),
        rules = index.len(),
        fingerprint = index.fingerprint(),
        "voice corpus loaded"
    );

    // 3. History store: Redis when reachable, otherwise process memory
    let redis_cache = RedisCache::new(config.redis_url.as_deref());
    let store: Arc<dyn KeyValueStore> = if redis_cache.is_available().await {
        info!("redis connected, history is persistent");
        Arc::new(redis_cache)
    } else {
        info!("redis unavailable, keeping history in memory");
        Arc::new(MemoryStore::new())
    };
    let history = Arc::new(HistoryLedger::new(store, config.history_capacity));

    // 4. Generation backend
    let openai_config = OpenAiClientConfig::from_env();
    info!(base_url = %openai_config.base_url, "openai client configured");
    let backend = Arc::new(OpenAiBackend::connect(
        openai_config,
        config.model.clone(),
        config.temperature,
        config.generation_timeout,
    )?);

    let selector = RuleSelector::new(Arc::clone(&index), config.max_rules);
    let orchestrator = Arc::new(Orchestrator::new(selector, backend, config.generation_timeout));

    let server = VoiceGuidelinesServer::new(orchestrator, history);

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
