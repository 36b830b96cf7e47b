//! Tollgate HTTP server entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tokio::signal;

use tollgate::cache::{SemanticCache, start_sweeper};
use tollgate::config::{ConfigStore, ServerConfig};
use tollgate::cost::{CostTracker, start_purger};
use tollgate::embedding::{Embedder, EmbeddingError, HttpEmbedder, MockEmbedder};
use tollgate::escalation::EscalationManager;
use tollgate::gateway::{HandlerState, create_router_with_state};
use tollgate::orchestrator::Orchestrator;
use tollgate::provider::{GenaiProvider, MockModelProvider, ModelProvider, ModelResponse, ProviderError};
use tollgate::vectordb::{CACHE_COLLECTION_NAME, QdrantIndex};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Transport timeout for the embedding service; lookup applies its own
/// tighter per-call deadline on top.
const EMBED_TRANSPORT_TIMEOUT: Duration = Duration::from_secs(5);

/// Embedder selected at startup: the HTTP service when configured, otherwise
/// the deterministic stub.
enum RuntimeEmbedder {
    Http(HttpEmbedder),
    Stub(MockEmbedder),
}

impl Embedder for RuntimeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        match self {
            RuntimeEmbedder::Http(e) => e.embed(text).await,
            RuntimeEmbedder::Stub(e) => e.embed(text).await,
        }
    }

    fn dim(&self) -> usize {
        match self {
            RuntimeEmbedder::Http(e) => e.dim(),
            RuntimeEmbedder::Stub(e) => e.dim(),
        }
    }
}

/// Provider selected at startup: genai, or the canned mock for offline runs.
enum RuntimeProvider {
    Genai(GenaiProvider),
    Mock(MockModelProvider),
}

impl ModelProvider for RuntimeProvider {
    async fn invoke(
        &self,
        model: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<ModelResponse, ProviderError> {
        match self {
            RuntimeProvider::Genai(p) => p.invoke(model, prompt, max_tokens).await,
            RuntimeProvider::Mock(p) => p.invoke(model, prompt, max_tokens).await,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!(
        r#"
████████╗ ██████╗ ██╗     ██╗      ██████╗  █████╗ ████████╗███████╗
╚══██╔══╝██╔═══██╗██║     ██║     ██╔════╝ ██╔══██╗╚══██╔══╝██╔════╝
   ██║   ██║   ██║██║     ██║     ██║  ███╗███████║   ██║   █████╗
   ██║   ██║   ██║██║     ██║     ██║   ██║██╔══██║   ██║   ██╔══╝
   ██║   ╚██████╔╝███████╗███████╗╚██████╔╝██║  ██║   ██║   ███████╗
   ╚═╝    ╚═════╝ ╚══════╝╚══════╝ ╚═════╝ ╚═╝  ╚═╝   ╚═╝   ╚══════╝

        ROUTE CHEAP. CACHE HARD. PAY LESS.
                                        AGPL-3.0
"#
    );

    if std::env::args().any(|arg| arg == "--health-check") {
        std::process::exit(run_health_check());
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let server_config = ServerConfig::from_env()?;
    server_config.validate()?;
    let addr: SocketAddr = server_config.socket_addr().parse()?;

    tracing::info!(
        bind_addr = %server_config.bind_addr,
        port = server_config.port,
        "Tollgate starting"
    );

    let config = Arc::new(ConfigStore::load(server_config.routing_config_path.clone())?);
    tracing::info!(
        version = config.snapshot().version,
        path = ?server_config.routing_config_path,
        "Routing policy loaded"
    );

    let embedder = match &server_config.embed_url {
        Some(url) => RuntimeEmbedder::Http(HttpEmbedder::new(
            url,
            server_config.embed_dim,
            EMBED_TRANSPORT_TIMEOUT,
        )?),
        None => {
            tracing::warn!("No TOLLGATE_EMBED_URL configured, running embedder in stub mode");
            RuntimeEmbedder::Stub(MockEmbedder::new())
        }
    };

    let index = QdrantIndex::connect(&server_config.qdrant_url).await?;
    let cache = Arc::new(SemanticCache::new(embedder, index, CACHE_COLLECTION_NAME));
    cache.ensure_ready().await?;

    let provider = if server_config.mock_provider {
        tracing::warn!("TOLLGATE_MOCK_PROVIDER set, answering with canned responses");
        RuntimeProvider::Mock(MockModelProvider::new())
    } else {
        RuntimeProvider::Genai(GenaiProvider::new())
    };

    let tracker = CostTracker::new();
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&config),
        Arc::new(EscalationManager::new()),
        Arc::clone(&cache),
        Arc::new(provider),
        tracker.clone(),
    ));

    // Background maintenance; both tasks run for the life of the process.
    let _sweeper = start_sweeper(Arc::clone(&cache), Arc::clone(&config));
    let _purger = start_purger(tracker, Arc::clone(&config));

    let app = create_router_with_state(HandlerState::new(orchestrator));

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Tollgate shutdown complete");
    Ok(())
}

fn run_health_check() -> i32 {
    let port = std::env::var("TOLLGATE_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8080);

    let url = format!("http://127.0.0.1:{}/healthz", port);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build runtime");

    rt.block_on(async {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(1))
            .build()
            .expect("failed to build client");

        match client.get(&url).send().await {
            Ok(res) if res.status().is_success() => 0,
            _ => 1,
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
