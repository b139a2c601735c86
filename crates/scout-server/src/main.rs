mod configuration;
mod error;
mod routes;
mod state;

use anyhow::Context;
use configuration::{Settings, StoreKind, StoreSettings};
use http::HeaderValue;
use scout::providers::openai::OpenAiProvider;
use scout::store::{CompanyStore, MemoryStore, SqliteStore};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn open_store(settings: &StoreSettings) -> anyhow::Result<Arc<dyn CompanyStore>> {
    let path = settings
        .path
        .as_deref()
        .context("store path is not configured")?;

    let store: Arc<dyn CompanyStore> = match settings.kind {
        StoreKind::Json => Arc::new(
            MemoryStore::from_json_file(path)
                .with_context(|| format!("failed to load catalog from {}", path.display()))?,
        ),
        StoreKind::Sqlite => Arc::new(
            SqliteStore::open(path)
                .with_context(|| format!("failed to open catalog at {}", path.display()))?,
        ),
    };
    Ok(store)
}

fn cors_layer(origin: Option<&str>) -> anyhow::Result<CorsLayer> {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    Ok(match origin {
        Some(origin) => cors.allow_origin(
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("invalid CORS origin {}", origin))?,
        ),
        None => cors.allow_origin(Any),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::new()?;

    let store = open_store(&settings.store)?;
    let cors = cors_layer(settings.server.cors_origin.as_deref())?;
    let addr = settings.server.socket_addr()?;
    let provider_config = settings.provider.into_config();
    info!(model = %provider_config.model, host = %provider_config.host, "using provider");

    let state = state::AppState {
        provider: Arc::new(OpenAiProvider::new(provider_config)?),
        store,
        agent_config: settings.agent.agent_config(),
        search_config: settings.search.search_config(),
        forward_options: scout::transport::ForwardOptions {
            announce_tools: settings.agent.announce_tools,
        },
    };

    let app = routes::configure(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
