use anyhow::{Context, Result};
use axum::{Router, extract::FromRef};
use reqwest::Client;
use std::{net::SocketAddr, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    backend::{BackendClient, MarketplaceBackend},
    config::Settings,
    listing_feed::ListingFeed,
    session::SessionCache,
};

mod backend;
mod catalog;
mod config;
mod error;
mod export;
mod listing_feed;
mod listing_form;
#[cfg(test)]
mod mock_backend;
mod models;
mod query;
mod registration;
mod routes;
mod session;

// Shared by every handler; the session cache and listing feed are injected
// here rather than living in globals
#[derive(Clone, FromRef)]
pub struct AppState {
    settings: Arc<Settings>,
    backend: Arc<dyn MarketplaceBackend>,
    feed: Arc<ListingFeed>,
    sessions: Arc<SessionCache>,
}

impl AppState {
    pub fn new(settings: Arc<Settings>, backend: Arc<dyn MarketplaceBackend>) -> Self {
        let feed = Arc::new(ListingFeed::new(backend.clone(), settings.listings_ttl()));
        let sessions = Arc::new(SessionCache::new(settings.session_ttl()));
        Self {
            settings,
            backend,
            feed,
            sessions,
        }
    }
}

fn main() -> Result<()> {
    // Load .env file first. Ignore errors (e.g., file not found)
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "phoneflip_web=info,tower_http=info".into()))
        .with(fmt::layer())
        .init();

    tracing::info!("Initializing PhoneFlip web server...");

    // Proxy variables must be in place before the HTTP client is built and
    // before the runtime starts its worker threads
    if let Err(e) = config::load_and_set_proxy_env_vars(Path::new("proxyconfig.json")) {
        tracing::warn!("Failed to load or apply proxy configuration: {}", e);
    }

    let settings = match Settings::new() {
        Ok(s) => {
            tracing::info!("Configuration loaded successfully. Backend: {}", s.backend_url);
            s
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the tokio runtime")?
        .block_on(serve(Arc::new(settings)))
}

async fn serve(settings: Arc<Settings>) -> Result<()> {
    let mut client = Client::builder()
        .user_agent(concat!("phoneflip-web/", env!("CARGO_PKG_VERSION")))
        .timeout(settings.request_timeout());
    if let Some(proxy_url) = settings.proxy_url.as_deref().filter(|p| !p.is_empty()) {
        client = client.proxy(reqwest::Proxy::all(proxy_url).context("Invalid proxy_url")?);
    }
    let http_client = Arc::new(client.build().context("Failed to build shared reqwest client")?);
    tracing::info!("Shared HTTP client created.");

    let backend: Arc<dyn MarketplaceBackend> = Arc::new(BackendClient::new(http_client, settings.clone()));
    let app_state = AppState::new(settings.clone(), backend);

    let app: Router = routes::create_router(app_state)
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = settings.server_address.parse().with_context(|| {
        format!(
            "Invalid server address format in configuration ('{}')",
            settings.server_address
        )
    })?;

    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => {
            tracing::info!("Server listening on {}", addr);
            l
        }
        Err(e) => {
            tracing::error!("Failed to bind to address {}: {}", addr, e);
            return Err(e.into());
        }
    };

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
