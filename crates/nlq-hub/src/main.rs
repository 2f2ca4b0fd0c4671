use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use clap::Parser;
use nlq_core::backend::{DialectKind, DEFAULT_MAX_LIMIT};
use nlq_core::{NlqParser, ParserConfig, DEFAULT_LIMIT};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use store::{Backend, MemoryBackend};

mod api;
mod error;
mod store;

// =============================================================================
// CLI
// =============================================================================

#[derive(Parser)]
#[command(
    name = "nlq-hub",
    version,
    about = "Natural-language queries over an item store"
)]
struct Args {
    /// Server bind address (overrides the config file)
    #[arg(long)]
    bind: Option<String>,

    /// Path to config file
    #[arg(long, default_value = "nlq-hub.toml")]
    config: PathBuf,
}

// =============================================================================
// Config
// =============================================================================

#[derive(Deserialize, Default, Clone, Debug)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub nlq: NlqConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// `*` or a comma-separated list of origins.
    #[serde(default = "default_cors")]
    pub cors_allowed_origins: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_allowed_origins: default_cors(),
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct NlqConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_limit")]
    pub default_limit: u32,
    #[serde(default = "default_max_limit")]
    pub max_limit: u32,
    #[serde(default = "default_temporal_path")]
    pub temporal_path: String,
    #[serde(default = "default_category_path")]
    pub category_path: String,
    #[serde(default)]
    pub dialect: DialectKind,
}

impl Default for NlqConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            temporal_path: default_temporal_path(),
            category_path: default_category_path(),
            dialect: DialectKind::default(),
        }
    }
}

impl NlqConfig {
    pub fn parser_config(&self) -> ParserConfig {
        ParserConfig {
            default_limit: self.default_limit,
            temporal_path: self.temporal_path.clone(),
            category_path: self.category_path.clone(),
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct StoreConfig {
    #[serde(default = "default_collection")]
    pub default_collection: String,
    /// JSON array of payload objects loaded at startup.
    #[serde(default)]
    pub seed_file: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_collection: default_collection(),
            seed_file: None,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3001".into()
}
fn default_cors() -> String {
    "*".into()
}
fn default_enabled() -> bool {
    true
}
fn default_limit() -> u32 {
    DEFAULT_LIMIT
}
fn default_max_limit() -> u32 {
    DEFAULT_MAX_LIMIT
}
fn default_temporal_path() -> String {
    "created_at".into()
}
fn default_category_path() -> String {
    "category".into()
}
fn default_collection() -> String {
    "items".into()
}

impl Config {
    /// Missing file means defaults; a broken one is logged and ignored.
    fn load(path: &Path) -> Self {
        if !path.exists() {
            tracing::info!("No config at {:?}, using defaults", path);
            return Self::default();
        }
        let parsed = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|content| toml::from_str(&content).map_err(|e| e.to_string()));
        match parsed {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring config {:?}: {}", path, e);
                Self::default()
            }
        }
    }
}

// =============================================================================
// Application State
// =============================================================================

pub struct AppState {
    pub config: Config,
    pub parser: NlqParser,
    pub backend: Arc<dyn Backend>,
}

pub fn build_state(config: Config) -> Arc<AppState> {
    let parser = NlqParser::new(config.nlq.parser_config());
    let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new(config.nlq.max_limit));
    Arc::new(AppState {
        config,
        parser,
        backend,
    })
}

fn cors_layer(origins: &str) -> CorsLayer {
    let origins = origins.trim();
    if origins.is_empty() || origins == "*" {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Skipping invalid CORS origin {:?}", o);
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_allowed_origins);
    Router::new()
        .route("/api/health", get(api::health))
        .route("/api/nlq/query", post(api::nlq_query))
        .route("/api/nlq/parse", post(api::nlq_parse))
        .route("/api/data", get(api::list_items).post(api::create_item))
        .route(
            "/api/data/:id",
            get(api::get_item)
                .put(api::replace_item)
                .delete(api::delete_item),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Loads the seed file into the default collection.
async fn seed(state: &AppState, path: &Path) -> Result<usize, String> {
    let content = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    let records: Vec<serde_json::Value> =
        serde_json::from_str(&content).map_err(|e| e.to_string())?;
    let collection = &state.config.store.default_collection;
    let mut loaded = 0;
    for record in records {
        match state.backend.insert(collection, record).await {
            Ok(_) => loaded += 1,
            Err(e) => tracing::warn!("Skipping seed record: {}", e),
        }
    }
    Ok(loaded)
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "nlq_hub=info,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = Config::load(&args.config);
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    let addr: SocketAddr = match config.server.bind.parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!("Invalid bind address {:?}: {}", config.server.bind, e);
            std::process::exit(1);
        }
    };

    let state = build_state(config);

    if let Some(path) = state.config.store.seed_file.clone() {
        match seed(&state, &path).await {
            Ok(n) => tracing::info!("Seeded {} items from {:?}", n, path),
            Err(e) => tracing::warn!("Failed to seed from {:?}: {}", path, e),
        }
    }

    tracing::info!("NLQ hub listening on http://{}", addr);
    tracing::info!(
        "  NLQ: {} (dialect {:?}, backend {})",
        if state.config.nlq.enabled { "enabled" } else { "disabled" },
        state.config.nlq.dialect,
        state.backend.name()
    );

    let app = router(state);
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
    }
}
