//! Document Translator Web - JSON API for uploading, summarizing and translating documents.

mod helpers;
mod routes;
mod state;

use anyhow::{Context, Result};
use axum::http::{HeaderValue, header};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use clap::Parser;
use doc_translator_core::AppConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use state::AppState;

/// Largest accepted upload
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Parser, Debug)]
#[command(name = "doc-translator-web")]
#[command(author, version, about = "Document Translator Web Server", long_about = None)]
struct Args {
    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind to
    #[arg(short, long, default_value = "3000")]
    port: u16,

    /// OpenAI API base URL
    #[arg(long, env = "OPENAI_API_BASE")]
    api_base: Option<String>,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model name for OpenAI-compatible API
    #[arg(long, env = "OPENAI_MODEL")]
    model: Option<String>,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Minutes of inactivity before a session is dropped
    #[arg(long, default_value = "60")]
    session_ttl_mins: u64,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Build the API router around `state`.
fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/languages", get(routes::languages))
        .route("/api/upload", post(routes::upload))
        .route("/api/upload/{session_id}", post(routes::replace_document))
        .route(
            "/api/session/{session_id}",
            get(routes::get_session).delete(routes::delete_session),
        )
        .route("/api/summarize/{session_id}", post(routes::summarize))
        .route("/api/translate/{session_id}", post(routes::translate))
        .route("/api/download/{session_id}", get(routes::download))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
                .layer(CompressionLayer::new())
                // Downloads carry session data
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("no-store, max-age=0"),
                )),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Setup logging; RUST_LOG takes precedence over -v
    let default_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    // Load or create config
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path).context("Failed to load config file")?
    } else {
        AppConfig::load()
    };

    // Override config with CLI arguments
    if let Some(api_base) = args.api_base {
        config.gateway.api_base = api_base;
    }
    if args.api_key.is_some() {
        config.gateway.api_key = args.api_key;
    }
    if let Some(model) = args.model {
        config.gateway.model = model;
    }
    config.validate().context("Invalid configuration")?;

    info!(
        "Using model {} at {}",
        config.gateway.model, config.gateway.api_base
    );

    let session_ttl = Duration::from_secs(args.session_ttl_mins * 60);
    let state = Arc::new(
        AppState::new(config, session_ttl).context("Failed to initialize application state")?,
    );

    // Spawn background task for session cleanup (runs every 5 minutes)
    let cleanup_state = Arc::clone(&state);
    tokio::spawn(async move {
        let cleanup_interval = Duration::from_secs(5 * 60);
        loop {
            tokio::time::sleep(cleanup_interval).await;
            let evicted = cleanup_state.cleanup_old_sessions().await;
            info!(
                "Session cleanup evicted {}, {} active",
                evicted,
                cleanup_state.session_count().await
            );
        }
    });

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
