//! Journal Server - HTTP API for journal entries with mood analysis.
//!
//! This crate provides:
//! - Email signup and login with JWT bearer tokens
//! - Per-user journal entry CRUD backed by SQLite
//! - Automatic mood analysis on create and on content changes
//!
//! ## Architecture
//!
//! ```text
//! Client → auth → routes → EntryLifecycle → EntryStore (SQLite)
//!                                 ↓
//!                           MoodAnalyzer → TextGenerator
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod auth;
pub mod entry;
pub mod lifecycle;
pub mod routes;
pub mod user;

pub use entry::{EntryFilter, EntryStore, JournalEntry, SqliteEntryStore};
pub use lifecycle::{EntryLifecycle, EntryUpdate};
pub use user::{SignupRequest, User, UserStore};

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::{self, Next},
    response::Response,
    Router,
};
use journal_analysis::{AnalyzerSettings, MoodAnalyzer, OpenAIProvider, TextGenerator};
use journal_common::config::Config;
use journal_common::logging::generate_trace_id;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tracing::Instrument;

/// Header carrying the per-request trace id.
pub static TRACE_ID_HEADER: HeaderName = HeaderName::from_static("x-trace-id");

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Upper bound for one request; covers a full analysis round trip.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Analyzer for the configured provider, or a fallback-only analyzer.
pub fn build_analyzer(config: &Config) -> MoodAnalyzer {
    let generator = OpenAIProvider::from_config(&config.llm).map(|provider| {
        tracing::info!(model = provider.model(), "Mood analysis enabled");
        Arc::new(provider) as Arc<dyn TextGenerator>
    });
    MoodAnalyzer::new(generator, AnalyzerSettings::default())
}

/// Build the router with all routes and middleware.
pub fn build_router(config: &Config, analyzer: Arc<MoodAnalyzer>) -> anyhow::Result<Router> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Ok(routes::build_all_routes(config, analyzer)?
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(middleware::from_fn(trace_middleware))
        .layer(cors))
}

/// Open a span per request and echo the trace id back.
pub async fn trace_middleware(request: Request, next: Next) -> Response {
    let trace_id = request
        .headers()
        .get(&TRACE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(generate_trace_id);

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    let mut response = next.run(request).instrument(span.clone()).await;

    span.in_scope(|| {
        tracing::debug!(status = response.status().as_u16(), "Request completed");
    });

    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert(TRACE_ID_HEADER.clone(), value);
    }
    response
}

/// Start the journal server.
pub async fn start_server(config: &Config) -> anyhow::Result<()> {
    let addr = config.listen_address()?;

    let analyzer = Arc::new(build_analyzer(config));
    let router = build_router(config, analyzer)?;

    tracing::info!(
        address = %addr,
        database = %config.database.resolved_path().display(),
        "Starting journal server"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
