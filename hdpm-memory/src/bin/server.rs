//! HDPM Memory Server
//!
//! HTTP API for filing task trajectories and retrieving role-specific context.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hdpm_memory::{
    config::Config,
    scoring::RelevanceScorer,
    storage::{self, SnapshotStore},
    AgentRole, CoRetrieval, Error, Hdpm, HdpmSnapshot, HdpmStats, ReflectAgent, Reflection,
    TrajectoryStep,
};

/// Application state shared across handlers
struct AppState {
    config: Config,
    hdpm: Hdpm,
    agent: ReflectAgent,
    snapshots: Box<dyn SnapshotStore>,
}

type SharedState = Arc<RwLock<AppState>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let mut config = Config::default();
    if let Ok(backend) = std::env::var("HDPM_STORAGE") {
        config.storage = backend.parse()?;
    }
    config.ensure_dirs()?;
    tracing::info!("Starting HDPM Memory Server on port {}", config.server_port);
    tracing::info!("Data directory: {:?} ({} storage)", config.data_dir, config.storage);

    // Initialize components
    let mut hdpm = Hdpm::from_config(&config, scorer()?);
    let snapshots = storage::open(&config)?;
    hdpm.restore(snapshots.load()?)?;
    let agent = ReflectAgent::from_config(&config);

    let state = Arc::new(RwLock::new(AppState {
        config: config.clone(),
        hdpm,
        agent,
        snapshots,
    }));

    // Build router
    let app = Router::new()
        // Health check
        .route("/health", get(health))
        .route("/stats", get(stats))
        // Filing
        .route("/reflect", post(reflect))
        // Retrieval
        .route("/retrieve", post(co_retrieve))
        .route("/prompts", post(prompts))
        // Snapshot save/load
        .route("/snapshot", get(get_snapshot).put(put_snapshot))
        .layer(TraceLayer::new_for_http())
        // Add CORS
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(state);

    let port = config.server_port;
    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!("Server listening on http://127.0.0.1:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(feature = "embeddings")]
fn scorer() -> anyhow::Result<Arc<dyn RelevanceScorer>> {
    Ok(Arc::new(hdpm_memory::EmbeddingScorer::new()?))
}

#[cfg(not(feature = "embeddings"))]
fn scorer() -> anyhow::Result<Arc<dyn RelevanceScorer>> {
    Ok(Arc::new(hdpm_memory::KeywordOverlapScorer))
}

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::EmptyTrajectory
        | Error::InvalidOutcome(_)
        | Error::InvalidSnapshot(_)
        | Error::DanglingReference(_)
        | Error::DuplicateIdentifier(_)
        | Error::AlreadyLinked { .. } => StatusCode::BAD_REQUEST,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(err: Error) -> StatusCode {
    let status = status_for(&err);
    if status.is_server_error() {
        tracing::error!("Request failed: {}", err);
    } else {
        tracing::warn!("Request rejected: {}", err);
    }
    status
}

// === Handlers ===

async fn health() -> &'static str {
    "ok"
}

async fn stats(State(state): State<SharedState>) -> Json<HdpmStats> {
    let state = state.read().await;
    Json(state.hdpm.stats())
}

// --- Filing ---

#[derive(Debug, Deserialize)]
struct ReflectRequest {
    trajectory: Vec<TrajectoryStep>,
    outcome: i32,
}

async fn reflect(
    State(state): State<SharedState>,
    Json(req): Json<ReflectRequest>,
) -> Result<Json<Reflection>, StatusCode> {
    let mut guard = state.write().await;
    let AppState {
        hdpm,
        agent,
        snapshots,
        ..
    } = &mut *guard;

    // Rolled back unless the snapshot was saved
    let reflection = agent
        .update_memory_and_persist(&req.trajectory, req.outcome, hdpm, |filed| {
            snapshots.save(&filed.to_snapshot())
        })
        .map_err(reject)?;

    Ok(Json(reflection))
}

// --- Retrieval ---

#[derive(Debug, Deserialize)]
struct QueryRequest {
    query: String,
    top_k: Option<usize>,
}

async fn co_retrieve(
    State(state): State<SharedState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<CoRetrieval>, StatusCode> {
    let state = state.read().await;
    let top_k = req.top_k.unwrap_or(state.config.default_top_k);

    let retrieved = state
        .hdpm
        .global_co_retrieval(&req.query, top_k)
        .map_err(reject)?;

    Ok(Json(retrieved))
}

#[derive(Debug, Serialize)]
struct PromptsResponse {
    query: String,
    prompts: BTreeMap<AgentRole, String>,
}

async fn prompts(
    State(state): State<SharedState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<PromptsResponse>, StatusCode> {
    let state = state.read().await;
    let top_k = req.top_k.unwrap_or(state.config.default_top_k);

    let prompts = state
        .hdpm
        .generate_role_specific_prompts(&req.query, top_k)
        .map_err(reject)?;

    Ok(Json(PromptsResponse {
        query: req.query,
        prompts,
    }))
}

// --- Snapshot ---

async fn get_snapshot(State(state): State<SharedState>) -> Json<HdpmSnapshot> {
    let state = state.read().await;
    Json(state.hdpm.to_snapshot())
}

async fn put_snapshot(
    State(state): State<SharedState>,
    Json(snapshot): Json<HdpmSnapshot>,
) -> Result<Json<HdpmStats>, StatusCode> {
    let mut guard = state.write().await;
    let AppState { hdpm, snapshots, .. } = &mut *guard;

    hdpm.restore_and_persist(snapshot, |validated| snapshots.save(validated))
        .map_err(reject)?;

    Ok(Json(hdpm.stats()))
}
