//! HTTP gateway for the ELIZA engine.
//!
//! Exposes a chat-completion endpoint in the familiar OpenAI envelope, a
//! model listing, a health check and a small landing page. Conversations are
//! keyed by `session_id`: each turn loads the stored snapshot, answers the
//! last user message and writes the snapshot back.
//!
//! Built on Axum.

pub mod api_v1;
pub mod frontend;
pub mod rules;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, header};
use axum::{Router, response::Json, routing::get};
use eliza_config::{AppConfig, SessionBackend};
use eliza_core::{SessionError, SessionId, SessionStore};
use eliza_engine::{
    Conversation, DEFAULT_MAX_UTTERANCE_WORDS, DEFAULT_MEMORY_CAPACITY, RuleDefinitionError, RuleSet,
};
use eliza_sessions::{FileSessionStore, InMemorySessionStore, SessionSweeper};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tracing::info;

pub use rules::{BUILTIN_PACKS, build_rules, builtin_pack};

/// Model name reported in responses and `/v1/models`.
pub const MODEL_NAME: &str = "eliza-simulator";

/// Request bodies above this size are rejected.
const MAX_BODY_BYTES: usize = 256 * 1024;

/// Above this many idle lock entries the map is pruned.
const LOCK_PRUNE_THRESHOLD: usize = 1_024;

/// Errors raised while assembling or running the gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("rule file {}: {source}", path.display())]
    RuleFile {
        path: PathBuf,
        #[source]
        source: RuleDefinitionError,
    },

    #[error(transparent)]
    Rules(#[from] RuleDefinitionError),

    #[error("unknown built-in rule pack '{0}' (available: zh)")]
    UnknownPack(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-session turn locks. Two requests for the same session never run
/// their load/respond/save cycle concurrently.
#[derive(Default)]
struct SessionLocks {
    inner: Mutex<HashMap<SessionId, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionLocks {
    fn get(&self, id: &SessionId) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if map.len() > LOCK_PRUNE_THRESHOLD {
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        map.entry(id.clone()).or_default().clone()
    }
}

/// Shared application state.
pub struct AppState {
    rules: Arc<RuleSet>,
    store: Arc<dyn SessionStore>,
    memory_capacity: usize,
    max_utterance_words: usize,
    request_timeout: Duration,
    started_at: chrono::DateTime<chrono::Utc>,
    locks: SessionLocks,
}

impl AppState {
    pub fn new(rules: Arc<RuleSet>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            rules,
            store,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            max_utterance_words: DEFAULT_MAX_UTTERANCE_WORDS,
            request_timeout: Duration::from_secs(30),
            started_at: chrono::Utc::now(),
            locks: SessionLocks::default(),
        }
    }

    pub fn with_memory_capacity(mut self, capacity: usize) -> Self {
        self.memory_capacity = capacity;
        self
    }

    pub fn with_max_utterance_words(mut self, limit: usize) -> Self {
        self.max_utterance_words = limit;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn rules(&self) -> &Arc<RuleSet> {
        &self.rules
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// A fresh conversation over the shared rule set.
    pub fn new_conversation(&self) -> Conversation {
        Conversation::new(self.rules.clone())
            .with_memory_capacity(self.memory_capacity)
            .with_max_words(self.max_utterance_words)
    }

    pub(crate) fn max_utterance_words(&self) -> usize {
        self.max_utterance_words
    }

    pub(crate) fn session_lock(&self, id: &SessionId) -> Arc<tokio::sync::Mutex<()>> {
        self.locks.get(id)
    }
}

pub type SharedState = Arc<AppState>;

/// Open the session store selected by `[sessions]`.
pub fn open_store(config: &AppConfig) -> Arc<dyn SessionStore> {
    match config.sessions.backend {
        SessionBackend::File => Arc::new(FileSessionStore::new(config.sessions_dir())),
        SessionBackend::Memory => Arc::new(InMemorySessionStore::new()),
    }
}

/// Build the full router.
///
/// Layers applied:
/// - per-request timeout
/// - request body size limit
/// - permissive CORS for browser clients
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(3600));
    let timeout = state.request_timeout;

    Router::new()
        .route("/health", get(health_handler))
        .with_state(state.clone())
        .nest("/v1", api_v1::v1_router(state))
        .merge(frontend::frontend_router())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(timeout))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
///
/// Loads the rule set once, opens the session store, starts the session
/// sweeper in the background and serves until the listener fails.
pub async fn start(config: AppConfig) -> Result<(), GatewayError> {
    let addr = config.bind_address();

    let rules = Arc::new(build_rules(&config.engine)?);
    let store = open_store(&config);
    info!(backend = store.name(), "Session store ready");

    let sweeper = SessionSweeper::from_hours(
        store.clone(),
        config.sessions.max_age_hours,
        config.sessions.sweep_interval_minutes,
    )
    .start();

    let state = Arc::new(
        AppState::new(rules, store)
            .with_memory_capacity(config.engine.memory_capacity)
            .with_max_utterance_words(config.engine.max_utterance_words)
            .with_request_timeout(Duration::from_secs(config.gateway.request_timeout_secs)),
    );
    let app = build_router(state);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let served = axum::serve(listener, app).await;
    sweeper.abort();
    served?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize, Deserialize)]
struct HealthResponse {
    status: String,
    /// Seconds since the Unix epoch
    timestamp: f64,
    version: String,
}

async fn health_handler() -> Json<HealthResponse> {
    let now = chrono::Utc::now();
    Json(HealthResponse {
        status: "healthy".into(),
        timestamp: now.timestamp_millis() as f64 / 1000.0,
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    pub(crate) fn test_state() -> SharedState {
        let rules = build_rules(&eliza_config::EngineConfig::default()).unwrap();
        Arc::new(AppState::new(
            Arc::new(rules),
            Arc::new(InMemorySessionStore::new()),
        ))
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = build_router(test_state());

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let health: HealthResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
        assert!(health.timestamp > 1_600_000_000.0);
    }

    #[tokio::test]
    async fn landing_page_is_mounted() {
        let app = build_router(test_state());
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let app = build_router(test_state());
        let req = Request::builder()
            .uri("/v1/embeddings")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn store_follows_backend_setting() {
        let mut config = AppConfig::default();
        config.sessions.backend = SessionBackend::Memory;
        assert_eq!(open_store(&config).name(), "memory");

        let tmp = tempfile::TempDir::new().unwrap();
        config.sessions.backend = SessionBackend::File;
        config.sessions.dir = Some(tmp.path().to_path_buf());
        assert_eq!(open_store(&config).name(), "file");
    }

    #[test]
    fn session_locks_are_shared_per_id() {
        let locks = SessionLocks::default();
        let id = SessionId::parse("abc").unwrap();
        let a = locks.get(&id);
        let b = locks.get(&id);
        assert!(Arc::ptr_eq(&a, &b));
        let other = locks.get(&SessionId::parse("xyz").unwrap());
        assert!(!Arc::ptr_eq(&a, &other));
    }
}
