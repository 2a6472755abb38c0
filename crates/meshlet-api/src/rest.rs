//! REST API handlers

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::Json,
    routing::{get, put},
    Router,
};
use chrono::{DateTime, Utc};
use meshlet_core::{ApiConfig, CompiledDiscoveryChain, ConfigSnapshot, MeshletError};
use meshlet_xds::{endpoints_from_snapshot, ClusterLoadAssignment};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Header carrying the caller's access token
pub const TOKEN_HEADER: &str = "x-mesh-token";

/// The snapshot currently served, and when it was published
#[derive(Debug, Clone)]
pub struct LoadedSnapshot {
    pub snapshot: Arc<ConfigSnapshot>,
    pub loaded_at: DateTime<Utc>,
}

/// Application state shared across handlers
#[derive(Debug, Default)]
pub struct AppState {
    current: RwLock<Option<LoadedSnapshot>>,
}

impl AppState {
    /// Create state, optionally seeded with a snapshot
    pub fn new(snapshot: Option<ConfigSnapshot>) -> Self {
        Self {
            current: RwLock::new(snapshot.map(|s| LoadedSnapshot {
                snapshot: Arc::new(s),
                loaded_at: Utc::now(),
            })),
        }
    }

    /// Replace the served snapshot
    pub async fn publish(&self, snapshot: ConfigSnapshot) {
        *self.current.write().await = Some(LoadedSnapshot {
            snapshot: Arc::new(snapshot),
            loaded_at: Utc::now(),
        });
    }

    /// The served snapshot. Callers get their own handle, so a concurrent
    /// publish never changes the view they are working on.
    pub async fn current(&self) -> Option<LoadedSnapshot> {
        self.current.read().await.clone()
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>, config: &ApiConfig) -> Router {
    let router = Router::new()
        .route("/v1/discovery/chain/", get(read_discovery_chain))
        .route("/v1/discovery/chain/*service", get(read_discovery_chain))
        .route("/v1/snapshot", put(put_snapshot))
        .route("/v1/endpoints", get(get_endpoints))
        .route("/v1/status", get(get_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if config.cors_enabled {
        router.layer(cors_layer(&config.cors_origins))
    } else {
        router
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new().allow_origin(AllowOrigin::list(origins))
}

fn error_response(err: MeshletError) -> (StatusCode, String) {
    let status = match err {
        MeshletError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        MeshletError::ChainNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

/// Query parameters for a discovery chain lookup
#[derive(Debug, Default, Deserialize)]
pub struct ChainQuery {
    /// Datacenter the chain was compiled in
    pub dc: Option<String>,
}

/// Look up a compiled discovery chain by service name
async fn read_discovery_chain(
    State(state): State<Arc<AppState>>,
    service: Option<Path<String>>,
    Query(query): Query<ChainQuery>,
) -> Result<Json<CompiledDiscoveryChain>, (StatusCode, String)> {
    let service = service
        .map(|Path(s)| s.trim_matches('/').to_string())
        .unwrap_or_default();
    if service.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Missing service name".to_string()));
    }

    let current = state.current().await;
    current
        .as_ref()
        .and_then(|c| c.snapshot.find_chain(&service, query.dc.as_deref()))
        .cloned()
        .map(Json)
        .ok_or_else(|| error_response(MeshletError::ChainNotFound(service)))
}

/// Publish a new snapshot
async fn put_snapshot(
    State(state): State<Arc<AppState>>,
    Json(snapshot): Json<ConfigSnapshot>,
) -> StatusCode {
    info!(
        proxy = %snapshot.proxy_id,
        kind = %snapshot.kind,
        upstreams = snapshot.proxy.upstreams.len(),
        "Publishing snapshot"
    );

    state.publish(snapshot).await;
    StatusCode::NO_CONTENT
}

/// Synthesize endpoint resources from the served snapshot
async fn get_endpoints(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<ClusterLoadAssignment>>, (StatusCode, String)> {
    let token = headers
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let current = state.current().await;
    let snapshot = current.as_ref().map(|c| c.snapshot.as_ref());

    endpoints_from_snapshot(snapshot, token)
        .map(Json)
        .map_err(|e| error_response(e.into()))
}

/// System status response
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub snapshot_loaded: bool,
    pub proxy_id: Option<String>,
    pub upstreams: usize,
    pub loaded_at: Option<DateTime<Utc>>,
}

/// Get system status
async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let current = state.current().await;

    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        snapshot_loaded: current.is_some(),
        proxy_id: current.as_ref().map(|c| c.snapshot.proxy_id.clone()),
        upstreams: current
            .as_ref()
            .map_or(0, |c| c.snapshot.proxy.upstreams.len()),
        loaded_at: current.map(|c| c.loaded_at),
    })
}
