use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use profile_registry::{
    snapshot, Identity, LeaderboardEntry, Profile, RegistryConfig, RegistryError, RegistryService,
    RegistryStats,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Header carrying the trusted caller identity. The hosting environment
/// in front of this server authenticates callers; here the value is
/// taken at face value.
const IDENTITY_HEADER: &str = "x-registry-identity";

fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

// ========== Request/response payloads ==========

#[derive(Deserialize)]
struct CreateProfileRequest {
    handle: String,
    content_pointer: String,
}

#[derive(Deserialize)]
struct UpdateProfileRequest {
    content_pointer: String,
}

#[derive(Deserialize)]
struct PageQuery {
    #[serde(default)]
    offset: usize,
    #[serde(default = "default_page_limit")]
    limit: usize,
}

fn default_page_limit() -> usize {
    50
}

#[derive(Deserialize)]
struct LeaderboardQuery {
    /// Defaults to the full leaderboard when absent.
    limit: Option<usize>,
}

#[derive(Serialize)]
struct UpdateResponse {
    previous_pointer: String,
    profile: Profile,
}

#[derive(Serialize)]
struct ViewResponse {
    identity: Identity,
    view_count: u64,
}

#[derive(Serialize)]
struct AvailabilityResponse {
    handle: String,
    available: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    kind: &'static str,
}

// ========== Error mapping ==========

struct ApiError(RegistryError);

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use profile_registry::ErrorKind;

        let status = match self.0.kind() {
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::AlreadyExists => StatusCode::CONFLICT,
            ErrorKind::OutOfRange => StatusCode::RANGE_NOT_SATISFIABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = ErrorResponse {
            error: self.0.to_string(),
            kind: self.0.kind().as_str(),
        };

        (status, Json(body)).into_response()
    }
}

/// Pull the trusted caller identity out of the request headers.
fn caller_identity(headers: &HeaderMap) -> Result<Identity, Response> {
    match headers.get(IDENTITY_HEADER).and_then(|v| v.to_str().ok()) {
        Some(value) if !value.is_empty() => Ok(Identity::new(value)),
        _ => {
            let body = ErrorResponse {
                error: format!("Missing {IDENTITY_HEADER} header"),
                kind: "invalid_input",
            };
            Err((StatusCode::BAD_REQUEST, Json(body)).into_response())
        }
    }
}

// ========== Handlers ==========

async fn create_profile_handler(
    State(service): State<Arc<RegistryService>>,
    headers: HeaderMap,
    Json(request): Json<CreateProfileRequest>,
) -> Response {
    let caller = match caller_identity(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    match service.create_profile(&caller, &request.content_pointer, &request.handle) {
        Ok(profile) => (StatusCode::CREATED, Json(profile)).into_response(),
        Err(err) => ApiError(err).into_response(),
    }
}

async fn update_profile_handler(
    State(service): State<Arc<RegistryService>>,
    headers: HeaderMap,
    Json(request): Json<UpdateProfileRequest>,
) -> Response {
    let caller = match caller_identity(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    match service.update_profile(&caller, &request.content_pointer) {
        Ok((previous_pointer, profile)) => Json(UpdateResponse {
            previous_pointer,
            profile,
        })
        .into_response(),
        Err(err) => ApiError(err).into_response(),
    }
}

async fn record_view_handler(
    State(service): State<Arc<RegistryService>>,
    Path(identity): Path<String>,
) -> Result<Json<ViewResponse>, ApiError> {
    let identity = Identity::new(identity);
    let view_count = service.record_view(&identity)?;
    Ok(Json(ViewResponse {
        identity,
        view_count,
    }))
}

async fn admin_override_handler(
    State(service): State<Arc<RegistryService>>,
    Path(identity): Path<String>,
    headers: HeaderMap,
    Json(request): Json<UpdateProfileRequest>,
) -> Response {
    let caller = match caller_identity(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    let target = Identity::new(identity);
    match service.admin_override(&caller, &target, &request.content_pointer) {
        Ok((previous_pointer, profile)) => Json(UpdateResponse {
            previous_pointer,
            profile,
        })
        .into_response(),
        Err(err) => ApiError(err).into_response(),
    }
}

async fn get_profile_handler(
    State(service): State<Arc<RegistryService>>,
    Path(identity): Path<String>,
) -> Result<Json<Profile>, ApiError> {
    Ok(Json(service.profile(&Identity::new(identity))?))
}

async fn get_by_handle_handler(
    State(service): State<Arc<RegistryService>>,
    Path(handle): Path<String>,
) -> Result<Json<Profile>, ApiError> {
    Ok(Json(service.profile_by_handle(&handle)?))
}

async fn handle_available_handler(
    State(service): State<Arc<RegistryService>>,
    Path(handle): Path<String>,
) -> Json<AvailabilityResponse> {
    let available = service.is_handle_available(&handle);
    Json(AvailabilityResponse { handle, available })
}

async fn list_identities_handler(
    State(service): State<Arc<RegistryService>>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<Identity>>, ApiError> {
    Ok(Json(service.list_identities(page.offset, page.limit)?))
}

async fn leaderboard_handler(
    State(service): State<Arc<RegistryService>>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>, ApiError> {
    let limit = query.limit.unwrap_or_else(|| service.profile_count());
    Ok(Json(service.top_profiles(limit)?))
}

async fn stats_handler(State(service): State<Arc<RegistryService>>) -> Json<RegistryStats> {
    Json(service.stats())
}

// ========== Startup ==========

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Check if we should enable tokio-console
    if std::env::var("TOKIO_CONSOLE").is_ok() {
        console_subscriber::init();
        info!("tokio-console enabled on port 6669");
    } else {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,profile_registry=debug"));
        fmt().with_env_filter(env_filter).with_target(true).init();
    }

    let admin_identity = std::env::var("REGISTRY_ADMIN_IDENTITY")
        .unwrap_or_else(|_| "registry-admin".to_string());

    let snapshot_file = std::env::var("SNAPSHOT_FILE")
        .unwrap_or_else(|_| "./data/registry_snapshot.json".to_string());

    let snapshot_interval_secs: u64 = std::env::var("SNAPSHOT_INTERVAL_SECS")
        .unwrap_or_else(|_| "30".to_string())
        .parse()
        .unwrap_or(30);

    let stats_log_interval_secs: u64 = std::env::var("STATS_LOG_INTERVAL_SECS")
        .unwrap_or_else(|_| "60".to_string())
        .parse()
        .unwrap_or(60);

    let config = RegistryConfig {
        admin_identity: Identity::new(admin_identity),
        snapshot_file: PathBuf::from(snapshot_file),
        snapshot_interval: Duration::from_secs(snapshot_interval_secs),
        stats_log_interval: Duration::from_secs(stats_log_interval_secs),
    };

    // Load any previous snapshot before accepting traffic
    let store = snapshot::load_or_default(&config.snapshot_file)
        .map_err(|e| anyhow::anyhow!("Failed to load snapshot: {e}"))?;

    let (service, fact_rx) = RegistryService::with_store(config.clone(), store);
    let service = Arc::new(service);

    // Coordinated shutdown for all background tasks
    let cancellation_token = CancellationToken::new();
    let task_tracker = TaskTracker::new();

    // Fact consumer: the observability collaborator. Logs every mutation
    // fact as one JSON line.
    let fact_token = cancellation_token.clone();
    task_tracker.spawn(async move {
        loop {
            tokio::select! {
                _ = fact_token.cancelled() => {
                    info!("Fact consumer cancelled, exiting");
                    break;
                }
                fact = fact_rx.recv_async() => {
                    match fact {
                        Ok(fact) => match serde_json::to_string(&fact) {
                            Ok(json) => info!("fact: {json}"),
                            Err(e) => warn!("Failed to serialize fact: {e}"),
                        },
                        Err(_) => {
                            // Sender dropped, registry is gone
                            break;
                        }
                    }
                }
            }
        }
    });

    // Periodically log aggregate stats
    let stats_service = service.clone();
    let stats_token = cancellation_token.clone();
    let stats_interval = config.stats_log_interval;
    task_tracker.spawn(async move {
        loop {
            tokio::select! {
                _ = stats_token.cancelled() => {
                    info!("Stats logger cancelled, exiting");
                    break;
                }
                _ = tokio::time::sleep(stats_interval) => {
                    let stats = stats_service.stats();
                    info!(
                        "Registry stats: profiles={}, total_views={}",
                        stats.profile_count, stats.total_views
                    );
                }
            }
        }
    });

    // Periodically rewrite the snapshot
    let snapshot_service = service.clone();
    let snapshot_token = cancellation_token.clone();
    let snapshot_path = config.snapshot_file.clone();
    let snapshot_interval = config.snapshot_interval;
    task_tracker.spawn(async move {
        loop {
            tokio::select! {
                _ = snapshot_token.cancelled() => {
                    info!("Snapshot saver cancelled, exiting");
                    break;
                }
                _ = tokio::time::sleep(snapshot_interval) => {
                    let profiles = snapshot_service.snapshot_profiles();
                    if let Err(e) =
                        snapshot::save_snapshot(profiles, unix_now(), &snapshot_path).await
                    {
                        error!("Failed to save registry snapshot: {e}");
                    }
                }
            }
        }
    });

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route(
            "/profiles",
            get(list_identities_handler).post(create_profile_handler),
        )
        .route("/profiles/me", put(update_profile_handler))
        .route("/profiles/{identity}", get(get_profile_handler))
        .route("/profiles/{identity}/views", post(record_view_handler))
        .route("/admin/profiles/{identity}", post(admin_override_handler))
        .route("/handles/{handle}", get(get_by_handle_handler))
        .route("/handles/{handle}/available", get(handle_available_handler))
        .route("/leaderboard", get(leaderboard_handler))
        .route("/stats", get(stats_handler))
        .layer(cors)
        .with_state(service.clone());

    let bind_addr =
        std::env::var("REGISTRY_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let addr: SocketAddr = bind_addr.parse()?;

    info!(
        "🚀 Profile registry listening on {} ({} profiles loaded)",
        addr,
        service.profile_count()
    );

    // Handle shutdown signal
    let shutdown_token = cancellation_token.clone();
    let shutdown_signal = async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Shutdown signal received, stopping services...");
        shutdown_token.cancel();
    };

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server stopped, shutting down services...");
    cancellation_token.cancel();
    task_tracker.close();

    match tokio::time::timeout(Duration::from_secs(30), task_tracker.wait()).await {
        Ok(()) => info!("All background tasks completed"),
        Err(_) => error!("Timeout waiting for background tasks to complete"),
    }

    // Final snapshot so a restart resumes from current state
    let profiles = service.snapshot_profiles();
    if let Err(e) = snapshot::save_snapshot(profiles, unix_now(), &config.snapshot_file).await {
        error!("Failed to save final snapshot: {e}");
    }

    info!("Clean shutdown complete");

    Ok(())
}
