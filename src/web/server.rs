//! Axum HTTP server for the record API.
//!
//! Handles all `/api` routes: trials, staffing, reference data, and health.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderValue, Method, StatusCode, header},
    response::Response,
    routing::get,
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowHeaders, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::db::{JoinStrategy, ListVariant, Store, query::TRIALS_BY_STAFF_USER};
use crate::error::ServerError;
use crate::records::{AssignmentInput, StaffRecords, TrialInput, TrialRecords, parse_id};
use crate::web::response::{Endpoint, error_response, respond, validation_error};
use crate::web::types::{ApiResponse, AssignmentListQuery, HealthResponse, TrialsByUserQuery};

/// Largest accepted request body.
const BODY_LIMIT: usize = 64 * 1024;

/// Shared state for all handlers.
pub struct AppState {
    pub trials: TrialRecords,
    pub staff: StaffRecords,
    backend: &'static str,
    /// Shutdown signal sender.
    pub shutdown_tx: tokio::sync::RwLock<Option<oneshot::Sender<()>>>,
    /// Server startup time for uptime calculation.
    pub startup_time: Instant,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            backend: store.backend_name(),
            trials: TrialRecords::new(Arc::clone(&store)),
            staff: StaffRecords::new(store),
            shutdown_tx: tokio::sync::RwLock::new(None),
            startup_time: Instant::now(),
        }
    }

    /// Signal the running server to stop accepting connections.
    pub async fn shutdown(&self) {
        if let Some(tx) = self.shutdown_tx.write().await.take() {
            let _ = tx.send(());
        }
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>, frontend_origin: HeaderValue) -> Router {
    let api = Router::new()
        .route("/api/health", get(health_handler))
        .route(
            "/api/trials",
            get(trials_list_handler).post(trials_create_handler),
        )
        .route(
            "/api/trials/{id}",
            get(trials_get_handler)
                .put(trials_update_handler)
                .delete(trials_delete_handler),
        )
        .route("/api/trials/crc/{user_id}", get(trials_by_crc_handler))
        .route("/api/trials/users/{user_id}", get(trials_by_user_handler))
        .route("/api/trial-staff-roles", get(roles_list_handler))
        .route("/api/staff-users", get(staff_users_list_handler))
        .route(
            "/api/trial-staff",
            get(assignments_list_handler).post(assignments_create_handler),
        )
        .route(
            "/api/trial-staff/{id}",
            axum::routing::delete(assignments_delete_handler),
        )
        .fallback(not_found_handler)
        .method_not_allowed_fallback(method_not_allowed_handler);

    let cors = CorsLayer::new()
        .allow_origin(frontend_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
        ]))
        .allow_credentials(true);

    api.layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
///
/// Returns the actual bound `SocketAddr` (useful when binding to port 0) and
/// the serving task, which finishes after [`AppState::shutdown`].
pub async fn start_server(
    config: &ServerConfig,
    state: Arc<AppState>,
) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
    let addr = config.addr();
    let origin = HeaderValue::from_str(&config.frontend_origin).map_err(|e| {
        ServerError::StartupFailed {
            reason: format!("invalid frontend origin '{}': {}", config.frontend_origin, e),
        }
    })?;

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        ServerError::StartupFailed {
            reason: format!("Failed to bind to {}: {}", addr, e),
        }
    })?;
    let bound_addr = listener
        .local_addr()
        .map_err(|e| ServerError::StartupFailed {
            reason: format!("Failed to get local addr: {}", e),
        })?;

    let app = router(Arc::clone(&state), origin);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    *state.shutdown_tx.write().await = Some(shutdown_tx);

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("HTTP server shutting down");
            })
            .await
        {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    tracing::info!(addr = %bound_addr, "HTTP server listening");
    Ok((bound_addr, handle))
}

fn path_id(raw: &str) -> Result<i64, Response> {
    parse_id(raw).ok_or_else(|| {
        validation_error(format!(
            "Invalid identifier '{raw}': expected a positive number"
        ))
    })
}

fn trial_body(payload: Result<Json<TrialInput>, JsonRejection>) -> Result<TrialInput, Response> {
    let Json(input) = payload.map_err(|e| validation_error(e.body_text()))?;
    input.validate().map_err(validation_error)?;
    Ok(input)
}

// --- Health ---

async fn health_handler(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse {
        success: true,
        message: "Service is healthy".to_string(),
        data: Some(HealthResponse {
            status: "healthy",
            version: env!("CARGO_PKG_VERSION"),
            backend: state.backend,
            uptime_secs: state.startup_time.elapsed().as_secs(),
        }),
    })
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Route not found")
}

async fn method_not_allowed_handler(method: Method) -> Response {
    error_response(
        StatusCode::METHOD_NOT_ALLOWED,
        format!("Method {method} is not allowed on this route"),
    )
}

// --- Trials ---

async fn trials_list_handler(State(state): State<Arc<AppState>>) -> Response {
    respond(
        Endpoint::List,
        state.trials.list(None, ListVariant::Plain).await,
    )
}

async fn trials_get_handler(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Response {
    let id = match path_id(&raw_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    respond(Endpoint::Fetch, state.trials.get(id).await)
}

async fn trials_by_crc_handler(
    State(state): State<Arc<AppState>>,
    Path(raw_user_id): Path<String>,
) -> Response {
    let user_id = match path_id(&raw_user_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let variant = ListVariant::Related(&TRIALS_BY_STAFF_USER, JoinStrategy::Inner);
    respond(Endpoint::List, state.trials.list(Some(user_id), variant).await)
}

async fn trials_by_user_handler(
    State(state): State<Arc<AppState>>,
    Path(raw_user_id): Path<String>,
    query: Result<Query<TrialsByUserQuery>, QueryRejection>,
) -> Response {
    let user_id = match path_id(&raw_user_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let Query(params) = match query {
        Ok(query) => query,
        Err(e) => return validation_error(e.body_text()),
    };
    let join = match params.join.as_deref().map(str::trim) {
        None | Some("") | Some("inner") => JoinStrategy::Inner,
        Some("left") => JoinStrategy::LeftFiltered,
        Some(other) => {
            return validation_error(format!(
                "Invalid join '{other}': expected 'inner' or 'left'"
            ));
        }
    };
    let variant = ListVariant::Related(&TRIALS_BY_STAFF_USER, join);
    respond(Endpoint::List, state.trials.list(Some(user_id), variant).await)
}

async fn trials_create_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TrialInput>, JsonRejection>,
) -> Response {
    let input = match trial_body(payload) {
        Ok(input) => input,
        Err(response) => return response,
    };
    respond(Endpoint::Create, state.trials.create(&input).await)
}

async fn trials_update_handler(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    payload: Result<Json<TrialInput>, JsonRejection>,
) -> Response {
    let id = match path_id(&raw_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let input = match trial_body(payload) {
        Ok(input) => input,
        Err(response) => return response,
    };
    respond(Endpoint::Update, state.trials.update(id, &input).await)
}

async fn trials_delete_handler(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Response {
    let id = match path_id(&raw_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    respond(Endpoint::Delete, state.trials.delete(id).await)
}

// --- Staffing ---

async fn roles_list_handler(State(state): State<Arc<AppState>>) -> Response {
    respond(Endpoint::List, state.staff.list_roles().await)
}

async fn staff_users_list_handler(State(state): State<Arc<AppState>>) -> Response {
    respond(Endpoint::List, state.staff.list_staff_users().await)
}

async fn assignments_list_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<AssignmentListQuery>, QueryRejection>,
) -> Response {
    let Query(params) = match query {
        Ok(query) => query,
        Err(e) => return validation_error(e.body_text()),
    };
    let trial_id = match params.trial_id.as_deref() {
        None => None,
        Some(raw) => match path_id(raw) {
            Ok(id) => Some(id),
            Err(response) => return response,
        },
    };
    respond(Endpoint::List, state.staff.list_assignments(trial_id).await)
}

async fn assignments_create_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AssignmentInput>, JsonRejection>,
) -> Response {
    let Json(input) = match payload {
        Ok(payload) => payload,
        Err(e) => return validation_error(e.body_text()),
    };
    respond(Endpoint::Create, state.staff.create_assignment(input).await)
}

async fn assignments_delete_handler(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Response {
    let id = match path_id(&raw_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    respond(Endpoint::Delete, state.staff.delete_assignment(id).await)
}
