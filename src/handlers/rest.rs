//! REST API for location reports.
//!
//! Endpoints:
//! - `POST /location`: record a position report
//! - `GET /user/{username}`: latest position and retained history of one user
//! - `GET /users`: latest position of every user
//! - `GET /api/health`: health check
//!
//! When a static directory is configured, `/` serves its `index.html` and
//! `/users-page` serves `users.html`.

use std::future::Future;
use std::path::Path;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path as UrlPath, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::{ServerConfig, StorageModel};
use crate::record::{LocationRecord, LocationReport, UserPosition};
use crate::services::{LocationError, QueryService, UserTrack};

/// Start the REST server and run until `shutdown` resolves.
///
/// When the configured port is 0, the OS assigns an ephemeral port. The
/// actual bound port is always logged so it can be discovered.
pub async fn serve<F>(
    service: QueryService,
    config: &ServerConfig,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = app(service, config);
    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    let actual_port = listener.local_addr()?.port();
    info!(port = actual_port, "location REST API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("location REST API stopped");
    Ok(())
}

/// Full application: API routes, optional static pages, tracing, timeout.
pub fn app(service: QueryService, config: &ServerConfig) -> Router {
    let mut app = router(service);
    if let Some(dir) = &config.static_dir {
        app = with_static_pages(app, dir);
    }

    app.layer(TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        config.request_timeout(),
    ))
        .layer(TraceLayer::new_for_http())
}

/// Build the API router (separated for testing).
pub fn router(service: QueryService) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        .route("/location", post(report_location))
        .route("/user/{username}", get(user_location))
        .route("/users", get(all_users))
        .layer(cors)
        .with_state(service)
}

fn with_static_pages(app: Router, dir: &Path) -> Router {
    app.route_service("/users-page", ServeFile::new(dir.join("users.html")))
        .fallback_service(ServeDir::new(dir))
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn report_location(
    State(service): State<QueryService>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<SavedResponse>), ApiError> {
    // Without a JSON content type the body is ignored, as if no fields were sent.
    let body = match body {
        Ok(Json(body)) => body,
        Err(JsonRejection::MissingJsonContentType(_)) => Value::Object(Default::default()),
        Err(rejection) => return Err(ApiError::bad_request(rejection.body_text())),
    };
    let report = LocationReport::from_json(&body)
        .map_err(|e| ApiError::from_location(e.into(), "Failed to save location"))?;

    let record = service
        .report(report)
        .await
        .map_err(|e| ApiError::from_location(e, "Failed to save location"))?;

    // Replacing the latest row is idempotent, so it is not a creation.
    let status = match service.model() {
        StorageModel::History => StatusCode::CREATED,
        StorageModel::Latest => StatusCode::OK,
    };

    Ok((
        status,
        Json(SavedResponse {
            message: "Location saved",
            data: record,
        }),
    ))
}

async fn user_location(
    State(service): State<QueryService>,
    UrlPath(username): UrlPath<String>,
) -> Result<Json<UserTrack>, ApiError> {
    let track = service
        .user_track(&username)
        .await
        .map_err(|e| ApiError::from_location(e, "Failed to fetch user location"))?;
    Ok(Json(track))
}

async fn all_users(State(service): State<QueryService>) -> Result<Json<UsersResponse>, ApiError> {
    let users = service
        .all_latest()
        .await
        .map_err(|e| ApiError::from_location(e, "Failed to fetch users"))?;
    Ok(Json(UsersResponse {
        count: users.len(),
        users,
    }))
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
struct SavedResponse {
    message: &'static str,
    data: LocationRecord,
}

#[derive(Serialize)]
struct UsersResponse {
    count: usize,
    users: Vec<UserPosition>,
}

/// Error response rendered as `{"error": message}`.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// Map a service error to a response. Storage failures are logged here
    /// and reported to the caller as `failure` only.
    fn from_location(err: LocationError, failure: &'static str) -> Self {
        match err {
            LocationError::Validation(e) => Self::bad_request(e.to_string()),
            LocationError::NotFound { .. } => Self {
                status: StatusCode::NOT_FOUND,
                message: "User location not found".to_string(),
            },
            LocationError::Storage(e) => {
                error!(error = %e, "{}", failure);
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: failure.to_string(),
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
