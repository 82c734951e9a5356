//! HTTP gateway.
//!
//! Translates requests into calls on the path resolver and the stores, and
//! streams files back. All state lives on disk; handlers re-read on every
//! request.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/{year}/{month}/{day}/json` | List a day's acquisition files (creates the directory) |
//! | `GET`  | `/api/{year}/{month}/json` | Legacy month-level listing |
//! | `GET`  | `/api/json/{jsonFilename}` | Parsed acquisition JSON |
//! | `GET`  | `/api/img/{detector}/{imageName}` | Detector plot |
//! | `GET`  | `/api/Together/{imageName}`, `/api/img_all/{imageName}` | Combined plot, one subplot per detector |
//! | `GET`  | `/api/Same/{imageName}`, `/api/img_same/{imageName}` | Combined plot, shared axes |
//! | `GET`  | `/api/signal/{detector}/{jsonFilename}` | Raw signal as attachment |
//! | `GET`  | `/api/signal/csv/{detector}/{jsonFilename}` | Signal converted to CSV |
//! | `GET`  | `/api/skim/{detector}?from=&to=` | Tab-separated parameter table |
//! | `GET`/`POST` | `/api/comments/{jsonFilename}` | Comment store |
//! | `GET`/`POST` | `/api/configuration` | Configuration store |
//! | `GET`  | `/api/latest` | Freshness marker |
//! | `GET`  | `/api/reanalyse/{filename}` | Re-run the analysis script |
//! | `POST` | `/api/login`, `/api/logout` | Session cookie |
//! | `GET`  | `/api/profile` | Current session |
//! | `GET`  | `/api/test`, `/health` | Liveness |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "invalid file name: ../x.json" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unauthorized` (401), `not_found` (404),
//! `config_unavailable` (500), `upstream_failure` (500), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::acquisition;
use crate::auth::{self, AuthError, Authenticator, Claims};
use crate::comments::CommentStore;
use crate::config::Config;
use crate::configuration::ConfigurationStore;
use crate::error::StoreError;
use crate::models::{Category, DateKey, Detector};
use crate::paths::PathResolver;
use crate::reanalyse::Reanalyser;
use crate::skim;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    resolver: PathResolver,
    comments: CommentStore,
    configuration: ConfigurationStore,
    reanalyser: Reanalyser,
    /// `None` when no credentials are configured; guarded routes are open.
    auth: Option<Arc<Authenticator>>,
}

impl AppState {
    pub fn from_config(config: &Config) -> Self {
        let resolver = PathResolver::new(&config.data.main_dir);
        Self {
            comments: CommentStore::new(resolver.clone()),
            configuration: ConfigurationStore::new(&config.data.analysis_dir),
            reanalyser: Reanalyser::new(&config.analysis.python, config.script_path()),
            auth: config
                .auth_settings()
                .map(|s| Arc::new(Authenticator::new(s))),
            resolver,
        }
    }
}

/// Builds the router without binding it; used by [`run_server`] and tests.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/test", get(handle_test))
        .route("/api/{year}/{month}/{day}/json", get(handle_list_day))
        .route("/api/{year}/{month}/json", get(handle_list_month))
        .route("/api/json/{json_filename}", get(handle_json_content))
        .route("/api/img/{detector}/{image_name}", get(handle_detector_image))
        .route("/api/Together/{image_name}", get(handle_together_image))
        .route("/api/img_all/{image_name}", get(handle_together_image))
        .route("/api/Same/{image_name}", get(handle_same_image))
        .route("/api/img_same/{image_name}", get(handle_same_image))
        .route("/api/signal/{detector}/{json_filename}", get(handle_signal))
        .route(
            "/api/signal/csv/{detector}/{json_filename}",
            get(handle_signal_csv),
        )
        .route("/api/skim/{detector}", get(handle_skim))
        .route(
            "/api/comments/{json_filename}",
            get(handle_get_comment).post(handle_post_comment),
        )
        .route(
            "/api/configuration",
            get(handle_get_configuration).post(handle_post_configuration),
        )
        .route("/api/latest", get(handle_latest))
        .route("/api/reanalyse/{filename}", get(handle_reanalyse))
        .route("/api/login", post(handle_login))
        .route("/api/logout", post(handle_logout))
        .route("/api/profile", get(handle_profile))
        .fallback(handle_fallback)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `config.bind_addr()` and runs until the process
/// is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.bind_addr();
    let state = AppState::from_config(config);
    if state.auth.is_none() {
        warn!("no credentials configured: comment, configuration and re-analysis routes are open");
    }

    let app = build_router(state);

    info!(
        main_dir = %config.data.main_dir.display(),
        analysis_dir = %config.data.analysis_dir.display(),
        "server listening on http://{}",
        bind_addr
    );

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn app_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> AppError {
    AppError {
        status,
        code,
        message: message.into(),
    }
}

fn unauthorized(message: impl Into<String>) -> AppError {
    app_error(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        let message = err.to_string();
        match err {
            StoreError::InvalidFilename(_)
            | StoreError::InvalidFormat(_)
            | StoreError::InvalidConfiguration(_) => {
                app_error(StatusCode::BAD_REQUEST, "bad_request", message)
            }
            StoreError::NotFound(_) => app_error(StatusCode::NOT_FOUND, "not_found", message),
            StoreError::ConfigUnavailable { .. } => {
                error!(%message, "configuration unavailable");
                app_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "config_unavailable",
                    message,
                )
            }
            StoreError::UpstreamProcessFailure { .. } => app_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "upstream_failure",
                message,
            ),
            StoreError::Io { .. } | StoreError::Corrupt { .. } => {
                error!(%message, "storage error");
                app_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
            }
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Signing(_) => {
                error!(error = %err, "session signing failed");
                app_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", err.to_string())
            }
            _ => unauthorized(err.to_string()),
        }
    }
}

/// Rejects the request unless a valid session cookie is present. Passes
/// through when authentication is not configured.
fn require_session(state: &AppState, headers: &HeaderMap) -> Result<Option<Claims>, AppError> {
    let Some(auth) = &state.auth else {
        return Ok(None);
    };
    let token = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(auth::token_from_cookie_header)
        .ok_or(AuthError::Missing)?;
    Ok(Some(auth.verify(token)?))
}

#[derive(Serialize)]
struct SuccessResponse {
    success: bool,
    message: String,
}

fn success(message: impl Into<String>) -> Json<SuccessResponse> {
    Json(SuccessResponse {
        success: true,
        message: message.into(),
    })
}

/// Streams `path` with the given content type, optionally as an attachment.
async fn stream_file(
    path: &std::path::Path,
    content_type: &'static str,
    attachment: Option<&str>,
) -> Result<Response, AppError> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| StoreError::from_io(path, e))?;
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    if let Some(name) = attachment {
        headers.insert(header::CONTENT_DISPOSITION, disposition(name)?);
    }
    Ok((headers, Body::from_stream(ReaderStream::new(file))).into_response())
}

fn disposition(name: &str) -> Result<HeaderValue, AppError> {
    HeaderValue::from_str(&format!("attachment; filename=\"{}\"", name)).map_err(|e| {
        app_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            format!("bad download name {}: {}", name, e),
        )
    })
}

// ============ Liveness ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn handle_test() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "API is working" }))
}

async fn handle_fallback() -> AppError {
    app_error(StatusCode::NOT_FOUND, "not_found", "Endpoint not found.")
}

// ============ Listings and acquisition content ============

async fn handle_list_day(
    State(state): State<AppState>,
    Path((year, month, day)): Path<(String, String, String)>,
) -> Result<Json<Vec<String>>, AppError> {
    let key = DateKey::from_segments(&year, &month, Some(&day))?;
    Ok(Json(acquisition::list_json_files(&state.resolver, &key).await?))
}

async fn handle_list_month(
    State(state): State<AppState>,
    Path((year, month)): Path<(String, String)>,
) -> Result<Json<Vec<String>>, AppError> {
    let key = DateKey::from_segments(&year, &month, None)?;
    Ok(Json(acquisition::list_json_files(&state.resolver, &key).await?))
}

async fn handle_json_content(
    State(state): State<AppState>,
    Path(json_filename): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    Ok(Json(
        acquisition::read_acquisition(&state.resolver, &json_filename).await?,
    ))
}

// ============ Images ============

async fn serve_image(state: &AppState, image_name: &str, category: Category) -> Result<Response, AppError> {
    let path = acquisition::locate_image(&state.resolver, image_name, &category).await?;
    stream_file(&path, "image/png", None).await
}

async fn handle_detector_image(
    State(state): State<AppState>,
    Path((detector, image_name)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let detector: Detector = detector.parse()?;
    serve_image(&state, &image_name, Category::Detector(detector)).await
}

async fn handle_together_image(
    State(state): State<AppState>,
    Path(image_name): Path<String>,
) -> Result<Response, AppError> {
    serve_image(&state, &image_name, Category::Together).await
}

async fn handle_same_image(
    State(state): State<AppState>,
    Path(image_name): Path<String>,
) -> Result<Response, AppError> {
    serve_image(&state, &image_name, Category::Same).await
}

// ============ Signals ============

async fn handle_signal(
    State(state): State<AppState>,
    Path((detector, json_filename)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let detector: Detector = detector.parse()?;
    let file = acquisition::locate_signal(&state.resolver, &json_filename, &detector).await?;
    stream_file(
        &file.path,
        "text/plain; charset=utf-8",
        Some(&file.download_name),
    )
    .await
}

async fn handle_signal_csv(
    State(state): State<AppState>,
    Path((detector, json_filename)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let detector: Detector = detector.parse()?;
    let (csv, name) =
        acquisition::read_signal_csv(&state.resolver, &json_filename, &detector).await?;
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/csv; charset=utf-8"),
    );
    headers.insert(header::CONTENT_DISPOSITION, disposition(&name)?);
    Ok((headers, csv).into_response())
}

#[derive(Deserialize)]
struct SkimQuery {
    from: String,
    to: String,
}

async fn handle_skim(
    State(state): State<AppState>,
    Path(detector): Path<String>,
    Query(q): Query<SkimQuery>,
) -> Result<Response, AppError> {
    let detector: Detector = detector.parse()?;
    let text = skim::skim_report(&state.resolver, &detector, &q.from, &q.to).await?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        text,
    )
        .into_response())
}

// ============ Comments ============

#[derive(Serialize)]
struct CommentResponse {
    comment: Option<String>,
}

#[derive(Deserialize)]
struct CommentBody {
    comment: String,
}

async fn handle_get_comment(
    State(state): State<AppState>,
    Path(json_filename): Path<String>,
) -> Result<Json<CommentResponse>, AppError> {
    let comment = state.comments.get_comment(&json_filename).await?;
    Ok(Json(CommentResponse { comment }))
}

async fn handle_post_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(json_filename): Path<String>,
    Json(body): Json<CommentBody>,
) -> Result<Json<SuccessResponse>, AppError> {
    require_session(&state, &headers)?;
    state
        .comments
        .set_comment(&json_filename, &body.comment)
        .await?;
    info!(filename = %json_filename, "comment updated");
    Ok(success("Comment updated successfully"))
}

// ============ Configuration ============

async fn handle_get_configuration(
    State(state): State<AppState>,
) -> Result<Json<crate::models::ConfigurationBundle>, AppError> {
    Ok(Json(state.configuration.get_configuration().await?))
}

async fn handle_post_configuration(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(document): Json<serde_json::Value>,
) -> Result<Json<SuccessResponse>, AppError> {
    require_session(&state, &headers)?;
    state.configuration.post_configuration(&document).await?;
    info!("configuration updated");
    Ok(success("Configuration updated successfully"))
}

async fn handle_latest(
    State(state): State<AppState>,
) -> Result<Json<crate::models::LatestMarker>, AppError> {
    Ok(Json(state.configuration.get_latest().await?))
}

async fn handle_reanalyse(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(filename): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    require_session(&state, &headers)?;
    state.reanalyser.run(&state.resolver, &filename).await?;
    Ok(success(format!("{} re-analysed", filename)))
}

// ============ Session ============

#[derive(Deserialize)]
struct LoginBody {
    login: String,
    password: String,
}

#[derive(Serialize)]
struct ProfileResponse {
    login: String,
}

async fn handle_login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> Result<Response, AppError> {
    let auth = state
        .auth
        .as_ref()
        .ok_or_else(|| unauthorized("authentication is not configured"))?;
    let token = auth.login(&body.login, &body.password).map_err(|e| {
        warn!(login = %body.login, "failed login");
        AppError::from(e)
    })?;
    let cookie = HeaderValue::from_str(&auth.session_cookie(&token))
        .map_err(|e| app_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", e.to_string()))?;
    info!(login = %body.login, "logged in");
    Ok(([(header::SET_COOKIE, cookie)], success("Logged in")).into_response())
}

async fn handle_logout() -> Response {
    (
        [(header::SET_COOKIE, auth::clear_cookie())],
        success("Logged out"),
    )
        .into_response()
}

async fn handle_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ProfileResponse>, AppError> {
    if state.auth.is_none() {
        return Err(unauthorized("authentication is not configured"));
    }
    match require_session(&state, &headers)? {
        Some(claims) => Ok(Json(ProfileResponse { login: claims.sub })),
        None => Err(unauthorized("not logged in")),
    }
}
