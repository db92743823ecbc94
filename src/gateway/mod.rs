//! Axum-based HTTP gateway.
//!
//! Pages:
//! - `GET /` → `/login`
//! - `GET /login`, `GET /dashboard` (session required), `GET /logout`
//!
//! JSON API:
//! - `POST /api/login`: weekly-limited password login, sets the session cookie
//! - `POST /api/face-analysis`: multipart `image` upload, session required
//! - `GET /health`

pub mod pages;

use crate::auth::{self, LoginPolicy, Session, SessionSigner, UserStore};
use crate::config::Config;
use crate::detect::{AnalysisReport, CommandDetector, FaceRelay};
use crate::error::AppError;
use anyhow::{Context, Result};
use axum::{
    extract::{
        multipart::MultipartRejection, rejection::JsonRejection, DefaultBodyLimit, FromRef,
        Multipart, State,
    },
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Request timeout (120s). Also bounds the external detector.
pub const REQUEST_TIMEOUT_SECS: u64 = 120;

const NO_IMAGE_MESSAGE: &str = "No image uploaded";

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UserStore>,
    pub policy: LoginPolicy,
    pub sessions: Arc<SessionSigner>,
    pub relay: Arc<FaceRelay>,
}

impl FromRef<AppState> for Arc<SessionSigner> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.sessions)
    }
}

/// Build the router with body limit and timeout middleware.
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(handle_root))
        .route("/login", get(handle_login_page))
        .route("/dashboard", get(handle_dashboard))
        .route("/logout", get(handle_logout))
        .route("/health", get(handle_health))
        .route("/api/login", post(handle_login))
        .route("/api/face-analysis", post(handle_face_analysis))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
}

/// Open the user store, wire the detector and serve until Ctrl-C / SIGTERM.
pub async fn run_gateway(config: Config) -> Result<()> {
    let seed = auth::store::seed_users(&config.seed.username, &config.seed.password);
    let store = auth::JsonFileStore::open(&config.users_file, &seed)?;
    tracing::info!(path = %store.path().display(), "User store ready");

    let detector = CommandDetector::new(config.detector.command.clone(), config.detector.args.clone());
    let relay = FaceRelay::new(&config.upload_dir, Arc::new(detector))?;
    tracing::info!(
        upload_dir = %config.upload_dir.display(),
        detector = relay.detector_name(),
        "Face relay ready"
    );

    let state = AppState {
        store: Arc::new(store),
        policy: config.login_policy(),
        sessions: Arc::new(SessionSigner::new(&config.session_secret)),
        relay: Arc::new(relay),
    };
    let app = build_router(state, config.max_upload_bytes);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.host, config.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Gateway listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// PAGE HANDLERS
// ══════════════════════════════════════════════════════════════════════════════

/// GET /, always to the login page
async fn handle_root() -> Redirect {
    Redirect::to("/login")
}

/// GET /login
async fn handle_login_page() -> Html<String> {
    Html(pages::render_login_page())
}

/// GET /dashboard, redirects anonymous visitors to /login
async fn handle_dashboard(session: Session) -> Response {
    match session.username() {
        Some(username) => Html(pages::render_dashboard(username)).into_response(),
        None => Redirect::to("/login").into_response(),
    }
}

/// GET /logout: drop the session cookie
async fn handle_logout() -> impl IntoResponse {
    (
        [(header::SET_COOKIE, SessionSigner::clear_cookie())],
        Redirect::to("/login"),
    )
}

/// GET /health
async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

// ══════════════════════════════════════════════════════════════════════════════
// API HANDLERS
// ══════════════════════════════════════════════════════════════════════════════

/// Request body for login. Missing fields behave like unknown values.
#[derive(Debug, Default, Deserialize)]
struct LoginBody {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

/// POST /api/login
async fn handle_login(
    State(state): State<AppState>,
    body: Result<Json<LoginBody>, JsonRejection>,
) -> Response {
    let body = match body {
        Ok(Json(b)) => b,
        Err(e) => {
            return AppError::BadRequest(format!("Invalid request: {e}")).into_login_response();
        }
    };

    let username = body.username.unwrap_or_default();
    let password = body.password.unwrap_or_default();
    let now = chrono::Local::now().naive_local();
    let store = Arc::clone(&state.store);
    let policy = state.policy;

    // File I/O under the store lock; keep it off the async workers.
    let outcome = tokio::task::spawn_blocking(move || {
        auth::authenticate(store.as_ref(), &policy, &username, &password, now)
    })
    .await;

    match outcome {
        Ok(Ok(grant)) => (
            StatusCode::OK,
            [(header::SET_COOKIE, state.sessions.issue_cookie(&grant.username))],
            Json(serde_json::json!({ "success": true })),
        )
            .into_response(),
        Ok(Err(e)) => e.into_login_response(),
        Err(e) => AppError::Internal(format!("Login task failed: {e}")).into_login_response(),
    }
}

/// POST /api/face-analysis
async fn handle_face_analysis(
    State(state): State<AppState>,
    session: Session,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalysisReport>, AppError> {
    let Some(username) = session.username() else {
        return Err(AppError::Unauthorized);
    };

    let mut multipart = multipart.map_err(|_| AppError::BadRequest(NO_IMAGE_MESSAGE.into()))?;
    let (file_name, bytes) = read_image_field(&mut multipart)
        .await?
        .ok_or_else(|| AppError::BadRequest(NO_IMAGE_MESSAGE.into()))?;

    let report = state
        .relay
        .analyze(Some(&file_name), &bytes)
        .await
        .map_err(|e| {
            tracing::error!(username = username, "Face analysis failed: {e:#}");
            AppError::from(e)
        })?;

    Ok(Json(report))
}

/// First file part named `image`, as (client file name, bytes). Plain form
/// fields without a `filename` are not uploads and are skipped.
async fn read_image_field(
    multipart: &mut Multipart,
) -> Result<Option<(String, axum::body::Bytes)>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid upload: {e}")))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let Some(file_name) = field.file_name().map(str::to_owned) else {
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Invalid upload: {e}")))?;
        return Ok(Some((file_name, bytes)));
    }
    Ok(None)
}
