//! HTTP API for the assistant backend.
//!
//! A small JSON service that the front end polls for liveness and version
//! information, plus a stub `/ask` endpoint that will later front the
//! answer-generation backend.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Liveness check with the current timestamp in `[clean].utc_offset_hours` |
//! | `GET`  | `/version` | Application name, backend, and crate version |
//! | `POST` | `/ask` | Stub answer; accepts any body |
//!
//! # Error Contract
//!
//! Errors produced by this module share one JSON shape:
//!
//! ```json
//! { "error": { "code": "not_found", "message": "no route for /nope" } }
//! ```
//!
//! Error codes: `not_found` (404), `disallowed_host` (400).
//! A known path called with the wrong method gets axum's plain 405.
//!
//! # Host and CORS policy
//!
//! `[server].allowed_hosts` restricts the `Host` header (empty allows any
//! host). `[server].cors_origins` controls CORS: empty sends no CORS
//! headers, `"*"` allows any origin, otherwise only the listed origins.

use axum::{
    body::Bytes,
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{debug, info, warn};

use crate::config::Config;

pub const APP_NAME: &str = "RyomaStyleAssistant";
pub const BACKEND_NAME: &str = "axum";
pub const STUB_ANSWER: &str = "(stub) ここにBedrockの回答が入るでごわす";

/// Shared application state for the handlers and the host-check middleware.
#[derive(Clone)]
struct AppState {
    allowed_hosts: Arc<Vec<String>>,
    offset: FixedOffset,
}

/// Starts the HTTP server on `[server].bind` and runs until the process is
/// terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = build_router(config)?;

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("listening on http://{}", bind_addr);
    println!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Builds the router with the host check and CORS policy applied.
pub fn build_router(config: &Config) -> anyhow::Result<Router> {
    let state = AppState {
        allowed_hosts: Arc::new(config.server.allowed_hosts.clone()),
        offset: config.utc_offset()?,
    };

    let mut app = Router::new()
        .route("/health", get(handle_health))
        .route("/version", get(handle_version))
        .route("/ask", post(handle_ask))
        .fallback(handle_not_found)
        .layer(middleware::from_fn_with_state(state.clone(), check_host))
        .with_state(state);

    if let Some(cors) = cors_layer(&config.server.cors_origins) {
        app = app.layer(cors);
    }

    Ok(app)
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return Some(layer.allow_origin(Any));
    }

    let values: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    Some(layer.allow_origin(AllowOrigin::list(values)))
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn disallowed_host(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "disallowed_host".to_string(),
        message: message.into(),
    }
}

// ============ Host check ============

async fn check_host(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if state.allowed_hosts.is_empty() {
        return next.run(req).await;
    }

    let host = req
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(|h| strip_port(h).to_string())
        .unwrap_or_default();

    if host_allowed(&host, &state.allowed_hosts) {
        next.run(req).await
    } else {
        warn!("rejected request for disallowed host '{}'", host);
        disallowed_host(format!("host '{}' is not allowed", host)).into_response()
    }
}

/// Strips a trailing `:port`, leaving bracketed IPv6 literals intact.
fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

/// Matches `host` against allowed-host patterns: an exact name, a `.suffix`
/// entry (the domain itself or any subdomain), or `*`.
pub fn host_allowed(host: &str, allowed: &[String]) -> bool {
    if host.is_empty() {
        return false;
    }
    let host = host.to_ascii_lowercase();
    let host = host.trim_end_matches('.');

    allowed.iter().any(|pattern| {
        let pattern = pattern.to_ascii_lowercase();
        if pattern == "*" {
            return true;
        }
        match pattern.strip_prefix('.') {
            Some(domain) => host == domain || host.ends_with(&pattern),
            None => host == pattern,
        }
    })
}

// ============ Handlers ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    ts: String,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        ts: Utc::now().with_timezone(&state.offset).to_rfc3339(),
    })
}

#[derive(Serialize)]
struct VersionResponse {
    app: &'static str,
    backend: &'static str,
    version: &'static str,
}

async fn handle_version() -> Json<VersionResponse> {
    Json(VersionResponse {
        app: APP_NAME,
        backend: BACKEND_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Deserialize)]
struct AskRequest {
    #[serde(default)]
    question: Option<String>,
}

#[derive(Serialize)]
struct AskResponse {
    answer: &'static str,
    sources: Vec<String>,
}

/// Handler for `POST /ask`.
///
/// The body is not validated; a JSON `question` is only logged.
async fn handle_ask(body: Bytes) -> Json<AskResponse> {
    match serde_json::from_slice::<AskRequest>(&body) {
        Ok(AskRequest {
            question: Some(question),
        }) => debug!("ask: {}", question),
        _ => debug!("ask with {} byte body", body.len()),
    }

    Json(AskResponse {
        answer: STUB_ANSWER,
        sources: Vec::new(),
    })
}

async fn handle_not_found(uri: Uri) -> AppError {
    not_found(format!("no route for {}", uri.path()))
}
