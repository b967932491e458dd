use anyhow::{Context, Result};
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::{
    error::ScanError,
    ports::{self, ALL_PRESET_LAST, COMMON_PORTS},
    scanner,
    services::SERVICE_NAMES,
    types::{ScanReport, ScanRequest},
};

/// Body of `POST /api/scan`: a scan request plus an optional free-form port list.
#[derive(Debug, Deserialize)]
pub struct ScanBody {
    #[serde(flatten)]
    pub request: ScanRequest,
    /// Custom ports as typed by a user, e.g. `"80,443,8000-8010"`. Overrides `ports`.
    #[serde(default)]
    pub ports_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ServiceEntry {
    pub port: u16,
    pub service: &'static str,
}

#[derive(Debug)]
pub struct ApiError(ScanError);

impl From<ScanError> for ApiError {
    fn from(e: ScanError) -> Self {
        Self(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(ScanError::InvalidBody(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_invalid_input() {
            StatusCode::BAD_REQUEST
        } else {
            error!(error = %self.0, "scan failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// API routes, without binding a socket.
pub fn router() -> Router {
    let api = Router::new()
        .route("/scan", post(post_scan))
        .route("/services", get(get_services))
        .route("/presets", get(get_presets));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
}

/// Bind `bind` and serve the API until Ctrl+C.
pub async fn serve(bind: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!(addr = %listener.local_addr()?, "serving scan API");

    axum::serve(listener, router())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;
    Ok(())
}

async fn post_scan(
    payload: Result<Json<ScanBody>, JsonRejection>,
) -> Result<Json<ScanReport>, ApiError> {
    let Json(body) = payload?;
    let mut request = body.request;
    if let Some(text) = body.ports_text.as_deref().filter(|t| !t.trim().is_empty()) {
        request.ports = Some(ports::parse_port_list(text)?);
    }
    let report = scanner::scan_ports(&request).await?;
    Ok(Json(report))
}

async fn get_services() -> impl IntoResponse {
    let entries: Vec<ServiceEntry> = SERVICE_NAMES
        .iter()
        .map(|&(port, service)| ServiceEntry { port, service })
        .collect();
    (StatusCode::OK, Json(entries))
}

async fn get_presets() -> impl IntoResponse {
    let body = json!({
        "common": COMMON_PORTS,
        "all": { "first": 1, "last": ALL_PRESET_LAST },
    });
    (StatusCode::OK, Json(body))
}
