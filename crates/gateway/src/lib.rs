//! HTTP API gateway for DocMind.
//!
//! - `GET /`: service banner
//! - `GET /health`: liveness
//! - `POST /chat`: one conversational turn
//! - `POST /upload`: multipart PDF upload (`file`, `user_id`)
//!
//! Built on Axum. Every route is wrapped in permissive CORS and HTTP tracing.

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::{
    Router,
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use docmind_agent::{ChatError, Services};
use docmind_core::error::IngestError;
use docmind_core::request::{ChatRequest, ChatResponse};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

fn api_error(status: StatusCode, detail: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            detail: detail.into(),
        }),
    )
}

/// Build the Axum router with all gateway routes.
pub fn build_router(services: Services, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(banner_handler))
        .route("/health", get(health_handler))
        .route("/chat", post(chat_handler))
        .route("/upload", post(upload_handler))
        .with_state(services)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
pub async fn start(config: docmind_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let services = Services::from_config(&config).await?;
    let app = build_router(services, config.gateway.max_upload_bytes);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}

// --- Handlers ---

async fn banner_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "DocMind backend running" }))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn chat_handler(
    State(services): State<Services>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    // Cancelled when the client disconnects and axum drops this future.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    match services.chat.handle(&request, &cancel).await {
        Ok(response) => Ok(Json(response)),
        Err(e @ ChatError::Configuration(_)) => {
            error!(error = %e, "Chat rejected");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
        Err(e @ ChatError::InvalidModel(_)) => Err(api_error(StatusCode::BAD_REQUEST, e.to_string())),
        Err(e @ ChatError::Setup(_)) => {
            error!(error = %e, "Chat setup failed");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
        Err(ChatError::Cancelled) => Err(api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Request cancelled",
        )),
    }
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    status: &'static str,
    message: String,
    chunks: usize,
}

async fn upload_handler(
    State(services): State<Services>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut user_id: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Malformed upload: {e}")))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Malformed upload: {e}")))?;
                file = Some((filename, bytes.to_vec()));
            }
            Some("user_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Malformed upload: {e}")))?;
                user_id = Some(text);
            }
            _ => {}
        }
    }

    let (filename, bytes) =
        file.ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "No file uploaded."))?;
    let user_id = user_id.ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "A user_id is required."))?;
    info!(filename = %filename, user_id = %user_id, bytes = bytes.len(), "Upload received");

    match services.ingestor.ingest_pdf(&filename, bytes, &user_id).await {
        Ok(report) => Ok(Json(UploadResponse {
            status: "success",
            message: report.message(),
            chunks: report.chunks,
        })),
        Err(e @ (IngestError::Validation(_) | IngestError::Extraction(_))) => {
            warn!(filename = %filename, error = %e, "Upload rejected");
            Err(api_error(StatusCode::BAD_REQUEST, e.to_string()))
        }
        Err(e) => {
            error!(filename = %filename, error = %e, "Upload failed");
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error processing document: {e}"),
            ))
        }
    }
}
