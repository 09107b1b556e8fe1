//! HTTP front door.
//!
//! | Route | Method | Body |
//! |---|---|---|
//! | `/` | GET | service banner |
//! | `/health` | GET | liveness |
//! | `/api/process` | POST | multipart `claim_id` + `file` → [`ClaimResponse`] |
//!
//! Errors are returned as `{"detail": "..."}`.

use crate::controller::ClaimPipeline;
use crate::error::ClaimsError;
use crate::output::ClaimResponse;
use crate::pipeline::input::has_pdf_extension;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

/// Largest accepted upload.
pub const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

/// Front-door errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Only PDF files are accepted")]
    NotPdf,
    #[error("{0}")]
    BadRequest(String),
    #[error("Processing error: {0}")]
    Processing(#[from] ClaimsError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotPdf | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Processing(e) => {
                error!("Claim processing failed: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = ErrorBody {
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// A parsed `/api/process` form.
struct ClaimUpload {
    claim_id: String,
    file_name: String,
    data: Vec<u8>,
}

async fn parse_upload(mut multipart: Multipart) -> Result<ClaimUpload, ApiError> {
    let mut claim_id: Option<String> = None;
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read form field: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "claim_id" => {
                let val = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read claim_id: {}", e)))?;
                if !val.trim().is_empty() {
                    claim_id = Some(val);
                }
            }
            "file" => {
                let file_name = field.file_name().unwrap_or("").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read file data: {}", e)))?
                    .to_vec();
                file = Some((file_name, data));
            }
            _ => {
                let _ = field.bytes().await;
            }
        }
    }

    let claim_id = claim_id.ok_or_else(|| ApiError::BadRequest("Missing field: claim_id".into()))?;
    let (file_name, data) = file.ok_or_else(|| ApiError::BadRequest("Missing field: file".into()))?;
    Ok(ClaimUpload {
        claim_id,
        file_name,
        data,
    })
}

async fn root() -> Json<Value> {
    Json(json!({"status": "healthy", "service": "Claim Processor API"}))
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn process_claim(
    State(pipeline): State<Arc<ClaimPipeline>>,
    multipart: Multipart,
) -> Result<Json<ClaimResponse>, ApiError> {
    let upload = parse_upload(multipart).await?;
    if !has_pdf_extension(&upload.file_name) {
        return Err(ApiError::NotPdf);
    }

    info!(
        "Claim {}: received '{}' ({} bytes)",
        upload.claim_id,
        upload.file_name,
        upload.data.len()
    );
    let report = pipeline.process_bytes(&upload.data).await?;
    Ok(Json(ClaimResponse::success(upload.claim_id, report)))
}

/// Build the front-door router around a shared pipeline.
pub fn router(pipeline: Arc<ClaimPipeline>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/process", post(process_claim))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(pipeline)
}

/// Serve the front door on `addr` until the process is stopped.
pub async fn serve(addr: SocketAddr, pipeline: Arc<ClaimPipeline>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(pipeline)).await
}
