//! Upload Routes

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use ingest::{FileSummary, RecordSummary, UploadedFile};
use metrics::counter;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::AppState;

/// Multipart field carrying uploaded files
pub const FILES_FIELD: &str = "files";

/// Response for the upload endpoint
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
    pub batch_id: Uuid,
    pub alerts: Vec<String>,
    pub results: Vec<RecordSummary>,
    pub files: Vec<FileSummary>,
}

/// Ingest uploaded CSV and ZIP files and persist the records as one batch
pub async fn upload(State(state): State<Arc<AppState>>, multipart: Multipart) -> Response {
    let files = match collect_files(multipart).await {
        Ok(files) => files,
        Err(e) => {
            return (e.status(), Json(json!({ "error": e.body_text() }))).into_response();
        }
    };

    if files.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "No files provided" })),
        )
            .into_response();
    }

    let file_count = files.len();
    let worker = Arc::clone(&state);
    let ingested =
        tokio::task::spawn_blocking(move || worker.pipeline.ingest(&files, Utc::now())).await;
    let report = match ingested {
        Ok(report) => report,
        Err(e) => {
            error!("Ingestion task failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "FAILED",
                    "alerts": [format!("Server error: {}", e)],
                    "results": [],
                })),
            )
                .into_response();
        }
    };
    let alerts = report.alert_messages();

    if let Err(e) = state.repository.insert_batch(&report.records).await {
        error!("Failed to persist batch {}: {}", report.batch_id, e);
        counter!("persist_failures_total").increment(1);

        let response = UploadResponse {
            status: "FAILED",
            batch_id: report.batch_id,
            alerts: vec![format!("Server error: {}", e)],
            results: Vec::new(),
            files: report.files,
        };
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response();
    }

    info!(
        "Batch {} complete: {} files, {} records, {} alerts",
        report.batch_id,
        file_count,
        report.records.len(),
        alerts.len()
    );

    let response = UploadResponse {
        status: "INGESTION COMPLETE",
        batch_id: report.batch_id,
        results: report.summaries(state.pipeline.signal_column()),
        alerts,
        files: report.files,
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// Read every `files` part in submission order; other parts are ignored
async fn collect_files(mut multipart: Multipart) -> Result<Vec<UploadedFile>, MultipartError> {
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        files.push(UploadedFile::new(name, bytes.to_vec()));
    }

    Ok(files)
}
