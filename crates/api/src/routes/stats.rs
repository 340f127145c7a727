//! Stats Routes

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use insight::Projection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::error;

use crate::AppState;
use storage::StoredRecord;

/// Upper bound on records returned by one query
pub const MAX_LIMIT: usize = 500;

/// Query parameters for the stats endpoint
#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    /// Maximum number of records, defaults to `query_limit`
    pub limit: Option<usize>,
}

/// A stored record with its presentation fields
#[derive(Debug, Serialize)]
pub struct AnnotatedRecord {
    #[serde(flatten)]
    pub stored: StoredRecord,
    pub insight: String,
    pub projection: Option<Projection>,
}

/// Response for the stats endpoint
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub data: Vec<AnnotatedRecord>,
    pub count: usize,
}

/// Get the most recent records, newest first
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StatsQuery>,
) -> Result<Json<StatsResponse>, (StatusCode, Json<Value>)> {
    let limit = params
        .limit
        .unwrap_or(state.config.query_limit)
        .min(MAX_LIMIT);

    let records = state.repository.recent(limit).await.map_err(|e| {
        error!("Failed to query records: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
    })?;

    let data: Vec<AnnotatedRecord> = records
        .into_iter()
        .map(|stored| AnnotatedRecord {
            insight: state.presenter.insight(&stored.record),
            projection: state.presenter.projection(&stored.record),
            stored,
        })
        .collect();

    Ok(Json(StatsResponse {
        count: data.len(),
        data,
    }))
}
