// ABOUTME: HTTP handlers for module listing, summaries, scans, and lifecycle actions.
// ABOUTME: Thin wrappers that delegate to the aggregation service.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use modhub_core::{AggregationService, ModuleManifest, ModuleSummary};
use serde_json::{json, Value};

use super::response::ApiError;

pub async fn list_modules(
    State(service): State<Arc<AggregationService>>,
) -> Json<Vec<ModuleManifest>> {
    Json(service.list())
}

pub async fn summary(State(service): State<Arc<AggregationService>>) -> Json<Vec<ModuleSummary>> {
    Json(service.summary().await)
}

pub async fn scan(
    State(service): State<Arc<AggregationService>>,
) -> Result<Json<Vec<ModuleManifest>>, ApiError> {
    Ok(Json(service.scan().await?))
}

pub async fn module_action(
    State(service): State<Arc<AggregationService>>,
    Path((id, action)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    service.execute_action(&id, &action).await?;
    Ok(Json(json!({ "ok": true })))
}
