// ABOUTME: Multipart upload handler that installs a new module.
// ABOUTME: Each file part's field name is its path inside the module directory.

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    Json,
};
use modhub_core::{AggregationService, UploadedFile};
use serde_json::{json, Value};

use super::response::ApiError;

/// Largest accepted upload body.
pub const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

pub async fn add_module(
    State(service): State<Arc<AggregationService>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("parse form: {e}")))?
    {
        // Plain form values are not files.
        if field.file_name().is_none() {
            continue;
        }
        let Some(path) = field.name().map(str::to_string).filter(|n| !n.is_empty()) else {
            continue;
        };
        let contents = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("read {path}: {e}")))?;
        files.push(UploadedFile {
            path,
            contents: contents.to_vec(),
        });
    }

    let module_id = service.install(files).await?;
    Ok(Json(json!({ "ok": "true", "module_id": module_id })))
}
