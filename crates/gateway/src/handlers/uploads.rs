//! Logo and screenshot uploads

use axum::{
    body::Bytes,
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    Json,
};
use linkdir_common::errors::Result;
use linkdir_common::storage::{StoredObject, UploadKind};
use serde::Deserialize;
use tracing::info;
use crate::extract::{ApiQuery, SubmitterIdentity};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub kind: UploadKind,
}

/// POST /api/uploads?kind=logo|screenshot with the raw image as body
pub async fn upload_asset(
    State(state): State<AppState>,
    SubmitterIdentity(submitter): SubmitterIdentity,
    ApiQuery(query): ApiQuery<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<StoredObject>)> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let stored = state
        .storage
        .upload(query.kind, body.to_vec(), content_type)
        .await?;

    info!(
        submitter = %submitter.email,
        kind = ?query.kind,
        key = %stored.key,
        "Asset uploaded"
    );

    Ok((StatusCode::CREATED, Json(stored)))
}
