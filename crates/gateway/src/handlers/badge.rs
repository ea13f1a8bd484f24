//! Badge check endpoint
//!
//! Failures answer `{error, verified: false}` rather than the standard error
//! body so form clients can branch on `verified` alone. A missing JSON content
//! type is a plain 400 here. The negative-outcome reason stays in logs and
//! metrics.

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use linkdir_common::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use crate::extract::ApiJson;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct VerifyBadgeRequest {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VerifyBadgeResponse {
    pub success: bool,
    pub verified: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyBadgeError {
    pub error: String,
    pub verified: bool,
}

pub async fn verify_badge(
    State(state): State<AppState>,
    payload: Result<ApiJson<VerifyBadgeRequest>>,
) -> Response {
    match check(&state, payload).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => {
            err.log();
            let body = VerifyBadgeError {
                error: err.public_message(),
                verified: false,
            };
            (err.status_code(), Json(body)).into_response()
        }
    }
}

async fn check(
    state: &AppState,
    payload: Result<ApiJson<VerifyBadgeRequest>>,
) -> Result<VerifyBadgeResponse> {
    let ApiJson(request) = payload.map_err(|err| match err {
        AppError::UnsupportedMediaType { .. } => AppError::Validation {
            message: "expected a JSON body".to_string(),
            field: None,
        },
        other => other,
    })?;

    let raw = request
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| AppError::Validation {
            message: "URL is required".to_string(),
            field: Some("url".to_string()),
        })?;

    let result = state.verifier.verify_request(raw).await?;

    let message = if result.verified {
        "Badge found. Your listing will use a dofollow link."
    } else {
        "Badge not found on the page. Your listing will use a nofollow link."
    };

    Ok(VerifyBadgeResponse {
        success: true,
        verified: result.verified,
        message: message.to_string(),
    })
}
