//! Submission intake endpoints

use axum::{extract::State, http::{HeaderMap, StatusCode}, Json};
use chrono::{DateTime, FixedOffset};
use linkdir_common::db::models::Submission;
use linkdir_common::errors::Result;
use linkdir_common::intake::{IntakeMode, IntakeResult, SubmissionInput};
use serde::Serialize;
use uuid::Uuid;
use crate::extract::{client_ip, ApiJson, ApiPath, SubmitterIdentity};
use crate::AppState;

/// Public view of a stored submission (submitter email omitted)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionView {
    pub id: Uuid,
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub submitter_name: String,
    pub backlink_verified: bool,
    pub backlink_verified_at: Option<DateTime<FixedOffset>>,
    pub status: String,
    pub publish_at: DateTime<FixedOffset>,
    pub created_at: DateTime<FixedOffset>,
}

impl From<Submission> for SubmissionView {
    fn from(s: Submission) -> Self {
        Self {
            id: s.id,
            url: s.url,
            title: s.title,
            description: s.description,
            category_id: s.category_id,
            submitter_name: s.submitter_name,
            backlink_verified: s.backlink_verified,
            backlink_verified_at: s.backlink_verified_at,
            status: s.status,
            publish_at: s.publish_at,
            created_at: s.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubmissionResponse {
    pub success: bool,
    pub message: String,
    pub publish_at: DateTime<FixedOffset>,
    pub submission: SubmissionView,
}

#[derive(Debug, Serialize)]
pub struct VerifySubmissionResponse {
    pub success: bool,
    pub verified: bool,
    pub message: String,
    pub submission: SubmissionView,
}

/// POST /api/submissions
pub async fn create_submission(
    State(state): State<AppState>,
    SubmitterIdentity(submitter): SubmitterIdentity,
    headers: HeaderMap,
    ApiJson(input): ApiJson<SubmissionInput>,
) -> Result<(StatusCode, Json<CreateSubmissionResponse>)> {
    state
        .captcha
        .require(input.captcha_token.as_deref(), client_ip(&headers).as_deref())
        .await?;

    let result = state
        .intake
        .create_submission(input, submitter, IntakeMode::Verified)
        .await?;

    Ok((StatusCode::CREATED, Json(created(result))))
}

/// POST /api/submissions/test (mounted only with trusted intake enabled)
pub async fn create_test_submission(
    State(state): State<AppState>,
    SubmitterIdentity(submitter): SubmitterIdentity,
    ApiJson(input): ApiJson<SubmissionInput>,
) -> Result<(StatusCode, Json<CreateSubmissionResponse>)> {
    let result = state
        .intake
        .create_submission(input, submitter, IntakeMode::Trusted)
        .await?;

    Ok((StatusCode::CREATED, Json(created(result))))
}

/// POST /api/submissions/{id}/verify
pub async fn verify_submission(
    State(state): State<AppState>,
    SubmitterIdentity(_submitter): SubmitterIdentity,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<VerifySubmissionResponse>> {
    let result = state.intake.reverify(id).await?;

    let message = if result.verification.verified {
        "Badge found. Backlink verified."
    } else {
        "Badge not found. Backlink not verified."
    };

    Ok(Json(VerifySubmissionResponse {
        success: true,
        verified: result.verification.verified,
        message: message.to_string(),
        submission: result.submission.into(),
    }))
}

fn created(result: IntakeResult) -> CreateSubmissionResponse {
    let message = if result.verification.verified {
        "Submission received. Backlink verified; it will be listed with a dofollow link."
    } else {
        "Submission received. Badge not found; it will be listed with a nofollow link."
    };

    CreateSubmissionResponse {
        success: true,
        message: message.to_string(),
        publish_at: result.submission.publish_at,
        submission: result.submission.into(),
    }
}
