//! Submission intake and publishing
//!
//! Intake validates a candidate link, runs the badge check (or skips it on
//! the trusted path), schedules publication and persists the record.
//! `publish_at` is fixed at intake; re-verification never moves it.

use crate::badge::{normalize_url, BacklinkChecker, BadgeVerification};
use crate::config::SubmissionConfig;
use crate::db::models::{Submission, SubmissionStatus};
use crate::db::{SubmissionStore, VerificationUpdate};
use crate::errors::{AppError, Result};
use crate::metrics;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// Candidate link as submitted
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionInput {
    #[validate(length(max = 2048))]
    pub url: Option<String>,

    #[validate(length(max = 200))]
    pub title: Option<String>,

    #[validate(length(max = 2000))]
    pub description: Option<String>,

    pub category_id: Option<String>,

    pub captcha_token: Option<String>,
}

/// Who submitted the link
#[derive(Debug, Clone)]
pub struct Submitter {
    pub email: String,
    pub name: String,
}

/// Which intake path is used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeMode {
    /// Badge check runs against the submitted URL
    Verified,
    /// Badge check skipped, backlink marked verified. Test deployments only.
    Trusted,
}

/// Stored submission plus the check that produced its flags
#[derive(Debug, Clone)]
pub struct IntakeResult {
    pub submission: Submission,
    pub verification: BadgeVerification,
}

pub struct IntakeService {
    store: Arc<dyn SubmissionStore>,
    checker: Arc<dyn BacklinkChecker>,
    publish_delay: chrono::Duration,
    trusted_intake: bool,
}

impl IntakeService {
    pub fn new(
        store: Arc<dyn SubmissionStore>,
        checker: Arc<dyn BacklinkChecker>,
        config: &SubmissionConfig,
    ) -> Result<Self> {
        let publish_delay = i64::try_from(config.publish_delay_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| AppError::Configuration {
                message: format!("publish delay out of range: {}", config.publish_delay_secs),
            })?;

        Ok(Self {
            store,
            checker,
            publish_delay,
            trusted_intake: config.trusted_intake,
        })
    }

    pub fn trusted_intake_enabled(&self) -> bool {
        self.trusted_intake
    }

    /// Validate, verify and persist a new submission
    pub async fn create_submission(
        &self,
        input: SubmissionInput,
        submitter: Submitter,
        mode: IntakeMode,
    ) -> Result<IntakeResult> {
        if mode == IntakeMode::Trusted && !self.trusted_intake {
            return Err(AppError::NotFound {
                resource_type: "intake path".to_string(),
                id: "trusted".to_string(),
            });
        }

        input.validate()?;

        let raw_url = required(&input.url, "url")?;
        let title = required(&input.title, "title")?;
        let url = normalize_url(&raw_url)?;

        let category_id = match input.category_id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => {
                let id = Uuid::parse_str(raw).map_err(|_| AppError::Validation {
                    message: "categoryId must be a UUID".to_string(),
                    field: Some("categoryId".to_string()),
                })?;
                if !self.store.category_exists(id).await? {
                    return Err(AppError::UnknownCategory { id: id.to_string() });
                }
                Some(id)
            }
        };

        let verification = match mode {
            IntakeMode::Verified => self.checker.check(&url).await,
            IntakeMode::Trusted => BadgeVerification {
                verified: true,
                reason: Some("trusted_intake".to_string()),
            },
        };

        let now = Utc::now();
        let status = if verification.verified {
            SubmissionStatus::Verified
        } else {
            SubmissionStatus::Pending
        };

        let submission = Submission {
            id: Uuid::new_v4(),
            url: url.to_string(),
            title,
            description: input
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            category_id,
            submitter_email: submitter.email,
            submitter_name: submitter.name,
            backlink_verified: verification.verified,
            backlink_verified_at: verification.verified.then(|| now.into()),
            publish_at: (now + self.publish_delay).into(),
            status: status.into(),
            created_at: now.into(),
            updated_at: now.into(),
        };

        let submission = self.store.insert_submission(submission).await?;

        metrics::record_submission(status.as_str(), mode == IntakeMode::Trusted);
        info!(
            submission_id = %submission.id,
            url = %submission.url,
            status = status.as_str(),
            trusted = mode == IntakeMode::Trusted,
            publish_at = %submission.publish_at.to_rfc3339(),
            "Submission created"
        );

        Ok(IntakeResult {
            submission,
            verification,
        })
    }

    /// Re-run the badge check for a stored submission.
    ///
    /// Updates the backlink flag and moves `pending`/`verified` between each
    /// other; published and rejected submissions keep their status.
    pub async fn reverify(&self, id: Uuid) -> Result<IntakeResult> {
        let existing = self
            .store
            .find_submission(id)
            .await?
            .ok_or_else(|| AppError::SubmissionNotFound { id: id.to_string() })?;

        let url = normalize_url(&existing.url)?;
        let verification = self.checker.check(&url).await;

        let status = match existing.submission_status() {
            SubmissionStatus::Pending | SubmissionStatus::Verified if verification.verified => {
                SubmissionStatus::Verified
            }
            SubmissionStatus::Pending | SubmissionStatus::Verified => SubmissionStatus::Pending,
            other => other,
        };

        let submission = self
            .store
            .update_verification(
                id,
                VerificationUpdate {
                    backlink_verified: verification.verified,
                    backlink_verified_at: verification.verified.then(Utc::now),
                    status,
                },
            )
            .await?;

        info!(
            submission_id = %id,
            verified = verification.verified,
            status = status.as_str(),
            "Submission re-verified"
        );

        Ok(IntakeResult {
            submission,
            verification,
        })
    }

    /// Promote every due submission to `published`
    pub async fn publish_due(&self, now: DateTime<Utc>) -> Result<u64> {
        let published = self.store.publish_due(now).await?;
        if published > 0 {
            metrics::record_published(published);
            info!(count = published, "Published due submissions");
        }
        Ok(published)
    }
}

fn required(value: &Option<String>, field: &str) -> Result<String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(AppError::Validation {
            message: format!("{field} is required"),
            field: Some(field.to_string()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;

    struct StubChecker {
        verified: bool,
        calls: AtomicUsize,
    }

    impl StubChecker {
        fn new(verified: bool) -> Arc<Self> {
            Arc::new(Self {
                verified,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl BacklinkChecker for StubChecker {
        async fn check(&self, _url: &Url) -> BadgeVerification {
            self.calls.fetch_add(1, Ordering::SeqCst);
            BadgeVerification {
                verified: self.verified,
                reason: None,
            }
        }
    }

    fn service(
        store: Arc<MemoryStore>,
        checker: Arc<StubChecker>,
        trusted_intake: bool,
    ) -> IntakeService {
        let config = SubmissionConfig {
            trusted_intake,
            ..SubmissionConfig::default()
        };
        IntakeService::new(store, checker, &config).unwrap()
    }

    fn input(url: &str, title: &str) -> SubmissionInput {
        SubmissionInput {
            url: Some(url.to_string()),
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    fn submitter() -> Submitter {
        Submitter {
            email: "ada@example.com".to_string(),
            name: "Ada".to_string(),
        }
    }

    fn assert_publish_delay(submission: &Submission, created: DateTime<Utc>) {
        let expected = created + chrono::Duration::hours(3);
        let drift = (submission.publish_at.with_timezone(&Utc) - expected).num_seconds().abs();
        assert!(drift <= 5, "publish_at drifted by {drift}s");
    }

    #[tokio::test]
    async fn test_verified_submission() {
        let store = Arc::new(MemoryStore::new());
        let checker = StubChecker::new(true);
        let intake = service(store.clone(), checker.clone(), false);

        let before = Utc::now();
        let result = intake
            .create_submission(input("https://x.com", "X"), submitter(), IntakeMode::Verified)
            .await
            .unwrap();

        let submission = result.submission;
        assert_eq!(submission.submission_status(), SubmissionStatus::Verified);
        assert!(submission.backlink_verified);
        assert!(submission.backlink_verified_at.is_some());
        assert_eq!(submission.url, "https://x.com/");
        assert_publish_delay(&submission, before);
        assert_eq!(checker.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_unverified_submission_is_pending() {
        let store = Arc::new(MemoryStore::new());
        let intake = service(store.clone(), StubChecker::new(false), false);

        let before = Utc::now();
        let result = intake
            .create_submission(input("x.com/tool", "X"), submitter(), IntakeMode::Verified)
            .await
            .unwrap();

        assert_eq!(result.submission.submission_status(), SubmissionStatus::Pending);
        assert!(!result.submission.backlink_verified);
        assert!(result.submission.backlink_verified_at.is_none());
        assert_eq!(result.submission.url, "https://x.com/tool");
        assert_publish_delay(&result.submission, before);
    }

    #[tokio::test]
    async fn test_missing_title_persists_nothing() {
        let store = Arc::new(MemoryStore::new());
        let checker = StubChecker::new(true);
        let intake = service(store.clone(), checker.clone(), false);

        let missing = SubmissionInput {
            url: Some("https://x.com".to_string()),
            ..Default::default()
        };
        let err = intake
            .create_submission(missing, submitter(), IntakeMode::Verified)
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
        assert!(store.is_empty().await);
        assert_eq!(checker.calls.load(Ordering::SeqCst), 0);

        let blank = input("https://x.com", "   ");
        assert!(intake.create_submission(blank, submitter(), IntakeMode::Verified).await.is_err());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_missing_url_and_bad_url() {
        let store = Arc::new(MemoryStore::new());
        let intake = service(store.clone(), StubChecker::new(true), false);

        let missing = SubmissionInput {
            title: Some("X".to_string()),
            ..Default::default()
        };
        let err = intake.create_submission(missing, submitter(), IntakeMode::Verified).await;
        assert!(matches!(err, Err(AppError::Validation { .. })));

        let err = intake
            .create_submission(input("ftp://x.com", "X"), submitter(), IntakeMode::Verified)
            .await;
        assert!(matches!(err, Err(AppError::InvalidUrl { .. })));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_overlong_title_rejected() {
        let store = Arc::new(MemoryStore::new());
        let intake = service(store.clone(), StubChecker::new(true), false);

        let err = intake
            .create_submission(input("https://x.com", &"t".repeat(201)), submitter(), IntakeMode::Verified)
            .await;
        assert!(matches!(err, Err(AppError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_category_must_exist() {
        let store = Arc::new(MemoryStore::new());
        let category = Uuid::new_v4();
        store.add_category(category).await;
        let intake = service(store.clone(), StubChecker::new(false), false);

        let mut unknown = input("https://x.com", "X");
        unknown.category_id = Some(Uuid::new_v4().to_string());
        let err = intake.create_submission(unknown, submitter(), IntakeMode::Verified).await;
        assert!(matches!(err, Err(AppError::UnknownCategory { .. })));

        let mut malformed = input("https://x.com", "X");
        malformed.category_id = Some("tools".to_string());
        let err = intake.create_submission(malformed, submitter(), IntakeMode::Verified).await;
        assert!(matches!(err, Err(AppError::Validation { .. })));

        let mut known = input("https://x.com", "X");
        known.category_id = Some(category.to_string());
        let result = intake
            .create_submission(known, submitter(), IntakeMode::Verified)
            .await
            .unwrap();
        assert_eq!(result.submission.category_id, Some(category));
    }

    #[tokio::test]
    async fn test_trusted_path_requires_capability() {
        let store = Arc::new(MemoryStore::new());
        let checker = StubChecker::new(false);

        let locked = service(store.clone(), checker.clone(), false);
        let err = locked
            .create_submission(input("https://x.com", "X"), submitter(), IntakeMode::Trusted)
            .await;
        assert!(matches!(err, Err(AppError::NotFound { .. })));

        let open = service(store.clone(), checker.clone(), true);
        let result = open
            .create_submission(input("https://x.com", "X"), submitter(), IntakeMode::Trusted)
            .await
            .unwrap();
        assert_eq!(result.submission.submission_status(), SubmissionStatus::Verified);
        assert!(result.submission.backlink_verified);
        assert_eq!(checker.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reverify_keeps_publish_at() {
        let store = Arc::new(MemoryStore::new());
        let pending = service(store.clone(), StubChecker::new(false), false);
        let created = pending
            .create_submission(input("https://x.com", "X"), submitter(), IntakeMode::Verified)
            .await
            .unwrap()
            .submission;

        let verifying = service(store.clone(), StubChecker::new(true), false);
        let result = verifying.reverify(created.id).await.unwrap();

        assert_eq!(result.submission.submission_status(), SubmissionStatus::Verified);
        assert!(result.submission.backlink_verified);
        assert_eq!(result.submission.publish_at, created.publish_at);

        let lost = service(store.clone(), StubChecker::new(false), false);
        let result = lost.reverify(created.id).await.unwrap();
        assert_eq!(result.submission.submission_status(), SubmissionStatus::Pending);
        assert!(!result.submission.backlink_verified);
    }

    #[tokio::test]
    async fn test_reverify_unknown_submission() {
        let intake = service(Arc::new(MemoryStore::new()), StubChecker::new(true), false);
        let err = intake.reverify(Uuid::new_v4()).await;
        assert!(matches!(err, Err(AppError::SubmissionNotFound { .. })));
    }

    #[tokio::test]
    async fn test_publish_due_and_visibility() {
        let store = Arc::new(MemoryStore::new());
        let intake = service(store.clone(), StubChecker::new(true), false);
        intake
            .create_submission(input("https://x.com", "X"), submitter(), IntakeMode::Verified)
            .await
            .unwrap();

        let now = Utc::now();
        assert_eq!(intake.publish_due(now).await.unwrap(), 0);
        assert_eq!(store.list_visible(now, 0, 10).await.unwrap().1, 0);

        let later = now + chrono::Duration::hours(4);
        assert_eq!(intake.publish_due(later).await.unwrap(), 1);
        let (items, total) = store.list_visible(later, 0, 10).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].submission_status(), SubmissionStatus::Published);

        // Already published submissions are not promoted twice
        assert_eq!(intake.publish_due(later).await.unwrap(), 0);
    }
}
