//! In-memory submission store for local runs and tests

use crate::db::models::{Submission, SubmissionStatus};
use crate::db::{SubmissionStore, VerificationUpdate};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryStore {
    submissions: RwLock<Vec<Submission>>,
    categories: RwLock<HashSet<Uuid>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a category id
    pub async fn add_category(&self, id: Uuid) {
        self.categories.write().await.insert(id);
    }

    /// Number of stored submissions
    pub async fn len(&self) -> usize {
        self.submissions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn category_exists(&self, id: Uuid) -> Result<bool> {
        Ok(self.categories.read().await.contains(&id))
    }

    async fn insert_submission(&self, submission: Submission) -> Result<Submission> {
        let mut submissions = self.submissions.write().await;
        if submissions.iter().any(|s| s.id == submission.id) {
            return Err(AppError::Internal {
                message: format!("duplicate submission id {}", submission.id),
            });
        }
        submissions.push(submission.clone());
        Ok(submission)
    }

    async fn find_submission(&self, id: Uuid) -> Result<Option<Submission>> {
        Ok(self.submissions.read().await.iter().find(|s| s.id == id).cloned())
    }

    async fn update_verification(
        &self,
        id: Uuid,
        update: VerificationUpdate,
    ) -> Result<Submission> {
        let mut submissions = self.submissions.write().await;
        let submission = submissions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| AppError::SubmissionNotFound { id: id.to_string() })?;

        submission.backlink_verified = update.backlink_verified;
        submission.backlink_verified_at = update.backlink_verified_at.map(Into::into);
        submission.status = update.status.into();
        submission.updated_at = Utc::now().into();

        Ok(submission.clone())
    }

    async fn publish_due(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut published = 0;
        for submission in self.submissions.write().await.iter_mut() {
            if submission.submission_status().is_publishable() && submission.publish_at <= now {
                submission.status = SubmissionStatus::Published.into();
                submission.updated_at = now.into();
                published += 1;
            }
        }
        Ok(published)
    }

    async fn list_visible(
        &self,
        now: DateTime<Utc>,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<Submission>, u64)> {
        let mut visible: Vec<Submission> = self
            .submissions
            .read()
            .await
            .iter()
            .filter(|s| s.is_visible_at(now))
            .cloned()
            .collect();
        visible.sort_by(|a, b| b.publish_at.cmp(&a.publish_at));

        let total = visible.len() as u64;
        let page = visible
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();

        Ok((page, total))
    }

    async fn count_by_status(&self) -> Result<Vec<(String, u64)>> {
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for submission in self.submissions.read().await.iter() {
            *counts.entry(submission.status.clone()).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn list_recent(
        &self,
        status: Option<SubmissionStatus>,
        limit: u64,
    ) -> Result<Vec<Submission>> {
        let mut recent: Vec<Submission> = self
            .submissions
            .read()
            .await
            .iter()
            .filter(|s| status.map_or(true, |wanted| s.submission_status() == wanted))
            .cloned()
            .collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent.truncate(limit as usize);
        Ok(recent)
    }
}
