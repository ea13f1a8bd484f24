//! Postgres repository for submissions
//!
//! SeaORM-backed implementation of [`SubmissionStore`].

use crate::db::models::*;
use crate::db::{DbPool, SubmissionStore, VerificationUpdate};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }
}

#[async_trait]
impl SubmissionStore for Repository {
    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Category Operations
    // ========================================================================

    async fn category_exists(&self, id: Uuid) -> Result<bool> {
        let count = CategoryEntity::find_by_id(id)
            .count(self.read_conn())
            .await?;
        Ok(count > 0)
    }

    // ========================================================================
    // Submission Operations
    // ========================================================================

    async fn insert_submission(&self, submission: Submission) -> Result<Submission> {
        let active = SubmissionActiveModel {
            id: Set(submission.id),
            url: Set(submission.url),
            title: Set(submission.title),
            description: Set(submission.description),
            category_id: Set(submission.category_id),
            submitter_email: Set(submission.submitter_email),
            submitter_name: Set(submission.submitter_name),
            backlink_verified: Set(submission.backlink_verified),
            backlink_verified_at: Set(submission.backlink_verified_at),
            publish_at: Set(submission.publish_at),
            status: Set(submission.status),
            created_at: Set(submission.created_at),
            updated_at: Set(submission.updated_at),
        };

        active.insert(self.write_conn()).await.map_err(Into::into)
    }

    async fn find_submission(&self, id: Uuid) -> Result<Option<Submission>> {
        SubmissionEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn update_verification(
        &self,
        id: Uuid,
        update: VerificationUpdate,
    ) -> Result<Submission> {
        let existing = SubmissionEntity::find_by_id(id)
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::SubmissionNotFound { id: id.to_string() })?;

        let mut active: SubmissionActiveModel = existing.into();
        active.backlink_verified = Set(update.backlink_verified);
        active.backlink_verified_at = Set(update.backlink_verified_at.map(Into::into));
        active.status = Set(update.status.into());
        active.updated_at = Set(Utc::now().into());

        active.update(self.write_conn()).await.map_err(Into::into)
    }

    async fn publish_due(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = SubmissionEntity::update_many()
            .col_expr(
                SubmissionColumn::Status,
                Expr::value(SubmissionStatus::Published.as_str()),
            )
            .col_expr(SubmissionColumn::UpdatedAt, Expr::value(now))
            .filter(SubmissionColumn::Status.is_in([
                SubmissionStatus::Pending.as_str(),
                SubmissionStatus::Verified.as_str(),
            ]))
            .filter(SubmissionColumn::PublishAt.lte(now))
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected)
    }

    async fn list_visible(
        &self,
        now: DateTime<Utc>,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<Submission>, u64)> {
        let limit = limit.max(1);
        let paginator = SubmissionEntity::find()
            .filter(SubmissionColumn::Status.ne(SubmissionStatus::Rejected.as_str()))
            .filter(SubmissionColumn::PublishAt.lte(now))
            .order_by_desc(SubmissionColumn::PublishAt)
            .paginate(self.read_conn(), limit);

        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(offset / limit).await?;

        Ok((items, total))
    }

    async fn count_by_status(&self) -> Result<Vec<(String, u64)>> {
        let rows: Vec<(String, i64)> = SubmissionEntity::find()
            .select_only()
            .column(SubmissionColumn::Status)
            .column_as(SubmissionColumn::Id.count(), "count")
            .group_by(SubmissionColumn::Status)
            .into_tuple()
            .all(self.read_conn())
            .await?;

        Ok(rows
            .into_iter()
            .map(|(status, count)| (status, count.max(0) as u64))
            .collect())
    }

    async fn list_recent(
        &self,
        status: Option<SubmissionStatus>,
        limit: u64,
    ) -> Result<Vec<Submission>> {
        let mut query = SubmissionEntity::find().order_by_desc(SubmissionColumn::CreatedAt);

        if let Some(status) = status {
            query = query.filter(SubmissionColumn::Status.eq(status.as_str()));
        }

        query
            .limit(limit)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }
}
