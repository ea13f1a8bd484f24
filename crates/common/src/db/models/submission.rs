//! Submission entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Submission lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    Verified,
    Published,
    Rejected,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Verified => "verified",
            SubmissionStatus::Published => "published",
            SubmissionStatus::Rejected => "rejected",
        }
    }

    /// Statuses the publisher may promote
    pub fn is_publishable(&self) -> bool {
        matches!(self, SubmissionStatus::Pending | SubmissionStatus::Verified)
    }
}

impl From<String> for SubmissionStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "verified" => SubmissionStatus::Verified,
            "published" => SubmissionStatus::Published,
            "rejected" => SubmissionStatus::Rejected,
            _ => SubmissionStatus::Pending,
        }
    }
}

impl From<SubmissionStatus> for String {
    fn from(status: SubmissionStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::str::FromStr for SubmissionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SubmissionStatus::Pending),
            "verified" => Ok(SubmissionStatus::Verified),
            "published" => Ok(SubmissionStatus::Published),
            "rejected" => Ok(SubmissionStatus::Rejected),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "submissions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub url: String,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    pub category_id: Option<Uuid>,

    #[sea_orm(column_type = "Text")]
    pub submitter_email: String,

    #[sea_orm(column_type = "Text")]
    pub submitter_name: String,

    pub backlink_verified: bool,

    pub backlink_verified_at: Option<DateTimeWithTimeZone>,

    /// Not publicly visible before this instant
    pub publish_at: DateTimeWithTimeZone,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Get the status as an enum
    pub fn submission_status(&self) -> SubmissionStatus {
        SubmissionStatus::from(self.status.clone())
    }

    /// Publicly listed at `now`
    pub fn is_visible_at(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.submission_status() != SubmissionStatus::Rejected && self.publish_at <= now
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id"
    )]
    Category,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
