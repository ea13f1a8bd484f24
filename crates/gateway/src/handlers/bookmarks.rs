//! Public bookmark listing

use axum::{extract::State, Json};
use chrono::{DateTime, FixedOffset, Utc};
use linkdir_common::db::models::Submission;
use linkdir_common::errors::Result;
use linkdir_common::links::classify;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::extract::ApiQuery;
use crate::AppState;

const DEFAULT_PER_PAGE: u64 = 20;
const MAX_PER_PAGE: u64 = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkItem {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub href: String,
    pub rel: String,
    pub dofollow: bool,
    pub published_at: DateTime<FixedOffset>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkPage {
    pub items: Vec<BookmarkItem>,
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
}

/// GET /api/bookmarks
pub async fn list_bookmarks(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<BookmarkQuery>,
) -> Result<Json<BookmarkPage>> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
    let offset = (page - 1).saturating_mul(per_page);

    let (submissions, total) = state
        .store
        .list_visible(Utc::now(), offset, per_page)
        .await?;

    let site = &state.config.site.name;
    let items = submissions
        .into_iter()
        .map(|s| bookmark_item(s, site))
        .collect();

    Ok(Json(BookmarkPage {
        items,
        page,
        per_page,
        total,
    }))
}

fn bookmark_item(submission: Submission, site: &str) -> BookmarkItem {
    let link = classify(&submission.url, submission.backlink_verified, site);
    BookmarkItem {
        id: submission.id,
        title: submission.title,
        description: submission.description,
        href: link.href,
        rel: link.rel,
        dofollow: submission.backlink_verified,
        published_at: submission.publish_at,
        url: submission.url,
    }
}
