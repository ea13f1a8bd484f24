//! Linkdir Common Library
//!
//! Shared code for the Linkdir directory services including:
//! - Link classification (dofollow / nofollow presentation)
//! - Badge verification against submitter pages
//! - Outbound redirect resolution
//! - Submission intake and publishing
//! - Database models and the submission store
//! - CAPTCHA and object storage clients
//! - Error types, configuration, metrics

pub mod badge;
pub mod captcha;
pub mod config;
pub mod db;
pub mod errors;
pub mod intake;
pub mod links;
pub mod metrics;
pub mod redirect;
pub mod storage;

// Re-export commonly used types
pub use errors::{AppError, Result};
pub use config::AppConfig;
pub use db::{MemoryStore, Repository, SubmissionStore};
pub use badge::{BadgeVerification, BadgeVerifier};
pub use links::{classify, LinkPresentation};
pub use intake::{IntakeMode, IntakeService, Submitter};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default delay between intake and public visibility (3 hours)
pub const DEFAULT_PUBLISH_DELAY_SECS: u64 = 3 * 60 * 60;
