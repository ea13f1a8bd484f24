//! Configuration management for Linkdir services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Directory identity (used for tracking params and badge matching)
    #[serde(default)]
    pub site: SiteConfig,

    /// Badge verifier configuration
    #[serde(default)]
    pub badge: BadgeConfig,

    /// Submission intake configuration
    #[serde(default)]
    pub submission: SubmissionConfig,

    /// Object storage configuration (S3-compatible)
    #[serde(default)]
    pub storage: StorageConfig,

    /// CAPTCHA configuration
    #[serde(default)]
    pub captcha: CaptchaConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes)
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteConfig {
    /// Value appended as `utm_source` on dofollow links
    #[serde(default = "default_site_name")]
    pub name: String,

    /// Directory domain a badge must link back to
    #[serde(default = "default_site_domain")]
    pub domain: String,

    /// Path prefix of the hosted badge image
    #[serde(default = "default_badge_path")]
    pub badge_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BadgeConfig {
    /// Remote page fetch timeout in seconds
    #[serde(default = "default_badge_timeout")]
    pub timeout_secs: u64,

    /// Maximum number of body bytes inspected
    #[serde(default = "default_badge_max_body")]
    pub max_body_bytes: usize,

    /// User agent sent with badge checks
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Allow fetching loopback/private/link-local hosts (local development only)
    #[serde(default)]
    pub allow_private_targets: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubmissionConfig {
    /// Delay between intake and publication, in seconds
    #[serde(default = "default_publish_delay")]
    pub publish_delay_secs: u64,

    /// How often the publisher promotes due submissions
    #[serde(default = "default_publish_interval")]
    pub publish_interval_secs: u64,

    /// Mount the verification bypass route. Never enable in production.
    #[serde(default)]
    pub trusted_intake: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Custom endpoint (R2, MinIO); AWS default when unset
    pub endpoint: Option<String>,

    /// Bucket region
    pub region: Option<String>,

    /// Bucket name
    pub bucket: Option<String>,

    /// Access key id
    pub access_key_id: Option<String>,

    /// Secret access key
    pub secret_access_key: Option<String>,

    /// Public URL under which bucket objects are served
    pub public_base_url: Option<String>,

    /// Key prefix for logos
    #[serde(default = "default_logo_prefix")]
    pub logo_prefix: String,

    /// Key prefix for screenshots
    #[serde(default = "default_screenshot_prefix")]
    pub screenshot_prefix: String,

    /// Upload size limit in bytes
    #[serde(default = "default_max_upload")]
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaptchaConfig {
    /// Secret key; CAPTCHA enforcement is disabled when absent
    pub secret_key: Option<String>,

    /// Verification endpoint
    #[serde(default = "default_captcha_url")]
    pub verify_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for logs
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_site_name() -> String { "linkdir".to_string() }
fn default_site_domain() -> String { "linkdir.example".to_string() }
fn default_badge_path() -> String { "/badge".to_string() }
fn default_badge_timeout() -> u64 { 8 }
fn default_badge_max_body() -> usize { 2 * 1024 * 1024 }
fn default_user_agent() -> String { format!("LinkdirBadgeBot/{}", crate::VERSION) }
fn default_publish_delay() -> u64 { crate::DEFAULT_PUBLISH_DELAY_SECS }
fn default_publish_interval() -> u64 { 60 }
fn default_logo_prefix() -> String { "logos".to_string() }
fn default_screenshot_prefix() -> String { "screenshots".to_string() }
fn default_max_upload() -> usize { 5 * 1024 * 1024 }
fn default_captcha_url() -> String {
    "https://challenges.cloudflare.com/turnstile/v0/siteverify".to_string()
}
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "linkdir".to_string() }
fn default_rate_limit() -> u32 { 10 }
fn default_burst() -> u32 { 30 }
fn default_enabled() -> bool { true }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: default_site_name(),
            domain: default_site_domain(),
            badge_path: default_badge_path(),
        }
    }
}

impl Default for BadgeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_badge_timeout(),
            max_body_bytes: default_badge_max_body(),
            user_agent: default_user_agent(),
            allow_private_targets: false,
        }
    }
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            publish_delay_secs: default_publish_delay(),
            publish_interval_secs: default_publish_interval(),
            trusted_intake: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: None,
            bucket: None,
            access_key_id: None,
            secret_access_key: None,
            public_base_url: None,
            logo_prefix: default_logo_prefix(),
            screenshot_prefix: default_screenshot_prefix(),
            max_upload_bytes: default_max_upload(),
        }
    }
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            verify_url: default_captcha_url(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?

            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SUBMISSION__PUBLISH_DELAY_SECS=3600
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig {
                url: "postgres://localhost/linkdir".to_string(),
                read_url: None,
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
            },
            site: SiteConfig::default(),
            badge: BadgeConfig::default(),
            submission: SubmissionConfig::default(),
            storage: StorageConfig::default(),
            captcha: CaptchaConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.submission.publish_delay_secs, 3 * 60 * 60);
        assert!(!config.submission.trusted_intake);
        assert!(config.captcha.secret_key.is_none());
    }

    #[test]
    fn test_badge_blocks_private_targets_by_default() {
        let config = AppConfig::default();
        assert!(!config.badge.allow_private_targets);
        assert_eq!(config.badge.timeout_secs, 8);
    }
}
