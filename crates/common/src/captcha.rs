//! CAPTCHA verification (Turnstile-compatible `siteverify` endpoint)
//!
//! The mode is decided once at startup: with no secret key configured every
//! check passes.

use crate::config::CaptchaConfig;
use crate::errors::{AppError, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

/// Enforcement mode resolved from configuration
#[derive(Debug, Clone)]
pub enum CaptchaMode {
    Enabled { secret_key: String, verify_url: String },
    Disabled,
}

impl CaptchaMode {
    pub fn from_config(config: &CaptchaConfig) -> Self {
        match config.secret_key.as_deref().map(str::trim) {
            Some(secret) if !secret.is_empty() => CaptchaMode::Enabled {
                secret_key: secret.to_string(),
                verify_url: config.verify_url.clone(),
            },
            _ => CaptchaMode::Disabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, CaptchaMode::Enabled { .. })
    }
}

#[derive(Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

/// Verifies CAPTCHA tokens against the provider
#[derive(Clone)]
pub struct CaptchaVerifier {
    client: Client,
    mode: CaptchaMode,
}

impl CaptchaVerifier {
    pub fn new(mode: CaptchaMode) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client, mode })
    }

    pub fn mode(&self) -> &CaptchaMode {
        &self.mode
    }

    /// Returns `true` when the token is accepted.
    ///
    /// Provider failures count as a rejected token.
    pub async fn verify(&self, token: Option<&str>, remote_ip: Option<&str>) -> bool {
        let (secret_key, verify_url) = match &self.mode {
            CaptchaMode::Disabled => return true,
            CaptchaMode::Enabled { secret_key, verify_url } => (secret_key, verify_url),
        };

        let Some(token) = token.filter(|t| !t.trim().is_empty()) else {
            return false;
        };

        let mut form = vec![("secret", secret_key.as_str()), ("response", token)];
        if let Some(ip) = remote_ip {
            form.push(("remoteip", ip));
        }

        let response = match self.client.post(verify_url).form(&form).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "CAPTCHA provider unreachable");
                return false;
            }
        };

        match response.json::<SiteVerifyResponse>().await {
            Ok(body) => {
                if !body.success {
                    warn!(errors = ?body.error_codes, "CAPTCHA rejected");
                }
                body.success
            }
            Err(e) => {
                warn!(error = %e, "CAPTCHA provider returned an unexpected body");
                false
            }
        }
    }

    /// Verify and map rejection to `AppError::CaptchaFailed`
    pub async fn require(&self, token: Option<&str>, remote_ip: Option<&str>) -> Result<()> {
        if self.verify(token, remote_ip).await {
            Ok(())
        } else {
            Err(AppError::CaptchaFailed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Form, Json, Router};
    use std::collections::HashMap;

    #[test]
    fn test_mode_from_config() {
        let mut config = CaptchaConfig::default();
        assert!(!CaptchaMode::from_config(&config).is_enabled());

        config.secret_key = Some("   ".to_string());
        assert!(!CaptchaMode::from_config(&config).is_enabled());

        config.secret_key = Some("0x4AAA".to_string());
        assert!(CaptchaMode::from_config(&config).is_enabled());
    }

    #[tokio::test]
    async fn test_disabled_mode_passes() {
        let verifier = CaptchaVerifier::new(CaptchaMode::Disabled).unwrap();
        assert!(verifier.verify(None, None).await);
        assert!(verifier.require(None, None).await.is_ok());
    }

    #[tokio::test]
    async fn test_enabled_mode_requires_token() {
        let verifier = CaptchaVerifier::new(CaptchaMode::Enabled {
            secret_key: "secret".to_string(),
            verify_url: "http://127.0.0.1:1/siteverify".to_string(),
        })
        .unwrap();
        assert!(!verifier.verify(None, None).await);
        assert!(matches!(
            verifier.require(Some(""), None).await,
            Err(AppError::CaptchaFailed)
        ));
    }

    #[tokio::test]
    async fn test_enabled_mode_checks_provider() {
        let app = Router::new().route(
            "/siteverify",
            post(|Form(form): Form<HashMap<String, String>>| async move {
                let ok = form.get("secret").map(String::as_str) == Some("secret")
                    && form.get("response").map(String::as_str) == Some("good-token");
                Json(serde_json::json!({ "success": ok, "error-codes": [] }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = Client::builder().no_proxy().build().unwrap();
        let verifier = CaptchaVerifier {
            client,
            mode: CaptchaMode::Enabled {
                secret_key: "secret".to_string(),
                verify_url: format!("http://{addr}/siteverify"),
            },
        };

        assert!(verifier.verify(Some("good-token"), Some("203.0.113.7")).await);
        assert!(!verifier.verify(Some("bad-token"), None).await);
    }
}
