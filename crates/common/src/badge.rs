//! Badge verification against a submitter's page
//!
//! Fetches the page behind a submitted URL and looks for the directory badge:
//! - an `<a href>` pointing at the directory domain (or a subdomain)
//! - an `<img src>` serving the hosted badge image
//! - any element carrying `data-linkdir-badge`
//!
//! Remote failures (timeouts, refused connections, non-2xx, non-HTML) are a
//! negative result, never an error. Only a malformed input URL is rejected.
//!
//! Loopback, private, link-local and unspecified addresses are never fetched,
//! whether named directly, resolved through DNS or reached by a redirect.

use crate::config::{BadgeConfig, SiteConfig};
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE};
use reqwest::redirect::Policy;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use url::{Host, Url};

/// Attribute accepted as an explicit embed marker
pub const BADGE_ATTRIBUTE: &str = "data-linkdir-badge";

const MAX_REDIRECTS: usize = 5;

/// Why a check ended the way it did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    BadgeFound,
    BadgeMissing,
    Timeout,
    Unreachable,
    HttpStatus(u16),
    NotHtml,
}

impl CheckOutcome {
    /// Stable label used in responses and metrics
    pub fn label(&self) -> String {
        match self {
            CheckOutcome::BadgeFound => "badge_found".to_string(),
            CheckOutcome::BadgeMissing => "badge_missing".to_string(),
            CheckOutcome::Timeout => "timeout".to_string(),
            CheckOutcome::Unreachable => "unreachable".to_string(),
            CheckOutcome::HttpStatus(code) => format!("http_status_{code}"),
            CheckOutcome::NotHtml => "not_html".to_string(),
        }
    }
}

/// Result of a single badge check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeVerification {
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<CheckOutcome> for BadgeVerification {
    fn from(outcome: CheckOutcome) -> Self {
        Self {
            verified: outcome == CheckOutcome::BadgeFound,
            reason: Some(outcome.label()),
        }
    }
}

/// Seam between intake and the remote page check
#[async_trait]
pub trait BacklinkChecker: Send + Sync {
    /// Check a page for the badge. Implementations never fail.
    async fn check(&self, url: &Url) -> BadgeVerification;
}

/// What counts as the directory's badge
#[derive(Debug, Clone)]
pub struct BadgeMarker {
    domain: String,
    badge_path: String,
}

impl BadgeMarker {
    pub fn new(domain: &str, badge_path: &str) -> Self {
        let domain = domain
            .trim()
            .trim_start_matches("www.")
            .trim_end_matches('.')
            .to_ascii_lowercase();

        Self {
            domain,
            badge_path: badge_path.to_string(),
        }
    }

    fn matches_host(&self, url: &Url) -> bool {
        match url.host_str() {
            Some(host) => {
                host == self.domain || host.ends_with(&format!(".{}", self.domain))
            }
            None => false,
        }
    }

    /// Scan a parsed page for the badge.
    ///
    /// Pages served from the directory itself never count, and neither do
    /// `rel="nofollow"` links back.
    pub fn is_present(&self, html: &str, page_url: &Url) -> bool {
        if self.matches_host(page_url) {
            return false;
        }

        let document = Html::parse_document(html);

        // Selectors are constants; a parse failure is a programmer error
        let anchors = Selector::parse("a[href]").expect("static selector");
        let images = Selector::parse("img[src]").expect("static selector");
        let embeds = Selector::parse(&format!("[{BADGE_ATTRIBUTE}]")).expect("static selector");

        if document.select(&embeds).next().is_some() {
            return true;
        }

        let links_back = document
            .select(&anchors)
            .filter(|el| !is_nofollow(el.value().attr("rel")))
            .filter_map(|el| el.value().attr("href"))
            .filter_map(|href| page_url.join(href.trim()).ok())
            .any(|target| self.matches_host(&target));

        if links_back {
            return true;
        }

        document
            .select(&images)
            .filter_map(|el| el.value().attr("src"))
            .filter_map(|src| page_url.join(src.trim()).ok())
            .any(|src| self.matches_host(&src) && src.path().starts_with(&self.badge_path))
    }
}

/// Normalize user input into a fetchable URL.
///
/// Prepends `https://` when no scheme is given. Only `http`/`https` URLs with
/// a host are accepted.
pub fn normalize_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidUrl {
            message: "URL is empty".to_string(),
        });
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let url = Url::parse(&candidate).map_err(|e| AppError::InvalidUrl {
        message: e.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::InvalidUrl {
            message: format!("unsupported scheme: {}", url.scheme()),
        });
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(AppError::InvalidUrl {
            message: "URL has no host".to_string(),
        });
    }

    Ok(url)
}

/// Fetches pages and checks them for the badge
#[derive(Clone)]
pub struct BadgeVerifier {
    client: Client,
    marker: BadgeMarker,
    max_body_bytes: usize,
    allow_private_targets: bool,
}

impl BadgeVerifier {
    /// Create a verifier from configuration
    pub fn new(config: &BadgeConfig, site: &SiteConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(redirect_policy(config.allow_private_targets))
            .user_agent(config.user_agent.clone());

        if !config.allow_private_targets {
            builder = builder.dns_resolver(Arc::new(PublicResolver));
        }

        let client = builder.build().map_err(|e| AppError::Configuration {
            message: format!("Failed to create HTTP client: {}", e),
        })?;

        Ok(Self::with_client(client, site, config.max_body_bytes)
            .allow_private_targets(config.allow_private_targets))
    }

    /// Use a preconfigured client (timeouts and proxy settings are the caller's).
    /// Private targets are refused unless explicitly allowed.
    pub fn with_client(client: Client, site: &SiteConfig, max_body_bytes: usize) -> Self {
        Self {
            client,
            marker: BadgeMarker::new(&site.domain, &site.badge_path),
            max_body_bytes,
            allow_private_targets: false,
        }
    }

    pub fn allow_private_targets(mut self, allow: bool) -> Self {
        self.allow_private_targets = allow;
        self
    }

    /// Normalize raw input, then verify. Errors only on malformed input.
    pub async fn verify_request(&self, raw_url: &str) -> Result<BadgeVerification> {
        let url = normalize_url(raw_url)?;
        Ok(self.verify(&url).await)
    }

    /// Check a page for the badge. Never fails.
    pub async fn verify(&self, url: &Url) -> BadgeVerification {
        let start = Instant::now();

        let outcome = match self.fetch_page(url).await {
            Ok((final_url, body)) => {
                if self.marker.is_present(&body, &final_url) {
                    CheckOutcome::BadgeFound
                } else {
                    CheckOutcome::BadgeMissing
                }
            }
            Err(outcome) => outcome,
        };

        let elapsed = start.elapsed();
        metrics::record_badge_check(elapsed.as_secs_f64(), &outcome.label());

        info!(
            url = %url,
            outcome = %outcome.label(),
            duration_ms = elapsed.as_millis() as u64,
            "Badge check completed"
        );

        outcome.into()
    }

    async fn fetch_page(&self, url: &Url) -> std::result::Result<(Url, String), CheckOutcome> {
        if !self.allow_private_targets && !is_public_target(url) {
            debug!(url = %url, "Refusing non-public badge target");
            return Err(CheckOutcome::Unreachable);
        }

        let mut response = self
            .client
            .get(url.clone())
            .header(ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.5")
            .send()
            .await
            .map_err(request_failure)?;

        if !self.allow_private_targets && !is_public_target(response.url()) {
            debug!(url = %response.url(), "Badge fetch ended on a non-public target");
            return Err(CheckOutcome::Unreachable);
        }

        let status = response.status();
        if !status.is_success() {
            return Err(CheckOutcome::HttpStatus(status.as_u16()));
        }

        if !is_html(response.headers()) {
            return Err(CheckOutcome::NotHtml);
        }

        let final_url = response.url().clone();
        let mut body: Vec<u8> = Vec::new();

        while let Some(chunk) = response.chunk().await.map_err(request_failure)? {
            let remaining = self.max_body_bytes.saturating_sub(body.len());
            if chunk.len() >= remaining {
                body.extend_from_slice(&chunk[..remaining]);
                debug!(url = %url, limit = self.max_body_bytes, "Badge page truncated");
                break;
            }
            body.extend_from_slice(&chunk);
        }

        Ok((final_url, String::from_utf8_lossy(&body).into_owned()))
    }
}

#[async_trait]
impl BacklinkChecker for BadgeVerifier {
    async fn check(&self, url: &Url) -> BadgeVerification {
        self.verify(url).await
    }
}

fn request_failure(err: reqwest::Error) -> CheckOutcome {
    if err.is_timeout() {
        CheckOutcome::Timeout
    } else {
        debug!(error = %err, "Badge fetch failed");
        CheckOutcome::Unreachable
    }
}

fn is_nofollow(rel: Option<&str>) -> bool {
    rel.is_some_and(|rel| {
        rel.split_ascii_whitespace()
            .any(|token| token.eq_ignore_ascii_case("nofollow"))
    })
}

/// Redirect policy: hop limit plus, unless allowed, a public-address check
/// on every hop that names an IP literal
fn redirect_policy(allow_private_targets: bool) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else if !allow_private_targets && !is_public_target(attempt.url()) {
            attempt.error("redirect to a non-public address")
        } else {
            attempt.follow()
        }
    })
}

/// Host check without DNS: IP literals must be public, `localhost` never is.
/// Named hosts are filtered at resolution by [`PublicResolver`].
pub fn is_public_target(url: &Url) -> bool {
    match url.host() {
        Some(Host::Ipv4(ip)) => is_public_ip(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => is_public_ip(IpAddr::V6(ip)),
        Some(Host::Domain(domain)) => {
            let domain = domain.trim_end_matches('.').to_ascii_lowercase();
            domain != "localhost" && !domain.ends_with(".localhost")
        }
        None => false,
    }
}

pub fn is_public_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ip) => is_public_ipv4(ip),
        IpAddr::V6(ip) => match ip.to_ipv4_mapped() {
            Some(mapped) => is_public_ipv4(mapped),
            None => is_public_ipv6(ip),
        },
    }
}

fn is_public_ipv4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    !(ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_multicast()
        || a == 0
        // 100.64.0.0/10 carrier-grade NAT
        || (a == 100 && (b & 0xc0) == 64))
}

fn is_public_ipv6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    !(ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        // fc00::/7 unique local
        || (first & 0xfe00) == 0xfc00
        // fe80::/10 link-local
        || (first & 0xffc0) == 0xfe80)
}

/// DNS resolver that drops non-public addresses
struct PublicResolver;

impl Resolve for PublicResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(async move {
            let host = name.as_str().to_string();
            let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), 0))
                .await?
                .filter(|addr| is_public_ip(addr.ip()))
                .collect();

            if addrs.is_empty() {
                return Err(format!("{host} has no public address").into());
            }

            let addrs: Addrs = Box::new(addrs.into_iter());
            Ok(addrs)
        })
    }
}

/// A missing content type is tolerated; anything explicit must be HTML
fn is_html(headers: &HeaderMap) -> bool {
    match headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
        None => true,
        Some(value) => {
            let mime = value.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
            mime == "text/html" || mime == "application/xhtml+xml"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::StatusCode,
        response::{Html, Redirect},
        routing::get,
        Json, Router,
    };
    use std::net::SocketAddr;

    const WITH_BADGE: &str = r#"
        <html><body>
          <footer>
            <a href="https://www.linkdir.example/?ref=badge">
              <img src="https://linkdir.example/badge/featured.svg" alt="Listed on Linkdir">
            </a>
          </footer>
        </body></html>"#;

    const WITHOUT_BADGE: &str = r#"
        <html><body><a href="https://elsewhere.example/">Other directory</a></body></html>"#;

    fn site() -> SiteConfig {
        SiteConfig {
            name: "linkdir".to_string(),
            domain: "linkdir.example".to_string(),
            badge_path: "/badge".to_string(),
        }
    }

    fn verifier(timeout_secs: u64) -> BadgeVerifier {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .no_proxy()
            .build()
            .unwrap();
        BadgeVerifier::with_client(client, &site(), BadgeConfig::default().max_body_bytes)
            .allow_private_targets(true)
    }

    fn public_only_verifier() -> BadgeVerifier {
        verifier(2).allow_private_targets(false)
    }

    #[test]
    fn test_verifier_from_config() {
        assert!(BadgeVerifier::new(&BadgeConfig::default(), &site()).is_ok());
    }

    async fn serve_fixtures() -> SocketAddr {
        let app = Router::new()
            .route("/with-badge", get(|| async { Html(WITH_BADGE) }))
            .route("/without-badge", get(|| async { Html(WITHOUT_BADGE) }))
            .route("/json", get(|| async { Json(serde_json::json!({ "html": WITH_BADGE })) }))
            .route("/gone", get(|| async { (StatusCode::NOT_FOUND, Html(WITH_BADGE)) }))
            .route(
                "/hop",
                get(|| async { Redirect::temporary("http://169.254.169.254/latest/meta-data") }),
            )
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    Html(WITH_BADGE)
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn page(addr: SocketAddr, path: &str) -> Url {
        Url::parse(&format!("http://{addr}{path}")).unwrap()
    }

    #[test]
    fn test_normalize_adds_https() {
        let url = normalize_url("  example.com/about ").unwrap();
        assert_eq!(url.as_str(), "https://example.com/about");
    }

    #[test]
    fn test_normalize_keeps_http() {
        let url = normalize_url("http://example.com").unwrap();
        assert_eq!(url.scheme(), "http");
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert!(matches!(normalize_url(""), Err(AppError::InvalidUrl { .. })));
        assert!(matches!(normalize_url("ftp://example.com"), Err(AppError::InvalidUrl { .. })));
        assert!(matches!(normalize_url("http://"), Err(AppError::InvalidUrl { .. })));
        assert!(matches!(normalize_url("exa mple..com:99999"), Err(AppError::InvalidUrl { .. })));
    }

    #[test]
    fn test_marker_link_back_on_subdomain() {
        let marker = BadgeMarker::new("linkdir.example", "/badge");
        let base = Url::parse("https://site.example/").unwrap();
        let html = r#"<a href="https://blog.linkdir.example/post">us</a>"#;
        assert!(marker.is_present(html, &base));
    }

    #[test]
    fn test_marker_ignores_lookalike_domain() {
        let marker = BadgeMarker::new("linkdir.example", "/badge");
        let base = Url::parse("https://site.example/").unwrap();
        let html = r#"<a href="https://notlinkdir.example/">x</a>
                      <a href="https://linkdir.example.evil.test/">y</a>"#;
        assert!(!marker.is_present(html, &base));
    }

    #[test]
    fn test_marker_embed_attribute() {
        let marker = BadgeMarker::new("linkdir.example", "/badge");
        let base = Url::parse("https://site.example/").unwrap();
        let html = r#"<div data-linkdir-badge="featured"></div>"#;
        assert!(marker.is_present(html, &base));
    }

    #[test]
    fn test_marker_badge_image_requires_path() {
        let marker = BadgeMarker::new("linkdir.example", "/badge");
        let base = Url::parse("https://site.example/").unwrap();
        assert!(marker.is_present(r#"<img src="//linkdir.example/badge.svg">"#, &base));
        assert!(!marker.is_present(r#"<img src="https://linkdir.example/logo.png">"#, &base));
    }

    #[test]
    fn test_marker_resolves_relative_links() {
        let marker = BadgeMarker::new("linkdir.example", "/badge");
        let base = Url::parse("https://site.example/blog/post").unwrap();
        let html = r#"<a href="//linkdir.example/">Listed</a>"#;
        assert!(marker.is_present(html, &base));
    }

    #[test]
    fn test_marker_ignores_pages_on_directory_host() {
        let marker = BadgeMarker::new("linkdir.example", "/badge");
        for page in ["https://linkdir.example/listing", "https://www.linkdir.example/"] {
            let base = Url::parse(page).unwrap();
            assert!(!marker.is_present(r#"<a href="/about">About</a>"#, &base));
            assert!(!marker.is_present(r#"<div data-linkdir-badge></div>"#, &base));
        }
    }

    #[test]
    fn test_marker_ignores_nofollow_links() {
        let marker = BadgeMarker::new("linkdir.example", "/badge");
        let base = Url::parse("https://site.example/").unwrap();
        let nofollow = r#"<a rel="noopener NoFollow" href="https://linkdir.example/">x</a>"#;
        assert!(!marker.is_present(nofollow, &base));

        let followed = r#"<a rel="noopener" href="https://linkdir.example/">x</a>"#;
        assert!(marker.is_present(followed, &base));
    }

    #[test]
    fn test_public_ip_classification() {
        for private in [
            "127.0.0.1", "10.1.2.3", "172.16.0.1", "192.168.1.1", "169.254.169.254",
            "0.0.0.0", "100.64.0.1", "::1", "::", "fe80::1", "fd00::1", "::ffff:127.0.0.1",
        ] {
            assert!(!is_public_ip(private.parse().unwrap()), "{private} should be blocked");
        }
        for public in ["93.184.216.34", "1.1.1.1", "2606:4700::1111"] {
            assert!(is_public_ip(public.parse().unwrap()), "{public} should be allowed");
        }
    }

    #[test]
    fn test_public_target_hosts() {
        assert!(!is_public_target(&Url::parse("http://localhost:8080/").unwrap()));
        assert!(!is_public_target(&Url::parse("http://api.localhost/").unwrap()));
        assert!(!is_public_target(&Url::parse("http://[::1]/").unwrap()));
        assert!(!is_public_target(&Url::parse("http://10.0.0.5/admin").unwrap()));
        assert!(is_public_target(&Url::parse("https://site.example/").unwrap()));
    }

    #[test]
    fn test_html_content_type_detection() {
        let mut headers = HeaderMap::new();
        assert!(is_html(&headers));
        headers.insert(CONTENT_TYPE, "text/html; charset=utf-8".parse().unwrap());
        assert!(is_html(&headers));
        headers.insert(CONTENT_TYPE, "application/json".parse().unwrap());
        assert!(!is_html(&headers));
    }

    #[tokio::test]
    async fn test_verify_fixture_with_badge() {
        let addr = serve_fixtures().await;
        let result = verifier(5).verify(&page(addr, "/with-badge")).await;
        assert!(result.verified);
        assert_eq!(result.reason.as_deref(), Some("badge_found"));
    }

    #[tokio::test]
    async fn test_verify_fixture_without_badge() {
        let addr = serve_fixtures().await;
        let result = verifier(5).verify(&page(addr, "/without-badge")).await;
        assert!(!result.verified);
        assert_eq!(result.reason.as_deref(), Some("badge_missing"));
    }

    #[tokio::test]
    async fn test_verify_non_html_is_negative() {
        let addr = serve_fixtures().await;
        let result = verifier(5).verify(&page(addr, "/json")).await;
        assert!(!result.verified);
        assert_eq!(result.reason.as_deref(), Some("not_html"));
    }

    #[tokio::test]
    async fn test_verify_error_status_is_negative() {
        let addr = serve_fixtures().await;
        let result = verifier(5).verify(&page(addr, "/gone")).await;
        assert!(!result.verified);
        assert_eq!(result.reason.as_deref(), Some("http_status_404"));
    }

    #[tokio::test]
    async fn test_verify_timeout_is_negative() {
        let addr = serve_fixtures().await;
        let result = verifier(1).verify(&page(addr, "/slow")).await;
        assert!(!result.verified);
        assert_eq!(result.reason.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn test_verify_unreachable_host_is_negative() {
        let url = Url::parse("http://127.0.0.1:1/").unwrap();
        let result = verifier(2).verify(&url).await;
        assert!(!result.verified);
    }

    #[tokio::test]
    async fn test_private_target_is_never_fetched() {
        let addr = serve_fixtures().await;
        let result = public_only_verifier().verify(&page(addr, "/with-badge")).await;
        assert!(!result.verified);
        assert_eq!(result.reason.as_deref(), Some("unreachable"));
    }

    #[tokio::test]
    async fn test_default_verifier_refuses_loopback() {
        let config = BadgeConfig {
            timeout_secs: 2,
            ..BadgeConfig::default()
        };
        let verifier = BadgeVerifier::new(&config, &site()).unwrap();
        let result = verifier.verify(&Url::parse("http://localhost:1/").unwrap()).await;
        assert_eq!(result.reason.as_deref(), Some("unreachable"));
    }

    #[tokio::test]
    async fn test_redirect_hop_into_private_range_is_refused() {
        let addr = serve_fixtures().await;
        let client = Client::builder()
            .timeout(Duration::from_secs(2))
            .redirect(redirect_policy(false))
            .no_proxy()
            .build()
            .unwrap();
        let verifier = BadgeVerifier::with_client(client, &site(), 1024).allow_private_targets(true);

        let result = verifier.verify(&page(addr, "/hop")).await;
        assert!(!result.verified);
        assert_eq!(result.reason.as_deref(), Some("unreachable"));
    }

    #[tokio::test]
    async fn test_verify_request_rejects_bad_input() {
        let err = verifier(2).verify_request("ftp://example.com").await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }
}
