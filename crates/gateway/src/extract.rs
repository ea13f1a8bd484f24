//! Request extractors that reject with the structured `AppError` body

use axum::{
    extract::{FromRequest, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use linkdir_common::errors::{AppError, Result};
use linkdir_common::intake::Submitter;
use validator::ValidateEmail;

/// Header set by the upstream auth proxy
pub const SUBMITTER_EMAIL_HEADER: &str = "x-submitter-email";
pub const SUBMITTER_NAME_HEADER: &str = "x-submitter-name";

/// JSON body extractor
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Query string extractor
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Path parameter extractor
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// Authenticated submitter identity
#[derive(Debug, Clone)]
pub struct SubmitterIdentity(pub Submitter);

impl<S> FromRequestParts<S> for SubmitterIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        let email = header_value(&parts.headers, SUBMITTER_EMAIL_HEADER).ok_or_else(|| {
            AppError::Unauthorized {
                message: "Missing submitter identity".to_string(),
            }
        })?;

        if !email.as_str().validate_email() {
            return Err(AppError::Unauthorized {
                message: "Invalid submitter identity".to_string(),
            });
        }

        let name = header_value(&parts.headers, SUBMITTER_NAME_HEADER).unwrap_or_else(|| {
            email
                .split('@')
                .next()
                .unwrap_or_default()
                .to_string()
        });

        Ok(SubmitterIdentity(Submitter { email, name }))
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Client address as reported by the fronting proxy
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    header_value(headers, "cf-connecting-ip").or_else(|| {
        header_value(headers, "x-forwarded-for")
            .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
            .filter(|ip| !ip.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Result<SubmitterIdentity> {
        let (mut parts, _) = request.into_parts();
        SubmitterIdentity::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_submitter_from_headers() {
        let request = Request::builder()
            .header(SUBMITTER_EMAIL_HEADER, "ada@example.com")
            .header(SUBMITTER_NAME_HEADER, "Ada Lovelace")
            .body(())
            .unwrap();

        let SubmitterIdentity(submitter) = extract(request).await.unwrap();
        assert_eq!(submitter.email, "ada@example.com");
        assert_eq!(submitter.name, "Ada Lovelace");
    }

    #[tokio::test]
    async fn test_submitter_name_defaults_to_local_part() {
        let request = Request::builder()
            .header(SUBMITTER_EMAIL_HEADER, "grace@example.com")
            .body(())
            .unwrap();

        let SubmitterIdentity(submitter) = extract(request).await.unwrap();
        assert_eq!(submitter.name, "grace");
    }

    #[tokio::test]
    async fn test_missing_or_invalid_email_is_unauthorized() {
        let missing = Request::builder().body(()).unwrap();
        assert!(matches!(extract(missing).await, Err(AppError::Unauthorized { .. })));

        let invalid = Request::builder()
            .header(SUBMITTER_EMAIL_HEADER, "not-an-email")
            .body(())
            .unwrap();
        assert!(matches!(extract(invalid).await, Err(AppError::Unauthorized { .. })));
    }

    #[test]
    fn test_client_ip_prefers_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.7"));

        headers.insert("cf-connecting-ip", "198.51.100.2".parse().unwrap());
        assert_eq!(client_ip(&headers).as_deref(), Some("198.51.100.2"));
    }
}
