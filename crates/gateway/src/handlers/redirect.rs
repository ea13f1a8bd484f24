//! Outbound redirect: `GET /go/{encoded}`
//!
//! Every response, success or error, carries `X-Robots-Tag: noindex, nofollow`.

use axum::{
    extract::OriginalUri,
    http::{header::LOCATION, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use linkdir_common::errors::{AppError, Result};
use linkdir_common::links::REDIRECT_PREFIX;
use linkdir_common::metrics;
use linkdir_common::redirect::{resolve_redirect, NO_INDEX, X_ROBOTS_TAG};
use tracing::debug;

pub async fn follow(OriginalUri(uri): OriginalUri) -> Response {
    // Raw segment; router path params are already decoded
    let encoded = uri.path().strip_prefix(REDIRECT_PREFIX).unwrap_or_default();

    let robots = (
        HeaderName::from_static(X_ROBOTS_TAG),
        HeaderValue::from_static(NO_INDEX),
    );

    match location(encoded) {
        Ok(location) => {
            metrics::record_redirect("ok");
            debug!(location = ?location, "Redirecting");
            (
                StatusCode::MOVED_PERMANENTLY,
                [(LOCATION, location), robots],
            )
                .into_response()
        }
        Err(err) => {
            let result = match err {
                AppError::Decode { .. } => "decode_error",
                _ => "invalid_target",
            };
            metrics::record_redirect(result);

            let mut response = err.into_response();
            response.headers_mut().insert(robots.0, robots.1);
            response
        }
    }
}

fn location(encoded: &str) -> Result<HeaderValue> {
    let target = resolve_redirect(encoded)?;
    HeaderValue::from_str(&target.location)
        .or_else(|_| HeaderValue::from_bytes(target.location.as_bytes()))
        .map_err(|_| AppError::InvalidTarget {
            message: "destination contains characters not allowed in a header".to_string(),
        })
}
