//! Outbound redirect resolution for `/go/{encoded}`
//!
//! The path segment is decoded strictly (as `decodeURIComponent` would) and
//! only `http`/`https` destinations are accepted.

use crate::errors::AppError;
use percent_encoding::percent_decode_str;

/// Header attached to every gateway response so the hop is never indexed
pub const X_ROBOTS_TAG: &str = "x-robots-tag";
pub const NO_INDEX: &str = "noindex, nofollow";

/// Validated redirect destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    pub location: String,
}

/// Decode an encoded destination and check its scheme.
pub fn resolve_redirect(encoded: &str) -> Result<RedirectTarget, AppError> {
    let decoded = decode_component(encoded)?;

    if !has_web_scheme(&decoded) {
        return Err(AppError::InvalidTarget {
            message: "destination must start with http:// or https://".to_string(),
        });
    }

    Ok(RedirectTarget { location: decoded })
}

/// Strict percent-decoding; rejects stray `%` and non-UTF-8 output
pub fn decode_component(encoded: &str) -> Result<String, AppError> {
    let bytes = encoded.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes
                .get(i + 1..i + 3)
                .is_some_and(|pair| pair.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                return Err(AppError::Decode {
                    message: format!("invalid escape at byte {i}"),
                });
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    percent_decode_str(encoded)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| AppError::Decode {
            message: "decoded bytes are not valid UTF-8".to_string(),
        })
}

fn has_web_scheme(url: &str) -> bool {
    let lower = url.get(..8).unwrap_or(url).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use crate::links::{classify, encode_component, REDIRECT_PREFIX};

    #[test]
    fn test_resolves_encoded_https() {
        let target = resolve_redirect(&encode_component("https://example.com")).unwrap();
        assert_eq!(target.location, "https://example.com");
    }

    #[test]
    fn test_rejects_bad_escape() {
        let err = resolve_redirect("not%zzencoded").unwrap_err();
        assert_eq!(err.code(), ErrorCode::DecodeError);
    }

    #[test]
    fn test_rejects_truncated_escape() {
        assert!(matches!(resolve_redirect("https%3A%2"), Err(AppError::Decode { .. })));
    }

    #[test]
    fn test_rejects_invalid_utf8() {
        assert!(matches!(resolve_redirect("%FF%FE"), Err(AppError::Decode { .. })));
    }

    #[test]
    fn test_rejects_non_web_scheme() {
        let err = resolve_redirect(&encode_component("ftp://example.com")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidTarget);

        let err = resolve_redirect(&encode_component("javascript:alert(1)")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidTarget);
    }

    #[test]
    fn test_scheme_check_is_case_insensitive() {
        let target = resolve_redirect("HTTPS%3A%2F%2Fexample.com").unwrap();
        assert_eq!(target.location, "HTTPS://example.com");
    }

    #[test]
    fn test_classifier_output_resolves_back() {
        let url = "https://example.com/path?q=a b&x=é";
        let link = classify(url, false, "linkdir");
        let encoded = link.href.strip_prefix(REDIRECT_PREFIX).unwrap();
        assert_eq!(resolve_redirect(encoded).unwrap().location, url);
    }
}
