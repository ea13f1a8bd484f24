//! Outbound link presentation
//!
//! Decides how a listed bookmark is linked: verified (dofollow) links point
//! straight at the target with a `utm_source` tag, everything else is routed
//! through `/go/{encoded}` and marked `nofollow`.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

/// Characters left unescaped by ECMAScript `encodeURIComponent`
pub const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Path prefix served by the redirect gateway
pub const REDIRECT_PREFIX: &str = "/go/";

pub const REL_DOFOLLOW: &str = "noopener noreferrer ugc";
pub const REL_NOFOLLOW: &str = "noopener noreferrer nofollow";

/// Rendered link for a bookmark
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkPresentation {
    pub href: String,
    pub rel: String,
}

/// Classify a bookmark URL into the link that should be rendered.
///
/// The URL is treated as an opaque string; no syntax validation happens here.
pub fn classify(url: &str, is_dofollow: bool, site: &str) -> LinkPresentation {
    if is_dofollow {
        LinkPresentation {
            href: with_tracking(url, site),
            rel: REL_DOFOLLOW.to_string(),
        }
    } else {
        LinkPresentation {
            href: redirect_path(url),
            rel: REL_NOFOLLOW.to_string(),
        }
    }
}

/// Append `utm_source=<site>` using `&` when a query string is present
pub fn with_tracking(url: &str, site: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}utm_source={}", encode_component(site))
}

/// `/go/` path for a destination
pub fn redirect_path(url: &str) -> String {
    format!("{REDIRECT_PREFIX}{}", encode_component(url))
}

/// Percent-encode like `encodeURIComponent`
pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, URI_COMPONENT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SITE: &str = "linkdir";

    #[test]
    fn test_dofollow_without_query() {
        let link = classify("https://example.com/tools", true, SITE);
        assert_eq!(link.href, "https://example.com/tools?utm_source=linkdir");
        assert_eq!(link.rel, "noopener noreferrer ugc");
    }

    #[test]
    fn test_dofollow_with_query_uses_ampersand() {
        let link = classify("https://example.com/?lang=en", true, SITE);
        assert_eq!(link.href, "https://example.com/?lang=en&utm_source=linkdir");
    }

    #[test]
    fn test_dofollow_never_uses_redirect() {
        for url in ["https://a.io", "http://b.io/x?y=1", "not a url"] {
            let link = classify(url, true, SITE);
            assert!(!link.href.starts_with(REDIRECT_PREFIX));
            assert!(!link.rel.contains("nofollow"));
        }
    }

    #[test]
    fn test_nofollow_routes_through_gateway() {
        let link = classify("https://example.com/a b?c=d&e=f", false, SITE);
        assert!(link.href.starts_with("/go/"));
        assert!(link.rel.contains("nofollow"));
        assert_eq!(
            link.href,
            "/go/https%3A%2F%2Fexample.com%2Fa%20b%3Fc%3Dd%26e%3Df"
        );
    }

    #[test]
    fn test_encode_component_matches_js() {
        assert_eq!(encode_component("a-_.!~*'()z"), "a-_.!~*'()z");
        assert_eq!(encode_component("é/"), "%C3%A9%2F");
        assert_eq!(encode_component("https://example.com"), "https%3A%2F%2Fexample.com");
    }

    #[test]
    fn test_malformed_url_passes_through() {
        let link = classify("::::", true, SITE);
        assert_eq!(link.href, "::::?utm_source=linkdir");
    }
}
