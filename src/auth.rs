//! Pre-shared API key authentication.
//!
//! The gateway accepts the key from, in order:
//!
//! 1. an `X-API-KEY` header
//! 2. an `Authorization: Bearer <key>` header
//! 3. an `?api_key=` query parameter (for clients that cannot set headers)
//!
//! The check itself is a binary allow/deny performed by the RPC dispatcher
//! before it looks at the request body, so a rejected caller learns nothing
//! about the request it sent.

use axum::http::HeaderMap;

/// Header carrying the key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Query parameter accepted when no header is present.
pub const API_KEY_QUERY_PARAM: &str = "api_key";

/// The configured API key. Compared in constant time.
#[derive(Clone)]
pub struct ApiKey(pub String);

impl ApiKey {
    /// `true` if `provided` is present and equals the configured key.
    pub fn allows(&self, provided: Option<&str>) -> bool {
        provided.is_some_and(|p| constant_time_eq(self.0.as_bytes(), p.as_bytes()))
    }
}

/// Pull the presented credential out of a request. Empty values count as
/// absent so an empty header still falls through to the query parameter.
pub fn credential_from_request<'a>(
    headers: &'a HeaderMap,
    query_key: Option<&'a str>,
) -> Option<&'a str> {
    let header = move |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
    };

    header(API_KEY_HEADER)
        .or_else(|| {
            header("authorization")
                .and_then(|h| h.strip_prefix("Bearer "))
                .filter(|v| !v.is_empty())
        })
        .or_else(|| query_key.filter(|v| !v.is_empty()))
}

/// Constant-time byte comparison to prevent timing side-channel attacks.
///
/// Always iterates over the full length of `expected` regardless of `provided`
/// length, so an attacker cannot determine the key length from response times.
pub fn constant_time_eq(expected: &[u8], provided: &[u8]) -> bool {
    let mut diff = u8::from(expected.len() != provided.len());
    for (i, e) in expected.iter().enumerate() {
        let p = provided.get(i).copied().unwrap_or(0xff);
        diff |= e ^ p;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn constant_time_eq_matches() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secret-longer"));
        assert!(!constant_time_eq(b"secret", b"sec"));
        assert!(!constant_time_eq(b"secret", b""));
    }

    #[test]
    fn allows_only_the_configured_key() {
        let key = ApiKey("supersecretapikey".into());
        assert!(key.allows(Some("supersecretapikey")));
        assert!(!key.allows(Some("wrong")));
        assert!(!key.allows(None));
    }

    #[test]
    fn header_wins_over_query() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("from-header"));
        assert_eq!(
            credential_from_request(&headers, Some("from-query")),
            Some("from-header")
        );
    }

    #[test]
    fn bearer_header_is_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer tok"));
        assert_eq!(credential_from_request(&headers, None), Some("tok"));
    }

    #[test]
    fn empty_header_falls_back_to_query() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static(""));
        assert_eq!(
            credential_from_request(&headers, Some("from-query")),
            Some("from-query")
        );
    }

    #[test]
    fn nothing_presented() {
        assert_eq!(credential_from_request(&HeaderMap::new(), None), None);
        assert_eq!(credential_from_request(&HeaderMap::new(), Some("")), None);
    }
}
