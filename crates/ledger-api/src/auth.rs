use axum::http::HeaderMap;

const API_KEY_HEADER: &str = "x-api-key";

/// Checks the `X-API-Key` header against the configured server secret
/// (§6). Returns `true` when authorized. A misconfigured (empty) server
/// secret is rejected earlier, in `LedgerConfig::from_env`.
pub fn is_authorized(headers: &HeaderMap, configured_key: &str) -> bool {
    headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|presented| presented == configured_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn matching_key_is_authorized() {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("secret"));
        assert!(is_authorized(&headers, "secret"));
    }

    #[test]
    fn missing_or_wrong_key_is_rejected() {
        let headers = HeaderMap::new();
        assert!(!is_authorized(&headers, "secret"));

        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("wrong"));
        assert!(!is_authorized(&headers, "secret"));
    }
}
