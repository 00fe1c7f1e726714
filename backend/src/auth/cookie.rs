//! Session cookie helpers.

use axum::http::header::{InvalidHeaderValue, AUTHORIZATION, COOKIE};
use axum::http::{HeaderMap, HeaderValue};

/// Build the `Set-Cookie` value carrying a session credential.
pub fn session_cookie(
    name: &str,
    value: &str,
    max_age_secs: u64,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Build the `Set-Cookie` value that clears the session cookie.
pub fn clear_session_cookie(name: &str, secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    session_cookie(name, "", 0, secure)
}

/// Session credential from the named cookie, falling back to a bearer token.
pub fn extract_session_token(headers: &HeaderMap, name: &str) -> Option<String> {
    extract_cookie(headers, name).or_else(|| extract_bearer_token(headers))
}

fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, val)| val.trim().to_string())
        .filter(|val| !val.is_empty())
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(name: axum::http::HeaderName, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, value.parse().unwrap());
        headers
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("session", "abc", 432_000, false).unwrap();
        assert_eq!(
            cookie.to_str().unwrap(),
            "session=abc; Path=/; HttpOnly; SameSite=Lax; Max-Age=432000"
        );

        let cookie = session_cookie("session", "abc", 60, true).unwrap();
        assert!(cookie.to_str().unwrap().ends_with("; Secure"));
    }

    #[test]
    fn test_clear_session_cookie_has_zero_max_age() {
        let cookie = clear_session_cookie("session", false).unwrap();
        let cookie = cookie.to_str().unwrap();
        assert!(cookie.starts_with("session=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[test]
    fn test_extract_from_cookie_header() {
        let headers = headers_with(COOKIE, "theme=dark; session=abc.def; other=1");
        assert_eq!(
            extract_session_token(&headers, "session"),
            Some("abc.def".to_string())
        );
    }

    #[test]
    fn test_extract_ignores_similar_names() {
        let headers = headers_with(COOKIE, "session_old=x; mysession=y");
        assert_eq!(extract_session_token(&headers, "session"), None);
    }

    #[test]
    fn test_extract_ignores_empty_cookie() {
        let headers = headers_with(COOKIE, "session=");
        assert_eq!(extract_session_token(&headers, "session"), None);
    }

    #[test]
    fn test_extract_falls_back_to_bearer() {
        let headers = headers_with(AUTHORIZATION, "Bearer tok");
        assert_eq!(extract_session_token(&headers, "session"), Some("tok".to_string()));

        let headers = headers_with(AUTHORIZATION, "Basic dXNlcjpwYXNz");
        assert_eq!(extract_session_token(&headers, "session"), None);
    }
}
