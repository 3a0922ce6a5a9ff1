//! Cookie header parsing and `Set-Cookie` values.

use axum::http::{HeaderMap, HeaderValue, header::COOKIE};

/// Value of the first cookie called `name` across all `Cookie` headers.
pub(crate) fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

/// Session-scoped, HTTP-only cookie.
pub(crate) fn session_cookie(name: &str, value: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax")).ok()
}

/// Cookie that expires `name` immediately.
pub(crate) fn expired_cookie(name: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{name}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax"
    ))
    .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(values: &[&'static str]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for value in values {
            headers.append(COOKIE, HeaderValue::from_static(value));
        }
        headers
    }

    #[test]
    fn finds_cookie_across_headers() {
        let headers = headers(&["a=1; agora_theme=dark.xml", "agora_session=abc"]);
        assert_eq!(
            cookie_value(&headers, "agora_theme").as_deref(),
            Some("dark.xml")
        );
        assert_eq!(cookie_value(&headers, "agora_session").as_deref(), Some("abc"));
        assert_eq!(cookie_value(&headers, "agora_auth"), None);
    }

    #[test]
    fn blank_and_quoted_values() {
        let headers = headers(&["agora_auth=; agora_session=\"s-1\""]);
        assert_eq!(cookie_value(&headers, "agora_auth"), None);
        assert_eq!(cookie_value(&headers, "agora_session").as_deref(), Some("s-1"));
    }

    #[test]
    fn expired_cookie_has_zero_max_age() {
        let value = expired_cookie("agora_auth").expect("valid header");
        let text = value.to_str().expect("ascii");
        assert!(text.starts_with("agora_auth=;"));
        assert!(text.contains("Max-Age=0"));
    }
}
