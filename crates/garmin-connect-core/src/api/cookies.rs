//! Minimal cookie handling for the two cookies the session depends on.
//!
//! The client keeps no cookie jar: the session and load balancer cookies
//! are captured explicitly and attached by hand, so a new session cookie on
//! a response stays observable.

use reqwest::header::{HeaderMap, HeaderValue, InvalidHeaderValue, SET_COOKIE};

/// Name of the session cookie issued by Garmin Connect
pub const SESSION_COOKIE: &str = "SESSIONID";

/// Name of the cookie Cloudflare uses to pin requests to one backend.
/// A session is only valid together with the load balancer id it was
/// issued with.
pub const LOAD_BALANCER_COOKIE: &str = "__cflb";

/// Iterate over the `name=value` pairs of every `Set-Cookie` header.
pub fn set_cookies(headers: &HeaderMap) -> impl Iterator<Item = (&str, &str)> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(parse_set_cookie)
}

/// Value of the last `Set-Cookie` header setting `name`, if any
pub fn find_set_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    set_cookies(headers)
        .filter(|(cookie_name, _)| *cookie_name == name)
        .last()
        .map(|(_, value)| value.to_string())
}

/// Format cookies as a `Cookie` header value, skipping empty values.
///
/// Returns `None` when there is nothing to send.
pub fn cookie_header(
    cookies: &[(&str, &str)],
) -> Result<Option<HeaderValue>, InvalidHeaderValue> {
    let pairs: Vec<String> = cookies
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(name, value)| format!("{}={}", name, value))
        .collect();

    if pairs.is_empty() {
        return Ok(None);
    }

    HeaderValue::from_str(&pairs.join("; ")).map(Some)
}

fn parse_set_cookie(header: &str) -> Option<(&str, &str)> {
    let pair = header.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name, value.trim().trim_matches('"')))
}
