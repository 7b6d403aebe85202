//! Route template derivation.
//!
//! # Responsibilities
//! - Turn a concrete URL path into a route template when the framework
//!   adapter cannot supply one (`/users/42` → `/users/:number`)
//! - Decide which completed requests are worth reporting as routes

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::OnceLock;

use regex::Regex;

struct SegmentPatterns {
    number: Regex,
    uuid: Regex,
    date: Regex,
    email: Regex,
    hash: Regex,
}

fn patterns() -> &'static SegmentPatterns {
    static PATTERNS: OnceLock<SegmentPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| SegmentPatterns {
        number: Regex::new(r"^\d+$").expect("valid number pattern"),
        uuid: Regex::new(
            r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[1-8][0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$|^00000000-0000-0000-0000-000000000000$",
        )
        .expect("valid uuid pattern"),
        date: Regex::new(r"^\d{4}-\d{2}-\d{2}$|^\d{2}-\d{2}-\d{4}$").expect("valid date pattern"),
        email: Regex::new(r"^[^\s@/]+@[^\s@/]+\.[^\s@/]+$").expect("valid email pattern"),
        hash: Regex::new(r"(?i)^(?:[a-f0-9]{32}|[a-f0-9]{40}|[a-f0-9]{64}|[a-f0-9]{128})$")
            .expect("valid hash pattern"),
    })
}

/// Derive a route template from a URL or path.
///
/// Accepts absolute URLs (`https://host/a/1?x=y`) and bare paths (`/a/1`).
/// Returns `None` when no path can be found.
pub fn build_route_from_url(url: &str) -> Option<String> {
    let path = url_path(url)?;

    let route = path
        .split('/')
        .map(replace_segment)
        .collect::<Vec<_>>()
        .join("/");

    if route == "/" {
        return Some(route);
    }
    if let Some(trimmed) = route.strip_suffix('/') {
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }
    Some(route)
}

fn url_path(url: &str) -> Option<String> {
    if url.starts_with('/') {
        let end = url.find(['?', '#']).unwrap_or(url.len());
        return Some(url[..end].to_string());
    }

    match url::Url::parse(url) {
        Ok(parsed) => Some(parsed.path().to_string()),
        Err(_) => None,
    }
}

fn replace_segment(segment: &str) -> String {
    if segment.is_empty() {
        return String::new();
    }

    let p = patterns();
    let starts_with_digit = segment.as_bytes()[0].is_ascii_digit();

    if starts_with_digit && p.number.is_match(segment) {
        return ":number".to_string();
    }
    if segment.len() == 36 && p.uuid.is_match(segment) {
        return ":uuid".to_string();
    }
    if starts_with_digit && p.date.is_match(segment) {
        return ":date".to_string();
    }
    if segment.contains('@') && p.email.is_match(segment) {
        return ":email".to_string();
    }
    if segment.parse::<IpAddr>().is_ok() {
        return ":ip".to_string();
    }
    if p.hash.is_match(segment) {
        return ":hash".to_string();
    }
    if looks_like_secret(segment) {
        return ":secret".to_string();
    }

    segment.to_string()
}

const SECRET_MIN_LENGTH: usize = 10;
const SECRET_SPECIAL: &str = "!#$%^&*|;:<>";

/// Heuristic for random tokens embedded in a path segment.
fn looks_like_secret(s: &str) -> bool {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= SECRET_MIN_LENGTH {
        return false;
    }
    if !chars.iter().any(|c| c.is_ascii_digit()) {
        return false;
    }

    let classes = [
        chars.iter().any(|c| c.is_ascii_lowercase()),
        chars.iter().any(|c| c.is_ascii_uppercase()),
        chars.iter().any(|c| SECRET_SPECIAL.contains(*c)),
    ];
    if classes.iter().filter(|present| **present).count() < 2 {
        return false;
    }
    if chars.iter().any(|c| c.is_whitespace()) || s.contains('-') {
        return false;
    }

    // Average share of unique characters per 10-char window.
    let windows: Vec<f64> = chars
        .windows(SECRET_MIN_LENGTH)
        .map(|w| w.iter().collect::<HashSet<_>>().len() as f64 / SECRET_MIN_LENGTH as f64)
        .collect();
    let average = windows.iter().sum::<f64>() / windows.len() as f64;
    average > 0.75
}

/// Whether a completed request should be reported as a discovered route.
///
/// Only successful and redirected responses count. `OPTIONS`/`HEAD` and
/// static files are ignored, as are dot-segments other than `.well-known`.
pub fn should_discover_route(status: u16, route: &str, method: &str) -> bool {
    if !(200..400).contains(&status) {
        return false;
    }
    if method.eq_ignore_ascii_case("OPTIONS") || method.eq_ignore_ascii_case("HEAD") {
        return false;
    }

    let segments: Vec<&str> = route.split('/').filter(|s| !s.is_empty()).collect();
    if segments
        .iter()
        .any(|s| s.starts_with('.') && *s != ".well-known")
    {
        return false;
    }

    match segments.last() {
        Some(last) if !last.starts_with('.') => !last.contains('.'),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(url: &str) -> String {
        build_route_from_url(url).unwrap()
    }

    #[test]
    fn test_root_and_trailing_slash() {
        assert_eq!(route("/"), "/");
        assert_eq!(route("/posts/"), "/posts");
        assert_eq!(route("http://localhost/posts?x=1"), "/posts");
        assert_eq!(route("http://localhost"), "/");
    }

    #[test]
    fn test_numbers_and_uuids() {
        assert_eq!(route("/posts/3"), "/posts/:number");
        assert_eq!(route("/posts/3/comments/10"), "/posts/:number/comments/:number");
        assert_eq!(
            route("/posts/d9428888-122b-11e1-b85c-61cd3cbb3210"),
            "/posts/:uuid"
        );
        assert_eq!(route("/posts/3abc"), "/posts/3abc");
    }

    #[test]
    fn test_dates_emails_and_ips() {
        assert_eq!(route("/reports/2023-05-01"), "/reports/:date");
        assert_eq!(route("/users/john@example.com"), "/users/:email");
        assert_eq!(route("/hosts/192.168.0.1"), "/hosts/:ip");
        assert_eq!(route("/hosts/::1"), "/hosts/:ip");
    }

    #[test]
    fn test_hashes_and_secrets() {
        assert_eq!(
            route("/files/d41d8cd98f00b204e9800998ecf8427e"),
            "/files/:hash"
        );
        assert_eq!(route("/confirm/aB3dE9fG2hJ7kL1m"), "/confirm/:secret");
        assert_eq!(route("/blog/my-first-post-2024"), "/blog/my-first-post-2024");
    }

    #[test]
    fn test_invalid_url() {
        assert!(build_route_from_url("not a url").is_none());
    }

    #[test]
    fn test_should_discover_route() {
        assert!(should_discover_route(200, "/posts/:number", "GET"));
        assert!(should_discover_route(302, "/login", "POST"));
        assert!(!should_discover_route(404, "/posts", "GET"));
        assert!(!should_discover_route(500, "/posts", "GET"));
        assert!(!should_discover_route(200, "/posts", "OPTIONS"));
        assert!(!should_discover_route(200, "/assets/app.js", "GET"));
        assert!(!should_discover_route(200, "/.env", "GET"));
        assert!(should_discover_route(200, "/.well-known/security", "GET"));
    }
}
