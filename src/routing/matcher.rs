//! Endpoint matching.
//!
//! # Responsibilities
//! - Filter endpoint policies by method (exact or `*`)
//! - Collect exact route matches, then wildcard route matches
//! - Order results from most to least specific
//!
//! # Design Decisions
//! - Exact methods rank before the `*` method
//! - Exact routes rank before wildcard routes
//! - Among wildcard routes, more `*` segments rank first
//! - Sorting is stable, so ties keep their configured order

use crate::policy::EndpointPolicy;

/// Return every endpoint policy matching `method` and `route`, most
/// specific first.
///
/// Callers that ask "does any endpoint here..." must consider the whole
/// result; only the first entry is authoritative for rate limiting.
pub fn match_endpoints<'a>(
    endpoints: &'a [EndpointPolicy],
    method: &str,
    route: &str,
) -> Vec<&'a EndpointPolicy> {
    if method.is_empty() {
        return Vec::new();
    }

    let mut candidates: Vec<&EndpointPolicy> = endpoints
        .iter()
        .filter(|e| e.is_any_method() || e.method().eq_ignore_ascii_case(method))
        .collect();
    candidates.sort_by_key(|e| e.is_any_method());

    let mut matches: Vec<&EndpointPolicy> = candidates
        .iter()
        .copied()
        .filter(|e| e.route() == route)
        .collect();

    let mut wildcards: Vec<&EndpointPolicy> = candidates
        .iter()
        .copied()
        .filter(|e| {
            e.route() != route
                && e.wildcard_pattern()
                    .map(|pattern| pattern.is_match(route))
                    .unwrap_or(false)
        })
        .collect();
    wildcards.sort_by(|a, b| b.wildcard_count().cmp(&a.wildcard_count()));

    matches.extend(wildcards);
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(method: &str, route: &str) -> EndpointPolicy {
        EndpointPolicy::new(method, route)
    }

    fn summary(matches: &[&EndpointPolicy]) -> Vec<(String, String)> {
        matches
            .iter()
            .map(|e| (e.method().to_string(), e.route().to_string()))
            .collect()
    }

    #[test]
    fn test_empty_method_matches_nothing() {
        let endpoints = vec![endpoint("*", "/posts")];
        assert!(match_endpoints(&endpoints, "", "/posts").is_empty());
    }

    #[test]
    fn test_exact_method_before_wildcard_method() {
        let endpoints = vec![endpoint("*", "/posts"), endpoint("POST", "/posts")];
        let matches = match_endpoints(&endpoints, "POST", "/posts");
        assert_eq!(
            summary(&matches),
            vec![
                ("POST".to_string(), "/posts".to_string()),
                ("*".to_string(), "/posts".to_string()),
            ]
        );
    }

    #[test]
    fn test_other_methods_are_filtered() {
        let endpoints = vec![endpoint("GET", "/posts"), endpoint("POST", "/posts")];
        let matches = match_endpoints(&endpoints, "GET", "/posts");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].method(), "GET");
    }

    #[test]
    fn test_exact_route_before_wildcard_route() {
        let endpoints = vec![
            endpoint("GET", "/api/*"),
            endpoint("GET", "/api/users"),
        ];
        let matches = match_endpoints(&endpoints, "GET", "/api/users");
        assert_eq!(
            summary(&matches),
            vec![
                ("GET".to_string(), "/api/users".to_string()),
                ("GET".to_string(), "/api/*".to_string()),
            ]
        );
    }

    #[test]
    fn test_more_wildcards_rank_first() {
        let endpoints = vec![
            endpoint("GET", "/api/*"),
            endpoint("GET", "/api/*/comments/*"),
            endpoint("GET", "/*"),
        ];
        let matches = match_endpoints(&endpoints, "GET", "/api/posts/comments/1");
        assert_eq!(matches[0].route(), "/api/*/comments/*");
        assert_eq!(matches.len(), 3);
        assert_eq!(matches[1].route(), "/api/*");
        assert_eq!(matches[2].route(), "/*");
    }

    #[test]
    fn test_wildcard_allows_trailing_slash_and_ignores_case() {
        let endpoints = vec![endpoint("*", "/Admin/*")];
        assert_eq!(match_endpoints(&endpoints, "GET", "/admin/users/").len(), 1);
        assert!(match_endpoints(&endpoints, "GET", "/public/admin/users").is_empty());
    }

    #[test]
    fn test_wildcard_escapes_regex_characters() {
        let endpoints = vec![endpoint("GET", "/files/*.json")];
        assert_eq!(match_endpoints(&endpoints, "GET", "/files/a.json").len(), 1);
        assert!(match_endpoints(&endpoints, "GET", "/files/ajson").is_empty());
    }

    #[test]
    fn test_ties_keep_configured_order() {
        let endpoints = vec![
            endpoint("*", "/a/*"),
            endpoint("GET", "/*/b"),
        ];
        let matches = match_endpoints(&endpoints, "GET", "/a/b");
        assert_eq!(matches[0].route(), "/*/b");
        assert_eq!(matches[1].route(), "/a/*");
    }
}
