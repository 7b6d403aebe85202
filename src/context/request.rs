//! Per-request context.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, OnceLock};

use serde_json::{Map, Value};

use crate::context::{resolve_client_ip, User};
use crate::input::{extract_strings_with_limits, ExtractLimits, Source, UserInput};
use crate::routing::build_route_from_url;
use crate::security::BlockDecision;
use crate::vulnerabilities::DeferredAttack;

/// Mutable decision state of a request.
#[derive(Debug, Default)]
pub struct RequestState {
    pub user: Option<User>,
    pub rate_limit_group: Option<String>,
    /// Set once the block decision ran; later user/group changes are ignored.
    pub middleware_executed: bool,
    /// Outcome of the block decision, replayed on repeated calls.
    pub block_decision: Option<BlockDecision>,
    pub deferred_attack: Option<DeferredAttack>,
}

/// Everything the agent knows about one inbound request.
///
/// Built once by the framework adapter and passed by reference to every
/// agent call made while serving the request.
#[derive(Debug)]
pub struct RequestContext {
    method: String,
    route: String,
    url: String,
    route_params: BTreeMap<String, String>,
    query: BTreeMap<String, Vec<String>>,
    headers: BTreeMap<String, Vec<String>>,
    cookies: BTreeMap<String, String>,
    body: Option<Value>,
    remote_address: Option<String>,
    source: String,
    state: Mutex<RequestState>,
    extracted: [OnceLock<UserInput>; 5],
}

impl RequestContext {
    pub fn builder(method: impl Into<String>, url: impl Into<String>) -> RequestContextBuilder {
        RequestContextBuilder::new(method, url)
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Normalized route template, e.g. `/posts/:number`.
    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn route_params(&self) -> &BTreeMap<String, String> {
        &self.route_params
    }

    pub fn query(&self) -> &BTreeMap<String, Vec<String>> {
        &self.query
    }

    /// Headers keyed by lowercase name.
    pub fn headers(&self) -> &BTreeMap<String, Vec<String>> {
        &self.headers
    }

    /// First value of a header, looked up case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.header("user-agent")
    }

    pub fn cookies(&self) -> &BTreeMap<String, String> {
        &self.cookies
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Resolved client IP address.
    pub fn remote_address(&self) -> Option<&str> {
        self.remote_address.as_deref()
    }

    /// Name of the framework adapter that built the context.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn user(&self) -> Option<User> {
        self.state().user.clone()
    }

    pub fn rate_limit_group(&self) -> Option<String> {
        self.state().rate_limit_group.clone()
    }

    /// Whether the block decision already ran for this request.
    pub fn middleware_executed(&self) -> bool {
        self.state().middleware_executed
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, RequestState> {
        self.state.lock().expect("request state mutex poisoned")
    }

    /// Strings extracted from one source, computed on first use.
    pub fn user_input(&self, source: Source, limits: &ExtractLimits) -> &UserInput {
        self.extracted[source.index()].get_or_init(|| match source {
            Source::Body => match &self.body {
                Some(body) => extract_strings_with_limits(body, limits),
                None => UserInput::new(),
            },
            _ => extract_strings_with_limits(&self.source_value(source), limits),
        })
    }

    fn source_value(&self, source: Source) -> Value {
        match source {
            Source::Query => multi_value_object(&self.query),
            Source::Headers => multi_value_object(&self.headers),
            Source::Cookies => string_object(&self.cookies),
            Source::RouteParams => string_object(&self.route_params),
            Source::Body => self.body.clone().unwrap_or(Value::Null),
        }
    }
}

/// Single values become strings, repeated values become arrays.
fn multi_value_object(map: &BTreeMap<String, Vec<String>>) -> Value {
    let object: Map<String, Value> = map
        .iter()
        .map(|(key, values)| {
            let value = match values.as_slice() {
                [single] => Value::String(single.clone()),
                many => Value::Array(many.iter().cloned().map(Value::String).collect()),
            };
            (key.clone(), value)
        })
        .collect();
    Value::Object(object)
}

fn string_object(map: &BTreeMap<String, String>) -> Value {
    Value::Object(
        map.iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect(),
    )
}

/// Builder used by framework adapters.
#[derive(Debug)]
pub struct RequestContextBuilder {
    method: String,
    url: String,
    route: Option<String>,
    route_params: BTreeMap<String, String>,
    headers: BTreeMap<String, Vec<String>>,
    body: Option<Value>,
    remote_address: Option<String>,
    source: String,
    trust_proxy: bool,
}

impl RequestContextBuilder {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            url: url.into(),
            route: None,
            route_params: BTreeMap::new(),
            headers: BTreeMap::new(),
            body: None,
            remote_address: None,
            source: "custom".to_string(),
            trust_proxy: true,
        }
    }

    /// Route template as known to the framework. Derived from the URL when
    /// not given.
    pub fn route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    pub fn route_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.route_params.insert(name.into(), value.into());
        self
    }

    /// Append a header value. Names are case-insensitive.
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into());
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn remote_address(mut self, address: impl Into<String>) -> Self {
        self.remote_address = Some(address.into());
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Whether `X-Forwarded-For` may override the socket address.
    pub fn trust_proxy(mut self, trust: bool) -> Self {
        self.trust_proxy = trust;
        self
    }

    pub fn build(self) -> RequestContext {
        let route = self
            .route
            .or_else(|| build_route_from_url(&self.url))
            .unwrap_or_else(|| "/".to_string());

        let forwarded_for = self
            .headers
            .get("x-forwarded-for")
            .map(|values| values.join(","));
        let remote_address = resolve_client_ip(
            self.remote_address.as_deref(),
            forwarded_for.as_deref(),
            self.trust_proxy,
        );

        RequestContext {
            method: self.method,
            query: parse_query(&self.url),
            cookies: parse_cookies(&self.headers),
            route,
            url: self.url,
            route_params: self.route_params,
            headers: self.headers,
            body: self.body,
            remote_address,
            source: self.source,
            state: Mutex::new(RequestState::default()),
            extracted: Default::default(),
        }
    }
}

fn parse_query(url: &str) -> BTreeMap<String, Vec<String>> {
    let mut query: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let Some((_, raw)) = url.split_once('?') else {
        return query;
    };
    let raw = raw.split('#').next().unwrap_or_default();

    for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        query.entry(key.into_owned()).or_default().push(value.into_owned());
    }
    query
}

fn parse_cookies(headers: &BTreeMap<String, Vec<String>>) -> BTreeMap<String, String> {
    let mut cookies = BTreeMap::new();
    let Some(values) = headers.get("cookie") else {
        return cookies;
    };

    for pair in values.iter().flat_map(|header| header.split(';')) {
        if let Some((name, value)) = pair.split_once('=') {
            let name = name.trim();
            if !name.is_empty() {
                cookies
                    .entry(name.to_string())
                    .or_insert_with(|| value.trim().to_string());
            }
        }
    }
    cookies
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> RequestContext {
        RequestContext::builder("get", "http://localhost:3000/posts/3?id=1&tag=a&tag=b")
            .header("User-Agent", "curl/8.0")
            .header("Cookie", "session=abc; theme=dark")
            .header("X-Forwarded-For", "9.9.9.9")
            .remote_address("127.0.0.1")
            .route_param("id", "3")
            .body(json!({ "title": "hello" }))
            .source("axum")
            .build()
    }

    #[test]
    fn test_builder_parses_request() {
        let ctx = sample();

        assert_eq!(ctx.method(), "GET");
        assert_eq!(ctx.route(), "/posts/:number");
        assert_eq!(ctx.query().get("tag").unwrap(), &vec!["a".to_string(), "b".to_string()]);
        assert_eq!(ctx.cookies().get("theme").map(String::as_str), Some("dark"));
        assert_eq!(ctx.user_agent(), Some("curl/8.0"));
        assert_eq!(ctx.header("user-agent"), Some("curl/8.0"));
        assert_eq!(ctx.remote_address(), Some("9.9.9.9"));
        assert_eq!(ctx.source(), "axum");
    }

    #[test]
    fn test_explicit_route_wins() {
        let ctx = RequestContext::builder("GET", "/posts/3").route("/posts/:id").build();
        assert_eq!(ctx.route(), "/posts/:id");
    }

    #[test]
    fn test_proxy_trust_disabled() {
        let ctx = RequestContext::builder("GET", "/")
            .header("x-forwarded-for", "9.9.9.9")
            .remote_address("127.0.0.1")
            .trust_proxy(false)
            .build();
        assert_eq!(ctx.remote_address(), Some("127.0.0.1"));
    }

    #[test]
    fn test_user_input_per_source() {
        let ctx = sample();
        let limits = ExtractLimits::default();

        let query = ctx.user_input(Source::Query, &limits);
        assert_eq!(query.get("1").map(String::as_str), Some(".id"));
        assert_eq!(query.get("b").map(String::as_str), Some(".tag.[1]"));
        assert_eq!(query.get("a,b").map(String::as_str), Some(".tag"));

        let cookies = ctx.user_input(Source::Cookies, &limits);
        assert_eq!(cookies.get("abc").map(String::as_str), Some(".session"));

        let params = ctx.user_input(Source::RouteParams, &limits);
        assert_eq!(params.get("3").map(String::as_str), Some(".id"));

        let body = ctx.user_input(Source::Body, &limits);
        assert_eq!(body.get("hello").map(String::as_str), Some(".title"));
    }

    #[test]
    fn test_missing_body_extracts_nothing() {
        let ctx = RequestContext::builder("GET", "/").build();
        assert!(ctx.user_input(Source::Body, &ExtractLimits::default()).is_empty());
    }

    #[test]
    fn test_state_starts_empty() {
        let ctx = sample();
        assert!(ctx.user().is_none());
        assert!(ctx.rate_limit_group().is_none());
        assert!(!ctx.middleware_executed());
    }
}
