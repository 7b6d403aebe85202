//! Recursive user-input extraction.
//!
//! Walks an arbitrary JSON tree and returns every string found in it, keyed
//! by the string, together with a readable path such as `.user.tags.[1]` or
//! `.token<jwt>.sub`.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::input::jwt::try_decode_jwt;

/// Extracted strings mapped to the path where they were found.
pub type UserInput = BTreeMap<String, String>;

/// Bounds applied while walking untrusted input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractLimits {
    /// Deepest nesting level that is still visited. The root is level 0.
    pub max_depth: usize,
    /// Maximum number of distinct strings collected.
    pub max_entries: usize,
}

impl Default for ExtractLimits {
    fn default() -> Self {
        Self {
            max_depth: 20,
            max_entries: 5_000,
        }
    }
}

/// Extract every string from `value` using the default limits.
pub fn extract_strings(value: &Value) -> UserInput {
    extract_strings_with_limits(value, &ExtractLimits::default())
}

/// Extract every string from `value`.
///
/// - object keys are collected at the path of the object
/// - array elements get an `.[index]` segment, and a non-empty array of
///   scalars is also collected as its comma-joined form
/// - strings that decode as a JWT are walked again under a `<jwt>` marker,
///   without the `iss` claim
///
/// When the same string occurs more than once, the first path wins.
pub fn extract_strings_with_limits(value: &Value, limits: &ExtractLimits) -> UserInput {
    let mut walker = Walker {
        limits,
        results: BTreeMap::new(),
        truncated: false,
    };
    let mut path = Vec::new();
    walker.visit(value, &mut path, 0);

    if walker.truncated {
        tracing::debug!(
            max_depth = limits.max_depth,
            max_entries = limits.max_entries,
            collected = walker.results.len(),
            "User input exceeded extraction limits, remainder skipped"
        );
    }

    walker.results
}

#[derive(Debug, Clone)]
enum PathPart {
    Object(String),
    Array(usize),
    Jwt,
}

/// Render a traversal route as a readable path. The root is `.`.
fn build_path(parts: &[PathPart]) -> String {
    if parts.is_empty() {
        return ".".to_string();
    }

    let mut path = String::new();
    for part in parts {
        match part {
            PathPart::Object(key) => {
                path.push('.');
                path.push_str(key);
            }
            PathPart::Array(index) => {
                path.push_str(".[");
                path.push_str(&index.to_string());
                path.push(']');
            }
            PathPart::Jwt => path.push_str("<jwt>"),
        }
    }
    path
}

struct Walker<'a> {
    limits: &'a ExtractLimits,
    results: UserInput,
    truncated: bool,
}

impl Walker<'_> {
    fn add(&mut self, input: &str, path: &[PathPart]) {
        if self.results.contains_key(input) {
            return;
        }
        if self.results.len() >= self.limits.max_entries {
            self.truncated = true;
            return;
        }
        self.results.insert(input.to_string(), build_path(path));
    }

    fn visit(&mut self, value: &Value, path: &mut Vec<PathPart>, depth: usize) {
        if depth > self.limits.max_depth {
            self.truncated = true;
            return;
        }

        match value {
            Value::Object(map) => {
                for (key, nested) in map {
                    self.add(key, path);
                    path.push(PathPart::Object(key.clone()));
                    self.visit(nested, path, depth + 1);
                    path.pop();
                }
            }
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    path.push(PathPart::Array(index));
                    self.visit(item, path, depth + 1);
                    path.pop();
                }

                // A repeated query key arrives as an array; scan its joined form
                // as well so `?a=1&a=2` is seen the way string concatenation would.
                if let Some(joined) = join_scalars(items) {
                    if !joined.is_empty() {
                        self.add(&joined, path);
                    }
                }
            }
            Value::String(s) => {
                self.add(s, path);

                if let Some(mut claims) = try_decode_jwt(s) {
                    // Issuer URLs produce false positives.
                    claims.remove("iss");
                    path.push(PathPart::Jwt);
                    self.visit(&Value::Object(claims), path, depth + 1);
                    path.pop();
                }
            }
            Value::Number(_) | Value::Bool(_) | Value::Null => {}
        }
    }
}

fn join_scalars(items: &[Value]) -> Option<String> {
    if items.is_empty() {
        return None;
    }

    let mut rendered = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::String(s) => rendered.push(s.clone()),
            Value::Number(n) => rendered.push(n.to_string()),
            Value::Bool(b) => rendered.push(b.to_string()),
            Value::Null => rendered.push(String::new()),
            Value::Array(_) | Value::Object(_) => return None,
        }
    }
    Some(rendered.join(","))
}
