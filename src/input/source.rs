//! Request sources that carry user input.

use serde::Serialize;
use std::fmt;

/// A part of the inbound request that user input is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Source {
    #[serde(rename = "query")]
    Query,
    #[serde(rename = "headers")]
    Headers,
    #[serde(rename = "cookies")]
    Cookies,
    #[serde(rename = "routeParams")]
    RouteParams,
    #[serde(rename = "body")]
    Body,
}

impl Source {
    /// Every source, in the order the dispatcher scans them.
    pub const ALL: [Source; 5] = [
        Source::Query,
        Source::Headers,
        Source::Cookies,
        Source::RouteParams,
        Source::Body,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Query => "query",
            Source::Headers => "headers",
            Source::Cookies => "cookies",
            Source::RouteParams => "routeParams",
            Source::Body => "body",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            Source::Query => 0,
            Source::Headers => 1,
            Source::Cookies => 2,
            Source::RouteParams => 3,
            Source::Body => 4,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
