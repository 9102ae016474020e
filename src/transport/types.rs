//! Request and outcome types shared by every transport.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// HTTP method understood by the transports.
///
/// GET and POST are deduplicated independently, so the method is part of
/// every cache lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered request parameters (name/value pairs, duplicates allowed).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Builder-style append.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[(String, String)] {
        &self.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Everything a transport needs to start one operation.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub url: String,
    pub params: Params,
}

impl RequestSpec {
    pub fn new(method: Method, url: impl Into<String>, params: Params) -> Self {
        Self {
            method,
            url: url.into(),
            params,
        }
    }
}

/// A response delivered by a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

/// Errors reported through [`Outcome::Failed`].
///
/// Cloneable because a deduplicated handle hands the same outcome to every
/// waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The request could not be built (bad URL, bad parameters).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Connection or protocol failure.
    #[error("request failed: {0}")]
    Request(String),

    /// The server answered with a non-success status.
    #[error("server returned status {status}")]
    Status { status: u16, body: String },

    /// A JSONP body was not wrapped in the expected callback.
    #[error("malformed JSONP response for callback `{callback}`")]
    MalformedJsonp { callback: String },
}

/// Terminal state of one request. Exactly one is ever recorded per handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed(Response),
    Failed(TransportError),
    Aborted,
}

impl Outcome {
    /// Short label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Completed(_) => "completed",
            Outcome::Failed(_) => "failed",
            Outcome::Aborted => "aborted",
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Outcome::Aborted)
    }
}
