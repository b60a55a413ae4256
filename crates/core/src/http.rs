//! Request and response values exchanged between the worker, its stores
//! and the network.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// How a request should treat intermediate HTTP caches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    /// Normal fetch.
    #[default]
    Default,
    /// Bypass intermediate caches and revalidate with the origin.
    Reload,
}

/// An intercepted or outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: String,
    pub cache_mode: CacheMode,
}

impl Request {
    /// A plain `GET` for `url`.
    pub fn get(url: impl Into<String>) -> Self {
        Self { method: "GET".to_string(), url: url.into(), cache_mode: CacheMode::Default }
    }

    /// A request with an arbitrary method.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self { method: method.into().to_ascii_uppercase(), url: url.into(), cache_mode: CacheMode::Default }
    }

    pub fn with_cache_mode(mut self, cache_mode: CacheMode) -> Self {
        self.cache_mode = cache_mode;
        self
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }
}

/// A response as received from the network or held in a cache store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    /// Header name/value pairs in wire order.
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self { status, status_text: String::new(), headers: Vec::new(), body: body.into() }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// True for 2xx statuses.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header value matching `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
