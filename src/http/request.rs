//! Collected request module
//!
//! The router works on a fully-read request so every stage can inspect the
//! body without owning hyper's streaming `Incoming` type.

use hyper::body::Bytes;
use hyper::header::HeaderMap;
use hyper::Method;
use std::net::SocketAddr;

/// An inbound request with its body already collected
#[derive(Debug, Clone)]
pub struct AppRequest {
    pub method: Method,
    /// URI path as received, always starting with `/`
    pub path: String,
    /// Raw query string without the leading `?`
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub remote_addr: Option<SocketAddr>,
}

impl AppRequest {
    pub fn new(method: Method, uri: &str) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((p, q)) => (p, Some(q.to_string())),
            None => (uri, None),
        };
        Self {
            method,
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            query,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            remote_addr: None,
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = value.parse() {
            self.headers.insert(name, value);
        }
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Header value as a string, if present and valid ASCII
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub const fn is_head(&self) -> bool {
        matches!(self.method, Method::HEAD)
    }

    /// First value of a query parameter, percent-decoded (`+` is a space)
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.query.as_deref()?.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key)? == name).then(|| decode_component(value))?
        })
    }
}

fn decode_component(raw: &str) -> Option<String> {
    urlencoding::decode(&raw.replace('+', " "))
        .ok()
        .map(std::borrow::Cow::into_owned)
}
