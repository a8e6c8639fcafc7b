//! # Request Context
//!
//! Read-only view handed to function and trigger handlers. The data lives
//! behind an `Arc`, so handing a handler its own clone is cheap and the
//! dispatcher's copy can never be mutated.

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::{Map, Value};

/// Authenticated caller resolved from a session token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub username: String,
    pub session_token: String,
}

/// Raw request metadata
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub method: String,
    pub path: String,
    pub remote_addr: Option<SocketAddr>,
    pub installation_id: Option<String>,
    /// Request headers, credential values redacted
    pub headers: Vec<(String, String)>,
}

impl RequestMeta {
    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Default)]
struct ContextInner {
    caller: Option<Caller>,
    master: bool,
    params: Map<String, Value>,
    class_name: Option<String>,
    object: Option<Map<String, Value>>,
    original: Option<Map<String, Value>>,
    meta: RequestMeta,
}

/// Immutable per-request context
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    inner: Arc<ContextInner>,
}

impl RequestContext {
    pub fn builder() -> RequestContextBuilder {
        RequestContextBuilder::default()
    }

    /// Caller identity, `None` for anonymous requests
    pub fn caller(&self) -> Option<&Caller> {
        self.inner.caller.as_ref()
    }

    /// Whether the request presented the master credential
    pub fn is_master(&self) -> bool {
        self.inner.master
    }

    pub fn params(&self) -> &Map<String, Value> {
        &self.inner.params
    }

    /// Single parameter lookup
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.inner.params.get(key)
    }

    /// Entity class the trigger fired for
    pub fn class_name(&self) -> Option<&str> {
        self.inner.class_name.as_deref()
    }

    /// Target object: pending state in `before*`, committed state in `after*`
    pub fn object(&self) -> Option<&Map<String, Value>> {
        self.inner.object.as_ref()
    }

    /// Stored state prior to an update or delete
    pub fn original(&self) -> Option<&Map<String, Value>> {
        self.inner.original.as_ref()
    }

    pub fn meta(&self) -> &RequestMeta {
        &self.inner.meta
    }

    /// Derive a builder seeded with this context's identity and metadata.
    ///
    /// Used by the trigger pipeline to build the `after*` context from the
    /// `before*` one without touching the original.
    pub fn derive(&self) -> RequestContextBuilder {
        RequestContextBuilder {
            inner: ContextInner {
                caller: self.inner.caller.clone(),
                master: self.inner.master,
                params: self.inner.params.clone(),
                class_name: self.inner.class_name.clone(),
                object: self.inner.object.clone(),
                original: self.inner.original.clone(),
                meta: self.inner.meta.clone(),
            },
        }
    }
}

/// Builder for [`RequestContext`]
#[derive(Debug, Default)]
pub struct RequestContextBuilder {
    inner: ContextInner,
}

impl RequestContextBuilder {
    #[must_use]
    pub fn caller(mut self, caller: Option<Caller>) -> Self {
        self.inner.caller = caller;
        self
    }

    #[must_use]
    pub const fn master(mut self, master: bool) -> Self {
        self.inner.master = master;
        self
    }

    #[must_use]
    pub fn params(mut self, params: Map<String, Value>) -> Self {
        self.inner.params = params;
        self
    }

    #[must_use]
    pub fn class_name(mut self, class_name: impl Into<String>) -> Self {
        self.inner.class_name = Some(class_name.into());
        self
    }

    #[must_use]
    pub fn object(mut self, object: Map<String, Value>) -> Self {
        self.inner.object = Some(object);
        self
    }

    #[must_use]
    pub fn original(mut self, original: Option<Map<String, Value>>) -> Self {
        self.inner.original = original;
        self
    }

    #[must_use]
    pub fn meta(mut self, meta: RequestMeta) -> Self {
        self.inner.meta = meta;
        self
    }

    pub fn build(self) -> RequestContext {
        RequestContext {
            inner: Arc::new(self.inner),
        }
    }
}
