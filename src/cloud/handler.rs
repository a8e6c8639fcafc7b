//! # Cloud Handlers
//!
//! Single-method interface shared by functions and triggers.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::context::RequestContext;
use super::error::CloudResult;

/// A cloud function or trigger body
#[async_trait]
pub trait CloudHandler: Send + Sync + 'static {
    async fn call(&self, ctx: RequestContext) -> CloudResult<Value>;
}

/// Shared handler reference stored in the registries
pub type SharedHandler = Arc<dyn CloudHandler>;

/// Adapter turning an async closure into a [`CloudHandler`]
pub struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> CloudHandler for FnHandler<F>
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CloudResult<Value>> + Send + 'static,
{
    async fn call(&self, ctx: RequestContext) -> CloudResult<Value> {
        (self.f)(ctx).await
    }
}

/// Wrap a closure as a shared handler
///
/// ```
/// use rust_appserver::cloud::handler_fn;
/// use serde_json::json;
///
/// let hello = handler_fn(|_ctx| async { Ok(json!("hi")) });
/// # let _ = hello;
/// ```
pub fn handler_fn<F, Fut>(f: F) -> SharedHandler
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CloudResult<Value>> + Send + 'static,
{
    Arc::new(FnHandler { f })
}
