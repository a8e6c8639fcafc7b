//! # Function Dispatcher
//!
//! Looks up a function by name and runs it to completion on its own task.
//! Handler failures come back as structured [`CloudError`]s; a panicking
//! handler is contained and reported as an internal fault.

use std::time::Instant;

use serde_json::Value;

use super::context::RequestContext;
use super::error::{CloudError, CloudResult};
use super::handler::SharedHandler;
use super::registry::CloudRegistry;
use crate::logger;

/// Outcome of a function invocation
pub type InvocationResult = CloudResult<Value>;

/// Run a handler on a separate task and wait for it.
///
/// The task is not cancelled when the caller goes away; once started a
/// handler always runs to completion or failure.
pub async fn run_handler(handler: &SharedHandler, ctx: RequestContext) -> CloudResult<Value> {
    let handler = SharedHandler::clone(handler);
    match tokio::spawn(async move { handler.call(ctx).await }).await {
        Ok(result) => result,
        Err(join_err) if join_err.is_panic() => {
            Err(CloudError::Internal("handler panicked".to_string()))
        }
        Err(join_err) => Err(CloudError::Internal(format!(
            "handler task aborted: {join_err}"
        ))),
    }
}

/// Invoke the function registered under `name`
pub async fn invoke(registry: &CloudRegistry, name: &str, ctx: RequestContext) -> InvocationResult {
    let Some(handler) = registry.function(name) else {
        logger::log_warning(&format!("[Cloud] Invalid function: {name}"));
        return Err(CloudError::function_not_found(name));
    };

    let started = Instant::now();
    let result = run_handler(handler, ctx).await;
    let elapsed_ms = started.elapsed().as_millis();

    match &result {
        Ok(_) => logger::log_debug(&format!(
            "[Cloud] function {name} succeeded in {elapsed_ms}ms"
        )),
        Err(CloudError::Internal(detail)) => logger::log_error(&format!(
            "[Cloud] function {name} faulted after {elapsed_ms}ms: {detail}"
        )),
        Err(err) => logger::log_warning(&format!(
            "[Cloud] function {name} failed after {elapsed_ms}ms: {err}"
        )),
    }
    result
}
