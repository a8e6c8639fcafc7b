//! Cloud code module
//!
//! Named functions and class lifecycle triggers:
//! - registration at startup ([`CloudRegistryBuilder`]) frozen into [`CloudRegistry`]
//! - function dispatch ([`dispatcher::invoke`])
//! - the before/write/after trigger pipeline ([`TriggerPipeline`])

mod context;
pub mod dispatcher;
mod error;
mod handler;
pub mod pipeline;
mod registry;

pub use context::{Caller, RequestContext, RequestContextBuilder, RequestMeta};
pub use dispatcher::InvocationResult;
pub use error::{codes, CloudError, CloudResult, ErrorEnvelope};
pub use handler::{handler_fn, CloudHandler, FnHandler, SharedHandler};
pub use pipeline::{Mutation, Operation, PipelineOutcome, PipelineState, TriggerPipeline};
pub use registry::{
    CloudRegistry, CloudRegistryBuilder, DuplicateName, FunctionRegistry, TriggerEvent,
    TriggerRegistry,
};
