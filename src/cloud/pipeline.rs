//! # Trigger Pipeline
//!
//! Runs `before*` handlers, the store write, then `after*` handlers for one
//! persistence operation.
//!
//! ```text
//! Pending -> Validating -> Aborted
//!                       -> Committing -> Committed -> Notifying -> Done
//! ```
//!
//! A `before*` failure aborts with no write. An `after*` failure is logged
//! only; the write has already committed.

use std::fmt;

use serde_json::Value;

use super::context::RequestContext;
use super::dispatcher::run_handler;
use super::error::{CloudError, CloudResult};
use super::registry::{CloudRegistry, TriggerEvent};
use crate::logger;
use crate::store::{Object, ObjectStore};

/// Persistence operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Save,
    Delete,
}

impl Operation {
    /// `before*` events in the order they run
    pub const fn before_events(self) -> &'static [TriggerEvent] {
        match self {
            Self::Create => &[TriggerEvent::BeforeCreate, TriggerEvent::BeforeSave],
            Self::Save => &[TriggerEvent::BeforeSave],
            Self::Delete => &[TriggerEvent::BeforeDelete],
        }
    }

    pub const fn after_event(self) -> TriggerEvent {
        match self {
            Self::Create | Self::Save => TriggerEvent::AfterSave,
            Self::Delete => TriggerEvent::AfterDelete,
        }
    }
}

/// Pipeline states for one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Pending,
    Validating,
    Aborted,
    Committing,
    Committed,
    Notifying,
    Done,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Mutation the pipeline runs
#[derive(Debug, Clone)]
pub struct Mutation {
    pub operation: Operation,
    pub class_name: String,
    /// Target object id, `None` for creates
    pub object_id: Option<String>,
    /// Client-supplied fields (reserved fields already stripped)
    pub fields: Object,
}

/// Result of a completed pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    /// Committed object (for deletes, the object as it was before removal)
    pub object: Object,
    pub final_state: PipelineState,
    /// Set when the `after*` handler failed; never surfaced to the client
    pub after_error: Option<CloudError>,
}

/// One trigger pipeline run
pub struct TriggerPipeline<'a> {
    registry: &'a CloudRegistry,
    store: &'a dyn ObjectStore,
    state: PipelineState,
    hidden_fields: &'a [&'a str],
}

impl<'a> TriggerPipeline<'a> {
    pub fn new(registry: &'a CloudRegistry, store: &'a dyn ObjectStore) -> Self {
        Self {
            registry,
            store,
            state: PipelineState::Pending,
            hidden_fields: &[],
        }
    }

    /// Keep `fields` out of every trigger context. The store write still
    /// receives them.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn hiding(mut self, fields: &'a [&'a str]) -> Self {
        self.hidden_fields = fields;
        self
    }

    fn visible(&self, mut object: Object) -> Object {
        for field in self.hidden_fields {
            object.remove(*field);
        }
        object
    }

    fn transition(&mut self, next: PipelineState, class_name: &str) {
        logger::log_debug(&format!(
            "[Trigger] {class_name}: {} -> {next}",
            self.state
        ));
        self.state = next;
    }

    /// Execute the mutation.
    ///
    /// `base` carries the caller identity and request metadata; the pipeline
    /// derives the trigger contexts from it.
    pub async fn run(
        mut self,
        mutation: Mutation,
        base: &RequestContext,
    ) -> CloudResult<PipelineOutcome> {
        let class_name = mutation.class_name.as_str();

        let original = match &mutation.object_id {
            Some(id) => Some(
                self.store
                    .get(class_name, id)
                    .await?
                    .ok_or_else(CloudError::object_not_found)?,
            ),
            None => None,
        };

        let pending = pending_state(mutation.operation, original.as_ref(), &mutation.fields);

        self.transition(PipelineState::Validating, class_name);
        let before_ctx = base
            .derive()
            .class_name(class_name)
            .object(self.visible(pending))
            .original(original.clone().map(|o| self.visible(o)))
            .build();

        for &event in mutation.operation.before_events() {
            let Some(handler) = self.registry.trigger(class_name, event) else {
                continue;
            };
            if let Err(err) = run_handler(handler, before_ctx.clone()).await {
                self.transition(PipelineState::Aborted, class_name);
                logger::log_warning(&format!(
                    "[Trigger] {event} rejected {class_name}: {err}"
                ));
                return Err(into_validation(err));
            }
        }

        self.transition(PipelineState::Committing, class_name);
        let committed = match self.write(&mutation, original).await {
            Ok(object) => object,
            Err(err) => {
                logger::log_error(&format!(
                    "[Trigger] store write failed for {class_name}: {err}"
                ));
                return Err(err);
            }
        };
        self.transition(PipelineState::Committed, class_name);

        let after_event = mutation.operation.after_event();
        let mut after_error = None;
        if let Some(handler) = self.registry.trigger(class_name, after_event) {
            self.transition(PipelineState::Notifying, class_name);
            let after_ctx = before_ctx
                .derive()
                .object(self.visible(committed.clone()))
                .build();
            if let Err(err) = run_handler(handler, after_ctx).await {
                logger::log_error(&format!(
                    "[Trigger] {after_event} failed for {class_name} (write kept): {err}"
                ));
                after_error = Some(err);
            }
        }
        self.transition(PipelineState::Done, class_name);

        Ok(PipelineOutcome {
            object: committed,
            final_state: self.state,
            after_error,
        })
    }

    async fn write(&self, mutation: &Mutation, original: Option<Object>) -> CloudResult<Object> {
        let class_name = mutation.class_name.as_str();
        match (mutation.operation, mutation.object_id.as_deref()) {
            (Operation::Create, _) => {
                Ok(self.store.create(class_name, mutation.fields.clone()).await?)
            }
            (Operation::Save, Some(id)) => {
                Ok(self.store.update(class_name, id, mutation.fields.clone()).await?)
            }
            (Operation::Delete, Some(id)) => {
                self.store.delete(class_name, id).await?;
                Ok(original.unwrap_or_default())
            }
            (_, None) => Err(CloudError::Internal(format!(
                "{:?} on {class_name} without an object id",
                mutation.operation
            ))),
        }
    }
}

/// State handed to `before*` handlers
fn pending_state(operation: Operation, original: Option<&Object>, fields: &Object) -> Object {
    match operation {
        Operation::Create => fields.clone(),
        Operation::Save => {
            let mut merged = original.cloned().unwrap_or_default();
            for (key, value) in fields {
                if value.is_null() {
                    merged.remove(key);
                } else {
                    merged.insert(key.clone(), value.clone());
                }
            }
            merged
        }
        Operation::Delete => original.cloned().unwrap_or_default(),
    }
}

/// Any `before*` rejection reaches the client as a validation failure.
/// Faults keep their internal classification.
fn into_validation(err: CloudError) -> CloudError {
    match err {
        CloudError::Internal(_) | CloudError::Store(_) => err,
        CloudError::Validation(message)
        | CloudError::Application { message, .. }
        | CloudError::Authorization { message, .. }
        | CloudError::NotFound { message, .. } => CloudError::Validation(message),
        CloudError::InvalidJson(message) => CloudError::Validation(message),
    }
}

/// Convenience for handlers: read a string field from the target object
pub fn object_str<'c>(ctx: &'c RequestContext, key: &str) -> Option<&'c str> {
    ctx.object()?.get(key).and_then(Value::as_str)
}
