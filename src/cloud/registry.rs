//! # Cloud Registry
//!
//! Functions and triggers are registered through [`CloudRegistryBuilder`]
//! during startup and frozen into an immutable [`CloudRegistry`].

use std::collections::HashMap;
use std::fmt;

use super::handler::SharedHandler;
use crate::logger;

/// Lifecycle events a trigger can bind to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerEvent {
    BeforeCreate,
    BeforeSave,
    AfterSave,
    BeforeDelete,
    AfterDelete,
}

impl TriggerEvent {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BeforeCreate => "beforeCreate",
            Self::BeforeSave => "beforeSave",
            Self::AfterSave => "afterSave",
            Self::BeforeDelete => "beforeDelete",
            Self::AfterDelete => "afterDelete",
        }
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-fatal registration warning: the previous handler was replaced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplicateName {
    Function(String),
    Trigger { class_name: String, event: TriggerEvent },
}

impl fmt::Display for DuplicateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Function(name) => {
                write!(f, "function '{name}' redefined, previous handler replaced")
            }
            Self::Trigger { class_name, event } => write!(
                f,
                "{event} trigger for class '{class_name}' redefined, previous handler replaced"
            ),
        }
    }
}

/// Function name to handler
#[derive(Default)]
pub struct FunctionRegistry {
    handlers: HashMap<String, SharedHandler>,
}

impl FunctionRegistry {
    /// Register a function, replacing any previous handler of the same name
    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: SharedHandler,
    ) -> Option<DuplicateName> {
        let name = name.into();
        self.handlers
            .insert(name.clone(), handler)
            .map(|_| DuplicateName::Function(name))
    }

    pub fn get(&self, name: &str) -> Option<&SharedHandler> {
        self.handlers.get(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// `(class, event)` to handler, at most one handler per key
#[derive(Default)]
pub struct TriggerRegistry {
    handlers: HashMap<String, HashMap<TriggerEvent, SharedHandler>>,
}

impl TriggerRegistry {
    pub fn register(
        &mut self,
        class_name: impl Into<String>,
        event: TriggerEvent,
        handler: SharedHandler,
    ) -> Option<DuplicateName> {
        let class_name = class_name.into();
        self.handlers
            .entry(class_name.clone())
            .or_default()
            .insert(event, handler)
            .map(|_| DuplicateName::Trigger { class_name, event })
    }

    pub fn get(&self, class_name: &str, event: TriggerEvent) -> Option<&SharedHandler> {
        self.handlers.get(class_name)?.get(&event)
    }

    pub fn len(&self) -> usize {
        self.handlers.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Mutable registration surface used at startup
#[derive(Default)]
pub struct CloudRegistryBuilder {
    functions: FunctionRegistry,
    triggers: TriggerRegistry,
}

impl CloudRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a cloud function
    pub fn define(&mut self, name: &str, handler: SharedHandler) -> Option<DuplicateName> {
        let warning = self.functions.register(name, handler);
        if let Some(w) = &warning {
            logger::log_warning(&w.to_string());
        }
        warning
    }

    /// Bind a trigger to a class lifecycle event
    pub fn on(
        &mut self,
        class_name: &str,
        event: TriggerEvent,
        handler: SharedHandler,
    ) -> Option<DuplicateName> {
        let warning = self.triggers.register(class_name, event, handler);
        if let Some(w) = &warning {
            logger::log_warning(&w.to_string());
        }
        warning
    }

    pub fn before_save(
        &mut self,
        class_name: &str,
        handler: SharedHandler,
    ) -> Option<DuplicateName> {
        self.on(class_name, TriggerEvent::BeforeSave, handler)
    }

    pub fn after_save(
        &mut self,
        class_name: &str,
        handler: SharedHandler,
    ) -> Option<DuplicateName> {
        self.on(class_name, TriggerEvent::AfterSave, handler)
    }

    pub fn before_delete(
        &mut self,
        class_name: &str,
        handler: SharedHandler,
    ) -> Option<DuplicateName> {
        self.on(class_name, TriggerEvent::BeforeDelete, handler)
    }

    pub fn after_delete(
        &mut self,
        class_name: &str,
        handler: SharedHandler,
    ) -> Option<DuplicateName> {
        self.on(class_name, TriggerEvent::AfterDelete, handler)
    }

    /// Freeze the registrations
    pub fn build(self) -> CloudRegistry {
        logger::log_info(&format!(
            "[Cloud] {} function(s), {} trigger(s) registered",
            self.functions.len(),
            self.triggers.len()
        ));
        CloudRegistry {
            functions: self.functions,
            triggers: self.triggers,
        }
    }
}

/// Frozen registrations, read concurrently without locks
#[derive(Default)]
pub struct CloudRegistry {
    functions: FunctionRegistry,
    triggers: TriggerRegistry,
}

impl CloudRegistry {
    pub fn function(&self, name: &str) -> Option<&SharedHandler> {
        self.functions.get(name)
    }

    pub fn trigger(&self, class_name: &str, event: TriggerEvent) -> Option<&SharedHandler> {
        self.triggers.get(class_name, event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::handler_fn;
    use serde_json::json;

    #[test]
    fn test_duplicate_function_replaces_and_warns() {
        let mut registry = FunctionRegistry::default();
        assert!(registry
            .register("hello", handler_fn(|_| async { Ok(json!(1)) }))
            .is_none());
        let warning = registry.register("hello", handler_fn(|_| async { Ok(json!(2)) }));
        assert_eq!(warning, Some(DuplicateName::Function("hello".into())));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_trigger_replaces_and_warns() {
        let mut registry = TriggerRegistry::default();
        let h = handler_fn(|_| async { Ok(json!(null)) });
        assert!(registry
            .register("Todo", TriggerEvent::BeforeSave, h.clone())
            .is_none());
        assert!(registry
            .register("Todo", TriggerEvent::AfterSave, h.clone())
            .is_none());
        assert_eq!(
            registry.register("Todo", TriggerEvent::BeforeSave, h),
            Some(DuplicateName::Trigger {
                class_name: "Todo".into(),
                event: TriggerEvent::BeforeSave
            })
        );
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_lookup_after_build() {
        let mut builder = CloudRegistryBuilder::new();
        builder.define("hello", handler_fn(|_| async { Ok(json!("hi")) }));
        builder.before_save("Todo", handler_fn(|_| async { Ok(json!(null)) }));
        let registry = builder.build();

        assert!(registry.function("hello").is_some());
        assert!(registry.function("missing").is_none());
        assert!(registry.trigger("Todo", TriggerEvent::BeforeSave).is_some());
        assert!(registry.trigger("Todo", TriggerEvent::AfterSave).is_none());
        assert!(registry.trigger("Note", TriggerEvent::BeforeSave).is_none());
    }

    #[test]
    fn test_event_names() {
        assert_eq!(TriggerEvent::BeforeCreate.to_string(), "beforeCreate");
        assert_eq!(TriggerEvent::AfterDelete.as_str(), "afterDelete");
    }
}
