//! Object store module
//!
//! The persistence engine sits behind [`ObjectStore`]. The gateway and the
//! trigger pipeline only ever talk to this trait; `memory://` is the
//! in-process engine shipped with the server.

mod memory;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

pub use memory::MemoryStore;

/// Stored object representation
pub type Object = Map<String, Value>;

/// Fields managed by the store, never taken from client input
pub const RESERVED_FIELDS: [&str; 3] = ["objectId", "createdAt", "updatedAt"];

/// Store errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("object {class_name}/{object_id} not found")]
    NotFound {
        class_name: String,
        object_id: String,
    },

    #[error("unsupported database uri: {0}")]
    UnsupportedUri(String),

    #[error("backend failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Equality query over a class
#[derive(Debug, Clone, Default)]
pub struct Query {
    /// Field values an object must match exactly
    pub equals: Object,
    pub limit: Option<usize>,
    pub skip: usize,
}

impl Query {
    /// Whether `object` satisfies every equality constraint
    pub fn matches(&self, object: &Object) -> bool {
        self.equals
            .iter()
            .all(|(key, expected)| object.get(key) == Some(expected))
    }
}

/// Persistence engine interface
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Insert a new object; the store assigns `objectId`, `createdAt`, `updatedAt`
    async fn create(&self, class_name: &str, fields: Object) -> StoreResult<Object>;

    async fn get(&self, class_name: &str, object_id: &str) -> StoreResult<Option<Object>>;

    async fn find(&self, class_name: &str, query: &Query) -> StoreResult<Vec<Object>>;

    /// Merge `fields` into an existing object and bump `updatedAt`
    async fn update(
        &self,
        class_name: &str,
        object_id: &str,
        fields: Object,
    ) -> StoreResult<Object>;

    async fn delete(&self, class_name: &str, object_id: &str) -> StoreResult<()>;
}

/// Open the store named by a connection string
pub fn connect(database_uri: &str) -> StoreResult<Arc<dyn ObjectStore>> {
    match database_uri.split_once("://") {
        Some(("memory", _)) => Ok(Arc::new(MemoryStore::new())),
        _ => Err(StoreError::UnsupportedUri(database_uri.to_string())),
    }
}

/// Remove store-managed fields from client input
pub fn strip_reserved(mut fields: Object) -> Object {
    for key in RESERVED_FIELDS {
        fields.remove(key);
    }
    fields
}

/// Random 10-character alphanumeric identifier
pub fn new_object_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect()
}

/// Current time in the store's timestamp format
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_connect_memory() {
        assert!(connect("memory://").is_ok());
        assert!(matches!(
            connect("mongodb://localhost/app"),
            Err(StoreError::UnsupportedUri(_))
        ));
        assert!(connect("not a uri").is_err());
    }

    #[test]
    fn test_strip_reserved() {
        let Value::Object(fields) = json!({"objectId": "x", "createdAt": "t", "title": "a"}) else {
            unreachable!()
        };
        let stripped = strip_reserved(fields);
        assert_eq!(stripped.len(), 1);
        assert_eq!(stripped["title"], json!("a"));
    }

    #[test]
    fn test_object_id_shape() {
        let id = new_object_id();
        assert_eq!(id.len(), 10);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_query_matches() {
        let Value::Object(equals) = json!({"done": false}) else {
            unreachable!()
        };
        let query = Query {
            equals,
            ..Query::default()
        };
        let Value::Object(open) = json!({"title": "a", "done": false}) else {
            unreachable!()
        };
        let Value::Object(closed) = json!({"title": "b", "done": true}) else {
            unreachable!()
        };
        assert!(query.matches(&open));
        assert!(!query.matches(&closed));
    }
}
