//! In-process object store

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{new_object_id, now_timestamp, Object, ObjectStore, Query, StoreError, StoreResult};

/// Objects of one class keyed by `objectId`, tagged with insertion order
#[derive(Default)]
struct ClassTable {
    next_seq: u64,
    objects: HashMap<String, (u64, Object)>,
}

/// Objects grouped by class
#[derive(Default)]
pub struct MemoryStore {
    classes: RwLock<HashMap<String, ClassTable>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects stored for a class
    pub async fn count(&self, class_name: &str) -> usize {
        self.classes
            .read()
            .await
            .get(class_name)
            .map_or(0, |table| table.objects.len())
    }
}

fn not_found(class_name: &str, object_id: &str) -> StoreError {
    StoreError::NotFound {
        class_name: class_name.to_string(),
        object_id: object_id.to_string(),
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn create(&self, class_name: &str, mut fields: Object) -> StoreResult<Object> {
        let now = now_timestamp();
        let mut classes = self.classes.write().await;
        let table = classes.entry(class_name.to_string()).or_default();

        let mut object_id = new_object_id();
        while table.objects.contains_key(&object_id) {
            object_id = new_object_id();
        }

        fields.insert("objectId".to_string(), Value::String(object_id.clone()));
        fields.insert("createdAt".to_string(), Value::String(now.clone()));
        fields.insert("updatedAt".to_string(), Value::String(now));
        table.next_seq += 1;
        table.objects.insert(object_id, (table.next_seq, fields.clone()));
        Ok(fields)
    }

    async fn get(&self, class_name: &str, object_id: &str) -> StoreResult<Option<Object>> {
        Ok(self
            .classes
            .read()
            .await
            .get(class_name)
            .and_then(|table| table.objects.get(object_id))
            .map(|(_, object)| object.clone()))
    }

    async fn find(&self, class_name: &str, query: &Query) -> StoreResult<Vec<Object>> {
        let classes = self.classes.read().await;
        let Some(table) = classes.get(class_name) else {
            return Ok(Vec::new());
        };

        // Oldest first
        let mut matched: Vec<&(u64, Object)> = table
            .objects
            .values()
            .filter(|(_, object)| query.matches(object))
            .collect();
        matched.sort_unstable_by_key(|(seq, _)| *seq);

        Ok(matched
            .into_iter()
            .skip(query.skip)
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|(_, object)| object.clone())
            .collect())
    }

    async fn update(
        &self,
        class_name: &str,
        object_id: &str,
        fields: Object,
    ) -> StoreResult<Object> {
        let mut classes = self.classes.write().await;
        let object = classes
            .get_mut(class_name)
            .and_then(|table| table.objects.get_mut(object_id))
            .map(|(_, object)| object)
            .ok_or_else(|| not_found(class_name, object_id))?;

        for (key, value) in fields {
            if value.is_null() {
                object.remove(&key);
            } else {
                object.insert(key, value);
            }
        }
        object.insert("updatedAt".to_string(), Value::String(now_timestamp()));
        Ok(object.clone())
    }

    async fn delete(&self, class_name: &str, object_id: &str) -> StoreResult<()> {
        self.classes
            .write()
            .await
            .get_mut(class_name)
            .and_then(|table| table.objects.remove(object_id))
            .map(|_| ())
            .ok_or_else(|| not_found(class_name, object_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Object {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_create_assigns_managed_fields() {
        let store = MemoryStore::new();
        let created = store.create("Todo", obj(json!({"title": "a"}))).await.unwrap();

        assert!(created["objectId"].is_string());
        assert_eq!(created["createdAt"], created["updatedAt"]);
        assert_eq!(store.count("Todo").await, 1);
    }

    #[tokio::test]
    async fn test_update_merges_and_unsets_nulls() {
        let store = MemoryStore::new();
        let created = store
            .create("Todo", obj(json!({"title": "a", "note": "n"})))
            .await
            .unwrap();
        let id = created["objectId"].as_str().unwrap();

        let updated = store
            .update("Todo", id, obj(json!({"title": "b", "note": null})))
            .await
            .unwrap();
        assert_eq!(updated["title"], json!("b"));
        assert!(updated.get("note").is_none());
        assert_eq!(updated["createdAt"], created["createdAt"]);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = store.update("Todo", "missing", Object::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_find_filters_and_pages() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store
                .create("Todo", obj(json!({"n": i, "even": i % 2 == 0})))
                .await
                .unwrap();
        }

        let query = Query {
            equals: obj(json!({"even": true})),
            ..Query::default()
        };
        assert_eq!(store.find("Todo", &query).await.unwrap().len(), 3);

        let page = Query {
            limit: Some(2),
            skip: 1,
            ..Query::default()
        };
        let found = store.find("Todo", &page).await.unwrap();
        let ns: Vec<&Value> = found.iter().map(|o| &o["n"]).collect();
        assert_eq!(ns, [&json!(1), &json!(2)]);
        assert!(store.find("Missing", &page).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryStore::new();
        let created = store.create("Todo", Object::new()).await.unwrap();
        let id = created["objectId"].as_str().unwrap();

        store.delete("Todo", id).await.unwrap();
        assert!(store.get("Todo", id).await.unwrap().is_none());
        assert!(store.delete("Todo", id).await.is_err());
    }
}
