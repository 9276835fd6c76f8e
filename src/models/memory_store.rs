use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};

use crate::error::PostboardError;
use crate::models::store::{
    apply_query, doc_path, new_document_id, split_doc_path, validate_collection_path,
    validate_doc_path, Document, DocumentStore, Fields, Query, StoreEvent, EVENT_CAPACITY,
};

/// In-process document store. Collections map document ids to field maps.
pub struct MemoryStore {
    collections: RwLock<BTreeMap<String, BTreeMap<String, Fields>>>,
    events: broadcast::Sender<StoreEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            collections: RwLock::new(BTreeMap::new()),
            events,
        }
    }

    fn publish(&self, event: StoreEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn query(&self, query: &Query) -> Result<Vec<Document>, PostboardError> {
        validate_collection_path(&query.collection)?;
        let collections = self.collections.read().await;
        let docs = collections
            .get(&query.collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document {
                        id: id.clone(),
                        path: doc_path(&query.collection, id),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(apply_query(docs, query))
    }

    async fn get(&self, path: &str) -> Result<Option<Document>, PostboardError> {
        validate_doc_path(path)?;
        let Some((collection, id)) = split_doc_path(path) else {
            return Ok(None);
        };
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document {
                id: id.to_string(),
                path: path.to_string(),
                fields: fields.clone(),
            }))
    }

    async fn insert(&self, collection: &str, fields: Fields) -> Result<String, PostboardError> {
        validate_collection_path(collection)?;
        let id = new_document_id();
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), fields);
        self.publish(StoreEvent::Inserted(doc_path(collection, &id)));
        Ok(id)
    }

    async fn update(&self, path: &str, fields: Fields) -> Result<(), PostboardError> {
        validate_doc_path(path)?;
        let (collection, id) =
            split_doc_path(path).ok_or_else(|| PostboardError::NotFound(path.to_string()))?;
        {
            let mut collections = self.collections.write().await;
            let existing = collections
                .get_mut(collection)
                .and_then(|docs| docs.get_mut(id))
                .ok_or_else(|| PostboardError::NotFound(path.to_string()))?;
            existing.extend(fields);
        }
        self.publish(StoreEvent::Updated(path.to_string()));
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), PostboardError> {
        validate_doc_path(path)?;
        let Some((collection, id)) = split_doc_path(path) else {
            return Ok(());
        };
        let removed = self
            .collections
            .write()
            .await
            .get_mut(collection)
            .and_then(|docs| docs.remove(id));
        if removed.is_some() {
            self.publish(StoreEvent::Deleted(path.to_string()));
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn insert_get_update_delete() {
        let store = MemoryStore::new();
        let id = store
            .insert("posts", fields(json!({"postContent": "hi", "timestamp": 1})))
            .await
            .unwrap();
        let path = doc_path("posts", &id);

        store
            .update(&path, fields(json!({"postContent": "edited"})))
            .await
            .unwrap();
        let doc = store.get(&path).await.unwrap().unwrap();
        assert_eq!(doc.fields["postContent"], json!("edited"));
        assert_eq!(doc.fields["timestamp"], json!(1));

        store.delete(&path).await.unwrap();
        assert!(store.get(&path).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_missing_document_fails() {
        let store = MemoryStore::new();
        let err = store
            .update("posts/nope", fields(json!({"postContent": "x"})))
            .await
            .unwrap_err();
        assert!(matches!(err, PostboardError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_leaves_sub_collection() {
        let store = MemoryStore::new();
        let id = store.insert("posts", Fields::new()).await.unwrap();
        let comments = format!("posts/{}/comments", id);
        store.insert(&comments, Fields::new()).await.unwrap();

        store.delete(&doc_path("posts", &id)).await.unwrap();
        let left = store.query(&Query::collection(comments)).await.unwrap();
        assert_eq!(left.len(), 1);
    }

    #[tokio::test]
    async fn writes_are_published() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe();
        let id = store.insert("posts", Fields::new()).await.unwrap();
        let path = doc_path("posts", &id);
        store.delete(&path).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), StoreEvent::Inserted(path.clone()));
        assert_eq!(rx.recv().await.unwrap(), StoreEvent::Deleted(path));
    }
}
