//! Document store interface consumed by the feed components.
//!
//! Collections are addressed by slash-separated paths with an odd number of
//! segments (`posts`, `posts/<id>/comments`); documents by paths with an even
//! number (`posts/<id>`).

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use rand::{distributions::Alphanumeric, Rng};
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use crate::error::PostboardError;

pub type Fields = Map<String, Value>;

/// Length of store-assigned document ids.
pub const ID_LEN: usize = 20;

/// Capacity of the change notification channel.
pub const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub path: String,
    pub fields: Fields,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub collection: String,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            order_by: None,
            limit: None,
        }
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Change notification published after every successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Inserted(String),
    Updated(String),
    Deleted(String),
}

impl StoreEvent {
    pub fn path(&self) -> &str {
        match self {
            StoreEvent::Inserted(p) | StoreEvent::Updated(p) | StoreEvent::Deleted(p) => p,
        }
    }

    /// Collection path the changed document belongs to.
    pub fn collection(&self) -> &str {
        split_doc_path(self.path())
            .map(|(collection, _)| collection)
            .unwrap_or_default()
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a collection, optionally ordered by a field and capped.
    /// Without `order_by` documents come back in id order.
    async fn query(&self, query: &Query) -> Result<Vec<Document>, PostboardError>;

    async fn get(&self, path: &str) -> Result<Option<Document>, PostboardError>;

    /// Insert a document and return its assigned id.
    async fn insert(&self, collection: &str, fields: Fields) -> Result<String, PostboardError>;

    /// Shallow merge of `fields` into an existing document.
    async fn update(&self, path: &str, fields: Fields) -> Result<(), PostboardError>;

    /// Remove one document. Sub-collections are left in place.
    async fn delete(&self, path: &str) -> Result<(), PostboardError>;

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}

#[async_trait]
impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    async fn query(&self, query: &Query) -> Result<Vec<Document>, PostboardError> {
        (**self).query(query).await
    }

    async fn get(&self, path: &str) -> Result<Option<Document>, PostboardError> {
        (**self).get(path).await
    }

    async fn insert(&self, collection: &str, fields: Fields) -> Result<String, PostboardError> {
        (**self).insert(collection, fields).await
    }

    async fn update(&self, path: &str, fields: Fields) -> Result<(), PostboardError> {
        (**self).update(path, fields).await
    }

    async fn delete(&self, path: &str) -> Result<(), PostboardError> {
        (**self).delete(path).await
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        (**self).subscribe()
    }
}

pub fn new_document_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}

pub fn doc_path(collection: &str, id: &str) -> String {
    format!("{}/{}", collection, id)
}

/// Split a document path into its collection path and id.
pub fn split_doc_path(path: &str) -> Option<(&str, &str)> {
    path.rsplit_once('/')
}

fn segments_valid(path: &str) -> bool {
    path.split('/')
        .all(|s| !s.is_empty() && !s.starts_with('.') && !s.contains('\\'))
}

pub fn validate_collection_path(path: &str) -> Result<(), PostboardError> {
    if segments_valid(path) && path.split('/').count() % 2 == 1 {
        Ok(())
    } else {
        Err(PostboardError::Store(format!("invalid collection path: {:?}", path)))
    }
}

pub fn validate_doc_path(path: &str) -> Result<(), PostboardError> {
    if segments_valid(path) && path.split('/').count() % 2 == 0 {
        Ok(())
    } else {
        Err(PostboardError::Store(format!("invalid document path: {:?}", path)))
    }
}

/// Order and cap documents the way every store implementation does.
pub fn apply_query(mut docs: Vec<Document>, query: &Query) -> Vec<Document> {
    docs.sort_by(|a, b| a.id.cmp(&b.id));
    if let Some((field, direction)) = &query.order_by {
        docs.sort_by(|a, b| {
            let ord = compare_values(a.fields.get(field), b.fields.get(field));
            match direction {
                Direction::Ascending => ord,
                Direction::Descending => ord.reverse(),
            }
        });
    }
    if let Some(limit) = query.limit {
        docs.truncate(limit);
    }
    docs
}

// Missing values sort before everything else.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or_default();
            let y = y.as_f64().unwrap_or_default();
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) => type_rank(x).cmp(&type_rank(y)),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, ts: Option<i64>) -> Document {
        let mut fields = Fields::new();
        if let Some(ts) = ts {
            fields.insert("timestamp".into(), json!(ts));
        }
        Document {
            id: id.into(),
            path: doc_path("posts", id),
            fields,
        }
    }

    #[test]
    fn orders_descending_and_caps() {
        let docs = vec![doc("a", Some(10)), doc("b", Some(30)), doc("c", Some(20))];
        let q = Query::collection("posts")
            .order_by("timestamp", Direction::Descending)
            .limit(2);
        let ids: Vec<_> = apply_query(docs, &q).into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn unordered_query_uses_id_order() {
        let docs = vec![doc("z", Some(1)), doc("m", Some(3)), doc("a", Some(2))];
        let ids: Vec<_> = apply_query(docs, &Query::collection("posts"))
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["a", "m", "z"]);
    }

    #[test]
    fn missing_field_sorts_first_ascending() {
        let docs = vec![doc("a", Some(5)), doc("b", None)];
        let q = Query::collection("posts").order_by("timestamp", Direction::Ascending);
        let ids: Vec<_> = apply_query(docs, &q).into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn path_validation() {
        assert!(validate_collection_path("posts").is_ok());
        assert!(validate_collection_path("posts/abc/comments").is_ok());
        assert!(validate_collection_path("posts/abc").is_err());
        assert!(validate_doc_path("posts/abc").is_ok());
        assert!(validate_doc_path("posts/../x").is_err());
        assert!(validate_doc_path("posts//x/y").is_err());
    }

    #[test]
    fn generated_ids_are_alphanumeric() {
        let id = new_document_id();
        assert_eq!(id.len(), ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn event_collection_is_parent_path() {
        let ev = StoreEvent::Deleted("posts/p1/comments/c1".into());
        assert_eq!(ev.collection(), "posts/p1/comments");
    }
}
