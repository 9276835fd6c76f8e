//! Access rules applied in front of a document store.
//!
//! The per-item ownership check in the UI only hides controls. These rules
//! are what actually reject writes: every write needs a session, a new
//! document may only record the caller as its author, and changing or
//! removing a document that records an author email needs the caller to be
//! that author. Comments may also be removed (never rewritten) by the author
//! of their parent post.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, watch};

use crate::error::PostboardError;
use crate::models::session::Session;
use crate::models::store::{split_doc_path, Document, DocumentStore, Fields, Query, StoreEvent};

pub struct RulesStore<S> {
    inner: S,
    session: watch::Receiver<Option<Session>>,
}

impl<S: DocumentStore> RulesStore<S> {
    pub fn new(inner: S, session: watch::Receiver<Option<Session>>) -> Self {
        Self { inner, session }
    }

    fn caller(&self) -> Result<Session, PostboardError> {
        self.session
            .borrow()
            .clone()
            .ok_or(PostboardError::NotAuthenticated)
    }

    async fn check_owner(
        &self,
        path: &str,
        caller: &Session,
        allow_parent_owner: bool,
    ) -> Result<(), PostboardError> {
        let Some(doc) = self.inner.get(path).await? else {
            return Ok(());
        };
        let Some(owner) = owner_email(&doc.fields) else {
            return Ok(());
        };
        if caller.owns(owner) {
            return Ok(());
        }
        if allow_parent_owner {
            if let Some(post_path) = parent_document(path) {
                if let Some(post) = self.inner.get(post_path).await? {
                    if owner_email(&post.fields).is_some_and(|email| caller.owns(email)) {
                        return Ok(());
                    }
                }
            }
        }
        log::warn!("rejected write to {} by {}", path, caller.email);
        Err(PostboardError::PermissionDenied(path.to_string()))
    }
}

/// Author email recorded on a post (`author.email`) or a comment (`email`).
fn owner_email(fields: &Fields) -> Option<&str> {
    fields
        .get("author")
        .and_then(|author| author.get("email"))
        .or_else(|| fields.get("email"))
        .and_then(Value::as_str)
}

// posts/<id>/comments/<cid> -> posts/<id>
fn parent_document(path: &str) -> Option<&str> {
    let (collection, _) = split_doc_path(path)?;
    let (parent, _) = split_doc_path(collection)?;
    Some(parent)
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for RulesStore<S> {
    async fn query(&self, query: &Query) -> Result<Vec<Document>, PostboardError> {
        self.inner.query(query).await
    }

    async fn get(&self, path: &str) -> Result<Option<Document>, PostboardError> {
        self.inner.get(path).await
    }

    async fn insert(&self, collection: &str, fields: Fields) -> Result<String, PostboardError> {
        let caller = self.caller()?;
        if let Some(author) = owner_email(&fields) {
            if !caller.owns(author) {
                log::warn!("rejected insert into {} as {} by {}", collection, author, caller.email);
                return Err(PostboardError::PermissionDenied(collection.to_string()));
            }
        }
        self.inner.insert(collection, fields).await
    }

    async fn update(&self, path: &str, fields: Fields) -> Result<(), PostboardError> {
        let caller = self.caller()?;
        self.check_owner(path, &caller, false).await?;
        self.inner.update(path, fields).await
    }

    async fn delete(&self, path: &str) -> Result<(), PostboardError> {
        let caller = self.caller()?;
        self.check_owner(path, &caller, true).await?;
        self.inner.delete(path).await
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.subscribe()
    }
}
