use chrono::{DateTime, Local};
use log::{info, warn};

use crate::controllers::feed_controller::POSTS_COLLECTION;
use crate::controllers::LoadState;
use crate::error::PostboardError;
use crate::models::store::doc_path;
use crate::models::{can_modify, Comment, Direction, DocumentStore, Query, Session};

pub const COMMENTS_COLLECTION: &str = "comments";

pub type ThreadState = LoadState<Vec<Comment>>;

pub fn comments_collection(post_id: &str) -> String {
    format!("{}/{}/{}", POSTS_COLLECTION, post_id, COMMENTS_COLLECTION)
}

pub fn comment_path(post_id: &str, comment_id: &str) -> String {
    doc_path(&comments_collection(post_id), comment_id)
}

/// Comments of one post, oldest first. A cap keeps the most recent ones.
pub async fn fetch_comments(
    store: &dyn DocumentStore,
    post_id: &str,
    limit: Option<usize>,
) -> Result<Vec<Comment>, PostboardError> {
    let collection = comments_collection(post_id);
    let docs = match limit {
        Some(limit) => {
            let query = Query::collection(collection)
                .order_by("timestamp", Direction::Descending)
                .limit(limit);
            let mut newest = store.query(&query).await?;
            newest.reverse();
            newest
        }
        None => {
            let query = Query::collection(collection).order_by("timestamp", Direction::Ascending);
            store.query(&query).await?
        }
    };
    docs.into_iter().map(Comment::from_document).collect()
}

pub async fn submit_comment(
    store: &dyn DocumentStore,
    session: Option<&Session>,
    post_id: &str,
    body: String,
    now: DateTime<Local>,
) -> Result<String, PostboardError> {
    let session = session.ok_or(PostboardError::NotAuthenticated)?;
    let comment = Comment {
        id: String::new(),
        post_id: post_id.to_string(),
        author_name: session.display_name.clone(),
        author_photo_url: session.avatar_url.clone(),
        author_email: session.email.clone(),
        body,
        timestamp: now.timestamp_millis(),
    };
    let id = store
        .insert(&comments_collection(post_id), comment.to_fields()?)
        .await
        .map_err(|e| {
            warn!("Error adding comment to {}: {}", post_id, e);
            e
        })?;
    info!("commented {} on {}", id, post_id);
    Ok(id)
}

/// Remove a comment. Only its author is offered this.
pub async fn delete_comment(
    store: &dyn DocumentStore,
    session: Option<&Session>,
    comment: &Comment,
) -> Result<(), PostboardError> {
    let path = comment_path(&comment.post_id, &comment.id);
    if !can_modify(session, &comment.author_email) {
        return Err(PostboardError::PermissionDenied(path));
    }
    store.delete(&path).await?;
    info!("deleted comment {}", path);
    Ok(())
}

/// An expanded comment thread under one post.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentThread {
    pub post_id: String,
    pub state: ThreadState,
    pub selected: Option<usize>,
}

impl CommentThread {
    pub fn new(post_id: impl Into<String>) -> Self {
        Self {
            post_id: post_id.into(),
            state: LoadState::Loading,
            selected: None,
        }
    }

    pub async fn reload(&mut self, store: &dyn DocumentStore, limit: Option<usize>) {
        let result = fetch_comments(store, &self.post_id, limit).await;
        self.apply(result);
    }

    pub fn apply(&mut self, result: Result<Vec<Comment>, PostboardError>) {
        self.state = match result {
            Ok(comments) => LoadState::Loaded(comments),
            Err(e) => {
                warn!("Error fetching comments for {}: {}", self.post_id, e);
                LoadState::Failed(e.to_string())
            }
        };
        let len = self.comments().len();
        self.selected = match self.selected {
            Some(_) if len == 0 => None,
            Some(i) => Some(i.min(len - 1)),
            None => None,
        };
    }

    pub fn comments(&self) -> &[Comment] {
        self.state.loaded().map(Vec::as_slice).unwrap_or_default()
    }

    pub fn selected_comment(&self) -> Option<&Comment> {
        self.selected.and_then(|i| self.comments().get(i))
    }

    pub fn select_next(&mut self) {
        let len = self.comments().len();
        if len == 0 {
            return;
        }
        self.selected = Some(match self.selected {
            Some(i) if i + 1 < len => i + 1,
            Some(i) => i,
            None => 0,
        });
    }

    pub fn select_previous(&mut self) {
        if self.comments().is_empty() {
            return;
        }
        self.selected = Some(match self.selected {
            Some(i) => i.saturating_sub(1),
            None => 0,
        });
    }
}
