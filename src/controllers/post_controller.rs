use std::env;
use std::fs;
use std::process::Command;

use log::info;
use serde_json::{json, Map};

use crate::controllers::comment_controller::{comment_path, fetch_comments};
use crate::controllers::feed_controller::POSTS_COLLECTION;
use crate::error::PostboardError;
use crate::models::store::doc_path;
use crate::models::{can_modify, CascadePolicy, DocumentStore, Post, Session};

/// Per-post edit state. `Editing` holds the text being edited.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EditState {
    #[default]
    Viewing,
    Editing { buffer: String },
}

/// One feed item and its local UI state.
#[derive(Debug, Clone, PartialEq)]
pub struct PostEntry {
    pub post: Post,
    pub edit: EditState,
}

impl PostEntry {
    pub fn new(post: Post) -> Self {
        Self {
            post,
            edit: EditState::Viewing,
        }
    }

    pub fn can_modify(&self, session: Option<&Session>) -> bool {
        can_modify(session, &self.post.author.email)
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.edit, EditState::Editing { .. })
    }

    /// `Viewing -> Editing`, loading the current body into the buffer.
    pub fn begin_edit(&mut self, session: Option<&Session>) -> Result<(), PostboardError> {
        if !self.can_modify(session) {
            return Err(PostboardError::PermissionDenied(post_path(&self.post.id)));
        }
        if !self.is_editing() {
            self.edit = EditState::Editing {
                buffer: self.post.body.clone(),
            };
        }
        Ok(())
    }

    pub fn buffer(&self) -> Option<&str> {
        match &self.edit {
            EditState::Editing { buffer } => Some(buffer),
            EditState::Viewing => None,
        }
    }

    pub fn buffer_mut(&mut self) -> Option<&mut String> {
        match &mut self.edit {
            EditState::Editing { buffer } => Some(buffer),
            EditState::Viewing => None,
        }
    }

    /// `Editing -> Viewing` without writing.
    pub fn cancel_edit(&mut self) {
        self.edit = EditState::Viewing;
    }

    /// `Editing -> Viewing`, writing the buffer as the new body. On failure
    /// the entry stays in `Editing` so nothing typed is lost.
    pub async fn save_edit(&mut self, store: &dyn DocumentStore) -> Result<(), PostboardError> {
        let EditState::Editing { buffer } = &self.edit else {
            return Ok(());
        };
        let body = buffer.clone();
        update_post_body(store, &self.post.id, &body).await?;
        self.post.body = body;
        self.edit = EditState::Viewing;
        Ok(())
    }
}

pub fn post_path(post_id: &str) -> String {
    doc_path(POSTS_COLLECTION, post_id)
}

pub async fn update_post_body(
    store: &dyn DocumentStore,
    post_id: &str,
    body: &str,
) -> Result<(), PostboardError> {
    let mut fields = Map::new();
    fields.insert("postContent".to_string(), json!(body));
    store.update(&post_path(post_id), fields).await?;
    info!("updated post {}", post_id);
    Ok(())
}

/// Delete a post, applying `policy` to its comments. Returns how many
/// comments were removed.
pub async fn delete_post(
    store: &dyn DocumentStore,
    post_id: &str,
    policy: CascadePolicy,
) -> Result<usize, PostboardError> {
    let mut removed = 0;
    if policy == CascadePolicy::Cascade {
        // Comments go first so a failure never leaves orphans behind.
        for comment in fetch_comments(store, post_id, None).await? {
            store.delete(&comment_path(post_id, &comment.id)).await?;
            removed += 1;
        }
    }
    store.delete(&post_path(post_id)).await?;
    info!("deleted post {} ({} comments removed)", post_id, removed);
    Ok(removed)
}

pub fn create_post_via_editor() -> Result<String, PostboardError> {
    let editor = env::var("EDITOR")
        .unwrap_or_else(|_| "vi".to_string());

    let temp = tempfile::Builder::new()
        .prefix("postboard-")
        .suffix(".txt")
        .tempfile()?;

    let status = Command::new(editor)
        .arg(temp.path())
        .status()?;

    if !status.success() {
        return Err(PostboardError::Io(
            "Editor exited with non-zero status".to_string()
        ));
    }

    let content = fs::read_to_string(temp.path())?;
    Ok(content.trim_end_matches('\n').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Author, MemoryStore};

    fn session(email: &str) -> Session {
        Session {
            display_name: email.into(),
            email: email.into(),
            avatar_url: String::new(),
            identity_id: String::new(),
        }
    }

    fn post(email: &str) -> Post {
        Post {
            id: "p1".into(),
            author: Author {
                email: email.into(),
                ..Author::default()
            },
            body: "original".into(),
            timestamp: 1,
        }
    }

    #[test]
    fn edit_requires_ownership() {
        let mut entry = PostEntry::new(post("a@x.com"));
        assert!(entry.begin_edit(None).is_err());
        assert!(entry.begin_edit(Some(&session("b@x.com"))).is_err());
        assert_eq!(entry.edit, EditState::Viewing);

        entry.begin_edit(Some(&session("a@x.com"))).unwrap();
        assert_eq!(
            entry.edit,
            EditState::Editing {
                buffer: "original".into()
            }
        );
    }

    #[test]
    fn cancel_discards_buffer() {
        let mut entry = PostEntry::new(post("a@x.com"));
        entry.begin_edit(Some(&session("a@x.com"))).unwrap();
        entry.buffer_mut().unwrap().push_str(" changed");
        entry.cancel_edit();
        assert_eq!(entry.edit, EditState::Viewing);
        assert_eq!(entry.post.body, "original");
    }

    #[tokio::test]
    async fn failed_save_keeps_editing() {
        let store = MemoryStore::new();
        let mut entry = PostEntry::new(post("a@x.com"));
        entry.begin_edit(Some(&session("a@x.com"))).unwrap();
        let err = entry.save_edit(&store).await.unwrap_err();
        assert!(matches!(err, PostboardError::NotFound(_)));
        assert!(entry.is_editing());
    }

    #[tokio::test]
    async fn save_while_viewing_is_a_no_op() {
        let store = MemoryStore::new();
        let mut entry = PostEntry::new(post("a@x.com"));
        entry.save_edit(&store).await.unwrap();
        assert_eq!(entry.post.body, "original");
    }
}
