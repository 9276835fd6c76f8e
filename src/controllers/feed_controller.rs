use chrono::{DateTime, Local};
use log::{info, warn};

use crate::controllers::LoadState;
use crate::error::PostboardError;
use crate::models::post::format_display_time;
use crate::models::{Author, Direction, DocumentStore, Post, Query, Session};

pub const POSTS_COLLECTION: &str = "posts";

pub type FeedState = LoadState<Vec<Post>>;

/// The `limit` most recent posts, newest first.
pub async fn fetch_feed(store: &dyn DocumentStore, limit: usize) -> Result<Vec<Post>, PostboardError> {
    let query = Query::collection(POSTS_COLLECTION)
        .order_by("timestamp", Direction::Descending)
        .limit(limit);
    store
        .query(&query)
        .await?
        .into_iter()
        .map(Post::from_document)
        .collect()
}

/// Like [`fetch_feed`], but a failure becomes `Failed` instead of an
/// empty feed.
pub async fn load_feed(store: &dyn DocumentStore, limit: usize) -> FeedState {
    match fetch_feed(store, limit).await {
        Ok(posts) => LoadState::Loaded(posts),
        Err(e) => {
            warn!("Error fetching feed: {}", e);
            LoadState::Failed(e.to_string())
        }
    }
}

/// Write a new post authored by `session`. Empty bodies are accepted.
pub async fn submit_post(
    store: &dyn DocumentStore,
    session: Option<&Session>,
    body: String,
    now: DateTime<Local>,
) -> Result<String, PostboardError> {
    let session = session.ok_or(PostboardError::NotAuthenticated)?;
    let post = Post {
        id: String::new(),
        author: Author::from_session(session, format_display_time(&now)),
        body,
        timestamp: now.timestamp_millis(),
    };
    let id = store.insert(POSTS_COLLECTION, post.to_fields()?).await?;
    info!("posted {} as {}", id, session.email);
    Ok(id)
}
