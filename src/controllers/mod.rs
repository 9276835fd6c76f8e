pub mod app_controller;
pub mod comment_controller;
pub mod feed_controller;
pub mod post_controller;

// Re-export key functions
pub use app_controller::{start_app, App, Mode};
pub use comment_controller::{CommentThread, ThreadState};
pub use feed_controller::{fetch_feed, load_feed, submit_post, FeedState};
pub use post_controller::{delete_post, EditState, PostEntry};

/// Result of a remote read as the views see it. A failed read is kept
/// apart from an empty one.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadState<T> {
    Loading,
    Loaded(T),
    Failed(String),
}

impl<T> LoadState<T> {
    pub fn is_failed(&self) -> bool {
        matches!(self, LoadState::Failed(_))
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            LoadState::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn loaded(&self) -> Option<&T> {
        match self {
            LoadState::Loaded(value) => Some(value),
            _ => None,
        }
    }

    pub fn loaded_mut(&mut self) -> Option<&mut T> {
        match self {
            LoadState::Loaded(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> LoadState<U> {
        match self {
            LoadState::Loading => LoadState::Loading,
            LoadState::Loaded(value) => LoadState::Loaded(f(value)),
            LoadState::Failed(e) => LoadState::Failed(e),
        }
    }
}
