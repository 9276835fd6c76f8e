use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use log::{error, info, warn};
use ratatui::Terminal;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::sync::watch;

use crate::controllers::comment_controller::{
    delete_comment, fetch_comments, submit_comment, CommentThread, COMMENTS_COLLECTION,
};
use crate::controllers::feed_controller::{load_feed, submit_post, POSTS_COLLECTION};
use crate::controllers::post_controller::{delete_post, post_path, PostEntry};
use crate::controllers::LoadState;
use crate::error::PostboardError;
use crate::models::cache::{SessionCache, SessionRecord};
use crate::models::{Auth, CascadePolicy, Config, DocumentStore, Profile, Session, StoreEvent};
use crate::views::widgets::{apply_text_key, InputOutcome};
use crate::views::{tui, StatefulList};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// What the keyboard is currently driving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Browse,
    /// Writing a new post.
    Compose(String),
    /// Editing the body of a post; the buffer lives in its `PostEntry`.
    Edit { post_id: String },
    /// Writing a comment under a post.
    Comment { post_id: String, buffer: String },
}

pub struct App {
    store: Arc<dyn DocumentStore>,
    auth: Auth,
    session_rx: watch::Receiver<Option<Session>>,
    session: Option<Session>,
    events: broadcast::Receiver<StoreEvent>,
    credentials: Option<(Profile, String)>,
    session_cache: Option<SessionCache>,
    feed_limit: usize,
    comment_limit: Option<usize>,
    cascade: CascadePolicy,
    pub feed: LoadState<StatefulList<PostEntry>>,
    /// Expanded threads keyed by post id. Collapsed posts are never read.
    pub threads: HashMap<String, CommentThread>,
    pub mode: Mode,
    pub status: Option<String>,
    quit: bool,
}

impl App {
    pub fn new(store: Arc<dyn DocumentStore>, auth: Auth, config: &Config) -> Self {
        let mut session_rx = auth.subscribe();
        let session = session_rx.borrow_and_update().clone();
        let events = store.subscribe();
        Self {
            store,
            auth,
            session_rx,
            session,
            events,
            credentials: config.credentials(),
            session_cache: None,
            feed_limit: config.feed_limit,
            comment_limit: config.comment_limit,
            cascade: config.cascade,
            feed: LoadState::Loading,
            threads: HashMap::new(),
            mode: Mode::Browse,
            status: None,
            quit: false,
        }
    }

    /// Persist sign-in changes made from the UI.
    pub fn with_session_cache(mut self, cache: SessionCache) -> Self {
        self.session_cache = Some(cache);
        self
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    pub fn entries(&self) -> &[PostEntry] {
        self.feed
            .loaded()
            .map(|list| list.items.as_slice())
            .unwrap_or_default()
    }

    pub fn selected_entry(&self) -> Option<&PostEntry> {
        self.feed.loaded().and_then(StatefulList::selected)
    }

    fn selected_post_id(&self) -> Option<String> {
        self.selected_entry().map(|entry| entry.post.id.clone())
    }

    fn entry_mut(&mut self, post_id: &str) -> Option<&mut PostEntry> {
        self.feed
            .loaded_mut()
            .and_then(|list| list.items.iter_mut().find(|e| e.post.id == post_id))
    }

    pub fn thread(&self, post_id: &str) -> Option<&CommentThread> {
        self.threads.get(post_id)
    }

    /// Re-read the feed and every expanded thread. Posts being edited keep
    /// their edit buffer.
    pub async fn reload_feed(&mut self) {
        // Anything already announced is covered by this read, including our own writes.
        self.discard_pending_events();
        let state = load_feed(self.store.as_ref(), self.feed_limit).await;
        let mut edits: HashMap<String, _> = self
            .entries()
            .iter()
            .filter(|e| e.is_editing())
            .map(|e| (e.post.id.clone(), e.edit.clone()))
            .collect();
        let entries = state.map(|posts| {
            posts
                .into_iter()
                .map(|post| {
                    let mut entry = PostEntry::new(post);
                    if let Some(edit) = edits.remove(&entry.post.id) {
                        entry.edit = edit;
                    }
                    entry
                })
                .collect::<Vec<_>>()
        });

        self.feed = match (std::mem::replace(&mut self.feed, LoadState::Loading), entries) {
            (LoadState::Loaded(mut list), LoadState::Loaded(items)) => {
                list.replace_items(items);
                LoadState::Loaded(list)
            }
            (_, LoadState::Loaded(items)) => LoadState::Loaded(StatefulList::with_items(items)),
            (_, LoadState::Failed(e)) => LoadState::Failed(e),
            (_, LoadState::Loading) => LoadState::Loading,
        };

        let live: HashSet<String> = self.entries().iter().map(|e| e.post.id.clone()).collect();
        self.threads.retain(|post_id, _| live.contains(post_id));
        let stale = match &self.mode {
            Mode::Edit { post_id } | Mode::Comment { post_id, .. } => !live.contains(post_id),
            Mode::Browse | Mode::Compose(_) => false,
        };
        if stale {
            self.mode = Mode::Browse;
        }
        let open: Vec<String> = self.threads.keys().cloned().collect();
        self.reload_threads(&open).await;
    }

    fn discard_pending_events(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(_) | Err(TryRecvError::Lagged(_)) => {}
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }

    /// Re-read the given threads concurrently.
    pub async fn reload_threads(&mut self, post_ids: &[String]) {
        let store = self.store.as_ref();
        let limit = self.comment_limit;
        let reads = post_ids
            .iter()
            .filter(|id| self.threads.contains_key(id.as_str()))
            .map(|id| async move { (id.clone(), fetch_comments(store, id, limit).await) });
        let results = futures::future::join_all(reads).await;
        for (post_id, result) in results {
            if let Some(thread) = self.threads.get_mut(&post_id) {
                thread.apply(result);
            }
        }
    }

    /// Expand the selected post's thread, loading it, or collapse it.
    pub async fn toggle_thread(&mut self) {
        let Some(post_id) = self.selected_post_id() else {
            return;
        };
        if self.threads.remove(&post_id).is_some() {
            return;
        }
        self.open_thread(&post_id).await;
    }

    async fn open_thread(&mut self, post_id: &str) {
        if self.threads.contains_key(post_id) {
            return;
        }
        let mut thread = CommentThread::new(post_id);
        thread.reload(self.store.as_ref(), self.comment_limit).await;
        self.threads.insert(post_id.to_string(), thread);
    }

    /// Pick up session changes and store notifications.
    pub async fn sync(&mut self) {
        self.refresh_session();

        let mut feed_dirty = false;
        let mut dirty_threads = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    let collection = event.collection();
                    if collection == POSTS_COLLECTION {
                        feed_dirty = true;
                    } else if let Some(post_id) = thread_post_id(collection) {
                        dirty_threads.push(post_id.to_string());
                    }
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("missed {} store events, reloading", skipped);
                    feed_dirty = true;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }

        if feed_dirty {
            self.reload_feed().await;
        } else if !dirty_threads.is_empty() {
            dirty_threads.sort();
            dirty_threads.dedup();
            self.reload_threads(&dirty_threads).await;
        }
    }

    fn refresh_session(&mut self) {
        if !self.session_rx.has_changed().unwrap_or(false) {
            return;
        }
        self.session = self.session_rx.borrow_and_update().clone();
        let session = self.session.clone();
        if session.is_none() && matches!(self.mode, Mode::Compose(_) | Mode::Comment { .. }) {
            self.mode = Mode::Browse;
        }
        if let Some(list) = self.feed.loaded_mut() {
            for entry in list.items.iter_mut() {
                if entry.is_editing() && !entry.can_modify(session.as_ref()) {
                    entry.cancel_edit();
                }
            }
        }
        if matches!(self.mode, Mode::Edit { .. })
            && !self.entries().iter().any(PostEntry::is_editing)
        {
            self.mode = Mode::Browse;
        }
    }

    /// Handle one key press, reporting failures in the status line.
    pub async fn on_key(&mut self, key: KeyEvent) {
        self.status = None;
        if let Err(e) = self.handle_key(key).await {
            warn!("{}", e);
            self.status = Some(e.to_string());
        }
    }

    pub async fn handle_key(&mut self, key: KeyEvent) -> Result<(), PostboardError> {
        match self.mode.clone() {
            Mode::Browse => self.handle_browse_key(key).await,
            Mode::Compose(_) => self.handle_compose_key(key).await,
            Mode::Edit { post_id } => self.handle_edit_key(&post_id, key).await,
            Mode::Comment { post_id, .. } => self.handle_comment_key(&post_id, key).await,
        }
    }

    async fn handle_browse_key(&mut self, key: KeyEvent) -> Result<(), PostboardError> {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.quit = true,
            KeyCode::Down | KeyCode::Char('j') => {
                if let Some(list) = self.feed.loaded_mut() {
                    list.next();
                }
            }
            KeyCode::Up | KeyCode::Char('k') => {
                if let Some(list) = self.feed.loaded_mut() {
                    list.previous();
                }
            }
            KeyCode::Char('J') => self.with_selected_thread(CommentThread::select_next),
            KeyCode::Char('K') => self.with_selected_thread(CommentThread::select_previous),
            KeyCode::Enter | KeyCode::Char('c') => self.toggle_thread().await,
            KeyCode::Char('n') => {
                self.session.as_ref().ok_or(PostboardError::NotAuthenticated)?;
                self.mode = Mode::Compose(String::new());
            }
            KeyCode::Char('e') => {
                let Some(post_id) = self.selected_post_id() else {
                    return Ok(());
                };
                let session = self.session.clone();
                if let Some(entry) = self.entry_mut(&post_id) {
                    entry.begin_edit(session.as_ref())?;
                    self.mode = Mode::Edit { post_id };
                }
            }
            KeyCode::Char('d') => self.delete_selected_post().await?,
            KeyCode::Char('a') => {
                self.session.as_ref().ok_or(PostboardError::NotAuthenticated)?;
                let Some(post_id) = self.selected_post_id() else {
                    return Ok(());
                };
                self.open_thread(&post_id).await;
                self.mode = Mode::Comment {
                    post_id,
                    buffer: String::new(),
                };
            }
            KeyCode::Char('x') => self.delete_selected_comment().await?,
            KeyCode::Char('r') => self.reload_feed().await,
            KeyCode::Char('l') => self.toggle_sign_in()?,
            _ => {}
        }
        Ok(())
    }

    async fn handle_compose_key(&mut self, key: KeyEvent) -> Result<(), PostboardError> {
        let Mode::Compose(buffer) = &mut self.mode else {
            return Ok(());
        };
        match apply_text_key(buffer, key, true) {
            InputOutcome::Submit => {
                let body = buffer.clone();
                submit_post(self.store.as_ref(), self.session.as_ref(), body, Local::now()).await?;
                self.mode = Mode::Browse;
                self.status = Some("Posted".to_string());
                self.reload_feed().await;
                if let Some(list) = self.feed.loaded_mut() {
                    list.state.select(if list.items.is_empty() { None } else { Some(0) });
                }
            }
            InputOutcome::Cancel => self.mode = Mode::Browse,
            InputOutcome::Edited | InputOutcome::Ignored => {}
        }
        Ok(())
    }

    async fn handle_edit_key(&mut self, post_id: &str, key: KeyEvent) -> Result<(), PostboardError> {
        let store = Arc::clone(&self.store);
        let Some(entry) = self.entry_mut(post_id) else {
            self.mode = Mode::Browse;
            return Ok(());
        };
        let Some(buffer) = entry.buffer_mut() else {
            self.mode = Mode::Browse;
            return Ok(());
        };
        match apply_text_key(buffer, key, true) {
            InputOutcome::Submit => {
                entry.save_edit(store.as_ref()).await?;
                self.mode = Mode::Browse;
                self.status = Some("Saved".to_string());
                self.reload_feed().await;
            }
            InputOutcome::Cancel => {
                entry.cancel_edit();
                self.mode = Mode::Browse;
            }
            InputOutcome::Edited | InputOutcome::Ignored => {}
        }
        Ok(())
    }

    async fn handle_comment_key(&mut self, post_id: &str, key: KeyEvent) -> Result<(), PostboardError> {
        let Mode::Comment { buffer, .. } = &mut self.mode else {
            return Ok(());
        };
        match apply_text_key(buffer, key, false) {
            InputOutcome::Submit => {
                let body = buffer.clone();
                submit_comment(
                    self.store.as_ref(),
                    self.session.as_ref(),
                    post_id,
                    body,
                    Local::now(),
                )
                .await?;
                self.mode = Mode::Browse;
                self.reload_threads(&[post_id.to_string()]).await;
            }
            InputOutcome::Cancel => self.mode = Mode::Browse,
            InputOutcome::Edited | InputOutcome::Ignored => {}
        }
        Ok(())
    }

    fn with_selected_thread(&mut self, f: impl FnOnce(&mut CommentThread)) {
        if let Some(post_id) = self.selected_post_id() {
            if let Some(thread) = self.threads.get_mut(&post_id) {
                f(thread);
            }
        }
    }

    async fn delete_selected_post(&mut self) -> Result<(), PostboardError> {
        let Some(entry) = self.selected_entry() else {
            return Ok(());
        };
        if !entry.can_modify(self.session.as_ref()) {
            return Err(PostboardError::PermissionDenied(post_path(&entry.post.id)));
        }
        let post_id = entry.post.id.clone();
        let removed = delete_post(self.store.as_ref(), &post_id, self.cascade).await?;
        self.threads.remove(&post_id);
        self.status = Some(match removed {
            0 => "Post deleted".to_string(),
            n => format!("Post and {} comments deleted", n),
        });
        self.reload_feed().await;
        Ok(())
    }

    async fn delete_selected_comment(&mut self) -> Result<(), PostboardError> {
        let Some(post_id) = self.selected_post_id() else {
            return Ok(());
        };
        let Some(comment) = self
            .threads
            .get(&post_id)
            .and_then(CommentThread::selected_comment)
            .cloned()
        else {
            return Ok(());
        };
        delete_comment(self.store.as_ref(), self.session.as_ref(), &comment).await?;
        self.reload_threads(&[post_id]).await;
        Ok(())
    }

    fn toggle_sign_in(&mut self) -> Result<(), PostboardError> {
        if self.auth.current().is_some() {
            self.auth.sign_out();
            self.status = Some("Signed out".to_string());
        } else {
            let (profile, key) = self
                .credentials
                .as_ref()
                .ok_or_else(|| PostboardError::Config("No key configured".to_string()))?;
            let session = self.auth.sign_in(profile, key)?;
            self.status = Some(format!("Signed in as {}", session.display_name));
        }
        if let Some(cache) = &self.session_cache {
            cache.save(&SessionRecord::from_session(self.auth.current().as_ref()))?;
        }
        self.refresh_session();
        Ok(())
    }
}

// posts/<post_id>/comments -> post_id
fn thread_post_id(collection: &str) -> Option<&str> {
    let mut parts = collection.split('/');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(POSTS_COLLECTION), Some(post_id), Some(COMMENTS_COLLECTION), None) => Some(post_id),
        _ => None,
    }
}

pub async fn start_app(mut app: App) -> Result<(), PostboardError> {
    // Setup terminal
    let mut terminal = tui::setup_terminal()?;

    // Run the app
    let res = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    tui::restore_terminal(&mut terminal)?;

    if let Err(err) = &res {
        error!("{}", err);
    }
    res
}

pub async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> Result<(), PostboardError> {
    app.reload_feed().await;
    info!("feed loaded with {} posts", app.entries().len());

    loop {
        terminal.draw(|f| tui::render_ui(f, app))?;

        if event::poll(POLL_INTERVAL)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key).await;
                }
            }
        }
        if app.should_quit() {
            return Ok(());
        }
        app.sync().await;
    }
}
