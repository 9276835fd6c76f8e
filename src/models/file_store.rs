//! File-backed document store.
//!
//! Every document is one JSON object at `<root>/<collection path>/<id>.json`.
//! A document's sub-collections live in the directory `<root>/<doc path>/`,
//! next to the document file.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::debug;
use tokio::sync::broadcast;

use crate::error::PostboardError;
use crate::models::store::{
    apply_query, doc_path, new_document_id, validate_collection_path, validate_doc_path,
    Document, DocumentStore, Fields, Query, StoreEvent, EVENT_CAPACITY,
};

pub struct FileStore {
    root: PathBuf,
    events: broadcast::Sender<StoreEvent>,
}

impl FileStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, PostboardError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            PostboardError::Store(format!("Failed to create store root {:?}: {}", root, e))
        })?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self { root, events })
    }

    fn file_for(&self, path: &str) -> PathBuf {
        self.root.join(format!("{}.json", path))
    }

    fn publish(&self, event: StoreEvent) {
        let _ = self.events.send(event);
    }
}

/// Run filesystem work on the blocking pool so the UI task keeps drawing.
async fn blocking<T, F>(work: F) -> Result<T, PostboardError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, PostboardError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| PostboardError::Store(format!("Store task failed: {}", e)))?
}

fn read_fields(file: &Path) -> Result<Option<Fields>, PostboardError> {
    match fs::read_to_string(file) {
        Ok(data) => {
            let fields: Fields = serde_json::from_str(&data).map_err(|e| {
                PostboardError::Store(format!("Corrupt document {:?}: {}", file, e))
            })?;
            Ok(Some(fields))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// Temp file in the target directory, then rename over the final path.
fn write_fields(file: &Path, fields: &Fields) -> Result<(), PostboardError> {
    let parent = file
        .parent()
        .ok_or_else(|| PostboardError::Store(format!("No parent directory for {:?}", file)))?;
    fs::create_dir_all(parent)?;
    let tmp = tempfile::NamedTempFile::new_in(parent)?;
    serde_json::to_writer(&tmp, fields)?;
    tmp.persist(file)
        .map_err(|e| PostboardError::Store(format!("Failed to persist {:?}: {}", file, e)))?;
    Ok(())
}

fn read_collection(dir: &Path, collection: &str) -> Result<Vec<Document>, PostboardError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut docs = Vec::new();
    for entry in entries {
        let file = entry?.path();
        if file.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(id) = file.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            continue;
        };
        if let Some(fields) = read_fields(&file)? {
            docs.push(Document {
                path: doc_path(collection, &id),
                id,
                fields,
            });
        }
    }
    Ok(docs)
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn query(&self, query: &Query) -> Result<Vec<Document>, PostboardError> {
        validate_collection_path(&query.collection)?;
        let dir = self.root.join(&query.collection);
        let collection = query.collection.clone();
        let docs = blocking(move || read_collection(&dir, &collection)).await?;
        debug!("query {} -> {} documents", query.collection, docs.len());
        Ok(apply_query(docs, query))
    }

    async fn get(&self, path: &str) -> Result<Option<Document>, PostboardError> {
        validate_doc_path(path)?;
        let file = self.file_for(path);
        let fields = blocking(move || read_fields(&file)).await?;
        Ok(fields.map(|fields| Document {
            id: path.rsplit('/').next().unwrap_or_default().to_string(),
            path: path.to_string(),
            fields,
        }))
    }

    async fn insert(&self, collection: &str, fields: Fields) -> Result<String, PostboardError> {
        validate_collection_path(collection)?;
        let id = new_document_id();
        let path = doc_path(collection, &id);
        let file = self.file_for(&path);
        blocking(move || write_fields(&file, &fields)).await?;
        self.publish(StoreEvent::Inserted(path));
        Ok(id)
    }

    async fn update(&self, path: &str, fields: Fields) -> Result<(), PostboardError> {
        validate_doc_path(path)?;
        let file = self.file_for(path);
        let missing = path.to_string();
        blocking(move || {
            let mut existing =
                read_fields(&file)?.ok_or_else(|| PostboardError::NotFound(missing))?;
            existing.extend(fields);
            write_fields(&file, &existing)
        })
        .await?;
        self.publish(StoreEvent::Updated(path.to_string()));
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), PostboardError> {
        validate_doc_path(path)?;
        let file = self.file_for(path);
        let removed = blocking(move || match fs::remove_file(&file) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        })
        .await?;
        if removed {
            self.publish(StoreEvent::Deleted(path.to_string()));
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}
