pub mod cache;
pub mod comment;
pub mod config;
pub mod file_store;
pub mod memory_store;
pub mod post;
pub mod rules;
pub mod session;
pub mod store;

// Re-export important structs for convenience
pub use comment::Comment;
pub use config::{CascadePolicy, Config};
pub use file_store::FileStore;
pub use memory_store::MemoryStore;
pub use post::{Author, Post};
pub use rules::RulesStore;
pub use session::{can_modify, Auth, Profile, Session};
pub use store::{Direction, Document, DocumentStore, Fields, Query, StoreEvent};
