pub mod models;
pub mod views;
pub mod controllers;
pub mod cli;
pub mod error;

// Re-exports for convenience
pub use models::{Auth, Comment, Config, DocumentStore, Post, Session};
pub use controllers::{start_app, App};
pub use error::PostboardError;
