use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::error::PostboardError;
use crate::models::{Config, DocumentStore, FileStore, MemoryStore, Post};

#[derive(Subcommand, Clone, PartialEq, Eq, Debug)]
pub enum Command {
    /// Open the interactive feed (default)
    Feed,
    /// Publish a post; opens $EDITOR when no text is given
    Post { text: Option<String> },
    /// Print the feed to stdout
    List,
    /// Sign in with the key from the config file
    Login,
    /// Forget the persisted session
    Logout,
}

#[derive(Parser, Debug, Default)]
#[command(
    about = concat!(env!("CARGO_CRATE_NAME"), " - terminal social feed"),
    version
)]
pub struct Flags {
    /// Config file (default ~/.config/postboard/config.json)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Store directory, overriding the config
    #[arg(long)]
    pub store: Option<PathBuf>,
    /// Use a throwaway in-memory store
    #[arg(long, conflicts_with = "store")]
    pub memory: bool,
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Flags {
    /// Parse from `std::env::args_os()`, [exit][clap::Error::exit] on error.
    pub fn from_args() -> Self {
        Self::parse()
    }

    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Feed)
    }

    pub fn config_path(&self) -> Result<PathBuf, PostboardError> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => Config::default_path(),
        }
    }

    pub fn open_store(&self, config: &Config) -> Result<Arc<dyn DocumentStore>, PostboardError> {
        if self.memory {
            return Ok(Arc::new(MemoryStore::new()));
        }
        let root = match &self.store {
            Some(root) => root.clone(),
            None => config.store_root()?,
        };
        log::info!("opening store at {:?}", root);
        Ok(Arc::new(FileStore::open(root)?))
    }
}

/// Plain-text feed for `postboard list`.
pub fn write_feed<W: Write>(out: &mut W, posts: &[Post]) -> Result<(), PostboardError> {
    if posts.is_empty() {
        writeln!(out, "No posts yet")?;
        return Ok(());
    }
    for post in posts {
        writeln!(out, "{} posted {} [{}]", post.author.name, post.display_time(), post.id)?;
        for line in post.body.lines() {
            writeln!(out, "  {}", line)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Author;

    #[test]
    fn default_command_is_feed() {
        let flags = Flags::parse_from(["postboard"]);
        assert_eq!(flags.command(), Command::Feed);
        assert!(!flags.memory);
    }

    #[test]
    fn post_with_text() {
        let flags = Flags::parse_from(["postboard", "--memory", "post", "hello there"]);
        assert!(flags.memory);
        assert_eq!(
            flags.command(),
            Command::Post {
                text: Some("hello there".into())
            }
        );
    }

    #[test]
    fn memory_conflicts_with_store() {
        let res = Flags::try_parse_from(["postboard", "--memory", "--store", "/tmp/x", "list"]);
        assert!(res.is_err());
    }

    #[test]
    fn explicit_config_path() {
        let flags = Flags::parse_from(["postboard", "--config", "/tmp/pb.json", "login"]);
        assert_eq!(flags.config_path().unwrap(), PathBuf::from("/tmp/pb.json"));
        assert_eq!(flags.command(), Command::Login);
    }

    #[test]
    fn feed_listing() {
        let mut out = Vec::new();
        write_feed(&mut out, &[]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "No posts yet\n");

        let post = Post {
            id: "p1".into(),
            author: Author {
                name: "Ada".into(),
                ..Author::default()
            },
            body: "line one\nline two".into(),
            timestamp: 0,
        };
        let mut out = Vec::new();
        write_feed(&mut out, &[post]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Ada posted "));
        assert!(text.contains("[p1]"));
        assert!(text.contains("  line one\n  line two\n"));
    }
}
