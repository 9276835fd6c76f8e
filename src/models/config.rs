use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::PostboardError;
use crate::models::session::Profile;

pub const DEFAULT_FEED_LIMIT: usize = 30;

/// What happens to a post's comments when the post is deleted.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CascadePolicy {
    /// Delete the comments together with the post.
    #[default]
    Cascade,
    /// Leave the comments in the store.
    Orphan,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Secret key used to sign in. Absent means read-only.
    pub key: Option<String>,
    pub profile: Profile,
    pub store_root: Option<PathBuf>,
    pub feed_limit: usize,
    pub comment_limit: Option<usize>,
    pub cascade: CascadePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            key: None,
            profile: Profile::default(),
            store_root: None,
            feed_limit: DEFAULT_FEED_LIMIT,
            comment_limit: None,
            cascade: CascadePolicy::default(),
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf, PostboardError> {
        Ok(dirs::home_dir()
            .ok_or_else(|| PostboardError::Config("Could not find home directory".to_string()))?
            .join(".config/postboard/config.json"))
    }

    /// Load the config at `path`; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, PostboardError> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::info!("no config at {:?}, using defaults", path);
                return Ok(Config::default());
            }
            Err(e) => {
                return Err(PostboardError::Config(format!(
                    "Failed to read config file at {:?}: {}",
                    path, e
                )))
            }
        };

        let config: Config = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse config JSON at {:?}", path))?;
        if config.feed_limit == 0 {
            return Err(PostboardError::Config("feed_limit must be positive".to_string()));
        }
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), PostboardError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory {:?}", dir))?;
        }

        let json = serde_json::to_string_pretty(&self)
            .context("Failed to serialize config to JSON")?;

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("Failed to open conf file for writing at {:?}", path))?;

        file.write_all(json.as_bytes())
            .context("Failed to write config data")?;

        Ok(())
    }

    /// Directory of the file-backed store.
    pub fn store_root(&self) -> Result<PathBuf, PostboardError> {
        match &self.store_root {
            Some(root) => Ok(root.clone()),
            None => Ok(dirs::data_local_dir()
                .or_else(dirs::home_dir)
                .ok_or_else(|| PostboardError::Config("Could not find data directory".to_string()))?
                .join("postboard/store")),
        }
    }

    pub fn credentials(&self) -> Option<(Profile, String)> {
        self.key
            .as_ref()
            .map(|key| (self.profile.clone(), key.clone()))
    }
}
