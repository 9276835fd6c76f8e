use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PostboardError;
use crate::models::session::{Auth, Profile, Session};

pub fn get_cache_dir() -> Result<PathBuf, PostboardError> {
    // Check the XDG_CACHE_HOME environment variable first
    let base_cache_dir = match env::var_os("XDG_CACHE_HOME") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let home = env::var_os("HOME")
                .ok_or(PostboardError::Config("Home environment variable not set".to_string()))?;
            Path::new(&home).join(".cache")
        }
    };

    let app_cache_dir = base_cache_dir.join("postboard");

    fs::create_dir_all(&app_cache_dir)
        .map_err(|e| PostboardError::Cache(format!("Failed to create cache directory: {}", e)))?;

    Ok(app_cache_dir)
}

/// Locally persisted session values, kept between runs.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct SessionRecord {
    #[serde(rename = "isAuth")]
    pub is_auth: bool,
    #[serde(rename = "userPic")]
    pub user_pic: String,
    pub name: String,
    pub email: String,
}

impl SessionRecord {
    pub fn from_session(session: Option<&Session>) -> Self {
        match session {
            Some(s) => Self {
                is_auth: true,
                user_pic: s.avatar_url.clone(),
                name: s.display_name.clone(),
                email: s.email.clone(),
            },
            None => Self::default(),
        }
    }
}

pub struct SessionCache {
    path: PathBuf,
}

impl SessionCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_location() -> Result<Self, PostboardError> {
        Ok(Self::new(get_cache_dir()?.join("session.json")))
    }

    pub fn load(&self) -> Result<SessionRecord, PostboardError> {
        match fs::read_to_string(&self.path) {
            Ok(data) => serde_json::from_str(&data)
                .map_err(|e| PostboardError::Cache(format!("Failed to parse session data: {}", e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SessionRecord::default()),
            Err(e) => Err(PostboardError::Cache(format!("Failed to read session file: {}", e))),
        }
    }

    pub fn save(&self, record: &SessionRecord) -> Result<(), PostboardError> {
        let json = serde_json::to_string(record)
            .map_err(|e| PostboardError::Cache(format!("Failed to serialize session: {}", e)))?;
        fs::write(&self.path, json)
            .map_err(|e| PostboardError::Cache(format!("Failed to write session file: {}", e)))?;
        Ok(())
    }
}

/// Seed `Auth` from the persisted flag. A stale record whose key no longer
/// parses is cleared rather than trusted.
pub fn restore_session(
    cache: &SessionCache,
    credentials: Option<&(Profile, String)>,
) -> Result<Auth, PostboardError> {
    let record = cache.load()?;
    let auth = Auth::signed_out();
    if !record.is_auth {
        return Ok(auth);
    }
    match credentials {
        Some((profile, key)) => match auth.sign_in(profile, key) {
            Ok(session) => cache.save(&SessionRecord::from_session(Some(&session)))?,
            Err(e) => {
                log::warn!("could not restore session: {}", e);
                cache.save(&SessionRecord::default())?;
            }
        },
        None => cache.save(&SessionRecord::default())?,
    }
    Ok(auth)
}
