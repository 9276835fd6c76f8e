use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PostboardError;
use crate::models::session::Session;
use crate::models::store::{Document, Fields};

/// Author snapshot copied from the session when a post is written.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Author {
    pub name: String,
    pub id: String,
    #[serde(rename = "photoURL")]
    pub photo_url: String,
    /// Display time frozen at submission.
    pub time: String,
    pub email: String,
}

impl Author {
    pub fn from_session(session: &Session, time: String) -> Self {
        Self {
            name: session.display_name.clone(),
            id: session.identity_id.clone(),
            photo_url: session.avatar_url.clone(),
            time,
            email: session.email.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Post {
    #[serde(skip)]
    pub id: String,
    pub author: Author,
    #[serde(rename = "postContent")]
    pub body: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl Post {
    pub fn from_document(doc: Document) -> Result<Self, PostboardError> {
        let mut post: Post = serde_json::from_value(Value::Object(doc.fields))?;
        post.id = doc.id;
        Ok(post)
    }

    pub fn to_fields(&self) -> Result<Fields, PostboardError> {
        to_fields(self)
    }

    pub fn display_time(&self) -> String {
        display_time(self.timestamp)
    }
}

pub(crate) fn to_fields<T: Serialize>(value: &T) -> Result<Fields, PostboardError> {
    match serde_json::to_value(value)? {
        Value::Object(fields) => Ok(fields),
        other => Err(PostboardError::Json(format!("expected an object, got {}", other))),
    }
}

/// Short weekday plus 12-hour clock, e.g. `Tue 3:04 PM`.
pub fn format_display_time<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    time.format("%a %-I:%M %p").to_string()
}

/// Local display time for a millisecond timestamp.
pub fn display_time(timestamp_ms: i64) -> String {
    match Local.timestamp_millis_opt(timestamp_ms).single() {
        Some(time) => format_display_time(&time),
        None => String::new(),
    }
}
