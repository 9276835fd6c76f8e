use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PostboardError;
use crate::models::post::{display_time, to_fields};
use crate::models::store::{split_doc_path, Document, Fields};

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Comment {
    #[serde(skip)]
    pub id: String,
    /// Parent post; implied by the storage path.
    #[serde(skip)]
    pub post_id: String,
    #[serde(rename = "name")]
    pub author_name: String,
    #[serde(rename = "photoURL")]
    pub author_photo_url: String,
    #[serde(rename = "email")]
    pub author_email: String,
    #[serde(rename = "comment")]
    pub body: String,
    pub timestamp: i64,
}

impl Comment {
    pub fn from_document(doc: Document) -> Result<Self, PostboardError> {
        let mut comment: Comment = serde_json::from_value(Value::Object(doc.fields))?;
        // posts/<post_id>/comments/<id>
        comment.post_id = split_doc_path(&doc.path)
            .and_then(|(collection, _)| split_doc_path(collection))
            .and_then(|(post_path, _)| split_doc_path(post_path))
            .map(|(_, post_id)| post_id.to_string())
            .unwrap_or_default();
        comment.id = doc.id;
        Ok(comment)
    }

    pub fn to_fields(&self) -> Result<Fields, PostboardError> {
        to_fields(self)
    }

    pub fn display_time(&self) -> String {
        display_time(self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn post_id_comes_from_path() {
        let doc = Document {
            id: "c9".into(),
            path: "posts/p1/comments/c9".into(),
            fields: json!({"name": "Bo", "email": "b@x.com", "comment": "nice", "timestamp": 3})
                .as_object()
                .cloned()
                .unwrap(),
        };
        let comment = Comment::from_document(doc).unwrap();
        assert_eq!(comment.id, "c9");
        assert_eq!(comment.post_id, "p1");
        assert_eq!(comment.author_email, "b@x.com");
        assert_eq!(comment.body, "nice");
        assert_eq!(comment.author_photo_url, "");
    }

    #[test]
    fn stored_field_names() {
        let comment = Comment {
            id: "c1".into(),
            post_id: "p1".into(),
            author_name: "Bo".into(),
            author_photo_url: "u".into(),
            author_email: "b@x.com".into(),
            body: "text".into(),
            timestamp: 9,
        };
        let fields = comment.to_fields().unwrap();
        let mut keys: Vec<_> = fields.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["comment", "email", "name", "photoURL", "timestamp"]);
    }
}
