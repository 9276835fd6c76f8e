use std::sync::Arc;

use nostr_sdk::prelude::{Keys, ToBech32};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::PostboardError;

/// Profile a user signs in with. Lives in the config file.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub avatar_url: String,
}

/// The signed-in identity as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub display_name: String,
    pub email: String,
    pub avatar_url: String,
    pub identity_id: String,
}

impl Session {
    /// An empty email never owns anything.
    pub fn owns(&self, author_email: &str) -> bool {
        !self.email.is_empty() && self.email == author_email
    }
}

/// Whether the viewer gets edit/delete controls for an item.
/// Only a UI affordance; the store enforces its own rules.
pub fn can_modify(session: Option<&Session>, author_email: &str) -> bool {
    session.map_or(false, |s| s.owns(author_email))
}

/// Identity provider handle. Session changes are pushed to subscribers.
#[derive(Clone)]
pub struct Auth {
    tx: Arc<watch::Sender<Option<Session>>>,
}

impl Auth {
    pub fn new(initial: Option<Session>) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn signed_out() -> Self {
        Self::new(None)
    }

    /// Validate the secret key and publish a session for `profile`.
    pub fn sign_in(&self, profile: &Profile, secret_key: &str) -> Result<Session, PostboardError> {
        let session = session_for(profile, secret_key)?;
        log::info!("signed in as {}", session.email);
        self.tx.send_replace(Some(session.clone()));
        Ok(session)
    }

    pub fn sign_out(&self) {
        if self.tx.send_replace(None).is_some() {
            log::info!("signed out");
        }
    }

    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }
}

pub fn session_for(profile: &Profile, secret_key: &str) -> Result<Session, PostboardError> {
    let keys =
        Keys::parse(secret_key).map_err(|e| PostboardError::KeyParsing(e.to_string()))?;
    let identity_id = keys
        .public_key()
        .to_bech32()
        .map_err(|e| PostboardError::KeyParsing(e.to_string()))?;
    Ok(Session {
        display_name: profile.name.clone(),
        email: profile.email.clone(),
        avatar_url: profile.avatar_url.clone(),
        identity_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> Profile {
        Profile {
            name: "Ada".into(),
            email: "a@x.com".into(),
            avatar_url: "https://img/ada.png".into(),
        }
    }

    fn secret() -> String {
        Keys::generate().secret_key().to_secret_hex()
    }

    #[test]
    fn ownership_matrix() {
        let owner = Session {
            display_name: "A".into(),
            email: "a@x.com".into(),
            avatar_url: String::new(),
            identity_id: "npub1a".into(),
        };
        let other = Session {
            email: "b@x.com".into(),
            ..owner.clone()
        };
        assert!(can_modify(Some(&owner), "a@x.com"));
        assert!(!can_modify(Some(&other), "a@x.com"));
        assert!(!can_modify(None, "a@x.com"));
        assert!(!can_modify(None, ""));

        let anonymous = Session {
            email: String::new(),
            ..owner.clone()
        };
        assert!(!anonymous.owns(""));
        assert!(!can_modify(Some(&anonymous), ""));
    }

    #[test]
    fn sign_in_derives_identity_from_key() {
        let auth = Auth::signed_out();
        let session = auth.sign_in(&profile(), &secret()).unwrap();
        assert!(session.identity_id.starts_with("npub1"));
        assert_eq!(session.email, "a@x.com");
        assert_eq!(auth.current(), Some(session));
    }

    #[test]
    fn bad_key_is_rejected() {
        let auth = Auth::signed_out();
        let err = auth.sign_in(&profile(), "not a key").unwrap_err();
        assert!(matches!(err, PostboardError::KeyParsing(_)));
        assert!(auth.current().is_none());
    }

    #[tokio::test]
    async fn subscribers_see_changes() {
        let auth = Auth::signed_out();
        let mut rx = auth.subscribe();
        auth.sign_in(&profile(), &secret()).unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_some());

        auth.sign_out();
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_none());
    }
}
