use std::sync::Arc;

use chrono::{Local, TimeZone};
use nostr_sdk::prelude::Keys;

use postboard::controllers::comment_controller::{fetch_comments, submit_comment};
use postboard::controllers::post_controller::{delete_post, update_post_body};
use postboard::controllers::{fetch_feed, submit_post, PostEntry};
use postboard::models::{
    Auth, CascadePolicy, DocumentStore, FileStore, MemoryStore, Profile, RulesStore, Session,
};
use postboard::PostboardError;
use tempfile::TempDir;

fn signed_in(name: &str, email: &str) -> (Auth, Session) {
    let auth = Auth::signed_out();
    let profile = Profile {
        name: name.into(),
        email: email.into(),
        avatar_url: format!("https://img/{}.png", name),
    };
    let session = auth
        .sign_in(&profile, &Keys::generate().secret_key().to_secret_hex())
        .unwrap();
    (auth, session)
}

fn at(ms: i64) -> chrono::DateTime<Local> {
    Local.timestamp_millis_opt(ms).unwrap()
}

#[tokio::test]
async fn edit_round_trip_changes_only_the_body() {
    let inner = Arc::new(MemoryStore::new());
    let (auth, session) = signed_in("Ada", "a@x.com");
    let store = RulesStore::new(inner.clone(), auth.subscribe());

    submit_post(&store, Some(&session), "first draft".into(), at(1_000))
        .await
        .unwrap();
    let before = fetch_feed(&store, 30).await.unwrap().remove(0);

    let mut entry = PostEntry::new(before.clone());
    entry.begin_edit(Some(&session)).unwrap();
    *entry.buffer_mut().unwrap() = "new body".into();
    entry.save_edit(&store).await.unwrap();

    let after = fetch_feed(&store, 30).await.unwrap().remove(0);
    assert_eq!(after.body, "new body");
    assert_eq!(after.id, before.id);
    assert_eq!(after.author, before.author);
    assert_eq!(after.timestamp, before.timestamp);
}

#[tokio::test]
async fn owner_scenario_across_two_sessions() {
    let inner = Arc::new(MemoryStore::new());
    let (auth_a, a) = signed_in("A", "a@x.com");
    let (auth_b, b) = signed_in("B", "b@x.com");
    let store_a = RulesStore::new(inner.clone(), auth_a.subscribe());
    let store_b = RulesStore::new(inner.clone(), auth_b.subscribe());

    submit_post(&store_a, Some(&a), "P".into(), at(1)).await.unwrap();
    let post = fetch_feed(&store_b, 30).await.unwrap().remove(0);

    // B sees no controls and the store refuses B anyway
    assert!(!PostEntry::new(post.clone()).can_modify(Some(&b)));
    let err = update_post_body(&store_b, &post.id, "hijacked").await.unwrap_err();
    assert!(matches!(err, PostboardError::PermissionDenied(_)));

    // A has controls and the edit lands
    assert!(PostEntry::new(post.clone()).can_modify(Some(&a)));
    update_post_body(&store_a, &post.id, "updated").await.unwrap();
    let fresh = fetch_feed(&store_b, 30).await.unwrap().remove(0);
    assert_eq!(fresh.body, "updated");
}

#[tokio::test]
async fn cascade_delete_removes_comments() {
    let inner = Arc::new(MemoryStore::new());
    let (auth_a, a) = signed_in("A", "a@x.com");
    let (auth_b, b) = signed_in("B", "b@x.com");
    let store_a = RulesStore::new(inner.clone(), auth_a.subscribe());
    let store_b = RulesStore::new(inner.clone(), auth_b.subscribe());

    let post_id = submit_post(&store_a, Some(&a), "P".into(), at(1)).await.unwrap();
    submit_comment(&store_b, Some(&b), &post_id, "from B".into(), at(2))
        .await
        .unwrap();
    submit_comment(&store_a, Some(&a), &post_id, "from A".into(), at(3))
        .await
        .unwrap();

    let removed = delete_post(&store_a, &post_id, CascadePolicy::Cascade)
        .await
        .unwrap();
    assert_eq!(removed, 2);
    assert!(fetch_feed(inner.as_ref(), 30).await.unwrap().is_empty());
    assert!(fetch_comments(inner.as_ref(), &post_id, None)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn orphan_policy_leaves_comments_readable() {
    let inner = Arc::new(MemoryStore::new());
    let (auth_a, a) = signed_in("A", "a@x.com");
    let store_a = RulesStore::new(inner.clone(), auth_a.subscribe());

    let post_id = submit_post(&store_a, Some(&a), "P".into(), at(1)).await.unwrap();
    submit_comment(&store_a, Some(&a), &post_id, "left behind".into(), at(2))
        .await
        .unwrap();

    let removed = delete_post(&store_a, &post_id, CascadePolicy::Orphan)
        .await
        .unwrap();
    assert_eq!(removed, 0);
    assert!(fetch_feed(inner.as_ref(), 30).await.unwrap().is_empty());
    let orphans = fetch_comments(inner.as_ref(), &post_id, None).await.unwrap();
    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0].body, "left behind");
}

#[tokio::test]
async fn non_owner_cannot_delete_post() {
    let inner = Arc::new(MemoryStore::new());
    let (auth_a, a) = signed_in("A", "a@x.com");
    let (auth_b, _) = signed_in("B", "b@x.com");
    let store_a = RulesStore::new(inner.clone(), auth_a.subscribe());
    let store_b = RulesStore::new(inner.clone(), auth_b.subscribe());

    let post_id = submit_post(&store_a, Some(&a), "P".into(), at(1)).await.unwrap();
    let err = delete_post(&store_b, &post_id, CascadePolicy::Orphan)
        .await
        .unwrap_err();
    assert!(matches!(err, PostboardError::PermissionDenied(_)));
    assert_eq!(fetch_feed(inner.as_ref(), 30).await.unwrap().len(), 1);
}

#[tokio::test]
async fn file_store_feed_is_bounded_and_ordered() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::open(dir.path()).unwrap();
    let (_auth, a) = signed_in("A", "a@x.com");
    for ms in 0..33 {
        submit_post(&store, Some(&a), format!("post {}", ms), at(ms * 1000))
            .await
            .unwrap();
    }

    let posts = fetch_feed(&store, 30).await.unwrap();
    assert_eq!(posts.len(), 30);
    assert_eq!(posts[0].body, "post 32");
    assert_eq!(posts[29].body, "post 3");
    assert!(posts.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
}

#[tokio::test]
async fn signed_out_store_rejects_writes() {
    let inner = Arc::new(MemoryStore::new());
    let auth = Auth::signed_out();
    let store = RulesStore::new(inner.clone(), auth.subscribe());
    let (_, a) = signed_in("A", "a@x.com");

    // Even with a forged session the store checks its own caller
    let err = submit_post(&store, Some(&a), "sneaky".into(), at(1))
        .await
        .unwrap_err();
    assert_eq!(err, PostboardError::NotAuthenticated);
    assert!(inner.query(&postboard::models::Query::collection("posts")).await.unwrap().is_empty());
}
