//! Session Persistence Tests

mod common;

use common::{temp_session_path, user, VIEWER};
use pameran::app::session::Session;
use pameran::infra::session_store::{SessionStore, StoredSession};

#[tokio::test]
async fn missing_file_means_signed_out() {
    let session = Session::load(SessionStore::new(temp_session_path()))
        .await
        .expect("load");
    assert!(!session.is_signed_in());
    assert_eq!(session.token(), None);
    assert_eq!(session.viewer_id(), None);
}

#[tokio::test]
async fn sign_in_survives_a_restart() {
    let path = temp_session_path();
    let session = Session::load(SessionStore::new(&path)).await.expect("load");
    session
        .sign_in("abc".to_string(), user(VIEWER.0))
        .await
        .expect("sign in");

    let clone = session.clone();
    assert_eq!(clone.viewer_id(), Some(VIEWER));

    let restored = Session::load(SessionStore::new(&path)).await.expect("reload");
    assert_eq!(restored.token().as_deref(), Some("abc"));
    assert_eq!(restored.user(), Some(user(VIEWER.0)));
}

#[tokio::test]
async fn sign_out_removes_the_file() {
    let path = temp_session_path();
    let session = Session::load(SessionStore::new(&path)).await.expect("load");
    session
        .sign_in("abc".to_string(), user(VIEWER.0))
        .await
        .expect("sign in");
    assert!(path.exists());

    session.sign_out().await.expect("sign out");
    assert!(!path.exists());
    assert!(!session.is_signed_in());

    // Signing out twice is fine.
    session.sign_out().await.expect("sign out again");
}

#[tokio::test]
async fn corrupt_file_is_treated_as_signed_out() {
    let path = temp_session_path();
    let store = SessionStore::new(&path);
    store
        .save(&StoredSession {
            token: "t".into(),
            user: user(3),
        })
        .await
        .expect("save");
    tokio::fs::write(&path, b"{ not json").await.expect("corrupt");

    assert_eq!(store.load().await.expect("load"), None);
    let session = Session::load(store).await.expect("session");
    assert!(!session.is_signed_in());
}

#[tokio::test]
async fn anonymous_session_never_reads_the_store() {
    let path = temp_session_path();
    let store = SessionStore::new(&path);
    store
        .save(&StoredSession {
            token: "t".into(),
            user: user(3),
        })
        .await
        .expect("save");

    let session = Session::anonymous(store);
    assert!(!session.is_signed_in());
}
