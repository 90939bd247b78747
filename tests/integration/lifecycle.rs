//! Integration test: full identity lifecycle.
//!
//! Walks a record through:
//! 1. Store a secret under a fresh identity
//! 2. Verify the right and wrong secrets
//! 3. Attempt closure with a wrong token, then the right one
//! 4. Confirm every operation on the closed id reports NotFound

use susdb::{
    ErrorKind, Hasher, HasherParams, IdentityId, IdentityStore, LocalBackend, StoreError,
};

fn open_store(dir: &tempfile::TempDir) -> IdentityStore {
    let backend = LocalBackend::new(dir.path()).expect("backend should open");
    let hasher = Hasher::new(HasherParams::fast()).expect("fast params are valid");
    IdentityStore::new(backend, hasher)
}

#[test]
fn full_lifecycle_store_verify_close() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);

    // ── Step 1: Store ───────────────────────────────────────────────────
    let handle = store.initialize(None).expect("initialize should succeed");
    let issued = handle
        .store("mike12345678iuiujfkk")
        .expect("store should succeed");
    let uid = issued.id.as_str().to_string();
    assert_eq!(&issued.id, handle.id());

    // ── Step 2: Verify ──────────────────────────────────────────────────
    store
        .verify(&uid, "mike12345678iuiujfkk")
        .expect("correct secret should verify");
    let wrong = store.verify(&uid, "wrong").unwrap_err();
    assert_eq!(wrong.kind(), ErrorKind::MismatchError);

    // ── Step 3: Close ───────────────────────────────────────────────────
    let bad_close = store.close(&uid, "not-the-token").unwrap_err();
    assert_eq!(bad_close.kind(), ErrorKind::MismatchError);
    assert!(store.exists(&uid).unwrap(), "record must survive a bad close");

    store
        .close(&uid, &issued.secured_token)
        .expect("close with the issued token should succeed");

    // ── Step 4: Gone ────────────────────────────────────────────────────
    assert!(!store.exists(&uid).unwrap());
    assert!(!dir.path().join(issued.id.record_name()).exists());
    let after = store.verify(&uid, "mike12345678iuiujfkk").unwrap_err();
    assert_eq!(after.kind(), ErrorKind::NotFound);
}

#[test]
fn round_trip_for_varied_secrets() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);

    let secrets = [
        "a",
        "password",
        "with spaces and\ttabs",
        "quotes \" and \\ backslashes",
        "ünïcödé 🔐 секрет",
        "{\"request_string\": \"nested\"}",
    ];
    for secret in secrets {
        let issued = store.initialize(None).unwrap().store(secret).unwrap();
        store
            .verify(issued.id.as_str(), secret)
            .unwrap_or_else(|e| panic!("{secret:?} should verify: {e}"));

        let near_miss = format!("{secret} ");
        assert!(matches!(
            store.verify(issued.id.as_str(), &near_miss),
            Err(StoreError::HashMismatch)
        ));
    }
}

#[test]
fn not_found_is_consistent_across_operations() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let missing = IdentityId::generate();
    let uid = missing.as_str();

    let errors = [
        store.verify(uid, "s").unwrap_err(),
        store.fetch(uid, "hash_string").unwrap_err(),
        store.display(uid).unwrap_err(),
        store.close(uid, "token").unwrap_err(),
        store.recover(uid, "s").unwrap_err(),
    ];
    for err in errors {
        assert_eq!(err.kind(), ErrorKind::NotFound, "got {err}");
    }
}

#[test]
fn recovery_rotates_token_and_secret() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);

    let first = store.initialize(None).unwrap().store("old-secret").unwrap();
    let uid = first.id.as_str();
    let created_before = store.fetch(uid, "created_on").unwrap();

    let second = store.recover(uid, "new-secret").unwrap();
    assert_eq!(second.id, first.id);
    assert_ne!(second.secured_token, first.secured_token);
    assert_eq!(store.fetch(uid, "secured_token").unwrap(), second.secured_token);
    assert!(store.fetch(uid, "created_on").unwrap() >= created_before);

    store.verify(uid, "new-secret").unwrap();
    assert!(matches!(
        store.verify(uid, "old-secret"),
        Err(StoreError::HashMismatch)
    ));

    // The superseded token no longer authorizes closure.
    assert!(matches!(
        store.close(uid, &first.secured_token),
        Err(StoreError::TokenMismatch)
    ));
    store.close(uid, &second.secured_token).unwrap();
}

#[test]
fn recover_rejects_empty_secret() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let issued = store.initialize(None).unwrap().store("keep").unwrap();

    let err = store.recover(issued.id.as_str(), "").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);
    store.verify(issued.id.as_str(), "keep").unwrap();
}

#[test]
fn display_has_exactly_four_fields() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let issued = store
        .initialize(None)
        .unwrap()
        .store("mike12345678iuiujfghf")
        .unwrap();

    let view = store.display(issued.id.as_str()).unwrap();
    let mut keys: Vec<&str> = view.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, ["created_on", "hash_string", "id", "secured_token"]);
    assert!(!view["secured_token"].is_empty());
    assert_eq!(view["id"], issued.id.as_str());
    assert!(!view["hash_string"].contains("mike12345678iuiujfghf"));
}

#[test]
fn records_survive_reopening_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let issued = {
        let store = open_store(&dir);
        store.initialize(None).unwrap().store("durable").unwrap()
    };

    let reopened = open_store(&dir);
    reopened.verify(issued.id.as_str(), "durable").unwrap();
    let handle = reopened.initialize(Some(issued.id.as_str())).unwrap();
    assert_eq!(handle.id(), &issued.id);
}
