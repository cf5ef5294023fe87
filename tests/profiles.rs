mod support;

use std::sync::Arc;

use daybook::error::Error;
use daybook::kv::{KeyValueStore, MemoryStore};
use daybook::partition::{DEFAULT_PROFILE, PROFILES_KEY, SELECTED_PROFILE_KEY};
use daybook::profile::ProfileDirectory;
use daybook::task::Task;

use support::{day, store_at};

#[tokio::test]
async fn created_profiles_persist_in_order() {
    let kv = Arc::new(MemoryStore::new());
    let mut directory = ProfileDirectory::load(kv.clone()).await.unwrap();
    assert!(directory.create(" Work ").await.unwrap());
    assert!(directory.create("Home").await.unwrap());
    assert!(!directory.create("Work").await.unwrap());

    assert_eq!(
        kv.get(PROFILES_KEY).await.unwrap().as_deref(),
        Some(r#"["Default","Work","Home"]"#)
    );

    let reloaded = ProfileDirectory::load(kv).await.unwrap();
    assert_eq!(reloaded.list(), &["Default", "Work", "Home"]);
}

#[tokio::test]
async fn names_that_would_collide_with_keys_are_rejected() {
    let kv = Arc::new(MemoryStore::new());
    let mut directory = ProfileDirectory::load(kv.clone()).await.unwrap();

    for bad in [
        "",
        "   ",
        "2026-10-16",
        "tab\there",
        "../../escaped",
        "nested/name",
        "back\\slash",
        "..",
    ] {
        let err = directory.create(bad).await.unwrap_err();
        assert!(
            matches!(err, Error::InvalidProfileName { .. }),
            "{bad:?} should be rejected"
        );
    }
    assert!(kv.get(PROFILES_KEY).await.unwrap().is_none());
}

#[tokio::test]
async fn deleted_profile_keeps_its_tasks() {
    let kv = Arc::new(MemoryStore::new());
    let store = store_at(kv.clone(), "2026-10-16");
    let mut directory = ProfileDirectory::load(kv.clone()).await.unwrap();
    directory.create("Side").await.unwrap();
    store
        .create(day("2026-10-16"), "Side", Task::new("side quest"))
        .await
        .unwrap();

    assert!(directory.delete("Side").await.unwrap());
    assert!(!directory.contains("Side"));
    assert!(kv.get("tasks_Side_2026-10-16").await.unwrap().is_some());

    directory.create("Side").await.unwrap();
    let tasks = store.load(day("2026-10-16"), "Side").await.unwrap();
    assert_eq!(tasks[0].title, "side quest");
}

#[tokio::test]
async fn selection_survives_reload_and_drives_resolution() {
    let kv = Arc::new(MemoryStore::new());
    let mut directory = ProfileDirectory::load(kv.clone()).await.unwrap();
    directory.create("Work").await.unwrap();
    directory.select("Work").await.unwrap();
    assert_eq!(
        kv.get(SELECTED_PROFILE_KEY).await.unwrap().as_deref(),
        Some("Work")
    );

    let reloaded = ProfileDirectory::load(kv.clone()).await.unwrap();
    assert_eq!(reloaded.selected(), "Work");
    assert_eq!(reloaded.resolve(Some(DEFAULT_PROFILE)).unwrap(), DEFAULT_PROFILE);
}

#[tokio::test]
async fn stale_selection_falls_back_to_default() {
    let kv = Arc::new(MemoryStore::with_entries([
        (PROFILES_KEY, r#"["Default"]"#),
        (SELECTED_PROFILE_KEY, "Gone"),
    ]));
    let directory = ProfileDirectory::load(kv).await.unwrap();
    assert_eq!(directory.selected(), DEFAULT_PROFILE);
}
