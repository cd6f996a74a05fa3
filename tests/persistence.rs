//! Block-list persistence across process lifetimes.

use appwall::store::{BlockListStore, JsonFileBackend};
use appwall::types::AppId;

const OWN_APP: &str = "io.appwall.gateway";

fn open(path: &std::path::Path) -> BlockListStore {
    BlockListStore::open(
        Box::new(JsonFileBackend::new(path)),
        AppId::from(OWN_APP),
    )
    .unwrap()
}

#[test]
fn block_list_survives_cold_start() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blocklist.json");

    {
        let store = open(&path);
        store.set_blocked(&AppId::from("com.example.a"), true).unwrap();
        store.set_blocked(&AppId::from("com.example.b"), true).unwrap();
        store.set_blocked(&AppId::from("com.example.a"), false).unwrap();
    }

    // A fresh store sees exactly what the previous process left behind.
    let store = open(&path);
    let snapshot = store.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert!(snapshot.contains(&AppId::from("com.example.b")));
}

#[test]
fn first_run_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir.path().join("blocklist.json"));
    assert!(store.snapshot().is_empty());
}

#[test]
fn mutations_in_one_process_are_visible_to_a_later_one() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blocklist.json");

    open(&path)
        .set_blocked(&AppId::from("com.example.late"), true)
        .unwrap();

    assert!(open(&path)
        .snapshot()
        .contains(&AppId::from("com.example.late")));
}
