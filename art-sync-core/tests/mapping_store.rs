use std::fs;

use art_sync_core::mapping::{sanitize_address, MappingStore};

#[test]
fn missing_document_loads_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = MappingStore::for_device(dir.path(), "192.168.1.20");
    assert!(store.is_empty());
}

#[test]
fn mapping_path_is_filesystem_safe() {
    let dir = tempfile::tempdir().unwrap();
    let store = MappingStore::for_device(dir.path(), "192.168.1.20");
    assert!(store
        .path()
        .ends_with("tv_192_168_1_20_mapping.json"));
    assert_eq!(sanitize_address("fe80::1"), "fe80__1");
}

#[test]
fn put_persists_and_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut store = MappingStore::for_device(dir.path(), "10.0.0.9");
        store.put("sunset.jpg", "MY_F0001");
        store.put("forest.png", "MY_F0002");
    }
    let store = MappingStore::for_device(dir.path(), "10.0.0.9");
    assert_eq!(store.len(), 2);
    assert_eq!(store.content_id("sunset.jpg"), Some("MY_F0001"));
    assert_eq!(store.reverse_index().get("MY_F0002"), Some(&"forest.png"));
}

#[test]
fn reverse_index_inverts_every_entry() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = MappingStore::for_device(dir.path(), "10.0.0.9");
    store.put("a.jpg", "C1");
    store.put("b.jpg", "C2");

    let reverse = store.reverse_index();
    assert_eq!(reverse.len(), 2);
    assert_eq!(reverse.get("C1"), Some(&"a.jpg"));
    assert_eq!(reverse.get("C2"), Some(&"b.jpg"));
    assert_eq!(reverse.get("C3"), None);
}

#[test]
fn corrupt_document_degrades_to_empty_without_failing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tv_10_0_0_9_mapping.json");
    fs::write(&path, "{ not json").unwrap();

    let mut store = MappingStore::for_device(dir.path(), "10.0.0.9");
    assert!(store.is_empty());

    // And the store is usable again afterwards.
    store.put("a.jpg", "C1");
    let reloaded = MappingStore::for_device(dir.path(), "10.0.0.9");
    assert_eq!(reloaded.content_id("a.jpg"), Some("C1"));
}

#[test]
fn remove_drops_a_single_entry_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = MappingStore::for_device(dir.path(), "10.0.0.9");
    store.put("a.jpg", "C1");
    store.put("b.jpg", "C2");
    store.remove("a.jpg");

    let reloaded = MappingStore::for_device(dir.path(), "10.0.0.9");
    assert_eq!(reloaded.content_id("a.jpg"), None);
    assert_eq!(reloaded.content_id("b.jpg"), Some("C2"));
}

#[test]
fn remove_many_drops_only_named_entries() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = MappingStore::for_device(dir.path(), "10.0.0.9");
    store.put("a.jpg", "C1");
    store.put("b.jpg", "C2");
    store.put("c.jpg", "C3");

    let doomed = vec!["b.jpg".to_string(), "c.jpg".to_string()];
    store.remove_many(doomed.iter());

    let reloaded = MappingStore::for_device(dir.path(), "10.0.0.9");
    assert_eq!(reloaded.len(), 1);
    assert_eq!(reloaded.content_id("a.jpg"), Some("C1"));
}

#[test]
fn first_content_id_is_deterministic_in_filename_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = MappingStore::for_device(dir.path(), "10.0.0.9");
    store.put("zebra.jpg", "C9");
    store.put("alpha.jpg", "C4");
    assert_eq!(store.first_content_id(), Some("C4"));
}
