use std::fs;
use std::path::Path;

use cellrag_core::error::Error;
use cellrag_core::types::{Segment, PAGE_KEY, SOURCE_KEY};
use cellrag_vector::store::{vectors_checksum, MANIFEST_FILE};
use cellrag_vector::{clear, load, read_manifest, save, StoreManifest, VectorIndex};
use tempfile::TempDir;

const MODEL: &str = "test:d3";

fn sample_index() -> VectorIndex {
    VectorIndex::from_parts(
        vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0], vec![0.6, 0.8, 0.0]],
        vec![
            Segment::new("NR carrier aggregation").with_meta(SOURCE_KEY, "nr.pdf").with_meta(PAGE_KEY, 0usize),
            Segment::new("LTE handover").with_meta(SOURCE_KEY, "lte.txt"),
            Segment::new("Massive MIMO"),
        ],
    )
    .unwrap()
}

fn rewrite_manifest(path: &Path, edit: impl FnOnce(&mut StoreManifest)) {
    let mut manifest = read_manifest(path).unwrap();
    edit(&mut manifest);
    fs::write(path.join(MANIFEST_FILE), serde_json::to_vec(&manifest).unwrap()).unwrap();
}

#[tokio::test]
async fn save_then_load_round_trips() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("store");
    let index = sample_index();

    let manifest = save(&index, MODEL, &path).await.unwrap();
    assert_eq!(manifest.count, 3);
    assert_eq!(manifest.dim, 3);
    assert_eq!(manifest.checksum, vectors_checksum(index.vectors()));
    assert_eq!(read_manifest(&path).unwrap(), manifest);

    let loaded = load(&path, MODEL, 3).await.unwrap();
    assert_eq!(loaded.segments(), index.segments());
    assert_eq!(loaded.vectors(), index.vectors());

    let query = [0.6, 0.8, 0.0];
    assert_eq!(loaded.search(&query, 3).unwrap(), index.search(&query, 3).unwrap());
}

#[tokio::test]
async fn saving_replaces_previous_store_and_leaves_no_staging() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("store");
    save(&sample_index(), MODEL, &path).await.unwrap();

    let smaller = VectorIndex::from_parts(vec![vec![0.0, 0.0, 1.0]], vec![Segment::new("beamforming")]).unwrap();
    save(&smaller, MODEL, &path).await.unwrap();

    let loaded = load(&path, MODEL, 3).await.unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded.segments()[0].text, "beamforming");

    let entries: Vec<_> = fs::read_dir(tmp.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("store")]);
}

#[tokio::test]
async fn saving_empty_index_fails() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("store");
    assert!(matches!(save(&VectorIndex::new(), MODEL, &path).await, Err(Error::EmptyIndex)));
    assert!(!path.exists());
}

#[tokio::test]
async fn loading_missing_store_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("nowhere");
    assert!(matches!(load(&path, MODEL, 3).await, Err(Error::StoreNotFound(p)) if p == path));
}

#[tokio::test]
async fn loading_with_another_model_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("store");
    save(&sample_index(), MODEL, &path).await.unwrap();

    assert!(matches!(load(&path, "other:d3", 3).await, Err(Error::ModelMismatch { .. })));
    assert!(matches!(load(&path, MODEL, 4).await, Err(Error::ModelMismatch { .. })));
}

#[tokio::test]
async fn damaged_stores_are_reported_corrupt() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("store");
    save(&sample_index(), MODEL, &path).await.unwrap();

    rewrite_manifest(&path, |m| m.checksum = "0".repeat(64));
    assert!(matches!(load(&path, MODEL, 3).await, Err(Error::StoreCorrupt { .. })));

    save(&sample_index(), MODEL, &path).await.unwrap();
    rewrite_manifest(&path, |m| m.count = 5);
    assert!(matches!(load(&path, MODEL, 3).await, Err(Error::StoreCorrupt { .. })));

    fs::write(path.join(MANIFEST_FILE), b"{ not json").unwrap();
    assert!(matches!(load(&path, MODEL, 3).await, Err(Error::StoreCorrupt { .. })));

    fs::remove_file(path.join(MANIFEST_FILE)).unwrap();
    assert!(matches!(load(&path, MODEL, 3).await, Err(Error::StoreCorrupt { .. })));
}

#[tokio::test]
async fn store_without_table_is_corrupt() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("store");
    save(&sample_index(), MODEL, &path).await.unwrap();
    for entry in fs::read_dir(&path).unwrap() {
        let entry = entry.unwrap();
        if entry.file_type().unwrap().is_dir() {
            fs::remove_dir_all(entry.path()).unwrap();
        }
    }
    assert!(matches!(load(&path, MODEL, 3).await, Err(Error::StoreCorrupt { .. })));
}

#[tokio::test]
async fn clear_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("store");
    save(&sample_index(), MODEL, &path).await.unwrap();

    assert!(clear(&path).unwrap());
    assert!(!path.exists());
    assert!(!clear(&path).unwrap());
    assert!(matches!(load(&path, MODEL, 3).await, Err(Error::StoreNotFound(_))));
}
