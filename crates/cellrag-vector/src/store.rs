//! On-disk persistence for [`VectorIndex`].
//!
//! A store is a directory holding a LanceDB database with one `segments`
//! table plus `manifest.json`. Saves are staged in a sibling temp directory
//! and renamed into place, so an interrupted save leaves the previous store
//! untouched.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use cellrag_core::error::{Error, Result};
use cellrag_core::types::{Metadata, Segment};

use crate::index::VectorIndex;
use crate::schema::index_to_record_batch;
use crate::table::{create_segments_table, open_db, read_segments, table_exists, SEGMENTS_TABLE};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreManifest {
    pub format_version: u32,
    pub model_id: String,
    pub dim: usize,
    pub count: usize,
    /// blake3 over every vector component (little-endian f32) in ordinal order.
    pub checksum: String,
    pub saved_at: DateTime<Utc>,
}

/// Persist `index` to `path`, replacing any store already there.
pub async fn save(index: &VectorIndex, model_id: &str, path: &Path) -> Result<StoreManifest> {
    let Some(dim) = index.dim().filter(|_| !index.is_empty()) else {
        return Err(Error::EmptyIndex);
    };
    let parent = parent_dir(path);
    fs::create_dir_all(&parent)?;
    let staging = tempfile::Builder::new().prefix(".cellrag-staging-").tempdir_in(&parent)?;

    let batch = index_to_record_batch(index, dim).map_err(storage)?;
    let conn = open_db(staging.path()).await.map_err(storage)?;
    create_segments_table(&conn, batch).await.map_err(storage)?;
    drop(conn);

    let manifest = StoreManifest {
        format_version: FORMAT_VERSION,
        model_id: model_id.to_string(),
        dim,
        count: index.len(),
        checksum: vectors_checksum(index.vectors()),
        saved_at: Utc::now(),
    };
    let manifest_json = serde_json::to_vec_pretty(&manifest).map_err(storage)?;
    fs::write(staging.path().join(MANIFEST_FILE), manifest_json)?;

    swap_into_place(staging.path(), path, &parent)?;
    info!("Saved {} vectors (dim {}, model {}) to {}", manifest.count, dim, model_id, path.display());
    Ok(manifest)
}

/// Read the store at `path`, checking it was written by `model_id` at `dim`.
pub async fn load(path: &Path, model_id: &str, dim: usize) -> Result<VectorIndex> {
    let manifest = read_manifest(path)?;
    if manifest.format_version != FORMAT_VERSION {
        return Err(Error::corrupt(path, format!("unsupported format version {}", manifest.format_version)));
    }
    if manifest.model_id != model_id || manifest.dim != dim {
        return Err(Error::ModelMismatch {
            path: path.to_path_buf(),
            stored: format!("{} (dim {})", manifest.model_id, manifest.dim),
            active: format!("{} (dim {})", model_id, dim),
        });
    }

    let corrupt = |e: anyhow::Error| Error::corrupt(path, format!("{e:#}"));
    let conn = open_db(path).await.map_err(corrupt)?;
    if !table_exists(&conn, SEGMENTS_TABLE).await.map_err(corrupt)? {
        return Err(Error::corrupt(path, "segments table missing"));
    }
    let mut rows = read_segments(&conn).await.map_err(corrupt)?;
    if rows.len() != manifest.count {
        return Err(Error::corrupt(path, format!("manifest lists {} entries, table has {}", manifest.count, rows.len())));
    }
    rows.sort_by_key(|r| r.ordinal);

    let mut vectors = Vec::with_capacity(rows.len());
    let mut segments = Vec::with_capacity(rows.len());
    for (expected, row) in rows.into_iter().enumerate() {
        if usize::try_from(row.ordinal).ok() != Some(expected) {
            return Err(Error::corrupt(path, format!("ordinal {} out of sequence", row.ordinal)));
        }
        if row.vector.len() != manifest.dim {
            return Err(Error::corrupt(path, format!("entry {} has dim {}", expected, row.vector.len())));
        }
        let metadata: Metadata = serde_json::from_str(&row.metadata)
            .map_err(|e| Error::corrupt(path, format!("entry {expected} metadata: {e}")))?;
        vectors.push(row.vector);
        segments.push(Segment { text: row.text, metadata });
    }
    if vectors_checksum(&vectors) != manifest.checksum {
        return Err(Error::corrupt(path, "vector checksum mismatch"));
    }

    let index = VectorIndex::from_parts(vectors, segments).map_err(|e| Error::corrupt(path, e.to_string()))?;
    info!("Loaded {} vectors from {}", index.len(), path.display());
    Ok(index)
}

/// Remove the store at `path`. Returns `false` when there was nothing to remove.
pub fn clear(path: &Path) -> Result<bool> {
    if !path.exists() {
        debug!("No vector store at {}; nothing to clear", path.display());
        return Ok(false);
    }
    if path.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    info!("Cleared vector store at {}", path.display());
    Ok(true)
}

pub fn read_manifest(path: &Path) -> Result<StoreManifest> {
    if !path.exists() {
        return Err(Error::StoreNotFound(path.to_path_buf()));
    }
    let manifest_path = path.join(MANIFEST_FILE);
    let raw = fs::read(&manifest_path).map_err(|e| Error::corrupt(path, format!("{MANIFEST_FILE}: {e}")))?;
    serde_json::from_slice(&raw).map_err(|e| Error::corrupt(path, format!("{MANIFEST_FILE}: {e}")))
}

pub fn vectors_checksum(vectors: &[Vec<f32>]) -> String {
    let mut hasher = blake3::Hasher::new();
    for v in vectors {
        for x in v {
            hasher.update(&x.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}

/// Move `staged` to `target`. An existing store is parked beside it first and
/// put back if the final rename fails.
fn swap_into_place(staged: &Path, target: &Path, parent: &Path) -> Result<()> {
    if !target.exists() {
        fs::rename(staged, target)?;
        return Ok(());
    }
    let staged_name = staged.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    let parked = parent.join(format!("{staged_name}.old"));
    fs::rename(target, &parked)?;
    if let Err(e) = fs::rename(staged, target) {
        warn!("Could not move new store into {}: {}; restoring previous store", target.display(), e);
        fs::rename(&parked, target)?;
        return Err(e.into());
    }
    if let Err(e) = fs::remove_dir_all(&parked) {
        warn!("Could not remove previous store at {}: {}", parked.display(), e);
    }
    Ok(())
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn storage(e: impl std::fmt::Display) -> Error { Error::Storage(e.to_string()) }
