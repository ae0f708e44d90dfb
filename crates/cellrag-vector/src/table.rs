//! LanceDB connection and table helpers for the `segments` table.

use std::path::Path;

use anyhow::{anyhow, Result};
use arrow_array::{Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection};

use crate::schema::{METADATA_COL, ORDINAL_COL, TEXT_COL, VECTOR_COL};

pub const SEGMENTS_TABLE: &str = "segments";

/// One persisted index entry as read back from disk, metadata still JSON-encoded.
#[derive(Debug, Clone)]
pub struct StoredRow {
    pub ordinal: i64,
    pub text: String,
    pub metadata: String,
    pub vector: Vec<f32>,
}

pub async fn open_db(path: &Path) -> Result<Connection> {
    Ok(connect(path.to_string_lossy().as_ref()).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let names = conn.table_names().execute().await?;
    Ok(names.iter().any(|n| n == name))
}

pub async fn create_segments_table(conn: &Connection, batch: RecordBatch) -> Result<()> {
    let schema = batch.schema();
    let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
    conn.create_table(SEGMENTS_TABLE, reader).execute().await?;
    Ok(())
}

/// Every row of the `segments` table, in storage order.
pub async fn read_segments(conn: &Connection) -> Result<Vec<StoredRow>> {
    let table = conn.open_table(SEGMENTS_TABLE).execute().await?;
    let total = table.count_rows(None).await?;
    let batches: Vec<RecordBatch> = table.query().limit(total.max(1)).execute().await?.try_collect().await?;

    let mut rows = Vec::with_capacity(total);
    for batch in &batches {
        let ordinals = column::<Int64Array>(batch, ORDINAL_COL)?;
        let texts = column::<StringArray>(batch, TEXT_COL)?;
        let metadata = column::<StringArray>(batch, METADATA_COL)?;
        let vectors = column::<FixedSizeListArray>(batch, VECTOR_COL)?;
        for i in 0..batch.num_rows() {
            if vectors.is_null(i) {
                return Err(anyhow!("row {} has no vector", ordinals.value(i)));
            }
            let list = vectors.value(i);
            let values = list
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| anyhow!("vector column is not float32"))?;
            rows.push(StoredRow {
                ordinal: ordinals.value(i),
                text: texts.value(i).to_string(),
                metadata: metadata.value(i).to_string(),
                vector: values.values().to_vec(),
            });
        }
    }
    Ok(rows)
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| anyhow!("{} column missing or mistyped", name))
}
