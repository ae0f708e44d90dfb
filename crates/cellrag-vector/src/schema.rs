use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::types::Float32Type;
use arrow_array::{FixedSizeListArray, Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};

use crate::index::VectorIndex;

pub const ORDINAL_COL: &str = "ordinal";
pub const TEXT_COL: &str = "text";
pub const METADATA_COL: &str = "metadata";
pub const VECTOR_COL: &str = "vector";

/// Columns of the persisted `segments` table. Metadata is stored as a JSON object string.
pub fn build_segment_schema(dim: usize) -> Result<Arc<Schema>> {
    let width = list_width(dim)?;
    Ok(Arc::new(Schema::new(vec![
        Field::new(ORDINAL_COL, DataType::Int64, false),
        Field::new(TEXT_COL, DataType::Utf8, false),
        Field::new(METADATA_COL, DataType::Utf8, false),
        Field::new(
            VECTOR_COL,
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), width),
            true,
        ),
    ])))
}

/// One record batch holding every entry of `index`, ordinals in insertion order.
pub fn index_to_record_batch(index: &VectorIndex, dim: usize) -> Result<RecordBatch> {
    let schema = build_segment_schema(dim)?;
    let mut ordinals = Vec::with_capacity(index.len());
    let mut texts = Vec::with_capacity(index.len());
    let mut metadata = Vec::with_capacity(index.len());
    let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(index.len());
    for (i, (segment, vector)) in index.segments().iter().zip(index.vectors()).enumerate() {
        ordinals.push(i64::try_from(i)?);
        texts.push(segment.text.as_str());
        metadata.push(serde_json::to_string(&segment.metadata)?);
        vectors.push(Some(vector.iter().map(|&x| Some(x)).collect()));
    }
    let width = list_width(dim)?;
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(ordinals)),
            Arc::new(StringArray::from(texts)),
            Arc::new(StringArray::from(metadata)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, width)),
        ],
    )?;
    Ok(batch)
}

fn list_width(dim: usize) -> Result<i32> {
    i32::try_from(dim).context("vector dimension does not fit an Arrow list size")
}
