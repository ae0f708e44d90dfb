//! Domain types shared by the chunker, the index and the persistence layer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const SOURCE_KEY: &str = "source";
pub const PAGE_KEY: &str = "page";
pub const TOTAL_PAGES_KEY: &str = "total_pages";

/// Provenance attached to documents and inherited by their segments.
/// Ordered so persisted JSON is stable across runs.
pub type Metadata = BTreeMap<String, MetaValue>;

/// A scalar metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl MetaValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(v: &str) -> Self { Self::Text(v.to_string()) }
}

impl From<String> for MetaValue {
    fn from(v: String) -> Self { Self::Text(v) }
}

impl From<i64> for MetaValue {
    fn from(v: i64) -> Self { Self::Int(v) }
}

impl From<usize> for MetaValue {
    fn from(v: usize) -> Self { Self::Int(i64::try_from(v).unwrap_or(i64::MAX)) }
}

impl From<f64> for MetaValue {
    fn from(v: f64) -> Self { Self::Float(v) }
}

impl From<bool> for MetaValue {
    fn from(v: bool) -> Self { Self::Bool(v) }
}

/// A loaded document before chunking.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawDocument {
    pub text: String,
    pub metadata: Metadata,
}

impl RawDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), metadata: Metadata::new() }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<MetaValue>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// A unit of retrievable text.
///
/// - `text`: non-empty chunk content, normally at most `chunk_size` characters
/// - `metadata`: the source document's metadata, copied unchanged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    pub metadata: Metadata,
}

impl Segment {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), metadata: Metadata::new() }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<MetaValue>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).and_then(MetaValue::as_str)
    }

    pub fn page(&self) -> Option<i64> {
        self.metadata.get(PAGE_KEY).and_then(MetaValue::as_i64)
    }
}

/// A search hit. `score` is cosine similarity; higher is better.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredSegment {
    pub segment: Segment,
    pub score: f32,
}

/// Provenance summary reported back to the caller after ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub source: String,
    pub page: Option<i64>,
    pub total_pages: Option<i64>,
}

impl From<&Segment> for SourceSummary {
    fn from(segment: &Segment) -> Self {
        Self {
            source: segment.source().unwrap_or("Unknown").to_string(),
            page: segment.page(),
            total_pages: segment.metadata.get(TOTAL_PAGES_KEY).and_then(MetaValue::as_i64),
        }
    }
}
