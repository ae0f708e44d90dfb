use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::loader::{extension_of, PdfLoader, TextLoader};
use crate::splitter::TextSplitter;
use crate::traits::DocumentLoader;
use crate::types::{RawDocument, Segment, SourceSummary};

/// Loads files through the loader registered for their extension and chunks
/// them with the configured splitter.
pub struct DocumentProcessor {
    loaders: BTreeMap<String, Box<dyn DocumentLoader>>,
    splitter: TextSplitter,
}

impl Default for DocumentProcessor {
    fn default() -> Self { Self::new(TextSplitter::default()) }
}

impl DocumentProcessor {
    /// Registers the built-in `txt` and `pdf` loaders.
    pub fn new(splitter: TextSplitter) -> Self {
        Self::empty(splitter).with_loader("txt", TextLoader).with_loader("pdf", PdfLoader)
    }

    /// A processor with no loaders registered.
    pub fn empty(splitter: TextSplitter) -> Self {
        Self { loaders: BTreeMap::new(), splitter }
    }

    pub fn with_loader(mut self, extension: &str, loader: impl DocumentLoader + 'static) -> Self {
        self.loaders.insert(extension.to_ascii_lowercase(), Box::new(loader));
        self
    }

    pub fn splitter(&self) -> &TextSplitter { &self.splitter }

    pub fn supported_extensions(&self) -> impl Iterator<Item = &str> {
        self.loaders.keys().map(String::as_str)
    }

    pub fn supports(&self, path: &Path) -> bool {
        self.loaders.contains_key(&extension_of(path))
    }

    pub fn load_document(&self, path: &Path) -> Result<Vec<RawDocument>> {
        let extension = extension_of(path);
        let loader = self.loaders.get(&extension).ok_or_else(|| Error::UnsupportedFormat(extension.clone()))?;
        loader.load(path)
    }

    pub fn process_documents(&self, documents: &[RawDocument]) -> Vec<Segment> {
        self.splitter.split_documents(documents)
    }

    /// Load and chunk every file in order. The first failure aborts the batch.
    pub fn ingest_and_process<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Vec<Segment>> {
        let mut segments = Vec::new();
        for path in paths {
            let path = path.as_ref();
            let documents = self.load_document(path)?;
            let processed = self.process_documents(&documents);
            debug!("{}: {} documents -> {} segments", path.display(), documents.len(), processed.len());
            segments.extend(processed);
        }
        info!("Processed {} files into {} segments", paths.len(), segments.len());
        Ok(segments)
    }

    /// Files under `root` with a supported extension, sorted for stable ingestion order.
    pub fn collect_files(&self, root: &Path) -> Vec<PathBuf> {
        if root.is_file() {
            return vec![root.to_path_buf()];
        }
        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| self.supports(p))
            .collect();
        files.sort();
        files
    }
}

pub fn document_metadata(segments: &[Segment]) -> Vec<SourceSummary> {
    segments.iter().map(SourceSummary::from).collect()
}
