//! File loaders keyed by extension.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::traits::DocumentLoader;
use crate::types::{RawDocument, PAGE_KEY, SOURCE_KEY, TOTAL_PAGES_KEY};

/// Plain text: the whole file becomes one document.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextLoader;

impl DocumentLoader for TextLoader {
    fn load(&self, path: &Path) -> Result<Vec<RawDocument>> {
        let bytes = fs::read(path)?;
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        };
        Ok(vec![RawDocument::new(text).with_meta(SOURCE_KEY, path.to_string_lossy().as_ref())])
    }
}

/// PDF: one document per page, carrying `page` (0-based) and `total_pages`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfLoader;

impl DocumentLoader for PdfLoader {
    fn load(&self, path: &Path) -> Result<Vec<RawDocument>> {
        let source = path.to_string_lossy().to_string();
        let malformed = |reason: String| Error::MalformedDocument { path: source.clone(), reason };

        let doc = lopdf::Document::load(path).map_err(|e| malformed(e.to_string()))?;
        let pages = doc.get_pages();
        let total_pages = pages.len();
        let mut documents = Vec::with_capacity(total_pages);
        for (page_index, page_number) in pages.keys().enumerate() {
            let text = doc
                .extract_text(&[*page_number])
                .map_err(|e| malformed(format!("page {page_number}: {e}")))?;
            documents.push(
                RawDocument::new(text)
                    .with_meta(SOURCE_KEY, source.as_str())
                    .with_meta(PAGE_KEY, page_index)
                    .with_meta(TOTAL_PAGES_KEY, total_pages),
            );
        }
        debug!("Loaded {} pages from {}", total_pages, source);
        Ok(documents)
    }
}

/// Lower-cased extension of `path`, or an empty string when there is none.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}
