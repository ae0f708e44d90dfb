//! Recursive character splitter.
//!
//! Text is cut on the coarsest separator present (paragraph, line, sentence,
//! word, then single characters). Pieces that still exceed `chunk_size` are
//! split again with the next separator; the resulting pieces are merged back
//! into windows of at most `chunk_size` characters that overlap by up to
//! `chunk_overlap` characters.
//!
//! Chunks are tracked as byte ranges into the source text, so every segment is
//! a verbatim (whitespace-trimmed) slice of its document.

use std::collections::VecDeque;
use std::ops::Range;

use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{RawDocument, Segment};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

const SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self { chunk_size: DEFAULT_CHUNK_SIZE, chunk_overlap: DEFAULT_CHUNK_OVERLAP }
    }
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be greater than zero".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, chunk_overlap })
    }

    pub fn chunk_size(&self) -> usize { self.chunk_size }
    pub fn chunk_overlap(&self) -> usize { self.chunk_overlap }

    /// Split each document; segments inherit the document metadata unchanged.
    pub fn split_documents(&self, documents: &[RawDocument]) -> Vec<Segment> {
        let mut segments = Vec::new();
        for doc in documents {
            for text in self.split_text(&doc.text) {
                segments.push(Segment { text, metadata: doc.metadata.clone() });
            }
        }
        debug!("Split {} documents into {} segments", documents.len(), segments.len());
        segments
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_ranges(text).into_iter().map(|r| text[r].to_string()).collect()
    }

    /// Byte ranges of the chunks of `text`, in document order.
    pub fn split_ranges(&self, text: &str) -> Vec<Range<usize>> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        if char_len(text) <= self.chunk_size {
            return vec![0..text.len()];
        }
        let mut out = Vec::new();
        self.split_recursive(text, 0..text.len(), &SEPARATORS, &mut out);
        out
    }

    fn split_recursive(&self, text: &str, range: Range<usize>, separators: &[&str], out: &mut Vec<Range<usize>>) {
        let slice = &text[range.clone()];
        let pos = separators
            .iter()
            .position(|sep| sep.is_empty() || slice.contains(sep))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(pos).copied().unwrap_or("");
        let remaining = separators.get(pos + 1..).unwrap_or(&[]);

        let mut fitting: Vec<Range<usize>> = Vec::new();
        for piece in split_after(slice, separator, range.start) {
            if char_len(&text[piece.clone()]) <= self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                self.merge(text, &fitting, out);
                fitting.clear();
            }
            if remaining.is_empty() {
                // Cannot be cut further without breaking a character.
                push_trimmed(text, piece, out);
            } else {
                self.split_recursive(text, piece, remaining, out);
            }
        }
        if !fitting.is_empty() {
            self.merge(text, &fitting, out);
        }
    }

    /// Greedily packs consecutive pieces into windows, keeping up to
    /// `chunk_overlap` characters of the previous window at the front of the next.
    fn merge(&self, text: &str, pieces: &[Range<usize>], out: &mut Vec<Range<usize>>) {
        let mut window: VecDeque<(Range<usize>, usize)> = VecDeque::new();
        let mut total = 0usize;
        for piece in pieces {
            let len = char_len(&text[piece.clone()]);
            if total + len > self.chunk_size && !window.is_empty() {
                emit_window(text, &window, out);
                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some((_, popped)) => total -= popped,
                        None => break,
                    }
                }
            }
            window.push_back((piece.clone(), len));
            total += len;
        }
        emit_window(text, &window, out);
    }
}

fn emit_window(text: &str, window: &VecDeque<(Range<usize>, usize)>, out: &mut Vec<Range<usize>>) {
    if let (Some((first, _)), Some((last, _))) = (window.front(), window.back()) {
        push_trimmed(text, first.start..last.end, out);
    }
}

fn push_trimmed(text: &str, range: Range<usize>, out: &mut Vec<Range<usize>>) {
    let slice = &text[range.clone()];
    let trimmed_start = slice.len() - slice.trim_start().len();
    let trimmed_end = slice.trim_end().len();
    if trimmed_start >= trimmed_end {
        return;
    }
    let trimmed = range.start + trimmed_start..range.start + trimmed_end;
    if out.last() != Some(&trimmed) {
        out.push(trimmed);
    }
}

/// Splits `slice` into contiguous pieces, each ending with its separator.
/// An empty separator yields one piece per character.
fn split_after(slice: &str, separator: &str, offset: usize) -> Vec<Range<usize>> {
    if separator.is_empty() {
        return slice
            .char_indices()
            .map(|(i, c)| offset + i..offset + i + c.len_utf8())
            .collect();
    }
    let mut pieces = Vec::new();
    let mut start = 0usize;
    for (i, _) in slice.match_indices(separator) {
        let end = i + separator.len();
        if end > start {
            pieces.push(offset + start..offset + end);
        }
        start = end;
    }
    if start < slice.len() {
        pieces.push(offset + start..offset + slice.len());
    }
    pieces
}

fn char_len(s: &str) -> usize { s.chars().count() }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_after_keeps_separator_on_left_piece() {
        let pieces: Vec<&str> = split_after("a b  c", " ", 0).into_iter().map(|r| &"a b  c"[r]).collect();
        assert_eq!(pieces, vec!["a ", "b ", " ", "c"]);
    }

    #[test]
    fn split_after_empty_separator_is_per_char() {
        assert_eq!(split_after("héllo", "", 0).len(), 5);
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        assert!(matches!(TextSplitter::new(100, 100), Err(Error::InvalidConfig(_))));
        assert!(matches!(TextSplitter::new(0, 0), Err(Error::InvalidConfig(_))));
    }
}
