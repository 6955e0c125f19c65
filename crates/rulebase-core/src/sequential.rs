//! Sequential chunking for unstructured text (local rule appendices).
//!
//! Recursive character splitting: split on the coarsest separator present,
//! merge neighbouring pieces up to `chunk_size` characters, recurse with finer
//! separators into pieces that are still too long, and seed each new chunk
//! with up to `chunk_overlap` characters from the end of the previous one.

use std::collections::VecDeque;

use crate::error::Error;
use crate::types::{Chunk, ChunkMetadata, ContentType, DocType};

pub const DEFAULT_SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

#[derive(Debug, Clone)]
pub struct SplitterConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self { Self { chunk_size: 1000, chunk_overlap: 200 } }
}

#[derive(Debug, Clone)]
pub struct SequentialSplitter {
    config: SplitterConfig,
    separators: Vec<String>,
}

fn char_len(s: &str) -> usize { s.chars().count() }

/// Strip NUL bytes and surrounding whitespace.
pub fn clean_text(text: &str) -> String { text.replace('\0', "").trim().to_string() }

impl SequentialSplitter {
    pub fn new(config: SplitterConfig) -> crate::error::Result<Self> {
        if config.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be positive".into()));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        Ok(Self { config, separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect() })
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        let text = clean_text(text);
        if text.is_empty() {
            return Vec::new();
        }
        self.split_with(&text, &self.separators)
    }

    /// Chunk a whole document, stamping local-rule metadata on every piece.
    pub fn chunk_document(&self, text: &str, variant: &str, source: &str, country: Option<&str>) -> Vec<Chunk> {
        self.split_text(text)
            .into_iter()
            .map(|content| Chunk {
                content,
                metadata: ChunkMetadata {
                    content_type: ContentType::Body,
                    variant: variant.to_string(),
                    source: source.to_string(),
                    country: country.map(str::to_string),
                    doc_type: country.map(|_| DocType::Local),
                    ..ChunkMetadata::default()
                },
            })
            .collect()
    }

    fn split_with(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = "";
        let mut finer: &[String] = &[];
        for (i, s) in separators.iter().enumerate() {
            if s.is_empty() || text.contains(s.as_str()) {
                separator = s.as_str();
                finer = &separators[i + 1..];
                break;
            }
        }

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|p| !p.is_empty()).collect()
        };

        let mut out = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();
        for piece in pieces {
            if char_len(piece) < self.config.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                out.extend(self.merge(&fitting, separator));
                fitting.clear();
            }
            if finer.is_empty() {
                out.push(piece.to_string());
            } else {
                out.extend(self.split_with(piece, finer));
            }
        }
        if !fitting.is_empty() {
            out.extend(self.merge(&fitting, separator));
        }
        out
    }

    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut docs = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            let joiner = if window.is_empty() { 0 } else { sep_len };
            if total + len + joiner > self.config.chunk_size && !window.is_empty() {
                if let Some(doc) = join_window(&window, separator) {
                    docs.push(doc);
                }
                // shrink to the overlap, and until the next piece fits
                loop {
                    let joiner = if window.is_empty() { 0 } else { sep_len };
                    let over_overlap = total > self.config.chunk_overlap;
                    let next_overflows = total > 0 && total + len + joiner > self.config.chunk_size;
                    if !(over_overlap || next_overflows) {
                        break;
                    }
                    let Some(front) = window.pop_front() else { break };
                    let trailing = if window.is_empty() { 0 } else { sep_len };
                    total -= char_len(front) + trailing;
                }
            }
            let joiner = if window.is_empty() { 0 } else { sep_len };
            window.push_back(piece);
            total += len + joiner;
        }
        if let Some(doc) = join_window(&window, separator) {
            docs.push(doc);
        }
        docs
    }
}

fn join_window(window: &VecDeque<&str>, separator: &str) -> Option<String> {
    let joined = window.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
}
