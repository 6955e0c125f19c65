//! Hierarchical chunker for layout-analysed rulebooks.
//!
//! Blocks are fed one at a time, in reading order, through
//! [`ChunkingState::step`]. The state tracks the current rule, chapter,
//! section and content type and accumulates body text; a chunk is emitted
//! whenever that context changes, and once more at the end of the stream.

use tracing::debug;

use crate::classify::{self, BlockKind};
use crate::layout::sort_blocks;
use crate::types::{Chunk, ChunkMetadata, ContentType, DocType, Shard, NOT_APPLICABLE};

pub const FRONT_MATTER: &str = "Front Matter";
pub const GENERAL: &str = "General";

/// Accumulations at or below this many characters do not get their own chunk
/// when a rule header arrives; they are carried into the new rule instead.
pub const MIN_RULE_FLUSH_LEN: usize = 20;

/// Labels stamped on every chunk of one chunking pass.
#[derive(Debug, Clone)]
pub struct ChunkLabels {
    pub variant: String,
    pub source: String,
    pub doc_type: Option<DocType>,
}

impl ChunkLabels {
    pub fn new(variant: impl Into<String>, source: impl Into<String>) -> Self {
        Self { variant: variant.into(), source: source.into(), doc_type: None }
    }

    pub fn with_doc_type(mut self, doc_type: DocType) -> Self {
        self.doc_type = Some(doc_type);
        self
    }
}

/// One block as the state machine sees it.
#[derive(Debug, Clone, Copy)]
pub struct BlockInput<'a> {
    pub text: &'a str,
    pub page: u32,
    pub content_type: ContentType,
    /// Lowest edge of the block; `None` when geometry is missing.
    pub max_y: Option<f32>,
}

/// Context carried from block to block within one chunking pass. Owned by a
/// single pass and never shared.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkingState {
    pub current_rule: String,
    pub current_chapter: String,
    pub current_section: String,
    pub current_content_type: ContentType,
    pub pending_section_number: Option<String>,
    pub accumulated_text: String,
    pub last_page: Option<u32>,
}

impl Default for ChunkingState {
    fn default() -> Self {
        Self {
            current_rule: FRONT_MATTER.to_string(),
            current_chapter: GENERAL.to_string(),
            current_section: GENERAL.to_string(),
            current_content_type: ContentType::Body,
            pending_section_number: None,
            accumulated_text: String::new(),
            last_page: None,
        }
    }
}

impl ChunkingState {
    /// Pure transition: consume one block, return the next state and at most
    /// one emitted chunk.
    pub fn step(mut self, input: BlockInput<'_>, labels: &ChunkLabels) -> (Self, Option<Chunk>) {
        let emitted = self.apply(input, labels);
        (self, emitted)
    }

    /// End of stream: fold any pending number back into the text and flush.
    pub fn finish(mut self, labels: &ChunkLabels) -> Option<Chunk> {
        self.fold_pending();
        let page = self.last_page.unwrap_or(0);
        self.flush(page, labels)
    }

    fn apply(&mut self, input: BlockInput<'_>, labels: &ChunkLabels) -> Option<Chunk> {
        let mut emitted = None;

        // 1. content-type change: the outgoing accumulation keeps the outgoing type;
        // a pending number survives and is resolved against this block below
        if input.content_type != self.current_content_type {
            let page = self.last_page.unwrap_or(input.page);
            emitted = self.flush(page, labels);
            self.current_content_type = input.content_type;
        }

        let text = input.text.trim();
        if text.is_empty() {
            return emitted;
        }
        let accumulated_page = self.last_page.unwrap_or(input.page);
        self.last_page = Some(input.page);

        // 2. pending section number: either a title completes it or it was content
        if let Some(number) = self.pending_section_number.take() {
            if classify::is_short_title(text) {
                let flushed = self.flush(accumulated_page, labels);
                self.current_section = format!("{number} {text}");
                return emitted.or(flushed);
            }
            self.accumulated_text.push_str(&number);
            self.accumulated_text.push('\n');
        }

        // a step emits at most one chunk; after a content-type flush the only
        // possible residue is a folded number, which then opens the new context
        let may_flush = emitted.is_none();
        let in_zone = classify::in_content_zone(input.max_y);
        let flushed = match classify::classify(text, in_zone) {
            BlockKind::Chapter => {
                let flushed = if may_flush { self.flush(input.page, labels) } else { None };
                self.current_chapter = text.to_string();
                self.current_rule = GENERAL.to_string();
                flushed
            }
            BlockKind::Section => {
                let flushed = if may_flush { self.flush(input.page, labels) } else { None };
                self.current_section = text.to_string();
                self.current_rule = GENERAL.to_string();
                flushed
            }
            BlockKind::RuleHeader(token) => {
                let flushed = if may_flush && self.accumulated_text.chars().count() > MIN_RULE_FLUSH_LEN {
                    self.flush(input.page, labels)
                } else {
                    None
                };
                self.current_rule = token;
                // a short residue (e.g. a folded page number) stays ahead of the header
                self.accumulated_text.push_str(text);
                self.accumulated_text.push(' ');
                flushed
            }
            BlockKind::NumericToken => {
                self.pending_section_number = Some(text.to_string());
                None
            }
            BlockKind::Body => {
                self.accumulated_text.push_str(text);
                self.accumulated_text.push('\n');
                None
            }
        };
        emitted.or(flushed)
    }

    fn fold_pending(&mut self) {
        if let Some(number) = self.pending_section_number.take() {
            self.accumulated_text.push_str(&number);
            self.accumulated_text.push('\n');
        }
    }

    fn flush(&mut self, page: u32, labels: &ChunkLabels) -> Option<Chunk> {
        let content = std::mem::take(&mut self.accumulated_text);
        let content = content.trim();
        if content.is_empty() {
            return None;
        }
        let body = self.current_content_type == ContentType::Body;
        let label = |value: &str| if body { value.to_string() } else { NOT_APPLICABLE.to_string() };
        Some(Chunk {
            content: content.to_string(),
            metadata: ChunkMetadata {
                rule: Some(label(&self.current_rule)),
                chapter: Some(self.current_chapter.clone()),
                section: Some(label(&self.current_section)),
                content_type: self.current_content_type,
                page: Some(page),
                variant: labels.variant.clone(),
                source: labels.source.clone(),
                country: None,
                doc_type: labels.doc_type,
            },
        })
    }
}

/// Drives [`ChunkingState`] over shards: per page, blocks are put in reading
/// order and stepped through one state threaded across all pages and shards.
#[derive(Debug, Clone)]
pub struct HierarchicalChunker {
    labels: ChunkLabels,
}

impl HierarchicalChunker {
    pub fn new(labels: ChunkLabels) -> Self { Self { labels } }

    pub fn labels(&self) -> &ChunkLabels { &self.labels }

    pub fn chunk_shard(&self, shard: &Shard) -> Vec<Chunk> { self.chunk_shards(std::slice::from_ref(shard)) }

    pub fn chunk_shards(&self, shards: &[Shard]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut state = ChunkingState::default();
        for shard in shards {
            for page in &shard.pages {
                let content_type = page.content_type.unwrap_or_default();
                for block in sort_blocks(&page.blocks) {
                    let text = shard.resolve(&block.text);
                    let input = BlockInput { text: &text, page: page.page_number, content_type, max_y: block.max_y() };
                    let (next, emitted) = state.step(input, &self.labels);
                    state = next;
                    chunks.extend(emitted);
                }
            }
        }
        chunks.extend(state.finish(&self.labels));
        debug!(variant = %self.labels.variant, shards = shards.len(), chunks = chunks.len(), "hierarchical chunking done");
        chunks
    }
}
