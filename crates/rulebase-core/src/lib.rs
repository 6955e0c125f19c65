//! Shared domain model for the rulebase workspace: chunk and scope types,
//! the layout-driven hierarchical chunker, the sequential splitter for
//! unstructured text, configuration, and the traits the storage and
//! retrieval crates implement.

pub mod chunker;
pub mod classify;
pub mod config;
pub mod error;
pub mod layout;
pub mod sequential;
pub mod traits;
pub mod types;

pub use chunker::{ChunkLabels, ChunkingState, HierarchicalChunker};
pub use error::Error;
pub use types::{Chunk, ChunkMetadata, ContentType, DocType, ScopeKey, SearchHit, SearchResult, Shard};
