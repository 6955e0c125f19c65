//! Scoped hybrid retrieval over the rulebase stores.
//!
//! [`ScopedStore`] keeps the vector table and the keyword index in step;
//! [`HybridRetriever`] fuses both for one scope with RRF; [`DualPathPipeline`]
//! combines the official and a local scope; [`Ingestor`] feeds the store.

pub mod ingest;
pub mod pipeline;
pub mod retriever;
pub mod rrf;
pub mod store;

pub use ingest::{IngestMode, IngestRequest, IngestSource, Ingestor};
pub use pipeline::{DualPathPipeline, DualPathResults, PassthroughReranker};
pub use retriever::{Degradation, HybridResults, HybridRetriever};
pub use rrf::{fuse, rrf_contribution, RrfParams};
pub use store::ScopedStore;
