//! Reciprocal Rank Fusion.
//!
//! Each list contributes `1 / (k + rank)` for a document at 1-based `rank`;
//! a document missing from a list gets nothing from it. Scores are summed and
//! the union is sorted best first.

use std::collections::HashMap;

use rulebase_core::config::RetrievalSettings;
use rulebase_core::types::{SearchHit, SearchResult};

pub const DEFAULT_RRF_K: f64 = 60.0;
pub const DEFAULT_CANDIDATE_BREADTH: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RrfParams {
    /// Smoothing constant.
    pub k: f64,
    /// Candidates requested from each engine.
    pub breadth: usize,
}

impl Default for RrfParams {
    fn default() -> Self { Self { k: DEFAULT_RRF_K, breadth: DEFAULT_CANDIDATE_BREADTH } }
}

impl From<&RetrievalSettings> for RrfParams {
    fn from(s: &RetrievalSettings) -> Self { Self { k: s.rrf_k, breadth: s.candidate_breadth } }
}

pub fn rrf_contribution(k: f64, rank: usize) -> f64 { 1.0 / (k + rank as f64) }

/// Fuse the vector and keyword lists (each best first) and keep the top `limit`.
///
/// Equal fused scores keep first-seen order: vector list first, then
/// keyword-only documents in keyword order. Repeated ids within one list only
/// count at their best rank.
pub fn fuse(vector: &[SearchHit], keyword: &[SearchHit], k: f64, limit: usize) -> Vec<SearchResult> {
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut fused: Vec<SearchResult> = Vec::new();

    for (list, is_vector) in [(vector, true), (keyword, false)] {
        for (i, hit) in list.iter().enumerate() {
            let rank = i + 1;
            let idx = *slots.entry(hit.id.as_str()).or_insert_with(|| {
                fused.push(SearchResult {
                    id: hit.id.clone(),
                    content: hit.chunk.content.clone(),
                    metadata: hit.chunk.metadata.clone(),
                    fused_score: 0.0,
                    vector_rank: None,
                    keyword_rank: None,
                });
                fused.len() - 1
            });
            let entry = &mut fused[idx];
            let slot = if is_vector { &mut entry.vector_rank } else { &mut entry.keyword_rank };
            if slot.is_none() {
                *slot = Some(rank);
                entry.fused_score += rrf_contribution(k, rank);
            }
        }
    }

    // stable: ties stay in first-seen order
    fused.sort_by(|a, b| b.fused_score.total_cmp(&a.fused_score));
    fused.truncate(limit);
    fused
}
