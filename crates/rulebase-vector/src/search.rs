use anyhow::Result;
use arrow_array::{Array, Float32Array};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::DistanceType;

use rulebase_core::error::Error;
use rulebase_core::traits::VectorSearch;
use rulebase_core::types::{ScopeKey, SearchHit, SourceKind};

use crate::schema::{batch_to_chunks, C_DISTANCE, ROW_COLUMNS};
use crate::writer::{scope_filter, LanceDbIndexer};

impl LanceDbIndexer {
	/// Cosine nearest neighbours, filtered to one scope before ranking.
	/// `score` is `1 - distance`.
	pub async fn search_scope(&self, scope: &ScopeKey, query_vec: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
		if query_vec.len() != self.dim {
			return Err(Error::DimensionMismatch { expected: self.dim, actual: query_vec.len() }.into());
		}
		if limit == 0 {
			return Ok(Vec::new());
		}
		let mut stream = self
			.table
			.vector_search(query_vec.to_vec())?
			.only_if(scope_filter(scope))
			.distance_type(DistanceType::Cosine)
			.select(Select::columns(&ROW_COLUMNS))
			.limit(limit)
			.execute()
			.await?;

		let mut hits = Vec::new();
		while let Some(batch) = stream.try_next().await? {
			let distances = batch.column_by_name(C_DISTANCE).and_then(|c| c.as_any().downcast_ref::<Float32Array>());
			for (i, (id, chunk)) in batch_to_chunks(&batch)?.into_iter().enumerate() {
				let score = match distances {
					Some(d) if d.is_valid(i) => 1.0 - d.value(i),
					_ => 0.0,
				};
				hits.push(SearchHit { id, score, source: SourceKind::Vector, chunk });
			}
		}
		hits.truncate(limit);
		Ok(hits)
	}
}

impl VectorSearch for LanceDbIndexer {
	async fn search_vector(&self, scope: &ScopeKey, query_vec: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
		self.search_scope(scope, query_vec, limit).await
	}
}
