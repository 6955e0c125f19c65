use anyhow::{bail, Result};
use arrow_array::{Array, RecordBatchIterator, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{Connection, Table};
use std::collections::BTreeSet;
use tracing::{debug, info};

use rulebase_core::error::Error;
use rulebase_core::types::{Chunk, ScopeKey};

use crate::schema::{batch_to_chunks, rows_to_record_batch, ChunkRow, C_COUNTRY, ROW_COLUMNS};
use crate::table::{ensure_scalar_indexes, ensure_table, open_db};

/// Quote a string literal for a lance SQL filter.
pub(crate) fn sql_literal(value: &str) -> String { format!("'{}'", value.replace('\'', "''")) }

/// Filter selecting exactly the rows of one scope.
pub fn scope_filter(scope: &ScopeKey) -> String {
	match scope.country() {
		Some(country) => format!("variant = {} AND country = {}", sql_literal(scope.variant()), sql_literal(country)),
		None => format!("variant = {} AND country IS NULL", sql_literal(scope.variant())),
	}
}

/// Vector side of the scoped store: one lance table holding every scope.
pub struct LanceDbIndexer {
	pub(crate) db: Connection,
	pub(crate) table: Table,
	pub(crate) table_name: String,
	pub(crate) dim: usize,
}

impl LanceDbIndexer {
	pub async fn open(uri: &str, table_name: &str, dim: usize) -> Result<Self> {
		let db = open_db(uri).await?;
		let table = ensure_table(&db, table_name, dim).await?;
		Ok(Self { db, table, table_name: table_name.to_string(), dim })
	}

	pub fn dim(&self) -> usize { self.dim }

	pub fn table_name(&self) -> &str { &self.table_name }

	pub fn connection(&self) -> &Connection { &self.db }

	/// Write rows in one append. Vectors must match the table dimension.
	pub async fn insert(&self, ids: &[String], chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<usize> {
		if ids.len() != chunks.len() || chunks.len() != vectors.len() {
			bail!("ids ({}), chunks ({}) and vectors ({}) must have equal length", ids.len(), chunks.len(), vectors.len());
		}
		if chunks.is_empty() {
			return Ok(0);
		}
		if let Some(bad) = vectors.iter().find(|v| v.len() != self.dim) {
			return Err(Error::DimensionMismatch { expected: self.dim, actual: bad.len() }.into());
		}
		let scopes = chunks.iter().map(|c| c.metadata.scope()).collect::<rulebase_core::error::Result<Vec<_>>>()?;
		let rows: Vec<ChunkRow<'_>> = ids
			.iter()
			.zip(chunks)
			.zip(vectors)
			.zip(&scopes)
			.map(|(((id, chunk), vector), scope)| ChunkRow { id, chunk, country: scope.country(), vector })
			.collect();
		let record_batch = rows_to_record_batch(&rows, self.dim as i32)?;
		let schema = record_batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
		self.table.add(reader).execute().await?;
		debug!(count = rows.len(), table = %self.table_name, "Appended chunk rows");
		Ok(rows.len())
	}

	pub async fn delete_scope(&self, scope: &ScopeKey) -> Result<()> {
		self.table.delete(&scope_filter(scope)).await?;
		debug!(%scope, "Deleted scope from vector table");
		Ok(())
	}

	pub async fn count(&self, scope: &ScopeKey) -> Result<usize> {
		Ok(self.table.count_rows(Some(scope_filter(scope))).await?)
	}

	pub async fn exists(&self, scope: &ScopeKey) -> Result<bool> { Ok(self.count(scope).await? > 0) }

	pub async fn total_rows(&self) -> Result<usize> { Ok(self.table.count_rows(None).await?) }

	/// Country codes with local rules stored, optionally under one variant. Sorted, distinct.
	pub async fn list_countries(&self, variant: Option<&str>) -> Result<Vec<String>> {
		let filter = match variant {
			Some(v) => format!("variant = {} AND country IS NOT NULL", sql_literal(v)),
			None => "country IS NOT NULL".to_string(),
		};
		let mut stream = self.table.query().only_if(filter).select(Select::columns(&[C_COUNTRY])).execute().await?;
		let mut countries = BTreeSet::new();
		while let Some(batch) = stream.try_next().await? {
			let Some(col) = batch.column_by_name(C_COUNTRY).and_then(|c| c.as_any().downcast_ref::<StringArray>()) else {
				continue;
			};
			for i in 0..col.len() {
				if col.is_valid(i) {
					countries.insert(col.value(i).to_string());
				}
			}
		}
		Ok(countries.into_iter().collect())
	}

	/// Every stored row without its vector, for rebuilding the keyword index.
	pub async fn scan_rows(&self) -> Result<Vec<(String, Chunk)>> {
		let mut stream = self.table.query().select(Select::columns(&ROW_COLUMNS)).execute().await?;
		let mut rows = Vec::new();
		while let Some(batch) = stream.try_next().await? {
			rows.extend(batch_to_chunks(&batch)?);
		}
		Ok(rows)
	}

	/// Remove every row in every scope. The table itself stays.
	pub async fn clear(&self) -> Result<()> {
		self.table.delete("id IS NOT NULL").await?;
		info!(table = %self.table_name, "Cleared vector table");
		Ok(())
	}

	pub async fn ensure_indexes(&self) -> Result<()> { ensure_scalar_indexes(&self.table).await }
}
