use anyhow::{anyhow, bail, Result};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tantivy::collector::Count;
use tantivy::query::TermQuery;
use tantivy::schema::{IndexRecordOption, Schema};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, info, warn};

use rulebase_core::types::{Chunk, ScopeKey};

use crate::tantivy_utils::{build_schema, register_tokenizers, Fields};

const WRITER_HEAP_BYTES: usize = 50_000_000;

/// Scoped keyword index. Holds the single tantivy writer for its directory
/// for as long as it lives.
pub struct TantivyIndexer {
	pub(crate) index: Index,
	pub(crate) reader: IndexReader,
	writer: Mutex<IndexWriter>,
	pub(crate) fields: Fields,
	needs_backfill: bool,
}

fn schema_fingerprint(schema: &Schema) -> Result<String> { Ok(serde_json::to_string(schema)?) }

impl TantivyIndexer {
	/// Open the index at `index_dir`, creating it if absent. An index whose
	/// schema differs from the current one is dropped and recreated empty;
	/// either way [`needs_backfill`](Self::needs_backfill) reports it.
	pub fn open(index_dir: &Path) -> Result<Self> {
		let schema = build_schema();
		let (index, needs_backfill) = if index_dir.join("meta.json").exists() {
			let existing = Index::open_in_dir(index_dir)?;
			if schema_fingerprint(&existing.schema())? == schema_fingerprint(&schema)? {
				(existing, false)
			} else {
				warn!(dir = %index_dir.display(), "Keyword index schema drifted; recreating");
				drop(existing);
				std::fs::remove_dir_all(index_dir)?;
				std::fs::create_dir_all(index_dir)?;
				(Index::create_in_dir(index_dir, schema.clone())?, true)
			}
		} else {
			std::fs::create_dir_all(index_dir)?;
			info!(dir = %index_dir.display(), "Creating keyword index");
			(Index::create_in_dir(index_dir, schema.clone())?, true)
		};
		register_tokenizers(&index);
		let fields = Fields::resolve(&schema)?;
		let reader: IndexReader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
		let writer = index.writer_with_num_threads(1, WRITER_HEAP_BYTES)?;
		Ok(Self { index, reader, writer: Mutex::new(writer), fields, needs_backfill })
	}

	/// True when this open created the index from scratch, so rows held by
	/// the vector store are not yet searchable by keyword.
	pub fn needs_backfill(&self) -> bool { self.needs_backfill }

	fn lock_writer(&self) -> Result<MutexGuard<'_, IndexWriter>> {
		self.writer.lock().map_err(|_| anyhow!("keyword index writer lock poisoned"))
	}

	fn commit(&self, mut writer: MutexGuard<'_, IndexWriter>) -> Result<()> {
		writer.commit()?;
		drop(writer);
		self.reader.reload()?;
		Ok(())
	}

	/// Index chunks under the given ids. Each chunk's own metadata decides
	/// its scope and therefore which text field it lands in.
	pub fn insert(&self, ids: &[String], chunks: &[Chunk]) -> Result<usize> {
		if ids.len() != chunks.len() {
			bail!("id count ({}) does not match chunk count ({})", ids.len(), chunks.len());
		}
		if chunks.is_empty() {
			return Ok(0);
		}
		let docs = ids
			.iter()
			.zip(chunks)
			.map(|(id, chunk)| self.to_document(id, chunk))
			.collect::<Result<Vec<_>>>()?;
		let writer = self.lock_writer()?;
		for doc in docs {
			writer.add_document(doc)?;
		}
		self.commit(writer)?;
		debug!(count = ids.len(), "Indexed chunks for keyword search");
		Ok(ids.len())
	}

	fn to_document(&self, id: &str, chunk: &Chunk) -> Result<TantivyDocument> {
		let f = &self.fields;
		let m = &chunk.metadata;
		let scope = m.scope()?;
		let mut doc = TantivyDocument::default();
		doc.add_text(f.id, id);
		doc.add_text(f.scope, scope.tag());
		doc.add_text(f.variant, scope.variant());
		if let Some(country) = scope.country() {
			doc.add_text(f.country, country);
		}
		if let Some(doc_type) = m.doc_type {
			doc.add_text(f.doc_type, doc_type.as_str());
		}
		for (field, value) in [(f.rule, &m.rule), (f.chapter, &m.chapter), (f.section, &m.section)] {
			if let Some(value) = value {
				doc.add_text(field, value);
			}
		}
		doc.add_text(f.content_type, m.content_type.as_str());
		doc.add_text(f.source, &m.source);
		if let Some(page) = m.page {
			doc.add_u64(f.page, u64::from(page));
		}
		doc.add_text(f.content, &chunk.content);
		doc.add_text(f.text_field(scope.text_config()), chunk.search_text());
		Ok(doc)
	}

	pub fn delete_scope(&self, scope: &ScopeKey) -> Result<()> {
		let writer = self.lock_writer()?;
		writer.delete_term(self.scope_term(scope));
		self.commit(writer)?;
		debug!(%scope, "Deleted scope from keyword index");
		Ok(())
	}

	pub fn count(&self, scope: &ScopeKey) -> Result<usize> {
		let query = TermQuery::new(self.scope_term(scope), IndexRecordOption::Basic);
		Ok(self.reader.searcher().search(&query, &Count)?)
	}

	pub fn exists(&self, scope: &ScopeKey) -> Result<bool> { Ok(self.count(scope)? > 0) }

	pub fn num_docs(&self) -> u64 { self.reader.searcher().num_docs() }

	/// Remove every document in every scope.
	pub fn clear(&self) -> Result<()> {
		let writer = self.lock_writer()?;
		writer.delete_all_documents()?;
		self.commit(writer)?;
		info!("Cleared keyword index");
		Ok(())
	}

	pub(crate) fn scope_term(&self, scope: &ScopeKey) -> Term { Term::from_field_text(self.fields.scope, &scope.tag()) }
}
