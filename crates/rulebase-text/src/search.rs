use anyhow::Result;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::TantivyDocument;
use tracing::debug;

use rulebase_core::traits::KeywordSearch;
use rulebase_core::types::{Chunk, ChunkMetadata, ContentType, DocType, ScopeKey, SearchHit, SourceKind};

use crate::index::TantivyIndexer;

impl TantivyIndexer {
	/// BM25 search inside one scope. Query syntax is lenient: all terms are
	/// required by default, quotes make phrases, `-term` excludes, and
	/// malformed fragments are dropped instead of failing the query.
	pub fn search_scope(&self, scope: &ScopeKey, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
		if query.trim().is_empty() || limit == 0 {
			return Ok(Vec::new());
		}
		let field = self.fields.text_field(scope.text_config());
		let mut parser = QueryParser::for_index(&self.index, vec![field]);
		parser.set_conjunction_by_default();
		let (parsed, errors) = parser.parse_query_lenient(query);
		if !errors.is_empty() {
			debug!(?errors, "Ignored malformed query fragments");
		}
		let scope_filter: Box<dyn Query> = Box::new(TermQuery::new(self.scope_term(scope), IndexRecordOption::Basic));
		let q = BooleanQuery::new(vec![(Occur::Must, parsed), (Occur::Must, scope_filter)]);

		let searcher = self.reader.searcher();
		let top_docs = searcher.search(&q, &TopDocs::with_limit(limit))?;
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr)?;
			hits.push(self.hit_from_doc(&doc, score));
		}
		Ok(hits)
	}

	fn hit_from_doc(&self, doc: &TantivyDocument, score: f32) -> SearchHit {
		let f = &self.fields;
		let text = |field: Field| doc.get_first(field).and_then(|v| v.as_str()).map(str::to_string);
		let metadata = ChunkMetadata {
			rule: text(f.rule),
			chapter: text(f.chapter),
			section: text(f.section),
			content_type: text(f.content_type).and_then(|s| ContentType::parse(&s)).unwrap_or_default(),
			page: doc.get_first(f.page).and_then(|v| v.as_u64()).and_then(|p| u32::try_from(p).ok()),
			variant: text(f.variant).unwrap_or_default(),
			source: text(f.source).unwrap_or_default(),
			country: text(f.country),
			doc_type: text(f.doc_type).and_then(|s| DocType::parse(&s)),
		};
		SearchHit {
			id: text(f.id).unwrap_or_default(),
			score,
			source: SourceKind::Text,
			chunk: Chunk { content: text(f.content).unwrap_or_default(), metadata },
		}
	}
}

impl KeywordSearch for TantivyIndexer {
	async fn search_keyword(&self, scope: &ScopeKey, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
		self.search_scope(scope, query, limit)
	}
}
