//! Arrow layout of the chunk table and conversions to and from it.
use anyhow::{anyhow, Result};
use arrow_array::{Array, FixedSizeListArray, Int32Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

use rulebase_core::types::{Chunk, ChunkMetadata, ContentType, DocType};

pub const C_ID: &str = "id";
pub const C_CONTENT: &str = "content";
pub const C_VARIANT: &str = "variant";
pub const C_COUNTRY: &str = "country";
pub const C_DOC_TYPE: &str = "doc_type";
pub const C_RULE: &str = "rule";
pub const C_CHAPTER: &str = "chapter";
pub const C_SECTION: &str = "section";
pub const C_CONTENT_TYPE: &str = "content_type";
pub const C_PAGE: &str = "page";
pub const C_SOURCE: &str = "source";
pub const C_SEARCH_TEXT: &str = "search_text";
pub const C_VECTOR: &str = "vector";
pub const C_DISTANCE: &str = "_distance";

/// Every column except the vector, in table order.
pub const ROW_COLUMNS: [&str; 12] = [
	C_ID, C_CONTENT, C_VARIANT, C_COUNTRY, C_DOC_TYPE, C_RULE, C_CHAPTER, C_SECTION, C_CONTENT_TYPE, C_PAGE, C_SOURCE, C_SEARCH_TEXT,
];

/// Columns a table written by an older layout may lack, with the SQL
/// expression that backfills them.
pub const HEALABLE_COLUMNS: [(&str, &str); 9] = [
	(C_COUNTRY, "CAST(NULL AS VARCHAR)"),
	(C_DOC_TYPE, "CAST(NULL AS VARCHAR)"),
	(C_RULE, "CAST(NULL AS VARCHAR)"),
	(C_CHAPTER, "CAST(NULL AS VARCHAR)"),
	(C_SECTION, "CAST(NULL AS VARCHAR)"),
	(C_CONTENT_TYPE, "CAST('body' AS VARCHAR)"),
	(C_PAGE, "CAST(NULL AS INT)"),
	(C_SOURCE, "CAST('' AS VARCHAR)"),
	(C_SEARCH_TEXT, "CAST(NULL AS VARCHAR)"),
];

pub fn vector_type(dim: i32) -> DataType {
	DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim)
}

pub fn build_chunk_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new(C_ID, DataType::Utf8, false),
		Field::new(C_CONTENT, DataType::Utf8, false),
		Field::new(C_VARIANT, DataType::Utf8, false),
		Field::new(C_COUNTRY, DataType::Utf8, true),
		Field::new(C_DOC_TYPE, DataType::Utf8, true),
		Field::new(C_RULE, DataType::Utf8, true),
		Field::new(C_CHAPTER, DataType::Utf8, true),
		Field::new(C_SECTION, DataType::Utf8, true),
		Field::new(C_CONTENT_TYPE, DataType::Utf8, false),
		Field::new(C_PAGE, DataType::Int32, true),
		Field::new(C_SOURCE, DataType::Utf8, false),
		Field::new(C_SEARCH_TEXT, DataType::Utf8, true),
		Field::new(C_VECTOR, vector_type(dim), true),
	]))
}

/// One row ready for the table. `country` is already normalized by the caller.
pub struct ChunkRow<'a> {
	pub id: &'a str,
	pub chunk: &'a Chunk,
	pub country: Option<&'a str>,
	pub vector: &'a [f32],
}

pub fn rows_to_record_batch(rows: &[ChunkRow<'_>], dim: i32) -> Result<RecordBatch> {
	let schema = build_chunk_schema(dim);
	let mut ids = Vec::new(); let mut contents = Vec::new(); let mut variants = Vec::new(); let mut countries = Vec::new();
	let mut doc_types = Vec::new(); let mut rules = Vec::new(); let mut chapters = Vec::new(); let mut sections = Vec::new();
	let mut content_types = Vec::new(); let mut pages = Vec::new(); let mut sources = Vec::new(); let mut search_texts = Vec::new();
	let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::new();
	for r in rows {
		let m = r.chunk.metadata.clone();
		ids.push(r.id.to_string());
		contents.push(r.chunk.content.clone());
		variants.push(m.variant);
		countries.push(r.country.map(str::to_string));
		doc_types.push(m.doc_type.map(|d| d.as_str().to_string()));
		rules.push(m.rule);
		chapters.push(m.chapter);
		sections.push(m.section);
		content_types.push(m.content_type.as_str().to_string());
		pages.push(m.page.and_then(|p| i32::try_from(p).ok()));
		sources.push(m.source);
		search_texts.push(Some(r.chunk.search_text()));
		vectors.push(Some(r.vector.iter().map(|&x| Some(x)).collect()));
	}
	let record_batch = RecordBatch::try_new(schema, vec![
		Arc::new(StringArray::from(ids)),
		Arc::new(StringArray::from(contents)),
		Arc::new(StringArray::from(variants)),
		Arc::new(StringArray::from(countries)),
		Arc::new(StringArray::from(doc_types)),
		Arc::new(StringArray::from(rules)),
		Arc::new(StringArray::from(chapters)),
		Arc::new(StringArray::from(sections)),
		Arc::new(StringArray::from(content_types)),
		Arc::new(Int32Array::from(pages)),
		Arc::new(StringArray::from(sources)),
		Arc::new(StringArray::from(search_texts)),
		Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), dim)),
	])?;
	Ok(record_batch)
}

fn required_str<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<StringArray>())
		.ok_or_else(|| anyhow!("column '{name}' missing or not utf8"))
}

fn optional_str<'a>(batch: &'a RecordBatch, name: &str) -> Option<&'a StringArray> {
	batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<StringArray>())
}

fn cell(arr: Option<&StringArray>, i: usize) -> Option<String> {
	arr.filter(|a| a.is_valid(i)).map(|a| a.value(i).to_string())
}

/// Decode `(id, chunk)` pairs from a batch holding at least [`ROW_COLUMNS`].
pub fn batch_to_chunks(batch: &RecordBatch) -> Result<Vec<(String, Chunk)>> {
	let ids = required_str(batch, C_ID)?;
	let contents = required_str(batch, C_CONTENT)?;
	let variants = required_str(batch, C_VARIANT)?;
	let content_types = optional_str(batch, C_CONTENT_TYPE);
	let sources = optional_str(batch, C_SOURCE);
	let countries = optional_str(batch, C_COUNTRY);
	let doc_types = optional_str(batch, C_DOC_TYPE);
	let rules = optional_str(batch, C_RULE);
	let chapters = optional_str(batch, C_CHAPTER);
	let sections = optional_str(batch, C_SECTION);
	let pages = batch.column_by_name(C_PAGE).and_then(|c| c.as_any().downcast_ref::<Int32Array>());

	let mut out = Vec::with_capacity(batch.num_rows());
	for i in 0..batch.num_rows() {
		let metadata = ChunkMetadata {
			rule: cell(rules, i),
			chapter: cell(chapters, i),
			section: cell(sections, i),
			content_type: cell(content_types, i).and_then(|s| ContentType::parse(&s)).unwrap_or_default(),
			page: pages.filter(|p| p.is_valid(i)).and_then(|p| u32::try_from(p.value(i)).ok()),
			variant: variants.value(i).to_string(),
			source: cell(sources, i).unwrap_or_default(),
			country: cell(countries, i),
			doc_type: cell(doc_types, i).and_then(|s| DocType::parse(&s)),
		};
		out.push((ids.value(i).to_string(), Chunk { content: contents.value(i).to_string(), metadata }));
	}
	Ok(out)
}
