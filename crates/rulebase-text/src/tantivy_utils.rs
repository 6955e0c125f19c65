//! rulebase-text
//!
//! Tantivy schema and analyzers for the scoped keyword index. Every document
//! carries an exact-match `scope` token; its body goes into exactly one of two
//! text fields depending on the scope's language configuration.
use tantivy::schema::{Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING};
use tantivy::tokenizer::{Language, LowerCaser, RemoveLongFilter, SimpleTokenizer, Stemmer, StopWordFilter, TextAnalyzer};
use tantivy::Index;

use rulebase_core::types::TextConfig;

pub const EN_TOKENIZER: &str = "rulebase_en";
pub const SIMPLE_TOKENIZER: &str = "rulebase_simple";

pub const F_ID: &str = "id";
pub const F_SCOPE: &str = "scope";
pub const F_VARIANT: &str = "variant";
pub const F_COUNTRY: &str = "country";
pub const F_DOC_TYPE: &str = "doc_type";
pub const F_RULE: &str = "rule";
pub const F_CHAPTER: &str = "chapter";
pub const F_SECTION: &str = "section";
pub const F_CONTENT_TYPE: &str = "content_type";
pub const F_SOURCE: &str = "source";
pub const F_PAGE: &str = "page";
pub const F_CONTENT: &str = "content";
pub const F_TEXT_EN: &str = "text_en";
pub const F_TEXT_SIMPLE: &str = "text_simple";

fn indexed_text(tokenizer: &str) -> TextOptions {
	let indexing = TextFieldIndexing::default().set_tokenizer(tokenizer).set_index_option(IndexRecordOption::WithFreqsAndPositions);
	TextOptions::default().set_indexing_options(indexing)
}

pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	schema_builder.add_text_field(F_ID, STRING | STORED);
	schema_builder.add_text_field(F_SCOPE, STRING);
	schema_builder.add_text_field(F_VARIANT, STRING | STORED);
	schema_builder.add_text_field(F_COUNTRY, STRING | STORED);
	schema_builder.add_text_field(F_DOC_TYPE, STRING | STORED);
	schema_builder.add_text_field(F_RULE, STORED);
	schema_builder.add_text_field(F_CHAPTER, STORED);
	schema_builder.add_text_field(F_SECTION, STORED);
	schema_builder.add_text_field(F_CONTENT_TYPE, STRING | STORED);
	schema_builder.add_text_field(F_SOURCE, STORED);
	schema_builder.add_u64_field(F_PAGE, STORED);
	schema_builder.add_text_field(F_CONTENT, STORED);
	schema_builder.add_text_field(F_TEXT_EN, indexed_text(EN_TOKENIZER));
	schema_builder.add_text_field(F_TEXT_SIMPLE, indexed_text(SIMPLE_TOKENIZER));
	schema_builder.build()
}

const STOP_WORDS: [&str; 60] = [
	"a","an","and","are","as","at","be","by","for","from","has","he","in","is","it","its","of","on","that","the","to","was","will","with","or","but","not","this","these","they","them","their","there","then","than","so","if","when","where","why","how","what","which","who","whom","whose","can","could","should","would","may","might","must","shall","do","does","did","have","had","having",
];

/// Tokenizers are not persisted with the index; register on every open.
pub fn register_tokenizers(index: &Index) {
	let english = TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(RemoveLongFilter::limit(40))
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(STOP_WORDS.iter().map(|s| s.to_string())))
		.filter(Stemmer::new(Language::English))
		.build();
	index.tokenizers().register(EN_TOKENIZER, english);

	let simple = TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(RemoveLongFilter::limit(40))
		.filter(LowerCaser)
		.build();
	index.tokenizers().register(SIMPLE_TOKENIZER, simple);
}

/// Resolved field handles for [`build_schema`].
#[derive(Debug, Clone, Copy)]
pub struct Fields {
	pub id: Field,
	pub scope: Field,
	pub variant: Field,
	pub country: Field,
	pub doc_type: Field,
	pub rule: Field,
	pub chapter: Field,
	pub section: Field,
	pub content_type: Field,
	pub source: Field,
	pub page: Field,
	pub content: Field,
	pub text_en: Field,
	pub text_simple: Field,
}

impl Fields {
	pub fn resolve(schema: &Schema) -> tantivy::Result<Self> {
		Ok(Self {
			id: schema.get_field(F_ID)?,
			scope: schema.get_field(F_SCOPE)?,
			variant: schema.get_field(F_VARIANT)?,
			country: schema.get_field(F_COUNTRY)?,
			doc_type: schema.get_field(F_DOC_TYPE)?,
			rule: schema.get_field(F_RULE)?,
			chapter: schema.get_field(F_CHAPTER)?,
			section: schema.get_field(F_SECTION)?,
			content_type: schema.get_field(F_CONTENT_TYPE)?,
			source: schema.get_field(F_SOURCE)?,
			page: schema.get_field(F_PAGE)?,
			content: schema.get_field(F_CONTENT)?,
			text_en: schema.get_field(F_TEXT_EN)?,
			text_simple: schema.get_field(F_TEXT_SIMPLE)?,
		})
	}

	pub fn text_field(&self, config: TextConfig) -> Field {
		match config {
			TextConfig::English => self.text_en,
			TextConfig::Simple => self.text_simple,
		}
	}
}
