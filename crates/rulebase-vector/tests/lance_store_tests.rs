use std::sync::Arc;

use arrow_array::{RecordBatch, RecordBatchIterator, StringArray};
use arrow_schema::{DataType, Field, Schema};
use tempfile::TempDir;

use rulebase_core::error::Error;
use rulebase_core::traits::VectorSearch;
use rulebase_core::types::{Chunk, ChunkMetadata, ContentType, DocType, ScopeKey, SourceKind};
use rulebase_vector::schema::vector_type;
use rulebase_vector::table::open_db;
use rulebase_vector::LanceDbIndexer;

const DIM: usize = 4;

fn chunk(content: &str, variant: &str, country: Option<&str>) -> Chunk {
	Chunk {
		content: content.to_string(),
		metadata: ChunkMetadata {
			rule: Some("Rule 5.1".into()),
			page: Some(7),
			variant: variant.to_string(),
			source: "test".into(),
			country: country.map(str::to_string),
			doc_type: Some(if country.is_some() { DocType::Local } else { DocType::Official }),
			..ChunkMetadata::default()
		},
	}
}

fn ids(prefix: &str, n: usize) -> Vec<String> { (0..n).map(|i| format!("{prefix}-{i}")).collect() }

async fn open(tmp: &TempDir) -> LanceDbIndexer {
	LanceDbIndexer::open(&tmp.path().to_string_lossy(), "rule_chunks", DIM).await.unwrap()
}

#[tokio::test]
async fn scoped_vector_search_never_leaks() -> anyhow::Result<()> {
	let tmp = TempDir::new()?;
	let store = open(&tmp).await;
	let chunks = vec![
		chunk("outdoor official", "outdoor", None),
		chunk("indoor official", "indoor", None),
		chunk("outdoor belgium", "outdoor", Some("bel")),
	];
	let same = vec![1.0, 0.0, 0.0, 0.0];
	store.insert(&ids("a", 3), &chunks, &[same.clone(), same.clone(), same.clone()]).await?;

	let outdoor = ScopeKey::official("outdoor")?;
	let hits = store.search_vector(&outdoor, &same, 10).await?;
	assert_eq!(hits.len(), 1);
	assert_eq!(hits[0].id, "a-0");
	assert_eq!(hits[0].source, SourceKind::Vector);
	assert!((hits[0].score - 1.0).abs() < 1e-4);
	assert_eq!(hits[0].chunk.metadata.page, Some(7));

	let bel = ScopeKey::local("outdoor", "BEL")?;
	let hits = store.search_scope(&bel, &same, 10).await?;
	assert_eq!(hits.len(), 1);
	assert_eq!(hits[0].chunk.metadata.country.as_deref(), Some("BEL"));
	assert_eq!(hits[0].chunk.metadata.doc_type, Some(DocType::Local));
	Ok(())
}

#[tokio::test]
async fn results_are_ordered_by_similarity() -> anyhow::Result<()> {
	let tmp = TempDir::new()?;
	let store = open(&tmp).await;
	let chunks = vec![chunk("far", "outdoor", None), chunk("near", "outdoor", None)];
	store.insert(&ids("o", 2), &chunks, &[vec![0.0, 1.0, 0.0, 0.0], vec![1.0, 0.1, 0.0, 0.0]]).await?;
	let hits = store.search_scope(&ScopeKey::official("outdoor")?, &[1.0, 0.0, 0.0, 0.0], 2).await?;
	assert_eq!(hits.iter().map(|h| h.chunk.content.as_str()).collect::<Vec<_>>(), vec!["near", "far"]);
	assert!(hits[0].score > hits[1].score);
	Ok(())
}

#[tokio::test]
async fn delete_exists_and_jurisdictions() -> anyhow::Result<()> {
	let tmp = TempDir::new()?;
	let store = open(&tmp).await;
	let v = vec![0.5, 0.5, 0.5, 0.5];
	let chunks = vec![
		chunk("x", "outdoor", None),
		chunk("x", "outdoor", Some("NED")),
		chunk("x", "outdoor", Some("bel")),
		chunk("x", "indoor", Some("GER")),
	];
	store.insert(&ids("d", 4), &chunks, &vec![v.clone(); 4]).await?;

	assert_eq!(store.list_countries(Some("outdoor")).await?, vec!["BEL".to_string(), "NED".to_string()]);
	assert_eq!(store.list_countries(Some("hockey5s")).await?, Vec::<String>::new());
	assert_eq!(store.list_countries(None).await?, vec!["BEL".to_string(), "GER".to_string(), "NED".to_string()]);

	let bel = ScopeKey::local("outdoor", "BEL")?;
	assert!(store.exists(&bel).await?);
	store.delete_scope(&bel).await?;
	assert!(!store.exists(&bel).await?);
	assert!(store.exists(&ScopeKey::official("outdoor")?).await?);
	assert!(store.exists(&ScopeKey::local("outdoor", "NED")?).await?);
	assert_eq!(store.total_rows().await?, 3);

	let rows = store.scan_rows().await?;
	assert_eq!(rows.len(), 3);
	assert!(rows.iter().all(|(_, c)| c.metadata.rule.as_deref() == Some("Rule 5.1")));

	store.ensure_indexes().await?;
	store.clear().await?;
	assert_eq!(store.total_rows().await?, 0);
	Ok(())
}

#[tokio::test]
async fn wrong_dimension_is_rejected() -> anyhow::Result<()> {
	let tmp = TempDir::new()?;
	let store = open(&tmp).await;
	let err = store.insert(&ids("w", 1), &[chunk("x", "outdoor", None)], &[vec![1.0, 2.0]]).await.unwrap_err();
	assert!(matches!(err.downcast_ref::<Error>(), Some(Error::DimensionMismatch { expected: 4, actual: 2 })));

	let err = store.search_scope(&ScopeKey::official("outdoor")?, &[1.0], 5).await.unwrap_err();
	assert!(matches!(err.downcast_ref::<Error>(), Some(Error::DimensionMismatch { .. })));
	Ok(())
}

#[tokio::test]
async fn legacy_table_is_healed_on_open() -> anyhow::Result<()> {
	let tmp = TempDir::new()?;
	let uri = tmp.path().to_string_lossy().to_string();
	let conn = open_db(&uri).await?;
	let legacy = Arc::new(Schema::new(vec![
		Field::new("id", DataType::Utf8, false),
		Field::new("content", DataType::Utf8, false),
		Field::new("variant", DataType::Utf8, false),
		Field::new("content_type", DataType::Utf8, false),
		Field::new("source", DataType::Utf8, false),
		Field::new("vector", vector_type(DIM as i32), true),
	]));
	let batch = RecordBatch::try_new(
		legacy.clone(),
		vec![
			Arc::new(StringArray::from(vec!["old-0"])),
			Arc::new(StringArray::from(vec!["legacy content"])),
			Arc::new(StringArray::from(vec!["outdoor"])),
			Arc::new(StringArray::from(vec!["body"])),
			Arc::new(StringArray::from(vec!["PDF (Layout)"])),
			Arc::new(arrow_array::FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(
				vec![Some(vec![Some(1.0f32), Some(0.0), Some(0.0), Some(0.0)])].into_iter(),
				DIM as i32,
			)),
		],
	)?;
	conn.create_table("rule_chunks", Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), legacy))).execute().await?;
	drop(conn);

	let store = LanceDbIndexer::open(&uri, "rule_chunks", DIM).await?;
	// the legacy row has no country, so it reads back as official
	assert!(store.exists(&ScopeKey::official("outdoor")?).await?);
	let rows = store.scan_rows().await?;
	assert_eq!(rows.len(), 1);
	assert_eq!(rows[0].1.metadata.page, None);
	Ok(())
}

#[tokio::test]
async fn minimal_legacy_table_gets_defaults_for_labels() -> anyhow::Result<()> {
	let tmp = TempDir::new()?;
	let uri = tmp.path().to_string_lossy().to_string();
	let conn = open_db(&uri).await?;
	let legacy = Arc::new(Schema::new(vec![
		Field::new("id", DataType::Utf8, false),
		Field::new("content", DataType::Utf8, false),
		Field::new("variant", DataType::Utf8, false),
		Field::new("vector", vector_type(DIM as i32), true),
	]));
	let batch = RecordBatch::try_new(
		legacy.clone(),
		vec![
			Arc::new(StringArray::from(vec!["old-0"])),
			Arc::new(StringArray::from(vec!["bare legacy row"])),
			Arc::new(StringArray::from(vec!["indoor"])),
			Arc::new(arrow_array::FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(
				vec![Some(vec![Some(0.0f32), Some(1.0), Some(0.0), Some(0.0)])].into_iter(),
				DIM as i32,
			)),
		],
	)?;
	conn.create_table("rule_chunks", Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), legacy))).execute().await?;
	drop(conn);

	let store = LanceDbIndexer::open(&uri, "rule_chunks", DIM).await?;
	let schema = store.connection().open_table("rule_chunks").execute().await?.schema().await?;
	assert!(schema.field_with_name("content_type").is_ok());
	assert!(schema.field_with_name("source").is_ok());

	let rows = store.scan_rows().await?;
	assert_eq!(rows.len(), 1);
	assert_eq!(rows[0].1.metadata.content_type, ContentType::Body);
	assert_eq!(rows[0].1.metadata.source, "");
	assert!(store.exists(&ScopeKey::official("indoor")?).await?);

	// a second open finds nothing left to heal
	drop(store);
	LanceDbIndexer::open(&uri, "rule_chunks", DIM).await?;
	Ok(())
}

#[tokio::test]
async fn dimension_drift_fails_open() -> anyhow::Result<()> {
	let tmp = TempDir::new()?;
	let uri = tmp.path().to_string_lossy().to_string();
	drop(LanceDbIndexer::open(&uri, "rule_chunks", DIM).await?);
	let err = LanceDbIndexer::open(&uri, "rule_chunks", 8).await.err().expect("must fail");
	assert!(matches!(err.downcast_ref::<Error>(), Some(Error::SchemaDrift(_))));
	Ok(())
}
