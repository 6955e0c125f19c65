//! LanceDB connection and table housekeeping.
//!
//! Opening is fail-fast: an unreachable store surfaces as a connection error
//! instead of a later, confusing query failure. An existing table is healed by
//! adding any backfillable columns it lacks; anything else that differs is drift.
use anyhow::Result;
use arrow_array::RecordBatchIterator;
use arrow_schema::DataType;
use lancedb::index::scalar::BTreeIndexBuilder;
use lancedb::index::Index;
use lancedb::table::NewColumnTransform;
use lancedb::{connect, Connection, Table};
use tracing::{debug, info, warn};

use rulebase_core::error::Error;

use crate::schema::{build_chunk_schema, vector_type, C_COUNTRY, C_VARIANT, C_VECTOR, HEALABLE_COLUMNS};

/// Columns that get a scalar index once the table holds rows.
pub const SCALAR_INDEX_COLUMNS: [&str; 2] = [C_VARIANT, C_COUNTRY];

pub async fn open_db(uri: &str) -> Result<Connection> {
    let conn = connect(uri)
        .execute()
        .await
        .map_err(|e| Error::Connection(format!("{uri}: {e}")))?;
    // a round trip proves the location is usable
    conn.table_names()
        .execute()
        .await
        .map_err(|e| Error::Connection(format!("{uri}: {e}")))?;
    Ok(conn)
}

/// Open `name`, creating it empty when absent and healing it when it lacks
/// any of the backfillable columns.
pub async fn ensure_table(conn: &Connection, name: &str, dim: usize) -> Result<Table> {
    let dim = i32::try_from(dim).map_err(|_| Error::InvalidConfig(format!("embedding dimension {dim} too large")))?;
    let schema = build_chunk_schema(dim);
    let names = conn.table_names().execute().await?;
    if !names.contains(&name.to_string()) {
        // create empty table with 0 rows
        let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
        let table = conn.create_table(name, Box::new(iter)).execute().await?;
        info!(table = name, dim, "Created chunk table");
        return Ok(table);
    }

    let table = conn.open_table(name).execute().await?;
    let existing = table.schema().await?;

    match existing.field_with_name(C_VECTOR).map(|f| f.data_type().clone()) {
        Ok(dt) if dt == vector_type(dim) => {}
        Ok(DataType::FixedSizeList(_, actual)) => {
            return Err(Error::SchemaDrift(format!(
                "table '{name}' stores {actual}-dimensional vectors but the embedder produces {dim}"
            ))
            .into());
        }
        Ok(other) => return Err(Error::SchemaDrift(format!("table '{name}' has vector column of type {other}")).into()),
        Err(_) => return Err(Error::SchemaDrift(format!("table '{name}' has no vector column")).into()),
    }

    for field in schema.fields() {
        let healable = HEALABLE_COLUMNS.iter().any(|(col, _)| *col == field.name().as_str());
        if field.is_nullable() || healable || existing.field_with_name(field.name()).is_ok() {
            continue;
        }
        return Err(Error::SchemaDrift(format!("table '{name}' lacks required column '{}'", field.name())).into());
    }

    let missing: Vec<(String, String)> = HEALABLE_COLUMNS
        .iter()
        .filter(|(col, _)| existing.field_with_name(col).is_err())
        .map(|(col, expr)| (col.to_string(), expr.to_string()))
        .collect();
    if !missing.is_empty() {
        let cols: Vec<&str> = missing.iter().map(|(c, _)| c.as_str()).collect();
        warn!(table = name, columns = ?cols, "Healing table schema: adding missing columns");
        table.add_columns(NewColumnTransform::SqlExpressions(missing), None).await?;
    }
    Ok(table)
}

/// Build BTree indexes on the scope columns. Skipped while the table is empty;
/// failures are logged and never fatal.
pub async fn ensure_scalar_indexes(table: &Table) -> Result<()> {
    if table.count_rows(None).await? == 0 {
        return Ok(());
    }
    let existing = table.list_indices().await?;
    for column in SCALAR_INDEX_COLUMNS {
        if existing.iter().any(|idx| idx.columns.iter().any(|c| c == column)) {
            continue;
        }
        match table.create_index(&[column], Index::BTree(BTreeIndexBuilder::default())).execute().await {
            Ok(()) => debug!(column, "Created scalar index"),
            Err(e) => warn!(column, error = %e, "Could not create scalar index"),
        }
    }
    Ok(())
}
