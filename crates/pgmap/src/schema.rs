//! Live table metadata: introspection, normalization, and caching.
//!
//! Column metadata comes from `pg_catalog`, once per table, and is assumed
//! stable for the lifetime of the registry. Record mappings are cross-checked
//! against it at extraction time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::client::GenericClient;
use crate::error::{MapperError, MapperResult};
use crate::row::RowExt;

/// One column of a live table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetaData {
    pub name: String,
    pub sql_type: String,
    pub nullable: bool,
}

/// A live table: its name plus ordered column metadata. Owns no row data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetaData {
    pub name: String,
    pub columns: Vec<ColumnMetaData>,
}

impl TableMetaData {
    pub fn find_column(&self, name: &str) -> Option<&ColumnMetaData> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Database-specific name normalization applied before metadata lookup.
///
/// Postgres folds unquoted identifiers to lower case and needs no adjustment;
/// databases that fold the other way override these.
pub trait Dialect: Send + Sync {
    fn normalize_schema_name(&self, schema_name: &str) -> String {
        schema_name.to_string()
    }

    fn normalize_table_name(&self, table_name: &str) -> String {
        table_name.to_string()
    }
}

/// The default dialect.
pub struct PostgresDialect;

impl Dialect for PostgresDialect {}

/// Loads and caches [`TableMetaData`] per table name.
///
/// Population is idempotent: the map lock is held only for lookup and insert,
/// the introspection query runs outside it, and the first inserted value wins
/// under concurrent first access.
pub struct SchemaRegistry {
    dialect: Box<dyn Dialect>,
    schema_name: String,
    tables: Mutex<HashMap<String, Arc<TableMetaData>>>,
}

impl SchemaRegistry {
    /// Registry for the `public` schema with the Postgres dialect.
    pub fn new() -> Self {
        Self::with_dialect("public", Box::new(PostgresDialect))
    }

    pub fn with_dialect(schema_name: &str, dialect: Box<dyn Dialect>) -> Self {
        let schema_name = dialect.normalize_schema_name(schema_name);
        Self {
            dialect,
            schema_name,
            tables: Mutex::new(HashMap::new()),
        }
    }

    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    /// Seed the cache with already-known metadata.
    ///
    /// Subsequent lookups for this table skip introspection entirely.
    pub fn register_table(&self, meta: TableMetaData) {
        let key = self.dialect.normalize_table_name(&meta.name);
        self.tables
            .lock()
            .expect("schema cache lock poisoned")
            .insert(key, Arc::new(meta));
    }

    /// Metadata for `table_name`, introspecting the live schema on first use.
    pub async fn table_metadata(
        &self,
        conn: &impl GenericClient,
        table_name: &str,
    ) -> MapperResult<Arc<TableMetaData>> {
        let key = self.dialect.normalize_table_name(table_name);

        if let Some(hit) = self
            .tables
            .lock()
            .expect("schema cache lock poisoned")
            .get(&key)
        {
            return Ok(Arc::clone(hit));
        }

        let meta = Arc::new(self.introspect(conn, &key).await?);

        let mut tables = self.tables.lock().expect("schema cache lock poisoned");
        let entry = tables.entry(key).or_insert(meta);
        Ok(Arc::clone(entry))
    }

    async fn introspect(
        &self,
        conn: &impl GenericClient,
        table_name: &str,
    ) -> MapperResult<TableMetaData> {
        tracing::debug!(schema = %self.schema_name, table = %table_name, "introspecting table");

        let rows = conn
            .query(
                r#"
SELECT
  a.attname AS column_name,
  pg_catalog.format_type(a.atttypid, a.atttypmod) AS data_type,
  a.attnotnull AS not_null
FROM pg_catalog.pg_class c
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
JOIN pg_catalog.pg_attribute a ON a.attrelid = c.oid
WHERE c.relkind IN ('r', 'p', 'v', 'm', 'f')
  AND a.attnum > 0
  AND NOT a.attisdropped
  AND n.nspname = $1
  AND c.relname = $2
ORDER BY a.attnum
"#,
                &[&self.schema_name, &table_name],
            )
            .await?;

        if rows.is_empty() {
            return Err(MapperError::metadata(format!(
                "no table {}.{} in database schema",
                self.schema_name, table_name
            )));
        }

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let not_null: bool = row.try_get_column("not_null")?;
            columns.push(ColumnMetaData {
                name: row.try_get_column("column_name")?,
                sql_type: row.try_get_column("data_type")?,
                nullable: !not_null,
            });
        }

        Ok(TableMetaData {
            name: table_name.to_string(),
            columns,
        })
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UpperCaseDialect;

    impl Dialect for UpperCaseDialect {
        fn normalize_schema_name(&self, schema_name: &str) -> String {
            schema_name.to_uppercase()
        }

        fn normalize_table_name(&self, table_name: &str) -> String {
            table_name.to_uppercase()
        }
    }

    fn person_meta() -> TableMetaData {
        TableMetaData {
            name: "person".into(),
            columns: vec![
                ColumnMetaData {
                    name: "id".into(),
                    sql_type: "bigint".into(),
                    nullable: false,
                },
                ColumnMetaData {
                    name: "name".into(),
                    sql_type: "text".into(),
                    nullable: false,
                },
            ],
        }
    }

    #[test]
    fn find_column_by_name() {
        let meta = person_meta();
        assert!(meta.find_column("name").is_some());
        assert!(meta.find_column("missing").is_none());
    }

    #[test]
    fn postgres_dialect_is_identity() {
        let d = PostgresDialect;
        assert_eq!(d.normalize_table_name("Person"), "Person");
        assert_eq!(d.normalize_schema_name("public"), "public");
    }

    #[test]
    fn dialect_normalizes_registry_keys() {
        let registry = SchemaRegistry::with_dialect("public", Box::new(UpperCaseDialect));
        assert_eq!(registry.schema_name(), "PUBLIC");
    }

    #[tokio::test]
    async fn registered_tables_skip_introspection() {
        struct PanicClient;

        impl GenericClient for PanicClient {
            async fn query(
                &self,
                _sql: &str,
                _params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
            ) -> MapperResult<Vec<tokio_postgres::Row>> {
                panic!("unexpected query() call")
            }

            async fn query_one(
                &self,
                _sql: &str,
                _params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
            ) -> MapperResult<tokio_postgres::Row> {
                panic!("unexpected query_one() call")
            }

            async fn query_opt(
                &self,
                _sql: &str,
                _params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
            ) -> MapperResult<Option<tokio_postgres::Row>> {
                panic!("unexpected query_opt() call")
            }

            async fn execute(
                &self,
                _sql: &str,
                _params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
            ) -> MapperResult<u64> {
                panic!("unexpected execute() call")
            }
        }

        let registry = SchemaRegistry::new();
        registry.register_table(person_meta());

        let meta = registry
            .table_metadata(&PanicClient, "person")
            .await
            .unwrap();
        assert_eq!(meta.columns.len(), 2);
    }
}
