//! The per-process mapping cache.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{ColumnNamer, Record, RecordMapping, SnakeCaseNamer, table_name_of};
use crate::client::GenericClient;
use crate::error::{MapperError, MapperResult};
use crate::schema::SchemaRegistry;

/// Resolves and caches one [`RecordMapping`] per (record type, table).
///
/// The cache follows the same discipline as the schema cache: lookups and
/// inserts hold the lock briefly, extraction runs outside it, and the first
/// inserted mapping wins under concurrent first access.
pub struct MappingRegistry {
    schema: SchemaRegistry,
    namers: Vec<Box<dyn ColumnNamer>>,
    mappings: Mutex<HashMap<(TypeId, String), Arc<dyn Any + Send + Sync>>>,
}

impl MappingRegistry {
    pub fn new() -> Self {
        Self::with_schema(SchemaRegistry::new())
    }

    pub fn with_schema(schema: SchemaRegistry) -> Self {
        Self {
            schema,
            namers: vec![Box::new(SnakeCaseNamer)],
            mappings: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the column-namer chain. Order matters: the first namer whose
    /// `can_handle` accepts a record type names its columns.
    pub fn with_namers(mut self, namers: Vec<Box<dyn ColumnNamer>>) -> Self {
        self.namers = namers;
        self
    }

    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    /// The mapping for `R`, deriving and caching it on first use.
    pub async fn mapping<R: Record>(
        &self,
        conn: &impl GenericClient,
    ) -> MapperResult<Arc<RecordMapping<R>>> {
        let table = table_name_of::<R>();
        let key = (TypeId::of::<R>(), table.clone());

        if let Some(hit) = self
            .mappings
            .lock()
            .expect("mapping cache lock poisoned")
            .get(&key)
        {
            return downcast::<R>(hit);
        }

        let table_meta = self.schema.table_metadata(conn, &table).await?;
        let mapping: Arc<dyn Any + Send + Sync> =
            Arc::new(RecordMapping::<R>::extract(&table_meta, &self.namers)?);

        let mut mappings = self.mappings.lock().expect("mapping cache lock poisoned");
        let entry = mappings.entry(key).or_insert(mapping);
        downcast::<R>(entry)
    }
}

impl Default for MappingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn downcast<R: Record>(entry: &Arc<dyn Any + Send + Sync>) -> MapperResult<Arc<RecordMapping<R>>> {
    Arc::clone(entry)
        .downcast::<RecordMapping<R>>()
        .map_err(|_| MapperError::metadata("mapping cache holds a foreign type for this key"))
}
