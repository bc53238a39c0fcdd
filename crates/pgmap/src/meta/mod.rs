//! Record metadata: declared properties, column bindings, and the mapping
//! derived from them.
//!
//! A record type declares its properties as a static configuration table
//! ([`Record::properties`]). At first use the declarations are cross-checked
//! against live [`TableMetaData`](crate::schema::TableMetaData) and resolved
//! into a [`RecordMapping`], which is what the mapper builds SQL from.
//! Anything ambiguous (duplicate declarations that disagree, two primary
//! keys, a column the table does not have) fails extraction; nothing is
//! silently resolved.

mod registry;

#[cfg(test)]
mod tests;

pub use registry::MappingRegistry;

use std::collections::HashMap;
use std::sync::Arc;

use heck::ToSnakeCase;

use crate::error::{MapperError, MapperResult};
use crate::row::FromRow;
use crate::schema::TableMetaData;
use crate::value::SqlValue;

/// How primary keys come into existence for a record type.
#[derive(Clone)]
pub enum PkStrategy {
    /// The database generates the key; it is retrieved after the insert.
    AutoIncrement,
    /// The application generates the key before the insert. The generator is
    /// invoked once per row and may return `None` when the caller supplies
    /// natural keys directly.
    Provided(Arc<dyn Fn() -> Option<SqlValue> + Send + Sync>),
}

impl PkStrategy {
    pub fn is_auto_increment(&self) -> bool {
        matches!(self, Self::AutoIncrement)
    }

    /// A provided strategy from a generator closure.
    pub fn provided<F>(generator: F) -> Self
    where
        F: Fn() -> Option<SqlValue> + Send + Sync + 'static,
    {
        Self::Provided(Arc::new(generator))
    }

    /// Random UUID keys, generated per row.
    pub fn uuid_v4() -> Self {
        Self::provided(|| Some(SqlValue::Uuid(uuid::Uuid::new_v4())))
    }

    /// Keys are already present on the records handed in; nothing is
    /// generated.
    pub fn caller_supplied() -> Self {
        Self::provided(|| None)
    }
}

impl std::fmt::Debug for PkStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AutoIncrement => f.write_str("AutoIncrement"),
            Self::Provided(_) => f.write_str("Provided"),
        }
    }
}

/// One declared property of a record type.
///
/// `get` reads the current value; `set` is a pure write operation returning a
/// new record instance. Both are plain function pointers so a record's
/// property table stays a static piece of configuration.
pub struct PropertyDecl<R> {
    pub name: &'static str,
    pub column: Option<&'static str>,
    pub pk: bool,
    pub ignore: bool,
    pub get: fn(&R) -> SqlValue,
    pub set: fn(R, SqlValue) -> MapperResult<R>,
}

impl<R> PropertyDecl<R> {
    pub fn new(
        name: &'static str,
        get: fn(&R) -> SqlValue,
        set: fn(R, SqlValue) -> MapperResult<R>,
    ) -> Self {
        Self {
            name,
            column: None,
            pk: false,
            ignore: false,
            get,
            set,
        }
    }

    /// Explicit column name, overriding the naming convention.
    pub fn column(mut self, column: &'static str) -> Self {
        self.column = Some(column);
        self
    }

    /// Mark as the primary key.
    pub fn pk(mut self) -> Self {
        self.pk = true;
        self
    }

    /// Exclude from mapping entirely.
    pub fn ignore(mut self) -> Self {
        self.ignore = true;
        self
    }
}

/// A mapped record type.
pub trait Record: FromRow + Send + Sync + Sized + 'static {
    /// Name used in table-name derivation and error messages.
    fn record_name() -> &'static str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// Explicit table name, overriding the naming convention.
    fn table_name() -> Option<&'static str> {
        None
    }

    /// The declared property configuration table.
    fn properties() -> Vec<PropertyDecl<Self>>;

    fn pk_strategy() -> PkStrategy {
        PkStrategy::AutoIncrement
    }
}

/// Derives column names from property names.
///
/// Namers form an ordered chain: the first whose `can_handle` accepts the
/// record type names the column. Ordering is caller-configured on the
/// [`MappingRegistry`]. Explicit per-property overrides always win over the
/// chain.
pub trait ColumnNamer: Send + Sync {
    fn can_handle(&self, record_name: &str) -> bool;

    fn column_name(&self, record_name: &str, property: &str) -> String;
}

/// The stock namer: `snake_case` of the property name, for every record type.
pub struct SnakeCaseNamer;

impl ColumnNamer for SnakeCaseNamer {
    fn can_handle(&self, _record_name: &str) -> bool {
        true
    }

    fn column_name(&self, _record_name: &str, property: &str) -> String {
        property.to_snake_case()
    }
}

/// One property bound to one column of one record type. Immutable and shared
/// across operations.
pub struct PropertyBinding<R> {
    property: &'static str,
    column: String,
    pk: bool,
    get: fn(&R) -> SqlValue,
    set: fn(R, SqlValue) -> MapperResult<R>,
}

impl<R> std::fmt::Debug for PropertyBinding<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyBinding")
            .field("property", &self.property)
            .field("column", &self.column)
            .field("pk", &self.pk)
            .finish()
    }
}

impl<R> PropertyBinding<R> {
    pub fn property(&self) -> &'static str {
        self.property
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn is_pk(&self) -> bool {
        self.pk
    }

    /// Read the property's current value.
    pub fn get(&self, record: &R) -> SqlValue {
        (self.get)(record)
    }

    /// Apply a value, producing a new record instance.
    pub fn set(&self, record: R, value: SqlValue) -> MapperResult<R> {
        (self.set)(record, value)
    }
}

/// The resolved mapping of a record type onto its table.
pub struct RecordMapping<R> {
    table: String,
    bindings: Vec<PropertyBinding<R>>,
    pk_index: Option<usize>,
    pk_strategy: PkStrategy,
}

impl<R> std::fmt::Debug for RecordMapping<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordMapping")
            .field("table", &self.table)
            .field("bindings", &self.bindings)
            .field("pk_index", &self.pk_index)
            .field("pk_strategy", &self.pk_strategy)
            .finish()
    }
}

impl<R: Record> RecordMapping<R> {
    /// Resolve `R`'s declared properties against live table metadata.
    pub fn extract(
        table_meta: &TableMetaData,
        namers: &[Box<dyn ColumnNamer>],
    ) -> MapperResult<Self> {
        let record_name = R::record_name();
        let decls = R::properties();

        let mut seen: HashMap<&'static str, usize> = HashMap::new();
        let mut deduped: Vec<&PropertyDecl<R>> = Vec::with_capacity(decls.len());
        for decl in &decls {
            match seen.get(decl.name) {
                None => {
                    seen.insert(decl.name, deduped.len());
                    deduped.push(decl);
                }
                Some(&idx) => {
                    let prev = deduped[idx];
                    if prev.column != decl.column || prev.pk != decl.pk || prev.ignore != decl.ignore
                    {
                        return Err(MapperError::metadata(format!(
                            "conflicting declarations for property {} of record {}",
                            decl.name, record_name
                        )));
                    }
                }
            }
        }

        let mut bindings: Vec<PropertyBinding<R>> = Vec::with_capacity(deduped.len());
        for decl in deduped {
            if decl.ignore {
                continue;
            }

            let column = match decl.column {
                Some(explicit) => explicit.to_string(),
                None => namers
                    .iter()
                    .find(|n| n.can_handle(record_name))
                    .map(|n| n.column_name(record_name, decl.name))
                    .ok_or_else(|| {
                        MapperError::metadata(format!(
                            "no column namer handles record {record_name}"
                        ))
                    })?,
            };

            if table_meta.find_column(&column).is_none() {
                return Err(MapperError::metadata(format!(
                    "no database column {}.{} for property {} of record {}",
                    table_meta.name, column, decl.name, record_name
                )));
            }

            if bindings.iter().any(|b| b.column == column) {
                return Err(MapperError::metadata(format!(
                    "column {}.{} is mapped by more than one property of record {}",
                    table_meta.name, column, record_name
                )));
            }

            bindings.push(PropertyBinding {
                property: decl.name,
                column,
                pk: decl.pk,
                get: decl.get,
                set: decl.set,
            });
        }

        let explicit_pks: Vec<usize> = bindings
            .iter()
            .enumerate()
            .filter(|(_, b)| b.pk)
            .map(|(i, _)| i)
            .collect();

        let pk_index = match explicit_pks.as_slice() {
            [] => {
                // Fallback convention: a property literally named "id".
                let fallback = bindings.iter().position(|b| b.property == "id");
                if let Some(i) = fallback {
                    bindings[i].pk = true;
                }
                fallback
            }
            [single] => Some(*single),
            _ => {
                return Err(MapperError::metadata(format!(
                    "record {} declares more than one primary key property",
                    record_name
                )));
            }
        };

        Ok(Self {
            table: table_meta.name.clone(),
            bindings,
            pk_index,
            pk_strategy: R::pk_strategy(),
        })
    }
}

impl<R> RecordMapping<R> {
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// All mapped properties, primary key included, in declaration order.
    pub fn bindings(&self) -> &[PropertyBinding<R>] {
        &self.bindings
    }

    /// Mapped properties excluding the primary key.
    pub fn bindings_without_pk(&self) -> impl Iterator<Item = &PropertyBinding<R>> {
        self.bindings.iter().filter(|b| !b.pk)
    }

    /// The primary-key binding, if the mapping has a single-column key.
    pub fn pk_binding(&self) -> Option<&PropertyBinding<R>> {
        self.pk_index.map(|i| &self.bindings[i])
    }

    /// Look up a binding by property name.
    pub fn binding(&self, property: &str) -> Option<&PropertyBinding<R>> {
        self.bindings.iter().find(|b| b.property == property)
    }

    /// Look up a binding by column name.
    pub fn binding_for_column(&self, column: &str) -> Option<&PropertyBinding<R>> {
        self.bindings.iter().find(|b| b.column == column)
    }

    pub fn pk_strategy(&self) -> &PkStrategy {
        &self.pk_strategy
    }
}

/// The table a record type maps to: the explicit override, else `snake_case`
/// of the record name.
pub fn table_name_of<R: Record>() -> String {
    match R::table_name() {
        Some(explicit) => explicit.to_string(),
        None => R::record_name().to_snake_case(),
    }
}
