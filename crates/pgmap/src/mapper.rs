//! The CRUD and relation-injection orchestrator.
//!
//! [`SqlMapper`] resolves a record type to its [`RecordMapping`], builds
//! parameterized statements from it, and hands them to the execution layer.
//! Insert statements branch on the two axes that exist: primary-key strategy
//! (auto-increment vs provided) and row count (single vs multi-row).

use std::collections::HashMap;

use crate::client::GenericClient;
use crate::error::{MapperError, MapperResult};
use crate::meta::{MappingRegistry, PkStrategy, Record, RecordMapping};
use crate::relations::{
    ManyToMany, ManyToManySpec, OneToMany, OneToManySpec, ProvidedProperties, RelationLoader,
    ToOne, ToOneSpec,
};
use crate::snippet::Snippet;
use crate::value::SqlValue;

/// The CRUD surface over mapped record types.
///
/// All operations run on a caller-supplied [`GenericClient`] (a connection,
/// a pooled client, or a transaction) and await their statements strictly in
/// sequence. The mapper holds no state beyond its metadata caches.
pub struct SqlMapper {
    registry: MappingRegistry,
}

impl SqlMapper {
    pub fn new() -> Self {
        Self::with_registry(MappingRegistry::new())
    }

    pub fn with_registry(registry: MappingRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &MappingRegistry {
        &self.registry
    }

    /// Insert one record and return it with its primary key applied.
    ///
    /// Auto-increment mappings retrieve the generated key via `RETURNING`;
    /// provided mappings generate the key (if any) before the insert.
    pub async fn insert<R: Record>(&self, conn: &impl GenericClient, record: R) -> MapperResult<R> {
        let mapping = self.registry.mapping::<R>(conn).await?;
        match mapping.pk_strategy().clone() {
            PkStrategy::AutoIncrement => self.insert_auto(conn, &mapping, record).await,
            PkStrategy::Provided(generate) => {
                let record = apply_generated_pk(&mapping, record, generate())?;
                insert_statement(&mapping, &record, true).execute(conn).await?;
                Ok(record)
            }
        }
    }

    async fn insert_auto<R: Record>(
        &self,
        conn: &impl GenericClient,
        mapping: &RecordMapping<R>,
        record: R,
    ) -> MapperResult<R> {
        let stmt = insert_statement(mapping, &record, false);
        match mapping.pk_binding() {
            Some(pk) => {
                let rows = with_returning(stmt, pk.column()).fetch_all(conn).await?;
                if rows.len() != 1 {
                    return Err(MapperError::consistency(format!(
                        "inserting 1 row returned {} generated keys",
                        rows.len()
                    )));
                }
                let key = SqlValue::from_row_column(&rows[0], 0)?;
                pk.set(record, key)
            }
            None => {
                stmt.execute(conn).await?;
                Ok(record)
            }
        }
    }

    /// Insert a batch as one multi-row statement and return the records with
    /// their keys applied, in input order.
    ///
    /// An empty batch returns empty without touching the connection. For
    /// auto-increment mappings the execution layer must hand back exactly one
    /// generated key per row; any mismatch fails with
    /// [`MapperError::Consistency`] rather than guessing which rows succeeded.
    pub async fn insert_many<R: Record>(
        &self,
        conn: &impl GenericClient,
        records: Vec<R>,
    ) -> MapperResult<Vec<R>> {
        if records.is_empty() {
            return Ok(records);
        }

        let mapping = self.registry.mapping::<R>(conn).await?;
        match mapping.pk_strategy().clone() {
            PkStrategy::AutoIncrement => self.insert_many_auto(conn, &mapping, records).await,
            PkStrategy::Provided(generate) => {
                let mut keyed = Vec::with_capacity(records.len());
                for record in records {
                    keyed.push(apply_generated_pk(&mapping, record, generate())?);
                }
                multi_row_insert_statement(&mapping, &keyed, true)?
                    .execute(conn)
                    .await?;
                Ok(keyed)
            }
        }
    }

    async fn insert_many_auto<R: Record>(
        &self,
        conn: &impl GenericClient,
        mapping: &RecordMapping<R>,
        records: Vec<R>,
    ) -> MapperResult<Vec<R>> {
        let stmt = multi_row_insert_statement(mapping, &records, false)?;
        match mapping.pk_binding() {
            Some(pk) => {
                let rows = with_returning(stmt, pk.column()).fetch_all(conn).await?;
                if rows.len() != records.len() {
                    return Err(MapperError::consistency(format!(
                        "inserting {} rows returned {} generated keys",
                        records.len(),
                        rows.len()
                    )));
                }
                records
                    .into_iter()
                    .zip(rows)
                    .map(|(record, row)| {
                        let key = SqlValue::from_row_column(&row, 0)?;
                        pk.set(record, key)
                    })
                    .collect()
            }
            None => {
                stmt.execute(conn).await?;
                Ok(records)
            }
        }
    }

    /// Update all non-key columns of `record`, keyed by its primary key.
    ///
    /// Returns whether exactly one row was affected. Zero rows (already
    /// deleted, never inserted) is an expected outcome, not an error.
    pub async fn update<R: Record>(
        &self,
        conn: &impl GenericClient,
        record: &R,
    ) -> MapperResult<bool> {
        let mapping = self.registry.mapping::<R>(conn).await?;
        let affected = update_statement(&mapping, record)?.execute(conn).await?;
        Ok(affected == 1)
    }

    /// Update a batch of records in one execution-layer round trip, reporting
    /// per record, in input order, whether exactly one row was affected.
    pub async fn batch_update<R: Record>(
        &self,
        conn: &impl GenericClient,
        records: &[R],
    ) -> MapperResult<Vec<bool>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let mapping = self.registry.mapping::<R>(conn).await?;
        let mut batch = Vec::with_capacity(records.len());
        for record in records {
            batch.push(update_statement(&mapping, record)?.into_batch_statement()?);
        }

        tracing::debug!(statements = batch.len(), "batch update");
        let counts = conn.execute_batch(&batch).await?;
        if counts.len() != records.len() {
            return Err(MapperError::consistency(format!(
                "batch of {} updates returned {} results",
                records.len(),
                counts.len()
            )));
        }
        Ok(counts.into_iter().map(|count| count == 1).collect())
    }

    /// Delete the row `record` is keyed to; reports whether exactly one row
    /// was removed.
    pub async fn delete<R: Record>(
        &self,
        conn: &impl GenericClient,
        record: &R,
    ) -> MapperResult<bool> {
        let mapping = self.registry.mapping::<R>(conn).await?;
        let pk = mapping
            .pk_binding()
            .ok_or_else(|| no_pk_error::<R>("delete"))?;
        let affected = delete_statement(&mapping, pk.get(record))?
            .execute(conn)
            .await?;
        Ok(affected == 1)
    }

    /// Delete by primary-key value.
    pub async fn delete_by_pk<R: Record>(
        &self,
        conn: &impl GenericClient,
        pk_value: impl Into<SqlValue>,
    ) -> MapperResult<bool> {
        let mapping = self.registry.mapping::<R>(conn).await?;
        let affected = delete_statement(&mapping, pk_value.into())?
            .execute(conn)
            .await?;
        Ok(affected == 1)
    }

    /// Partially update the row keyed by `pk_value` with the subset of
    /// `values` whose keys name mapped properties.
    ///
    /// Unknown keys are ignored, so callers may pass superset maps. When
    /// nothing matches, the patch is a no-op and reports success without
    /// issuing SQL.
    pub async fn patch<R: Record>(
        &self,
        conn: &impl GenericClient,
        pk_value: impl Into<SqlValue>,
        values: &HashMap<String, SqlValue>,
    ) -> MapperResult<bool> {
        let mapping = self.registry.mapping::<R>(conn).await?;
        match patch_statement(&mapping, pk_value.into(), values)? {
            Some(stmt) => {
                let affected = stmt.execute(conn).await?;
                Ok(affected == 1)
            }
            None => Ok(true),
        }
    }

    /// Start a read that maps rows to `R` and then resolves attached
    /// relations.
    pub fn query<R: Record, C: GenericClient>(&self, snippet: Snippet) -> MapperQuery<'_, R, C> {
        MapperQuery {
            mapper: self,
            snippet,
            loaders: Vec::new(),
            provided: ProvidedProperties::empty(),
        }
    }
}

impl Default for SqlMapper {
    fn default() -> Self {
        Self::new()
    }
}

/// A pending read: a statement, the relations to resolve on its result, and
/// any caller-provided relation values.
#[must_use]
pub struct MapperQuery<'m, R, C: GenericClient> {
    mapper: &'m SqlMapper,
    snippet: Snippet,
    loaders: Vec<Box<dyn RelationLoader<R, C>>>,
    provided: ProvidedProperties,
}

impl<'m, R, C> MapperQuery<'m, R, C>
where
    R: Record,
    C: GenericClient,
{
    /// Attach a relation loader.
    pub fn inject(mut self, loader: impl RelationLoader<R, C> + 'static) -> Self {
        self.loaders.push(Box::new(loader));
        self
    }

    /// Resolve a to-one relation by convention.
    pub fn to_one<P: Record + Clone>(
        self,
        property: &'static str,
        attach: fn(R, Option<P>) -> R,
    ) -> Self {
        self.inject(ToOne::new(property, attach))
    }

    /// Resolve a to-one relation with explicit join overrides.
    pub fn to_one_with<P: Record + Clone>(
        self,
        property: &'static str,
        spec: ToOneSpec,
        attach: fn(R, Option<P>) -> R,
    ) -> Self {
        self.inject(ToOne::new(property, attach).with_spec(spec))
    }

    /// Resolve a one-to-many relation by convention.
    pub fn one_to_many<Ch: Record>(
        self,
        property: &'static str,
        attach: fn(R, Vec<Ch>) -> R,
    ) -> Self {
        self.inject(OneToMany::new(property, attach))
    }

    /// Resolve a one-to-many relation with explicit join overrides.
    pub fn one_to_many_with<Ch: Record>(
        self,
        property: &'static str,
        spec: OneToManySpec,
        attach: fn(R, Vec<Ch>) -> R,
    ) -> Self {
        self.inject(OneToMany::new(property, attach).with_spec(spec))
    }

    /// Resolve a many-to-many relation by convention.
    pub fn many_to_many<Ch: Record + Clone>(
        self,
        property: &'static str,
        attach: fn(R, Vec<Ch>) -> R,
    ) -> Self {
        self.inject(ManyToMany::new(property, attach))
    }

    /// Resolve a many-to-many relation with explicit join overrides.
    pub fn many_to_many_with<Ch: Record + Clone>(
        self,
        property: &'static str,
        spec: ManyToManySpec,
        attach: fn(R, Vec<Ch>) -> R,
    ) -> Self {
        self.inject(ManyToMany::new(property, attach).with_spec(spec))
    }

    /// Supply already-known to-one values so injection can skip its query.
    pub fn provide<P, I>(mut self, property: &str, values: I) -> Self
    where
        P: Send + Sync + 'static,
        I: IntoIterator<Item = (SqlValue, P)>,
    {
        self.provided = self.provided.with(property, values);
        self
    }

    /// Run the statement, map every row, resolve relations, return the batch.
    pub async fn fetch_all(self, conn: &C) -> MapperResult<Vec<R>> {
        let mut rows = self.snippet.fetch_all_as::<R>(conn).await?;
        for loader in &self.loaders {
            tracing::debug!(property = loader.property(), "injecting relation");
            rows = loader.inject(self.mapper, conn, &self.provided, rows).await?;
        }
        Ok(rows)
    }

    /// Like [`fetch_all`](Self::fetch_all), returning the first record, if
    /// any.
    pub async fn fetch_opt(self, conn: &C) -> MapperResult<Option<R>> {
        Ok(self.fetch_all(conn).await?.into_iter().next())
    }

    /// Like [`fetch_all`](Self::fetch_all), requiring at least one record.
    pub async fn fetch_one(self, conn: &C) -> MapperResult<R> {
        self.fetch_all(conn)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| MapperError::not_found("Expected one row, got none"))
    }
}

fn no_pk_error<R: Record>(operation: &str) -> MapperError {
    MapperError::metadata(format!(
        "record {} maps no primary key; {operation} is keyed by primary key",
        R::record_name()
    ))
}

fn apply_generated_pk<R: Record>(
    mapping: &RecordMapping<R>,
    record: R,
    generated: Option<SqlValue>,
) -> MapperResult<R> {
    match generated {
        None => Ok(record),
        Some(value) => {
            let pk = mapping.pk_binding().ok_or_else(|| {
                MapperError::metadata(format!(
                    "primary-key generator produced a value but record {} maps no primary key",
                    R::record_name()
                ))
            })?;
            pk.set(record, value)
        }
    }
}

/// `INSERT INTO table (cols...) VALUES (params...)`, with or without the
/// primary-key column.
pub(crate) fn insert_statement<R: Record>(
    mapping: &RecordMapping<R>,
    record: &R,
    with_pk: bool,
) -> Snippet {
    let bindings: Vec<_> = if with_pk {
        mapping.bindings().iter().collect()
    } else {
        mapping.bindings_without_pk().collect()
    };

    if bindings.is_empty() {
        return Snippet::raw(format!(
            "INSERT INTO {} DEFAULT VALUES",
            mapping.table_name()
        ));
    }

    let columns = bindings
        .iter()
        .map(|b| b.column())
        .collect::<Vec<_>>()
        .join(", ");

    let mut b = Snippet::builder();
    b.push(&format!(
        "INSERT INTO {} ({}) VALUES (",
        mapping.table_name(),
        columns
    ));
    b.push_snippet(Snippet::params(bindings.iter().map(|bind| bind.get(record))));
    b.push(")");
    b.build()
}

/// One `INSERT` covering every record: the first row as a full statement,
/// each further row appended as `, (params...)`.
pub(crate) fn multi_row_insert_statement<R: Record>(
    mapping: &RecordMapping<R>,
    records: &[R],
    with_pk: bool,
) -> MapperResult<Snippet> {
    let bindings: Vec<_> = if with_pk {
        mapping.bindings().iter().collect()
    } else {
        mapping.bindings_without_pk().collect()
    };

    if bindings.is_empty() && records.len() > 1 {
        return Err(MapperError::validation(format!(
            "record {} maps no insertable columns; multi-row insert is not expressible",
            R::record_name()
        )));
    }

    let mut builder = Snippet::builder();
    for (i, record) in records.iter().enumerate() {
        if i == 0 {
            builder.push_snippet(insert_statement(mapping, record, with_pk));
        } else {
            builder.push(", (");
            builder.push_snippet(Snippet::params(bindings.iter().map(|b| b.get(record))));
            builder.push(")");
        }
    }
    Ok(builder.build())
}

/// `UPDATE table SET col = $n, ... WHERE pk = $n`.
pub(crate) fn update_statement<R: Record>(
    mapping: &RecordMapping<R>,
    record: &R,
) -> MapperResult<Snippet> {
    let pk = mapping
        .pk_binding()
        .ok_or_else(|| no_pk_error::<R>("update"))?;

    let assignments: Vec<Snippet> = mapping
        .bindings_without_pk()
        .map(|binding| {
            let mut sb = Snippet::builder();
            sb.push(&format!("{} = ", binding.column()));
            sb.push_param(binding.get(record));
            sb.build()
        })
        .collect();

    if assignments.is_empty() {
        return Err(MapperError::validation(format!(
            "record {} maps only its primary key; nothing to update",
            R::record_name()
        )));
    }

    let mut b = Snippet::builder();
    b.push(&format!("UPDATE {} SET ", mapping.table_name()));
    b.push_snippet(Snippet::comma_separated(assignments));
    b.push(&format!(" WHERE {} = ", pk.column()));
    b.push_param(pk.get(record));
    Ok(b.build())
}

/// `DELETE FROM table WHERE pk = $1`.
pub(crate) fn delete_statement<R: Record>(
    mapping: &RecordMapping<R>,
    pk_value: SqlValue,
) -> MapperResult<Snippet> {
    let pk = mapping
        .pk_binding()
        .ok_or_else(|| no_pk_error::<R>("delete"))?;

    let mut b = Snippet::builder();
    b.push(&format!(
        "DELETE FROM {} WHERE {} = ",
        mapping.table_name(),
        pk.column()
    ));
    b.push_param(pk_value);
    Ok(b.build())
}

/// Partial `UPDATE` over the declared properties named in `values`, in
/// mapping declaration order. `None` when nothing matches.
pub(crate) fn patch_statement<R: Record>(
    mapping: &RecordMapping<R>,
    pk_value: SqlValue,
    values: &HashMap<String, SqlValue>,
) -> MapperResult<Option<Snippet>> {
    let pk = mapping
        .pk_binding()
        .ok_or_else(|| no_pk_error::<R>("patch"))?;

    let mut b = Snippet::builder();
    b.push(&format!("UPDATE {} SET ", mapping.table_name()));

    let mut matched = false;
    for binding in mapping.bindings() {
        let Some(value) = values.get(binding.property()) else {
            continue;
        };
        if matched {
            b.push(", ");
        }
        b.push(&format!("{} = ", binding.column()));
        b.push_param(value.clone());
        matched = true;
    }

    if !matched {
        return Ok(None);
    }

    b.push(&format!(" WHERE {} = ", pk.column()));
    b.push_param(pk_value);
    Ok(Some(b.build()))
}

fn with_returning(stmt: Snippet, column: &str) -> Snippet {
    let mut b = Snippet::builder();
    b.push_snippet(stmt);
    b.push(&format!(" RETURNING {column}"));
    b.build()
}
