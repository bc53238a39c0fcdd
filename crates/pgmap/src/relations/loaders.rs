use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use super::{ManyToManySpec, OneToManySpec, ProvidedProperties, ToOneSpec};
use crate::client::GenericClient;
use crate::error::{MapperError, MapperResult};
use crate::mapper::SqlMapper;
use crate::meta::Record;
use crate::snippet::Snippet;
use crate::value::SqlValue;

/// Resolves one relation property for a batch of parent records.
#[async_trait]
pub trait RelationLoader<R, C>: Send + Sync
where
    C: GenericClient,
{
    /// The parent property this loader populates.
    fn property(&self) -> &'static str;

    /// Resolve the relation for the whole batch and attach the results.
    async fn inject(
        &self,
        mapper: &SqlMapper,
        conn: &C,
        provided: &ProvidedProperties,
        rows: Vec<R>,
    ) -> MapperResult<Vec<R>>;
}

/// A to-one relation: the parent carries a foreign key referencing the
/// related record's primary key.
pub struct ToOne<R, P> {
    property: &'static str,
    spec: ToOneSpec,
    attach: fn(R, Option<P>) -> R,
}

impl<R, P> ToOne<R, P> {
    pub fn new(property: &'static str, attach: fn(R, Option<P>) -> R) -> Self {
        Self {
            property,
            spec: ToOneSpec::default(),
            attach,
        }
    }

    pub fn with_spec(mut self, spec: ToOneSpec) -> Self {
        self.spec = spec;
        self
    }
}

#[async_trait]
impl<R, P, C> RelationLoader<R, C> for ToOne<R, P>
where
    R: Record,
    P: Record + Clone,
    C: GenericClient,
{
    fn property(&self) -> &'static str {
        self.property
    }

    async fn inject(
        &self,
        mapper: &SqlMapper,
        conn: &C,
        provided: &ProvidedProperties,
        rows: Vec<R>,
    ) -> MapperResult<Vec<R>> {
        if rows.is_empty() {
            return Ok(rows);
        }

        let parent = mapper.registry().mapping::<R>(conn).await?;
        let fk_property = self
            .spec
            .fk_property
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}_id", self.property));
        let fk = parent.binding(&fk_property).ok_or_else(|| {
            MapperError::metadata(format!(
                "to-one relation {} of record {} has no foreign-key property {}",
                self.property,
                R::record_name(),
                fk_property
            ))
        })?;

        let keys: HashSet<SqlValue> = rows
            .iter()
            .map(|r| fk.get(r))
            .filter(|v| !v.is_null())
            .collect();

        // Caller-provided values short-circuit the secondary query, but only
        // when they cover every key in the batch.
        if let Some(values) = provided.lookup(self.property) {
            if keys.iter().all(|k| values.contains(k)) {
                tracing::debug!(property = self.property, "to-one resolved from provided values");
                return Ok(rows
                    .into_iter()
                    .map(|r| {
                        let key = fk.get(&r);
                        let related = if key.is_null() {
                            None
                        } else {
                            values.get::<P>(&key)
                        };
                        (self.attach)(r, related)
                    })
                    .collect());
            }
        }

        let mut lookup: HashMap<SqlValue, P> = HashMap::new();
        if !keys.is_empty() {
            let related = mapper.registry().mapping::<P>(conn).await?;
            let referenced = match self.spec.referenced_column {
                Some(column) => related.binding_for_column(column).ok_or_else(|| {
                    MapperError::metadata(format!(
                        "record {} maps no column {} referenced by to-one relation {}",
                        P::record_name(),
                        column,
                        self.property
                    ))
                })?,
                None => related.pk_binding().ok_or_else(|| {
                    MapperError::metadata(format!(
                        "to-one relation {} requires a primary key on record {}",
                        self.property,
                        P::record_name()
                    ))
                })?,
            };

            let mut b = Snippet::builder();
            b.push(&format!(
                "SELECT * FROM {} WHERE {} = ",
                related.table_name(),
                referenced.column()
            ));
            b.push_snippet(Snippet::any_of(keys.into_iter().collect::<Vec<_>>()));

            for record in b.build().fetch_all_as::<P>(conn).await? {
                lookup.insert(referenced.get(&record), record);
            }
        }

        Ok(rows
            .into_iter()
            .map(|r| {
                let key = fk.get(&r);
                let related = if key.is_null() {
                    None
                } else {
                    lookup.get(&key).cloned()
                };
                (self.attach)(r, related)
            })
            .collect())
    }
}

/// A one-to-many relation: child rows carry a foreign key referencing the
/// parent's primary key.
pub struct OneToMany<R, Ch> {
    property: &'static str,
    spec: OneToManySpec,
    attach: fn(R, Vec<Ch>) -> R,
}

impl<R, Ch> OneToMany<R, Ch> {
    pub fn new(property: &'static str, attach: fn(R, Vec<Ch>) -> R) -> Self {
        Self {
            property,
            spec: OneToManySpec::default(),
            attach,
        }
    }

    pub fn with_spec(mut self, spec: OneToManySpec) -> Self {
        self.spec = spec;
        self
    }
}

#[async_trait]
impl<R, Ch, C> RelationLoader<R, C> for OneToMany<R, Ch>
where
    R: Record,
    Ch: Record,
    C: GenericClient,
{
    fn property(&self) -> &'static str {
        self.property
    }

    async fn inject(
        &self,
        mapper: &SqlMapper,
        conn: &C,
        _provided: &ProvidedProperties,
        rows: Vec<R>,
    ) -> MapperResult<Vec<R>> {
        if rows.is_empty() {
            return Ok(rows);
        }

        let parent = mapper.registry().mapping::<R>(conn).await?;
        let parent_pk = parent.pk_binding().ok_or_else(|| {
            MapperError::metadata(format!(
                "one-to-many relation {} requires a primary key on record {}",
                self.property,
                R::record_name()
            ))
        })?;

        let keys: HashSet<SqlValue> = rows
            .iter()
            .map(|r| parent_pk.get(r))
            .filter(|v| !v.is_null())
            .collect();

        let child = mapper.registry().mapping::<Ch>(conn).await?;
        let fk_property = self
            .spec
            .fk_property
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}_id", parent.table_name()));
        let fk = child.binding(&fk_property).ok_or_else(|| {
            MapperError::metadata(format!(
                "one-to-many relation {} of record {} has no foreign-key property {} on record {}",
                self.property,
                R::record_name(),
                fk_property,
                Ch::record_name()
            ))
        })?;

        let mut groups: HashMap<SqlValue, Vec<Ch>> = HashMap::new();
        if !keys.is_empty() {
            let mut b = Snippet::builder();
            b.push(&format!(
                "SELECT * FROM {} WHERE {} = ",
                child.table_name(),
                fk.column()
            ));
            b.push_snippet(Snippet::any_of(keys.into_iter().collect::<Vec<_>>()));

            for record in b.build().fetch_all_as::<Ch>(conn).await? {
                let key = fk.get(&record);
                if key.is_null() {
                    continue;
                }
                groups.entry(key).or_default().push(record);
            }
        }

        Ok(rows
            .into_iter()
            .map(|r| {
                let key = parent_pk.get(&r);
                let children = groups.remove(&key).unwrap_or_default();
                (self.attach)(r, children)
            })
            .collect())
    }
}

/// A many-to-many relation resolved through a join table.
pub struct ManyToMany<R, Ch> {
    property: &'static str,
    spec: ManyToManySpec,
    attach: fn(R, Vec<Ch>) -> R,
}

impl<R, Ch> ManyToMany<R, Ch> {
    pub fn new(property: &'static str, attach: fn(R, Vec<Ch>) -> R) -> Self {
        Self {
            property,
            spec: ManyToManySpec::default(),
            attach,
        }
    }

    pub fn with_spec(mut self, spec: ManyToManySpec) -> Self {
        self.spec = spec;
        self
    }
}

#[async_trait]
impl<R, Ch, C> RelationLoader<R, C> for ManyToMany<R, Ch>
where
    R: Record,
    Ch: Record + Clone,
    C: GenericClient,
{
    fn property(&self) -> &'static str {
        self.property
    }

    async fn inject(
        &self,
        mapper: &SqlMapper,
        conn: &C,
        _provided: &ProvidedProperties,
        rows: Vec<R>,
    ) -> MapperResult<Vec<R>> {
        if rows.is_empty() {
            return Ok(rows);
        }

        let parent = mapper.registry().mapping::<R>(conn).await?;
        let parent_pk = parent.pk_binding().ok_or_else(|| {
            MapperError::metadata(format!(
                "many-to-many relation {} requires a primary key on record {}",
                self.property,
                R::record_name()
            ))
        })?;

        let child = mapper.registry().mapping::<Ch>(conn).await?;
        let child_pk = child.pk_binding().ok_or_else(|| {
            MapperError::metadata(format!(
                "many-to-many relation {} requires a primary key on record {}",
                self.property,
                Ch::record_name()
            ))
        })?;

        let join_table = self
            .spec
            .join_table
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}_{}", parent.table_name(), child.table_name()));
        let self_column = self
            .spec
            .self_column
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}_id", parent.table_name()));
        let other_column = self
            .spec
            .other_column
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}_id", child.table_name()));

        let keys: HashSet<SqlValue> = rows
            .iter()
            .map(|r| parent_pk.get(r))
            .filter(|v| !v.is_null())
            .collect();

        let mut pairs: Vec<(SqlValue, SqlValue)> = Vec::new();
        if !keys.is_empty() {
            let mut b = Snippet::builder();
            b.push(&format!(
                "SELECT {self_column}, {other_column} FROM {join_table} WHERE {self_column} = "
            ));
            b.push_snippet(Snippet::any_of(keys.into_iter().collect::<Vec<_>>()));

            for row in b.build().fetch_all(conn).await? {
                pairs.push((
                    SqlValue::from_row_column(&row, 0)?,
                    SqlValue::from_row_column(&row, 1)?,
                ));
            }
        }

        let target_keys: Vec<SqlValue> = pairs
            .iter()
            .map(|(_, other)| other.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let mut children_by_pk: HashMap<SqlValue, Ch> = HashMap::new();
        if !target_keys.is_empty() {
            let mut b = Snippet::builder();
            b.push(&format!(
                "SELECT * FROM {} WHERE {} = ",
                child.table_name(),
                child_pk.column()
            ));
            b.push_snippet(Snippet::any_of(target_keys));

            for record in b.build().fetch_all_as::<Ch>(conn).await? {
                children_by_pk.insert(child_pk.get(&record), record);
            }
        }

        let mut groups: HashMap<SqlValue, Vec<Ch>> = HashMap::new();
        for (self_key, other_key) in pairs {
            if let Some(record) = children_by_pk.get(&other_key) {
                groups.entry(self_key).or_default().push(record.clone());
            }
        }

        Ok(rows
            .into_iter()
            .map(|r| {
                let key = parent_pk.get(&r);
                let children = groups.remove(&key).unwrap_or_default();
                (self.attach)(r, children)
            })
            .collect())
    }
}
