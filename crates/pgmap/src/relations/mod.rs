//! Batched relation injection.
//!
//! Loaders resolve to-one, one-to-many, and many-to-many properties for a
//! batch of already-fetched parent records. Each loader issues its secondary
//! queries once per batch (`WHERE col = ANY($1)` over the collected key set),
//! never once per row.

mod loaders;
mod provided;


pub use loaders::{ManyToMany, OneToMany, RelationLoader, ToOne};
pub use provided::{ProvidedProperties, ProvidedValues};

/// Overrides for a to-one relation.
///
/// Defaults when a field is `None`: the foreign-key property is
/// `{property}_id` on the parent, and the referenced column is the related
/// type's primary key.
#[derive(Debug, Clone, Default)]
pub struct ToOneSpec {
    pub fk_property: Option<&'static str>,
    pub referenced_column: Option<&'static str>,
}

/// Overrides for a one-to-many relation.
///
/// Default foreign-key property on the child: `{parent_table}_id`.
#[derive(Debug, Clone, Default)]
pub struct OneToManySpec {
    pub fk_property: Option<&'static str>,
}

/// Overrides for a many-to-many relation.
///
/// Defaults: join table `{parent_table}_{child_table}` with columns
/// `{parent_table}_id` and `{child_table}_id`.
#[derive(Debug, Clone, Default)]
pub struct ManyToManySpec {
    pub join_table: Option<&'static str>,
    pub self_column: Option<&'static str>,
    pub other_column: Option<&'static str>,
}
