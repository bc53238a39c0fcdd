//! # pgmap
//!
//! Record-to-table mapping and parameterized SQL generation for PostgreSQL.
//!
//! ## Features
//!
//! - **Declared metadata**: each record type carries a static property table
//!   ([`Record::properties`]), cross-checked against the live database schema
//!   on first use; conflicts fail fast and are never silently resolved
//! - **Composable SQL**: [`Snippet`] keeps SQL text and parameters together;
//!   placeholders are generated by position, so fragments concatenate safely
//! - **Pluggable keys**: primary keys are database-generated (retrieved via
//!   `RETURNING`) or application-generated ([`PkStrategy`])
//! - **Batched relations**: to-one, one-to-many, and many-to-many properties
//!   resolve with one secondary query per relation per fetched batch
//! - **Transaction-friendly**: every operation takes any [`GenericClient`],
//!   whether a connection, a pooled client, or a transaction
//!
//! ## Usage
//!
//! ```ignore
//! use pgmap::{sql, SqlMapper};
//!
//! let mapper = SqlMapper::new();
//!
//! // INSERT person(name, age) VALUES ($1, $2) RETURNING id
//! let ann = mapper.insert(&client, Person { id: 0, name: "Ann".into(), age: 30 }).await?;
//!
//! // one query for the people, one per injected relation
//! let people = mapper
//!     .query::<Person, _>(sql("SELECT * FROM person ORDER BY id"))
//!     .one_to_many("addresses", |p, addresses| Person { addresses, ..p })
//!     .fetch_all(&client)
//!     .await?;
//!
//! mapper.patch::<Person>(&client, ann.id, &values).await?;
//! ```

pub mod client;
pub mod error;
pub mod mapper;
pub mod meta;
pub mod relations;
pub mod row;
pub mod schema;
pub mod snippet;
pub mod value;

pub use client::{BatchStatement, GenericClient};
pub use error::{MapperError, MapperResult};
pub use mapper::{MapperQuery, SqlMapper};
pub use meta::{
    ColumnNamer, MappingRegistry, PkStrategy, PropertyBinding, PropertyDecl, Record,
    RecordMapping, SnakeCaseNamer, table_name_of,
};
pub use relations::{
    ManyToMany, ManyToManySpec, OneToMany, OneToManySpec, ProvidedProperties, ProvidedValues,
    RelationLoader, ToOne, ToOneSpec,
};
pub use row::{FromRow, RowExt};
pub use schema::{ColumnMetaData, Dialect, PostgresDialect, SchemaRegistry, TableMetaData};
pub use snippet::{Snippet, SnippetBuilder, sql};
pub use value::SqlValue;

#[cfg(feature = "pool")]
pub mod pool;

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_with_config, create_pool_with_tls};
