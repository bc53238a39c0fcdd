//! Row mapping traits and utilities

use tokio_postgres::Row;

use crate::error::MapperResult;

/// Trait for converting a database row into a Rust struct.
///
/// # Example
///
/// ```ignore
/// use pgmap::{FromRow, MapperResult, RowExt};
///
/// struct User {
///     id: i64,
///     username: String,
/// }
///
/// impl FromRow for User {
///     fn from_row(row: &tokio_postgres::Row) -> MapperResult<Self> {
///         Ok(Self {
///             id: row.try_get_column("id")?,
///             username: row.try_get_column("username")?,
///         })
///     }
/// }
/// ```
pub trait FromRow: Sized {
    /// Convert a database row into Self
    fn from_row(row: &Row) -> MapperResult<Self>;
}

/// Extension trait for Row to provide typed access
pub trait RowExt {
    /// Try to get a column value, returning `MapperError::Decode` on failure
    fn try_get_column<T>(&self, column: &str) -> MapperResult<T>
    where
        T: for<'a> tokio_postgres::types::FromSql<'a>;
}

impl RowExt for Row {
    fn try_get_column<T>(&self, column: &str) -> MapperResult<T>
    where
        T: for<'a> tokio_postgres::types::FromSql<'a>,
    {
        self.try_get(column)
            .map_err(|e| crate::error::MapperError::decode(column, e.to_string()))
    }
}
