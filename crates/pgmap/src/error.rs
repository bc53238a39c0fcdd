//! Error types for pgmap

use thiserror::Error;

/// Result type alias for pgmap operations
pub type MapperResult<T> = Result<T, MapperError>;

/// Error types for mapping and database operations
#[derive(Debug, Error)]
pub enum MapperError {
    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Failure surfaced by the database, propagated unchanged
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Ambiguous or missing column mapping for a declared property
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// The execution layer returned results inconsistent with what was submitted
    #[error("Consistency violation: {0}")]
    Consistency(String),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Defective statement or API usage
    #[error("Validation error: {0}")]
    Validation(String),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),
}

impl MapperError {
    /// Create a metadata error
    pub fn metadata(message: impl Into<String>) -> Self {
        Self::Metadata(message.into())
    }

    /// Create a consistency-violation error
    pub fn consistency(message: impl Into<String>) -> Self {
        Self::Consistency(message.into())
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Check if this is a metadata error
    pub fn is_metadata(&self) -> bool {
        matches!(self, Self::Metadata(_))
    }

    /// Check if this is a consistency violation
    pub fn is_consistency(&self) -> bool {
        matches!(self, Self::Consistency(_))
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for MapperError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}
