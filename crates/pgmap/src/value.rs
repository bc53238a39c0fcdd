//! Dynamic SQL values.
//!
//! [`SqlValue`] is the runtime representation of a single column value as it
//! moves through the engine: property accessors produce it, the snippet layer
//! binds it as a statement parameter, generated-key retrieval decodes it from
//! result rows, and relation injection uses it as a lookup key.

use std::hash::{Hash, Hasher};

use bytes::BytesMut;
use tokio_postgres::Row;
use tokio_postgres::types::{IsNull, ToSql, Type};

use crate::error::{MapperError, MapperResult};

/// A dynamically typed SQL value covering the core Postgres scalar types.
#[derive(Debug, Clone)]
pub enum SqlValue {
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Text(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    Date(chrono::NaiveDate),
    Timestamp(chrono::NaiveDateTime),
    TimestampTz(chrono::DateTime<chrono::Utc>),
    Json(serde_json::Value),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The variant name, used in conversion error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::I16(_) => "i16",
            Self::I32(_) => "i32",
            Self::I64(_) => "i64",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Uuid(_) => "uuid",
            Self::Date(_) => "date",
            Self::Timestamp(_) => "timestamp",
            Self::TimestampTz(_) => "timestamptz",
            Self::Json(_) => "json",
        }
    }

    fn mismatch(&self, expected: &str) -> MapperError {
        MapperError::validation(format!("expected {expected} value, got {}", self.kind()))
    }

    /// Narrow to `i64`, widening from smaller integer variants.
    pub fn as_i64(&self) -> MapperResult<i64> {
        match self {
            Self::I16(v) => Ok(i64::from(*v)),
            Self::I32(v) => Ok(i64::from(*v)),
            Self::I64(v) => Ok(*v),
            other => Err(other.mismatch("integer")),
        }
    }

    /// Narrow to `i64`, mapping `Null` to `None`.
    pub fn as_i64_opt(&self) -> MapperResult<Option<i64>> {
        match self {
            Self::Null => Ok(None),
            other => other.as_i64().map(Some),
        }
    }

    pub fn as_i32(&self) -> MapperResult<i32> {
        match self {
            Self::I16(v) => Ok(i32::from(*v)),
            Self::I32(v) => Ok(*v),
            other => Err(other.mismatch("i32")),
        }
    }

    pub fn as_bool(&self) -> MapperResult<bool> {
        match self {
            Self::Bool(v) => Ok(*v),
            other => Err(other.mismatch("bool")),
        }
    }

    pub fn as_f64(&self) -> MapperResult<f64> {
        match self {
            Self::F32(v) => Ok(f64::from(*v)),
            Self::F64(v) => Ok(*v),
            other => Err(other.mismatch("float")),
        }
    }

    pub fn as_uuid(&self) -> MapperResult<uuid::Uuid> {
        match self {
            Self::Uuid(v) => Ok(*v),
            other => Err(other.mismatch("uuid")),
        }
    }

    pub fn into_text(self) -> MapperResult<String> {
        match self {
            Self::Text(v) => Ok(v),
            other => Err(other.mismatch("text")),
        }
    }

    pub fn into_text_opt(self) -> MapperResult<Option<String>> {
        match self {
            Self::Null => Ok(None),
            other => other.into_text().map(Some),
        }
    }

    pub fn into_json(self) -> MapperResult<serde_json::Value> {
        match self {
            Self::Json(v) => Ok(v),
            other => Err(other.mismatch("json")),
        }
    }

    /// Decode one column of a result row by its Postgres type.
    ///
    /// SQL `NULL` decodes to [`SqlValue::Null`] regardless of column type.
    pub fn from_row_column(row: &Row, idx: usize) -> MapperResult<SqlValue> {
        let column = row.columns().get(idx).ok_or_else(|| {
            MapperError::decode(idx.to_string(), "column index out of range")
        })?;
        let name = column.name().to_string();
        let ty = column.type_();

        let decoded: Result<SqlValue, tokio_postgres::Error> = if *ty == Type::BOOL {
            row.try_get::<_, Option<bool>>(idx)
                .map(|v| v.map_or(Self::Null, Self::Bool))
        } else if *ty == Type::INT2 {
            row.try_get::<_, Option<i16>>(idx)
                .map(|v| v.map_or(Self::Null, Self::I16))
        } else if *ty == Type::INT4 {
            row.try_get::<_, Option<i32>>(idx)
                .map(|v| v.map_or(Self::Null, Self::I32))
        } else if *ty == Type::INT8 {
            row.try_get::<_, Option<i64>>(idx)
                .map(|v| v.map_or(Self::Null, Self::I64))
        } else if *ty == Type::FLOAT4 {
            row.try_get::<_, Option<f32>>(idx)
                .map(|v| v.map_or(Self::Null, Self::F32))
        } else if *ty == Type::FLOAT8 {
            row.try_get::<_, Option<f64>>(idx)
                .map(|v| v.map_or(Self::Null, Self::F64))
        } else if *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR || *ty == Type::NAME {
            row.try_get::<_, Option<String>>(idx)
                .map(|v| v.map_or(Self::Null, Self::Text))
        } else if *ty == Type::BYTEA {
            row.try_get::<_, Option<Vec<u8>>>(idx)
                .map(|v| v.map_or(Self::Null, Self::Bytes))
        } else if *ty == Type::UUID {
            row.try_get::<_, Option<uuid::Uuid>>(idx)
                .map(|v| v.map_or(Self::Null, Self::Uuid))
        } else if *ty == Type::DATE {
            row.try_get::<_, Option<chrono::NaiveDate>>(idx)
                .map(|v| v.map_or(Self::Null, Self::Date))
        } else if *ty == Type::TIMESTAMP {
            row.try_get::<_, Option<chrono::NaiveDateTime>>(idx)
                .map(|v| v.map_or(Self::Null, Self::Timestamp))
        } else if *ty == Type::TIMESTAMPTZ {
            row.try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)
                .map(|v| v.map_or(Self::Null, Self::TimestampTz))
        } else if *ty == Type::JSON || *ty == Type::JSONB {
            row.try_get::<_, Option<serde_json::Value>>(idx)
                .map(|v| v.map_or(Self::Null, Self::Json))
        } else {
            return Err(MapperError::decode(
                name,
                format!("unsupported column type {ty}"),
            ));
        };

        decoded.map_err(|e| MapperError::decode(name, e.to_string()))
    }
}

impl PartialEq for SqlValue {
    fn eq(&self, other: &Self) -> bool {
        use SqlValue::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (I16(a), I16(b)) => a == b,
            (I32(a), I32(b)) => a == b,
            (I64(a), I64(b)) => a == b,
            // Bit-pattern comparison so Eq/Hash stay consistent.
            (F32(a), F32(b)) => a.to_bits() == b.to_bits(),
            (F64(a), F64(b)) => a.to_bits() == b.to_bits(),
            (Text(a), Text(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            (Uuid(a), Uuid(b)) => a == b,
            (Date(a), Date(b)) => a == b,
            (Timestamp(a), Timestamp(b)) => a == b,
            (TimestampTz(a), TimestampTz(b)) => a == b,
            (Json(a), Json(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for SqlValue {}

impl Hash for SqlValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Bool(v) => v.hash(state),
            Self::I16(v) => v.hash(state),
            Self::I32(v) => v.hash(state),
            Self::I64(v) => v.hash(state),
            Self::F32(v) => v.to_bits().hash(state),
            Self::F64(v) => v.to_bits().hash(state),
            Self::Text(v) => v.hash(state),
            Self::Bytes(v) => v.hash(state),
            Self::Uuid(v) => v.hash(state),
            Self::Date(v) => v.hash(state),
            Self::Timestamp(v) => v.hash(state),
            Self::TimestampTz(v) => v.hash(state),
            Self::Json(v) => v.to_string().hash(state),
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            Self::Null => Ok(IsNull::Yes),
            Self::Bool(v) => v.to_sql(ty, out),
            Self::I16(v) => v.to_sql(ty, out),
            Self::I32(v) => v.to_sql(ty, out),
            Self::I64(v) => v.to_sql(ty, out),
            Self::F32(v) => v.to_sql(ty, out),
            Self::F64(v) => v.to_sql(ty, out),
            Self::Text(v) => v.to_sql(ty, out),
            Self::Bytes(v) => v.to_sql(ty, out),
            Self::Uuid(v) => v.to_sql(ty, out),
            Self::Date(v) => v.to_sql(ty, out),
            Self::Timestamp(v) => v.to_sql(ty, out),
            Self::TimestampTz(v) => v.to_sql(ty, out),
            Self::Json(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        // The variant carries the runtime type; per-variant delegation fails
        // on a genuine mismatch.
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i16> for SqlValue {
    fn from(v: i16) -> Self {
        Self::I16(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        Self::I32(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::I64(v)
    }
}

impl From<f32> for SqlValue {
    fn from(v: f32) -> Self {
        Self::F32(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        Self::F64(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<uuid::Uuid> for SqlValue {
    fn from(v: uuid::Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<chrono::NaiveDate> for SqlValue {
    fn from(v: chrono::NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<chrono::NaiveDateTime> for SqlValue {
    fn from(v: chrono::NaiveDateTime) -> Self {
        Self::Timestamp(v)
    }
}

impl From<chrono::DateTime<chrono::Utc>> for SqlValue {
    fn from(v: chrono::DateTime<chrono::Utc>) -> Self {
        Self::TimestampTz(v)
    }
}

impl From<serde_json::Value> for SqlValue {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}
