use std::sync::Arc;

use tokio_postgres::types::ToSql;

use super::parts::SqlPart;
use crate::client::{BatchStatement, GenericClient};
use crate::error::{MapperError, MapperResult};
use crate::row::FromRow;

/// An immutable SQL fragment plus its ordered parameter values.
///
/// Parameters are stored separately from text; `$1, $2, ...` placeholders are
/// generated by position when the snippet is rendered, so concatenation never
/// renumbers anything by hand.
#[must_use]
#[derive(Clone)]
pub struct Snippet {
    parts: Vec<SqlPart>,
    params: Vec<Arc<dyn ToSql + Sync + Send>>,
}

impl Snippet {
    /// A raw SQL fragment with no parameters.
    pub fn raw(text: impl Into<String>) -> Self {
        Self {
            parts: vec![SqlPart::Raw(text.into())],
            params: Vec::new(),
        }
    }

    /// An empty fragment.
    pub fn empty() -> Self {
        Self {
            parts: Vec::new(),
            params: Vec::new(),
        }
    }

    /// A single placeholder bound to `value`.
    pub fn param<T>(value: T) -> Self
    where
        T: ToSql + Sync + Send + 'static,
    {
        Self {
            parts: vec![SqlPart::Param],
            params: vec![Arc::new(value)],
        }
    }

    /// A comma-separated list of placeholders, one per value.
    pub fn params<I, T>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToSql + Sync + Send + 'static,
    {
        let mut builder = SnippetBuilder::new();
        for (i, v) in values.into_iter().enumerate() {
            if i > 0 {
                builder.push(", ");
            }
            builder.push_param(v);
        }
        builder.build()
    }

    /// `ANY($n)` over a single array parameter, the batched form of an `IN`
    /// list.
    pub fn any_of<T>(values: Vec<T>) -> Self
    where
        T: ToSql + Sync + Send + 'static,
    {
        let mut builder = SnippetBuilder::new();
        builder.push("ANY(").push_param(values).push(")");
        builder.build()
    }

    /// Join snippets with a single space; parameters concatenate left to
    /// right.
    pub fn concat<I>(snippets: I) -> Self
    where
        I: IntoIterator<Item = Snippet>,
    {
        let mut builder = SnippetBuilder::new();
        for (i, s) in snippets.into_iter().enumerate() {
            if i > 0 {
                builder.push(" ");
            }
            builder.push_snippet(s);
        }
        builder.build()
    }

    /// Join snippets with `, `; parameters concatenate left to right.
    pub fn comma_separated<I>(snippets: I) -> Self
    where
        I: IntoIterator<Item = Snippet>,
    {
        let mut builder = SnippetBuilder::new();
        for (i, s) in snippets.into_iter().enumerate() {
            if i > 0 {
                builder.push(", ");
            }
            builder.push_snippet(s);
        }
        builder.build()
    }

    /// Start building a snippet incrementally.
    pub fn builder() -> SnippetBuilder {
        SnippetBuilder::new()
    }

    /// Render SQL with `$1, $2, ...` placeholders.
    pub fn to_sql(&self) -> String {
        let mut cap = 0;
        for part in &self.parts {
            match part {
                SqlPart::Raw(s) => cap += s.len(),
                SqlPart::Param => cap += 3,
            }
        }

        let mut out = String::with_capacity(cap);
        let mut idx = 0usize;
        for part in &self.parts {
            match part {
                SqlPart::Raw(s) => out.push_str(s),
                SqlPart::Param => {
                    idx += 1;
                    out.push('$');
                    out.push_str(&idx.to_string());
                }
            }
        }
        out
    }

    /// Parameter refs compatible with `tokio-postgres`.
    pub fn params_ref(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect()
    }

    /// Number of bound parameters.
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty() && self.params.is_empty()
    }

    /// Placeholder count must equal parameter count; a mismatch is a defect in
    /// snippet assembly, surfaced before anything reaches the database.
    pub fn validate(&self) -> MapperResult<()> {
        let placeholder_count = self
            .parts
            .iter()
            .filter(|p| matches!(p, SqlPart::Param))
            .count();

        if placeholder_count != self.params.len() {
            let params_len = self.params.len();
            return Err(MapperError::Validation(format!(
                "Snippet: placeholders({placeholder_count}) != params({params_len})"
            )));
        }
        Ok(())
    }

    /// Convert into a batch statement for `GenericClient::execute_batch`.
    pub fn into_batch_statement(self) -> MapperResult<BatchStatement> {
        self.validate()?;
        let sql = self.to_sql();
        Ok(BatchStatement {
            sql,
            params: self.params,
        })
    }

    fn prepare(&self) -> MapperResult<(String, Vec<&(dyn ToSql + Sync)>)> {
        self.validate()?;
        Ok((self.to_sql(), self.params_ref()))
    }

    /// Execute and return all rows.
    pub async fn fetch_all(&self, conn: &impl GenericClient) -> MapperResult<Vec<tokio_postgres::Row>> {
        let (sql, params) = self.prepare()?;
        tracing::debug!(sql = %sql, params = params.len(), "query");
        conn.query(&sql, &params).await
    }

    /// Execute and return all rows mapped to `T`.
    pub async fn fetch_all_as<T: FromRow>(&self, conn: &impl GenericClient) -> MapperResult<Vec<T>> {
        let rows = self.fetch_all(conn).await?;
        rows.iter().map(T::from_row).collect()
    }

    /// Execute and return the **first** row.
    pub async fn fetch_one(&self, conn: &impl GenericClient) -> MapperResult<tokio_postgres::Row> {
        let (sql, params) = self.prepare()?;
        tracing::debug!(sql = %sql, params = params.len(), "query one");
        conn.query_one(&sql, &params).await
    }

    /// Execute and return the first row, if any.
    pub async fn fetch_opt(
        &self,
        conn: &impl GenericClient,
    ) -> MapperResult<Option<tokio_postgres::Row>> {
        let (sql, params) = self.prepare()?;
        tracing::debug!(sql = %sql, params = params.len(), "query opt");
        conn.query_opt(&sql, &params).await
    }

    /// Execute and return the affected row count.
    pub async fn execute(&self, conn: &impl GenericClient) -> MapperResult<u64> {
        let (sql, params) = self.prepare()?;
        tracing::debug!(sql = %sql, params = params.len(), "execute");
        conn.execute(&sql, &params).await
    }
}

impl std::fmt::Debug for Snippet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snippet")
            .field("sql", &self.to_sql())
            .field("params", &self.params.len())
            .finish()
    }
}

/// Accumulates SQL text and parameters, then flushes to an immutable
/// [`Snippet`].
///
/// `build()` consumes the builder; start a fresh one per statement.
#[must_use]
#[derive(Default)]
pub struct SnippetBuilder {
    parts: Vec<SqlPart>,
    params: Vec<Arc<dyn ToSql + Sync + Send>>,
}

impl SnippetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw SQL (no parameters).
    pub fn push(&mut self, text: &str) -> &mut Self {
        if text.is_empty() {
            return self;
        }
        match self.parts.last_mut() {
            Some(SqlPart::Raw(last)) => last.push_str(text),
            _ => self.parts.push(SqlPart::Raw(text.to_string())),
        }
        self
    }

    /// Append a placeholder and bind its value.
    pub fn push_param<T>(&mut self, value: T) -> &mut Self
    where
        T: ToSql + Sync + Send + 'static,
    {
        self.parts.push(SqlPart::Param);
        self.params.push(Arc::new(value));
        self
    }

    /// Append another snippet, consuming it.
    pub fn push_snippet(&mut self, snippet: Snippet) -> &mut Self {
        let Snippet { parts, mut params } = snippet;
        for part in parts {
            match part {
                SqlPart::Raw(s) => {
                    self.push(&s);
                }
                SqlPart::Param => self.parts.push(SqlPart::Param),
            }
        }
        self.params.append(&mut params);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Flush to an immutable snippet, consuming the builder.
    pub fn build(self) -> Snippet {
        Snippet {
            parts: self.parts,
            params: self.params,
        }
    }
}
