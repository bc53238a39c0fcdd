//! Composable parameterized SQL fragments.
//!
//! A [`Snippet`] is an immutable pair of SQL text and its ordered parameter
//! values. Snippets compose via [`Snippet::concat`],
//! [`Snippet::comma_separated`], and [`SnippetBuilder::push_snippet`], and
//! parameter order always follows text order, so `$1, $2, ...` placeholders
//! are generated correctly no matter how a statement was assembled.
//!
//! # Example
//!
//! ```ignore
//! use pgmap::snippet::{sql, Snippet};
//!
//! let stmt = Snippet::concat([
//!     sql("SELECT * FROM users WHERE status ="),
//!     Snippet::param("active"),
//! ]);
//! assert_eq!(stmt.to_sql(), "SELECT * FROM users WHERE status = $1");
//! ```

mod builder;
mod parts;

#[cfg(test)]
mod tests;

pub use builder::{Snippet, SnippetBuilder};

/// Shorthand for a raw SQL fragment with no parameters.
pub fn sql(text: impl Into<String>) -> Snippet {
    Snippet::raw(text)
}
