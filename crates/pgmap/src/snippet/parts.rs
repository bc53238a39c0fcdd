#[derive(Debug, Clone)]
pub(crate) enum SqlPart {
    /// Literal SQL text.
    Raw(String),
    /// A positional parameter marker, rendered as `$n`.
    Param,
}
