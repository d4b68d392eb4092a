use thiserror::Error;

/// A query that does not conform to the MQL grammar.
///
/// `position` is a byte offset into the original query text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("MQL parse error at position {position}: expected {expected}, found {found}")]
pub struct ParseError {
    pub position: usize,
    pub expected: String,
    pub found: String,
}
