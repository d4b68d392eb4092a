//! The MQL query language: grammar, path resolution and evaluation.
//!
//! A query is parsed once into a [`Statement`], then applied to any number of
//! events. Evaluation never fails; a path that does not resolve is simply
//! absent, which makes comparisons false and projections omit the field.

pub mod ast;
pub mod engine;
pub mod error;
mod parser;
pub mod projector;
pub mod query;
pub mod resolver;

// --- Public API ---
pub use ast::{CompareOp, Expr, PathExpression, PathSegment, SampleConfig, SampleStrategy, SelectItem, Statement};
pub use engine::{compare_values, matches_with};
pub use error::ParseError;
pub use parser::{ParseOptions, parse, parse_with};
pub use projector::{ProjectionBuilder, project_paths, project_with};
pub use query::Query;
pub use resolver::{EventSource, Key, Match, PathSource, resolve};
