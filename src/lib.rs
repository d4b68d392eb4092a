//! MQL: filtering and projection of semi-structured events.
//!
//! Subscribers register queries of the form
//! `select <fields> from stream [where <predicate>]`. For each incoming event
//! the engine decides which queries match and builds each one's projected
//! sub-document, walking every distinct path once across all queries.
//!
//! ```
//! use mql::{Value, build_superset_plan, parse};
//! use serde_json::json;
//!
//! let query = parse("latency", "select e['events'][*]['path'] where e['events'][*]['latency'] > 450.0").unwrap();
//! let event = Value::from(json!({ "events": [{ "path": "/a", "latency": 123.1 }, { "path": "/b", "latency": 500.22 }] }));
//! assert!(query.matches(&event));
//!
//! let plan = build_superset_plan([query]);
//! assert!(plan.evaluate(&event)["latency"].matched);
//! ```

pub mod config;
pub mod error;
pub mod registry;
pub mod sample;

// --- Public API ---
pub use config::EngineConfig;
pub use error::MqlError;
pub use mql_query::{
    CompareOp, EventSource, Expr, ParseError, ParseOptions, PathExpression, PathSegment, Query, SampleConfig,
    SampleStrategy, SelectItem, Statement,
};
pub use mql_superset::{MergedPlan, PathId, PathTable, QueryOutcome};
pub use mql_types::{Map, Number, Value};
pub use registry::QueryRegistry;
pub use sample::Sampler;

use std::borrow::Borrow;

/// Parses `text` into a query registered under `subscription_id`.
pub fn parse(subscription_id: impl Into<String>, text: &str) -> Result<Query, ParseError> {
    Query::new(subscription_id, text)
}

/// Parses `text` into its syntax tree alone.
pub fn parse_statement(text: &str) -> Result<Statement, ParseError> {
    mql_query::parse(text)
}

/// Merges already-parsed queries into one plan.
pub fn build_superset_plan<I, Q>(queries: I) -> MergedPlan
where
    I: IntoIterator<Item = Q>,
    Q: Borrow<Query>,
{
    mql_superset::build_plan(queries)
}
