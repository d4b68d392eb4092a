//! Superset optimization for MQL.
//!
//! Many subscribers usually query the same stream. Instead of walking each
//! event once per query, [`build_plan`] interns every distinct path across all
//! queries into one [`PathTable`] and rebinds each query's SELECT and WHERE
//! trees onto it. Per event, [`MergedPlan::evaluate`] resolves each path at most
//! once and reruns the ordinary evaluator and projector over the cached
//! results, so every query sees exactly what it would have seen alone.

pub mod path_table;
pub mod plan;

pub use path_table::{PathId, PathTable};
pub use plan::{BoundQuery, MergedPlan, QueryOutcome, ResolvedPaths, build_plan};
