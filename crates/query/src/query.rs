use crate::ast::{PathExpression, SampleConfig, Statement};
use crate::engine::matches_with;
use crate::error::ParseError;
use crate::parser::{ParseOptions, parse_with};
use crate::projector::{project_paths, project_with};
use crate::resolver::EventSource;
use mql_types::Value;

/// A parsed subscription: the raw text, its AST and the id it was registered under.
///
/// Immutable once built; share it freely across threads.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    subscription_id: String,
    raw_query: String,
    statement: Statement,
}

impl Query {
    pub fn new(subscription_id: impl Into<String>, text: &str) -> Result<Self, ParseError> {
        Self::with_options(subscription_id, text, &ParseOptions::default())
    }

    pub fn with_options(
        subscription_id: impl Into<String>,
        text: &str,
        options: &ParseOptions,
    ) -> Result<Self, ParseError> {
        let statement = parse_with(text, options)?;
        Ok(Self {
            subscription_id: subscription_id.into(),
            raw_query: text.to_string(),
            statement,
        })
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn raw_query(&self) -> &str {
        &self.raw_query
    }

    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    pub fn sample(&self) -> Option<&SampleConfig> {
        self.statement.sample.as_ref()
    }

    /// True if the event satisfies the WHERE clause (always, without one).
    pub fn matches(&self, event: &Value) -> bool {
        match &self.statement.where_clause {
            Some(expr) => matches_with(expr, &EventSource::new(event)),
            None => true,
        }
    }

    /// The SELECT list applied to the event.
    pub fn project(&self, event: &Value) -> Value {
        project_with(&self.statement.select, &EventSource::new(event), event)
    }

    pub fn referenced_paths(&self) -> Vec<&PathExpression> {
        self.statement.referenced_paths()
    }

    /// Everything a downstream stage needs to finish this query: every path it
    /// selects, filters on or groups by.
    pub fn needed_projection(&self, event: &Value) -> Value {
        if self.statement.selects_all() {
            return event.clone();
        }
        project_paths(self.referenced_paths(), &EventSource::new(event))
    }
}
