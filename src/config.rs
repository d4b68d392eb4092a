use crate::error::MqlError;
use mql_query::ParseOptions;
use serde::Deserialize;

/// Engine-wide settings. Every field has a default, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of registered queries. `None` means unbounded.
    pub max_queries: Option<usize>,
    /// Upper bound on the compiled size of each regex literal, in bytes (default: 1 MiB)
    pub regex_size_limit: usize,
    /// Deepest allowed nesting of parentheses and negations (default: 64)
    pub max_nesting: usize,
    /// Denominator for sample thresholds (default: 10000)
    pub sample_factor: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_queries: None,
            regex_size_limit: ParseOptions::default().regex_size_limit,
            max_nesting: ParseOptions::default().max_nesting,
            sample_factor: 10_000,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, MqlError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_max_queries(limit: usize) -> Self {
        Self {
            max_queries: Some(limit),
            ..Default::default()
        }
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            regex_size_limit: self.regex_size_limit,
            max_nesting: self.max_nesting,
        }
    }
}
