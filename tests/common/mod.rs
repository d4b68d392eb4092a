pub mod fixtures;

use mql::{Query, Value};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Parses a query, panicking with the parse error if it is rejected.
pub fn query(id: &str, text: &str) -> Query {
    mql::parse(id, text).unwrap_or_else(|e| panic!("'{}' failed to parse: {}", text, e))
}

pub fn value(json: serde_json::Value) -> Value {
    Value::from(json)
}
