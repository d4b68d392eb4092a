//! Resolves path expressions against an event.
//!
//! Resolution never fails: a missing key, an out-of-range index or a segment
//! applied to the wrong kind of value simply drops that branch.
use crate::ast::{PathExpression, PathSegment};
use mql_types::Value;
use std::borrow::Cow;
use std::fmt;

/// How a resolved value was reached from its parent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Field(String),
    /// The index as written in the query (`-1` stays `-1`), or the element
    /// position when reached through a wildcard.
    Index(i64),
}

impl Key {
    /// The name used for this key in a projected object.
    pub fn to_field_name(&self) -> Cow<'_, str> {
        match self {
            Key::Field(name) => Cow::Borrowed(name),
            Key::Index(i) => Cow::Owned(i.to_string()),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_field_name())
    }
}

/// One resolved value and the chain of keys leading to it from the root.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub path: Vec<Key>,
    pub value: Value,
}

impl Match {
    /// The terminal key, or `None` for the root itself.
    pub fn key(&self) -> Option<&Key> {
        self.path.last()
    }

    fn child(&self, key: Key, value: &Value) -> Match {
        let mut path = Vec::with_capacity(self.path.len() + 1);
        path.extend(self.path.iter().cloned());
        path.push(key);
        Match {
            path,
            value: value.clone(),
        }
    }
}

/// Folds the path over a working set that starts as the root alone.
///
/// Results are ordered: list elements in list order, object fields in
/// insertion order.
pub fn resolve(path: &PathExpression, root: &Value) -> Vec<Match> {
    let mut working = vec![Match {
        path: Vec::new(),
        value: root.clone(),
    }];
    for segment in path.segments() {
        if working.is_empty() {
            break;
        }
        working = step(segment, &working);
    }
    working
}

fn step(segment: &PathSegment, working: &[Match]) -> Vec<Match> {
    let mut next = Vec::new();
    for current in working {
        match (segment, &current.value) {
            (PathSegment::Key(k), Value::Object(fields)) => {
                if let Some(v) = fields.get(k) {
                    next.push(current.child(Key::Field(k.clone()), v));
                }
            }
            (PathSegment::Index(i), Value::List(items)) => {
                if let Some(v) = effective_index(*i, items.len()).and_then(|idx| items.get(idx)) {
                    next.push(current.child(Key::Index(*i), v));
                }
            }
            (PathSegment::Wildcard, Value::List(items)) => {
                for (idx, v) in items.iter().enumerate() {
                    next.push(current.child(Key::Index(idx as i64), v));
                }
            }
            (PathSegment::Wildcard, Value::Object(fields)) => {
                for (k, v) in fields.iter() {
                    next.push(current.child(Key::Field(k.clone()), v));
                }
            }
            (PathSegment::Prefix(p), Value::Object(fields)) => {
                for (k, v) in fields.iter().filter(|(k, _)| k.starts_with(p.as_str())) {
                    next.push(current.child(Key::Field(k.clone()), v));
                }
            }
            _ => {}
        }
    }
    next
}

/// Maps a possibly negative index onto `0..len`.
pub fn effective_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let idx = if index >= 0 { index } else { len.checked_add(index)? };
    (0..len).contains(&idx).then_some(idx as usize)
}

/// Something that can produce the resolved values of a path reference.
///
/// The evaluator and projector are written against this trait so the same code
/// runs over a live event or over results the superset optimizer already
/// cached.
pub trait PathSource<P> {
    fn resolve(&self, path: &P) -> Cow<'_, [Match]>;
}

/// Resolves paths directly against an event, every time they are asked for.
pub struct EventSource<'v> {
    root: &'v Value,
}

impl<'v> EventSource<'v> {
    pub fn new(root: &'v Value) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &'v Value {
        self.root
    }
}

impl PathSource<PathExpression> for EventSource<'_> {
    fn resolve(&self, path: &PathExpression) -> Cow<'_, [Match]> {
        Cow::Owned(resolve(path, self.root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::PathSegment as S;
    use serde_json::json;

    fn path(segments: Vec<S>) -> PathExpression {
        PathExpression::new(segments)
    }

    fn values(matches: &[Match]) -> Vec<serde_json::Value> {
        matches.iter().map(|m| m.value.to_json()).collect()
    }

    fn event() -> Value {
        Value::from(json!({
            "events": [
                { "path": "/a", "latency": 123.1 },
                { "path": "/b", "latency": 250 },
                { "path": "/c", "latency": 500.22 }
            ],
            "errors": {
                "err1": { "code": "err123" },
                "err2": { "code": "err456" }
            },
            "result_b": "SUCCESS",
            "result_a": "SUCCESS",
            "version": "1.0.1"
        }))
    }

    #[test]
    fn test_key_lookup() {
        let found = resolve(&path(vec![S::Key("version".into())]), &event());
        assert_eq!(values(&found), vec![json!("1.0.1")]);
        assert_eq!(found[0].path, vec![Key::Field("version".into())]);
    }

    #[test]
    fn test_missing_key_is_empty() {
        assert!(resolve(&path(vec![S::Key("nope".into())]), &event()).is_empty());
        assert!(resolve(&path(vec![S::Key("version".into()), S::Key("x".into())]), &event()).is_empty());
    }

    #[test]
    fn test_index_semantics() {
        let list = Value::from(json!({ "l": ["a", "b", "c"] }));
        let at = |i: i64| values(&resolve(&path(vec![S::Key("l".into()), S::Index(i)]), &list));
        assert_eq!(at(0), vec![json!("a")]);
        assert_eq!(at(2), vec![json!("c")]);
        assert_eq!(at(-1), vec![json!("c")]);
        assert_eq!(at(-3), vec![json!("a")]);
        assert!(at(3).is_empty());
        assert!(at(-4).is_empty());
        assert!(at(i64::MIN).is_empty());
    }

    #[test]
    fn test_negative_index_keeps_written_key() {
        let found = resolve(&path(vec![S::Key("events".into()), S::Index(-1)]), &event());
        assert_eq!(found[0].key(), Some(&Key::Index(-1)));
        assert_eq!(found[0].value.get("path"), Some(&Value::from("/c")));
    }

    #[test]
    fn test_negative_index_matches_last_position() {
        for len in 1..6usize {
            let items: Vec<Value> = (0..len as i64).map(Value::from).collect();
            let root = Value::object([("l".to_string(), Value::list(items))].into_iter().collect());
            let last = resolve(&path(vec![S::Key("l".into()), S::Index(-1)]), &root);
            let explicit = resolve(&path(vec![S::Key("l".into()), S::Index(len as i64 - 1)]), &root);
            assert_eq!(last[0].value, explicit[0].value);
        }
    }

    #[test]
    fn test_wildcard_over_list_and_object() {
        let latencies = resolve(
            &path(vec![S::Key("events".into()), S::Wildcard, S::Key("latency".into())]),
            &event(),
        );
        assert_eq!(values(&latencies), vec![json!(123.1), json!(250), json!(500.22)]);
        assert_eq!(
            latencies[1].path,
            vec![
                Key::Field("events".into()),
                Key::Index(1),
                Key::Field("latency".into())
            ]
        );

        let codes = resolve(&path(vec![S::Key("errors".into()), S::Wildcard, S::Key("code".into())]), &event());
        assert_eq!(values(&codes), vec![json!("err123"), json!("err456")]);
    }

    #[test]
    fn test_wildcard_over_scalar_is_empty() {
        assert!(resolve(&path(vec![S::Key("version".into()), S::Wildcard]), &event()).is_empty());
    }

    #[test]
    fn test_prefix_follows_insertion_order() {
        let found = resolve(&path(vec![S::Prefix("result".into())]), &event());
        let keys: Vec<String> = found.iter().map(|m| m.key().unwrap().to_string()).collect();
        assert_eq!(keys, vec!["result_b", "result_a"]);
    }

    #[test]
    fn test_empty_path_is_root() {
        let root = event();
        let found = resolve(&PathExpression::default(), &root);
        assert_eq!(found.len(), 1);
        assert!(found[0].path.is_empty());
        assert!(found[0].value.shares_storage_with(&root));
    }

    #[test]
    fn test_resolution_is_repeatable() {
        let root = event();
        let p = path(vec![S::Key("events".into()), S::Wildcard, S::Key("path".into())]);
        assert_eq!(resolve(&p, &root), resolve(&p, &root));
    }
}
