//! Builds projected sub-documents from resolved paths.
//!
//! Every resolved value is written back at the position it was found, so
//! `e['req']['url']` projects to `{"req": {"url": ...}}` and list elements keep
//! their index (as written) as an object key. Values are shared with the input
//! event; only the containers along the way are new.
use crate::ast::SelectItem;
use crate::resolver::{Key, Match, PathSource};
use indexmap::IndexMap;
use mql_types::{Map, Value};

/// Projects `select` against `event`, resolving paths through `source`.
pub fn project_with<P, S>(select: &[SelectItem<P>], source: &S, event: &Value) -> Value
where
    S: PathSource<P>,
{
    if select.iter().any(|item| matches!(item, SelectItem::All)) {
        return event.clone();
    }
    let mut builder = ProjectionBuilder::new();
    for item in select {
        if let SelectItem::Path { path, alias } = item {
            let found = source.resolve(path);
            match alias {
                Some(alias) => builder.insert_aliased(alias, &found),
                None => found.iter().for_each(|m| builder.insert(m)),
            }
        }
    }
    builder.finish()
}

/// Projects a set of paths without aliases: the union of everything they
/// reach, merged into one document.
pub fn project_paths<'p, P, S>(paths: impl IntoIterator<Item = &'p P>, source: &S) -> Value
where
    P: 'p,
    S: PathSource<P>,
{
    let mut builder = ProjectionBuilder::new();
    for path in paths {
        for m in source.resolve(path).iter() {
            builder.insert(m);
        }
    }
    builder.finish()
}

#[derive(Debug)]
enum Node {
    /// A complete value taken from the event.
    Leaf(Value),
    /// A container rebuilt key by key.
    Branch(IndexMap<String, Node>),
}

impl Node {
    fn into_value(self) -> Value {
        match self {
            Node::Leaf(v) => v,
            Node::Branch(children) => Value::object(
                children
                    .into_iter()
                    .map(|(k, node)| (k, node.into_value()))
                    .collect::<Map>(),
            ),
        }
    }
}

/// Accumulates resolved values into a single output object.
///
/// When two inserts overlap, the more complete one wins: a whole value
/// replaces a partially rebuilt branch, and nothing is added beneath a value
/// that is already present in full.
#[derive(Debug)]
pub struct ProjectionBuilder {
    root: Node,
}

impl Default for ProjectionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectionBuilder {
    pub fn new() -> Self {
        Self {
            root: Node::Branch(IndexMap::new()),
        }
    }

    /// Writes `m.value` at the position described by `m.path`.
    pub fn insert(&mut self, m: &Match) {
        self.insert_at(&m.path, &m.value);
    }

    fn insert_at(&mut self, path: &[Key], value: &Value) {
        let Some((last, parents)) = path.split_last() else {
            self.root = Node::Leaf(value.clone());
            return;
        };
        let mut node = &mut self.root;
        for key in parents {
            node = match node {
                Node::Branch(children) => children
                    .entry(key.to_field_name().into_owned())
                    .or_insert_with(|| Node::Branch(IndexMap::new())),
                Node::Leaf(_) => return,
            };
        }
        if let Node::Branch(children) = node {
            children.insert(last.to_field_name().into_owned(), Node::Leaf(value.clone()));
        }
    }

    /// Writes the matches of an aliased select item under `alias`.
    ///
    /// A single match is stored as-is. Several are rebuilt below the deepest
    /// key they all share, so `e['errors'][*]['code'] as codes` yields
    /// `{"codes": {"err1": {"code": ...}, ...}}`. No matches adds nothing.
    pub fn insert_aliased(&mut self, alias: &str, matches: &[Match]) {
        let value = match matches {
            [] => return,
            [single] => single.value.clone(),
            many => {
                let shared = common_prefix_len(many);
                let mut nested = ProjectionBuilder::new();
                for m in many {
                    nested.insert_at(&m.path[shared..], &m.value);
                }
                nested.finish()
            }
        };
        if let Node::Branch(children) = &mut self.root {
            children.insert(alias.to_string(), Node::Leaf(value));
        }
    }

    pub fn finish(self) -> Value {
        self.root.into_value()
    }
}

/// Length of the key path every match starts with, leaving at least one key
/// for each.
fn common_prefix_len(matches: &[Match]) -> usize {
    let Some((first, rest)) = matches.split_first() else {
        return 0;
    };
    let limit = matches.iter().map(|m| m.path.len()).min().unwrap_or(0).saturating_sub(1);
    (0..limit)
        .take_while(|&i| rest.iter().all(|m| m.path[i] == first.path[i]))
        .count()
}
