//! Structural interning of path expressions.
use mql_query::PathExpression;
use std::collections::HashMap;
use std::fmt;

/// An index into a [`PathTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathId(usize);

impl PathId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The deduplicated union of every path a set of queries reads.
///
/// Two paths are the same entry iff their segment sequences are equal.
#[derive(Debug, Clone, Default)]
pub struct PathTable {
    paths: Vec<PathExpression>,
    ids: HashMap<PathExpression, PathId>,
}

impl PathTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id of `path`, adding it on first sight.
    pub fn intern(&mut self, path: &PathExpression) -> PathId {
        if let Some(id) = self.ids.get(path) {
            return *id;
        }
        let id = PathId(self.paths.len());
        self.paths.push(path.clone());
        self.ids.insert(path.clone(), id);
        id
    }

    pub fn get(&self, id: PathId) -> &PathExpression {
        &self.paths[id.0]
    }

    pub fn id_of(&self, path: &PathExpression) -> Option<PathId> {
        self.ids.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = PathId> + '_ {
        (0..self.paths.len()).map(PathId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PathId, &PathExpression)> {
        self.paths.iter().enumerate().map(|(i, p)| (PathId(i), p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structurally_equal_paths_share_an_id() {
        let mut table = PathTable::new();
        let a = table.intern(&PathExpression::field("version"));
        let b = table.intern(&PathExpression::field("result"));
        let c = table.intern(&PathExpression::field("version"));
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(b), &PathExpression::field("result"));
        assert_eq!(table.id_of(&PathExpression::field("version")), Some(a));
        assert_eq!(table.id_of(&PathExpression::field("nope")), None);
    }

    #[test]
    fn test_ids_follow_insertion_order() {
        let mut table = PathTable::new();
        for name in ["c", "a", "b", "a"] {
            table.intern(&PathExpression::field(name));
        }
        let names: Vec<String> = table.iter().map(|(_, p)| p.to_string()).collect();
        assert_eq!(names, vec!["e['c']", "e['a']", "e['b']"]);
        assert_eq!(table.ids().map(PathId::index).collect::<Vec<_>>(), vec![0, 1, 2]);
    }
}
