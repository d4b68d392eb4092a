//! Defines the Abstract Syntax Tree (AST) for MQL queries.
//!
//! `Expr` and `SelectItem` are generic over how a path is referenced. Parsed
//! queries hold `PathExpression`s directly; the superset optimizer rebinds the
//! same trees onto indices into its shared path table.
use mql_types::Value;
use regex::Regex;
use serde::Deserialize;
use std::fmt;

/// One step of a path expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Exact object-field access (`['key']`).
    Key(String),
    /// List access (`[2]`, `[-1]`). Negative indexes count from the end.
    Index(i64),
    /// Every element of a list or every value of an object (`[*]`).
    Wildcard,
    /// Every object field whose key starts with the prefix (`[^'result']`).
    Prefix(String),
}

/// An ordered sequence of segments, rooted at the event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct PathExpression {
    segments: Vec<PathSegment>,
}

impl PathExpression {
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    /// Shorthand for a single top-level field, what a bare identifier means.
    pub fn field(name: impl Into<String>) -> Self {
        Self::new(vec![PathSegment::Key(name.into())])
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// True if resolution can yield more than one result.
    pub fn fans_out(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, PathSegment::Wildcard | PathSegment::Prefix(_)))
    }
}

impl fmt::Display for PathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e")?;
        for segment in &self.segments {
            match segment {
                PathSegment::Key(k) => write!(f, "[{}]", quote(k))?,
                PathSegment::Index(i) => write!(f, "[{}]", i)?,
                PathSegment::Wildcard => write!(f, "[*]")?,
                PathSegment::Prefix(p) => write!(f, "[^{}]", quote(p))?,
            }
        }
        Ok(())
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// A single entry of the SELECT list.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem<P = PathExpression> {
    /// `*`: the whole event.
    All,
    Path { path: P, alias: Option<String> },
}

impl<P> SelectItem<P> {
    pub fn map_path<Q>(&self, f: &mut impl FnMut(&P) -> Q) -> SelectItem<Q> {
        match self {
            SelectItem::All => SelectItem::All,
            SelectItem::Path { path, alias } => SelectItem::Path {
                path: f(path),
                alias: alias.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    RegexMatch,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Neq => "!=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::RegexMatch => "=~",
        }
    }
}

/// A compiled regular expression literal, matched against the whole string.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub(crate) fn new(source: String, regex: Regex) -> Self {
        Self { source, regex }
    }

    /// The pattern as written in the query, without delimiters or anchors.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// A WHERE-clause expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr<P = PathExpression> {
    Literal(Value),
    BoolLiteral(bool),
    Regex(Pattern),
    FieldRef(P),
    Compare {
        left: Box<Expr<P>>,
        op: CompareOp,
        right: Box<Expr<P>>,
    },
    And(Box<Expr<P>>, Box<Expr<P>>),
    Or(Box<Expr<P>>, Box<Expr<P>>),
    Not(Box<Expr<P>>),
}

impl<P> Expr<P> {
    /// Rebuilds the tree with every path reference replaced by `f(path)`.
    pub fn map_paths<Q>(&self, f: &mut impl FnMut(&P) -> Q) -> Expr<Q> {
        match self {
            Expr::Literal(v) => Expr::Literal(v.clone()),
            Expr::BoolLiteral(b) => Expr::BoolLiteral(*b),
            Expr::Regex(p) => Expr::Regex(p.clone()),
            Expr::FieldRef(path) => Expr::FieldRef(f(path)),
            Expr::Compare { left, op, right } => {
                let left = Box::new(left.map_paths(f));
                let right = Box::new(right.map_paths(f));
                Expr::Compare { left, op: *op, right }
            }
            Expr::And(l, r) => {
                let l = Box::new(l.map_paths(f));
                Expr::And(l, Box::new(r.map_paths(f)))
            }
            Expr::Or(l, r) => {
                let l = Box::new(l.map_paths(f));
                Expr::Or(l, Box::new(r.map_paths(f)))
            }
            Expr::Not(inner) => Expr::Not(Box::new(inner.map_paths(f))),
        }
    }

    /// Visits every path reference, left to right.
    pub fn visit_paths<'a>(&'a self, f: &mut impl FnMut(&'a P)) {
        match self {
            Expr::Literal(_) | Expr::BoolLiteral(_) | Expr::Regex(_) => {}
            Expr::FieldRef(path) => f(path),
            Expr::Compare { left, right, .. } | Expr::And(left, right) | Expr::Or(left, right) => {
                left.visit_paths(f);
                right.visit_paths(f);
            }
            Expr::Not(inner) => inner.visit_paths(f),
        }
    }
}

/// How a `sample` clause thins the matching stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SampleStrategy {
    Random,
    Sticky,
}

/// The JSON body of a `sample {...}` clause.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SampleConfig {
    pub strategy: SampleStrategy,
    /// Events admitted per `factor` (the engine default is 10000).
    pub threshold: u32,
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub salt: Option<String>,
    #[serde(default)]
    pub factor: Option<u32>,
}

/// The parsed form of `select ... from ... [where ...]` and its optional
/// platform clauses.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub select: Vec<SelectItem>,
    pub stream: String,
    pub window: Option<u64>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<PathExpression>,
    pub sample: Option<SampleConfig>,
}

impl Statement {
    pub fn selects_all(&self) -> bool {
        self.select.iter().any(|item| matches!(item, SelectItem::All))
    }

    /// Every distinct path the statement reads: SELECT, then WHERE, then GROUP BY.
    pub fn referenced_paths(&self) -> Vec<&PathExpression> {
        let mut paths: Vec<&PathExpression> = Vec::new();
        for item in &self.select {
            if let SelectItem::Path { path, .. } = item {
                paths.push(path);
            }
        }
        if let Some(expr) = &self.where_clause {
            expr.visit_paths(&mut |p| paths.push(p));
        }
        paths.extend(self.group_by.iter());

        let mut unique: Vec<&PathExpression> = Vec::with_capacity(paths.len());
        for path in paths {
            if !unique.contains(&path) {
                unique.push(path);
            }
        }
        unique
    }
}
