//! The merged plan and its per-event evaluation.
use crate::path_table::{PathId, PathTable};
use indexmap::IndexMap;
use mql_query::{Expr, Match, PathExpression, PathSource, Query, SampleConfig, SelectItem, matches_with, project_paths, project_with, resolve};
use mql_types::Value;
use once_cell::unsync::OnceCell;
use std::borrow::{Borrow, Cow};

/// A query rebound onto the plan's path table.
#[derive(Debug, Clone)]
pub struct BoundQuery {
    subscription_id: String,
    select: Vec<SelectItem<PathId>>,
    where_clause: Option<Expr<PathId>>,
    referenced: Vec<PathId>,
    sample: Option<SampleConfig>,
}

impl BoundQuery {
    fn bind(query: &Query, table: &mut PathTable) -> Self {
        let statement = query.statement();
        let mut intern = |path: &PathExpression| table.intern(path);
        let select = statement.select.iter().map(|item| item.map_path(&mut intern)).collect();
        let where_clause = statement.where_clause.as_ref().map(|expr| expr.map_paths(&mut intern));
        let referenced = query.referenced_paths().into_iter().map(|p| table.intern(p)).collect();
        Self {
            subscription_id: query.subscription_id().to_string(),
            select,
            where_clause,
            referenced,
            sample: statement.sample.clone(),
        }
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn select(&self) -> &[SelectItem<PathId>] {
        &self.select
    }

    pub fn where_clause(&self) -> Option<&Expr<PathId>> {
        self.where_clause.as_ref()
    }

    /// Every path the query reads, deduplicated, in first-seen order.
    pub fn referenced(&self) -> &[PathId] {
        &self.referenced
    }

    pub fn sample(&self) -> Option<&SampleConfig> {
        self.sample.as_ref()
    }

    pub fn selects_all(&self) -> bool {
        self.select.iter().any(|item| matches!(item, SelectItem::All))
    }

    /// Same result as `Query::matches`, reading from the shared resolutions.
    pub fn matches(&self, resolved: &ResolvedPaths<'_>) -> bool {
        match &self.where_clause {
            Some(expr) => matches_with(expr, resolved),
            None => true,
        }
    }

    /// Same result as `Query::project`, reading from the shared resolutions.
    pub fn project(&self, resolved: &ResolvedPaths<'_>) -> Value {
        project_with(&self.select, resolved, resolved.event())
    }
}

/// One query's result for one event.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub matched: bool,
    /// Present iff `matched`.
    pub projection: Option<Value>,
}

/// Path resolutions for a single event, computed at most once per path.
///
/// Paths are resolved lazily, so a path only read by a WHERE clause that
/// short-circuited earlier is never walked.
pub struct ResolvedPaths<'a> {
    table: &'a PathTable,
    event: &'a Value,
    cache: Vec<OnceCell<Vec<Match>>>,
}

impl<'a> ResolvedPaths<'a> {
    pub fn new(table: &'a PathTable, event: &'a Value) -> Self {
        Self {
            table,
            event,
            cache: (0..table.len()).map(|_| OnceCell::new()).collect(),
        }
    }

    pub fn event(&self) -> &'a Value {
        self.event
    }

    /// Number of paths walked so far.
    pub fn resolved_count(&self) -> usize {
        self.cache.iter().filter(|cell| cell.get().is_some()).count()
    }

    fn matches_of(&self, id: PathId) -> &[Match] {
        self.cache[id.index()].get_or_init(|| resolve(self.table.get(id), self.event))
    }
}

impl PathSource<PathId> for ResolvedPaths<'_> {
    fn resolve(&self, path: &PathId) -> Cow<'_, [Match]> {
        Cow::Borrowed(self.matches_of(*path))
    }
}

/// Many queries merged into a single traversal per event.
///
/// Immutable once built; rebuild it when the query set changes.
#[derive(Debug, Clone, Default)]
pub struct MergedPlan {
    paths: PathTable,
    queries: Vec<BoundQuery>,
}

/// Builds a plan from successfully parsed queries.
///
/// Subscription ids should be unique; if one repeats, the first query wins.
pub fn build_plan<I, Q>(queries: I) -> MergedPlan
where
    I: IntoIterator<Item = Q>,
    Q: Borrow<Query>,
{
    let mut paths = PathTable::new();
    let mut bound: Vec<BoundQuery> = Vec::new();
    for query in queries {
        let query = query.borrow();
        if bound.iter().any(|b| b.subscription_id == query.subscription_id()) {
            log::warn!(
                "Skipping duplicate subscription '{}' while building plan.",
                query.subscription_id()
            );
            continue;
        }
        bound.push(BoundQuery::bind(query, &mut paths));
    }
    log::debug!(
        "Built merged plan: {} queries over {} distinct paths.",
        bound.len(),
        paths.len()
    );
    MergedPlan { paths, queries: bound }
}

impl MergedPlan {
    /// Evaluates every query against one event, keyed by subscription id in
    /// plan order.
    pub fn evaluate(&self, event: &Value) -> IndexMap<String, QueryOutcome> {
        let resolved = self.resolve(event);
        let outcomes: IndexMap<String, QueryOutcome> = self
            .queries
            .iter()
            .map(|query| {
                let matched = query.matches(&resolved);
                let projection = matched.then(|| query.project(&resolved));
                (query.subscription_id.clone(), QueryOutcome { matched, projection })
            })
            .collect();
        log::trace!(
            "Evaluated {} queries, {} matched, {} of {} paths walked.",
            outcomes.len(),
            outcomes.values().filter(|o| o.matched).count(),
            resolved.resolved_count(),
            self.paths.len()
        );
        outcomes
    }

    /// Evaluates a single query of the plan, if present.
    pub fn evaluate_one(&self, subscription_id: &str, event: &Value) -> Option<QueryOutcome> {
        let query = self.query(subscription_id)?;
        let resolved = self.resolve(event);
        let matched = query.matches(&resolved);
        Some(QueryOutcome {
            matched,
            projection: matched.then(|| query.project(&resolved)),
        })
    }

    /// One document holding every path any query reads; the whole event if
    /// any query selects `*`.
    pub fn superset_projection(&self, event: &Value) -> Value {
        if self.queries.iter().any(BoundQuery::selects_all) {
            return event.clone();
        }
        let resolved = self.resolve(event);
        let ids: Vec<PathId> = self.paths.ids().collect();
        project_paths(&ids, &resolved)
    }

    /// A fresh resolution cache for `event`.
    pub fn resolve<'a>(&'a self, event: &'a Value) -> ResolvedPaths<'a> {
        ResolvedPaths::new(&self.paths, event)
    }

    pub fn paths(&self) -> &PathTable {
        &self.paths
    }

    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn queries(&self) -> &[BoundQuery] {
        &self.queries
    }

    pub fn query(&self, subscription_id: &str) -> Option<&BoundQuery> {
        self.queries.iter().find(|q| q.subscription_id == subscription_id)
    }

    pub fn subscription_ids(&self) -> impl Iterator<Item = &str> {
        self.queries.iter().map(|q| q.subscription_id.as_str())
    }
}
