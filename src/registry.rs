//! Copy-on-write registry of live subscriptions.
//!
//! Readers take a snapshot (`Arc` clone) of the current plan and evaluate
//! against it without holding any lock. Writers parse outside every lock,
//! build a complete new plan, then swap the snapshot under a short write
//! lock, so an evaluation never observes a half-updated plan.
use crate::config::EngineConfig;
use crate::error::MqlError;
use crate::sample::Sampler;
use indexmap::IndexMap;
use mql_query::Query;
use mql_superset::{MergedPlan, QueryOutcome, build_plan};
use mql_types::Value;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

#[derive(Debug, Default)]
struct Snapshot {
    queries: IndexMap<String, Arc<Query>>,
    plan: Arc<MergedPlan>,
}

impl Snapshot {
    fn rebuild(queries: IndexMap<String, Arc<Query>>) -> Self {
        let plan = Arc::new(build_plan(queries.values().map(|q| q.as_ref())));
        Self { queries, plan }
    }
}

pub struct QueryRegistry {
    config: EngineConfig,
    sampler: Sampler,
    /// Serializes writers so two registrations never build from the same base.
    write_guard: Mutex<()>,
    current: RwLock<Arc<Snapshot>>,
}

impl Default for QueryRegistry {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl QueryRegistry {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            sampler: Sampler::new(config.sample_factor),
            config,
            write_guard: Mutex::new(()),
            current: RwLock::new(Arc::new(Snapshot::default())),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, next: Snapshot) {
        let next = Arc::new(next);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    /// Parses and admits a new subscription.
    pub fn register(&self, subscription_id: &str, text: &str) -> Result<(), MqlError> {
        let query = Query::with_options(subscription_id, text, &self.config.parse_options()).map_err(|source| {
            log::warn!("Rejected query '{}': {}", subscription_id, source);
            MqlError::Parse {
                subscription_id: subscription_id.to_string(),
                source,
            }
        })?;

        let _writer = self.write_guard.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot();
        if current.queries.contains_key(subscription_id) {
            log::warn!("Rejected query '{}': id already registered.", subscription_id);
            return Err(MqlError::DuplicateSubscription(subscription_id.to_string()));
        }
        if let Some(limit) = self.config.max_queries
            && current.queries.len() >= limit
        {
            log::warn!("Rejected query '{}': registry is at capacity ({}).", subscription_id, limit);
            return Err(MqlError::CapacityExceeded { limit });
        }

        let mut queries = current.queries.clone();
        queries.insert(subscription_id.to_string(), Arc::new(query));
        let next = Snapshot::rebuild(queries);
        log::info!(
            "Registered query '{}' ({} active, {} distinct paths).",
            subscription_id,
            next.queries.len(),
            next.plan.path_count()
        );
        self.publish(next);
        Ok(())
    }

    /// Removes a subscription, returning its query.
    pub fn deregister(&self, subscription_id: &str) -> Result<Arc<Query>, MqlError> {
        let _writer = self.write_guard.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot();
        let mut queries = current.queries.clone();
        let removed = queries
            .shift_remove(subscription_id)
            .ok_or_else(|| MqlError::UnknownSubscription(subscription_id.to_string()))?;
        let next = Snapshot::rebuild(queries);
        log::info!(
            "Deregistered query '{}' ({} active).",
            subscription_id,
            next.queries.len()
        );
        self.publish(next);
        Ok(removed)
    }

    /// The current plan. It stays valid, and unchanged, after later writes.
    pub fn plan(&self) -> Arc<MergedPlan> {
        self.snapshot().plan.clone()
    }

    pub fn query(&self, subscription_id: &str) -> Option<Arc<Query>> {
        self.snapshot().queries.get(subscription_id).cloned()
    }

    pub fn subscription_ids(&self) -> Vec<String> {
        self.snapshot().queries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.snapshot().queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn evaluate(&self, event: &Value) -> IndexMap<String, QueryOutcome> {
        self.plan().evaluate(event)
    }

    pub fn superset_projection(&self, event: &Value) -> Value {
        self.plan().superset_projection(event)
    }

    /// The projections to deliver for `event`: every matching query whose
    /// sample clause (if any) admits it.
    pub fn dispatch(&self, event: &Value) -> IndexMap<String, Value> {
        let plan = self.plan();
        let outcomes = plan.evaluate(event);
        plan.queries()
            .iter()
            .zip(outcomes)
            .filter_map(|(query, (id, outcome))| {
                let projection = outcome.projection?;
                self.sampler
                    .admits(query.sample(), event)
                    .then_some((id, projection))
            })
            .collect()
    }
}
