//! Thinning of matched events according to a query's `sample` clause.
use mql_query::{SampleConfig, SampleStrategy};
use mql_types::Value;
use rand::Rng;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Decides whether a matched event is delivered to a sampled subscriber.
///
/// A clause admits `threshold` out of every `factor` events; the factor comes
/// from the clause itself or falls back to the engine default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sampler {
    factor: u32,
}

impl Sampler {
    pub fn new(factor: u32) -> Self {
        Self { factor: factor.max(1) }
    }

    pub fn factor(&self) -> u32 {
        self.factor
    }

    /// Samples with the thread-local generator. Without a clause every event
    /// is admitted.
    pub fn admits(&self, config: Option<&SampleConfig>, event: &Value) -> bool {
        self.admits_with(config, event, &mut rand::rng())
    }

    pub fn admits_with<R: Rng>(&self, config: Option<&SampleConfig>, event: &Value, rng: &mut R) -> bool {
        let Some(config) = config else {
            return true;
        };
        let factor = config.factor.unwrap_or(self.factor).max(1);
        let draw = match config.strategy {
            SampleStrategy::Random => rng.random_range(0..factor),
            SampleStrategy::Sticky => sticky_bucket(config, event, factor),
        };
        draw < config.threshold
    }
}

/// Maps the event's key values onto `0..factor`; equal keys land in the same bucket.
fn sticky_bucket(config: &SampleConfig, event: &Value, factor: u32) -> u32 {
    let mut hasher = DefaultHasher::new();
    config.salt.as_deref().unwrap_or("").hash(&mut hasher);
    for key in &config.keys {
        match event.get(key) {
            Some(value) => value.to_string().hash(&mut hasher),
            None => 0u8.hash(&mut hasher),
        }
    }
    (hasher.finish() % u64::from(factor)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::json;

    fn config(json: serde_json::Value) -> SampleConfig {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_no_clause_admits_everything() {
        let sampler = Sampler::new(10_000);
        assert!(sampler.admits(None, &Value::Null));
    }

    #[test]
    fn test_random_rate_is_close_to_threshold() {
        let sampler = Sampler::new(10_000);
        let clause = config(json!({ "strategy": "RANDOM", "threshold": 2000 }));
        let mut rng = StdRng::seed_from_u64(7);
        let event = Value::Null;
        let admitted = (0..10_000)
            .filter(|_| sampler.admits_with(Some(&clause), &event, &mut rng))
            .count();
        assert!((1600..2400).contains(&admitted), "admitted {}", admitted);
    }

    #[test]
    fn test_random_bounds() {
        let sampler = Sampler::new(100);
        let mut rng = StdRng::seed_from_u64(1);
        let none = config(json!({ "strategy": "RANDOM", "threshold": 0 }));
        let all = config(json!({ "strategy": "RANDOM", "threshold": 100 }));
        for _ in 0..200 {
            assert!(!sampler.admits_with(Some(&none), &Value::Null, &mut rng));
            assert!(sampler.admits_with(Some(&all), &Value::Null, &mut rng));
        }
    }

    #[test]
    fn test_sticky_is_stable_per_key() {
        let sampler = Sampler::new(10_000);
        let clause = config(json!({ "strategy": "STICKY", "keys": ["esn"], "threshold": 5000, "salt": "s1" }));
        let mut admitted = 0;
        for i in 0..500 {
            let event = Value::from(json!({ "esn": format!("device-{}", i), "other": i }));
            let first = sampler.admits(Some(&clause), &event);
            let changed = Value::from(json!({ "esn": format!("device-{}", i), "other": -1 }));
            assert_eq!(first, sampler.admits(Some(&clause), &changed));
            if first {
                admitted += 1;
            }
        }
        assert!((150..350).contains(&admitted), "admitted {}", admitted);
    }

    #[test]
    fn test_clause_factor_overrides_default() {
        let sampler = Sampler::new(10_000);
        let clause = config(json!({ "strategy": "STICKY", "keys": ["k"], "threshold": 1, "factor": 1 }));
        assert!(sampler.admits(Some(&clause), &Value::from(json!({ "k": "anything" }))));
    }

    #[test]
    fn test_zero_factor_is_clamped() {
        assert_eq!(Sampler::new(0).factor(), 1);
    }
}
