//! Fault injection around an engine.
//!
//! Used to prove the oracle actually catches bad engines: a wrapped engine
//! can refuse steps, report wrong output values or forget outputs, each at
//! a configurable rate.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use stresstest_env::{AbsOutputAddr, ConfigSnapshot, Engine, EngineError, InputValues, State, Value};
use tracing::debug;

/// Mixes the series seed so fault draws don't mirror generation draws.
const FAULT_SEED_MUL: u64 = 0x517cc1b727220a95;

/// Probabilities for each kind of injected fault, each in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FaultConfig {
    /// Chance a whole step fails with [`EngineError::Rejected`]
    pub reject_rate: f64,

    /// Chance each output value is replaced with a wrong one
    pub corrupt_rate: f64,

    /// Chance each output is missing from the returned state
    pub drop_rate: f64,
}

impl FaultConfig {
    /// No faults at all.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_reject_rate(mut self, rate: f64) -> Self {
        self.reject_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_corrupt_rate(mut self, rate: f64) -> Self {
        self.corrupt_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_drop_rate(mut self, rate: f64) -> Self {
        self.drop_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Returns true if no fault can ever fire.
    pub fn is_none(&self) -> bool {
        self.reject_rate <= 0.0 && self.corrupt_rate <= 0.0 && self.drop_rate <= 0.0
    }
}

/// Statistics on injected faults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultStats {
    pub rejected: u64,
    pub corrupted: u64,
    pub dropped: u64,
}

/// Wraps an engine and perturbs its results.
pub struct FaultyEngine<E> {
    inner: E,
    config: FaultConfig,
    rng: ChaCha8Rng,
    stats: FaultStats,
    name: String,
}

impl<E: Engine> FaultyEngine<E> {
    /// Creates a faulty wrapper whose fault draws are fully determined by
    /// `seed`.
    pub fn new(inner: E, config: FaultConfig, seed: u64) -> Self {
        let name = format!("faulty({})", inner.name());
        Self {
            inner,
            config,
            rng: ChaCha8Rng::seed_from_u64(seed.wrapping_mul(FAULT_SEED_MUL)),
            stats: FaultStats::default(),
            name,
        }
    }

    pub fn stats(&self) -> &FaultStats {
        &self.stats
    }

    pub fn into_inner(self) -> E {
        self.inner
    }

    fn roll(&mut self, rate: f64) -> bool {
        if rate >= 1.0 {
            true
        } else if rate > 0.0 {
            self.rng.gen_bool(rate)
        } else {
            false
        }
    }
}

/// Returns a value guaranteed to differ from `value`.
fn corrupt(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(format!("{}~", s)),
        Value::Null => Value::string("~"),
        _ => Value::Null,
    }
}

impl<E: Engine> Engine for FaultyEngine<E> {
    fn apply(
        &mut self,
        snapshot: &ConfigSnapshot,
        variables: &InputValues,
        prior: &State,
    ) -> Result<State, EngineError> {
        if self.roll(self.config.reject_rate) {
            self.stats.rejected += 1;
            return Err(EngineError::rejected("injected fault"));
        }

        let mut state = self.inner.apply(snapshot, variables, prior)?;

        let addrs: Vec<AbsOutputAddr> = state.outputs().map(|(addr, _)| addr.clone()).collect();
        for addr in addrs {
            if self.roll(self.config.drop_rate) {
                debug!("dropping {}", addr);
                state.remove_output(&addr);
                self.stats.dropped += 1;
            } else if self.roll(self.config.corrupt_rate) {
                if let Some(value) = state.output(&addr) {
                    let bad = corrupt(value);
                    debug!("corrupting {}", addr);
                    state.set_output(addr, bad);
                    self.stats.corrupted += 1;
                }
            }
        }

        Ok(state)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ModelEngine;

    fn snapshot() -> ConfigSnapshot {
        let mut snap = ConfigSnapshot::new();
        snap.insert_module(
            ConfigSnapshot::ROOT,
            "output \"a\" {\n  value = \"x\"\n}\n\noutput \"b\" {\n  value = \"y\"\n}\n",
        );
        snap
    }

    #[test]
    fn test_no_faults_passes_through() {
        let mut engine = FaultyEngine::new(ModelEngine::new(), FaultConfig::none(), 1);
        let state = engine
            .apply(&snapshot(), &InputValues::new(), &State::new())
            .unwrap();

        assert_eq!(state.output(&AbsOutputAddr::root("a")), Some(&Value::string("x")));
        assert_eq!(engine.stats(), &FaultStats::default());
        assert_eq!(engine.name(), "faulty(model)");
    }

    #[test]
    fn test_reject_all() {
        let config = FaultConfig::none().with_reject_rate(1.0);
        let mut engine = FaultyEngine::new(ModelEngine::new(), config, 1);

        for _ in 0..5 {
            let result = engine.apply(&snapshot(), &InputValues::new(), &State::new());
            assert!(matches!(result, Err(EngineError::Rejected(_))));
        }
        assert_eq!(engine.stats().rejected, 5);
        assert_eq!(engine.into_inner().applies(), 0);
    }

    #[test]
    fn test_corrupt_all() {
        let config = FaultConfig::none().with_corrupt_rate(1.0);
        let mut engine = FaultyEngine::new(ModelEngine::new(), config, 1);
        let state = engine
            .apply(&snapshot(), &InputValues::new(), &State::new())
            .unwrap();

        assert_eq!(state.len(), 2);
        assert_eq!(state.output(&AbsOutputAddr::root("a")), Some(&Value::string("x~")));
        assert_eq!(engine.stats().corrupted, 2);
    }

    #[test]
    fn test_drop_all() {
        let config = FaultConfig::none().with_drop_rate(1.0);
        let mut engine = FaultyEngine::new(ModelEngine::new(), config, 1);
        let state = engine
            .apply(&snapshot(), &InputValues::new(), &State::new())
            .unwrap();

        assert!(state.is_empty());
        assert_eq!(engine.stats().dropped, 2);
    }

    #[test]
    fn test_rates_are_clamped() {
        let config = FaultConfig::none()
            .with_reject_rate(3.0)
            .with_drop_rate(-1.0);
        assert_eq!(config.reject_rate, 1.0);
        assert_eq!(config.drop_rate, 0.0);
        assert!(!config.is_none());
        assert!(FaultConfig::none().is_none());
    }
}
