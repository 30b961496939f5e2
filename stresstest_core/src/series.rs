//! Series generation: ordered configuration snapshots.

use crate::config::GeneratorConfig;
use crate::generate::{generate_config_object, register_caller_set_variable};
use crate::namespace::{generate_string, Namespace};
use crate::object::{ConfigBoilerplate, ConfigModuleCall, ConfigObject};
use crate::oracle::{self, StateError};
use crate::registry::Registry;
use crate::render::Body;
use rand::Rng;
use std::collections::BTreeMap;
use stresstest_env::{
    AbsOutputAddr, ConfigSnapshot, InputValues, SeriesAddr, State, StepAddr, Value,
};
use tracing::debug;

/// An ordered evolution of one configuration.
#[derive(Debug, Clone)]
pub struct ConfigSeries {
    pub addr: SeriesAddr,
    pub steps: Vec<ConfigStep>,
}

/// One complete configuration snapshot plus everything needed to check it.
#[derive(Debug, Clone)]
pub struct ConfigStep {
    pub addr: StepAddr,

    /// Root module objects, boilerplate first
    pub objects: Vec<ConfigObject>,

    /// Expected values for every addressable object in this step
    pub registry: Registry,

    /// Values for the root module's caller-set variables
    variables: InputValues,
}

/// Generates the series at `addr`.
///
/// The series RNG only decides how many steps there are; each step then
/// draws from its own stream, so a step can be regenerated on its own with
/// [`generate_config_step`].
pub fn generate_config_series(addr: SeriesAddr, cfg: &GeneratorConfig) -> ConfigSeries {
    let mut rng = addr.rng();
    let step_count = rng.gen_range(cfg.min_steps..=cfg.max_steps.max(cfg.min_steps));

    let steps: Vec<ConfigStep> = (0..step_count)
        .map(|i| generate_config_step(addr.step(i), cfg))
        .collect();

    debug!("Generated series {} with {} steps", addr, steps.len());

    ConfigSeries { addr, steps }
}

/// Generates one step from scratch.
///
/// Every step gets a fresh namespace tree and registry; steps are related
/// only through the realized state the engine carries between them.
pub fn generate_config_step(addr: StepAddr, cfg: &GeneratorConfig) -> ConfigStep {
    let mut rng = addr.rng();
    let mut ns = Namespace::root();
    let mut registry = Registry::new();
    let mut variables = InputValues::new();

    let obj_count = rng.gen_range(0..=cfg.max_root_objects);
    let mut objects = Vec::with_capacity(obj_count + 1);
    objects.push(ConfigObject::Boilerplate(ConfigBoilerplate));

    for _ in 0..obj_count {
        let obj = generate_config_object(&mut rng, &mut ns, &mut registry, cfg);

        // Root variables without a default get their value from the driver
        if let ConfigObject::Variable(var) = &obj {
            if var.caller_will_set {
                let value = Value::String(generate_string(&mut rng, cfg.max_string_len));
                register_caller_set_variable(&mut ns, &mut registry, var, value.clone());
                variables.insert(var.name.clone(), value);
            }
        }

        objects.push(obj);
    }

    debug!(
        "Generated step {}: {} root objects, {} registry entries",
        addr,
        objects.len(),
        registry.len()
    );

    ConfigStep {
        addr,
        objects,
        registry,
        variables,
    }
}

impl ConfigStep {
    /// Renders every module of this step into a snapshot.
    pub fn config_snapshot(&self) -> ConfigSnapshot {
        let mut snap = ConfigSnapshot::new();

        let mut root = Body::new();
        for obj in &self.objects {
            obj.append_to(&mut root);
        }
        snap.insert_module(ConfigSnapshot::ROOT, root.to_source());

        for obj in &self.objects {
            if let ConfigObject::ModuleCall(call) = obj {
                add_module(&mut snap, call);
            }
        }

        snap
    }

    /// Returns the input values for root caller-set variables.
    pub fn variable_values(&self) -> InputValues {
        self.variables.clone()
    }

    /// Returns every output instance this step must produce, with its value.
    pub fn expected_outputs(&self) -> BTreeMap<AbsOutputAddr, Value> {
        oracle::expected_outputs(&self.objects, &self.registry)
    }

    /// Compares the state realized for this step against expectations.
    ///
    /// See [`oracle::check_new_state`].
    pub fn check_new_state(&self, prior: &State, new: &State) -> Vec<StateError> {
        oracle::check_new_state(&self.objects, &self.registry, prior, new)
    }

    /// Counts module calls at every depth.
    pub fn module_call_count(&self) -> usize {
        fn count(objects: &[ConfigObject]) -> usize {
            objects
                .iter()
                .map(|obj| match obj {
                    ConfigObject::ModuleCall(call) => 1 + count(&call.objects),
                    _ => 0,
                })
                .sum()
        }
        count(&self.objects)
    }
}

fn add_module(snap: &mut ConfigSnapshot, call: &ConfigModuleCall) {
    snap.insert_module(call.module_dir(), call.child_body().to_source());
    for obj in &call.objects {
        if let ConfigObject::ModuleCall(child) = obj {
            add_module(snap, child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_is_deterministic() {
        let cfg = GeneratorConfig::default();
        let addr = SeriesAddr::from_seed(42);

        let a = generate_config_series(addr, &cfg);
        let b = generate_config_series(addr, &cfg);

        assert_eq!(a.steps.len(), b.steps.len());
        for (sa, sb) in a.steps.iter().zip(&b.steps) {
            assert_eq!(sa.addr, sb.addr);
            assert_eq!(sa.objects, sb.objects);
            assert_eq!(sa.expected_outputs(), sb.expected_outputs());
            assert_eq!(sa.config_snapshot(), sb.config_snapshot());
            assert_eq!(sa.variable_values(), sb.variable_values());
        }
    }

    #[test]
    fn test_step_count_within_bounds() {
        let cfg = GeneratorConfig::default().with_steps(2, 4);

        for seed in 0..50 {
            let series = generate_config_series(SeriesAddr::from_seed(seed), &cfg);
            assert!((2..=4).contains(&series.steps.len()));
            for (i, step) in series.steps.iter().enumerate() {
                assert_eq!(step.addr.index as usize, i);
            }
        }
    }

    #[test]
    fn test_step_regenerates_alone() {
        let cfg = GeneratorConfig::default().with_steps(3, 3);
        let series = generate_config_series(SeriesAddr::from_seed(9), &cfg);

        let again = generate_config_step(series.steps[2].addr, &cfg);
        assert_eq!(again.objects, series.steps[2].objects);
    }

    #[test]
    fn test_snapshot_has_module_per_call() {
        let cfg = GeneratorConfig::default();

        for seed in 0..30 {
            let step = generate_config_step(SeriesAddr::from_seed(seed).step(0), &cfg);
            let snap = step.config_snapshot();

            assert_eq!(snap.len(), step.module_call_count() + 1);
            assert!(snap
                .module(ConfigSnapshot::ROOT)
                .unwrap()
                .starts_with("terraform {"));
        }
    }

    #[test]
    fn test_root_inputs_match_caller_set_variables() {
        let cfg = GeneratorConfig::default();
        let step = generate_config_step(SeriesAddr::from_seed(5).step(1), &cfg);

        let expected: Vec<String> = step
            .objects
            .iter()
            .filter_map(|obj| match obj {
                ConfigObject::Variable(v) if v.caller_will_set => Some(v.name.clone()),
                _ => None,
            })
            .collect();
        let mut expected = expected;
        expected.sort();

        let actual: Vec<String> = step.variable_values().into_keys().collect();
        assert_eq!(actual, expected);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            /// The same step address always yields the same step.
            #[test]
            fn test_prop_step_deterministic(seed in any::<u64>(), index in 0u32..8) {
                let cfg = GeneratorConfig::default();
                let addr = SeriesAddr::from_seed(seed).step(index);

                let a = generate_config_step(addr, &cfg);
                let b = generate_config_step(addr, &cfg);

                prop_assert_eq!(&a.objects, &b.objects);
                prop_assert_eq!(a.config_snapshot(), b.config_snapshot());
                prop_assert_eq!(a.variable_values(), b.variable_values());
            }

            /// The oracle is pure: asking twice gives the same answer.
            #[test]
            fn test_prop_expected_outputs_pure(seed in any::<u64>()) {
                let step = generate_config_step(
                    SeriesAddr::from_seed(seed).step(0),
                    &GeneratorConfig::default(),
                );
                prop_assert_eq!(step.expected_outputs(), step.expected_outputs());
            }

            /// A state holding exactly the expected outputs passes the oracle.
            #[test]
            fn test_prop_expected_state_passes(seed in any::<u64>()) {
                let step = generate_config_step(
                    SeriesAddr::from_seed(seed).step(0),
                    &GeneratorConfig::default(),
                );

                let mut state = State::new();
                for (addr, value) in step.expected_outputs() {
                    state.set_output(addr, value);
                }
                prop_assert!(step.check_new_state(&State::new(), &state).is_empty());
            }
        }
    }
}
