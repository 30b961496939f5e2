//! End-to-end checks: generator, renderer, reference engine and oracle
//! must agree on every generated step.

use stresstest_core::{generate_config_series, generate_config_step, ConfigObject, GeneratorConfig};
use stresstest_env::{Engine, SeriesAddr, State};
use stresstest_sim::parser;
use stresstest_sim::{FaultConfig, FaultyEngine, ModelEngine, SeriesRunner};

#[test]
fn test_every_step_parses() {
    let cfg = GeneratorConfig::default();

    for seed in 0..100 {
        let series = generate_config_series(SeriesAddr::from_seed(seed), &cfg);
        for step in &series.steps {
            for (dir, src) in step.config_snapshot().modules() {
                if let Err(e) = parser::parse(src) {
                    panic!("{} module {:?}: {}\n{}", step.addr, dir, e, src);
                }
                if let Err(e) = hcl::parse(src) {
                    panic!("{} module {:?} is not valid HCL: {}\n{}", step.addr, dir, e, src);
                }
            }
        }
    }
}

#[test]
fn test_model_engine_agrees_with_oracle() {
    let runner = SeriesRunner::default();

    for seed in 0..200 {
        let addr = SeriesAddr::from_seed(seed);
        let result = runner.run(addr, &mut ModelEngine::new());

        assert_eq!(result.steps_skipped, 0, "{}: {:?}", addr, result.steps);
        assert!(result.passed, "{}: {:?}", addr, result.errors);
    }
}

#[test]
fn test_realized_state_matches_expected_outputs() {
    let cfg = GeneratorConfig::default();
    let mut engine = ModelEngine::new();

    for seed in 0..100 {
        let step = generate_config_step(SeriesAddr::from_seed(seed).step(0), &cfg);
        let state = engine
            .apply(&step.config_snapshot(), &step.variable_values(), &State::new())
            .unwrap_or_else(|e| panic!("{}: {}", step.addr, e));

        let realized: Vec<_> = state.outputs().map(|(a, v)| (a.clone(), v.clone())).collect();
        let expected: Vec<_> = step.expected_outputs().into_iter().collect();
        assert_eq!(realized, expected, "{}", step.addr);
    }
}

#[test]
fn test_corruption_is_detected() {
    let runner = SeriesRunner::default();
    let config = FaultConfig::none().with_corrupt_rate(1.0);

    for seed in 0..50 {
        let addr = SeriesAddr::from_seed(seed);
        let series = runner.generate(addr);
        let mut engine = FaultyEngine::new(ModelEngine::new(), config, seed);
        let result = runner.run_series(&series, &mut engine);

        for (step, report) in series.steps.iter().zip(&result.steps) {
            if !step.expected_outputs().is_empty() {
                assert!(!report.errors.is_empty(), "{} slipped through", step.addr);
            }
        }
    }
}

#[test]
fn test_dropped_outputs_are_detected() {
    let runner = SeriesRunner::default();
    let config = FaultConfig::none().with_drop_rate(1.0);

    for seed in 0..50 {
        let addr = SeriesAddr::from_seed(seed);
        let series = runner.generate(addr);
        let result = runner.run_series(&series, &mut FaultyEngine::new(ModelEngine::new(), config, seed));

        let expected: usize = series.steps.iter().map(|s| s.expected_outputs().len()).sum();
        assert_eq!(result.errors.len(), expected);
    }
}

#[test]
fn test_reject_all_skips_every_step() {
    let runner = SeriesRunner::default();
    let config = FaultConfig::none().with_reject_rate(1.0);

    for seed in 0..20 {
        let addr = SeriesAddr::from_seed(seed);
        let result = runner.run(addr, &mut FaultyEngine::new(ModelEngine::new(), config, seed));

        assert_eq!(result.steps_skipped, result.steps_total);
        assert!(result.errors.is_empty());
    }
}

#[test]
fn test_module_calls_stay_shallow() {
    fn max_depth(objects: &[ConfigObject]) -> usize {
        objects
            .iter()
            .map(|obj| match obj {
                ConfigObject::ModuleCall(call) => call.module_path.len().max(max_depth(&call.objects)),
                _ => 0,
            })
            .max()
            .unwrap_or(0)
    }

    let cfg = GeneratorConfig::default();
    for seed in 0..200 {
        let step = generate_config_step(SeriesAddr::from_seed(seed).step(0), &cfg);
        assert!(max_depth(&step.objects) <= 3, "{}", step.addr);
    }
}
