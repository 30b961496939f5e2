//! Series runner - drives an engine through generated series.

use stresstest_core::{generate_config_series, ConfigSeries, GeneratorConfig, StateError};
use stresstest_env::{Engine, SeriesAddr, State, StepAddr};
use tracing::{debug, error, info, warn};

/// What happened to one step.
#[derive(Debug, Clone)]
pub struct StepReport {
    pub addr: StepAddr,

    /// Engine error message if the step was skipped
    pub skip_reason: Option<String>,

    /// Oracle findings for an applied step
    pub errors: Vec<StateError>,
}

impl StepReport {
    pub fn applied(&self) -> bool {
        self.skip_reason.is_none()
    }
}

/// Results from running one series.
#[derive(Debug, Clone)]
pub struct SeriesResult {
    /// Series that was run
    pub addr: SeriesAddr,

    /// Steps generated
    pub steps_total: usize,

    /// Steps the engine applied (and the oracle checked)
    pub steps_applied: usize,

    /// Steps the engine failed on
    pub steps_skipped: usize,

    /// Every oracle error, with the step it came from
    pub errors: Vec<(StepAddr, StateError)>,

    /// True if no applied step had oracle errors
    pub passed: bool,

    /// Per-step detail, in step order
    pub steps: Vec<StepReport>,
}

impl SeriesResult {
    /// Short description of why the series failed, if it did.
    pub fn failure_reason(&self) -> Option<String> {
        let (step, first) = self.errors.first()?;
        Some(format!(
            "{} oracle error(s), first at {}: {}",
            self.errors.len(),
            step,
            first
        ))
    }
}

/// Runs series against an engine.
pub struct SeriesRunner {
    config: GeneratorConfig,
}

impl SeriesRunner {
    /// Creates a runner with the given generator settings.
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generates the series at `addr`.
    pub fn generate(&self, addr: SeriesAddr) -> ConfigSeries {
        generate_config_series(addr, &self.config)
    }

    /// Generates and runs the series at `addr`.
    pub fn run<E: Engine + ?Sized>(&self, addr: SeriesAddr, engine: &mut E) -> SeriesResult {
        let series = self.generate(addr);
        self.run_series(&series, engine)
    }

    /// Runs an already generated series.
    ///
    /// Each step is applied on top of the last successfully realized state.
    /// A step the engine fails on is logged and skipped; the prior state is
    /// left as it was. Oracle errors are logged and the engine's state is
    /// carried forward regardless.
    pub fn run_series<E: Engine + ?Sized>(
        &self,
        series: &ConfigSeries,
        engine: &mut E,
    ) -> SeriesResult {
        info!(
            "Starting series {} ({} steps, engine={})",
            series.addr,
            series.steps.len(),
            engine.name()
        );

        let mut prior = State::new();
        let mut reports = Vec::with_capacity(series.steps.len());

        for step in &series.steps {
            let snapshot = step.config_snapshot();
            let variables = step.variable_values();
            debug!(
                "  {} | modules={} | inputs={} | expected outputs={}",
                step.addr,
                snapshot.len(),
                variables.len(),
                step.expected_outputs().len()
            );

            let new_state = match engine.apply(&snapshot, &variables, &prior) {
                Ok(state) => state,
                Err(e) => {
                    warn!("Step {} skipped: {}", step.addr, e);
                    reports.push(StepReport {
                        addr: step.addr,
                        skip_reason: Some(e.to_string()),
                        errors: Vec::new(),
                    });
                    continue;
                }
            };

            let errors = step.check_new_state(&prior, &new_state);
            for err in &errors {
                error!("Step {}: {}", step.addr, err);
            }

            reports.push(StepReport {
                addr: step.addr,
                skip_reason: None,
                errors,
            });
            prior = new_state;
        }

        let steps_applied = reports.iter().filter(|r| r.applied()).count();
        let errors: Vec<(StepAddr, StateError)> = reports
            .iter()
            .flat_map(|r| r.errors.iter().map(move |e| (r.addr, e.clone())))
            .collect();

        SeriesResult {
            addr: series.addr,
            steps_total: series.steps.len(),
            steps_applied,
            steps_skipped: reports.len() - steps_applied,
            passed: errors.is_empty(),
            errors,
            steps: reports,
        }
    }
}

impl Default for SeriesRunner {
    fn default() -> Self {
        Self::new(GeneratorConfig::default())
    }
}
