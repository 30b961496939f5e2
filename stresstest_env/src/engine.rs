//! The engine-under-test boundary.

use crate::error::EngineError;
use crate::state::{ConfigSnapshot, InputValues, State};

/// An engine that turns a rendered configuration into realized state.
///
/// This abstracts the parse → graph build → plan → apply pipeline being
/// stress tested. The generator never calls it; only the driver does,
/// strictly between steps.
///
/// # Implementations
///
/// - **Reference**: `ModelEngine` in `stresstest_sim`, a small evaluator for
///   the generated subset
/// - **Fault injection**: `FaultyEngine` in `stresstest_sim`, wraps another
///   engine and perturbs its results
pub trait Engine {
    /// Applies `snapshot` with the given root input values, starting from
    /// `prior` (the last successfully realized state).
    ///
    /// Returns the complete new state, or an error that makes the driver
    /// skip this step.
    fn apply(
        &mut self,
        snapshot: &ConfigSnapshot,
        variables: &InputValues,
        prior: &State,
    ) -> Result<State, EngineError>;

    /// Returns a short name for logs.
    fn name(&self) -> &str;
}

impl<E: Engine + ?Sized> Engine for Box<E> {
    fn apply(
        &mut self,
        snapshot: &ConfigSnapshot,
        variables: &InputValues,
        prior: &State,
    ) -> Result<State, EngineError> {
        (**self).apply(snapshot, variables, prior)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
