//! Stresstest Core - Configuration Graph Generator + Value Oracle
//!
//! This library produces random but always-valid declarative configurations
//! (variables, outputs, nested module calls and the expressions wiring them
//! together) and, for every object it generates, the value that object must
//! hold after a correct engine has applied the configuration.
//!
//! 1. **Generation**: [`generate_config_series`] drives a [`Namespace`] per
//!    module level, the object generators and a per-step [`Registry`]
//! 2. **Rendering**: every [`ConfigObject`] and [`ConfigExpr`] renders to
//!    concrete syntax; [`ConfigStep::config_snapshot`] collects the files
//! 3. **Checking**: [`ConfigStep::check_new_state`] compares a realized
//!    state against the registry's expectations, one error per instance
//!
//! All randomness flows through an explicit `ChaCha8Rng` derived from the
//! step address, so the same address always yields the same series.

pub mod config;
pub mod expr;
pub mod generate;
pub mod namespace;
pub mod object;
pub mod oracle;
pub mod registry;
pub mod render;
pub mod series;

pub use config::GeneratorConfig;
pub use expr::{ConfigExpr, ConfigExprRef, Referenceable};
pub use generate::{
    count_from_string, decide_index, generate_config_module_call, generate_config_object,
    generate_config_output, generate_config_variable, register_caller_set_variable,
    COUNT_MODULUS,
};
pub use namespace::Namespace;
pub use object::{
    ConfigBoilerplate, ConfigModuleCall, ConfigObject, ConfigOutput, ConfigVariable, Repetition,
};
pub use oracle::{check_new_state, expected_outputs, StateError};
pub use registry::{Registry, RegistryError};
pub use series::{generate_config_series, generate_config_step, ConfigSeries, ConfigStep};
