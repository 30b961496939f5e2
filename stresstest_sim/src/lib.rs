//! Stresstest Simulation Harness
//!
//! Runs generated configuration series against an engine and checks every
//! realized state with the oracle from `stresstest_core`.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                       SeriesRunner                        │
//! │                                                           │
//! │  ConfigSeries ──► ConfigStep ──► ConfigSnapshot + inputs  │
//! │                        │                   │              │
//! │                        │             ┌─────▼──────┐       │
//! │                        │             │   Engine   │       │
//! │                        │             │ (Model or  │       │
//! │                        │             │  Faulty)   │       │
//! │                        │             └─────┬──────┘       │
//! │                  ┌─────▼──────┐            │ State        │
//! │                  │   Oracle   │◄───────────┘              │
//! │                  └─────┬──────┘                           │
//! │                        ▼                                  │
//! │                   SeriesResult                            │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use stresstest_sim::{ModelEngine, SeriesRunner};
//! use stresstest_env::SeriesAddr;
//!
//! let runner = SeriesRunner::default();
//! let result = runner.run(SeriesAddr::from_seed(42), &mut ModelEngine::new());
//! assert!(result.passed);
//! ```

mod engine;
mod exporter;
mod fault;
pub mod parser;
mod runner;

pub use engine::ModelEngine;
pub use exporter::{OutputRecord, SeriesExport, StepRecord};
pub use fault::{FaultConfig, FaultStats, FaultyEngine};
pub use parser::ParseError;
pub use runner::{SeriesResult, SeriesRunner, StepReport};
