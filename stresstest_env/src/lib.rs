//! Stresstest Environment Boundary
//!
//! This crate holds everything the generator shares with the world outside
//! it: the engine under test, the driver, and anyone replaying a failure.
//!
//! # Core Concept: Replay by Address
//!
//! Every series is identified by a [`SeriesAddr`] that is nothing more than
//! a 64-bit seed. All randomness for the series and its steps is derived
//! from it, so a failing case is reproducible from the address printed in
//! the log:
//!
//! ```text
//! Series S3b1f6a09d2c7e481
//!   ├── step S3b1f6a09d2c7e481-0   (own ChaCha8 stream)
//!   ├── step S3b1f6a09d2c7e481-1
//!   └── ...
//! ```
//!
//! # Engine Boundary
//!
//! The engine under test is a black box behind the [`Engine`] trait: it takes
//! a rendered [`ConfigSnapshot`] plus [`InputValues`] and returns either a
//! realized [`State`] or an [`EngineError`].

mod addr;
mod engine;
mod error;
mod instance;
mod state;
mod value;

pub use addr::{SeriesAddr, StepAddr};
pub use engine::Engine;
pub use error::{AddrParseError, EngineError, PathError};
pub use instance::{AbsOutputAddr, InstanceKey, ModuleInstancePath, ModuleInstanceStep};
pub use state::{resolve_source, ConfigSnapshot, InputValues, State};
pub use value::{is_identifier, Path, PathStep, Value};
