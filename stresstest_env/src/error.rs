//! Error types for the stresstest boundary.

use thiserror::Error;

/// Errors an engine under test can report for one configuration step.
///
/// Any of these causes the driver to skip the step; the series continues
/// from the last successfully realized state.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The rendered configuration failed to parse
    #[error("Parse error in module {module:?} at line {line}: {message}")]
    Parse {
        module: String,
        line: usize,
        message: String,
    },

    /// A module call points at a directory missing from the snapshot
    #[error("Module source not found: {0}")]
    MissingModule(String),

    /// A required input variable was not supplied
    #[error("No value for required variable {name:?} in module {module:?}")]
    MissingVariable { module: String, name: String },

    /// A module call passes an argument the called module doesn't declare
    #[error("Unsupported argument {name:?} in module {module:?}")]
    UnsupportedArgument { module: String, name: String },

    /// An expression refers to an object that isn't declared
    #[error("Reference to undeclared {reference} in module {module:?}")]
    UnknownReference { module: String, reference: String },

    /// Objects depend on each other in a loop
    #[error("Dependency cycle through {reference} in module {module:?}")]
    Cycle { module: String, reference: String },

    /// An expression is well-formed but can't be evaluated
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// The engine refused the step outright
    #[error("Step rejected: {0}")]
    Rejected(String),
}

impl EngineError {
    /// Creates an evaluation error.
    pub fn evaluation(msg: impl Into<String>) -> Self {
        Self::Evaluation(msg.into())
    }

    /// Creates a rejection error.
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }
}

/// Errors from parsing a series or step address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddrParseError {
    #[error("invalid series address {0:?} (expected S followed by up to 16 hex digits)")]
    Series(String),

    #[error("invalid step address {0:?} (expected <series>-<index>)")]
    Step(String),
}

/// Errors from applying a traversal path to a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("object has no attribute {0:?}")]
    NoSuchAttribute(String),

    #[error("map has no element for key {0:?}")]
    NoSuchKey(String),

    #[error("index {index} out of range for list of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("cannot apply {step} to a value of type {type_name}")]
    Unsupported { step: String, type_name: &'static str },
}
