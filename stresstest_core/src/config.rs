//! Generation policy knobs.

use serde::{Deserialize, Serialize};

/// Configuration for series generation.
///
/// Changing any of these changes what a given series address produces, so
/// replaying a failure needs the same configuration as the first run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Minimum number of steps per series
    pub min_steps: u32,

    /// Maximum number of steps per series
    pub max_steps: u32,

    /// Upper bound on objects generated directly in the root module
    pub max_root_objects: usize,

    /// Upper bound on objects generated inside each called module
    pub max_child_objects: usize,

    /// Upper bound on the number of keys in a generated `for_each` map
    pub max_for_each_keys: usize,

    /// Maximum length of generated string constants
    pub max_string_len: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            min_steps: 1,
            max_steps: 6,
            max_root_objects: 25,
            max_child_objects: 25,
            max_for_each_keys: 3,
            max_string_len: 8,
        }
    }
}

impl GeneratorConfig {
    /// Sets the range of steps per series (`max` is raised to `min` if lower).
    pub fn with_steps(mut self, min: u32, max: u32) -> Self {
        self.min_steps = min;
        self.max_steps = max.max(min);
        self
    }

    /// Sets the object bounds for both root and called modules.
    pub fn with_max_objects(mut self, max: usize) -> Self {
        self.max_root_objects = max;
        self.max_child_objects = max;
        self
    }

    /// Sets the maximum number of `for_each` keys.
    pub fn with_max_for_each_keys(mut self, max: usize) -> Self {
        self.max_for_each_keys = max;
        self
    }

    /// Sets the maximum length of string constants (at least 1).
    pub fn with_max_string_len(mut self, max: usize) -> Self {
        self.max_string_len = max.max(1);
        self
    }
}
