//! JSON export of a series run for offline replay.
//!
//! The export holds every rendered file, input value and expected output,
//! so a failing step can be reproduced against a real engine without
//! rerunning the generator.

use crate::runner::SeriesResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use stresstest_core::ConfigSeries;
use stresstest_env::{InputValues, Value};

/// One expected output instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputRecord {
    pub addr: String,
    pub value: Value,
}

/// One step of an exported series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// Step address, e.g. `S000000000000002a-0`
    pub addr: String,

    /// Module directory → rendered source
    pub files: BTreeMap<String, String>,

    /// Root input variable values
    pub variables: InputValues,

    /// Outputs a correct engine must produce
    pub expected_outputs: Vec<OutputRecord>,

    /// Whether the engine applied this step
    pub applied: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,

    /// Oracle errors, rendered
    pub errors: Vec<String>,
}

/// Complete series export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesExport {
    /// Series address
    pub series: String,

    /// Engine the series was run against
    pub engine: String,

    pub steps: Vec<StepRecord>,

    pub passed: bool,
}

impl SeriesExport {
    /// Builds an export from a series and the result of running it.
    pub fn new(series: &ConfigSeries, result: &SeriesResult, engine: &str) -> Self {
        let steps = series
            .steps
            .iter()
            .map(|step| {
                let report = result.steps.iter().find(|r| r.addr == step.addr);
                StepRecord {
                    addr: step.addr.to_string(),
                    files: step
                        .config_snapshot()
                        .modules()
                        .map(|(dir, src)| (dir.to_string(), src.to_string()))
                        .collect(),
                    variables: step.variable_values(),
                    expected_outputs: step
                        .expected_outputs()
                        .into_iter()
                        .map(|(addr, value)| OutputRecord {
                            addr: addr.to_string(),
                            value,
                        })
                        .collect(),
                    applied: report.map(|r| r.applied()).unwrap_or(false),
                    skip_reason: report.and_then(|r| r.skip_reason.clone()),
                    errors: report
                        .map(|r| r.errors.iter().map(|e| e.to_string()).collect())
                        .unwrap_or_default(),
                }
            })
            .collect();

        Self {
            series: series.addr.to_string(),
            engine: engine.to_string(),
            steps,
            passed: result.passed,
        }
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ModelEngine;
    use crate::runner::SeriesRunner;
    use stresstest_env::SeriesAddr;

    #[test]
    fn test_export_matches_series() {
        let runner = SeriesRunner::default();
        let series = runner.generate(SeriesAddr::from_seed(12));
        let result = runner.run_series(&series, &mut ModelEngine::new());

        let export = SeriesExport::new(&series, &result, "model");
        assert_eq!(export.steps.len(), series.steps.len());
        assert_eq!(export.series, "S000000000000000c");
        assert!(export.passed);

        for (record, step) in export.steps.iter().zip(&series.steps) {
            assert!(record.applied);
            assert!(record.files.contains_key(""));
            assert_eq!(record.expected_outputs.len(), step.expected_outputs().len());
        }

        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(json["engine"], "model");
        assert!(json["steps"][0].get("skip_reason").is_none());
    }
}
