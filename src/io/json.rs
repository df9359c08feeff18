//! JSON report of a scenario replay

use crate::contact::{CollisionMethod, ContactBehavior, StepMetrics};
use crate::error::{ContactError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Metrics of one replayed step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: usize,
    pub max_penetration: f64,
    pub metrics: StepMetrics,
}

/// Complete report of a replay run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayReport {
    /// Scenario file that was replayed
    pub scenario_file: String,

    /// Timestamp when the replay was run
    pub timestamp: String,

    /// Body names after method resolution
    pub bodies: [String; 2],

    /// Resolved collision method
    pub method: CollisionMethod,

    /// Contact parameters used
    pub behavior: ContactBehavior,

    pub steps: Vec<StepRecord>,
}

impl ReplayReport {
    pub fn new(
        scenario_file: String,
        bodies: [String; 2],
        method: CollisionMethod,
        behavior: ContactBehavior,
    ) -> Self {
        Self {
            scenario_file,
            timestamp: chrono::Utc::now().to_rfc3339(),
            bodies,
            method,
            behavior,
            steps: Vec::new(),
        }
    }

    pub fn add_step(&mut self, step: usize, max_penetration: f64, metrics: StepMetrics) {
        self.steps.push(StepRecord {
            step,
            max_penetration,
            metrics,
        });
    }

    /// Largest penetration over all steps
    pub fn max_penetration(&self) -> f64 {
        self.steps
            .iter()
            .map(|s| s.max_penetration)
            .fold(0.0, f64::max)
    }
}

pub fn write_replay_report<P: AsRef<Path>>(report: &ReplayReport, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    serde_json::to_writer_pretty(file, report).map_err(|e| {
        ContactError::ConfigError(format!("Failed to write replay report: {}", e))
    })?;

    log::info!("Wrote replay report to {}", path.as_ref().display());
    Ok(())
}

pub fn read_replay_report<P: AsRef<Path>>(path: P) -> Result<ReplayReport> {
    let file = File::open(path.as_ref())?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader).map_err(|e| {
        ContactError::ConfigError(format!("Failed to parse replay report: {}", e))
    })
}
