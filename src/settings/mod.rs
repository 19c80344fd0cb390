//! Simulation settings files, as written by the model authoring tool.
//!
//! ```json
//! { "info": "", "startTime": 0, "stopTime": 345600, "interval": 600.0,
//!   "tolerance": 1e-6, "algorithm": "Dassl" }
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::{OmcError, OmcResult};
use crate::omc::{Method, SimulateOptions};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSettings {
    pub info: Option<String>,
    pub start_time: Option<i64>,
    pub stop_time: Option<i64>,
    pub interval: Option<f64>,
    pub tolerance: Option<f64>,
    pub algorithm: Option<String>,
}

impl SimulationSettings {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading simulation settings {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parsing simulation settings {}", path.display()))
    }

    pub fn to_options(&self) -> OmcResult<SimulateOptions> {
        if let (Some(start), Some(stop)) = (self.start_time, self.stop_time) {
            if stop < start {
                return Err(OmcError::Settings(format!("stopTime {stop} is before startTime {start}")));
            }
        }
        if let Some(tol) = self.tolerance {
            if tol <= 0.0 {
                return Err(OmcError::Settings(format!("tolerance must be positive, got {tol}")));
            }
        }
        let number_of_intervals = match (self.start_time, self.stop_time, self.interval) {
            (Some(start), Some(stop), Some(step)) if step > 0.0 => {
                Some(((stop as f64 - start as f64) / step).round().max(1.0) as u64)
            }
            _ => None,
        };
        let method = self.algorithm.as_deref().map(str::parse::<Method>).transpose()?;
        Ok(SimulateOptions {
            start_time: self.start_time.map(|t| t as f64),
            stop_time: self.stop_time.map(|t| t as f64),
            number_of_intervals,
            tolerance: self.tolerance,
            method,
        })
    }
}
