// src/detect/config.rs

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::error::ScanError;
use crate::summary::ChartOptions;

/// How the configured `max_samples` is bounded before each fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MaxSamplesClamp {
    /// `min(max_samples, number of period columns)`.
    ///
    /// The fit population is the row's non-zero values, which can be far
    /// smaller than the column count; the forest still caps each tree's
    /// sub-sample at the population size.
    #[default]
    ColumnCount,
    /// `min(max_samples, number of non-zero values in the row)`.
    SampleCount,
    /// Use `max_samples` as configured (still capped at the population size).
    None,
}

/// Run-wide isolation forest hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub n_estimators: usize,
    pub contamination: f64,
    pub max_samples: usize,
    pub random_state: u64,
    pub max_samples_clamp: MaxSamplesClamp,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            contamination: 0.05,
            max_samples: 64,
            random_state: 42,
            max_samples_clamp: MaxSamplesClamp::ColumnCount,
        }
    }
}

impl DetectionConfig {
    /// Check every hyperparameter against its domain.
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.n_estimators == 0 {
            return Err(ScanError::config("n_estimators", self.n_estimators, "must be at least 1"));
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(ScanError::config(
                "contamination",
                self.contamination,
                "must lie in (0, 0.5]",
            ));
        }
        if self.max_samples == 0 {
            return Err(ScanError::config("max_samples", self.max_samples, "must be at least 1"));
        }
        Ok(())
    }

    /// Sub-sample size requested for a row with `period_columns` columns and
    /// `population` non-zero values.
    pub fn effective_max_samples(&self, period_columns: usize, population: usize) -> usize {
        match self.max_samples_clamp {
            MaxSamplesClamp::ColumnCount => self.max_samples.min(period_columns),
            MaxSamplesClamp::SampleCount => self.max_samples.min(population),
            MaxSamplesClamp::None => self.max_samples,
        }
    }
}

/// Everything a scan needs, as read from a config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub detection: DetectionConfig,
    pub chart: ChartOptions,
}

impl RunConfig {
    /// Load from a `.yaml`/`.yml` or `.json` file; missing fields take defaults.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let cfg: RunConfig = match ext.as_deref() {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&text)
                .with_context(|| format!("parsing YAML config {}", path.display()))?,
            Some("json") => serde_json::from_str(&text)
                .with_context(|| format!("parsing JSON config {}", path.display()))?,
            other => {
                return Err(anyhow!(
                    "unsupported config extension {:?} for {}",
                    other,
                    path.display()
                ))
            }
        };

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ScanError> {
        self.detection.validate()?;
        if self.chart.top_n == 0 {
            return Err(ScanError::config("top_n", self.chart.top_n, "must be at least 1"));
        }
        Ok(())
    }
}
