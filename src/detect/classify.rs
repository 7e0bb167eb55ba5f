// src/detect/classify.rs

use rayon::prelude::*;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::config::DetectionConfig;
use super::forest::IsolationForest;
use super::verdict::{explain, AnomalyResult, ColorFlag, RowVerdict};
use crate::error::ScanError;
use crate::table::{split_table, RawTable, SplitTable};

/// Rows with fewer non-zero values than this are never modelled.
pub const MIN_NON_ZERO: usize = 11;

pub const RESULT_COLUMN: &str = "Anomaly Result";
pub const EXPLANATION_COLUMN: &str = "Anomaly Explanation";

/// The input table minus its identifier, with result and explanation
/// columns appended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Everything one classification produced. Built once, read afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRun {
    pub annotated: AnnotatedTable,
    pub verdicts: Vec<RowVerdict>,
    pub dimension_columns: Vec<String>,
    /// The split input, kept for typed access to dimension and period values.
    pub source: SplitTable,
    pub config: DetectionConfig,
}

impl DetectionRun {
    pub fn num_rows(&self) -> usize {
        self.verdicts.len()
    }

    pub fn flags(&self) -> Vec<ColorFlag> {
        self.verdicts.iter().map(RowVerdict::color).collect()
    }

    pub fn explanations(&self) -> Vec<&str> {
        self.verdicts.iter().map(|v| v.explanation.as_str()).collect()
    }

    pub fn results(&self) -> Vec<AnomalyResult> {
        self.verdicts.iter().map(|v| v.result).collect()
    }

    /// Count of rows per result, in Anomaly/Normal/Insufficient order.
    pub fn tally(&self) -> [(AnomalyResult, usize); 3] {
        let count = |r: AnomalyResult| self.verdicts.iter().filter(|v| v.result == r).count();
        [
            (AnomalyResult::Anomaly, count(AnomalyResult::Anomaly)),
            (AnomalyResult::Normal, count(AnomalyResult::Normal)),
            (AnomalyResult::InsufficientData, count(AnomalyResult::InsufficientData)),
        ]
    }
}

/// Classify one row of period values.
///
/// The most recent period is the last non-zero, non-missing value; trailing
/// zeros and gaps are skipped. A fresh forest is built for every call.
pub fn classify_row(
    values: &[Option<f64>],
    period_columns: usize,
    cfg: &DetectionConfig,
) -> RowVerdict {
    let non_zero: Vec<f64> = values
        .iter()
        .flatten()
        .copied()
        .filter(|v| *v != 0.0)
        .collect();

    if non_zero.len() < MIN_NON_ZERO {
        return RowVerdict::insufficient();
    }

    let mut forest = IsolationForest::new()
        .with_n_estimators(cfg.n_estimators)
        .with_max_samples(cfg.effective_max_samples(period_columns, non_zero.len()))
        .with_contamination(cfg.contamination)
        .with_random_state(cfg.random_state);
    if let Err(e) = forest.fit(&non_zero) {
        warn!(error = %e, "forest fit failed; row treated as insufficient");
        return RowVerdict::insufficient();
    }

    let prediction = forest.predict(&non_zero);
    match (prediction.last().copied(), non_zero.split_last()) {
        (Some(-1), Some((last, rest))) => RowVerdict::anomaly(explain(*last, rest)),
        _ => RowVerdict::normal(),
    }
}

/// Split `raw` and classify every row.
///
/// The configuration is checked before any row is touched.
#[instrument(level = "info", skip(raw, cfg), fields(rows = raw.num_rows()))]
pub fn run_detection(raw: &RawTable, cfg: &DetectionConfig) -> Result<DetectionRun, ScanError> {
    cfg.validate()?;
    let split = split_table(raw)?;
    Ok(detect_split(split, cfg))
}

/// Classify an already split table. `cfg` must be valid.
pub fn detect_split(split: SplitTable, cfg: &DetectionConfig) -> DetectionRun {
    let start = Instant::now();
    let period_columns = split.period_columns.len();

    // indexed parallel collect keeps input row order
    let verdicts: Vec<RowVerdict> = split
        .matrix
        .par_iter()
        .map(|row| classify_row(row, period_columns, cfg))
        .collect();

    let mut headers = split.headers.clone();
    headers.push(RESULT_COLUMN.to_string());
    headers.push(EXPLANATION_COLUMN.to_string());

    let rows = split
        .rows
        .iter()
        .zip(&verdicts)
        .map(|(cells, verdict)| {
            let mut row = cells.clone();
            row.push(verdict.result.as_str().to_string());
            row.push(verdict.explanation.clone());
            row
        })
        .collect();

    let run = DetectionRun {
        annotated: AnnotatedTable { headers, rows },
        verdicts,
        dimension_columns: split.dimension_columns.clone(),
        source: split,
        config: cfg.clone(),
    };

    let [(_, anomalies), (_, normal), (_, insufficient)] = run.tally();
    debug!(?cfg, "detection config");
    info!(
        anomalies,
        normal,
        insufficient,
        elapsed = ?start.elapsed(),
        "classified {} rows",
        run.num_rows()
    );
    run
}
