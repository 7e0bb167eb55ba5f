use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::write_atomically;
use crate::detect::{AnomalyResult, DetectionConfig, DetectionRun};
use crate::summary::{explanation_frequency, ExplanationCount, GroupCount};

#[derive(Debug, Serialize)]
pub struct ResultTotal {
    pub result: AnomalyResult,
    pub count: usize,
}

/// The summary sheet of a report: what ran, on what, and how it came out.
#[derive(Debug, Serialize)]
pub struct SummaryDocument<'a> {
    pub generated_at: DateTime<Utc>,
    pub source: &'a str,
    pub rows: usize,
    pub dimension_columns: &'a [String],
    pub period_columns: &'a [String],
    pub coerced_cells: usize,
    pub config: &'a DetectionConfig,
    pub results: Vec<ResultTotal>,
    pub explanations: Vec<ExplanationCount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<&'a [GroupCount]>,
}

impl<'a> SummaryDocument<'a> {
    pub fn new(run: &'a DetectionRun, source: &'a str, groups: Option<&'a [GroupCount]>) -> Self {
        Self {
            generated_at: Utc::now(),
            source,
            rows: run.num_rows(),
            dimension_columns: &run.dimension_columns,
            period_columns: &run.source.period_columns,
            coerced_cells: run.source.coerced_cells,
            config: &run.config,
            results: run
                .tally()
                .into_iter()
                .map(|(result, count)| ResultTotal { result, count })
                .collect(),
            explanations: explanation_frequency(run.explanations()),
            groups,
        }
    }
}

pub fn write_summary_json<P: AsRef<Path>>(
    run: &DetectionRun,
    source: &str,
    groups: Option<&[GroupCount]>,
    dest: P,
) -> Result<PathBuf> {
    let dest = dest.as_ref();
    let doc = SummaryDocument::new(run, source, groups);
    write_atomically(dest, |out| {
        serde_json::to_writer_pretty(out, &doc).context("serializing summary")?;
        Ok(())
    })
    .with_context(|| format!("writing summary {}", dest.display()))
}
