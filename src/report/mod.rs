// src/report/mod.rs

pub mod annotated_csv;
pub mod annotated_parquet;
pub mod summary_json;

use anyhow::{Context, Result};
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::info;

use crate::detect::DetectionRun;
use crate::summary::GroupCount;

pub use annotated_csv::write_annotated_csv;
pub use annotated_parquet::write_annotated_parquet;
pub use summary_json::{write_summary_json, SummaryDocument};

pub const HIGHLIGHT_COLUMN: &str = "Highlight";

pub const CSV_FILE: &str = "anomaly_report.csv";
pub const PARQUET_FILE: &str = "anomaly_report.parquet";
pub const SUMMARY_FILE: &str = "anomaly_summary.json";

/// Where a full report set landed.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportPaths {
    pub csv: PathBuf,
    pub parquet: PathBuf,
    pub summary: PathBuf,
}

/// Write the annotated CSV, the Parquet copy and the JSON summary for `run`
/// into `out_dir`.
#[tracing::instrument(level = "info", skip(run, groups), fields(out_dir = %out_dir.as_ref().display()))]
pub fn write_reports<P: AsRef<Path>>(
    run: &DetectionRun,
    source_name: &str,
    groups: Option<&[GroupCount]>,
    out_dir: P,
) -> Result<ReportPaths> {
    let out_dir = out_dir.as_ref();
    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating report directory {}", out_dir.display()))?;

    let csv = write_annotated_csv(run, out_dir.join(CSV_FILE))?;
    let parquet = write_annotated_parquet(run, out_dir.join(PARQUET_FILE))?;
    let summary = write_summary_json(run, source_name, groups, out_dir.join(SUMMARY_FILE))?;

    info!(
        csv = %csv.display(),
        parquet = %parquet.display(),
        summary = %summary.display(),
        "wrote reports"
    );
    Ok(ReportPaths {
        csv,
        parquet,
        summary,
    })
}

/// Write `dest` through a temp file in the same directory, renaming only
/// after `write` succeeds. A failed write leaves any previous `dest` intact.
pub(crate) fn write_atomically<F>(dest: &Path, write: F) -> Result<PathBuf>
where
    F: FnOnce(&mut BufWriter<&File>) -> Result<()>,
{
    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temp file in {}", dir.display()))?;
    {
        let mut w = BufWriter::new(tmp.as_file());
        write(&mut w)?;
        w.flush()
            .with_context(|| format!("flushing {}", dest.display()))?;
    }
    tmp.persist(dest)
        .with_context(|| format!("moving report into place at {}", dest.display()))?;
    Ok(dest.to_path_buf())
}
