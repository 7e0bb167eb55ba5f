use anyhow::{Context, Result};
use csv::WriterBuilder;
use std::path::{Path, PathBuf};

use super::{write_atomically, HIGHLIGHT_COLUMN};
use crate::detect::DetectionRun;

/// Annotated table as CSV, with each row's fill colour in a trailing
/// `Highlight` column.
pub fn write_annotated_csv<P: AsRef<Path>>(run: &DetectionRun, dest: P) -> Result<PathBuf> {
    let dest = dest.as_ref();
    write_atomically(dest, |out| {
        let mut wtr = WriterBuilder::new().from_writer(out);

        let mut header: Vec<&str> = run.annotated.headers.iter().map(String::as_str).collect();
        header.push(HIGHLIGHT_COLUMN);
        wtr.write_record(&header).context("writing CSV header")?;

        for (row, verdict) in run.annotated.rows.iter().zip(&run.verdicts) {
            wtr.write_record(
                row.iter()
                    .map(String::as_str)
                    .chain(std::iter::once(verdict.color().fill_hex())),
            )
            .context("writing CSV row")?;
        }
        wtr.flush().context("flushing CSV writer")?;
        Ok(())
    })
    .with_context(|| format!("writing annotated CSV {}", dest.display()))
}
