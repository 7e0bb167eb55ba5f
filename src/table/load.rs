use anyhow::{anyhow, Context, Result};
use csv::ReaderBuilder;
use std::{fs::File, io::Read, path::Path};
use tracing::{debug, warn};

use super::RawTable;

/// Read a header-row CSV file into a [`RawTable`].
#[tracing::instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<RawTable> {
    let file = File::open(&path)
        .with_context(|| format!("Failed to open CSV file: {:?}", path.as_ref()))?;
    read_table(file).with_context(|| format!("Failed to parse CSV file: {:?}", path.as_ref()))
}

/// Parse an in-memory CSV buffer (an upload or a downloaded body).
pub fn load_csv_bytes(data: &[u8]) -> Result<RawTable> {
    read_table(data)
}

fn read_table<R: Read>(reader: R) -> Result<RawTable> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true) // short or ragged rows are padded below
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .context("reading CSV header row")?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    if headers.is_empty() {
        return Err(anyhow!("CSV has no header row"));
    }

    let mut rows = Vec::new();
    let mut ragged = 0usize;
    for (idx, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("CSV parse error at record {}", idx))?;
        if record.len() != headers.len() {
            ragged += 1;
        }
        rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }

    if ragged > 0 {
        warn!(
            ragged,
            width = headers.len(),
            "rows with a different field count than the header were padded/truncated"
        );
    }
    debug!(rows = rows.len(), columns = headers.len(), "loaded table");

    Ok(RawTable::new(headers, rows))
}
