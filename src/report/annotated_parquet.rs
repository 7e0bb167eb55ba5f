use anyhow::{Context, Result};
use arrow::{
    array::{ArrayRef, Float64Array, StringArray},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use super::{write_atomically, HIGHLIGHT_COLUMN};
use crate::detect::{DetectionRun, EXPLANATION_COLUMN, RESULT_COLUMN};

/// Build the typed record batch: dimensions as `Utf8`, periods as
/// nullable `Float64`, then result, explanation and highlight as `Utf8`.
pub fn annotated_batch(run: &DetectionRun) -> Result<RecordBatch> {
    let src = &run.source;
    let mut fields = Vec::with_capacity(src.headers.len() + 3);
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(src.headers.len() + 3);

    for (idx, name) in src.dimension_columns.iter().enumerate() {
        fields.push(Field::new(name, DataType::Utf8, true));
        let values: StringArray = src.rows.iter().map(|r| Some(r[idx].as_str())).collect();
        columns.push(Arc::new(values));
    }

    for (idx, name) in src.period_columns.iter().enumerate() {
        fields.push(Field::new(name, DataType::Float64, true));
        let values: Float64Array = src.matrix.iter().map(|r| r[idx]).collect();
        columns.push(Arc::new(values));
    }

    let results: StringArray = run.verdicts.iter().map(|v| Some(v.result.as_str())).collect();
    let explanations: StringArray = run
        .verdicts
        .iter()
        .map(|v| Some(v.explanation.as_str()))
        .collect();
    let highlights: StringArray = run
        .verdicts
        .iter()
        .map(|v| Some(v.color().fill_hex()))
        .collect();
    for (name, arr) in [
        (RESULT_COLUMN, results),
        (EXPLANATION_COLUMN, explanations),
        (HIGHLIGHT_COLUMN, highlights),
    ] {
        fields.push(Field::new(name, DataType::Utf8, false));
        columns.push(Arc::new(arr));
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
        .context("building annotated record batch")
}

/// Annotated table as Snappy-compressed Parquet.
pub fn write_annotated_parquet<P: AsRef<Path>>(run: &DetectionRun, dest: P) -> Result<PathBuf> {
    let dest = dest.as_ref();
    let batch = annotated_batch(run)?;
    write_atomically(dest, |out| {
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let mut writer = ArrowWriter::try_new(out, batch.schema(), Some(props))
            .context("creating Arrow writer for report")?;
        writer.write(&batch).context("writing report batch")?;
        writer.close().context("closing report writer")?;
        Ok(())
    })
    .with_context(|| format!("writing annotated Parquet {}", dest.display()))
}
