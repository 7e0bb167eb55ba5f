use tracing::{debug, trace, warn};

use super::utils::{clean_str, infer_numeric_column, is_missing, parse_numeric};
use super::RawTable;
use crate::error::ScanError;

/// A table with the identifier removed and the remaining columns divided
/// into grouping labels and chronological period values.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitTable {
    /// Header names of every column after the identifier.
    pub headers: Vec<String>,
    /// Raw cells of every column after the identifier, row-aligned.
    pub rows: Vec<Vec<String>>,
    /// Names of the columns before the first numeric column.
    pub dimension_columns: Vec<String>,
    /// Names of the first numeric column and everything after it.
    pub period_columns: Vec<String>,
    /// `matrix[row][period]`, `None` where the cell is empty or unparseable.
    pub matrix: Vec<Vec<Option<f64>>>,
    /// Non-empty cells in period columns that failed to parse.
    pub coerced_cells: usize,
}

impl SplitTable {
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Dimension cells of `row`, in dimension-column order.
    pub fn dimension_values(&self, row: usize) -> &[String] {
        &self.rows[row][..self.dimension_columns.len()]
    }
}

/// Drop the identifier column, locate the first numeric column and coerce
/// it and everything after it to numbers.
///
/// Fails only when no column after the identifier is numeric.
pub fn split_table(raw: &RawTable) -> Result<SplitTable, ScanError> {
    if raw.num_columns() < 2 {
        return Err(ScanError::Schema(format!(
            "need an identifier column plus at least one numeric column, got {} column(s)",
            raw.num_columns()
        )));
    }

    let first_numeric = (1..raw.num_columns())
        .find(|&idx| infer_numeric_column(raw.column(idx)))
        .ok_or_else(|| {
            ScanError::Schema("no numeric column found after the identifier".to_string())
        })?;

    let headers: Vec<String> = raw.headers[1..].to_vec();
    let dimension_columns = raw.headers[1..first_numeric].to_vec();
    let period_columns = raw.headers[first_numeric..].to_vec();

    let mut coerced_cells = 0usize;
    let mut matrix = Vec::with_capacity(raw.num_rows());
    for (row_idx, row) in raw.rows.iter().enumerate() {
        let values: Vec<Option<f64>> = row[first_numeric..]
            .iter()
            .enumerate()
            .map(|(offset, cell)| {
                let parsed = parse_numeric(cell);
                if parsed.is_none() && !is_missing(&clean_str(cell)) {
                    coerced_cells += 1;
                    trace!(
                        row = row_idx,
                        column = %period_columns[offset],
                        cell = %cell,
                        "unparseable period value treated as missing"
                    );
                }
                parsed
            })
            .collect();
        matrix.push(values);
    }

    if coerced_cells > 0 {
        warn!(coerced_cells, "period cells could not be parsed and were treated as missing");
    }
    debug!(
        dimensions = dimension_columns.len(),
        periods = period_columns.len(),
        rows = matrix.len(),
        "split table"
    );

    Ok(SplitTable {
        headers,
        rows: raw.rows.iter().map(|r| r[1..].to_vec()).collect(),
        dimension_columns,
        period_columns,
        matrix,
        coerced_cells,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable::new(
            headers.iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn splits_dimensions_from_periods() {
        let raw = table(
            &["Id", "Entity", "Account", "Jan", "Feb", "Mar"],
            &[
                &["1", "E1", "Travel", "10", "x", ""],
                &["2", "E2", "Rent", "5", "6", "7"],
            ],
        );
        let split = split_table(&raw).unwrap();

        assert_eq!(split.headers, vec!["Entity", "Account", "Jan", "Feb", "Mar"]);
        assert_eq!(split.dimension_columns, vec!["Entity", "Account"]);
        assert_eq!(split.period_columns, vec!["Jan", "Feb", "Mar"]);
        // "x" was not numeric but the first numeric column decides the split
        assert_eq!(split.matrix[0], vec![Some(10.0), None, None]);
        assert_eq!(split.matrix[1], vec![Some(5.0), Some(6.0), Some(7.0)]);
        assert_eq!(split.coerced_cells, 1);
        assert_eq!(split.dimension_values(1), &["E2".to_string(), "Rent".to_string()]);
    }

    #[test]
    fn identifier_is_dropped_even_when_numeric() {
        let raw = table(&["Id", "Jan", "Feb"], &[&["100", "1", "2"]]);
        let split = split_table(&raw).unwrap();
        assert!(split.dimension_columns.is_empty());
        assert_eq!(split.period_columns, vec!["Jan", "Feb"]);
    }

    #[test]
    fn text_after_first_numeric_column_is_coerced() {
        let raw = table(&["Id", "Jan", "Note"], &[&["1", "3", "hello"]]);
        let split = split_table(&raw).unwrap();
        assert_eq!(split.period_columns, vec!["Jan", "Note"]);
        assert_eq!(split.matrix[0], vec![Some(3.0), None]);
    }

    #[test]
    fn missing_token_in_first_period_keeps_the_boundary() {
        let mut headers = vec!["Id", "Entity"];
        let periods: Vec<String> = (1..=15).map(|p| format!("P{}", p)).collect();
        headers.extend(periods.iter().map(String::as_str));
        let mut row = vec!["1", "E1", "n/a"];
        row.extend(["10"; 14]);
        let raw = table(&headers, &[&row]);

        let split = split_table(&raw).unwrap();
        assert_eq!(split.dimension_columns, vec!["Entity"]);
        assert_eq!(split.period_columns.len(), 15);
        assert_eq!(split.period_columns[0], "P1");
        assert_eq!(split.matrix[0][0], None);
        assert_eq!(split.matrix[0][1], Some(10.0));
        assert_eq!(split.coerced_cells, 0);
    }

    #[test]
    fn no_numeric_column_is_a_schema_error() {
        let raw = table(&["Id", "Entity"], &[&["1", "E1"]]);
        assert!(matches!(split_table(&raw), Err(ScanError::Schema(_))));

        let single = table(&["Id"], &[&["1"]]);
        assert!(matches!(split_table(&single), Err(ScanError::Schema(_))));
    }
}
