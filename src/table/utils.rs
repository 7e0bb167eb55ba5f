/// 1) Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// 2) Parse a cell as a finite number. Empty cells, NaN/inf and anything
///    else that fails to parse are missing.
pub fn parse_numeric(raw: &str) -> Option<f64> {
    let cleaned = clean_str(raw);
    if is_missing(&cleaned) {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Tokens read as "no value" rather than text, matching the default
/// missing-value set of common dataframe CSV readers.
pub const MISSING_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND",
    "1.#QNAN", "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Cells the reader treats as "no value" rather than text.
pub fn is_missing(cleaned: &str) -> bool {
    MISSING_TOKENS.contains(&cleaned)
}

/// 3) Infer whether a column is numeric: every non-missing cell parses.
///    A column with no values at all counts as numeric (all-missing floats).
pub fn infer_numeric_column<'a, I>(cells: I) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    cells.into_iter().all(|raw| {
        let cleaned = clean_str(raw);
        is_missing(&cleaned) || cleaned.parse::<f64>().is_ok()
    })
}
