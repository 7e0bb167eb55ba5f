// src/error.rs

use thiserror::Error;

/// Fatal errors raised by the engine itself.
///
/// Cell-level parse failures are not errors: they become missing values and
/// are only logged.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScanError {
    /// The table cannot be split into dimension and period columns.
    #[error("schema error: {0}")]
    Schema(String),

    /// A run or chart parameter lies outside its domain.
    #[error("invalid configuration: {field} = {value} ({reason})")]
    Config {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    /// An isolation forest was asked to fit zero samples.
    #[error("cannot fit an isolation forest on an empty sample")]
    EmptySample,

    /// A group-by column that is not one of the table's dimension columns.
    #[error("unknown dimension column `{0}`")]
    UnknownColumn(String),
}

impl ScanError {
    pub(crate) fn config(field: &'static str, value: impl ToString, reason: &'static str) -> Self {
        ScanError::Config {
            field,
            value: value.to_string(),
            reason,
        }
    }
}
