//! Per-row anomaly scanning for wide period tables.
//!
//! A table is split into dimension labels and chronological period values
//! ([`table`]), every row is checked on its own history with an isolation
//! forest ([`detect`]), and the verdicts are rolled up for reporting
//! ([`summary`], [`report`]).

pub mod detect;
pub mod error;
pub mod fetch;
pub mod report;
pub mod summary;
pub mod table;

pub use detect::{run_detection, DetectionConfig, DetectionRun, RunConfig};
pub use error::ScanError;
pub use table::RawTable;
