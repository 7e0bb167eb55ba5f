pub mod classify;
pub mod config;
pub mod forest;
pub mod verdict;

pub use classify::{
    classify_row, detect_split, run_detection, AnnotatedTable, DetectionRun, EXPLANATION_COLUMN,
    MIN_NON_ZERO, RESULT_COLUMN,
};
pub use config::{DetectionConfig, MaxSamplesClamp, RunConfig};
pub use forest::IsolationForest;
pub use verdict::{explain, AnomalyResult, ColorFlag, RowVerdict};
