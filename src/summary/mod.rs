// src/summary/mod.rs

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::detect::{AnomalyResult, DetectionRun};
use crate::error::ScanError;
use crate::table::utils::{clean_str, is_missing};

/// Joins the chosen dimension values into one group label.
pub const GROUP_SEPARATOR: &str = " | ";

/// Label used for rows whose explanation is empty.
pub const NORMAL_LABEL: &str = "Normal";

/// Label segment for a missing dimension value.
pub const MISSING_LABEL: &str = "nan";

/// Which rows a group summary counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ResultFilter {
    #[default]
    All,
    Only(AnomalyResult),
}

impl ResultFilter {
    pub fn accepts(&self, result: AnomalyResult) -> bool {
        match self {
            ResultFilter::All => true,
            ResultFilter::Only(wanted) => *wanted == result,
        }
    }
}

impl FromStr for ResultFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(ResultFilter::All)
        } else {
            s.parse().map(ResultFilter::Only)
        }
    }
}

impl TryFrom<String> for ResultFilter {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ResultFilter> for String {
    fn from(f: ResultFilter) -> String {
        f.to_string()
    }
}

impl fmt::Display for ResultFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultFilter::All => f.write_str("All"),
            ResultFilter::Only(r) => f.write_str(r.as_str()),
        }
    }
}

/// Grouping choices for the chart summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartOptions {
    pub group_by: Vec<String>,
    pub top_n: usize,
    pub result_filter: ResultFilter,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            group_by: Vec::new(),
            top_n: 5,
            result_filter: ResultFilter::All,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplanationCount {
    pub explanation: String,
    pub count: usize,
    /// Share of all rows, rounded to one decimal.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupCount {
    pub group_label: String,
    pub result: AnomalyResult,
    pub count: usize,
}

/// Count identical keys, keeping first-encounter order.
fn count_in_order<K, I>(keys: I) -> Vec<(K, usize)>
where
    K: Eq + std::hash::Hash + Clone,
    I: IntoIterator<Item = K>,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut counts: Vec<(K, usize)> = Vec::new();
    for key in keys {
        match index.get(&key) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(key.clone(), counts.len());
                counts.push((key, 1));
            }
        }
    }
    // stable: ties keep encounter order
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

/// Frequency of each explanation over all rows, most common first.
///
/// Empty explanations are counted as [`NORMAL_LABEL`].
pub fn explanation_frequency<I, S>(explanations: I) -> Vec<ExplanationCount>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let labels = explanations.into_iter().map(|e| {
        let e = e.as_ref();
        if e.is_empty() {
            NORMAL_LABEL.to_string()
        } else {
            e.to_string()
        }
    });
    let counts = count_in_order(labels);
    let total: usize = counts.iter().map(|(_, c)| c).sum();

    counts
        .into_iter()
        .map(|(explanation, count)| ExplanationCount {
            explanation,
            count,
            percentage: round_one_decimal(count as f64 / total as f64 * 100.0),
        })
        .collect()
}

/// Round to one decimal, halves to even.
fn round_one_decimal(v: f64) -> f64 {
    (v * 10.0).round_ties_even() / 10.0
}

fn dimension_label(cell: &str) -> &str {
    if is_missing(&clean_str(cell)) {
        MISSING_LABEL
    } else {
        cell
    }
}

/// Row counts per `(group label, result)` for the `top_n` most frequent
/// group labels.
///
/// An empty `group_by` yields an empty summary.
pub fn group_summary(run: &DetectionRun, opts: &ChartOptions) -> Result<Vec<GroupCount>, ScanError> {
    if opts.group_by.is_empty() {
        return Ok(Vec::new());
    }
    if opts.top_n == 0 {
        return Err(ScanError::config("top_n", opts.top_n, "must be at least 1"));
    }

    let positions: Vec<usize> = opts
        .group_by
        .iter()
        .map(|name| {
            run.dimension_columns
                .iter()
                .position(|d| d == name)
                .ok_or_else(|| ScanError::UnknownColumn(name.clone()))
        })
        .collect::<Result<_, _>>()?;

    // 1) filter + 2) composite labels
    let labelled: Vec<(String, AnomalyResult)> = run
        .verdicts
        .iter()
        .enumerate()
        .filter(|(_, v)| opts.result_filter.accepts(v.result))
        .map(|(row, v)| {
            let dims = run.source.dimension_values(row);
            let label = positions
                .iter()
                .map(|&p| dimension_label(&dims[p]))
                .collect::<Vec<_>>()
                .join(GROUP_SEPARATOR);
            (label, v.result)
        })
        .collect();

    // 3) top-N labels by raw count
    let top: HashSet<String> = count_in_order(labelled.iter().map(|(l, _)| l.clone()))
        .into_iter()
        .take(opts.top_n)
        .map(|(l, _)| l)
        .collect();

    // 4) + 5) count per (label, result), most common first
    let summary: Vec<GroupCount> =
        count_in_order(labelled.into_iter().filter(|(l, _)| top.contains(l)))
            .into_iter()
            .map(|((group_label, result), count)| GroupCount {
                group_label,
                result,
                count,
            })
            .collect();

    debug!(
        group_by = ?opts.group_by,
        filter = %opts.result_filter,
        groups = top.len(),
        entries = summary.len(),
        "group summary"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{AnnotatedTable, DetectionConfig, RowVerdict};
    use crate::table::SplitTable;

    fn fake_run(dimension_columns: &[&str], rows: Vec<(Vec<&str>, AnomalyResult)>) -> DetectionRun {
        let verdicts = rows
            .iter()
            .map(|(_, r)| match r {
                AnomalyResult::Anomaly => RowVerdict::anomaly("Other"),
                AnomalyResult::Normal => RowVerdict::normal(),
                AnomalyResult::InsufficientData => RowVerdict::insufficient(),
            })
            .collect();
        let cells: Vec<Vec<String>> = rows
            .iter()
            .map(|(d, _)| d.iter().map(|s| s.to_string()).collect())
            .collect();
        let dims: Vec<String> = dimension_columns.iter().map(|s| s.to_string()).collect();
        DetectionRun {
            annotated: AnnotatedTable {
                headers: dims.clone(),
                rows: cells.clone(),
            },
            verdicts,
            dimension_columns: dims.clone(),
            source: SplitTable {
                headers: dims.clone(),
                matrix: vec![Vec::new(); cells.len()],
                rows: cells,
                dimension_columns: dims,
                period_columns: Vec::new(),
                coerced_cells: 0,
            },
            config: DetectionConfig::default(),
        }
    }

    fn opts(group_by: &[&str], top_n: usize, filter: ResultFilter) -> ChartOptions {
        ChartOptions {
            group_by: group_by.iter().map(|s| s.to_string()).collect(),
            top_n,
            result_filter: filter,
        }
    }

    /// Regions occurring 10 (North), 7 (South) and 3 (West) times.
    fn regional_run() -> DetectionRun {
        let mut rows = Vec::new();
        for i in 0..10 {
            let r = if i < 4 { AnomalyResult::Anomaly } else { AnomalyResult::Normal };
            rows.push((vec!["North", "Opex"], r));
        }
        for i in 0..7 {
            let r = if i < 5 { AnomalyResult::Anomaly } else { AnomalyResult::InsufficientData };
            rows.push((vec!["South", "Capex"], r));
        }
        for _ in 0..3 {
            rows.push((vec!["West", "Opex"], AnomalyResult::Anomaly));
        }
        fake_run(&["Region", "Account"], rows)
    }

    #[test]
    fn explanation_frequency_counts_and_rounds() {
        let explanations = ["", "Spike in recent period", "", "Consistent drop", "", "Spike in recent period"];
        let freq = explanation_frequency(explanations);

        assert_eq!(freq[0].explanation, NORMAL_LABEL);
        assert_eq!(freq[0].count, 3);
        assert_eq!(freq[0].percentage, 50.0);
        assert_eq!(freq[1].explanation, "Spike in recent period");
        assert_eq!(freq[1].percentage, 33.3);
        assert_eq!(freq[2].explanation, "Consistent drop");
        assert_eq!(freq[2].percentage, 16.7);
    }

    #[test]
    fn explanation_percentages_sum_to_one_hundred() {
        let mut explanations = vec![""; 7];
        explanations.extend(["Other"; 5]);
        explanations.extend(["Too few non-zero data points"; 3]);
        explanations.extend(["Consistent drop"; 1]);
        let freq = explanation_frequency(&explanations);

        let total: f64 = freq.iter().map(|f| f.percentage).sum();
        assert!((total - 100.0).abs() <= 0.1 * freq.len() as f64, "sum = {total}");
        assert_eq!(freq.iter().map(|f| f.count).sum::<usize>(), explanations.len());
    }

    #[test]
    fn exact_halves_round_to_even() {
        let mut explanations = vec!["Other"];
        explanations.extend([""; 15]);
        let freq = explanation_frequency(explanations);

        assert_eq!(freq[0].explanation, NORMAL_LABEL);
        assert_eq!(freq[0].percentage, 93.8);
        assert_eq!(freq[1].explanation, "Other");
        assert_eq!(freq[1].percentage, 6.2);
    }

    #[test]
    fn explanations_are_grouped_by_exact_text() {
        let freq = explanation_frequency(["Other", "Other ", " ", ""]);
        let labels: Vec<&str> = freq.iter().map(|f| f.explanation.as_str()).collect();
        assert_eq!(labels, vec!["Other", "Other ", " ", NORMAL_LABEL]);
        assert!(freq.iter().all(|f| f.count == 1));
    }

    #[test]
    fn missing_dimension_values_are_labelled_nan() {
        let run = fake_run(
            &["Region", "Account"],
            vec![
                (vec!["", "Opex"], AnomalyResult::Anomaly),
                (vec!["NA", "Opex"], AnomalyResult::Anomaly),
                (vec!["North", ""], AnomalyResult::Normal),
            ],
        );
        let summary = group_summary(&run, &opts(&["Region", "Account"], 5, ResultFilter::All)).unwrap();
        assert_eq!(
            summary,
            vec![
                GroupCount { group_label: "nan | Opex".into(), result: AnomalyResult::Anomaly, count: 2 },
                GroupCount { group_label: "North | nan".into(), result: AnomalyResult::Normal, count: 1 },
            ]
        );
    }

    #[test]
    fn ties_keep_first_encounter_order() {
        let freq = explanation_frequency(["Other", "Consistent drop", "Consistent drop", "Other"]);
        assert_eq!(freq[0].explanation, "Other");
        assert_eq!(freq[1].explanation, "Consistent drop");
    }

    #[test]
    fn top_n_keeps_most_frequent_groups() {
        let run = regional_run();
        let summary = group_summary(&run, &opts(&["Region"], 2, ResultFilter::All)).unwrap();

        let labels: HashSet<&str> = summary.iter().map(|g| g.group_label.as_str()).collect();
        assert_eq!(labels, HashSet::from(["North", "South"]));
        assert_eq!(
            summary,
            vec![
                GroupCount { group_label: "North".into(), result: AnomalyResult::Normal, count: 6 },
                GroupCount { group_label: "South".into(), result: AnomalyResult::Anomaly, count: 5 },
                GroupCount { group_label: "North".into(), result: AnomalyResult::Anomaly, count: 4 },
                GroupCount {
                    group_label: "South".into(),
                    result: AnomalyResult::InsufficientData,
                    count: 2
                },
            ]
        );
    }

    #[test]
    fn filter_is_applied_before_ranking() {
        let run = regional_run();
        let only = ResultFilter::Only(AnomalyResult::Anomaly);
        let summary = group_summary(&run, &opts(&["Region"], 2, only)).unwrap();

        assert!(summary.iter().all(|g| g.result == AnomalyResult::Anomaly));
        // post-filter counts: South 5, North 4, West 3
        let labels: Vec<&str> = summary.iter().map(|g| g.group_label.as_str()).collect();
        assert_eq!(labels, vec!["South", "North"]);
    }

    #[test]
    fn composite_labels_follow_column_order() {
        let run = regional_run();
        let summary = group_summary(&run, &opts(&["Account", "Region"], 10, ResultFilter::All)).unwrap();
        let labels: HashSet<&str> = summary.iter().map(|g| g.group_label.as_str()).collect();
        assert_eq!(labels, HashSet::from(["Opex | North", "Capex | South", "Opex | West"]));
        assert_eq!(summary.iter().map(|g| g.count).sum::<usize>(), 20);
    }

    #[test]
    fn empty_selection_is_an_empty_summary() {
        let run = regional_run();
        assert!(group_summary(&run, &opts(&[], 5, ResultFilter::All)).unwrap().is_empty());
    }

    #[test]
    fn unknown_column_and_zero_top_n_are_errors() {
        let run = regional_run();
        assert_eq!(
            group_summary(&run, &opts(&["Cost Centre"], 5, ResultFilter::All)),
            Err(ScanError::UnknownColumn("Cost Centre".into()))
        );
        assert!(matches!(
            group_summary(&run, &opts(&["Region"], 0, ResultFilter::All)),
            Err(ScanError::Config { .. })
        ));
    }

    #[test]
    fn result_filter_parses_labels() {
        assert_eq!("All".parse::<ResultFilter>(), Ok(ResultFilter::All));
        assert_eq!(
            "Insufficient Data".parse::<ResultFilter>(),
            Ok(ResultFilter::Only(AnomalyResult::InsufficientData))
        );
        assert!("Sometimes".parse::<ResultFilter>().is_err());
        assert_eq!(ResultFilter::Only(AnomalyResult::Normal).to_string(), "Normal");
    }
}
