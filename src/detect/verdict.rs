use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const TOO_FEW_POINTS: &str = "Too few non-zero data points";
pub const MISSING_RECENT: &str = "Missing recent value";
pub const SPIKE: &str = "Spike in recent period";
pub const DROP: &str = "Consistent drop";
pub const OTHER: &str = "Other";

/// Outcome category for one row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnomalyResult {
    Anomaly,
    Normal,
    #[serde(rename = "Insufficient Data")]
    InsufficientData,
}

impl AnomalyResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyResult::Anomaly => "Anomaly",
            AnomalyResult::Normal => "Normal",
            AnomalyResult::InsufficientData => "Insufficient Data",
        }
    }

    pub fn color(&self) -> ColorFlag {
        match self {
            AnomalyResult::Anomaly => ColorFlag::Red,
            AnomalyResult::Normal => ColorFlag::Green,
            AnomalyResult::InsufficientData => ColorFlag::Blue,
        }
    }
}

impl fmt::Display for AnomalyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnomalyResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "anomaly" => Ok(AnomalyResult::Anomaly),
            "normal" => Ok(AnomalyResult::Normal),
            "insufficientdata" => Ok(AnomalyResult::InsufficientData),
            _ => Err(format!("unknown anomaly result `{}`", s)),
        }
    }
}

/// Presentation colour; always derived from an [`AnomalyResult`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorFlag {
    Red,
    Green,
    Blue,
}

impl ColorFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorFlag::Red => "red",
            ColorFlag::Green => "green",
            ColorFlag::Blue => "blue",
        }
    }

    /// Row fill colour used in written reports.
    pub fn fill_hex(&self) -> &'static str {
        match self {
            ColorFlag::Red => "FF9999",
            ColorFlag::Green => "CCFFCC",
            ColorFlag::Blue => "CCE5FF",
        }
    }
}

impl fmt::Display for ColorFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result and explanation for one row. The colour is not stored; it is
/// always [`AnomalyResult::color`] of `result`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowVerdict {
    pub result: AnomalyResult,
    pub explanation: String,
}

impl RowVerdict {
    pub fn insufficient() -> Self {
        Self {
            result: AnomalyResult::InsufficientData,
            explanation: TOO_FEW_POINTS.to_string(),
        }
    }

    pub fn normal() -> Self {
        Self {
            result: AnomalyResult::Normal,
            explanation: String::new(),
        }
    }

    pub fn anomaly(explanation: &str) -> Self {
        Self {
            result: AnomalyResult::Anomaly,
            explanation: explanation.to_string(),
        }
    }

    pub fn color(&self) -> ColorFlag {
        self.result.color()
    }
}

/// Explain why `last` was flagged, relative to the mean of `rest`.
///
/// Rules are checked in order and the first match wins. `rest` must not be
/// empty.
pub fn explain(last: f64, rest: &[f64]) -> &'static str {
    let mean = rest.iter().sum::<f64>() / rest.len() as f64;
    if last == 0.0 {
        MISSING_RECENT
    } else if last > mean * 1.5 {
        SPIKE
    } else if last < mean * 0.5 {
        DROP
    } else {
        OTHER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colour_follows_result() {
        assert_eq!(RowVerdict::anomaly(SPIKE).color(), ColorFlag::Red);
        assert_eq!(RowVerdict::normal().color(), ColorFlag::Green);
        assert_eq!(RowVerdict::insufficient().color(), ColorFlag::Blue);
    }

    #[test]
    fn explanation_rules_in_order() {
        let rest = [10.0, 10.0, 10.0, 10.0];
        assert_eq!(explain(0.0, &rest), MISSING_RECENT);
        assert_eq!(explain(15.1, &rest), SPIKE);
        assert_eq!(explain(15.0, &rest), OTHER);
        assert_eq!(explain(4.9, &rest), DROP);
        assert_eq!(explain(5.0, &rest), OTHER);
        assert_eq!(explain(12.0, &rest), OTHER);
    }

    #[test]
    fn negative_history_uses_the_same_thresholds() {
        // mean = -10: 1.5x is -15, 0.5x is -5
        let rest = [-10.0, -10.0];
        assert_eq!(explain(-1.0, &rest), SPIKE);
        assert_eq!(explain(-20.0, &rest), DROP);
    }

    #[test]
    fn result_labels_round_trip_through_text() {
        for r in [
            AnomalyResult::Anomaly,
            AnomalyResult::Normal,
            AnomalyResult::InsufficientData,
        ] {
            assert_eq!(r.as_str().parse::<AnomalyResult>(), Ok(r));
        }
        assert_eq!(
            "insufficient_data".parse::<AnomalyResult>(),
            Ok(AnomalyResult::InsufficientData)
        );
        assert!("weird".parse::<AnomalyResult>().is_err());
    }
}
