//! One-dimensional isolation forest.
//!
//! Each tree isolates values by recursive random splits between the current
//! minimum and maximum. Values that are isolated after few splits get a
//! short average path length and therefore a low (more anomalous) score.
//!
//! Scores follow the negated convention: `score = -2^(-E[h(x)] / c(psi))`,
//! so they lie in `[-1, 0]` and lower means more anomalous. The decision
//! threshold (`offset`) is the `contamination` percentile of the training
//! scores; a sample scoring strictly below it is an outlier.

use rand::{rngs::StdRng, seq::index, Rng, SeedableRng};

use crate::error::ScanError;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Debug, Clone)]
enum Node {
    Leaf { size: usize },
    Split { threshold: f64, left: Box<Node>, right: Box<Node> },
}

#[derive(Debug, Clone)]
struct IsolationTree {
    root: Node,
}

impl IsolationTree {
    fn grow(values: &mut [f64], max_depth: usize, rng: &mut StdRng) -> Self {
        Self {
            root: grow_node(values, 0, max_depth, rng),
        }
    }

    /// Depth at which `x` lands plus the expected remaining depth of its leaf.
    fn path_length(&self, x: f64) -> f64 {
        let mut node = &self.root;
        let mut depth = 0usize;
        loop {
            match node {
                Node::Leaf { size } => return depth as f64 + average_path_length(*size),
                Node::Split { threshold, left, right } => {
                    node = if x <= *threshold { left } else { right };
                    depth += 1;
                }
            }
        }
    }
}

fn grow_node(values: &mut [f64], depth: usize, max_depth: usize, rng: &mut StdRng) -> Node {
    if depth >= max_depth || values.len() <= 1 {
        return Node::Leaf { size: values.len() };
    }

    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if max <= min {
        return Node::Leaf { size: values.len() };
    }

    // finite even when `max - min` overflows
    let u: f64 = rng.gen();
    let mut threshold = min * (1.0 - u) + max * u;
    if !(min..max).contains(&threshold) {
        threshold = min;
    }

    // in-place partition: [..split] <= threshold, [split..] > threshold
    let mut split = 0;
    for i in 0..values.len() {
        if values[i] <= threshold {
            values.swap(i, split);
            split += 1;
        }
    }
    let (left, right) = values.split_at_mut(split);

    Node::Split {
        threshold,
        left: Box::new(grow_node(left, depth + 1, max_depth, rng)),
        right: Box::new(grow_node(right, depth + 1, max_depth, rng)),
    }
}

/// Average path length of an unsuccessful BST search over `n` points, `c(n)`.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linear-interpolated percentile (`q` in `[0, 100]`) of `values`.
fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = (q / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (rank - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Isolation forest over a set of scalar samples.
///
/// A fitted forest holds only what `fit` produced; refitting replaces the
/// trees and threshold entirely, and every fit reseeds its generator from
/// `random_state`, so fitting the same data twice yields the same forest.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    n_estimators: usize,
    max_samples: usize,
    contamination: f64,
    random_state: u64,
    trees: Vec<IsolationTree>,
    sample_size: usize,
    offset: f64,
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self::new()
    }
}

impl IsolationForest {
    pub fn new() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            contamination: 0.1,
            random_state: 0,
            trees: Vec::new(),
            sample_size: 0,
            offset: -0.5,
        }
    }

    pub fn with_n_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    /// Upper bound on each tree's sub-sample; the population size caps it.
    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    pub fn with_contamination(mut self, contamination: f64) -> Self {
        self.contamination = contamination;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    /// Sub-sample size actually used by the last fit.
    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Decision threshold on `score_samples`; lower scores are outliers.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn fit(&mut self, data: &[f64]) -> Result<(), ScanError> {
        if data.is_empty() {
            return Err(ScanError::EmptySample);
        }

        let mut rng = StdRng::seed_from_u64(self.random_state);
        let sample_size = self.max_samples.clamp(1, data.len());
        let max_depth = (sample_size.max(2) as f64).log2().ceil() as usize;

        let mut trees = Vec::with_capacity(self.n_estimators);
        let mut buf = Vec::with_capacity(sample_size);
        for _ in 0..self.n_estimators {
            buf.clear();
            buf.extend(
                index::sample(&mut rng, data.len(), sample_size)
                    .into_iter()
                    .map(|i| data[i]),
            );
            trees.push(IsolationTree::grow(&mut buf, max_depth, &mut rng));
        }

        self.trees = trees;
        self.sample_size = sample_size;

        let train_scores = self.score_samples(data);
        self.offset = percentile(&train_scores, 100.0 * self.contamination);
        Ok(())
    }

    /// Negated anomaly score per sample, in `[-1, 0]`.
    pub fn score_samples(&self, data: &[f64]) -> Vec<f64> {
        let norm = average_path_length(self.sample_size);
        data.iter()
            .map(|&x| {
                if self.trees.is_empty() || norm <= 0.0 {
                    // a one-point forest cannot isolate anything
                    return -1.0;
                }
                let mean_path = self.trees.iter().map(|t| t.path_length(x)).sum::<f64>()
                    / self.trees.len() as f64;
                -(2f64.powf(-mean_path / norm))
            })
            .collect()
    }

    /// `score_samples - offset`; negative means outlier.
    pub fn decision_function(&self, data: &[f64]) -> Vec<f64> {
        self.score_samples(data)
            .into_iter()
            .map(|s| s - self.offset)
            .collect()
    }

    /// `-1` for outliers, `1` for inliers.
    pub fn predict(&self, data: &[f64]) -> Vec<i8> {
        self.decision_function(data)
            .into_iter()
            .map(|d| if d < 0.0 { -1 } else { 1 })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forest() -> IsolationForest {
        IsolationForest::new()
            .with_n_estimators(100)
            .with_max_samples(64)
            .with_contamination(0.05)
            .with_random_state(42)
    }

    fn history_with_spike() -> Vec<f64> {
        let mut v: Vec<f64> = (0..14).map(|i| 100.0 + (i % 5) as f64 * 2.0).collect();
        v.push(1040.0);
        v
    }

    #[test]
    fn average_path_length_known_values() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        let c256 = average_path_length(256);
        assert!((c256 - 10.244).abs() < 0.01, "c(256) = {c256}");
    }

    #[test]
    fn percentile_interpolates() {
        let v = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(percentile(&v, 0.0), 1.0);
        assert_eq!(percentile(&v, 100.0), 4.0);
        assert!((percentile(&v, 50.0) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn spike_is_the_only_outlier() {
        let data = history_with_spike();
        let mut f = forest();
        f.fit(&data).unwrap();

        let preds = f.predict(&data);
        assert_eq!(preds.len(), data.len());
        assert_eq!(*preds.last().unwrap(), -1);
        assert_eq!(preds.iter().filter(|&&p| p == -1).count(), 1);
    }

    #[test]
    fn scores_are_bounded_and_predictions_binary() {
        let data = history_with_spike();
        let mut f = forest();
        f.fit(&data).unwrap();
        for s in f.score_samples(&data) {
            assert!((-1.0..=0.0).contains(&s), "score {s}");
        }
        assert!(f.predict(&data).iter().all(|&p| p == 1 || p == -1));
    }

    #[test]
    fn sample_size_is_capped_by_population() {
        let data = history_with_spike();
        let mut f = forest().with_max_samples(1_000);
        f.fit(&data).unwrap();
        assert_eq!(f.sample_size(), data.len());
    }

    #[test]
    fn refit_with_same_seed_is_identical() {
        let data = history_with_spike();
        let mut a = forest();
        a.fit(&[1.0, 2.0, 3.0, 50.0]).unwrap();
        a.fit(&data).unwrap();
        let mut b = forest();
        b.fit(&data).unwrap();

        assert_eq!(a.score_samples(&data), b.score_samples(&data));
        assert_eq!(a.offset(), b.offset());
    }

    #[test]
    fn constant_samples_flag_nothing() {
        let data = vec![7.0; 20];
        let mut f = forest();
        f.fit(&data).unwrap();
        assert!(f.predict(&data).iter().all(|&p| p == 1));
    }

    #[test]
    fn single_sample_forest_flags_nothing() {
        let mut f = forest().with_max_samples(1);
        f.fit(&[1.0, 2.0, 300.0]).unwrap();
        assert!(f.predict(&[1.0, 2.0, 300.0]).iter().all(|&p| p == 1));
    }

    #[test]
    fn opposite_extremes_do_not_overflow_the_split() {
        let data = [1.5e308, -1.5e308, f64::MAX, f64::MIN, 1.0, -1.0];
        let mut f = forest();
        f.fit(&data).unwrap();
        let scores = f.score_samples(&data);
        assert!(scores.iter().all(|s| s.is_finite() && (-1.0..=0.0).contains(s)));
    }

    #[test]
    fn empty_fit_is_rejected() {
        let mut f = forest();
        assert_eq!(f.fit(&[]), Err(ScanError::EmptySample));
        assert!(!f.is_fitted());
    }
}
