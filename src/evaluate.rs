//! Evaluation against a labelled reference sample
//!
//! Compares record-level `contains_pii` predictions with ground-truth
//! labels. False negatives are the number that matters.

use serde::Serialize;

/// Label spellings read as "contains PII"
const TRUE_VALUES: &[&str] = &["true", "1", "1.0", "sim", "yes", "s", "y", "verdadeiro"];

/// Read a ground-truth label leniently; anything unrecognized is false
pub fn parse_truthy(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    TRUE_VALUES.contains(&value.as_str())
}

/// Read a JSON ground-truth label (bool, number, or string)
pub fn parse_truthy_json(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().map(|f| f == 1.0).unwrap_or(false),
        serde_json::Value::String(s) => parse_truthy(s),
        _ => false,
    }
}

/// Binary confusion matrix over records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

impl ConfusionMatrix {
    /// Build from `(predicted, actual)` pairs
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (bool, bool)>,
    {
        let mut m = Self::default();
        for (predicted, actual) in pairs {
            m.record(predicted, actual);
        }
        m
    }

    pub fn record(&mut self, predicted: bool, actual: bool) {
        match (predicted, actual) {
            (true, true) => self.true_positives += 1,
            (true, false) => self.false_positives += 1,
            (false, false) => self.true_negatives += 1,
            (false, true) => self.false_negatives += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }

    pub fn metrics(&self) -> Metrics {
        let tp = self.true_positives as f64;
        let accuracy = ratio(tp + self.true_negatives as f64, self.total() as f64);
        let precision = ratio(tp, tp + self.false_positives as f64);
        let recall = ratio(tp, tp + self.false_negatives as f64);
        let f1 = ratio(2.0 * precision * recall, precision + recall);
        Metrics {
            matrix: *self,
            accuracy,
            precision,
            recall,
            f1,
        }
    }
}

/// Scores derived from a [`ConfusionMatrix`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Metrics {
    pub matrix: ConfusionMatrix,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}
