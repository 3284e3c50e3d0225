//! Fusion engine
//!
//! Runs the pattern matcher and the name resolver over the normalized text,
//! applies signal support, and unions everything into one
//! [`ClassificationResult`]. Recall comes first: a finding is only dropped
//! when it is a duplicate of a better one or a name below the near-miss
//! floor.

use crate::config::{NameBandPolicy, ThresholdConfig, VigilConfig};
use crate::error::{Result, VigilError};
use crate::names::{NameOracle, NameResolution, NameSpanResolver};
use crate::normalize::{normalize, NormalizedText};
use crate::patterns::PatternMatcher;
use crate::signals::SignalExtractor;
use crate::types::{Category, ClassificationResult, Detection, Record};
use std::collections::HashMap;
use std::sync::Arc;

/// Per-record PII classifier; shared read-only across a batch
pub struct PiiClassifier {
    patterns: PatternMatcher,
    names: NameSpanResolver,
    signals: SignalExtractor,
    thresholds: ThresholdConfig,
    boost: f64,
}

impl PiiClassifier {
    /// Validate `config` and compile every component
    pub fn new(config: &VigilConfig, oracle: Option<Arc<dyn NameOracle>>) -> Result<Self> {
        config.validate()?;

        match (&oracle, config.oracle.enabled) {
            (Some(o), true) => tracing::info!(oracle = o.name(), "Name oracle enabled"),
            (None, true) => {
                tracing::warn!("No name oracle available, names use the heuristic fallback")
            }
            (_, false) => tracing::info!("Name oracle disabled, names use the heuristic path"),
        }

        Ok(Self {
            patterns: PatternMatcher::new(&config.patterns)?,
            names: NameSpanResolver::new(config, oracle)?,
            signals: SignalExtractor::new(&config.signals)?,
            thresholds: config.thresholds.clone(),
            boost: config.signals.boost,
        })
    }

    pub fn names(&self) -> &NameSpanResolver {
        &self.names
    }

    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    /// Classify one record
    pub async fn classify(&self, record: &Record) -> Result<ClassificationResult> {
        let raw = record_text(record)?;
        let text = normalize(raw);
        let names = self.names.resolve(text.as_str()).await;
        Ok(self.fuse(&record.id, &text, names))
    }

    /// Union pattern detections with resolved names for one normalized text
    pub fn fuse(&self, record_id: &str, text: &NormalizedText, names: NameResolution) -> ClassificationResult {
        let normalized = text.as_str();
        let signals = self.signals.extract(normalized);

        let mut detections = self.patterns.detect(normalized);
        for d in detections.iter_mut().filter(|d| d.category.is_structured()) {
            if self.signals.supports(normalized, &signals, d.start, d.end) {
                d.confidence = round2((d.confidence + self.boost).min(1.0));
            }
        }

        let mut provisional = Vec::new();
        for span in names.spans {
            if !self.thresholds.accept_detection(span.confidence) {
                tracing::trace!(
                    value = %span.value,
                    confidence = span.confidence,
                    "Name below near-miss floor"
                );
                continue;
            }
            let detection = Detection {
                category: Category::Name,
                matched_value: span.value,
                confidence: span.confidence,
                method: span.method,
                start: span.start,
                end: span.end,
            };
            let deferred = self.thresholds.name_band_policy == NameBandPolicy::Deferred
                && self.thresholds.is_ambiguous(detection.confidence);
            if deferred {
                provisional.push(detection);
            } else {
                detections.push(detection);
            }
        }

        let detections = dedup_detections(detections);
        let mut provisional = dedup_detections(provisional);
        provisional.retain(|p| !detections.iter().any(|d| d.dedup_key() == p.dedup_key()));

        let detections = to_raw_offsets(text, detections);
        let mut provisional = to_raw_offsets(text, provisional);
        provisional.sort_by(Detection::canonical_cmp);

        let mut result = ClassificationResult::new(record_id, detections);
        result.signals = signals;
        result.provisional = provisional;
        result.oracle_fallback = names.used_fallback;

        tracing::debug!(
            record_id,
            detections = result.detections.len(),
            provisional = result.provisional.len(),
            fallback = result.oracle_fallback,
            "Record classified"
        );
        result
    }
}

/// Raw text of a well-formed record
pub(crate) fn record_text(record: &Record) -> Result<&str> {
    if record.id.trim().is_empty() {
        return Err(VigilError::input(&record.id, "empty record id"));
    }
    record
        .raw_text
        .as_deref()
        .ok_or_else(|| VigilError::input(&record.id, "missing text"))
}

/// Keep the highest-confidence instance of each (category, value)
fn dedup_detections(detections: Vec<Detection>) -> Vec<Detection> {
    let mut best: HashMap<(Category, String), Detection> = HashMap::new();
    for d in detections {
        let key = d.dedup_key();
        match best.get(&key) {
            Some(kept)
                if kept.confidence > d.confidence
                    || (kept.confidence == d.confidence && kept.start <= d.start) => {}
            _ => {
                best.insert(key, d);
            }
        }
    }
    let mut out: Vec<Detection> = best.into_values().collect();
    out.sort_by(Detection::canonical_cmp);
    out
}

/// Rewrite normalized offsets as raw-text offsets
fn to_raw_offsets(text: &NormalizedText, detections: Vec<Detection>) -> Vec<Detection> {
    detections
        .into_iter()
        .map(|mut d| {
            if let Some(range) = text.source_range(d.start, d.end) {
                d.start = range.start;
                d.end = range.end;
            }
            d
        })
        .collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
