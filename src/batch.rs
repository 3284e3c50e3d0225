//! Batch driver
//!
//! Records are independent. The driver normalizes all of them, sends their
//! oracle chunks in groups of `oracle.batch_size` (retrying a failed group
//! chunk by chunk), then fuses and triages every record on the blocking
//! pool, `concurrency` at a time. A record that cannot be processed becomes
//! a [`RecordOutcome::Failed`]; the rest of the batch carries on.

use crate::config::VigilConfig;
use crate::error::{OracleError, Result};
use crate::fusion::{record_text, PiiClassifier};
use crate::names::{shift_spans, Chunk, EntitySpan, NameOracle};
use crate::normalize::{normalize, NormalizedText};
use crate::triage::TriageEngine;
use crate::types::{sort_review_items, ClassificationResult, Record, ReviewItem};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What happened to one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordOutcome {
    Classified {
        result: ClassificationResult,
        review_items: Vec<ReviewItem>,
    },
    Failed {
        record_id: String,
        reason: String,
    },
}

impl RecordOutcome {
    pub fn record_id(&self) -> &str {
        match self {
            Self::Classified { result, .. } => &result.record_id,
            Self::Failed { record_id, .. } => record_id,
        }
    }

    pub fn result(&self) -> Option<&ClassificationResult> {
        match self {
            Self::Classified { result, .. } => Some(result),
            Self::Failed { .. } => None,
        }
    }
}

/// Batch-level counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Records whose names came from the heuristic because the oracle failed
    pub oracle_fallbacks: usize,
    pub with_pii: usize,
    pub review_items: usize,
}

/// Outcomes in input order plus the summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub outcomes: Vec<RecordOutcome>,
    pub summary: BatchSummary,
}

impl BatchReport {
    fn new(outcomes: Vec<RecordOutcome>) -> Self {
        let mut summary = BatchSummary {
            total: outcomes.len(),
            ..BatchSummary::default()
        };
        for outcome in &outcomes {
            match outcome {
                RecordOutcome::Classified {
                    result,
                    review_items,
                } => {
                    summary.succeeded += 1;
                    summary.oracle_fallbacks += usize::from(result.oracle_fallback);
                    summary.with_pii += usize::from(result.contains_pii);
                    summary.review_items += review_items.len();
                }
                RecordOutcome::Failed { .. } => summary.failed += 1,
            }
        }
        Self { outcomes, summary }
    }

    /// Classification results of the successful records
    pub fn results(&self) -> impl Iterator<Item = &ClassificationResult> {
        self.outcomes.iter().filter_map(RecordOutcome::result)
    }

    /// Every review item in the batch, most urgent first
    pub fn review_queue(&self) -> Vec<ReviewItem> {
        let mut items: Vec<ReviewItem> = self
            .outcomes
            .iter()
            .flat_map(|o| match o {
                RecordOutcome::Classified { review_items, .. } => review_items.clone(),
                RecordOutcome::Failed { .. } => Vec::new(),
            })
            .collect();
        sort_review_items(&mut items);
        items
    }
}

/// A record ready for fusion
struct Prepared {
    record: Record,
    text: NormalizedText,
    chunks: Vec<Chunk>,
}

/// Oracle answer slots for one record
type ChunkAnswers = Vec<Option<std::result::Result<Vec<EntitySpan>, OracleError>>>;

/// Runs classification and triage over a batch of records
pub struct BatchProcessor {
    classifier: Arc<PiiClassifier>,
    triage: Arc<TriageEngine>,
    concurrency: usize,
    batch_size: usize,
}

impl BatchProcessor {
    pub fn new(config: &VigilConfig, oracle: Option<Arc<dyn NameOracle>>) -> Result<Self> {
        let classifier = Arc::new(PiiClassifier::new(config, oracle)?);
        let triage = Arc::new(TriageEngine::new(config)?);
        Ok(Self::with_components(
            classifier,
            triage,
            config.concurrency,
            config.oracle.batch_size,
        ))
    }

    pub fn with_components(
        classifier: Arc<PiiClassifier>,
        triage: Arc<TriageEngine>,
        concurrency: usize,
        batch_size: usize,
    ) -> Self {
        Self {
            classifier,
            triage,
            concurrency: concurrency.max(1),
            batch_size: batch_size.max(1),
        }
    }

    pub fn classifier(&self) -> &Arc<PiiClassifier> {
        &self.classifier
    }

    /// Classify and triage every record
    pub async fn run(&self, records: Vec<Record>) -> BatchReport {
        let mut slots: Vec<Option<RecordOutcome>> = Vec::with_capacity(records.len());
        let mut prepared: Vec<(usize, Prepared)> = Vec::new();

        for (idx, record) in records.into_iter().enumerate() {
            let text = match record_text(&record) {
                Ok(raw) => normalize(raw),
                Err(e) => {
                    tracing::warn!(record_id = %record.id, error = %e, "Skipping malformed record");
                    slots.push(Some(RecordOutcome::Failed {
                        record_id: record.id.clone(),
                        reason: e.to_string(),
                    }));
                    continue;
                }
            };
            let chunks = if self.classifier.names().oracle_requested() {
                self.classifier.names().plan(text.as_str())
            } else {
                Vec::new()
            };
            prepared.push((idx, Prepared { record, text, chunks }));
            slots.push(None);
        }

        let answers = self.query_oracle(&prepared).await;

        let concurrency = self.concurrency;
        let classified: Vec<(usize, RecordOutcome)> = stream::iter(prepared.into_iter().zip(answers))
            .map(|((idx, p), answer)| {
                let classifier = Arc::clone(&self.classifier);
                let triage = Arc::clone(&self.triage);
                let record_id = p.record.id.clone();
                async move {
                    let handle = tokio::task::spawn_blocking(move || {
                        let names = match answer {
                            Some(answer) => classifier.names().resolve_with(p.text.as_str(), answer),
                            None => classifier.names().resolve_heuristic(p.text.as_str(), false),
                        };
                        let result = classifier.fuse(&p.record.id, &p.text, names);
                        let review_items = triage.review(&p.record, &result);
                        RecordOutcome::Classified {
                            result,
                            review_items,
                        }
                    });
                    let outcome = handle.await.unwrap_or_else(|e| {
                        tracing::error!(record_id = %record_id, error = %e, "Record worker failed");
                        RecordOutcome::Failed {
                            record_id,
                            reason: format!("worker failed: {}", e),
                        }
                    });
                    (idx, outcome)
                }
            })
            .buffered(concurrency)
            .collect()
            .await;

        for (idx, outcome) in classified {
            slots[idx] = Some(outcome);
        }

        let report = BatchReport::new(slots.into_iter().flatten().collect());
        tracing::info!(
            total = report.summary.total,
            succeeded = report.summary.succeeded,
            failed = report.summary.failed,
            oracle_fallbacks = report.summary.oracle_fallbacks,
            with_pii = report.summary.with_pii,
            review_items = report.summary.review_items,
            "Batch complete"
        );
        report
    }

    /// Oracle answer per prepared record; `None` when the oracle is not requested
    async fn query_oracle(
        &self,
        prepared: &[(usize, Prepared)],
    ) -> Vec<Option<std::result::Result<Vec<EntitySpan>, OracleError>>> {
        let names = self.classifier.names();
        if !names.oracle_requested() {
            return prepared.iter().map(|_| None).collect();
        }
        if names.oracle().is_none() {
            let unavailable = OracleError::Unavailable("no name oracle configured".to_string());
            return prepared.iter().map(|_| Some(Err(unavailable.clone()))).collect();
        }

        // (record, chunk) pairs across the whole batch
        let work: Vec<(usize, usize)> = prepared
            .iter()
            .enumerate()
            .flat_map(|(r, (_, p))| (0..p.chunks.len()).map(move |c| (r, c)))
            .collect();

        let groups: Vec<Vec<(usize, usize)>> = work.chunks(self.batch_size).map(|g| g.to_vec()).collect();
        let group_answers: Vec<Vec<((usize, usize), std::result::Result<Vec<EntitySpan>, OracleError>)>> =
            stream::iter(groups)
                .map(|group| async move {
                    let texts: Vec<&str> = group
                        .iter()
                        .map(|&(r, c)| prepared[r].1.chunks[c].text(prepared[r].1.text.as_str()))
                        .collect();
                    match names.recognize_chunks(&texts).await {
                        Ok(answers) => group.into_iter().zip(answers.into_iter().map(Ok)).collect(),
                        Err(e) => {
                            tracing::debug!(error = %e, chunks = texts.len(), "Oracle group failed, retrying per chunk");
                            let mut out = Vec::with_capacity(group.len());
                            for (key, text) in group.into_iter().zip(texts) {
                                let single = names
                                    .recognize_chunks(&[text])
                                    .await
                                    .map(|mut a| a.pop().unwrap_or_default());
                                out.push((key, single));
                            }
                            out
                        }
                    }
                })
                .buffered(self.concurrency)
                .collect()
                .await;

        let mut per_record: Vec<ChunkAnswers> = prepared
            .iter()
            .map(|(_, p)| vec![None; p.chunks.len()])
            .collect();
        for ((r, c), answer) in group_answers.into_iter().flatten() {
            per_record[r][c] = Some(answer);
        }

        prepared
            .iter()
            .zip(per_record)
            .map(|((_, p), answers)| {
                let mut spans_per_chunk = Vec::with_capacity(answers.len());
                for answer in answers {
                    match answer {
                        Some(Ok(spans)) => spans_per_chunk.push(spans),
                        Some(Err(e)) => return Some(Err(e)),
                        None => return Some(Err(OracleError::Failed("chunk not answered".to_string()))),
                    }
                }
                Some(Ok(shift_spans(&p.chunks, spans_per_chunk)))
            })
            .collect()
    }
}
