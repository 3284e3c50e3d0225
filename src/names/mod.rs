//! Name span resolver
//!
//! Person names come from an injected [`NameOracle`] when one is available
//! and from the marker-gated [`HeuristicNameFinder`] otherwise. Long texts
//! are sent in overlapping chunks (see [`chunk`]); spans from every chunk
//! are shifted back to text offsets, merged, and filtered. Every candidate,
//! whichever path produced it, must have between two and `max_tokens` words
//! after title stripping and must not be institutional.

pub mod chunk;
pub mod heuristic;
pub mod oracle;

pub use chunk::{plan_chunks, Chunk};
pub use heuristic::HeuristicNameFinder;
pub use oracle::{EntityModel, EntitySpan, ModelOracle, NameOracle, PERSON_LABELS};

use crate::config::{OracleConfig, VigilConfig};
use crate::error::{OracleError, Result};
use crate::exclusions::InstitutionalFilter;
use crate::types::Method;
use std::sync::Arc;
use std::time::Duration;

/// An accepted name in normalized-text offsets
#[derive(Debug, Clone, PartialEq)]
pub struct NameSpan {
    pub start: usize,
    pub end: usize,
    pub value: String,
    pub confidence: f64,
    pub method: Method,
}

/// Outcome of name resolution for one text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NameResolution {
    pub spans: Vec<NameSpan>,
    /// Heuristic path used because the oracle could not answer
    pub used_fallback: bool,
}

/// Oracle + heuristic name resolution
pub struct NameSpanResolver {
    oracle: Option<Arc<dyn NameOracle>>,
    heuristic: HeuristicNameFinder,
    exclusions: InstitutionalFilter,
    titles: Vec<String>,
    max_tokens: usize,
    oracle_config: OracleConfig,
}

impl NameSpanResolver {
    pub fn new(config: &VigilConfig, oracle: Option<Arc<dyn NameOracle>>) -> Result<Self> {
        Ok(Self {
            oracle,
            heuristic: HeuristicNameFinder::new(&config.names)?,
            exclusions: InstitutionalFilter::new(&config.exclusions),
            titles: config.names.titles.clone(),
            max_tokens: config.names.max_tokens,
            oracle_config: config.oracle.clone(),
        })
    }

    /// Whether the oracle path is requested by configuration
    pub fn oracle_requested(&self) -> bool {
        self.oracle_config.enabled
    }

    /// The oracle, when requested and supplied
    pub fn oracle(&self) -> Option<&Arc<dyn NameOracle>> {
        if self.oracle_config.enabled {
            self.oracle.as_ref()
        } else {
            None
        }
    }

    /// Chunks that `text` is sent to the oracle in
    pub fn plan(&self, text: &str) -> Vec<Chunk> {
        plan_chunks(
            text,
            self.oracle_config.max_chunk_chars,
            self.oracle_config.chunk_overlap,
        )
    }

    /// One oracle call over `chunks`, bounded by the per-chunk time budget
    pub async fn recognize_chunks(&self, chunks: &[&str]) -> std::result::Result<Vec<Vec<EntitySpan>>, OracleError> {
        let Some(oracle) = self.oracle() else {
            return Err(OracleError::Unavailable("no name oracle configured".to_string()));
        };
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let budget_ms = self
            .oracle_config
            .chunk_timeout_ms
            .saturating_mul(chunks.len() as u64);
        let answer = tokio::time::timeout(
            Duration::from_millis(budget_ms),
            oracle.recognize_batch(chunks),
        )
        .await
        .map_err(|_| OracleError::Timeout(budget_ms))??;

        if answer.len() != chunks.len() {
            return Err(OracleError::InvalidResponse(format!(
                "{} answers for {} chunks",
                answer.len(),
                chunks.len()
            )));
        }
        Ok(answer)
    }

    /// Ask the oracle about the whole of `text`, chunk by chunk
    pub async fn query_oracle(&self, text: &str) -> std::result::Result<Vec<EntitySpan>, OracleError> {
        let chunks = self.plan(text);
        let batch_size = self.oracle_config.batch_size.max(1);
        let mut spans = Vec::new();

        for group in chunks.chunks(batch_size) {
            let texts: Vec<&str> = group.iter().map(|c| c.text(text)).collect();
            let answers = self.recognize_chunks(&texts).await?;
            spans.extend(shift_spans(group, answers));
        }
        Ok(spans)
    }

    /// Resolve names in `text`, falling back to the heuristic on oracle failure
    pub async fn resolve(&self, text: &str) -> NameResolution {
        if !self.oracle_requested() {
            return self.resolve_heuristic(text, false);
        }
        let answer = self.query_oracle(text).await;
        self.resolve_with(text, answer)
    }

    /// Finish resolution given the oracle's answer for the whole text
    pub fn resolve_with(
        &self,
        text: &str,
        answer: std::result::Result<Vec<EntitySpan>, OracleError>,
    ) -> NameResolution {
        match answer {
            Ok(spans) => NameResolution {
                spans: self.assemble(text, spans, Method::Oracle),
                used_fallback: false,
            },
            Err(OracleError::Unavailable(reason)) => {
                tracing::debug!(%reason, "Name oracle unavailable, using heuristic fallback");
                self.resolve_heuristic(text, true)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Name oracle failed, using heuristic fallback");
                self.resolve_heuristic(text, true)
            }
        }
    }

    pub(crate) fn resolve_heuristic(&self, text: &str, used_fallback: bool) -> NameResolution {
        let spans = self.heuristic.find(text);
        NameResolution {
            spans: self.assemble(text, spans, Method::Heuristic),
            used_fallback,
        }
    }

    /// Merge, de-duplicate and filter raw spans (text offsets)
    pub fn assemble(&self, text: &str, mut spans: Vec<EntitySpan>, method: Method) -> Vec<NameSpan> {
        spans.retain(|s| {
            s.is_person()
                && s.start < s.end
                && s.end <= text.len()
                && text.is_char_boundary(s.start)
                && text.is_char_boundary(s.end)
        });

        // Overlapping spans (chunk seams, nested answers) become one span
        // with the best score
        spans.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then(b.end.cmp(&a.end))
                .then(b.confidence.total_cmp(&a.confidence))
        });
        let mut merged: Vec<EntitySpan> = Vec::new();
        for span in spans {
            match merged.last_mut() {
                Some(last) if span.start < last.end => {
                    last.end = last.end.max(span.end);
                    last.confidence = last.confidence.max(span.confidence);
                }
                _ => merged.push(span),
            }
        }

        merged
            .into_iter()
            .filter_map(|span| self.accept(text, &span, method))
            .collect()
    }

    /// Strip titles and edge punctuation, then apply the name rules
    fn accept(&self, text: &str, span: &EntitySpan, method: Method) -> Option<NameSpan> {
        let mut start = span.start;
        let mut end = span.end;

        loop {
            let value = &text[start..end];
            let trimmed = value.trim_start_matches(|c: char| !c.is_alphanumeric());
            start += value.len() - trimmed.len();
            match self.strip_title(trimmed) {
                Some(rest) => start += trimmed.len() - rest.len(),
                None => break,
            }
        }
        let value = &text[start..end];
        end -= value.len() - value.trim_end_matches(|c: char| !c.is_alphanumeric()).len();
        if start >= end {
            return None;
        }

        let value = &text[start..end];
        let words = name_token_count(value);
        if words < 2 || words > self.max_tokens {
            return None;
        }
        if self.exclusions.is_institutional(value) {
            tracing::trace!(candidate = value, "Institutional name rejected");
            return None;
        }

        Some(NameSpan {
            start,
            end,
            value: value.to_string(),
            confidence: span.confidence,
            method,
        })
    }

    /// Remainder after a leading title ("Dr.", "Sra"), if there is one
    fn strip_title<'a>(&self, value: &'a str) -> Option<&'a str> {
        self.titles.iter().find_map(|title| {
            let rest = value.strip_prefix(title.as_str())?;
            if rest.starts_with('.') || rest.starts_with(char::is_whitespace) {
                Some(rest.trim_start_matches(|c: char| c == '.' || c.is_whitespace()))
            } else {
                None
            }
        })
    }
}

/// Lowercase particles joining the parts of a name ("da", "dos", "e")
pub(crate) const NAME_CONNECTORS: &[&str] = &["de", "da", "do", "das", "dos", "e"];

/// Words of a name, not counting connectors
fn name_token_count(value: &str) -> usize {
    value
        .split_whitespace()
        .filter(|w| !NAME_CONNECTORS.contains(w))
        .count()
}

/// Shift chunk-relative spans to text offsets
pub(crate) fn shift_spans(chunks: &[Chunk], answers: Vec<Vec<EntitySpan>>) -> Vec<EntitySpan> {
    chunks
        .iter()
        .zip(answers)
        .flat_map(|(chunk, spans)| {
            let len = chunk.range.len();
            let offset = chunk.offset();
            spans.into_iter().filter(move |s| s.end <= len).map(move |s| EntitySpan {
                start: s.start + offset,
                end: s.end + offset,
                ..s
            })
        })
        .collect()
}
