//! Name-recognition oracle capability
//!
//! The oracle is an injected black box: given a chunk no longer than the
//! configured ceiling it returns person spans with a confidence. Failure is
//! an `OracleError`, never an empty list, so the resolver can fall back.

use crate::error::OracleError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Entity labels that denote a natural person
pub const PERSON_LABELS: &[&str] = &["PER", "PESSOA", "B-PER", "I-PER", "PERSON"];

/// One entity reported by the oracle.
///
/// Offsets are byte offsets into the chunk that was sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySpan {
    pub start: usize,
    pub end: usize,
    pub label: String,
    pub confidence: f64,
}

impl EntitySpan {
    pub fn person(start: usize, end: usize, confidence: f64) -> Self {
        Self {
            start,
            end,
            label: "PER".to_string(),
            confidence,
        }
    }

    pub fn is_person(&self) -> bool {
        PERSON_LABELS
            .iter()
            .any(|l| l.eq_ignore_ascii_case(&self.label))
    }
}

/// Person-name recognition capability
#[async_trait]
pub trait NameOracle: Send + Sync {
    /// Recognize entities in one bounded chunk
    async fn recognize(&self, chunk: &str) -> Result<Vec<EntitySpan>, OracleError>;

    /// Recognize several chunks in one call.
    ///
    /// The default asks one chunk at a time; oracles with native batching
    /// override it. The result has one entry per input chunk.
    async fn recognize_batch(&self, chunks: &[&str]) -> Result<Vec<Vec<EntitySpan>>, OracleError> {
        let mut out = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            out.push(self.recognize(chunk).await?);
        }
        Ok(out)
    }

    /// Human-readable name (used in logs)
    fn name(&self) -> &str;
}

/// Raw token-classification model.
///
/// Decoupled from any inference runtime so the adapter is testable with
/// canned responses.
#[async_trait]
pub trait EntityModel: Send + Sync {
    /// Run the model over `text` and return its JSON output
    async fn call(&self, text: &str) -> Result<String, String>;
}

/// Oracle backed by a token-classification model emitting
/// `[{"entity_group", "word", "score", "start", "end"}]`
pub struct ModelOracle {
    model: Box<dyn EntityModel>,
    name: String,
}

impl ModelOracle {
    pub fn new(model: Box<dyn EntityModel>) -> Self {
        Self {
            model,
            name: "model".to_string(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// One entity as emitted by the model; offsets are character offsets
#[derive(Debug, Deserialize)]
struct ModelEntity {
    #[serde(default, alias = "entity")]
    entity_group: String,
    #[serde(default)]
    word: String,
    #[serde(default = "default_model_score")]
    score: f64,
    start: Option<usize>,
    end: Option<usize>,
}

fn default_model_score() -> f64 {
    0.80
}

/// Byte offset of the `idx`-th character, or `None` past the end
fn char_to_byte(text: &str, idx: usize) -> Option<usize> {
    if idx == text.chars().count() {
        return Some(text.len());
    }
    text.char_indices().nth(idx).map(|(b, _)| b)
}

#[async_trait]
impl NameOracle for ModelOracle {
    async fn recognize(&self, chunk: &str) -> Result<Vec<EntitySpan>, OracleError> {
        let response = self.model.call(chunk).await.map_err(OracleError::Failed)?;

        let json_str = response
            .trim()
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim();

        let entities: Vec<ModelEntity> = serde_json::from_str(json_str)
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;

        let mut spans = Vec::new();
        let mut search_from = 0;
        for entity in entities {
            let range = match (entity.start, entity.end) {
                (Some(s), Some(e)) => char_to_byte(chunk, s).zip(char_to_byte(chunk, e)),
                // Offsets missing: locate the surface form after the previous hit
                _ => {
                    let word = entity.word.trim();
                    if word.is_empty() {
                        None
                    } else {
                        chunk[search_from..]
                            .find(word)
                            .map(|i| (search_from + i, search_from + i + word.len()))
                    }
                }
            };
            let Some((start, end)) = range else {
                tracing::debug!(word = %entity.word, "Dropping entity with unusable offsets");
                continue;
            };
            if start >= end || end > chunk.len() {
                continue;
            }
            search_from = end;
            spans.push(EntitySpan {
                start,
                end,
                label: entity.entity_group,
                confidence: entity.score.clamp(0.0, 1.0),
            });
        }
        Ok(spans)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
