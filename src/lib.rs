//! # vigil
//!
//! Recall-first PII detection and human-review triage for free-text
//! administrative records (Brazilian public-access requests).
//!
//! ## Overview
//!
//! Each record is normalized, scanned by deterministic patterns (CPF, RG,
//! phone, email) and by a name resolver backed by a pluggable recognition
//! oracle with a heuristic fallback. Findings are fused into a
//! [`ClassificationResult`]; the [`TriageEngine`] then flags the ones a
//! human should look at.
//!
//! ## Quick Start
//!
//! ```rust
//! use vigil::{PiiClassifier, Record, VigilConfig};
//!
//! # async fn example() -> vigil::Result<()> {
//! let mut config = VigilConfig::default();
//! config.oracle.enabled = false;
//!
//! let classifier = PiiClassifier::new(&config, None)?;
//! let result = classifier
//!     .classify(&Record::new("42", "Meu nome é Ana Souza, CPF 123.456.789-00"))
//!     .await?;
//!
//! assert!(result.contains_pii);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **NameOracle** trait: injected recognizer; `ModelOracle` adapts any
//!   token-classification model
//! - **PiiClassifier**: per-record fusion of patterns, names and signals
//! - **TriageEngine**: review items for ambiguous or sensitive detections
//! - **BatchProcessor**: bounded-concurrency batches with per-record isolation

pub mod batch;
pub mod config;
pub mod error;
pub mod evaluate;
pub mod exclusions;
pub mod fusion;
pub mod names;
pub mod normalize;
pub mod patterns;
pub mod signals;
pub mod triage;
pub mod types;

// Re-export core types
pub use batch::{BatchProcessor, BatchReport, BatchSummary, RecordOutcome};
pub use config::{NameBandPolicy, ReviewBand, ThresholdConfig, VigilConfig};
pub use error::{OracleError, Result, VigilError};
pub use evaluate::{ConfusionMatrix, Metrics};
pub use fusion::PiiClassifier;
pub use names::{EntityModel, EntitySpan, ModelOracle, NameOracle};
pub use triage::TriageEngine;
pub use types::{
    Category, ClassificationResult, ContextSignal, Detection, Method, ReasonCode, Record,
    ReviewItem, ReviewPriority, SignalKind,
};
