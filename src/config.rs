//! Detector configuration
//!
//! Every window size, threshold and vocabulary list the engine uses lives
//! here. Configuration is loaded once (HCL or JSON), validated, and then
//! shared read-only by every record in a batch.

use crate::error::{Result, VigilError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "vigil.hcl";

/// Main vigil configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VigilConfig {
    /// Structured identifier rules
    pub patterns: PatternConfig,

    /// Confidence floors for acceptance and review banding
    pub thresholds: ThresholdConfig,

    /// Institutional (non-person) names
    pub exclusions: ExclusionConfig,

    /// Name recognition (oracle and heuristic fallback)
    pub names: NameConfig,

    /// External name-recognition oracle
    pub oracle: OracleConfig,

    /// Auxiliary contextual signals
    pub signals: SignalConfig,

    /// Ambiguity triage vocabularies
    pub triage: TriageConfig,

    /// Records classified concurrently in a batch
    pub concurrency: usize,
}

impl Default for VigilConfig {
    fn default() -> Self {
        Self {
            patterns: PatternConfig::default(),
            thresholds: ThresholdConfig::default(),
            exclusions: ExclusionConfig::default(),
            names: NameConfig::default(),
            oracle: OracleConfig::default(),
            signals: SignalConfig::default(),
            triage: TriageConfig::default(),
            concurrency: 8,
        }
    }
}

impl VigilConfig {
    /// Parse configuration from an HCL string
    pub fn from_hcl(content: &str) -> Result<Self> {
        let config: VigilConfig = hcl::from_str(content)?;
        Ok(config)
    }

    /// Parse configuration from a JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        let config: VigilConfig = serde_json::from_str(content)?;
        Ok(config)
    }

    /// Load from a file; `.json` files are JSON, everything else HCL
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json || content.trim_start().starts_with('{') {
            Self::from_json(&content)
        } else {
            Self::from_hcl(&content)
        }
    }

    /// Resolve the configuration source and validate it.
    ///
    /// Order: explicit path, `./vigil.hcl`, built-in defaults. Any invalid
    /// threshold or pattern is fatal.
    pub fn load(explicit_path: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let (config, path) = if let Some(path) = explicit_path {
            tracing::info!("Loading config from {}", path.display());
            (Self::from_file(path)?, Some(path.to_path_buf()))
        } else if Path::new(DEFAULT_CONFIG_FILE).exists() {
            tracing::info!("Loading config from ./{}", DEFAULT_CONFIG_FILE);
            (
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?,
                Some(PathBuf::from(DEFAULT_CONFIG_FILE)),
            )
        } else {
            tracing::info!("No config found, using defaults");
            (Self::default(), None)
        };

        config.validate()?;
        Ok((config, path))
    }

    /// Check thresholds, windows and every configured pattern
    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate()?;

        if self.concurrency == 0 {
            return Err(VigilError::Config("concurrency must be at least 1".into()));
        }
        if self.oracle.max_chunk_chars == 0 {
            return Err(VigilError::Config(
                "oracle.max_chunk_chars must be positive".into(),
            ));
        }
        if self.oracle.chunk_overlap >= self.oracle.max_chunk_chars {
            return Err(VigilError::Config(format!(
                "oracle.chunk_overlap ({}) must be smaller than oracle.max_chunk_chars ({})",
                self.oracle.chunk_overlap, self.oracle.max_chunk_chars
            )));
        }
        if self.oracle.batch_size == 0 {
            return Err(VigilError::Config("oracle.batch_size must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.signals.boost) {
            return Err(VigilError::Config(format!(
                "signals.boost must be within [0, 1], got {}",
                self.signals.boost
            )));
        }
        if !(0.0..=1.0).contains(&self.names.heuristic_confidence) {
            return Err(VigilError::Config(format!(
                "names.heuristic_confidence must be within [0, 1], got {}",
                self.names.heuristic_confidence
            )));
        }
        if self.names.max_tokens < 2 {
            return Err(VigilError::Config("names.max_tokens must be at least 2".into()));
        }

        require_non_empty("patterns.id_labels", &self.patterns.id_labels)?;
        require_non_empty("patterns.secondary_labels", &self.patterns.secondary_labels)?;
        require_non_empty(
            "exclusions.institutional_names",
            &self.exclusions.institutional_names,
        )?;
        require_non_empty("names.leading_markers", &self.names.leading_markers)?;

        compile_patterns("patterns.administrative_labels", &self.patterns.administrative_labels)?;
        compile_patterns("names.leading_markers", &self.names.leading_markers)?;
        compile_patterns("names.trailing_markers", &self.names.trailing_markers)?;
        compile_patterns("signals.first_person", &self.signals.first_person)?;
        compile_patterns("signals.address", &self.signals.address)?;
        compile_patterns("signals.contact", &self.signals.contact)?;
        self.triage.validate()?;
        Ok(())
    }
}

fn require_non_empty(name: &str, values: &[String]) -> Result<()> {
    if values.iter().all(|v| v.trim().is_empty()) {
        return Err(VigilError::Config(format!("{} must not be empty", name)));
    }
    Ok(())
}

/// Compile a named list of regex sources
pub(crate) fn compile_patterns(name: &str, sources: &[String]) -> Result<Vec<Regex>> {
    sources
        .iter()
        .enumerate()
        .map(|(i, source)| compile_pattern(&format!("{}[{}]", name, i), source))
        .collect()
}

pub(crate) fn compile_pattern(name: &str, source: &str) -> Result<Regex> {
    Regex::new(source).map_err(|e| VigilError::Pattern {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

/// Structured identifier rule configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Labels that qualify a bare 11-digit number as an ID number
    pub id_labels: Vec<String>,

    /// Max characters between an ID label and the bare digits
    pub id_label_window: usize,

    /// Labels that qualify a secondary ID number (matched on word boundaries)
    pub secondary_labels: Vec<String>,

    /// Max characters between a secondary-ID label and the number
    pub secondary_label_window: usize,

    /// Regexes for administrative identifiers (process numbers, licences)
    /// whose presence near a match suppresses it
    pub administrative_labels: Vec<String>,

    /// Characters scanned before a match for administrative labels
    pub guard_before: usize,

    /// Characters scanned after a match for administrative labels
    pub guard_after: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            id_labels: vec!["CPF".to_string()],
            id_label_window: 20,
            secondary_labels: vec!["RG".to_string(), "Registro Geral".to_string()],
            secondary_label_window: 12,
            administrative_labels: crate::patterns::default_administrative_labels(),
            guard_before: 50,
            guard_after: 30,
        }
    }
}

/// How ambiguous-band names count towards `contains_pii`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameBandPolicy {
    /// Count as PII now, adjudicate later
    #[default]
    Provisional,
    /// Hold back until adjudicated
    Deferred,
}

/// Review band of a confidence value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewBand {
    /// Below the low floor
    Low,
    /// Between the low and confident floors
    Moderate,
}

/// Confidence floors
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Name spans below this are discarded as recognizer noise
    pub near_miss_floor: f64,

    /// Below this a finding is high-priority for review
    pub low_floor: f64,

    /// At or above this a finding needs no confidence-based review
    pub confident_floor: f64,

    /// Treatment of names between the near-miss and confident floors
    pub name_band_policy: NameBandPolicy,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            near_miss_floor: 0.50,
            low_floor: 0.80,
            confident_floor: 0.95,
            name_band_policy: NameBandPolicy::Provisional,
        }
    }
}

impl ThresholdConfig {
    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("near_miss_floor", self.near_miss_floor),
            ("low_floor", self.low_floor),
            ("confident_floor", self.confident_floor),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(VigilError::Config(format!(
                    "thresholds.{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.near_miss_floor > self.low_floor || self.low_floor > self.confident_floor {
            return Err(VigilError::Config(format!(
                "thresholds must satisfy near_miss_floor <= low_floor <= confident_floor \
                 (got {} / {} / {})",
                self.near_miss_floor, self.low_floor, self.confident_floor
            )));
        }
        Ok(())
    }

    /// Acceptance policy: is this confidence enough to emit a detection?
    pub fn accept_detection(&self, confidence: f64) -> bool {
        confidence >= self.near_miss_floor
    }

    /// Review policy: which confidence band asks for human review, if any
    pub fn review_band(&self, confidence: f64) -> Option<ReviewBand> {
        if confidence < self.low_floor {
            Some(ReviewBand::Low)
        } else if confidence < self.confident_floor {
            Some(ReviewBand::Moderate)
        } else {
            None
        }
    }

    /// Accepted, but below the confident floor
    pub fn is_ambiguous(&self, confidence: f64) -> bool {
        self.accept_detection(confidence) && confidence < self.confident_floor
    }
}

/// Institutional exclusion list
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExclusionConfig {
    /// Government bodies, places, titles, laws, institutions
    pub institutional_names: Vec<String>,

    /// Trailing tokens marking a legal entity ("Ltda", "S.A.", "Advogados")
    pub legal_entity_suffixes: Vec<String>,
}

impl Default for ExclusionConfig {
    fn default() -> Self {
        Self {
            institutional_names: crate::exclusions::default_institutional_names(),
            legal_entity_suffixes: crate::exclusions::default_legal_entity_suffixes(),
        }
    }
}

/// Name candidate rules
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NameConfig {
    /// Markers that must precede a heuristic name ("meu nome é", "requerente")
    pub leading_markers: Vec<String>,

    /// Markers that may follow a heuristic name (", CPF", "portador")
    pub trailing_markers: Vec<String>,

    /// Honorifics stripped from the start of a candidate
    pub titles: Vec<String>,

    /// Upper bound on tokens in a name
    pub max_tokens: usize,

    /// Confidence assigned to heuristic names
    pub heuristic_confidence: f64,
}

impl Default for NameConfig {
    fn default() -> Self {
        Self {
            leading_markers: crate::names::heuristic::default_leading_markers(),
            trailing_markers: crate::names::heuristic::default_trailing_markers(),
            titles: ["Dr", "Dra", "Sr", "Sra", "Prof", "Profa"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_tokens: 6,
            heuristic_confidence: 0.80,
        }
    }
}

/// Name-recognition oracle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Use the oracle when one is supplied
    pub enabled: bool,

    /// Max characters per oracle call
    pub max_chunk_chars: usize,

    /// Characters shared by consecutive chunks
    pub chunk_overlap: usize,

    /// Time budget per chunk
    pub chunk_timeout_ms: u64,

    /// Chunks sent per batched oracle call
    pub batch_size: usize,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_chunk_chars: 1500,
            chunk_overlap: 100,
            chunk_timeout_ms: 5_000,
            batch_size: 8,
        }
    }
}

/// Auxiliary signal vocabularies
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub first_person: Vec<String>,
    pub address: Vec<String>,
    pub contact: Vec<String>,

    /// Max characters between a signal and the structured match it supports
    pub window: usize,

    /// Confidence added to a supported structured match
    pub boost: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            first_person: crate::signals::default_first_person_markers(),
            address: crate::signals::default_address_markers(),
            contact: crate::signals::default_contact_markers(),
            window: 40,
            boost: 0.03,
        }
    }
}

/// Special-context vocabularies for triage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    pub artistic: Vec<String>,
    pub academic: Vec<String>,
    pub journalistic: Vec<String>,
    pub public_office: Vec<String>,
    pub historical: Vec<String>,
    pub legal_professional: Vec<String>,
    pub authorship: Vec<String>,

    /// Artist names (lowercase) that mark an artistic context by themselves
    pub known_artists: Vec<String>,

    /// Characters of raw text shown either side of a finding
    pub excerpt_window: usize,
}

impl Default for TriageConfig {
    fn default() -> Self {
        use crate::triage::vocabulary;
        Self {
            artistic: vocabulary::artistic(),
            academic: vocabulary::academic(),
            journalistic: vocabulary::journalistic(),
            public_office: vocabulary::public_office(),
            historical: vocabulary::historical(),
            legal_professional: vocabulary::legal_professional(),
            authorship: vocabulary::authorship(),
            known_artists: vocabulary::known_artists(),
            excerpt_window: 100,
        }
    }
}

impl TriageConfig {
    fn validate(&self) -> Result<()> {
        compile_patterns("triage.artistic", &self.artistic)?;
        compile_patterns("triage.academic", &self.academic)?;
        compile_patterns("triage.journalistic", &self.journalistic)?;
        compile_patterns("triage.public_office", &self.public_office)?;
        compile_patterns("triage.historical", &self.historical)?;
        compile_patterns("triage.legal_professional", &self.legal_professional)?;
        compile_patterns("triage.authorship", &self.authorship)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        VigilConfig::default().validate().unwrap();
    }

    #[test]
    fn test_accept_and_review_are_independent() {
        let t = ThresholdConfig::default();

        assert!(!t.accept_detection(0.49));
        assert!(t.accept_detection(0.50));
        assert!(t.accept_detection(0.99));

        assert_eq!(t.review_band(0.49), Some(ReviewBand::Low));
        assert_eq!(t.review_band(0.79), Some(ReviewBand::Low));
        assert_eq!(t.review_band(0.80), Some(ReviewBand::Moderate));
        assert_eq!(t.review_band(0.94), Some(ReviewBand::Moderate));
        assert_eq!(t.review_band(0.95), None);

        assert!(t.is_ambiguous(0.6));
        assert!(!t.is_ambiguous(0.3));
        assert!(!t.is_ambiguous(0.97));
    }

    #[test]
    fn test_rejects_unordered_thresholds() {
        let mut config = VigilConfig::default();
        config.thresholds.low_floor = 0.99;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, VigilError::Config(_)));
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let mut config = VigilConfig::default();
        config.thresholds.confident_floor = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_invalid_vocabulary_pattern() {
        let mut config = VigilConfig::default();
        config.triage.artistic.push("(unclosed".to_string());
        let err = config.validate().unwrap_err();
        match err {
            VigilError::Pattern { name, .. } => assert!(name.starts_with("triage.artistic")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rejects_empty_exclusion_list() {
        let mut config = VigilConfig::default();
        config.exclusions.institutional_names.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_overlap_larger_than_chunk() {
        let mut config = VigilConfig::default();
        config.oracle.max_chunk_chars = 100;
        config.oracle.chunk_overlap = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_hcl_overrides_selected_fields() {
        let hcl = r#"
            concurrency = 2

            thresholds {
              low_floor = 0.7
              name_band_policy = "deferred"
            }

            oracle {
              enabled = false
              max_chunk_chars = 400
            }
        "#;
        let config = VigilConfig::from_hcl(hcl).unwrap();
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.thresholds.low_floor, 0.7);
        assert_eq!(config.thresholds.confident_floor, 0.95);
        assert_eq!(config.thresholds.name_band_policy, NameBandPolicy::Deferred);
        assert!(!config.oracle.enabled);
        assert_eq!(config.oracle.max_chunk_chars, 400);
        assert!(!config.exclusions.institutional_names.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn test_from_json() {
        let json = r#"{"patterns": {"id_label_window": 5}, "triage": {"excerpt_window": 10}}"#;
        let config = VigilConfig::from_json(json).unwrap();
        assert_eq!(config.patterns.id_label_window, 5);
        assert_eq!(config.triage.excerpt_window, 10);
        assert_eq!(config.patterns.guard_before, 50);
    }

    #[test]
    fn test_from_file_detects_format() {
        let dir = tempfile::tempdir().unwrap();

        let json_path = dir.path().join("vigil.json");
        std::fs::write(&json_path, r#"{"concurrency": 3}"#).unwrap();
        assert_eq!(VigilConfig::from_file(&json_path).unwrap().concurrency, 3);

        let hcl_path = dir.path().join("vigil.hcl");
        std::fs::write(&hcl_path, "concurrency = 4\n").unwrap();
        assert_eq!(VigilConfig::from_file(&hcl_path).unwrap().concurrency, 4);
    }

    #[test]
    fn test_load_explicit_invalid_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.hcl");
        std::fs::write(&path, "concurrency = 0\n").unwrap();
        assert!(VigilConfig::load(Some(&path)).is_err());
    }
}
