//! Core data model: records, detections, classification results, review items
//!
//! All types use snake_case JSON serialization; output consumers decide the
//! final format.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// An input record as supplied by the input adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Caller-assigned identifier
    pub id: String,

    /// Raw free text; `None` marks a malformed record
    #[serde(default, alias = "text")]
    pub raw_text: Option<String>,
}

impl Record {
    pub fn new(id: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            raw_text: Some(raw_text.into()),
        }
    }

    /// A record without text (reported as an input error)
    pub fn missing_text(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            raw_text: None,
        }
    }
}

/// PII category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// National ID number (CPF)
    IdNumber,
    /// Secondary ID (RG)
    SecondaryId,
    Phone,
    Email,
    Name,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IdNumber => "id_number",
            Self::SecondaryId => "secondary_id",
            Self::Phone => "phone",
            Self::Email => "email",
            Self::Name => "name",
        }
    }

    /// Structured identifiers found by the pattern matcher
    pub fn is_structured(&self) -> bool {
        !matches!(self, Self::Name)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a detection was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Pattern,
    Oracle,
    Heuristic,
}

/// A single PII finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub category: Category,
    /// Matched value as it appears in the normalized text
    pub matched_value: String,
    /// Confidence score (0.0 to 1.0)
    pub confidence: f64,
    pub method: Method,
    /// Start byte offset in the raw record text
    pub start: usize,
    /// End byte offset in the raw record text
    pub end: usize,
}

impl Detection {
    /// Key used to collapse repeated mentions of the same value
    pub(crate) fn dedup_key(&self) -> (Category, String) {
        let value = match self.category {
            Category::Name | Category::Email => self.matched_value.to_lowercase(),
            _ => self
                .matched_value
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase(),
        };
        (self.category, value)
    }

    /// Canonical ordering so repeated runs produce identical vectors
    pub(crate) fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.category
            .cmp(&other.category)
            .then(self.start.cmp(&other.start))
            .then(self.matched_value.cmp(&other.matched_value))
    }
}

/// Kind of auxiliary contextual signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// "meu CPF", "minha identidade", "me chamo ..."
    FirstPerson,
    /// "moro na", "rua", "CEP 70000-000"
    Address,
    /// "WhatsApp: (61...", "telefone: 9..."
    Contact,
}

/// Auxiliary signal; never a detection on its own
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSignal {
    pub kind: SignalKind,
    /// Start byte offset in the normalized text
    pub start: usize,
    /// End byte offset in the normalized text
    pub end: usize,
}

/// Per-record classification outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub record_id: String,
    /// Always equal to `!detections.is_empty()`
    pub contains_pii: bool,
    pub detections: Vec<Detection>,
    /// Max detection confidence, 0 without detections
    pub overall_confidence: f64,
    /// Auxiliary signals (metadata only)
    #[serde(default)]
    pub signals: Vec<ContextSignal>,
    /// Ambiguous-band names held back under the deferred band policy
    #[serde(default)]
    pub provisional: Vec<Detection>,
    /// Heuristic name path used because the oracle could not answer
    #[serde(default)]
    pub oracle_fallback: bool,
}

impl ClassificationResult {
    pub fn new(record_id: impl Into<String>, mut detections: Vec<Detection>) -> Self {
        detections.sort_by(Detection::canonical_cmp);
        let overall_confidence = detections
            .iter()
            .map(|d| d.confidence)
            .fold(0.0_f64, f64::max);
        Self {
            record_id: record_id.into(),
            contains_pii: !detections.is_empty(),
            detections,
            overall_confidence: (overall_confidence * 100.0).round() / 100.0,
            signals: Vec::new(),
            provisional: Vec::new(),
            oracle_fallback: false,
        }
    }

    /// Distinct categories found, in canonical order
    pub fn categories(&self) -> Vec<Category> {
        let mut categories: Vec<Category> = self.detections.iter().map(|d| d.category).collect();
        categories.dedup();
        categories
    }

    pub fn has_category(&self, category: Category) -> bool {
        self.detections.iter().any(|d| d.category == category)
    }
}

/// Review priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewPriority {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for ReviewPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// Why a detection was queued for review
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    LowConfidence,
    ModerateConfidence,
    ArtisticContext,
    AcademicContext,
    JournalisticContext,
    PublicOfficeContext,
    HistoricalReference,
    LegalProfessionalContext,
    AuthorshipContext,
}

impl ReasonCode {
    /// Priority this reason demands on its own
    pub fn priority(&self) -> ReviewPriority {
        match self {
            Self::LowConfidence | Self::ArtisticContext => ReviewPriority::High,
            Self::AcademicContext
            | Self::JournalisticContext
            | Self::LegalProfessionalContext => ReviewPriority::Medium,
            Self::ModerateConfidence
            | Self::PublicOfficeContext
            | Self::HistoricalReference
            | Self::AuthorshipContext => ReviewPriority::Low,
        }
    }

    /// Reviewer-facing legal reading of the reason
    pub fn explanation(&self) -> &'static str {
        match self {
            Self::LowConfidence => {
                "Recognizer confidence below the low floor; higher chance of a false positive."
            }
            Self::ModerateConfidence => {
                "Moderate confidence; probably correct but worth a check."
            }
            Self::ArtisticContext => {
                "Text refers to art or cultural heritage; the name may belong to an artist \
                 rather than to the requester."
            }
            Self::AcademicContext => {
                "Academic context; the name may be manifestly public data (LGPD art. 7, §4)."
            }
            Self::JournalisticContext => {
                "Journalistic context; processing for journalistic purposes is exempt \
                 (LGPD art. 4, II, a)."
            }
            Self::PublicOfficeContext => {
                "Holder of public office; data about public agents is public by nature."
            }
            Self::HistoricalReference => {
                "Possible historical reference or homage (street, school, law named after a person)."
            }
            Self::LegalProfessionalContext => {
                "Legal professional registration (OAB, lawyer, judge); professional data \
                 rather than sensitive personal data."
            }
            Self::AuthorshipContext => {
                "Authorship or bibliographic citation; the name may belong to a cited author."
            }
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            Self::LowConfidence => "low_confidence",
            Self::ModerateConfidence => "moderate_confidence",
            Self::ArtisticContext => "artistic_context",
            Self::AcademicContext => "academic_context",
            Self::JournalisticContext => "journalistic_context",
            Self::PublicOfficeContext => "public_office_context",
            Self::HistoricalReference => "historical_reference",
            Self::LegalProfessionalContext => "legal_professional_context",
            Self::AuthorshipContext => "authorship_context",
        };
        f.write_str(code)
    }
}

/// A finding flagged for human adjudication (advisory only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewItem {
    pub record_id: String,
    pub priority: ReviewPriority,
    pub category: Category,
    pub matched_value: String,
    pub confidence: f64,
    pub reason_code: ReasonCode,
    /// Raw text around the finding
    pub text_excerpt: String,
    /// Every contextual basis found, with its legal reading
    pub rationale: String,
}

/// Sort a review queue: high priority first, then by record and value
pub fn sort_review_items(items: &mut [ReviewItem]) {
    items.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| a.record_id.cmp(&b.record_id))
            .then_with(|| a.matched_value.cmp(&b.matched_value))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(category: Category, value: &str, confidence: f64, start: usize) -> Detection {
        Detection {
            category,
            matched_value: value.to_string(),
            confidence,
            method: Method::Pattern,
            start,
            end: start + value.len(),
        }
    }

    #[test]
    fn test_result_invariants() {
        let empty = ClassificationResult::new("1", vec![]);
        assert!(!empty.contains_pii);
        assert_eq!(empty.overall_confidence, 0.0);

        let result = ClassificationResult::new(
            "2",
            vec![
                detection(Category::Phone, "(61) 99999-8888", 0.9, 30),
                detection(Category::IdNumber, "123.456.789-00", 0.95, 5),
            ],
        );
        assert!(result.contains_pii);
        assert_eq!(result.overall_confidence, 0.95);
        assert_eq!(result.detections[0].category, Category::IdNumber);
        assert_eq!(result.categories(), vec![Category::IdNumber, Category::Phone]);
    }

    #[test]
    fn test_dedup_key_ignores_formatting() {
        let a = detection(Category::Phone, "(61) 99999-8888", 0.9, 0);
        let b = detection(Category::Phone, "(61)99999 8888", 0.9, 40);
        assert_eq!(a.dedup_key(), b.dedup_key());

        let c = detection(Category::Name, "João Silva", 0.9, 0);
        let d = detection(Category::Name, "JOÃO SILVA", 0.8, 20);
        assert_eq!(c.dedup_key(), d.dedup_key());
    }

    #[test]
    fn test_reason_priorities() {
        assert_eq!(ReasonCode::ArtisticContext.priority(), ReviewPriority::High);
        assert_eq!(ReasonCode::LowConfidence.priority(), ReviewPriority::High);
        assert_eq!(ReasonCode::AcademicContext.priority(), ReviewPriority::Medium);
        assert_eq!(ReasonCode::ModerateConfidence.priority(), ReviewPriority::Low);
        assert!(ReviewPriority::High < ReviewPriority::Medium);
    }

    #[test]
    fn test_record_serde_accepts_text_alias() {
        let record: Record = serde_json::from_str(r#"{"id": "7", "text": "olá"}"#).unwrap();
        assert_eq!(record.raw_text.as_deref(), Some("olá"));

        let missing: Record = serde_json::from_str(r#"{"id": "8"}"#).unwrap();
        assert!(missing.raw_text.is_none());
    }

    #[test]
    fn test_category_serde() {
        let json = serde_json::to_string(&Category::SecondaryId).unwrap();
        assert_eq!(json, "\"secondary_id\"");
        assert_eq!(Category::IdNumber.to_string(), "id_number");
    }
}
