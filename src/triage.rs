//! Ambiguity triage
//!
//! Flags findings a person should look at, without changing them. Every
//! detection is banded by confidence; names are additionally checked
//! against special legal contexts (art and heritage, research, press,
//! public office, memorials, legal practice, citations). Each reviewable
//! detection yields one [`ReviewItem`] carrying the most urgent priority
//! among its reasons and a rationale naming every basis found.

use crate::config::{compile_patterns, ReviewBand, ThresholdConfig, VigilConfig};
use crate::error::Result;
use crate::normalize::{ceil_boundary, char_window, floor_boundary, normalize};
use crate::types::{Category, ClassificationResult, Detection, ReasonCode, Record, ReviewItem};
use regex::Regex;

/// Default context vocabularies (Portuguese administrative text)
pub mod vocabulary {
    fn owned(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    pub fn artistic() -> Vec<String> {
        owned(&[
            r"(?i)\b(?:vitral|vitrais|mosaicos?|esculturas?|afrescos?)\b",
            r"(?i)\b(?:painel|painéis)\s+(?:artísticos?|de\s+arte|decorativos?|de\s+azulejos?)",
            r"(?i:\bpainéis\s+(?:de\s+)?)\p{Lu}\p{Ll}+",
            r"(?i)\bobras?\s+de\s+arte\b",
            r"(?i)\b(?:artistas?|pintor(?:a|es)?|escultor(?:a|es)?)\b",
            r"(?i)\bpatrimônio\s+(?:cultural|histórico|artístico|tombado)\b",
            r"(?i)\b(?:tombado|tombamento)\b",
            r"(?i)\bmuseu\s+(?:de\s+)?(?:arte|belas\s+artes)\b",
            r"(?i)\bgaleria\s+(?:de\s+)?arte\b",
            r"(?i)\b(?:lustres?|luminárias?)\s+(?:antig|históric)",
        ])
    }

    pub fn academic() -> Vec<String> {
        owned(&[
            r"(?i)\b(?:pesquisador|pesquisadora|orientador|orientadora)\b",
            r"(?i:\b(?:prof\.|profa\.|professor|professora))\s+\p{Lu}",
            r"\bDr\.?\s+\p{Lu}",
            r"\bDoutora?\.?\s+\p{Lu}",
            r"(?i)\b(?:mestrado|doutorado|tese|dissertação|pós-graduação)\b",
            r"(?i)\buniversidade\s+(?:de|do|da|federal|estadual|católica)\b",
            r"(?i)\bfaculdade\s+(?:de|do|da)\b",
            r"(?i)\binstituto\s+(?:brasileiro\s+de\s+)?(?:ensino|pesquisa|educação)\b",
            r"(?i)\b(?:artigo|publicação|pesquisa)\s+(?:científica|acadêmica)\b",
            r"(?i)\bprojeto\s+(?:de\s+)?(?:pesquisa|tcc|final)\b",
        ])
    }

    pub fn journalistic() -> Vec<String> {
        owned(&[
            r"(?i)\b(?:segundo|conforme|de\s+acordo\s+com)\s+(?:a\s+)?(?:reportagem|matéria|notícia)\b",
            r"(?i)\bpublicad[oa]\s+(?:no|na|em)\s+(?:jornal|revista|site)\b",
            r"(?i:\bfonte)[:\s]+\p{Lu}",
            r"(?i:\b(?:jornalista|repórter|colunista))\s+\p{Lu}",
        ])
    }

    pub fn public_office() -> Vec<String> {
        owned(&[
            r"(?i:\b(?:governador|governadora))\s+\p{Lu}",
            r"(?i:\b(?:secretário|secretária)\s+(?:de\s+estado\s+)?)\p{Lu}",
            r"(?i:\b(?:ministro|ministra))\s+\p{Lu}",
            r"(?i:\b(?:prefeito|prefeita))\s+\p{Lu}",
            r"(?i:\b(?:deputado|deputada|senador|senadora))\s+\p{Lu}",
            r"(?i:\b(?:presidente|vice-presidente))\s+\p{Lu}",
            r"(?i)\bex-(?:governador|prefeito|ministro|presidente)\b",
        ])
    }

    pub fn historical() -> Vec<String> {
        owned(&[
            r"(?i:\b(?:hospital|escola|praça|rua|avenida))\s+\p{Lu}\p{Ll}+\s+\p{Lu}",
            r"(?i:\blei)\s+\p{Lu}\p{Ll}+\s+(?:da\s+)?\p{Lu}",
            r"(?i:\b(?:em\s+homenagem\s+(?:a|ao|à)|homenageando))\s+\p{Lu}",
            r"(?i:\b(?:fundador|fundadora|patrono|patrona))\s+\p{Lu}",
        ])
    }

    pub fn legal_professional() -> Vec<String> {
        owned(&[
            r"\bOAB[/\s-]?[A-Z]{2}[:\s]*\d+",
            r"(?i:\b(?:advogad[oa]|procuradora?|defensora?|juiz|juíza|desembargadora?))\s+\p{Lu}",
        ])
    }

    pub fn authorship() -> Vec<String> {
        owned(&[
            r"(?i:\b(?:autor|autora|escrito\s+por))\s+\p{Lu}",
            r"(?i:\bsegundo)\s+\p{Lu}\p{Ll}+\s+\(\d{4}\)",
            r"\b\p{Lu}{2,},\s+\p{Lu}\p{Ll}+\.?\s+\(\d{4}\)",
            r"(?i:\bapud)\s+\p{Lu}",
            r"(?i:\bin:)\s+\p{Lu}",
        ])
    }

    pub fn known_artists() -> Vec<String> {
        owned(&[
            "athos bulcão",
            "athos bulsão",
            "burle marx",
            "roberto burle marx",
            "oscar niemeyer",
            "cândido portinari",
            "di cavalcanti",
            "tarsila do amaral",
            "alfredo volpi",
            "marianne peretti",
        ])
    }
}

/// A special context found in a record
#[derive(Debug, Clone, PartialEq)]
struct ContextHit {
    reason: ReasonCode,
    marker: String,
}

/// Review-item producer; shared read-only across a batch
pub struct TriageEngine {
    contexts: Vec<(ReasonCode, Vec<Regex>)>,
    known_artists: Vec<String>,
    thresholds: ThresholdConfig,
    excerpt_window: usize,
}

impl TriageEngine {
    pub fn new(config: &VigilConfig) -> Result<Self> {
        let t = &config.triage;
        let contexts = vec![
            (ReasonCode::ArtisticContext, compile_patterns("triage.artistic", &t.artistic)?),
            (ReasonCode::AcademicContext, compile_patterns("triage.academic", &t.academic)?),
            (
                ReasonCode::JournalisticContext,
                compile_patterns("triage.journalistic", &t.journalistic)?,
            ),
            (
                ReasonCode::LegalProfessionalContext,
                compile_patterns("triage.legal_professional", &t.legal_professional)?,
            ),
            (
                ReasonCode::PublicOfficeContext,
                compile_patterns("triage.public_office", &t.public_office)?,
            ),
            (
                ReasonCode::HistoricalReference,
                compile_patterns("triage.historical", &t.historical)?,
            ),
            (
                ReasonCode::AuthorshipContext,
                compile_patterns("triage.authorship", &t.authorship)?,
            ),
        ];

        Ok(Self {
            contexts,
            known_artists: t.known_artists.iter().map(|a| a.trim().to_lowercase()).collect(),
            thresholds: config.thresholds.clone(),
            excerpt_window: t.excerpt_window,
        })
    }

    /// Review items for one classified record (detections and provisional names)
    pub fn review(&self, record: &Record, result: &ClassificationResult) -> Vec<ReviewItem> {
        let raw = record.raw_text.as_deref().unwrap_or_default();
        let candidates: Vec<&Detection> = result
            .detections
            .iter()
            .chain(result.provisional.iter())
            .collect();
        if candidates.is_empty() {
            return Vec::new();
        }

        let hits = if candidates.iter().any(|d| d.category == Category::Name) {
            self.context_hits(normalize(raw).as_str())
        } else {
            Vec::new()
        };

        let items: Vec<ReviewItem> = candidates
            .into_iter()
            .filter_map(|d| self.review_detection(&result.record_id, raw, d, &hits))
            .collect();

        if !items.is_empty() {
            tracing::debug!(record_id = %result.record_id, items = items.len(), "Review items raised");
        }
        items
    }

    /// First marker of each special context present in `text`
    fn context_hits(&self, text: &str) -> Vec<ContextHit> {
        self.contexts
            .iter()
            .filter_map(|(reason, patterns)| {
                patterns.iter().find_map(|re| {
                    re.find(text).map(|m| ContextHit {
                        reason: *reason,
                        marker: m.as_str().to_string(),
                    })
                })
            })
            .collect()
    }

    fn is_known_artist(&self, name: &str) -> bool {
        let name = name.trim().to_lowercase();
        self.known_artists
            .iter()
            .any(|artist| name.contains(artist.as_str()) || artist.contains(name.as_str()))
    }

    fn review_detection(
        &self,
        record_id: &str,
        raw: &str,
        detection: &Detection,
        hits: &[ContextHit],
    ) -> Option<ReviewItem> {
        let mut reasons: Vec<(ReasonCode, String)> = Vec::new();

        match self.thresholds.review_band(detection.confidence) {
            Some(ReviewBand::Low) => reasons.push((
                ReasonCode::LowConfidence,
                format!(
                    "confidence {:.2} below {:.2}",
                    detection.confidence, self.thresholds.low_floor
                ),
            )),
            Some(ReviewBand::Moderate) => reasons.push((
                ReasonCode::ModerateConfidence,
                format!(
                    "confidence {:.2} below {:.2}",
                    detection.confidence, self.thresholds.confident_floor
                ),
            )),
            None => {}
        }

        if detection.category == Category::Name {
            if self.is_known_artist(&detection.matched_value) {
                reasons.push((
                    ReasonCode::ArtisticContext,
                    format!("\"{}\" is a known artist", detection.matched_value),
                ));
            }
            for hit in hits {
                reasons.push((hit.reason, format!("marker \"{}\"", hit.marker)));
            }
        }

        let priority = reasons.iter().map(|(r, _)| r.priority()).min()?;
        let reason_code = reasons
            .iter()
            .map(|(r, _)| *r)
            .find(|r| r.priority() == priority)?;

        let rationale = reasons
            .iter()
            .map(|(reason, basis)| format!("{} ({}): {}", reason, basis, reason.explanation()))
            .collect::<Vec<_>>()
            .join(" | ");

        Some(ReviewItem {
            record_id: record_id.to_string(),
            priority,
            category: detection.category,
            matched_value: detection.matched_value.clone(),
            confidence: detection.confidence,
            reason_code,
            text_excerpt: self.excerpt(raw, detection.start, detection.end),
            rationale,
        })
    }

    /// Raw text around `start..end`, with "..." where it was cut
    fn excerpt(&self, raw: &str, start: usize, end: usize) -> String {
        let start = floor_boundary(raw, start.min(raw.len()));
        let end = ceil_boundary(raw, end.min(raw.len())).max(start);
        let window = char_window(raw, start, end, self.excerpt_window, self.excerpt_window);

        let mut out = String::new();
        if window.start > 0 {
            out.push_str("...");
        }
        out.push_str(&raw[window.clone()]);
        if window.end < raw.len() {
            out.push_str("...");
        }
        out
    }
}
