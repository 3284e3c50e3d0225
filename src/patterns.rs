//! Deterministic pattern matcher for structured identifiers
//!
//! Rules: national ID number (CPF) in formatted or labelled bare form,
//! secondary ID (RG) behind a label, email, and national phone formats.
//! ID, secondary-ID and phone matches are dropped when an administrative
//! identifier label (process numbers, licences, registrations) sits in the
//! surrounding window; those numbers are the dominant false-positive source
//! in administrative records.
//!
//! Confidence is a fixed per-rule constant. Check digits are never verified:
//! synthetic or mistyped identifiers still identify someone.

use crate::config::{compile_pattern, compile_patterns, PatternConfig};
use crate::error::Result;
use crate::normalize::char_window;
use crate::types::{Category, Detection, Method};
use regex::Regex;

pub const ID_FORMATTED_CONFIDENCE: f64 = 0.95;
pub const ID_LABELED_CONFIDENCE: f64 = 0.90;
pub const SECONDARY_ID_CONFIDENCE: f64 = 0.85;
pub const EMAIL_CONFIDENCE: f64 = 0.95;
pub const PHONE_CONFIDENCE: f64 = 0.90;

const ID_FORMATTED: &str = r"\b\d{3}\.\d{3}\.\d{3}-\d{2}\b";
const EMAIL: &str = r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}";
const PHONE_INTERNATIONAL: &str = r"\+55\s*\(?\d{2}\)?\s*\d{4,5}[-\s]?\d{4}";
const PHONE_AREA_CODE: &str = r"\(\d{2}\)\s*\d{4,5}[-\s]?\d{4}";
const PHONE_MOBILE: &str = r"\b9\d{4}-\d{4}\b";

/// Number marker after an administrative label. NFKC folds `º` to `o`,
/// so "nº" reaches the guards as "no".
const NUMBER_MARKER: &str = r"(?:n[º°o]|n\.[º°o]|nro\.?|n\.?)?";

/// Administrative identifier labels that suppress nearby matches
pub fn default_administrative_labels() -> Vec<String> {
    [
        r"(?:SEI|NUP)",
        r"processo",
        r"protocolo",
        r"(?:CDA|CNH|NIS|matr[íi]cula|RNE|PIS|PASEP)",
    ]
    .iter()
    .map(|label| format!(r"(?i)\b{}\s*{}\s*:?\s*[\d./-]*\d", label, NUMBER_MARKER))
    .collect()
}

/// Turn plain labels into a regex alternation (whitespace-tolerant)
fn label_alternation(labels: &[String]) -> String {
    labels
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| {
            l.split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+")
        })
        .collect::<Vec<_>>()
        .join("|")
}

/// Compiled structured-identifier rules
pub struct PatternMatcher {
    id_formatted: Regex,
    id_labeled: Regex,
    secondary_labeled: Regex,
    email: Regex,
    phones: Vec<Regex>,
    guards: Vec<Regex>,
    guard_before: usize,
    guard_after: usize,
}

impl PatternMatcher {
    /// Compile the rules for the given configuration
    pub fn new(config: &PatternConfig) -> Result<Self> {
        let id_labeled = format!(
            r"(?i:\b(?:{})\b)[^\d\n]{{0,{}}}(\d{{11}})\b",
            label_alternation(&config.id_labels),
            config.id_label_window
        );
        let secondary_labeled = format!(
            r"(?i:\b(?:{})\b)[^\d\n]{{0,{}}}(\d{{1,2}}\.?\d{{3}}\.?\d{{3}}(?:-?[\dXx])?|\d{{5,9}}(?:-[\dXx])?)\b",
            label_alternation(&config.secondary_labels),
            config.secondary_label_window
        );

        Ok(Self {
            id_formatted: compile_pattern("id_formatted", ID_FORMATTED)?,
            id_labeled: compile_pattern("id_labeled", &id_labeled)?,
            secondary_labeled: compile_pattern("secondary_labeled", &secondary_labeled)?,
            email: compile_pattern("email", EMAIL)?,
            phones: vec![
                compile_pattern("phone_international", PHONE_INTERNATIONAL)?,
                compile_pattern("phone_area_code", PHONE_AREA_CODE)?,
                compile_pattern("phone_mobile", PHONE_MOBILE)?,
            ],
            guards: compile_patterns("patterns.administrative_labels", &config.administrative_labels)?,
            guard_before: config.guard_before,
            guard_after: config.guard_after,
        })
    }

    /// Find every structured identifier in `text`.
    ///
    /// Offsets in the returned detections are relative to `text`.
    pub fn detect(&self, text: &str) -> Vec<Detection> {
        if text.is_empty() {
            return Vec::new();
        }

        let mut found = Vec::new();
        self.find_id_formatted(text, &mut found);
        self.find_id_labeled(text, &mut found);
        self.find_secondary_id(text, &mut found);
        self.find_email(text, &mut found);
        self.find_phone(text, &mut found);
        found
    }

    fn find_id_formatted(&self, text: &str, out: &mut Vec<Detection>) {
        for m in self.id_formatted.find_iter(text) {
            if !digit_bounded(text, m.start(), m.end()) {
                continue;
            }
            if self.is_administrative_context(text, m.start(), m.end()) {
                tracing::trace!(value = m.as_str(), "ID number suppressed by administrative label");
                continue;
            }
            out.push(detection(Category::IdNumber, text, m.start(), m.end(), ID_FORMATTED_CONFIDENCE));
        }
    }

    fn find_id_labeled(&self, text: &str, out: &mut Vec<Detection>) {
        for caps in self.id_labeled.captures_iter(text) {
            let Some(digits) = caps.get(1) else { continue };
            if self.is_administrative_context(text, digits.start(), digits.end()) {
                continue;
            }
            out.push(detection(
                Category::IdNumber,
                text,
                digits.start(),
                digits.end(),
                ID_LABELED_CONFIDENCE,
            ));
        }
    }

    fn find_secondary_id(&self, text: &str, out: &mut Vec<Detection>) {
        for caps in self.secondary_labeled.captures_iter(text) {
            let Some(number) = caps.get(1) else { continue };
            if self.is_administrative_context(text, number.start(), number.end()) {
                continue;
            }
            out.push(detection(
                Category::SecondaryId,
                text,
                number.start(),
                number.end(),
                SECONDARY_ID_CONFIDENCE,
            ));
        }
    }

    fn find_email(&self, text: &str, out: &mut Vec<Detection>) {
        for m in self.email.find_iter(text) {
            out.push(detection(Category::Email, text, m.start(), m.end(), EMAIL_CONFIDENCE));
        }
    }

    fn find_phone(&self, text: &str, out: &mut Vec<Detection>) {
        let mut spans: Vec<(usize, usize)> = self
            .phones
            .iter()
            .flat_map(|re| re.find_iter(text).map(|m| (m.start(), m.end())))
            .filter(|&(s, e)| digit_bounded(text, s, e))
            .collect();

        // Longest match first at each start so nested formats collapse
        spans.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));
        let mut kept: Vec<(usize, usize)> = Vec::new();
        for (s, e) in spans {
            if kept.iter().any(|&(ks, ke)| s < ke && e > ks) {
                continue;
            }
            kept.push((s, e));
        }

        for (s, e) in kept {
            if self.is_administrative_context(text, s, e) {
                continue;
            }
            out.push(detection(Category::Phone, text, s, e, PHONE_CONFIDENCE));
        }
    }

    /// Whether an administrative identifier label sits in the guard window
    pub fn is_administrative_context(&self, text: &str, start: usize, end: usize) -> bool {
        let window = char_window(text, start, end, self.guard_before, self.guard_after);
        let context = &text[window];
        self.guards.iter().any(|re| re.is_match(context))
    }
}

fn detection(category: Category, text: &str, start: usize, end: usize, confidence: f64) -> Detection {
    Detection {
        category,
        matched_value: text[start..end].to_string(),
        confidence,
        method: Method::Pattern,
        start,
        end,
    }
}

/// No digit directly before or after the span
fn digit_bounded(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(|c| c.is_ascii_digit()) && !after.is_some_and(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;

    fn matcher() -> PatternMatcher {
        PatternMatcher::new(&PatternConfig::default()).unwrap()
    }

    fn values(text: &str, category: Category) -> Vec<String> {
        matcher()
            .detect(text)
            .into_iter()
            .filter(|d| d.category == category)
            .map(|d| d.matched_value)
            .collect()
    }

    // ---- ID number ----

    #[test]
    fn test_formatted_id_number() {
        let found = matcher().detect("O CPF do solicitante é 123.456.789-00.");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].category, Category::IdNumber);
        assert_eq!(found[0].matched_value, "123.456.789-00");
        assert_eq!(found[0].confidence, ID_FORMATTED_CONFIDENCE);
        assert_eq!(found[0].method, Method::Pattern);
    }

    #[test]
    fn test_formatted_id_number_with_invalid_check_digits() {
        // 111.222.333-44 fails the CPF checksum; it is still an identifier
        assert_eq!(values("sob o CPF 111.222.333-44", Category::IdNumber), vec!["111.222.333-44"]);
        assert_eq!(values("documento 111.222.333-44", Category::IdNumber), vec!["111.222.333-44"]);
    }

    #[test]
    fn test_multiple_formatted_ids() {
        let ids = values("CPF: 111.222.333-44 e também 555.666.777-88", Category::IdNumber);
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_bare_id_requires_label() {
        assert!(values("O número 12345678900 é um código qualquer.", Category::IdNumber).is_empty());
        assert_eq!(values("CPF: 12345678900", Category::IdNumber), vec!["12345678900"]);
        assert_eq!(values("cpf nº 12345678900", Category::IdNumber), vec!["12345678900"]);
    }

    #[test]
    fn test_bare_id_label_outside_window() {
        let text = "CPF informado anteriormente no formulário 12345678900";
        assert!(values(text, Category::IdNumber).is_empty());
    }

    #[test]
    fn test_bare_id_label_window_is_configurable() {
        let config = PatternConfig {
            id_label_window: 60,
            ..PatternConfig::default()
        };
        let m = PatternMatcher::new(&config).unwrap();
        let found = m.detect("CPF informado anteriormente no formulário 12345678900");
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_bare_id_not_part_of_longer_number() {
        assert!(values("CPF: 123456789001", Category::IdNumber).is_empty());
    }

    // ---- Administrative guard ----

    #[test]
    fn test_process_numbers_are_not_ids() {
        assert!(matcher().detect("Processo SEI 00015-12345678/2026-01").is_empty());
        assert!(matcher().detect("NUP 00015-12345678/2026-01").is_empty());
        assert!(matcher().detect("Processo nº 56478.000012/2026-05").is_empty());
    }

    #[test]
    fn test_other_registrations_are_not_ids() {
        assert!(matcher().detect("CDA n. 08563214753").is_empty());
        assert!(matcher().detect("CNH: 78945612378").is_empty());
        assert!(matcher().detect("Nis: 98765432165").is_empty());
    }

    #[test]
    fn test_guard_suppresses_colocated_id() {
        let text = "Conforme SEI 00015-01009853/2026-01, CPF 123.456.789-00";
        assert!(values(text, Category::IdNumber).is_empty());
    }

    #[test]
    fn test_guard_window_is_bounded() {
        let padding = "x ".repeat(60);
        let text = format!("Processo nº 123/2020. {}CPF 123.456.789-00", padding);
        assert_eq!(values(&text, Category::IdNumber), vec!["123.456.789-00"]);
    }

    #[test]
    fn test_guard_after_normalization() {
        // "nº" is "no" once normalized
        for raw in [
            "Processo nº 123.456.789-00",
            "Conforme processo nº 00015/2026, CPF 123.456.789-00",
            "matrícula nº 98765-4321",
            "SEI n.º 00015-01009853/2026-01",
        ] {
            let text = normalize(raw);
            assert!(matcher().detect(text.as_str()).is_empty(), "{raw}");
        }
        assert!(matcher().detect("protocolo nro. 98765-4321").is_empty());
    }

    #[test]
    fn test_processo_word_without_number_does_not_guard() {
        let text = "Sobre o processo. Meu CPF é 123.456.789-00";
        assert_eq!(values(text, Category::IdNumber), vec!["123.456.789-00"]);
    }

    // ---- Secondary ID ----

    #[test]
    fn test_secondary_id_with_label() {
        assert_eq!(values("RG: 12.345.678-9", Category::SecondaryId), vec!["12.345.678-9"]);
        assert_eq!(values("RG 1234567", Category::SecondaryId), vec!["1234567"]);
        assert_eq!(values("Documento RG: 9876543", Category::SecondaryId), vec!["9876543"]);
        assert_eq!(values("rg nº 12.345.678-X", Category::SecondaryId), vec!["12.345.678-X"]);
    }

    #[test]
    fn test_secondary_id_label_inside_word_is_ignored() {
        assert!(values("ÓRGÃO 1234567", Category::SecondaryId).is_empty());
        assert!(values("CARGO 1234567", Category::SecondaryId).is_empty());
        assert!(values("ORGANIZAÇÃO 1234567", Category::SecondaryId).is_empty());
    }

    #[test]
    fn test_secondary_id_requires_label() {
        assert!(values("código 1234567", Category::SecondaryId).is_empty());
    }

    // ---- Email ----

    #[test]
    fn test_email_variants() {
        assert_eq!(values("Contato: joao@email.com", Category::Email), vec!["joao@email.com"]);
        assert_eq!(
            values("Email: maria.silva@empresa.gov.br", Category::Email),
            vec!["maria.silva@empresa.gov.br"]
        );
        assert_eq!(
            values("jose.silva+teste@email.com.br", Category::Email),
            vec!["jose.silva+teste@email.com.br"]
        );
        assert_eq!(values("Emails: a@b.com e c@d.org", Category::Email).len(), 2);
    }

    // ---- Phone ----

    #[test]
    fn test_phone_formats() {
        assert_eq!(values("Telefone: (11) 99999-8888", Category::Phone), vec!["(11) 99999-8888"]);
        assert_eq!(values("Cel: (21) 987654321", Category::Phone), vec!["(21) 987654321"]);
        assert_eq!(values("Fone: (61) 3333-4444", Category::Phone), vec!["(61) 3333-4444"]);
        assert_eq!(values("contato: (54)99199-1000", Category::Phone), vec!["(54)99199-1000"]);
        assert_eq!(values("ligue 99876-5432", Category::Phone), vec!["99876-5432"]);
    }

    #[test]
    fn test_international_phone_is_one_match() {
        let phones = values("WhatsApp: +55 (11) 99999-1234", Category::Phone);
        assert_eq!(phones, vec!["+55 (11) 99999-1234"]);
        let phones = values("WhatsApp: +55 11 99999-1234", Category::Phone);
        assert_eq!(phones, vec!["+55 11 99999-1234"]);
    }

    #[test]
    fn test_multiple_phones() {
        let phones = values("Contatos: (11) 99999-1111 e (21) 88888-2222", Category::Phone);
        assert_eq!(phones.len(), 2);
    }

    #[test]
    fn test_years_and_postcodes_are_not_phones() {
        assert!(values("no período 2019-2020, CEP 70000-000", Category::Phone).is_empty());
    }

    #[test]
    fn test_phone_suppressed_by_registration() {
        assert!(values("matrícula 99999-8888", Category::Phone).is_empty());
    }

    // ---- Combined ----

    #[test]
    fn test_mixed_record() {
        let found = matcher()
            .detect("CPF: 123.456.789-00, email: teste@email.com, tel: (11) 99999-0000, RG 1234567");
        let mut categories: Vec<Category> = found.iter().map(|d| d.category).collect();
        categories.sort();
        assert_eq!(
            categories,
            vec![Category::IdNumber, Category::SecondaryId, Category::Phone, Category::Email]
        );
    }

    #[test]
    fn test_clean_text() {
        assert!(matcher()
            .detect("Solicito informações sobre o processo administrativo.")
            .is_empty());
        assert!(matcher().detect("").is_empty());
    }

    #[test]
    fn test_offsets_point_at_value() {
        let text = "tel: (11) 99999-0000";
        let found = matcher().detect(text);
        assert_eq!(&text[found[0].start..found[0].end], "(11) 99999-0000");
    }
}
