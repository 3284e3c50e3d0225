//! Auxiliary contextual signals
//!
//! First-person, address and contact markers. A signal never becomes a
//! detection; it only supports a nearby structured match and is reported as
//! record metadata.

use crate::config::{compile_patterns, SignalConfig};
use crate::error::Result;
use crate::normalize::char_window;
use crate::types::{ContextSignal, SignalKind};
use regex::Regex;

pub fn default_first_person_markers() -> Vec<String> {
    vec![
        r"(?i)\b(?:meu|minha)\s+(?:CPF|nome|RG|telefone|e-?mail|celular|endereço|identidade)\b".to_string(),
        r"(?i:\bsou|\bchamo-me|\bme\s+chamo|\bnome\s+é)\s+\p{Lu}\p{Ll}+\s+\p{Lu}".to_string(),
    ]
}

pub fn default_address_markers() -> Vec<String> {
    vec![
        r"(?i)\b(?:moro|resido|residente)\s+(?:na?|no|em)\b".to_string(),
        r"(?i)\b(?:rua|avenida|quadra|conjunto|bloco|lote|apartamento|apt\.?)\s".to_string(),
        r"(?i)\bCEP[:\s]*\d{5}-?\d{3}".to_string(),
    ]
}

pub fn default_contact_markers() -> Vec<String> {
    vec![
        r"(?i)\b(?:contato|whatsapp|whats|zap)\s*[:\s]*\(?\d".to_string(),
        r"(?i)\b(?:fone|telefone|cel|celular)\s*[:\s]*\(?\+?\d".to_string(),
    ]
}

/// Compiled signal vocabularies
pub struct SignalExtractor {
    rules: Vec<(SignalKind, Regex)>,
    window: usize,
}

impl SignalExtractor {
    pub fn new(config: &SignalConfig) -> Result<Self> {
        let mut rules = Vec::new();
        for (kind, name, sources) in [
            (SignalKind::FirstPerson, "signals.first_person", &config.first_person),
            (SignalKind::Address, "signals.address", &config.address),
            (SignalKind::Contact, "signals.contact", &config.contact),
        ] {
            rules.extend(compile_patterns(name, sources)?.into_iter().map(|re| (kind, re)));
        }
        Ok(Self {
            rules,
            window: config.window,
        })
    }

    /// All signals in `text`, ordered by position
    pub fn extract(&self, text: &str) -> Vec<ContextSignal> {
        let mut signals: Vec<ContextSignal> = self
            .rules
            .iter()
            .flat_map(|(kind, re)| {
                re.find_iter(text).map(move |m| ContextSignal {
                    kind: *kind,
                    start: m.start(),
                    end: m.end(),
                })
            })
            .collect();
        signals.sort_by_key(|s| (s.start, s.end, s.kind as u8));
        signals.dedup();
        signals
    }

    /// Whether any signal lies within the window around `start..end`
    pub fn supports(&self, text: &str, signals: &[ContextSignal], start: usize, end: usize) -> bool {
        let window = char_window(text, start, end, self.window, self.window);
        signals
            .iter()
            .any(|s| s.start < window.end && s.end > window.start)
    }
}
