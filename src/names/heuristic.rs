//! Conservative heuristic name finder
//!
//! Without a recognizer a capitalized run of words is only accepted as a
//! name when an explicit marker sits right next to it: a self-identification
//! ("meu nome é"), a role ("requerente", "servidora"), or an ID number.
//! Markers are case-insensitive; the name itself must be capitalized.

use crate::config::NameConfig;
use crate::error::Result;
use crate::names::oracle::EntitySpan;
use crate::names::NAME_CONNECTORS;
use regex::Regex;

/// Markers that precede a name
pub fn default_leading_markers() -> Vec<String> {
    [
        r"meu\s+nome\s+(?:completo\s+)?é",
        r"nome",
        r"chamo-me|me\s+chamo",
        r"CPF[:\s]*[\d.-]+",
        r"cidadão|cidadã|requerente|solicitante",
        r"servidora?|funcionári[oa]",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Markers that follow a name
pub fn default_trailing_markers() -> Vec<String> {
    [r"CPF", r"portadora?"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Capitalized words joined by spaces and lowercase connectors; connectors
/// do not count towards `max_tokens`
fn name_pattern(max_tokens: usize) -> String {
    format!(
        r"\p{{Lu}}\p{{Ll}}+(?:\s+(?:(?:{})\s+)?\p{{Lu}}\p{{Ll}}+){{1,{}}}",
        NAME_CONNECTORS.join("|"),
        max_tokens.saturating_sub(1).max(1)
    )
}

/// Marker-gated capitalized sequences
pub struct HeuristicNameFinder {
    rules: Vec<Regex>,
    confidence: f64,
}

impl HeuristicNameFinder {
    pub fn new(config: &NameConfig) -> Result<Self> {
        let name = name_pattern(config.max_tokens);
        let mut rules = Vec::new();

        for (i, marker) in config.leading_markers.iter().enumerate() {
            let source = format!(r"(?i:\b(?:{}))[:\s,]+({})", marker, name);
            rules.push(crate::config::compile_pattern(
                &format!("names.leading_markers[{}]", i),
                &source,
            )?);
        }
        for (i, marker) in config.trailing_markers.iter().enumerate() {
            let source = format!(r"({})[,\s]+(?i:(?:{})\b)", name, marker);
            rules.push(crate::config::compile_pattern(
                &format!("names.trailing_markers[{}]", i),
                &source,
            )?);
        }

        Ok(Self {
            rules,
            confidence: config.heuristic_confidence,
        })
    }

    /// Candidate name spans in `text` (unfiltered)
    pub fn find(&self, text: &str) -> Vec<EntitySpan> {
        let mut spans: Vec<EntitySpan> = self
            .rules
            .iter()
            .flat_map(|re| re.captures_iter(text))
            .filter_map(|caps| caps.get(1))
            .map(|m| EntitySpan::person(m.start(), m.end(), self.confidence))
            .collect();
        spans.sort_by_key(|s| (s.start, s.end));
        spans.dedup_by_key(|s| (s.start, s.end));
        spans
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(text: &str) -> Vec<String> {
        HeuristicNameFinder::new(&NameConfig::default())
            .unwrap()
            .find(text)
            .into_iter()
            .map(|s| text[s.start..s.end].to_string())
            .collect()
    }

    #[test]
    fn test_self_identification() {
        assert_eq!(names("Olá, meu nome é Carlos Eduardo Pereira."), vec!["Carlos Eduardo Pereira"]);
        assert_eq!(names("Me chamo Fernanda Lima e gostaria"), vec!["Fernanda Lima"]);
        assert_eq!(names("Nome: Roberto Carlos da Silva"), vec!["Roberto Carlos da Silva"]);
    }

    #[test]
    fn test_role_markers() {
        assert_eq!(names("A requerente Juliana Martins solicita"), vec!["Juliana Martins"]);
        assert_eq!(names("servidora: Patrícia Gomes"), vec!["Patrícia Gomes"]);
    }

    #[test]
    fn test_id_number_markers() {
        assert_eq!(names("CPF 123.456.789-00, Marcos Vinícius Rocha"), vec!["Marcos Vinícius Rocha"]);
        assert_eq!(names("Lucas Almeida, CPF 123.456.789-00"), vec!["Lucas Almeida"]);
        assert_eq!(names("Renata Duarte, portadora do RG"), vec!["Renata Duarte"]);
    }

    #[test]
    fn test_long_names_with_connectors() {
        assert_eq!(
            names("Meu nome é Maria das Graças da Silva dos Santos"),
            vec!["Maria das Graças da Silva dos Santos"]
        );
        assert_eq!(
            names("Meu nome é Ana Maria de Souza e Silva Pereira"),
            vec!["Ana Maria de Souza e Silva Pereira"]
        );
    }

    #[test]
    fn test_requires_marker() {
        assert!(names("Ontem Carlos Eduardo Pereira esteve aqui").is_empty());
    }

    #[test]
    fn test_single_word_is_not_a_name() {
        assert!(names("meu nome é Maria").is_empty());
    }

    #[test]
    fn test_lowercase_words_are_not_names() {
        assert!(names("nome: joão da silva").is_empty());
    }
}
