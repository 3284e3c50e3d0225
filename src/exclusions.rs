//! Institutional exclusion filter
//!
//! Recognizers routinely tag government bodies, places and formal titles as
//! persons. Candidates are compared token by token: a candidate equal to a
//! listed term, containing a multi-word listed term, or ending in a
//! legal-entity suffix is institutional. Single-word terms only match the
//! whole candidate so that surnames such as "Gama" survive inside
//! "Vasco da Gama".

use crate::config::ExclusionConfig;
use std::collections::HashSet;

/// Read-only lookup built once from configuration
#[derive(Debug, Clone)]
pub struct InstitutionalFilter {
    exact: HashSet<String>,
    phrases: Vec<Vec<String>>,
    suffixes: HashSet<String>,
}

impl InstitutionalFilter {
    pub fn new(config: &ExclusionConfig) -> Self {
        let mut exact = HashSet::new();
        let mut phrases = Vec::new();

        for name in &config.institutional_names {
            let tokens = tokenize(name);
            if tokens.is_empty() {
                continue;
            }
            exact.insert(tokens.join(" "));
            if tokens.len() > 1 {
                phrases.push(tokens);
            }
        }

        let suffixes = config
            .legal_entity_suffixes
            .iter()
            .flat_map(|s| tokenize(s))
            .collect();

        Self {
            exact,
            phrases,
            suffixes,
        }
    }

    /// Whether `candidate` names an organization, place or title
    pub fn is_institutional(&self, candidate: &str) -> bool {
        let tokens = tokenize(candidate);
        if tokens.is_empty() {
            return false;
        }

        if self.exact.contains(&tokens.join(" ")) {
            return true;
        }

        if self
            .phrases
            .iter()
            .any(|phrase| contains_sequence(&tokens, phrase))
        {
            return true;
        }

        tokens.len() > 1
            && tokens
                .last()
                .is_some_and(|last| self.suffixes.contains(last))
    }
}

/// Lowercased whitespace tokens with surrounding punctuation trimmed
fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|t| {
            t.trim_matches(|c: char| matches!(c, '.' | ',' | ';' | ':' | '(' | ')' | '"' | '\'' | '&'))
                .to_lowercase()
        })
        .filter(|t| !t.is_empty())
        .collect()
}

fn contains_sequence(haystack: &[String], needle: &[String]) -> bool {
    needle.len() <= haystack.len() && haystack.windows(needle.len()).any(|w| w == needle)
}

/// Trailing tokens that mark a company or firm
pub fn default_legal_entity_suffixes() -> Vec<String> {
    ["Ltda", "S.A.", "S/A", "EIRELI", "EPP", "Advogados", "Associados", "Cia"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Government bodies, administrative regions, places, forms of address,
/// legal terms and institutions of the Federal District
pub fn default_institutional_names() -> Vec<String> {
    [
        // Government bodies
        "Distrito Federal",
        "Governo do Distrito Federal",
        "GDF",
        "Controladoria Geral",
        "Controladoria-Geral",
        "CGDF",
        "Secretaria de Estado",
        "Secretaria de Governo",
        "Secretaria de Fazenda",
        "Secretaria de Saúde",
        "Secretaria de Educação",
        "Secretaria de Segurança",
        "Polícia Civil",
        "PCDF",
        "Polícia Militar",
        "PMDF",
        "Corpo de Bombeiros",
        "CBMDF",
        "Tribunal de Contas",
        "TCDF",
        "Ministério Público",
        "MPDFT",
        "Defensoria Pública",
        "Câmara Legislativa",
        "CLDF",
        "Detran",
        "DETRAN-DF",
        "BRB",
        "Banco de Brasília",
        "CEB",
        "Caesb",
        "Novacap",
        "Terracap",
        "Metrô-DF",
        "Hospital Regional",
        "Hospital de Base",
        // Administrative regions
        "Plano Piloto",
        "Asa Norte",
        "Asa Sul",
        "Lago Norte",
        "Lago Sul",
        "Sudoeste",
        "Octogonal",
        "Cruzeiro",
        "Candangolândia",
        "Núcleo Bandeirante",
        "Riacho Fundo",
        "Park Way",
        "Águas Claras",
        "Taguatinga",
        "Ceilândia",
        "Samambaia",
        "Gama",
        "Santa Maria",
        "Recanto das Emas",
        "Sobradinho",
        "Planaltina",
        "Paranoá",
        "São Sebastião",
        "Jardim Botânico",
        "Itapoã",
        "SIA",
        "SCIA",
        "Estrutural",
        "Varjão",
        "Fercal",
        "Sol Nascente",
        "Pôr do Sol",
        "Arniqueira",
        "Vicente Pires",
        "Brazlândia",
        // Places
        "Planaltina de Goiás",
        "Formosa",
        "Valparaíso",
        "Novo Gama",
        "Cidade Ocidental",
        "Luziânia",
        "Entorno do DF",
        "Esplanada dos Ministérios",
        "Praça dos Três Poderes",
        "Congresso Nacional",
        "Palácio do Planalto",
        "Palácio da Alvorada",
        "Supremo Tribunal Federal",
        "STF",
        "Superior Tribunal de Justiça",
        "STJ",
        // Forms of address
        "Vossa Senhoria",
        "Vossa Excelência",
        "Vossas Senhorias",
        "Ilustríssimo",
        "Ilustríssima",
        "Excelentíssimo",
        "Excelentíssima",
        "Meritíssimo",
        "Meritíssima",
        "Prezados Senhores",
        "Prezadas Senhoras",
        "Senhor Secretário",
        "Senhora Secretária",
        "Senhor Governador",
        "Senhora Governadora",
        "Senhor Presidente",
        "Senhora Presidente",
        "Senhor Diretor",
        "Senhora Diretora",
        "Ilustres Servidores",
        // Legal and technical terms
        "Constituição Federal",
        "Constituição da República",
        "Lei Orgânica",
        "Lei de Acesso",
        "Lei de Acesso à Informação",
        "LAI",
        "Lei Maria da Penha",
        "Lei Complementar",
        "Código Civil",
        "Código Penal",
        "Código de Processo",
        "Programa de Integridade",
        "Gestão de Riscos",
        "Controle Interno",
        "Ouvidoria Geral",
        "Corregedoria",
        "Procuradoria Geral",
        "Advocacia Geral",
        // Education
        "Universidade de Brasília",
        "UnB",
        "Universidade Católica",
        "UCB",
        "Centro Universitário",
        "UniCEUB",
        "IESB",
        "Instituto Federal",
        "IFB",
        "Escola de Governo",
        // Other common terms
        "Sistema Eletrônico",
        "SEI",
        "e-SIC",
        "Fala.BR",
        "Portal da Transparência",
        "Diário Oficial",
        "DODF",
        "Nota Fiscal",
        "Pregão Eletrônico",
        "Tomada de Preços",
        "Concorrência Pública",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> InstitutionalFilter {
        InstitutionalFilter::new(&ExclusionConfig::default())
    }

    #[test]
    fn test_exact_match_is_case_insensitive() {
        let f = filter();
        assert!(f.is_institutional("Distrito Federal"));
        assert!(f.is_institutional("distrito federal"));
        assert!(f.is_institutional("DISTRITO FEDERAL"));
        assert!(f.is_institutional("Tribunal de Contas"));
        assert!(f.is_institutional("Gama"));
    }

    #[test]
    fn test_contains_multi_word_term() {
        let f = filter();
        assert!(f.is_institutional("Secretaria de Estado de Saúde do DF"));
        assert!(f.is_institutional("Hospital Regional de Taguatinga"));
    }

    #[test]
    fn test_real_names_survive() {
        let f = filter();
        for name in [
            "Ana",
            "Ana Silva",
            "João Silva",
            "Maria Santos",
            "José da Silva",
            "Maria do Carmo",
            "Vasco da Gama",
            "Lia",
            "Eva",
        ] {
            assert!(!f.is_institutional(name), "{name} was excluded");
        }
    }

    #[test]
    fn test_legal_entity_suffix() {
        let f = filter();
        assert!(f.is_institutional("Construtora Horizonte Ltda."));
        assert!(f.is_institutional("Silva & Souza Advogados"));
        assert!(f.is_institutional("Banco Central S.A."));
        // A bare suffix is not a company
        assert!(!f.is_institutional("Associados"));
    }

    #[test]
    fn test_empty_candidate() {
        assert!(!filter().is_institutional(""));
        assert!(!filter().is_institutional("   "));
    }

    #[test]
    fn test_custom_list() {
        let f = InstitutionalFilter::new(&ExclusionConfig {
            institutional_names: vec!["Fundação Cultural Palmares".to_string()],
            legal_entity_suffixes: vec![],
        });
        assert!(f.is_institutional("Fundação Cultural Palmares"));
        assert!(!f.is_institutional("Distrito Federal"));
    }
}
