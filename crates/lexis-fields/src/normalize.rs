//! Canonical field names.
//!
//! A canonical name is the accent-free, lowercase, single-underscore form of
//! a label with connector words removed: `"Número de Identificación"` and
//! `"numero_de_identificacion"` both become `"numero_identificacion"`.
//! The compact form additionally drops every separator and is only used for
//! cross-concept comparison, never as a stored key.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::dictionary::FieldDictionary;

/// Runs of underscore, whitespace, slash and hyphen.
static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s_/\-]+").unwrap());

static DEFAULT_NORMALIZER: Lazy<NameNormalizer> = Lazy::new(|| {
    let dictionary = FieldDictionary::default();
    NameNormalizer::new(dictionary.stop_words.iter().map(String::as_str))
});

/// Canonical form of a label using the default connector words.
pub fn normalize(label: &str) -> String {
    DEFAULT_NORMALIZER.canonical(label)
}

/// Compact (separator-free) form of a label using the default connector words.
pub fn normalize_strict(label: &str) -> String {
    DEFAULT_NORMALIZER.compact(label)
}

/// Strip diacritics, lowercase, and collapse separators into single underscores.
fn fold(label: &str) -> String {
    let stripped: String = label.nfd().filter(|c| !is_combining_mark(*c)).collect();
    let lowered: String = stripped
        .to_lowercase()
        .chars()
        .filter(|c| !is_combining_mark(*c))
        .collect();
    SEPARATORS
        .replace_all(lowered.trim(), "_")
        .trim_matches('_')
        .to_string()
}

/// Label normalizer parameterized by the connector words to drop.
#[derive(Debug, Clone, Default)]
pub struct NameNormalizer {
    stop_words: HashSet<String>,
}

impl NameNormalizer {
    pub fn new<'a, I>(stop_words: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let stop_words = stop_words
            .into_iter()
            .map(fold)
            .filter(|w| !w.is_empty())
            .collect();
        Self { stop_words }
    }

    /// Canonical key for a label. Never fails; blank input yields `""`.
    ///
    /// Connector words are removed as whole tokens unless the label consists
    /// of nothing else, in which case it is kept as folded.
    pub fn canonical(&self, label: &str) -> String {
        let folded = fold(label);
        if folded.is_empty() || self.stop_words.is_empty() {
            return folded;
        }
        let kept: Vec<&str> = folded
            .split('_')
            .filter(|token| !self.stop_words.contains(*token))
            .collect();
        if kept.is_empty() {
            folded
        } else {
            kept.join("_")
        }
    }

    /// Separator-free key for cross-concept matching.
    pub fn compact(&self, label: &str) -> String {
        self.canonical(label).replace('_', "")
    }

    /// Whether a key is already in canonical form.
    pub fn is_canonical(&self, key: &str) -> bool {
        self.canonical(key) == key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_accents_and_connectors() {
        assert_eq!(normalize("Número de Identificación"), "numero_identificacion");
        assert_eq!(normalize("numero_de_identificacion"), "numero_identificacion");
        assert_eq!(
            normalize("Número de Identificación"),
            normalize("numero_de_identificacion")
        );
    }

    #[test]
    fn test_normalize_collapses_separators() {
        assert_eq!(normalize("  Correo   Electrónico "), "correo_electronico");
        assert_eq!(normalize("fecha/inicio--contrato"), "fecha_inicio_contrato");
        assert_eq!(normalize("__Banco__"), "banco");
        assert_eq!(normalize("Tipo_ - _Cuenta"), "tipo_cuenta");
    }

    #[test]
    fn test_normalize_is_case_and_diacritic_insensitive() {
        assert_eq!(normalize("AÑO"), normalize("año"));
        assert_eq!(normalize("año"), "ano");
        assert_eq!(normalize("Dirección"), normalize("DIRECCION"));
    }

    #[test]
    fn test_normalize_handles_decomposed_input() {
        let decomposed = "Nu\u{0301}mero";
        assert_eq!(normalize(decomposed), "numero");
    }

    #[test]
    fn test_normalize_empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize("_-/ "), "");
    }

    #[test]
    fn test_only_connector_words_are_kept() {
        assert_eq!(normalize("De"), "de");
        assert_eq!(normalize("de la"), "de_la");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let labels = [
            "Número de Identificación",
            "  Correo   Electrónico ",
            "de la",
            "Fecha de Inicio / Terminación",
            "İstanbul Şubesi",
            "Banco-Cuenta__Tipo",
            "N° Póliza",
        ];
        for label in labels {
            let once = normalize(label);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", label);
        }
    }

    #[test]
    fn test_normalize_strict() {
        assert_eq!(normalize_strict("Número de Identificación"), "numeroidentificacion");
        assert_eq!(normalize_strict("numero identificacion"), "numeroidentificacion");
        assert_eq!(normalize_strict("Representante Legal"), "representantelegal");
    }

    #[test]
    fn test_custom_stop_words() {
        let normalizer = NameNormalizer::new(["para", "Él"]);
        assert_eq!(normalizer.canonical("Cuenta para Pagos"), "cuenta_pagos");
        assert_eq!(normalizer.canonical("nombre el cliente"), "nombre_cliente");
        assert_eq!(normalizer.canonical("numero de cuenta"), "numero_de_cuenta");
    }

    #[test]
    fn test_without_stop_words() {
        let normalizer = NameNormalizer::default();
        assert_eq!(normalizer.canonical("Fecha de Pago"), "fecha_de_pago");
    }

    #[test]
    fn test_is_canonical() {
        let normalizer = NameNormalizer::new(["de"]);
        assert!(normalizer.is_canonical("correo_electronico"));
        assert!(!normalizer.is_canonical("Correo Electrónico"));
        assert!(!normalizer.is_canonical("fecha_de_pago"));
    }
}
