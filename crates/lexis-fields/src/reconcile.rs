//! Requirement-to-attribute matching.
//!
//! Each requirement is searched among the extracted fields tier by tier;
//! a tier scans every field before the next, weaker tier is tried:
//!
//! 1. exact canonical equality
//! 2. compact equality (separators ignored)
//! 3. same synonym group
//! 4. fuzzy, per [`FuzzyMode`], only when both names are longer than
//!    `fuzzy_min_len` characters

use std::sync::Arc;

use tracing::{debug, trace};

use lexis_core::{ExtractedField, MatchKind, MatchResult, ReconciliationReport};

use crate::config::{FuzzyMode, MatchingConfig};
use crate::dictionary::Lexicon;
use crate::extract::ExtractedFields;
use crate::requirements::RequirementSet;

/// A field judged equivalent to a requirement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldMatch<'a> {
    /// Canonical name of the matched field.
    pub name: &'a str,
    pub field: &'a ExtractedField,
    pub kind: MatchKind,
}

/// Pairs requirements with the fields of one entity.
#[derive(Debug, Clone)]
pub struct Reconciler {
    lexicon: Arc<Lexicon>,
    matching: MatchingConfig,
}

impl Reconciler {
    pub fn new(lexicon: Arc<Lexicon>, matching: MatchingConfig) -> Self {
        Self { lexicon, matching }
    }

    /// Find the field satisfying a requirement, strongest tier first.
    pub fn find_match<'a>(
        &self,
        requirement: &str,
        fields: &'a ExtractedFields,
    ) -> Option<FieldMatch<'a>> {
        if let Some(m) = first_where(fields, MatchKind::Exact, |name| name == requirement) {
            return Some(m);
        }

        let compact = requirement.replace('_', "");
        if let Some(m) = first_where(fields, MatchKind::Compact, |name| {
            name.replace('_', "") == compact
        }) {
            return Some(m);
        }

        let concept = self.lexicon.concept(requirement);
        if let Some(m) = first_where(fields, MatchKind::Synonym, |name| {
            self.lexicon.concept(name) == concept
        }) {
            return Some(m);
        }

        first_where(fields, MatchKind::Fuzzy, |name| {
            self.is_fuzzy_match(requirement, name)
        })
    }

    /// Fuzzy-tier comparison of two canonical names.
    pub fn is_fuzzy_match(&self, a: &str, b: &str) -> bool {
        let min = self.matching.fuzzy_min_len;
        if a.chars().count() <= min || b.chars().count() <= min {
            return false;
        }

        match self.matching.fuzzy_mode {
            FuzzyMode::Substring => a.contains(b) || b.contains(a),
            FuzzyMode::Tokens => {
                let ta: Vec<&str> = a.split('_').collect();
                let tb: Vec<&str> = b.split('_').collect();
                let (short, long) = if ta.len() <= tb.len() { (ta, tb) } else { (tb, ta) };
                long.windows(short.len()).any(|window| window == short.as_slice())
            }
            FuzzyMode::Similarity => {
                if a.contains(b) || b.contains(a) {
                    return true;
                }
                let score = strsim::jaro_winkler(&a.replace('_', ""), &b.replace('_', ""));
                trace!(a, b, score, "Similarity score");
                score >= self.matching.similarity_threshold
            }
        }
    }

    /// Classify every requirement as matched or missing.
    pub fn reconcile(
        &self,
        fields: &ExtractedFields,
        requirements: &RequirementSet,
    ) -> ReconciliationReport {
        let mut matched = Vec::new();
        let mut missing = Vec::new();

        for (canonical, requirement) in requirements {
            match self.find_match(canonical, fields) {
                Some(m) => {
                    debug!(
                        subsystem = "fields",
                        component = "reconcile",
                        canonical = %canonical,
                        key = %m.field.original_key,
                        tier = ?m.kind,
                        "Requirement matched"
                    );
                    matched.push(MatchResult {
                        requirement: requirement.clone(),
                        matched_key: m.field.original_key.clone(),
                        value: m.field.value.clone(),
                        match_kind: m.kind,
                    });
                }
                None => missing.push(requirement.clone()),
            }
        }

        let report = ReconciliationReport::new(matched, missing);
        debug!(
            subsystem = "fields",
            component = "reconcile",
            requirement_count = requirements.len(),
            matched_count = report.matched.len(),
            missing_count = report.missing.len(),
            completion = report.completion_percentage,
            "Reconciliation complete"
        );
        report
    }
}

fn first_where<'a>(
    fields: &'a ExtractedFields,
    kind: MatchKind,
    pred: impl Fn(&str) -> bool,
) -> Option<FieldMatch<'a>> {
    fields
        .iter()
        .find(|(name, _)| pred(name))
        .map(|(name, field)| FieldMatch { name, field, kind })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::FieldExtractor;
    use lexis_core::{AttributeValue, Entity, FieldSource, Requirement, ValueType};
    use uuid::Uuid;

    fn reconciler(mode: FuzzyMode) -> Reconciler {
        Reconciler::new(
            Arc::new(Lexicon::default()),
            MatchingConfig {
                fuzzy_mode: mode,
                ..MatchingConfig::default()
            },
        )
    }

    fn fields(entries: &[(&str, &str)]) -> ExtractedFields {
        let mut fields = ExtractedFields::new();
        for (name, value) in entries {
            fields.insert(
                name.to_string(),
                ExtractedField {
                    value: AttributeValue::text(*value),
                    source: FieldSource::Custom,
                    original_key: name.to_string(),
                },
            );
        }
        fields
    }

    fn requirement(name: &str, mandatory: bool) -> Requirement {
        Requirement {
            canonical_name: name.to_string(),
            label: name.to_string(),
            value_type: ValueType::Text,
            mandatory,
            source_templates: vec![Uuid::nil()],
        }
    }

    fn requirements(names: &[(&str, bool)]) -> RequirementSet {
        names
            .iter()
            .map(|(name, mandatory)| (name.to_string(), requirement(name, *mandatory)))
            .collect()
    }

    #[test]
    fn test_exact_match_beats_fuzzy_candidate_seen_first() {
        let f = fields(&[("banco_principal", "x"), ("banco", "y")]);
        let m = reconciler(FuzzyMode::Substring).find_match("banco", &f).unwrap();
        assert_eq!(m.name, "banco");
        assert_eq!(m.kind, MatchKind::Exact);
    }

    #[test]
    fn test_compact_match() {
        let f = fields(&[("tele_fono", "1")]);
        let m = reconciler(FuzzyMode::Tokens).find_match("telefono", &f).unwrap();
        assert_eq!(m.kind, MatchKind::Compact);
    }

    #[test]
    fn test_synonym_match() {
        let f = fields(&[("nit", "900123456")]);
        let m = reconciler(FuzzyMode::Substring)
            .find_match("numero_identificacion", &f)
            .unwrap();
        assert_eq!(m.kind, MatchKind::Synonym);
        assert_eq!(m.name, "nit");
    }

    #[test]
    fn test_fuzzy_substring_either_direction() {
        let r = reconciler(FuzzyMode::Substring);
        let f = fields(&[("cuenta_bancaria_principal", "1")]);
        assert_eq!(r.find_match("cuenta_bancaria", &f).unwrap().kind, MatchKind::Fuzzy);

        let f = fields(&[("cuenta", "1")]);
        assert!(r.find_match("cuenta_bancaria", &f).is_some());
    }

    #[test]
    fn test_fuzzy_requires_both_names_longer_than_min_len() {
        let r = reconciler(FuzzyMode::Substring);
        assert!(!r.is_fuzzy_match("pais_origen", "pai"));
        assert!(!r.is_fuzzy_match("rut", "rut_empresa"));
        assert!(r.is_fuzzy_match("ruta", "ruta_entrega"));
    }

    #[test]
    fn test_length_guard_counts_characters() {
        let r = reconciler(FuzzyMode::Substring);
        assert!(!r.is_fuzzy_match("año", "año_fiscal"));
    }

    #[test]
    fn test_tokens_mode_rejects_partial_tokens() {
        let r = reconciler(FuzzyMode::Tokens);
        assert!(r.is_fuzzy_match("cuenta_bancaria", "tipo_cuenta_bancaria"));
        assert!(!r.is_fuzzy_match("cuenta", "cuentahabiente_nombre"));
        assert!(!r.is_fuzzy_match("bancaria_cuenta", "tipo_cuenta_bancaria"));
    }

    #[test]
    fn test_similarity_mode_tolerates_typos() {
        let r = reconciler(FuzzyMode::Similarity);
        assert!(r.is_fuzzy_match("representante_legal", "reprsentante_legal"));
        assert!(!r.is_fuzzy_match("representante_legal", "fecha_nacimiento"));
        assert!(!reconciler(FuzzyMode::Substring)
            .is_fuzzy_match("representante_legal", "reprsentante_legal"));
    }

    #[test]
    fn test_zero_requirements_is_complete() {
        let report =
            reconciler(FuzzyMode::Substring).reconcile(&fields(&[("banco", "x")]), &RequirementSet::new());
        assert_eq!(report.completion_percentage, 100);
        assert!(report.matched.is_empty());
        assert!(report.missing.is_empty());
    }

    #[test]
    fn test_no_fields_means_everything_missing() {
        let reqs = requirements(&[("banco", true), ("ciudad", false)]);
        let report = reconciler(FuzzyMode::Substring).reconcile(&ExtractedFields::new(), &reqs);
        assert_eq!(report.completion_percentage, 0);
        assert_eq!(report.missing.len(), 2);
        assert_eq!(report.mandatory_missing, 1);
    }

    #[test]
    fn test_totals_always_add_up() {
        let reqs = requirements(&[
            ("banco", true),
            ("ciudad", false),
            ("numero_cuenta", false),
            ("fecha_inicio", true),
        ]);
        let f = fields(&[("banco", "x"), ("cuenta", "y"), ("fecha_inicio_contrato", "z")]);
        let report = reconciler(FuzzyMode::Substring).reconcile(&f, &reqs);
        assert_eq!(report.total(), reqs.len());
        assert_eq!(report.matched.len(), 3);
        assert_eq!(report.missing[0].canonical_name, "ciudad");
        assert_eq!(report.completion_percentage, 75);
    }

    #[test]
    fn test_matched_key_is_original_attribute_key() {
        let entity = Entity::new(Uuid::nil(), "proveedor")
            .with_attribute("Número de Identificación", "900123456");
        let lexicon = Arc::new(Lexicon::default());
        let extracted = FieldExtractor::new(lexicon.clone()).extract(&entity);
        let report = Reconciler::new(lexicon, MatchingConfig::default())
            .reconcile(&extracted, &requirements(&[("numero_identificacion", true)]));
        assert_eq!(report.matched[0].matched_key, "Número de Identificación");
        assert_eq!(report.matched[0].match_kind, MatchKind::Exact);
    }
}
