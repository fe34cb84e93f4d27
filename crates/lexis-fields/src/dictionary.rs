//! Data-driven vocabulary tables for field reconciliation.
//!
//! Everything the engine knows about the contract domain's naming habits
//! lives here instead of in code: connector words dropped from names, the
//! canonical names of the fixed entity attributes, synonym groups and
//! name-fragment type hints. The defaults cover Spanish-language contract
//! records; operators extend them through the `[dictionary]` section of the
//! engine configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use lexis_core::{StandardAttribute, ValueType};

use crate::normalize::NameNormalizer;

/// Canonical name assigned to one fixed entity attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardFieldMapping {
    pub attribute: StandardAttribute,
    pub canonical_name: String,
}

/// Names that denote one concept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynonymGroup {
    pub canonical: String,
    pub aliases: Vec<String>,
}

/// Names containing `fragment` are expected to hold `value_type` values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeHint {
    pub fragment: String,
    pub value_type: ValueType,
}

/// Raw vocabulary tables, as written in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldDictionary {
    pub stop_words: Vec<String>,
    pub standard_fields: Vec<StandardFieldMapping>,
    pub synonyms: Vec<SynonymGroup>,
    pub type_hints: Vec<TypeHint>,
}

impl Default for FieldDictionary {
    fn default() -> Self {
        let standard = |attribute, canonical_name: &str| StandardFieldMapping {
            attribute,
            canonical_name: canonical_name.to_string(),
        };
        let synonyms = |canonical: &str, aliases: &[&str]| SynonymGroup {
            canonical: canonical.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        };
        let hint = |fragment: &str, value_type| TypeHint {
            fragment: fragment.to_string(),
            value_type,
        };

        Self {
            stop_words: ["de", "del", "la", "el", "los", "las", "y"]
                .iter()
                .map(|w| w.to_string())
                .collect(),
            standard_fields: vec![
                standard(StandardAttribute::LegalName, "razon_social"),
                standard(StandardAttribute::IdentificationNumber, "numero_identificacion"),
                standard(StandardAttribute::IdentificationType, "tipo_identificacion"),
                standard(StandardAttribute::Email, "correo_electronico"),
                standard(StandardAttribute::Phone, "telefono"),
                standard(StandardAttribute::Address, "direccion"),
                standard(StandardAttribute::City, "ciudad"),
                standard(StandardAttribute::Country, "pais"),
                standard(StandardAttribute::LegalRepresentative, "representante_legal"),
            ],
            synonyms: vec![
                synonyms(
                    "numero_identificacion",
                    &["nit", "cedula", "numero_documento", "documento_identidad"],
                ),
                synonyms("correo_electronico", &["email", "correo", "e_mail"]),
                synonyms("telefono", &["celular", "movil", "numero_contacto"]),
                synonyms("razon_social", &["nombre_empresa", "nombre_razon_social"]),
                synonyms("direccion", &["domicilio"]),
            ],
            type_hints: vec![
                hint("fecha", ValueType::Date),
                hint("correo", ValueType::Email),
                hint("email", ValueType::Email),
                hint("telefono", ValueType::Phone),
                hint("celular", ValueType::Phone),
                hint("valor", ValueType::Number),
                hint("monto", ValueType::Number),
                hint("salario", ValueType::Number),
                hint("numero_cuenta", ValueType::Number),
            ],
        }
    }
}

impl FieldDictionary {
    /// Check the tables for entries that can never apply.
    pub fn validate(&self) -> Result<(), String> {
        let normalizer = NameNormalizer::new(self.stop_words.iter().map(String::as_str));
        for mapping in &self.standard_fields {
            if normalizer.canonical(&mapping.canonical_name).is_empty() {
                return Err(format!(
                    "standard field {} has an empty canonical name",
                    mapping.attribute
                ));
            }
        }
        for group in &self.synonyms {
            if normalizer.compact(&group.canonical).is_empty() {
                return Err("synonym group with an empty canonical name".to_string());
            }
        }
        for hint in &self.type_hints {
            if normalizer.canonical(&hint.fragment).is_empty() {
                return Err(format!("type hint for {} has an empty fragment", hint.value_type));
            }
        }
        Ok(())
    }
}

/// Dictionary compiled for lookups: every name is pre-normalized.
#[derive(Debug, Clone)]
pub struct Lexicon {
    normalizer: NameNormalizer,
    standard_fields: Vec<(StandardAttribute, String)>,
    /// Compact alias -> compact concept name.
    synonyms: HashMap<String, String>,
    type_hints: Vec<(String, ValueType)>,
}

impl Lexicon {
    pub fn new(dictionary: &FieldDictionary) -> Self {
        let normalizer = NameNormalizer::new(dictionary.stop_words.iter().map(String::as_str));

        let standard_fields = dictionary
            .standard_fields
            .iter()
            .map(|m| (m.attribute, normalizer.canonical(&m.canonical_name)))
            .filter(|(_, name)| !name.is_empty())
            .collect();

        let mut synonyms = HashMap::new();
        for group in &dictionary.synonyms {
            let concept = normalizer.compact(&group.canonical);
            if concept.is_empty() {
                continue;
            }
            for alias in &group.aliases {
                let alias = normalizer.compact(alias);
                if !alias.is_empty() {
                    synonyms.insert(alias, concept.clone());
                }
            }
        }

        let type_hints: Vec<(String, ValueType)> = dictionary
            .type_hints
            .iter()
            .map(|h| (normalizer.canonical(&h.fragment), h.value_type))
            .filter(|(fragment, _)| !fragment.is_empty())
            .collect();

        debug!(
            subsystem = "fields",
            component = "lexicon",
            stop_words = dictionary.stop_words.len(),
            synonyms = synonyms.len(),
            type_hints = type_hints.len(),
            "Lexicon compiled"
        );

        Self {
            normalizer,
            standard_fields,
            synonyms,
            type_hints,
        }
    }

    pub fn normalizer(&self) -> &NameNormalizer {
        &self.normalizer
    }

    /// Canonical name of each fixed attribute, in extraction order.
    pub fn standard_fields(&self) -> &[(StandardAttribute, String)] {
        &self.standard_fields
    }

    /// Compact concept of a canonical name, resolved through synonym groups.
    pub fn concept(&self, canonical: &str) -> String {
        let compact = canonical.replace('_', "");
        match self.synonyms.get(&compact) {
            Some(concept) => concept.clone(),
            None => compact,
        }
    }

    /// Type suggested by the first hint whose fragment occurs in the name.
    pub fn hint_type(&self, canonical: &str) -> Option<ValueType> {
        self.type_hints
            .iter()
            .find(|(fragment, _)| canonical.contains(fragment.as_str()))
            .map(|(_, value_type)| *value_type)
    }
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::new(&FieldDictionary::default())
    }
}
