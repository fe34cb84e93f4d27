//! Uniform `canonical name → value` view of an entity.
//!
//! Fixed attributes come first, in dictionary order, then the free-form
//! attribute map in insertion order. A custom attribute overwrites a fixed
//! attribute with the same canonical name: custom values are operator edits.

use std::sync::Arc;

use tracing::{trace, warn};

use lexis_core::{
    AttributeValue, CollisionWarning, DroppedAttribute, Entity, ExtractedField, FieldSource,
};

use crate::dictionary::Lexicon;

/// Ordered collection of extracted fields keyed by canonical name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedFields {
    entries: Vec<(String, ExtractedField)>,
    collisions: Vec<CollisionWarning>,
}

impl ExtractedFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, canonical: &str) -> Option<&ExtractedField> {
        self.entries
            .iter()
            .find(|(name, _)| name == canonical)
            .map(|(_, field)| field)
    }

    pub fn contains(&self, canonical: &str) -> bool {
        self.get(canonical).is_some()
    }

    /// Insert or replace in place.
    pub fn insert(&mut self, canonical: String, field: ExtractedField) {
        match self.entries.iter_mut().find(|(name, _)| *name == canonical) {
            Some((_, slot)) => *slot = field,
            None => self.entries.push((canonical, field)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ExtractedField)> {
        self.entries.iter().map(|(name, field)| (name.as_str(), field))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Custom attributes dropped because another key claimed their name.
    pub fn collisions(&self) -> &[CollisionWarning] {
        &self.collisions
    }

    /// Record that `dropped` lost `canonical` to `kept`. Drops on the same
    /// canonical name accumulate in one warning.
    fn record_collision(
        &mut self,
        canonical: &str,
        kept: &ExtractedField,
        dropped: DroppedAttribute,
    ) {
        match self
            .collisions
            .iter_mut()
            .find(|w| w.canonical_key == canonical)
        {
            Some(warning) => {
                warning.kept_key = kept.original_key.clone();
                warning.kept_value = kept.value.clone();
                warning.dropped.push(dropped);
            }
            None => self.collisions.push(CollisionWarning {
                canonical_key: canonical.to_string(),
                kept_key: kept.original_key.clone(),
                kept_value: kept.value.clone(),
                dropped: vec![dropped],
            }),
        }
    }
}

/// Builds the canonical view of an entity's fixed and free-form attributes.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    lexicon: Arc<Lexicon>,
}

impl FieldExtractor {
    pub fn new(lexicon: Arc<Lexicon>) -> Self {
        Self { lexicon }
    }

    /// Extract every non-empty field of an entity.
    ///
    /// When two custom keys share a canonical name, the key already written
    /// in canonical form wins; otherwise the first one does. Every dropped
    /// value is reported in [`ExtractedFields::collisions`].
    pub fn extract(&self, entity: &Entity) -> ExtractedFields {
        let mut fields = ExtractedFields::new();

        for (attribute, canonical) in self.lexicon.standard_fields() {
            let Some(value) = entity.standard.get(*attribute) else {
                continue;
            };
            if value.trim().is_empty() {
                continue;
            }
            fields.insert(
                canonical.clone(),
                ExtractedField {
                    value: AttributeValue::text(value),
                    source: FieldSource::Standard,
                    original_key: attribute.as_str().to_string(),
                },
            );
        }

        let normalizer = self.lexicon.normalizer();
        for (key, value) in entity.attributes.iter() {
            if value.is_empty() {
                continue;
            }
            let canonical = normalizer.canonical(key);
            if canonical.is_empty() {
                trace!(entity_id = %entity.id, key, "Attribute key has no canonical form");
                continue;
            }

            let field = ExtractedField {
                value: value.clone(),
                source: FieldSource::Custom,
                original_key: key.to_string(),
            };

            if let Some(existing) = fields.get(&canonical).cloned() {
                if existing.source == FieldSource::Custom {
                    let replace = key == canonical && existing.original_key != canonical;
                    let (kept, lost) = if replace {
                        (&field, &existing)
                    } else {
                        (&existing, &field)
                    };
                    warn!(
                        subsystem = "fields",
                        component = "extract",
                        entity_id = %entity.id,
                        canonical = %canonical,
                        kept = %kept.original_key,
                        dropped = %lost.original_key,
                        "Custom attributes share a canonical name"
                    );
                    let dropped = DroppedAttribute {
                        key: lost.original_key.clone(),
                        value: lost.value.clone(),
                    };
                    fields.record_collision(&canonical, kept, dropped);
                    if !replace {
                        continue;
                    }
                }
            }

            fields.insert(canonical, field);
        }

        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexis_core::StandardAttribute;
    use uuid::Uuid;

    fn extractor() -> FieldExtractor {
        FieldExtractor::new(Arc::new(Lexicon::default()))
    }

    #[test]
    fn test_extract_standard_and_custom() {
        let entity = Entity::new(Uuid::nil(), "proveedor")
            .with_standard(StandardAttribute::LegalName, "Acme SA")
            .with_standard(StandardAttribute::Email, "  ")
            .with_attribute("Número de Cuenta", "123-45")
            .with_attribute("Banco", "");

        let fields = extractor().extract(&entity);
        let names: Vec<&str> = fields.names().collect();
        assert_eq!(names, vec!["razon_social", "numero_cuenta"]);

        let legal = fields.get("razon_social").unwrap();
        assert_eq!(legal.source, FieldSource::Standard);
        assert_eq!(legal.original_key, "legal_name");

        let account = fields.get("numero_cuenta").unwrap();
        assert_eq!(account.source, FieldSource::Custom);
        assert_eq!(account.original_key, "Número de Cuenta");
    }

    #[test]
    fn test_custom_overrides_standard() {
        let entity = Entity::new(Uuid::nil(), "proveedor")
            .with_standard(StandardAttribute::LegalName, "Acme SA")
            .with_attribute("Razón Social", "Acme Colombia SAS");

        let fields = extractor().extract(&entity);
        assert_eq!(fields.len(), 1);
        let legal = fields.get("razon_social").unwrap();
        assert_eq!(legal.source, FieldSource::Custom);
        assert_eq!(legal.value, AttributeValue::text("Acme Colombia SAS"));
    }

    #[test]
    fn test_custom_collision_prefers_canonical_key() {
        let entity = Entity::new(Uuid::nil(), "cliente")
            .with_attribute("Correo Electrónico", "a@b.com")
            .with_attribute("correo_electronico", "old@b.com");

        let fields = extractor().extract(&entity);
        let email = fields.get("correo_electronico").unwrap();
        assert_eq!(email.original_key, "correo_electronico");
        assert_eq!(email.value, AttributeValue::text("old@b.com"));

        assert_eq!(
            fields.collisions(),
            &[CollisionWarning {
                canonical_key: "correo_electronico".to_string(),
                kept_key: "correo_electronico".to_string(),
                kept_value: AttributeValue::text("old@b.com"),
                dropped: vec![DroppedAttribute {
                    key: "Correo Electrónico".to_string(),
                    value: AttributeValue::text("a@b.com"),
                }],
            }]
        );
    }

    #[test]
    fn test_custom_collision_otherwise_keeps_first() {
        let entity = Entity::new(Uuid::nil(), "cliente")
            .with_attribute("Banco ", "Bogotá")
            .with_attribute("BANCO", "Occidente");

        let fields = extractor().extract(&entity);
        assert_eq!(fields.get("banco").unwrap().original_key, "Banco ");

        let warning = &fields.collisions()[0];
        assert_eq!(warning.kept_key, "Banco ");
        assert_eq!(warning.dropped[0].key, "BANCO");
        assert_eq!(warning.dropped[0].value, AttributeValue::text("Occidente"));
    }

    #[test]
    fn test_repeated_collisions_share_one_warning() {
        let entity = Entity::new(Uuid::nil(), "cliente")
            .with_attribute("Banco", "Bogotá")
            .with_attribute("BANCO", "Occidente")
            .with_attribute("banco", "Popular");

        let fields = extractor().extract(&entity);
        assert_eq!(fields.get("banco").unwrap().value, AttributeValue::text("Popular"));

        assert_eq!(fields.collisions().len(), 1);
        let warning = &fields.collisions()[0];
        assert_eq!(warning.kept_key, "banco");
        assert_eq!(warning.kept_value, AttributeValue::text("Popular"));
        let dropped: Vec<&str> = warning.dropped.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(dropped, vec!["BANCO", "Banco"]);
    }

    #[test]
    fn test_custom_over_standard_is_not_a_collision() {
        let entity = Entity::new(Uuid::nil(), "proveedor")
            .with_standard(StandardAttribute::LegalName, "Acme SA")
            .with_attribute("Razón Social", "Acme Colombia SAS");

        assert!(extractor().extract(&entity).collisions().is_empty());
    }

    #[test]
    fn test_non_text_values_are_kept() {
        let entity = Entity::new(Uuid::nil(), "empleado")
            .with_attribute("Activo", true)
            .with_attribute("Salario", 2_500_000.0);

        let fields = extractor().extract(&entity);
        assert_eq!(fields.get("activo").unwrap().value, AttributeValue::Boolean(true));
        assert_eq!(
            fields.get("salario").unwrap().value,
            AttributeValue::Number(2_500_000.0)
        );
    }

    #[test]
    fn test_empty_entity() {
        let entity = Entity::new(Uuid::nil(), "empleado");
        assert!(extractor().extract(&entity).is_empty());
    }
}
