//! The reconciliation components wired over one shared lexicon.

use std::sync::Arc;

use lexis_core::{Entity, ReconciliationReport};

use crate::config::{ConfigResult, EngineConfig};
use crate::dictionary::Lexicon;
use crate::extract::FieldExtractor;
use crate::merge::Merger;
use crate::migrate::Migrator;
use crate::reconcile::Reconciler;
use crate::requirements::{RequirementCollector, RequirementSet};
use crate::suggest::SuggestionEngine;

/// Pure, I/O-free field engine.
#[derive(Debug, Clone)]
pub struct FieldEngine {
    config: EngineConfig,
    lexicon: Arc<Lexicon>,
    extractor: FieldExtractor,
    collector: RequirementCollector,
    reconciler: Reconciler,
    migrator: Migrator,
    suggester: SuggestionEngine,
    merger: Merger,
}

impl FieldEngine {
    /// Build an engine from a validated configuration.
    pub fn new(config: EngineConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: EngineConfig) -> Self {
        let lexicon = Arc::new(Lexicon::new(&config.dictionary));
        let extractor = FieldExtractor::new(lexicon.clone());
        let reconciler = Reconciler::new(lexicon.clone(), config.matching.clone());
        let suggester = SuggestionEngine::new(
            lexicon.clone(),
            extractor.clone(),
            reconciler.clone(),
            config.suggestion.clone(),
        );

        Self {
            collector: RequirementCollector::new(lexicon.clone()),
            migrator: Migrator::new(lexicon.clone(), config.migration.collision_policy),
            merger: Merger::new(lexicon.clone()),
            extractor,
            reconciler,
            suggester,
            lexicon,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    pub fn extractor(&self) -> &FieldExtractor {
        &self.extractor
    }

    pub fn collector(&self) -> &RequirementCollector {
        &self.collector
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn migrator(&self) -> &Migrator {
        &self.migrator
    }

    pub fn suggester(&self) -> &SuggestionEngine {
        &self.suggester
    }

    pub fn merger(&self) -> &Merger {
        &self.merger
    }

    /// Extract an entity's fields and reconcile them against `requirements`.
    pub fn reconcile_entity(
        &self,
        entity: &Entity,
        requirements: &RequirementSet,
    ) -> ReconciliationReport {
        let fields = self.extractor.extract(entity);
        let mut report = self.reconciler.reconcile(&fields, requirements);
        report.collisions = fields.collisions().to_vec();
        report
    }
}

impl Default for FieldEngine {
    fn default() -> Self {
        Self::build(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CollisionPolicy, FuzzyMode};
    use lexis_core::{AttributeMap, AttributeValue, Template, TemplateField, ValueType};
    use uuid::Uuid;

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = EngineConfig::default();
        config.matching.similarity_threshold = 2.0;
        assert!(FieldEngine::new(config).is_err());
    }

    #[test]
    fn test_config_flows_into_components() {
        let mut config = EngineConfig::default();
        config.migration.collision_policy = CollisionPolicy::Reject;
        config.matching.fuzzy_mode = FuzzyMode::Tokens;
        let engine = FieldEngine::new(config).unwrap();

        assert_eq!(engine.migrator().policy(), CollisionPolicy::Reject);
        assert!(!engine.reconciler().is_fuzzy_match("cuenta", "cuentahabiente"));

        let mut map = AttributeMap::new();
        map.insert("Banco", AttributeValue::text("a"));
        map.insert("banco", AttributeValue::text("b"));
        assert!(engine.migrator().migrate(&map).is_err());
    }

    #[test]
    fn test_custom_stop_words_apply_everywhere() {
        let mut config = EngineConfig::default();
        config.dictionary.stop_words.push("para".to_string());
        let engine = FieldEngine::new(config).unwrap();

        let template = Template::new(Uuid::nil(), "t", "cliente")
            .with_field(TemplateField::new("Cuenta para Pagos", ValueType::Text, true));
        let requirements = engine.collector().aggregate(&[template]);
        assert!(requirements.contains_key("cuenta_pagos"));

        let entity = Entity::new(Uuid::nil(), "cliente").with_attribute("cuenta pagos", "123");
        let report = engine.reconcile_entity(&entity, &requirements);
        assert_eq!(report.completion_percentage, 100);
    }

    #[test]
    fn test_reconcile_entity_reports_extraction_collisions() {
        let engine = FieldEngine::default();
        let template = Template::new(Uuid::nil(), "t", "proveedor")
            .with_field(TemplateField::new("Banco", ValueType::Text, true));
        let requirements = engine.collector().aggregate(&[template]);
        let entity = Entity::new(Uuid::nil(), "proveedor")
            .with_attribute("Banco", "Bogotá")
            .with_attribute("BANCO", "Occidente");

        let report = engine.reconcile_entity(&entity, &requirements);

        assert_eq!(report.completion_percentage, 100);
        assert_eq!(report.collisions.len(), 1);
        assert_eq!(report.collisions[0].kept_key, "Banco");
        assert_eq!(report.collisions[0].dropped[0].key, "BANCO");
        assert_eq!(
            report.collisions[0].dropped[0].value,
            AttributeValue::text("Occidente")
        );
    }
}
