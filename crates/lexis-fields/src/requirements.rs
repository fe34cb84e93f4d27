//! Aggregation of template field declarations into requirements.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};
use uuid::Uuid;

use lexis_core::{Requirement, Result, Template, TemplateRepository, ValueType};

use crate::dictionary::Lexicon;

/// Requirements keyed by canonical name.
pub type RequirementSet = BTreeMap<String, Requirement>;

/// Collects the deduplicated requirements of a third-party type.
#[derive(Debug, Clone)]
pub struct RequirementCollector {
    lexicon: Arc<Lexicon>,
}

impl RequirementCollector {
    pub fn new(lexicon: Arc<Lexicon>) -> Self {
        Self { lexicon }
    }

    /// Aggregate the fields declared by a set of templates.
    ///
    /// The result does not depend on the order of `templates`: they are
    /// visited by ascending id, so label and type come from the lowest-id
    /// declaring template, provenance is sorted, and `mandatory` is OR-ed.
    /// Inactive templates are ignored.
    pub fn aggregate(&self, templates: &[Template]) -> RequirementSet {
        let mut ordered: Vec<&Template> = templates.iter().filter(|t| t.active).collect();
        ordered.sort_by_key(|t| t.id);

        let normalizer = self.lexicon.normalizer();
        let mut requirements = RequirementSet::new();

        for template in ordered {
            for field in &template.fields {
                let canonical = normalizer.canonical(&field.name);
                if canonical.is_empty() {
                    debug!(
                        subsystem = "fields",
                        component = "requirements",
                        template_id = %template.id,
                        field = %field.name,
                        "Skipping field without a canonical name"
                    );
                    continue;
                }

                match requirements.get_mut(&canonical) {
                    Some(existing) => {
                        if !existing.source_templates.contains(&template.id) {
                            existing.source_templates.push(template.id);
                        }
                        existing.mandatory |= field.mandatory;
                    }
                    None => {
                        let value_type = self.effective_type(&canonical, field.value_type);
                        requirements.insert(
                            canonical.clone(),
                            Requirement {
                                canonical_name: canonical,
                                label: field.display_label().to_string(),
                                value_type,
                                mandatory: field.mandatory,
                                source_templates: vec![template.id],
                            },
                        );
                    }
                }
            }
        }

        requirements
    }

    /// Load active templates for a type and aggregate their fields.
    pub async fn collect(
        &self,
        templates: &dyn TemplateRepository,
        third_party_type: &str,
        company_id: Uuid,
    ) -> Result<RequirementSet> {
        let start = Instant::now();
        let loaded = templates
            .find_active_by_type(third_party_type, company_id)
            .await?;
        let requirements = self.aggregate(&loaded);

        info!(
            subsystem = "fields",
            component = "requirements",
            op = "collect",
            third_party_type,
            %company_id,
            template_count = loaded.len(),
            requirement_count = requirements.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Requirements collected"
        );
        Ok(requirements)
    }

    /// Declared type, upgraded from plain text when the name hints otherwise.
    fn effective_type(&self, canonical: &str, declared: ValueType) -> ValueType {
        match declared {
            ValueType::Text => self.lexicon.hint_type(canonical).unwrap_or(ValueType::Text),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexis_core::TemplateField;

    fn collector() -> RequirementCollector {
        RequirementCollector::new(Arc::new(Lexicon::default()))
    }

    fn template(name: &str, fields: Vec<TemplateField>) -> Template {
        let mut t = Template::new(Uuid::nil(), name, "proveedor");
        t.fields = fields;
        t
    }

    #[test]
    fn test_deduplicates_by_canonical_name() {
        let a = template(
            "Contrato marco",
            vec![TemplateField::new("Número de Identificación", ValueType::Text, false)],
        );
        let b = template(
            "Orden de compra",
            vec![TemplateField::new("numero_identificacion", ValueType::Text, true)],
        );

        let requirements = collector().aggregate(&[a.clone(), b.clone()]);
        assert_eq!(requirements.len(), 1);
        let req = &requirements["numero_identificacion"];
        assert!(req.mandatory, "mandatory must be OR-aggregated");
        assert_eq!(req.source_templates.len(), 2);
        assert!(req.source_templates.contains(&a.id));
        assert!(req.source_templates.contains(&b.id));
    }

    #[test]
    fn test_aggregation_is_order_independent() {
        let a = template(
            "A",
            vec![
                TemplateField::new("Representante Legal", ValueType::Text, true),
                TemplateField::new("Banco", ValueType::Text, false),
            ],
        );
        let b = template(
            "B",
            vec![
                TemplateField::new("representante-legal", ValueType::Text, false),
                TemplateField::new("Fecha de Inicio", ValueType::Text, false),
            ],
        );
        let c = template("C", vec![TemplateField::new("BANCO", ValueType::Text, true)]);

        let forward = collector().aggregate(&[a.clone(), b.clone(), c.clone()]);
        let backward = collector().aggregate(&[c, b, a]);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_label_comes_from_lowest_template_id() {
        let mut first = template("first", vec![TemplateField::new("Banco", ValueType::Text, false)]);
        first.id = Uuid::from_u128(1);
        let mut second = template("second", vec![TemplateField::new("banco", ValueType::Text, false)]);
        second.id = Uuid::from_u128(2);
        second.fields[0].label = "Entidad bancaria".to_string();

        let requirements = collector().aggregate(&[second, first]);
        assert_eq!(requirements["banco"].label, "Banco");
    }

    #[test]
    fn test_inactive_templates_are_ignored() {
        let mut inactive = template("old", vec![TemplateField::new("Fax", ValueType::Text, true)]);
        inactive.active = false;
        assert!(collector().aggregate(&[inactive]).is_empty());
    }

    #[test]
    fn test_blank_field_names_are_skipped() {
        let t = template("t", vec![TemplateField::new(" / ", ValueType::Text, true)]);
        assert!(collector().aggregate(&[t]).is_empty());
    }

    #[test]
    fn test_type_hint_upgrades_plain_text() {
        let t = template(
            "t",
            vec![
                TemplateField::new("Fecha de Inicio", ValueType::Text, false),
                TemplateField::new("Valor del Contrato", ValueType::Text, false),
                TemplateField::new("Fecha Firma", ValueType::Boolean, false),
            ],
        );
        let requirements = collector().aggregate(&[t]);
        assert_eq!(requirements["fecha_inicio"].value_type, ValueType::Date);
        assert_eq!(requirements["valor_contrato"].value_type, ValueType::Number);
        assert_eq!(requirements["fecha_firma"].value_type, ValueType::Boolean);
    }

    #[test]
    fn test_repeat_field_in_same_template_lists_it_once() {
        let t = template(
            "t",
            vec![
                TemplateField::new("Banco", ValueType::Text, false),
                TemplateField::new("banco", ValueType::Text, true),
            ],
        );
        let requirements = collector().aggregate(&[t]);
        assert_eq!(requirements["banco"].source_templates.len(), 1);
        assert!(requirements["banco"].mandatory);
    }
}
