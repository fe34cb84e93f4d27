//! Field suggestions learned from an entity's cohort.

use std::sync::Arc;

use tracing::debug;

use lexis_core::{AttributeValue, Entity, Suggestion, ValueType};

use crate::config::SuggestionConfig;
use crate::dictionary::Lexicon;
use crate::extract::FieldExtractor;
use crate::reconcile::Reconciler;

#[derive(Debug)]
struct Tally {
    canonical: String,
    frequency: usize,
    samples: Vec<AttributeValue>,
    /// Shared type of every observed value, `None` once types disagree.
    observed_type: Option<ValueType>,
    mixed: bool,
}

impl Tally {
    fn new(canonical: &str) -> Self {
        Self {
            canonical: canonical.to_string(),
            frequency: 0,
            samples: Vec::new(),
            observed_type: None,
            mixed: false,
        }
    }

    fn observe(&mut self, value: &AttributeValue, max_samples: usize) {
        self.frequency += 1;
        if self.samples.len() < max_samples && !self.samples.contains(value) {
            self.samples.push(value.clone());
        }
        match self.observed_type {
            None if !self.mixed => self.observed_type = Some(value.value_type()),
            Some(t) if t != value.value_type() => {
                self.observed_type = None;
                self.mixed = true;
            }
            _ => {}
        }
    }
}

/// Suggests fields that most of an entity's cohort carries.
#[derive(Debug, Clone)]
pub struct SuggestionEngine {
    lexicon: Arc<Lexicon>,
    extractor: FieldExtractor,
    reconciler: Reconciler,
    config: SuggestionConfig,
}

impl SuggestionEngine {
    pub fn new(
        lexicon: Arc<Lexicon>,
        extractor: FieldExtractor,
        reconciler: Reconciler,
        config: SuggestionConfig,
    ) -> Self {
        Self {
            lexicon,
            extractor,
            reconciler,
            config,
        }
    }

    /// Fields carried by at least `min_occurrences` cohort members and not
    /// already present on `entity`, most frequent first.
    ///
    /// The entity itself is excluded from the cohort if the caller left it in.
    /// A field the entity already has under an equivalent name (any matching
    /// tier) is never suggested.
    pub fn suggest(&self, entity: &Entity, cohort: &[Entity]) -> Vec<Suggestion> {
        let members: Vec<&Entity> = cohort.iter().filter(|m| m.id != entity.id).collect();
        let cohort_size = members.len();
        if cohort_size == 0 {
            return Vec::new();
        }

        let own = self.extractor.extract(entity);
        let mut tallies: Vec<Tally> = Vec::new();

        for member in members {
            let fields = self.extractor.extract(member);
            for (canonical, field) in fields.iter() {
                if self.reconciler.find_match(canonical, &own).is_some() {
                    continue;
                }
                let index = match tallies.iter().position(|t| t.canonical == canonical) {
                    Some(index) => index,
                    None => {
                        tallies.push(Tally::new(canonical));
                        tallies.len() - 1
                    }
                };
                tallies[index].observe(&field.value, self.config.max_sample_values);
            }
        }

        let mut suggestions: Vec<Suggestion> = tallies
            .into_iter()
            .filter(|t| t.frequency >= self.config.min_occurrences)
            .map(|t| self.to_suggestion(t, cohort_size))
            .collect();
        suggestions.sort_by(|a, b| {
            b.frequency
                .cmp(&a.frequency)
                .then_with(|| a.canonical_name.cmp(&b.canonical_name))
        });

        debug!(
            subsystem = "fields",
            component = "suggest",
            entity_id = %entity.id,
            cohort_size,
            suggestions = suggestions.len(),
            "Suggestions computed"
        );
        suggestions
    }

    fn to_suggestion(&self, tally: Tally, cohort_size: usize) -> Suggestion {
        let percentage = (100.0 * tally.frequency as f64 / cohort_size as f64).round() as u8;
        let recommended =
            tally.frequency as f64 >= self.config.recommend_ratio * cohort_size as f64;
        let value_type = self
            .lexicon
            .hint_type(&tally.canonical)
            .or(tally.observed_type)
            .unwrap_or_default();

        Suggestion {
            canonical_name: tally.canonical,
            frequency: tally.frequency,
            cohort_size,
            percentage,
            sample_values: tally.samples,
            recommended,
            value_type,
        }
    }
}
