//! Consolidation of several attribute keys into one.

use std::sync::Arc;

use tracing::{debug, trace};

use lexis_core::{AttributeMap, AttributeValue, BulkMergeRequest, Error, MergeRequest, Result};

use crate::dictionary::Lexicon;

/// Merges attribute keys of one entity.
#[derive(Debug, Clone)]
pub struct Merger {
    lexicon: Arc<Lexicon>,
}

impl Merger {
    pub fn new(lexicon: Arc<Lexicon>) -> Self {
        Self { lexicon }
    }

    /// Canonical target key, or a validation error when it would be blank.
    pub fn target_key(&self, target_name: &str) -> Result<String> {
        let target = self.lexicon.normalizer().canonical(target_name);
        if target.is_empty() {
            return Err(Error::validation_with_keys(
                "merge target name is required",
                [target_name],
            ));
        }
        Ok(target)
    }

    /// Merge `request.keys` of `attributes` into the canonical target key.
    ///
    /// Fails with a validation error when fewer than two distinct keys are
    /// given, when any of them is absent, or when the target name is blank.
    /// The merged value is the explicit target value if provided, otherwise
    /// the first non-empty value in request order, otherwise the first key's.
    pub fn merge(&self, attributes: &AttributeMap, request: &MergeRequest) -> Result<AttributeMap> {
        let target = self.target_key(&request.target_name)?;

        let mut keys: Vec<&str> = Vec::with_capacity(request.keys.len());
        for key in &request.keys {
            if !keys.contains(&key.as_str()) {
                keys.push(key);
            }
        }
        if keys.len() < 2 {
            return Err(Error::validation_with_keys(
                "at least two distinct keys are required to merge",
                keys,
            ));
        }

        let absent: Vec<&str> = keys
            .iter()
            .copied()
            .filter(|key| !attributes.contains_key(key))
            .collect();
        if !absent.is_empty() {
            return Err(Error::validation_with_keys(
                "keys to merge are not present on the entity",
                absent,
            ));
        }

        let value = match &request.target_value {
            Some(value) => value.clone(),
            None => first_value(attributes, &keys),
        };

        let mut merged = attributes.clone();
        if request.remove_originals {
            for key in keys.iter().filter(|key| **key != target) {
                trace!(key, "Removing merged key");
                merged.remove(key);
            }
        }
        merged.insert(target.clone(), value);

        debug!(
            subsystem = "fields",
            component = "merge",
            target = %target,
            merged_keys = keys.len(),
            remove_originals = request.remove_originals,
            "Attribute keys merged"
        );
        Ok(merged)
    }

    /// Normalized raw names of a cohort-wide merge, deduplicated in request
    /// order. The order decides which member value survives the merge.
    pub fn bulk_targets(&self, request: &BulkMergeRequest) -> Result<Vec<String>> {
        self.target_key(&request.target_name)?;

        let normalizer = self.lexicon.normalizer();
        let canonical: Vec<String> = request
            .raw_names
            .iter()
            .map(|raw| normalizer.canonical(raw))
            .filter(|name| !name.is_empty())
            .collect();
        if canonical.len() < 2 {
            return Err(Error::validation_with_keys(
                "at least two names are required for a bulk merge",
                request.raw_names.iter().map(String::as_str),
            ));
        }

        // Spelling variants of one name still merge with each other.
        let mut names: Vec<String> = Vec::with_capacity(canonical.len());
        for name in canonical {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Merge every key whose canonical name is in `targets`.
    ///
    /// Matched keys are ordered by the position of their name in `targets`,
    /// then by attribute order. Returns `None` when fewer than two keys of
    /// this map match.
    pub fn merge_matching(
        &self,
        attributes: &AttributeMap,
        targets: &[String],
        target_name: &str,
        remove_originals: bool,
    ) -> Result<Option<AttributeMap>> {
        let normalizer = self.lexicon.normalizer();
        let mut matched: Vec<(usize, &str)> = attributes
            .keys()
            .filter_map(|key| {
                let canonical = normalizer.canonical(key);
                targets
                    .iter()
                    .position(|name| *name == canonical)
                    .map(|rank| (rank, key))
            })
            .collect();
        if matched.len() < 2 {
            return Ok(None);
        }
        // Stable sort keeps attribute order among keys of the same name.
        matched.sort_by_key(|(rank, _)| *rank);

        let request = MergeRequest {
            keys: matched.into_iter().map(|(_, key)| key.to_string()).collect(),
            target_name: target_name.to_string(),
            target_value: None,
            remove_originals,
        };
        self.merge(attributes, &request).map(Some)
    }
}

/// First non-empty value among `keys`, else the first key's value.
fn first_value(attributes: &AttributeMap, keys: &[&str]) -> AttributeValue {
    keys.iter()
        .filter_map(|key| attributes.get(key))
        .find(|value| !value.is_empty())
        .or_else(|| keys.first().and_then(|key| attributes.get(key)))
        .cloned()
        .unwrap_or_else(|| AttributeValue::text(""))
}
