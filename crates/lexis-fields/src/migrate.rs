//! Rewriting free-form attribute keys into canonical form.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use lexis_core::{
    AttributeMap, AttributeValue, CollisionWarning, DroppedAttribute, Error, MigrationOutcome,
    RenamedKey, Result,
};

use crate::config::CollisionPolicy;
use crate::dictionary::Lexicon;

/// Keys of the input map sharing one canonical name, in input order.
struct KeyGroup<'a> {
    canonical: String,
    members: Vec<(&'a str, &'a AttributeValue)>,
}

impl KeyGroup<'_> {
    /// Index of the member whose value survives.
    fn survivor(&self, policy: CollisionPolicy) -> usize {
        match policy {
            CollisionPolicy::KeepCanonical => self
                .members
                .iter()
                .position(|(key, _)| *key == self.canonical)
                .unwrap_or(0),
            CollisionPolicy::KeepFirst | CollisionPolicy::Reject => 0,
        }
    }
}

enum Slot<'a> {
    Group(usize),
    Untouched(&'a str, &'a AttributeValue),
}

/// Renames attribute keys to their canonical names.
#[derive(Debug, Clone)]
pub struct Migrator {
    lexicon: Arc<Lexicon>,
    policy: CollisionPolicy,
}

impl Migrator {
    pub fn new(lexicon: Arc<Lexicon>, policy: CollisionPolicy) -> Self {
        Self { lexicon, policy }
    }

    pub fn policy(&self) -> CollisionPolicy {
        self.policy
    }

    /// Compute the canonical form of an attribute map.
    ///
    /// Each canonical key lands at the position of the first input key that
    /// produced it. Every renamed key is listed in the diff, including keys
    /// whose value lost a collision. Keys without a canonical form are kept
    /// verbatim and reported as skipped. Applying the migration to its own
    /// output yields an empty diff.
    ///
    /// Returns a validation error naming the colliding keys when the policy
    /// is [`CollisionPolicy::Reject`].
    pub fn migrate(&self, attributes: &AttributeMap) -> Result<MigrationOutcome> {
        let normalizer = self.lexicon.normalizer();
        let mut groups: Vec<KeyGroup<'_>> = Vec::new();
        let mut slots: Vec<Slot<'_>> = Vec::new();
        let mut skipped = Vec::new();

        for (key, value) in attributes.iter() {
            let canonical = normalizer.canonical(key);
            if canonical.is_empty() {
                warn!(
                    subsystem = "fields",
                    component = "migrate",
                    key,
                    "Attribute key has no canonical form, leaving it untouched"
                );
                skipped.push(key.to_string());
                slots.push(Slot::Untouched(key, value));
                continue;
            }

            match groups.iter_mut().position(|g| g.canonical == canonical) {
                Some(index) => groups[index].members.push((key, value)),
                None => {
                    groups.push(KeyGroup {
                        canonical,
                        members: vec![(key, value)],
                    });
                    slots.push(Slot::Group(groups.len() - 1));
                }
            }
        }

        if self.policy == CollisionPolicy::Reject {
            let colliding: Vec<String> = groups
                .iter()
                .filter(|g| g.members.len() > 1)
                .flat_map(|g| g.members.iter().map(|(key, _)| key.to_string()))
                .collect();
            if !colliding.is_empty() {
                return Err(Error::validation_with_keys(
                    "attribute keys normalize to the same canonical name",
                    colliding,
                ));
            }
        }

        let mut diff = Vec::new();
        let mut collisions = Vec::new();
        for group in &groups {
            for (key, value) in &group.members {
                if *key != group.canonical {
                    trace!(key, canonical = %group.canonical, "Staging rename");
                    diff.push(RenamedKey {
                        old_key: key.to_string(),
                        new_key: group.canonical.clone(),
                        value: (*value).clone(),
                    });
                }
            }

            if group.members.len() > 1 {
                let kept = group.survivor(self.policy);
                let (kept_key, kept_value) = group.members[kept];
                let dropped: Vec<DroppedAttribute> = group
                    .members
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != kept)
                    .map(|(_, (key, value))| DroppedAttribute {
                        key: key.to_string(),
                        value: (*value).clone(),
                    })
                    .collect();
                warn!(
                    subsystem = "fields",
                    component = "migrate",
                    canonical = %group.canonical,
                    kept = kept_key,
                    dropped = dropped.len(),
                    policy = %self.policy,
                    "Attribute keys collide on one canonical name"
                );
                collisions.push(CollisionWarning {
                    canonical_key: group.canonical.clone(),
                    kept_key: kept_key.to_string(),
                    kept_value: kept_value.clone(),
                    dropped,
                });
            }
        }

        let mut migrated = AttributeMap::new();
        for slot in slots {
            match slot {
                Slot::Group(index) => {
                    let group = &groups[index];
                    let (_, value) = group.members[group.survivor(self.policy)];
                    migrated.insert(group.canonical.clone(), value.clone());
                }
                Slot::Untouched(key, value) => {
                    migrated.insert(key, value.clone());
                }
            }
        }

        debug!(
            subsystem = "fields",
            component = "migrate",
            renamed_count = diff.len(),
            collision_count = collisions.len(),
            skipped = skipped.len(),
            "Attribute map migrated"
        );

        Ok(MigrationOutcome {
            attributes: migrated,
            diff,
            collisions,
            skipped,
        })
    }
}
