//! Repository-backed field operations.
//!
//! The engine itself performs no I/O. `FieldService` loads entities and
//! templates through the repository traits, runs the engine and persists
//! the results.
//!
//! ## Bulk operations
//!
//! `migrate_all` and `bulk_merge` fan out one future per cohort member with
//! bounded concurrency (`[bulk] concurrency`). Members do not interact, and
//! the summary is assembled only after every member has been handled.
//! [`BulkControl`] is checked before each member; members not started when
//! cancellation is observed are left untouched and the summary is flagged
//! `cancelled`. The first persistence error aborts the run and propagates.

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{error, info, warn};
use uuid::Uuid;

use lexis_core::{
    BulkMergeRequest, BulkMergeSummary, CohortCompletion, Entity, EntityCompletion,
    EntityRepository, Error, MergeRequest, MigrationOutcome, MigrationSummary,
    ReconciliationReport, Result, Suggestion, TemplateRepository,
};

use crate::bulk::BulkControl;
use crate::engine::FieldEngine;
use crate::requirements::RequirementSet;

/// Per-member result of a cohort migration.
enum MigrateOutcome {
    /// Not started because the run was cancelled.
    Cancelled,
    Migrated { renamed: usize, collisions: usize },
    Unchanged,
    Rejected(Uuid),
}

/// Per-member result of a cohort merge.
enum MergeOutcome {
    Cancelled,
    Merged(Uuid),
    NotApplicable,
}

/// Field reconciliation over repository-backed entities and templates.
#[derive(Clone)]
pub struct FieldService {
    entities: Arc<dyn EntityRepository>,
    templates: Arc<dyn TemplateRepository>,
    engine: Arc<FieldEngine>,
}

impl FieldService {
    pub fn new(
        entities: Arc<dyn EntityRepository>,
        templates: Arc<dyn TemplateRepository>,
        engine: FieldEngine,
    ) -> Self {
        Self {
            entities,
            templates,
            engine: Arc::new(engine),
        }
    }

    pub fn engine(&self) -> &FieldEngine {
        &self.engine
    }

    async fn load(&self, entity_id: Uuid) -> Result<Entity> {
        self.entities
            .find_by_id(entity_id)
            .await?
            .ok_or(Error::EntityNotFound(entity_id))
    }

    /// Deduplicated requirements of every active template of a type.
    pub async fn requirements(
        &self,
        third_party_type: &str,
        company_id: Uuid,
    ) -> Result<RequirementSet> {
        self.engine
            .collector()
            .collect(self.templates.as_ref(), third_party_type, company_id)
            .await
    }

    /// Completion report of one entity against its type's requirements.
    pub async fn analyze(&self, entity_id: Uuid) -> Result<ReconciliationReport> {
        let start = Instant::now();
        let entity = self.load(entity_id).await?;
        let requirements = self
            .requirements(&entity.third_party_type, entity.company_id)
            .await?;
        let report = self.engine.reconcile_entity(&entity, &requirements);

        info!(
            subsystem = "fields",
            component = "service",
            op = "analyze",
            %entity_id,
            third_party_type = %entity.third_party_type,
            requirement_count = requirements.len(),
            matched_count = report.matched.len(),
            missing_count = report.missing.len(),
            completion = report.completion_percentage,
            duration_ms = start.elapsed().as_millis() as u64,
            "Entity analyzed"
        );
        Ok(report)
    }

    /// Completion of every entity of a type, with the cohort average.
    pub async fn cohort_completion(
        &self,
        third_party_type: &str,
        company_id: Uuid,
    ) -> Result<CohortCompletion> {
        let start = Instant::now();
        let requirements = self.requirements(third_party_type, company_id).await?;
        let cohort = self
            .entities
            .find_by_type_and_company(third_party_type, company_id)
            .await?;

        let entities: Vec<EntityCompletion> = cohort
            .iter()
            .map(|entity| {
                let report = self.engine.reconcile_entity(entity, &requirements);
                EntityCompletion {
                    entity_id: entity.id,
                    legal_name: entity.standard.legal_name.clone(),
                    completion_percentage: report.completion_percentage,
                    missing_count: report.missing.len(),
                    mandatory_missing: report.mandatory_missing,
                }
            })
            .collect();

        let average_completion = if entities.is_empty() {
            100
        } else {
            let sum: u64 = entities.iter().map(|e| e.completion_percentage as u64).sum();
            (sum as f64 / entities.len() as f64).round() as u8
        };

        info!(
            subsystem = "fields",
            component = "service",
            op = "cohort_completion",
            third_party_type,
            %company_id,
            cohort_size = entities.len(),
            requirement_count = requirements.len(),
            average_completion,
            duration_ms = start.elapsed().as_millis() as u64,
            "Cohort completion computed"
        );

        Ok(CohortCompletion {
            third_party_type: third_party_type.to_string(),
            requirement_count: requirements.len(),
            entities,
            average_completion,
        })
    }

    /// Rewrite one entity's attribute keys into canonical form.
    ///
    /// The entity is saved only when something changed and `dry_run` is off.
    pub async fn migrate_entity(&self, entity_id: Uuid, dry_run: bool) -> Result<MigrationOutcome> {
        let mut entity = self.load(entity_id).await?;
        let outcome = self.engine.migrator().migrate(&entity.attributes)?;

        if !dry_run && !outcome.is_noop() {
            entity.attributes = outcome.attributes.clone();
            self.entities.save(entity).await?;
        }

        info!(
            subsystem = "fields",
            component = "service",
            op = "migrate_entity",
            %entity_id,
            renamed_count = outcome.diff.len(),
            collision_count = outcome.collisions.len(),
            dry_run,
            "Entity attributes migrated"
        );
        Ok(outcome)
    }

    /// Migrate every entity of a type.
    pub async fn migrate_all(
        &self,
        third_party_type: &str,
        company_id: Uuid,
        dry_run: bool,
        control: &BulkControl,
    ) -> Result<MigrationSummary> {
        let start = Instant::now();
        let cohort = self
            .entities
            .find_by_type_and_company(third_party_type, company_id)
            .await?;
        control.begin(cohort.len());

        let total = cohort.len();
        let outcomes: Vec<(usize, MigrateOutcome)> = stream::iter(cohort.into_iter().enumerate())
            .map(|(index, entity)| async move {
                self.migrate_member(entity, dry_run, control)
                    .await
                    .map(|outcome| (index, outcome))
            })
            .buffer_unordered(self.concurrency())
            .try_collect()
            .await?;

        let mut summary = MigrationSummary {
            total,
            dry_run,
            ..MigrationSummary::default()
        };
        for (_, outcome) in sorted(outcomes) {
            match outcome {
                MigrateOutcome::Cancelled => summary.cancelled = true,
                MigrateOutcome::Migrated { renamed, collisions } => {
                    summary.processed += 1;
                    summary.migrated += 1;
                    summary.renamed_keys += renamed;
                    summary.collisions += collisions;
                }
                MigrateOutcome::Unchanged => {
                    summary.processed += 1;
                    summary.unchanged += 1;
                }
                MigrateOutcome::Rejected(id) => {
                    summary.processed += 1;
                    summary.rejected.push(id);
                }
            }
        }

        if summary.cancelled {
            warn!(
                subsystem = "fields",
                component = "service",
                op = "migrate_all",
                processed = summary.processed,
                total,
                "Bulk migration cancelled"
            );
        }
        info!(
            subsystem = "fields",
            component = "service",
            op = "migrate_all",
            third_party_type,
            %company_id,
            total,
            migrated = summary.migrated,
            unchanged = summary.unchanged,
            rejected = summary.rejected.len(),
            renamed_count = summary.renamed_keys,
            collision_count = summary.collisions,
            dry_run,
            duration_ms = start.elapsed().as_millis() as u64,
            "Bulk migration complete"
        );
        Ok(summary)
    }

    async fn migrate_member(
        &self,
        mut entity: Entity,
        dry_run: bool,
        control: &BulkControl,
    ) -> Result<MigrateOutcome> {
        if control.is_cancelled() {
            return Ok(MigrateOutcome::Cancelled);
        }

        let outcome = match self.engine.migrator().migrate(&entity.attributes) {
            Ok(outcome) => outcome,
            Err(Error::Validation { keys, .. }) => {
                warn!(
                    subsystem = "fields",
                    component = "service",
                    entity_id = %entity.id,
                    keys = ?keys,
                    "Entity has colliding keys, not migrated"
                );
                control.record_processed();
                return Ok(MigrateOutcome::Rejected(entity.id));
            }
            Err(e) => return Err(e),
        };

        let result = if outcome.is_noop() {
            MigrateOutcome::Unchanged
        } else {
            let result = MigrateOutcome::Migrated {
                renamed: outcome.diff.len(),
                collisions: outcome.collisions.len(),
            };
            if !dry_run {
                let entity_id = entity.id;
                entity.attributes = outcome.attributes;
                if let Err(e) = self.entities.save(entity).await {
                    error!(
                        subsystem = "fields",
                        component = "service",
                        op = "migrate_all",
                        %entity_id,
                        error = %e,
                        "Failed to save migrated entity"
                    );
                    return Err(e);
                }
            }
            result
        };

        control.record_processed();
        Ok(result)
    }

    /// Fields the cohort commonly carries and the entity lacks.
    pub async fn suggest(&self, entity_id: Uuid) -> Result<Vec<Suggestion>> {
        let start = Instant::now();
        let entity = self.load(entity_id).await?;
        let cohort = self
            .entities
            .find_by_type_and_company(&entity.third_party_type, entity.company_id)
            .await?;
        let suggestions = self.engine.suggester().suggest(&entity, &cohort);

        info!(
            subsystem = "fields",
            component = "service",
            op = "suggest",
            %entity_id,
            cohort_size = cohort.iter().filter(|m| m.id != entity_id).count(),
            suggestions = suggestions.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Suggestions computed"
        );
        Ok(suggestions)
    }

    /// Merge keys of one entity and save it.
    pub async fn merge_entity(&self, entity_id: Uuid, request: &MergeRequest) -> Result<Entity> {
        let mut entity = self.load(entity_id).await?;
        entity.attributes = self.engine.merger().merge(&entity.attributes, request)?;
        let saved = self.entities.save(entity).await?;

        info!(
            subsystem = "fields",
            component = "service",
            op = "merge_entity",
            %entity_id,
            merged_keys = request.keys.len(),
            target = %request.target_name,
            "Entity attributes merged"
        );
        Ok(saved)
    }

    /// Merge matching keys on every entity of a type.
    ///
    /// Members carrying fewer than two keys that normalize to one of the
    /// requested names are skipped.
    pub async fn bulk_merge(
        &self,
        request: &BulkMergeRequest,
        control: &BulkControl,
    ) -> Result<BulkMergeSummary> {
        let start = Instant::now();
        let targets = self.engine.merger().bulk_targets(request)?;
        let cohort = self
            .entities
            .find_by_type_and_company(&request.third_party_type, request.company_id)
            .await?;
        control.begin(cohort.len());

        let total = cohort.len();
        let targets = &targets;
        let outcomes: Vec<(usize, MergeOutcome)> = stream::iter(cohort.into_iter().enumerate())
            .map(|(index, entity)| async move {
                self.merge_member(entity, targets, request, control)
                    .await
                    .map(|outcome| (index, outcome))
            })
            .buffer_unordered(self.concurrency())
            .try_collect()
            .await?;

        let mut summary = BulkMergeSummary {
            total,
            ..BulkMergeSummary::default()
        };
        for (_, outcome) in sorted(outcomes) {
            match outcome {
                MergeOutcome::Cancelled => summary.cancelled = true,
                MergeOutcome::Merged(id) => {
                    summary.processed += 1;
                    summary.merged += 1;
                    summary.merged_entities.push(id);
                }
                MergeOutcome::NotApplicable => {
                    summary.processed += 1;
                    summary.skipped += 1;
                }
            }
        }

        if summary.cancelled {
            warn!(
                subsystem = "fields",
                component = "service",
                op = "bulk_merge",
                processed = summary.processed,
                total,
                "Bulk merge cancelled"
            );
        }
        info!(
            subsystem = "fields",
            component = "service",
            op = "bulk_merge",
            third_party_type = %request.third_party_type,
            company_id = %request.company_id,
            total,
            merged = summary.merged,
            skipped = summary.skipped,
            duration_ms = start.elapsed().as_millis() as u64,
            "Bulk merge complete"
        );
        Ok(summary)
    }

    async fn merge_member(
        &self,
        mut entity: Entity,
        targets: &[String],
        request: &BulkMergeRequest,
        control: &BulkControl,
    ) -> Result<MergeOutcome> {
        if control.is_cancelled() {
            return Ok(MergeOutcome::Cancelled);
        }

        let merged = self.engine.merger().merge_matching(
            &entity.attributes,
            targets,
            &request.target_name,
            request.remove_originals,
        )?;
        let outcome = match merged {
            Some(attributes) => {
                let entity_id = entity.id;
                entity.attributes = attributes;
                if let Err(e) = self.entities.save(entity).await {
                    error!(
                        subsystem = "fields",
                        component = "service",
                        op = "bulk_merge",
                        %entity_id,
                        error = %e,
                        "Failed to save merged entity"
                    );
                    return Err(e);
                }
                MergeOutcome::Merged(entity_id)
            }
            None => MergeOutcome::NotApplicable,
        };

        control.record_processed();
        Ok(outcome)
    }

    fn concurrency(&self) -> usize {
        self.engine.config().bulk.concurrency.max(1)
    }
}

/// Restore cohort order after unordered fan-in.
fn sorted<T>(mut outcomes: Vec<(usize, T)>) -> Vec<(usize, T)> {
    outcomes.sort_by_key(|(index, _)| *index);
    outcomes
}
