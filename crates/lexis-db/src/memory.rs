//! In-memory repositories and JSON snapshots.
//!
//! The in-memory entity repository applies the same version check as the
//! PostgreSQL one. Snapshots persist both repositories to a single JSON
//! document so the CLI and tests can work without a database.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use lexis_core::{Entity, EntityRepository, Error, Result, Template, TemplateRepository};

// =============================================================================
// ENTITIES
// =============================================================================

/// Entity repository held in memory, ordered by id.
#[derive(Debug, Default)]
pub struct MemoryEntityRepository {
    entities: RwLock<BTreeMap<Uuid, Entity>>,
}

impl MemoryEntityRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository seeded with stored entities, versions kept as given.
    pub fn with_entities(entities: impl IntoIterator<Item = Entity>) -> Self {
        Self {
            entities: RwLock::new(entities.into_iter().map(|e| (e.id, e)).collect()),
        }
    }

    /// Every stored entity, ordered by id.
    pub async fn all(&self) -> Vec<Entity> {
        self.entities.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl EntityRepository for MemoryEntityRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Entity>> {
        Ok(self.entities.read().await.get(&id).cloned())
    }

    async fn find_by_type_and_company(
        &self,
        third_party_type: &str,
        company_id: Uuid,
    ) -> Result<Vec<Entity>> {
        Ok(self
            .entities
            .read()
            .await
            .values()
            .filter(|e| e.third_party_type == third_party_type && e.company_id == company_id)
            .cloned()
            .collect())
    }

    async fn save(&self, mut entity: Entity) -> Result<Entity> {
        let mut entities = self.entities.write().await;
        let stored = entities.get(&entity.id).map(|e| e.version);

        match stored {
            Some(actual) if actual != entity.version => {
                return Err(Error::VersionConflict {
                    id: entity.id,
                    expected: entity.version,
                    actual,
                });
            }
            None if entity.version != 0 => return Err(Error::EntityNotFound(entity.id)),
            _ => {}
        }

        entity.version += 1;
        entity.updated_at_utc = Utc::now();
        entities.insert(entity.id, entity.clone());
        debug!(
            subsystem = "db",
            component = "memory",
            entity_id = %entity.id,
            version = entity.version,
            "Entity saved"
        );
        Ok(entity)
    }
}

// =============================================================================
// TEMPLATES
// =============================================================================

/// Template repository held in memory.
#[derive(Debug, Default)]
pub struct MemoryTemplateRepository {
    templates: RwLock<BTreeMap<Uuid, Template>>,
}

impl MemoryTemplateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_templates(templates: impl IntoIterator<Item = Template>) -> Self {
        Self {
            templates: RwLock::new(templates.into_iter().map(|t| (t.id, t)).collect()),
        }
    }

    /// Insert a template, or replace the stored one with the same id.
    pub async fn upsert(&self, template: Template) {
        self.templates.write().await.insert(template.id, template);
    }

    pub async fn all(&self) -> Vec<Template> {
        self.templates.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl TemplateRepository for MemoryTemplateRepository {
    async fn find_active_by_type(
        &self,
        third_party_type: &str,
        company_id: Uuid,
    ) -> Result<Vec<Template>> {
        Ok(self
            .templates
            .read()
            .await
            .values()
            .filter(|t| {
                t.active && t.third_party_type == third_party_type && t.company_id == company_id
            })
            .cloned()
            .collect())
    }
}

// =============================================================================
// SNAPSHOTS
// =============================================================================

/// Serializable contents of both repositories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub templates: Vec<Template>,
}

impl Snapshot {
    /// Read a snapshot from a JSON file.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let snapshot: Snapshot = serde_json::from_str(&content)?;
        info!(
            subsystem = "db",
            component = "snapshot",
            path = %path.display(),
            entities = snapshot.entities.len(),
            templates = snapshot.templates.len(),
            "Snapshot loaded"
        );
        Ok(snapshot)
    }

    /// Write the snapshot as pretty JSON, replacing the file atomically.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, content).await?;
        tokio::fs::rename(&staging, path).await?;
        info!(
            subsystem = "db",
            component = "snapshot",
            path = %path.display(),
            entities = self.entities.len(),
            templates = self.templates.len(),
            "Snapshot saved"
        );
        Ok(())
    }

    /// Split into repositories serving the snapshot's records.
    pub fn into_repositories(self) -> (MemoryEntityRepository, MemoryTemplateRepository) {
        (
            MemoryEntityRepository::with_entities(self.entities),
            MemoryTemplateRepository::with_templates(self.templates),
        )
    }

    /// Capture the current contents of both repositories.
    pub async fn capture(
        entities: &MemoryEntityRepository,
        templates: &MemoryTemplateRepository,
    ) -> Self {
        Self {
            entities: entities.all().await,
            templates: templates.all().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_new_entity_sets_version() {
        let repo = MemoryEntityRepository::new();
        let saved = repo.save(Entity::new(Uuid::nil(), "proveedor")).await.unwrap();
        assert_eq!(saved.version, 1);
        assert_eq!(repo.find_by_id(saved.id).await.unwrap(), Some(saved));
    }

    #[tokio::test]
    async fn test_stale_version_conflicts() {
        let repo = MemoryEntityRepository::new();
        let saved = repo.save(Entity::new(Uuid::nil(), "proveedor")).await.unwrap();
        let stale = saved.clone();
        repo.save(saved).await.unwrap();

        let err = repo.save(stale).await.unwrap_err();
        assert!(matches!(
            err,
            Error::VersionConflict {
                expected: 1,
                actual: 2,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_saving_unknown_versioned_entity_fails() {
        let repo = MemoryEntityRepository::new();
        let mut entity = Entity::new(Uuid::nil(), "proveedor");
        entity.version = 3;
        assert!(matches!(
            repo.save(entity).await.unwrap_err(),
            Error::EntityNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_find_by_type_and_company_filters() {
        let company = Uuid::new_v4();
        let repo = MemoryEntityRepository::with_entities([
            Entity::new(company, "proveedor"),
            Entity::new(company, "cliente"),
            Entity::new(Uuid::new_v4(), "proveedor"),
        ]);
        let found = repo.find_by_type_and_company("proveedor", company).await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_inactive_templates_are_not_listed() {
        let mut inactive = Template::new(Uuid::nil(), "viejo", "proveedor");
        inactive.active = false;
        let repo = MemoryTemplateRepository::with_templates([
            inactive,
            Template::new(Uuid::nil(), "vigente", "proveedor"),
        ]);
        let found = repo.find_active_by_type("proveedor", Uuid::nil()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "vigente");
    }
}
