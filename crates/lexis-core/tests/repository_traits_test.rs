//! Repository traits must be usable as shared trait objects by the engine.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lexis_core::{Entity, EntityRepository, Error, Result, Template, TemplateRepository};
use uuid::Uuid;

#[derive(Default)]
struct VecEntities {
    rows: Mutex<HashMap<Uuid, Entity>>,
}

#[async_trait]
impl EntityRepository for VecEntities {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Entity>> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_type_and_company(
        &self,
        third_party_type: &str,
        company_id: Uuid,
    ) -> Result<Vec<Entity>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.third_party_type == third_party_type && e.company_id == company_id)
            .cloned()
            .collect())
    }

    async fn save(&self, mut entity: Entity) -> Result<Entity> {
        let mut rows = self.rows.lock().unwrap();
        let stored = rows.get(&entity.id).map(|e| e.version).unwrap_or(0);
        if stored != entity.version {
            return Err(Error::VersionConflict {
                id: entity.id,
                expected: entity.version,
                actual: stored,
            });
        }
        entity.version += 1;
        rows.insert(entity.id, entity.clone());
        Ok(entity)
    }
}

struct NoTemplates;

#[async_trait]
impl TemplateRepository for NoTemplates {
    async fn find_active_by_type(&self, _: &str, _: Uuid) -> Result<Vec<Template>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_entity_repository_as_trait_object() {
    let repo: Arc<dyn EntityRepository> = Arc::new(VecEntities::default());
    let company = Uuid::new_v4();
    let entity = Entity::new(company, "proveedor").with_attribute("banco", "Davivienda");

    let saved = repo.save(entity.clone()).await.unwrap();
    assert_eq!(saved.version, 1);

    let loaded = repo.find_by_id(entity.id).await.unwrap().unwrap();
    assert_eq!(loaded.attributes, entity.attributes);

    let cohort = repo.find_by_type_and_company("proveedor", company).await.unwrap();
    assert_eq!(cohort.len(), 1);
    assert!(repo
        .find_by_type_and_company("empleado", company)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_stale_save_reports_version_conflict() {
    let repo: Arc<dyn EntityRepository> = Arc::new(VecEntities::default());
    let entity = Entity::new(Uuid::new_v4(), "cliente");
    repo.save(entity.clone()).await.unwrap();

    let err = repo.save(entity).await.unwrap_err();
    assert_eq!(err.kind(), "version_conflict");
}

#[tokio::test]
async fn test_template_repository_as_trait_object() {
    let repo: Arc<dyn TemplateRepository> = Arc::new(NoTemplates);
    let templates = repo
        .find_active_by_type("proveedor", Uuid::new_v4())
        .await
        .unwrap();
    assert!(templates.is_empty());
}
