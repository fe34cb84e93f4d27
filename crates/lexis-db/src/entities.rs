//! Third-party entity repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, warn};
use uuid::Uuid;

use lexis_core::{AttributeMap, Entity, EntityRepository, Error, Result, StandardAttributes};

const SELECT_COLUMNS: &str = r#"
    id, company_id, third_party_type,
    legal_name, identification_number, identification_type, email, phone,
    address, city, country, legal_representative,
    attributes, version, created_at_utc, updated_at_utc
"#;

/// PostgreSQL implementation of EntityRepository.
pub struct PgEntityRepository {
    pool: Pool<Postgres>,
}

impl PgEntityRepository {
    /// Create a new PgEntityRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn stored_version(&self, id: Uuid) -> Result<Option<i64>> {
        sqlx::query_scalar::<_, i64>("SELECT version FROM third_party WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)
    }

    async fn insert(&self, entity: &Entity) -> Result<bool> {
        let s = &entity.standard;
        let result = sqlx::query(
            r#"
            INSERT INTO third_party (
                id, company_id, third_party_type,
                legal_name, identification_number, identification_type, email, phone,
                address, city, country, legal_representative,
                attributes, version, created_at_utc, updated_at_utc
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, 1, $14, $15)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(entity.id)
        .bind(entity.company_id)
        .bind(&entity.third_party_type)
        .bind(&s.legal_name)
        .bind(&s.identification_number)
        .bind(&s.identification_type)
        .bind(&s.email)
        .bind(&s.phone)
        .bind(&s.address)
        .bind(&s.city)
        .bind(&s.country)
        .bind(&s.legal_representative)
        .bind(Json(&entity.attributes))
        .bind(entity.created_at_utc)
        .bind(entity.updated_at_utc)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected() == 1)
    }

    async fn update(&self, entity: &Entity) -> Result<bool> {
        let s = &entity.standard;
        let result = sqlx::query(
            r#"
            UPDATE third_party SET
                third_party_type = $3,
                legal_name = $4,
                identification_number = $5,
                identification_type = $6,
                email = $7,
                phone = $8,
                address = $9,
                city = $10,
                country = $11,
                legal_representative = $12,
                attributes = $13,
                version = version + 1,
                updated_at_utc = $14
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(entity.id)
        .bind(entity.version)
        .bind(&entity.third_party_type)
        .bind(&s.legal_name)
        .bind(&s.identification_number)
        .bind(&s.identification_type)
        .bind(&s.email)
        .bind(&s.phone)
        .bind(&s.address)
        .bind(&s.city)
        .bind(&s.country)
        .bind(&s.legal_representative)
        .bind(Json(&entity.attributes))
        .bind(entity.updated_at_utc)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected() == 1)
    }
}

fn row_to_entity(r: &PgRow) -> Entity {
    Entity {
        id: r.get("id"),
        company_id: r.get("company_id"),
        third_party_type: r.get("third_party_type"),
        standard: StandardAttributes {
            legal_name: r.get("legal_name"),
            identification_number: r.get("identification_number"),
            identification_type: r.get("identification_type"),
            email: r.get("email"),
            phone: r.get("phone"),
            address: r.get("address"),
            city: r.get("city"),
            country: r.get("country"),
            legal_representative: r.get("legal_representative"),
        },
        attributes: r.get::<Json<AttributeMap>, _>("attributes").0,
        version: r.get("version"),
        created_at_utc: r.get("created_at_utc"),
        updated_at_utc: r.get("updated_at_utc"),
    }
}

#[async_trait]
impl EntityRepository for PgEntityRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Entity>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM third_party WHERE id = $1",
            SELECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(row_to_entity))
    }

    async fn find_by_type_and_company(
        &self,
        third_party_type: &str,
        company_id: Uuid,
    ) -> Result<Vec<Entity>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM third_party WHERE third_party_type = $1 AND company_id = $2 ORDER BY id",
            SELECT_COLUMNS
        ))
        .bind(third_party_type)
        .bind(company_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(row_to_entity).collect())
    }

    async fn save(&self, mut entity: Entity) -> Result<Entity> {
        entity.updated_at_utc = Utc::now();

        let stored = if entity.version == 0 {
            self.insert(&entity).await?
        } else {
            self.update(&entity).await?
        };

        if !stored {
            let actual = self.stored_version(entity.id).await?;
            warn!(
                subsystem = "db",
                component = "entities",
                entity_id = %entity.id,
                expected = entity.version,
                actual = ?actual,
                "Entity save rejected by version check"
            );
            return Err(match actual {
                Some(actual) => Error::VersionConflict {
                    id: entity.id,
                    expected: entity.version,
                    actual,
                },
                None => Error::EntityNotFound(entity.id),
            });
        }

        entity.version += 1;
        debug!(
            subsystem = "db",
            component = "entities",
            entity_id = %entity.id,
            version = entity.version,
            "Entity saved"
        );
        Ok(entity)
    }
}
