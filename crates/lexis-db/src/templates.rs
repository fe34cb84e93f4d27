//! Contract template repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use lexis_core::{Error, Result, Template, TemplateField, TemplateRepository};

/// PostgreSQL implementation of TemplateRepository.
pub struct PgTemplateRepository {
    pool: Pool<Postgres>,
}

impl PgTemplateRepository {
    /// Create a new PgTemplateRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Insert a template, or replace the stored one with the same id.
    pub async fn upsert(&self, template: &Template) -> Result<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO contract_template (id, company_id, name, third_party_type, active, fields, created_at_utc, updated_at_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                third_party_type = EXCLUDED.third_party_type,
                active = EXCLUDED.active,
                fields = EXCLUDED.fields,
                updated_at_utc = EXCLUDED.updated_at_utc
            "#,
        )
        .bind(template.id)
        .bind(template.company_id)
        .bind(&template.name)
        .bind(&template.third_party_type)
        .bind(template.active)
        .bind(Json(&template.fields))
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(())
    }
}

#[async_trait]
impl TemplateRepository for PgTemplateRepository {
    async fn find_active_by_type(
        &self,
        third_party_type: &str,
        company_id: Uuid,
    ) -> Result<Vec<Template>> {
        let rows = sqlx::query(
            r#"
            SELECT id, company_id, name, third_party_type, active, fields
            FROM contract_template
            WHERE third_party_type = $1 AND company_id = $2 AND active
            ORDER BY id
            "#,
        )
        .bind(third_party_type)
        .bind(company_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| Template {
                id: r.get("id"),
                company_id: r.get("company_id"),
                name: r.get("name"),
                third_party_type: r.get("third_party_type"),
                active: r.get("active"),
                fields: r.get::<Json<Vec<TemplateField>>, _>("fields").0,
            })
            .collect())
    }
}
