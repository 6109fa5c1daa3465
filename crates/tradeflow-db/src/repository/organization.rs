//! # Organization Repository
//!
//! Tenants. Every other table carries an `organization_id` pointing here.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use tradeflow_core::Organization;

const COLUMNS: &str = "id, name, slug, currency_code, zoho_organization_id, is_active, created_at, updated_at";

/// Repository for organization database operations.
#[derive(Debug, Clone)]
pub struct OrganizationRepository {
    pool: SqlitePool,
}

impl OrganizationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrganizationRepository { pool }
    }

    /// Inserts a new organization. A taken slug yields `UniqueViolation`.
    pub async fn insert(&self, org: &Organization) -> DbResult<()> {
        debug!(id = %org.id, slug = %org.slug, "Inserting organization");

        sqlx::query(
            r#"
            INSERT INTO organizations (
                id, name, slug, currency_code, zoho_organization_id,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&org.id)
        .bind(&org.name)
        .bind(&org.slug)
        .bind(&org.currency_code)
        .bind(&org.zoho_organization_id)
        .bind(org.is_active)
        .bind(org.created_at)
        .bind(org.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("slug", &org.slug),
            other => other,
        })?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Organization>> {
        let sql = format!("SELECT {COLUMNS} FROM organizations WHERE id = ?1");
        let org = sqlx::query_as::<_, Organization>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(org)
    }

    pub async fn get_by_slug(&self, slug: &str) -> DbResult<Option<Organization>> {
        let sql = format!("SELECT {COLUMNS} FROM organizations WHERE slug = ?1");
        let org = sqlx::query_as::<_, Organization>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(org)
    }

    pub async fn list(&self) -> DbResult<Vec<Organization>> {
        let sql = format!("SELECT {COLUMNS} FROM organizations ORDER BY name");
        let orgs = sqlx::query_as::<_, Organization>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(orgs)
    }

    /// Writes the editable fields (name, currency, active flag).
    pub async fn update(&self, org: &Organization) -> DbResult<()> {
        debug!(id = %org.id, "Updating organization");

        let result = sqlx::query(
            r#"
            UPDATE organizations SET
                name = ?2,
                currency_code = ?3,
                is_active = ?4,
                updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(&org.id)
        .bind(&org.name)
        .bind(&org.currency_code)
        .bind(org.is_active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Organization", &org.id));
        }
        Ok(())
    }

    pub async fn set_zoho_organization_id(
        &self,
        id: &str,
        zoho_organization_id: Option<&str>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE organizations SET zoho_organization_id = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(zoho_organization_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Organization", id));
        }

        info!(organization_id = %id, zoho_organization_id = ?zoho_organization_id, "Zoho organization linked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{new_organization, test_db};

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let db = test_db().await;
        let org = new_organization("Acme Hardware", "acme");
        db.organizations().insert(&org).await.unwrap();

        let by_id = db.organizations().get_by_id(&org.id).await.unwrap().unwrap();
        assert_eq!(by_id.slug, "acme");
        let by_slug = db.organizations().get_by_slug("acme").await.unwrap().unwrap();
        assert_eq!(by_slug.id, org.id);
        assert!(db.organizations().get_by_slug("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_slug() {
        let db = test_db().await;
        db.organizations()
            .insert(&new_organization("Acme", "acme"))
            .await
            .unwrap();

        let err = db
            .organizations()
            .insert(&new_organization("Acme Two", "acme"))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "slug"));
    }

    #[tokio::test]
    async fn test_update_and_zoho_link() {
        let db = test_db().await;
        let mut org = new_organization("Acme", "acme");
        db.organizations().insert(&org).await.unwrap();

        org.name = "Acme Industrial".to_string();
        db.organizations().update(&org).await.unwrap();
        db.organizations()
            .set_zoho_organization_id(&org.id, Some("6000123"))
            .await
            .unwrap();

        let stored = db.organizations().get_by_id(&org.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Acme Industrial");
        assert_eq!(stored.zoho_organization_id.as_deref(), Some("6000123"));
        assert_eq!(db.organizations().list().await.unwrap().len(), 1);
    }
}
