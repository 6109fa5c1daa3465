//! # Branch Repository
//!
//! Branches are the buying locations of an organization. Each one maps 1:1 to a
//! Zoho Books contact; the contact id is stored here once known.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  branches.zoho_contact_id                                               │
//! │                                                                         │
//! │  NULL ──(first sync: create contact)──► "4600000012345"                 │
//! │   ▲                                          │                          │
//! │   └──(Zoho says contact missing: clear)──────┘                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use tradeflow_core::Branch;

const COLUMNS: &str = r#"
    id, organization_id, name, code, contact_name, email, phone,
    address_line, city, state, postal_code, country, tax_number,
    zoho_contact_id, is_active, created_at, updated_at
"#;

#[derive(Debug, Clone)]
pub struct BranchRepository {
    pool: SqlitePool,
}

impl BranchRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BranchRepository { pool }
    }

    pub async fn insert(&self, branch: &Branch) -> DbResult<()> {
        debug!(id = %branch.id, code = %branch.code, "Inserting branch");

        sqlx::query(
            r#"
            INSERT INTO branches (
                id, organization_id, name, code, contact_name, email, phone,
                address_line, city, state, postal_code, country, tax_number,
                zoho_contact_id, is_active, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7,
                ?8, ?9, ?10, ?11, ?12, ?13,
                ?14, ?15, ?16, ?17
            )
            "#,
        )
        .bind(&branch.id)
        .bind(&branch.organization_id)
        .bind(&branch.name)
        .bind(&branch.code)
        .bind(&branch.contact_name)
        .bind(&branch.email)
        .bind(&branch.phone)
        .bind(&branch.address_line)
        .bind(&branch.city)
        .bind(&branch.state)
        .bind(&branch.postal_code)
        .bind(&branch.country)
        .bind(&branch.tax_number)
        .bind(&branch.zoho_contact_id)
        .bind(branch.is_active)
        .bind(branch.created_at)
        .bind(branch.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("code", &branch.code),
            other => other,
        })?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Branch>> {
        let sql = format!("SELECT {COLUMNS} FROM branches WHERE id = ?1");
        let branch = sqlx::query_as::<_, Branch>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(branch)
    }

    pub async fn list_by_organization(
        &self,
        organization_id: &str,
        include_inactive: bool,
    ) -> DbResult<Vec<Branch>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM branches
             WHERE organization_id = ?1 AND (?2 OR is_active = 1)
             ORDER BY name"
        );
        let branches = sqlx::query_as::<_, Branch>(&sql)
            .bind(organization_id)
            .bind(include_inactive)
            .fetch_all(&self.pool)
            .await?;
        Ok(branches)
    }

    /// Writes the editable contact / address fields.
    pub async fn update(&self, branch: &Branch) -> DbResult<()> {
        debug!(id = %branch.id, "Updating branch");

        let result = sqlx::query(
            r#"
            UPDATE branches SET
                name = ?2, code = ?3, contact_name = ?4, email = ?5, phone = ?6,
                address_line = ?7, city = ?8, state = ?9, postal_code = ?10,
                country = ?11, tax_number = ?12, updated_at = ?13
            WHERE id = ?1
            "#,
        )
        .bind(&branch.id)
        .bind(&branch.name)
        .bind(&branch.code)
        .bind(&branch.contact_name)
        .bind(&branch.email)
        .bind(&branch.phone)
        .bind(&branch.address_line)
        .bind(&branch.city)
        .bind(&branch.state)
        .bind(&branch.postal_code)
        .bind(&branch.country)
        .bind(&branch.tax_number)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("code", &branch.code),
            other => other,
        })?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Branch", &branch.id));
        }
        Ok(())
    }

    /// Soft delete. Existing orders keep pointing at the branch.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        let result =
            sqlx::query("UPDATE branches SET is_active = 0, updated_at = ?2 WHERE id = ?1")
                .bind(id)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Branch", id));
        }
        info!(branch_id = %id, "Branch deactivated");
        Ok(())
    }

    /// Stores (or clears, with `None`) the Zoho contact id of a branch.
    pub async fn set_zoho_contact_id(&self, id: &str, contact_id: Option<&str>) -> DbResult<()> {
        let result =
            sqlx::query("UPDATE branches SET zoho_contact_id = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(id)
                .bind(contact_id)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Branch", id));
        }
        debug!(branch_id = %id, zoho_contact_id = ?contact_id, "Branch Zoho contact updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{new_branch, seed_organization, test_db};

    #[tokio::test]
    async fn test_insert_and_list() {
        let db = test_db().await;
        let org = seed_organization(&db).await;
        let main = new_branch(&org.id, "Main Store", "MAIN");
        let north = new_branch(&org.id, "North Depot", "NORTH");
        db.branches().insert(&main).await.unwrap();
        db.branches().insert(&north).await.unwrap();

        db.branches().deactivate(&north.id).await.unwrap();

        let active = db.branches().list_by_organization(&org.id, false).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].code, "MAIN");

        let all = db.branches().list_by_organization(&org.id, true).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_code_within_organization() {
        let db = test_db().await;
        let org = seed_organization(&db).await;
        db.branches()
            .insert(&new_branch(&org.id, "Main", "MAIN"))
            .await
            .unwrap();

        let err = db
            .branches()
            .insert(&new_branch(&org.id, "Main again", "MAIN"))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_zoho_contact_id_roundtrip() {
        let db = test_db().await;
        let org = seed_organization(&db).await;
        let branch = new_branch(&org.id, "Main", "MAIN");
        db.branches().insert(&branch).await.unwrap();

        db.branches()
            .set_zoho_contact_id(&branch.id, Some("460000001"))
            .await
            .unwrap();
        let stored = db.branches().get_by_id(&branch.id).await.unwrap().unwrap();
        assert_eq!(stored.zoho_contact_id.as_deref(), Some("460000001"));

        db.branches().set_zoho_contact_id(&branch.id, None).await.unwrap();
        let stored = db.branches().get_by_id(&branch.id).await.unwrap().unwrap();
        assert!(stored.zoho_contact_id.is_none());

        let err = db.branches().deactivate("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_update() {
        let db = test_db().await;
        let org = seed_organization(&db).await;
        let mut branch = new_branch(&org.id, "Main", "MAIN");
        db.branches().insert(&branch).await.unwrap();

        branch.city = Some("Pune".to_string());
        branch.tax_number = Some("27AAAPL1234C1ZV".to_string());
        db.branches().update(&branch).await.unwrap();

        let stored = db.branches().get_by_id(&branch.id).await.unwrap().unwrap();
        assert_eq!(stored.city.as_deref(), Some("Pune"));
        assert_eq!(stored.tax_number.as_deref(), Some("27AAAPL1234C1ZV"));
    }
}
