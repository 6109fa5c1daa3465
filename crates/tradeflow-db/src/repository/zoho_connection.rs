//! Zoho OAuth tokens, one row per organization.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use tradeflow_core::ZohoConnection;

const COLUMNS: &str = "organization_id, access_token, refresh_token, expires_at, api_domain, updated_at";

#[derive(Debug, Clone)]
pub struct ZohoConnectionRepository {
    pool: SqlitePool,
}

impl ZohoConnectionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ZohoConnectionRepository { pool }
    }

    pub async fn get(&self, organization_id: &str) -> DbResult<Option<ZohoConnection>> {
        let sql = format!("SELECT {COLUMNS} FROM zoho_connections WHERE organization_id = ?1");
        let connection = sqlx::query_as::<_, ZohoConnection>(&sql)
            .bind(organization_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(connection)
    }

    /// Stores a fresh grant, replacing any previous one.
    pub async fn upsert(&self, connection: &ZohoConnection) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO zoho_connections (
                organization_id, access_token, refresh_token, expires_at, api_domain, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(organization_id) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                expires_at = excluded.expires_at,
                api_domain = excluded.api_domain,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&connection.organization_id)
        .bind(&connection.access_token)
        .bind(&connection.refresh_token)
        .bind(connection.expires_at)
        .bind(&connection.api_domain)
        .bind(connection.updated_at)
        .execute(&self.pool)
        .await?;

        info!(organization_id = %connection.organization_id, "Zoho connection stored");
        Ok(())
    }

    /// Persists a refreshed access token. The refresh token is left alone.
    /// Stores a refreshed access token. `api_domain` replaces the stored
    /// domain only when the refresh reported one.
    pub async fn update_access_token(
        &self,
        organization_id: &str,
        access_token: &str,
        expires_at: DateTime<Utc>,
        api_domain: Option<&str>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE zoho_connections SET
                access_token = ?2,
                expires_at = ?3,
                api_domain = COALESCE(?4, api_domain),
                updated_at = ?5
            WHERE organization_id = ?1
            "#,
        )
        .bind(organization_id)
        .bind(access_token)
        .bind(expires_at)
        .bind(api_domain)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("ZohoConnection", organization_id));
        }
        debug!(organization_id = %organization_id, %expires_at, "Zoho access token refreshed");
        Ok(())
    }

    /// Returns whether a connection existed.
    pub async fn delete(&self, organization_id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM zoho_connections WHERE organization_id = ?1")
            .bind(organization_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{seed_organization, test_db};
    use chrono::Duration;

    #[tokio::test]
    async fn test_connection_lifecycle() {
        let db = test_db().await;
        let org = seed_organization(&db).await;
        let repo = db.zoho_connections();

        assert!(repo.get(&org.id).await.unwrap().is_none());

        let now = Utc::now();
        let connection = ZohoConnection {
            organization_id: org.id.clone(),
            access_token: "access-1".to_string(),
            refresh_token: "refresh-1".to_string(),
            expires_at: now + Duration::hours(1),
            api_domain: Some("https://www.zohoapis.in".to_string()),
            updated_at: now,
        };
        repo.upsert(&connection).await.unwrap();

        let later = now + Duration::hours(2);
        repo.update_access_token(&org.id, "access-2", later, None).await.unwrap();
        let stored = repo.get(&org.id).await.unwrap().unwrap();
        assert_eq!(stored.access_token, "access-2");
        assert_eq!(stored.refresh_token, "refresh-1");
        assert_eq!(stored.api_domain.as_deref(), Some("https://www.zohoapis.in"));

        repo.update_access_token(&org.id, "access-3", later, Some("https://www.zohoapis.eu"))
            .await
            .unwrap();
        let stored = repo.get(&org.id).await.unwrap().unwrap();
        assert_eq!(stored.access_token, "access-3");
        assert_eq!(stored.api_domain.as_deref(), Some("https://www.zohoapis.eu"));
        assert_eq!(stored.expires_at, later);

        // A new grant replaces everything
        let regrant = ZohoConnection {
            refresh_token: "refresh-2".to_string(),
            ..connection
        };
        repo.upsert(&regrant).await.unwrap();
        let stored = repo.get(&org.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token, "refresh-2");
        assert_eq!(stored.access_token, "access-1");

        assert!(repo.delete(&org.id).await.unwrap());
        assert!(!repo.delete(&org.id).await.unwrap());
        let err = repo
            .update_access_token(&org.id, "x", later, None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
