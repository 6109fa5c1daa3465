//! # User Repository
//!
//! People who sign in. Emails are globally unique (case-insensitive) so that
//! login does not need to know the organization.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use tradeflow_core::User;

const COLUMNS: &str =
    "id, organization_id, email, name, role, password_hash, is_active, created_at";

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    pub async fn insert(&self, user: &User) -> DbResult<()> {
        debug!(id = %user.id, organization_id = %user.organization_id, role = user.role.as_str(), "Inserting user");

        sqlx::query(
            r#"
            INSERT INTO users (
                id, organization_id, email, name, role, password_hash, is_active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&user.id)
        .bind(&user.organization_id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.role)
        .bind(&user.password_hash)
        .bind(user.is_active)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("email", &user.email),
            other => other,
        })?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<User>> {
        let sql = format!("SELECT {COLUMNS} FROM users WHERE id = ?1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Case-insensitive lookup used by login.
    pub async fn get_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let sql = format!("SELECT {COLUMNS} FROM users WHERE email = ?1 COLLATE NOCASE");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn list_by_organization(&self, organization_id: &str) -> DbResult<Vec<User>> {
        let sql = format!("SELECT {COLUMNS} FROM users WHERE organization_id = ?1 ORDER BY name");
        let users = sqlx::query_as::<_, User>(&sql)
            .bind(organization_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{new_user, seed_organization, test_db};
    use tradeflow_core::UserRole;

    #[tokio::test]
    async fn test_insert_and_get_by_email() {
        let db = test_db().await;
        let org = seed_organization(&db).await;
        let user = new_user(&org.id, "Buyer@Acme.in", UserRole::Buyer);
        db.users().insert(&user).await.unwrap();

        let found = db.users().get_by_email("buyer@acme.in").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.role, UserRole::Buyer);
        assert_eq!(found.password_hash, user.password_hash);
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let db = test_db().await;
        let org = seed_organization(&db).await;
        db.users()
            .insert(&new_user(&org.id, "a@acme.in", UserRole::Admin))
            .await
            .unwrap();

        let err = db
            .users()
            .insert(&new_user(&org.id, "A@acme.in", UserRole::Buyer))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_list_by_organization() {
        let db = test_db().await;
        let org = seed_organization(&db).await;
        db.users()
            .insert(&new_user(&org.id, "a@acme.in", UserRole::Admin))
            .await
            .unwrap();
        db.users()
            .insert(&new_user(&org.id, "b@acme.in", UserRole::Buyer))
            .await
            .unwrap();

        assert_eq!(db.users().list_by_organization(&org.id).await.unwrap().len(), 2);
        assert!(db.users().list_by_organization("other").await.unwrap().is_empty());
    }
}
