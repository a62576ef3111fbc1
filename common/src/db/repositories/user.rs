// User repository implementation for PostgreSQL

use async_trait::async_trait;
use tracing::instrument;

use super::queries::user_queries;
use super::{PgStore, UserStore};
use crate::errors::DatabaseError;
use crate::models::{NewUser, User, UserPatch};

fn user_not_found(id: i32) -> DatabaseError {
    DatabaseError::NotFound(format!("User not found: {}", id))
}

#[async_trait]
impl UserStore for PgStore {
    #[instrument(skip(self))]
    async fn list_users(&self) -> Result<Vec<User>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM users ORDER BY id",
            user_queries::SELECT_ALL_COLUMNS
        );
        let users = sqlx::query_as::<_, User>(&sql)
            .fetch_all(self.pg())
            .await?;

        Ok(users)
    }

    #[instrument(skip(self))]
    async fn find_user(&self, id: i32) -> Result<Option<User>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM users WHERE id = $1",
            user_queries::SELECT_ALL_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(self.pg())
            .await?;

        Ok(user)
    }

    #[instrument(skip(self, new_user), fields(username = %new_user.username))]
    async fn create_user(&self, new_user: NewUser) -> Result<User, DatabaseError> {
        let sql = format!(
            r#"
            INSERT INTO users (username, email, full_name, is_active)
            VALUES ($1, $2, COALESCE($3, ''), COALESCE($4, TRUE))
            RETURNING {}
            "#,
            user_queries::SELECT_ALL_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(&new_user.username)
            .bind(&new_user.email)
            .bind(new_user.full_name.as_deref())
            .bind(new_user.is_active)
            .fetch_one(self.pg())
            .await?;

        tracing::info!(user_id = user.id, username = %user.username, "User created");
        Ok(user)
    }

    #[instrument(skip(self, patch))]
    async fn update_user(&self, id: i32, patch: UserPatch) -> Result<User, DatabaseError> {
        let sql = format!(
            r#"
            UPDATE users
            SET email = COALESCE($2, email),
                full_name = COALESCE($3, full_name),
                is_active = COALESCE($4, is_active)
            WHERE id = $1
            RETURNING {}
            "#,
            user_queries::SELECT_ALL_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(patch.email.as_deref())
            .bind(patch.full_name.as_deref())
            .bind(patch.is_active)
            .fetch_optional(self.pg())
            .await?
            .ok_or_else(|| user_not_found(id))?;

        tracing::info!(user_id = id, "User updated");
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn delete_user(&self, id: i32) -> Result<(), DatabaseError> {
        // todos.user_id is ON DELETE RESTRICT, so owners surface as 23503
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self.pg())
            .await?;

        if result.rows_affected() == 0 {
            return Err(user_not_found(id));
        }

        tracing::info!(user_id = id, "User deleted");
        Ok(())
    }
}
