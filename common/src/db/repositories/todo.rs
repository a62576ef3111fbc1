// Todo repository implementation for PostgreSQL

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::instrument;

use super::queries::todo_queries;
use super::{PgStore, TodoStore};
use crate::errors::DatabaseError;
use crate::models::{NewTodo, Todo, TodoPatch, TodoWithOwner, UserSummary};

/// Flat row produced by the todo/owner JOIN
#[derive(Debug, FromRow)]
struct TodoOwnerRow {
    id: i32,
    user_id: i32,
    title: String,
    description: String,
    completed: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    owner_id: i32,
    owner_username: String,
    owner_email: String,
    owner_full_name: String,
}

impl From<TodoOwnerRow> for TodoWithOwner {
    fn from(row: TodoOwnerRow) -> Self {
        Self {
            todo: Todo {
                id: row.id,
                user_id: row.user_id,
                title: row.title,
                description: row.description,
                completed: row.completed,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            owner: UserSummary {
                id: row.owner_id,
                username: row.owner_username,
                email: row.owner_email,
                full_name: row.owner_full_name,
            },
        }
    }
}

fn todo_not_found(id: i32) -> DatabaseError {
    DatabaseError::NotFound(format!("Todo not found: {}", id))
}

#[async_trait]
impl TodoStore for PgStore {
    #[instrument(skip(self))]
    async fn list_todos(&self) -> Result<Vec<Todo>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM todos ORDER BY id",
            todo_queries::SELECT_ALL_COLUMNS
        );
        let todos = sqlx::query_as::<_, Todo>(&sql)
            .fetch_all(self.pg())
            .await?;

        tracing::debug!(count = todos.len(), "Listed todos");
        Ok(todos)
    }

    #[instrument(skip(self))]
    async fn list_todos_with_owner(&self) -> Result<Vec<TodoWithOwner>, DatabaseError> {
        let sql = format!(
            r#"
            SELECT {}
            FROM todos t
            INNER JOIN users u ON u.id = t.user_id
            ORDER BY t.id
            "#,
            todo_queries::SELECT_WITH_OWNER_COLUMNS
        );
        let rows = sqlx::query_as::<_, TodoOwnerRow>(&sql)
            .fetch_all(self.pg())
            .await?;

        tracing::debug!(count = rows.len(), "Listed todos with owners");
        Ok(rows.into_iter().map(TodoWithOwner::from).collect())
    }

    #[instrument(skip(self))]
    async fn find_todo(&self, id: i32) -> Result<Option<Todo>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM todos WHERE id = $1",
            todo_queries::SELECT_ALL_COLUMNS
        );
        let todo = sqlx::query_as::<_, Todo>(&sql)
            .bind(id)
            .fetch_optional(self.pg())
            .await?;

        Ok(todo)
    }

    #[instrument(skip(self))]
    async fn find_todo_with_owner(&self, id: i32) -> Result<Option<TodoWithOwner>, DatabaseError> {
        let sql = format!(
            r#"
            SELECT {}
            FROM todos t
            INNER JOIN users u ON u.id = t.user_id
            WHERE t.id = $1
            "#,
            todo_queries::SELECT_WITH_OWNER_COLUMNS
        );
        let row = sqlx::query_as::<_, TodoOwnerRow>(&sql)
            .bind(id)
            .fetch_optional(self.pg())
            .await?;

        Ok(row.map(TodoWithOwner::from))
    }

    #[instrument(skip(self, new_todo), fields(user_id = new_todo.user_id))]
    async fn create_todo(&self, new_todo: NewTodo) -> Result<Todo, DatabaseError> {
        let sql = format!(
            r#"
            INSERT INTO todos (user_id, title, description, completed)
            VALUES ($1, $2, COALESCE($3, ''), COALESCE($4, FALSE))
            RETURNING {}
            "#,
            todo_queries::SELECT_ALL_COLUMNS
        );
        let todo = sqlx::query_as::<_, Todo>(&sql)
            .bind(new_todo.user_id)
            .bind(&new_todo.title)
            .bind(new_todo.description.as_deref())
            .bind(new_todo.completed)
            .fetch_one(self.pg())
            .await?;

        tracing::info!(todo_id = todo.id, user_id = todo.user_id, "Todo created");
        Ok(todo)
    }

    #[instrument(skip(self, new_todo), fields(user_id = new_todo.user_id))]
    async fn create_todo_with_owner(
        &self,
        new_todo: NewTodo,
    ) -> Result<TodoWithOwner, DatabaseError> {
        let sql = format!(
            r#"
            WITH t AS (
                INSERT INTO todos (user_id, title, description, completed)
                VALUES ($1, $2, COALESCE($3, ''), COALESCE($4, FALSE))
                RETURNING {}
            )
            SELECT {}
            FROM t
            INNER JOIN users u ON u.id = t.user_id
            "#,
            todo_queries::SELECT_ALL_COLUMNS,
            todo_queries::SELECT_WITH_OWNER_COLUMNS
        );
        let row = sqlx::query_as::<_, TodoOwnerRow>(&sql)
            .bind(new_todo.user_id)
            .bind(&new_todo.title)
            .bind(new_todo.description.as_deref())
            .bind(new_todo.completed)
            .fetch_one(self.pg())
            .await?;

        let created = TodoWithOwner::from(row);
        tracing::info!(
            todo_id = created.todo.id,
            user_id = created.owner.id,
            "Todo created with owner"
        );
        Ok(created)
    }

    #[instrument(skip(self, patch))]
    async fn update_todo(&self, id: i32, patch: TodoPatch) -> Result<Todo, DatabaseError> {
        if patch.is_empty() {
            return self.find_todo(id).await?.ok_or_else(|| todo_not_found(id));
        }

        let sql = format!(
            r#"
            UPDATE todos
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                completed = COALESCE($4, completed),
                updated_at = GREATEST(now(), created_at)
            WHERE id = $1
            RETURNING {}
            "#,
            todo_queries::SELECT_ALL_COLUMNS
        );
        let todo = sqlx::query_as::<_, Todo>(&sql)
            .bind(id)
            .bind(patch.title.as_deref())
            .bind(patch.description.as_deref())
            .bind(patch.completed)
            .fetch_optional(self.pg())
            .await?
            .ok_or_else(|| todo_not_found(id))?;

        tracing::info!(todo_id = id, "Todo updated");
        Ok(todo)
    }

    #[instrument(skip(self))]
    async fn delete_todo(&self, id: i32) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM todos WHERE id = $1")
            .bind(id)
            .execute(self.pg())
            .await?;

        if result.rows_affected() == 0 {
            return Err(todo_not_found(id));
        }

        tracing::info!(todo_id = id, "Todo deleted");
        Ok(())
    }
}
