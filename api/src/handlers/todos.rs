use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::extractors::{EntityId, JsonBody};
use crate::handlers::{Entity, ErrorResponse, MessageResponse};
use crate::state::AppState;
use common::errors::{DatabaseError, ValidationError};
use common::models::{NewTodo, Todo, TodoPatch, TodoWithOwner, UserSummary, TITLE_MAX_LEN};
use common::telemetry::record_entity_mutation;

/// Request to create a todo
#[derive(Debug, Deserialize)]
pub struct CreateTodoRequest {
    pub user_id: i32,
    pub title: String,
    pub completed: Option<bool>,
}

/// Request to create a todo and receive it with its owner
#[derive(Debug, Deserialize)]
pub struct CreateTodoWithUserRequest {
    pub user_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub completed: Option<bool>,
}

/// Request to update a todo; absent fields are left unchanged
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTodoRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TodoResponse {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Todo> for TodoResponse {
    fn from(todo: Todo) -> Self {
        Self {
            id: todo.id,
            user_id: todo.user_id,
            title: todo.title,
            completed: todo.completed,
            created_at: todo.created_at,
            updated_at: todo.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OwnerResponse {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub full_name: String,
}

impl From<UserSummary> for OwnerResponse {
    fn from(owner: UserSummary) -> Self {
        Self {
            id: owner.id,
            username: owner.username,
            email: owner.email,
            full_name: owner.full_name,
        }
    }
}

/// Todo with its owner nested under `user`
#[derive(Debug, Serialize, Deserialize)]
pub struct TodoWithUserResponse {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user: OwnerResponse,
}

impl From<TodoWithOwner> for TodoWithUserResponse {
    fn from(joined: TodoWithOwner) -> Self {
        let TodoWithOwner { todo, owner } = joined;
        Self {
            id: todo.id,
            title: todo.title,
            description: todo.description,
            completed: todo.completed,
            created_at: todo.created_at,
            updated_at: todo.updated_at,
            user: owner.into(),
        }
    }
}

fn validate_title(title: &str) -> Result<(), ValidationError> {
    ValidationError::require_non_blank("title", title)?;
    ValidationError::require_max_len("title", title, TITLE_MAX_LEN)
}

fn unknown_owner(user_id: i32) -> ErrorResponse {
    ErrorResponse::validation(format!("user_id {} does not reference an existing user", user_id))
}

fn map_create_error(user_id: i32, err: DatabaseError) -> ErrorResponse {
    match err {
        DatabaseError::ForeignKeyViolation(_) => unknown_owner(user_id),
        other => ErrorResponse::from_database(Entity::Todo, other),
    }
}

/// List all todos
#[tracing::instrument(skip(state))]
pub async fn list_todos(
    State(state): State<AppState>,
) -> Result<Json<Vec<TodoResponse>>, ErrorResponse> {
    let todos = state
        .store
        .list_todos()
        .await
        .map_err(|e| ErrorResponse::from_database(Entity::Todo, e))?;

    Ok(Json(todos.into_iter().map(TodoResponse::from).collect()))
}

/// List all todos with their owners
#[tracing::instrument(skip(state))]
pub async fn list_todos_with_user(
    State(state): State<AppState>,
) -> Result<Json<Vec<TodoWithUserResponse>>, ErrorResponse> {
    let todos = state
        .store
        .list_todos_with_owner()
        .await
        .map_err(|e| ErrorResponse::from_database(Entity::Todo, e))?;

    Ok(Json(
        todos.into_iter().map(TodoWithUserResponse::from).collect(),
    ))
}

/// Get todo by ID
#[tracing::instrument(skip(state))]
pub async fn get_todo(
    State(state): State<AppState>,
    EntityId(id): EntityId,
) -> Result<Json<TodoResponse>, ErrorResponse> {
    let todo = state
        .store
        .find_todo(id)
        .await
        .map_err(|e| ErrorResponse::from_database(Entity::Todo, e))?
        .ok_or_else(|| ErrorResponse::not_found(Entity::Todo))?;

    Ok(Json(todo.into()))
}

/// Create a new todo
#[tracing::instrument(skip(state, req), fields(user_id = req.user_id))]
pub async fn create_todo(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateTodoRequest>,
) -> Result<(StatusCode, Json<TodoResponse>), ErrorResponse> {
    validate_title(&req.title)?;

    let user_id = req.user_id;
    let todo = state
        .store
        .create_todo(NewTodo {
            user_id,
            title: req.title,
            description: None,
            completed: req.completed,
        })
        .await
        .map_err(|e| map_create_error(user_id, e))?;

    record_entity_mutation("todo", "create");
    tracing::info!(todo_id = todo.id, "Todo created");

    Ok((StatusCode::CREATED, Json(todo.into())))
}

/// Create a new todo and return it joined with its owner
#[tracing::instrument(skip(state, req), fields(user_id = req.user_id))]
pub async fn create_todo_with_user(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateTodoWithUserRequest>,
) -> Result<(StatusCode, Json<TodoWithUserResponse>), ErrorResponse> {
    validate_title(&req.title)?;

    let user_id = req.user_id;
    let created = state
        .store
        .create_todo_with_owner(NewTodo {
            user_id,
            title: req.title,
            description: req.description,
            completed: req.completed,
        })
        .await
        .map_err(|e| map_create_error(user_id, e))?;

    record_entity_mutation("todo", "create");
    tracing::info!(todo_id = created.todo.id, "Todo created with owner");

    Ok((StatusCode::CREATED, Json(created.into())))
}

/// Update an existing todo
#[tracing::instrument(skip(state, req))]
pub async fn update_todo(
    State(state): State<AppState>,
    EntityId(id): EntityId,
    JsonBody(req): JsonBody<UpdateTodoRequest>,
) -> Result<Json<TodoResponse>, ErrorResponse> {
    if let Some(title) = &req.title {
        validate_title(title)?;
    }

    let patch = TodoPatch {
        title: req.title,
        description: req.description,
        completed: req.completed,
    };
    let changed = !patch.is_empty();

    let todo = state
        .store
        .update_todo(id, patch)
        .await
        .map_err(|e| ErrorResponse::from_database(Entity::Todo, e))?;

    if changed {
        record_entity_mutation("todo", "update");
    }

    Ok(Json(todo.into()))
}

/// Delete a todo
#[tracing::instrument(skip(state))]
pub async fn delete_todo(
    State(state): State<AppState>,
    EntityId(id): EntityId,
) -> Result<Json<MessageResponse>, ErrorResponse> {
    state
        .store
        .delete_todo(id)
        .await
        .map_err(|e| ErrorResponse::from_database(Entity::Todo, e))?;

    record_entity_mutation("todo", "delete");
    tracing::info!(todo_id = id, "Todo deleted");

    Ok(Json(MessageResponse::new("Todo deleted successfully")))
}
