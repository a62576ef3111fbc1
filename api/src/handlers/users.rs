use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::extractors::{EntityId, JsonBody};
use crate::handlers::{Entity, ErrorResponse, MessageResponse};
use crate::state::AppState;
use common::errors::{DatabaseError, ValidationError};
use common::models::{NewUser, User, UserPatch, EMAIL_MAX_LEN, FULL_NAME_MAX_LEN, USERNAME_MAX_LEN};
use common::telemetry::record_entity_mutation;

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub is_active: bool,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            is_active: user.is_active,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub is_active: Option<bool>,
}

fn validate_email(email: &str) -> Result<(), ValidationError> {
    ValidationError::require_non_blank("email", email)?;
    ValidationError::require_max_len("email", email, EMAIL_MAX_LEN)
}

fn validate_full_name(full_name: Option<&str>) -> Result<(), ValidationError> {
    match full_name {
        Some(name) => ValidationError::require_max_len("full_name", name, FULL_NAME_MAX_LEN),
        None => Ok(()),
    }
}

/// List all users
#[tracing::instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<Vec<UserResponse>>, ErrorResponse> {
    let users = state
        .store
        .list_users()
        .await
        .map_err(|e| ErrorResponse::from_database(Entity::User, e))?;

    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Get user by ID
#[tracing::instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    EntityId(id): EntityId,
) -> Result<Json<UserResponse>, ErrorResponse> {
    let user = state
        .store
        .find_user(id)
        .await
        .map_err(|e| ErrorResponse::from_database(Entity::User, e))?
        .ok_or_else(|| ErrorResponse::not_found(Entity::User))?;

    Ok(Json(user.into()))
}

/// Create a new user
#[tracing::instrument(skip(state, req), fields(username = %req.username))]
pub async fn create_user(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ErrorResponse> {
    ValidationError::require_non_blank("username", &req.username)?;
    ValidationError::require_max_len("username", &req.username, USERNAME_MAX_LEN)?;
    validate_email(&req.email)?;
    validate_full_name(req.full_name.as_deref())?;

    let user = state
        .store
        .create_user(NewUser {
            username: req.username,
            email: req.email,
            full_name: req.full_name,
            is_active: req.is_active,
        })
        .await
        .map_err(|e| ErrorResponse::from_database(Entity::User, e))?;

    record_entity_mutation("user", "create");
    tracing::info!(user_id = user.id, "User created");

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Update user email, name or activity flag
#[tracing::instrument(skip(state, req))]
pub async fn update_user(
    State(state): State<AppState>,
    EntityId(id): EntityId,
    JsonBody(req): JsonBody<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ErrorResponse> {
    if let Some(email) = &req.email {
        validate_email(email)?;
    }
    validate_full_name(req.full_name.as_deref())?;

    let user = state
        .store
        .update_user(
            id,
            UserPatch {
                email: req.email,
                full_name: req.full_name,
                is_active: req.is_active,
            },
        )
        .await
        .map_err(|e| ErrorResponse::from_database(Entity::User, e))?;

    record_entity_mutation("user", "update");

    Ok(Json(user.into()))
}

/// Delete a user that owns no todos
#[tracing::instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    EntityId(id): EntityId,
) -> Result<Json<MessageResponse>, ErrorResponse> {
    state
        .store
        .delete_user(id)
        .await
        .map_err(|e| match e {
            DatabaseError::ForeignKeyViolation(_) => {
                ErrorResponse::conflict("User still owns todos and cannot be deleted")
            }
            other => ErrorResponse::from_database(Entity::User, other),
        })?;

    record_entity_mutation("user", "delete");
    tracing::info!(user_id = id, "User deleted");

    Ok(Json(MessageResponse::new("User deleted successfully")))
}
