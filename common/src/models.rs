// Domain models for the todo schema variant

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// Column widths of the todo schema's VARCHAR columns
pub const USERNAME_MAX_LEN: usize = 80;
pub const EMAIL_MAX_LEN: usize = 255;
pub const FULL_NAME_MAX_LEN: usize = 255;
pub const TITLE_MAX_LEN: usize = 255;

/// A row of the `users` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub is_active: bool,
}

/// Owner fields embedded in joined todo reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub full_name: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
        }
    }
}

/// A row of the `todos` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Todo {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A todo together with its owner, loaded in one round trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoWithOwner {
    pub todo: Todo,
    pub owner: UserSummary,
}

/// Fields accepted when inserting a todo; optional ones fall back to column defaults
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTodo {
    pub user_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub completed: Option<bool>,
}

/// Partial update for a todo. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
}

impl TodoPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.completed.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub is_active: Option<bool>,
}

/// Partial update for a user. Usernames are immutable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub is_active: Option<bool>,
}
