// Data access layer: handlers see the `Store` trait object, `PgStore` runs
// it on PostgreSQL and `MemoryStore` keeps the same constraints in process.
// Owner reads use one JOIN; users that still own todos cannot be deleted.

pub mod memory;
pub mod pg;
pub mod queries;
pub mod todo;
pub mod user;

use async_trait::async_trait;

use crate::errors::DatabaseError;
use crate::models::{NewTodo, NewUser, Todo, TodoPatch, TodoWithOwner, User, UserPatch};

pub use memory::MemoryStore;
pub use pg::PgStore;

/// Todo operations
#[async_trait]
pub trait TodoStore: Send + Sync {
    /// All todos ordered by id
    async fn list_todos(&self) -> Result<Vec<Todo>, DatabaseError>;

    /// All todos with their owner, in one round trip
    async fn list_todos_with_owner(&self) -> Result<Vec<TodoWithOwner>, DatabaseError>;

    async fn find_todo(&self, id: i32) -> Result<Option<Todo>, DatabaseError>;

    async fn find_todo_with_owner(&self, id: i32) -> Result<Option<TodoWithOwner>, DatabaseError>;

    /// Insert a todo; `user_id` must reference an existing user
    async fn create_todo(&self, new_todo: NewTodo) -> Result<Todo, DatabaseError>;

    /// Insert a todo and return it joined with its owner
    async fn create_todo_with_owner(
        &self,
        new_todo: NewTodo,
    ) -> Result<TodoWithOwner, DatabaseError>;

    /// Apply the fields present in `patch` and refresh `updated_at`.
    /// Returns `DatabaseError::NotFound` when no todo has this id.
    async fn update_todo(&self, id: i32, patch: TodoPatch) -> Result<Todo, DatabaseError>;

    /// Returns `DatabaseError::NotFound` when no todo has this id
    async fn delete_todo(&self, id: i32) -> Result<(), DatabaseError>;
}

/// User operations
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn list_users(&self) -> Result<Vec<User>, DatabaseError>;

    async fn find_user(&self, id: i32) -> Result<Option<User>, DatabaseError>;

    /// Insert a user; `full_name` defaults to "" and `is_active` to true
    async fn create_user(&self, new_user: NewUser) -> Result<User, DatabaseError>;

    async fn update_user(&self, id: i32, patch: UserPatch) -> Result<User, DatabaseError>;

    /// Fails with `DatabaseError::ForeignKeyViolation` while the user owns todos
    async fn delete_user(&self, id: i32) -> Result<(), DatabaseError>;
}

/// Everything a request handler needs from storage
#[async_trait]
pub trait Store: TodoStore + UserStore {
    async fn health_check(&self) -> Result<(), DatabaseError>;
}
