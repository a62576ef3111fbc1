// In-process store with the same constraint semantics as the PostgreSQL schema

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{Store, TodoStore, UserStore};
use crate::errors::DatabaseError;
use crate::models::{
    NewTodo, NewUser, Todo, TodoPatch, TodoWithOwner, User, UserPatch, UserSummary, EMAIL_MAX_LEN,
    FULL_NAME_MAX_LEN, TITLE_MAX_LEN, USERNAME_MAX_LEN,
};

/// Same check PostgreSQL applies to a `VARCHAR(max)` column
fn check_len(column: &str, value: &str, max: usize) -> Result<(), DatabaseError> {
    if value.chars().count() > max {
        return Err(DatabaseError::ValueTooLong(format!(
            "value too long for {} (max {} characters)",
            column, max
        )));
    }
    Ok(())
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<i32, User>,
    todos: BTreeMap<i32, Todo>,
    last_user_id: i32,
    last_todo_id: i32,
}

impl Tables {
    fn owner_of(&self, todo: &Todo) -> Result<UserSummary, DatabaseError> {
        self.users
            .get(&todo.user_id)
            .map(UserSummary::from)
            .ok_or_else(|| {
                DatabaseError::ForeignKeyViolation(format!(
                    "todo {} references missing user {}",
                    todo.id, todo.user_id
                ))
            })
    }

    fn with_owner(&self, todo: &Todo) -> Result<TodoWithOwner, DatabaseError> {
        Ok(TodoWithOwner {
            owner: self.owner_of(todo)?,
            todo: todo.clone(),
        })
    }

    fn check_unique_user(&self, id: Option<i32>, username: &str, email: &str) -> Result<(), DatabaseError> {
        for user in self.users.values().filter(|u| Some(u.id) != id) {
            if user.username == username {
                return Err(DatabaseError::DuplicateKey(format!(
                    "username '{}' already exists",
                    username
                )));
            }
            if user.email == email {
                return Err(DatabaseError::DuplicateKey(format!(
                    "email '{}' already exists",
                    email
                )));
            }
        }
        Ok(())
    }
}

/// Store kept entirely in memory.
///
/// Ids are assigned sequentially from 1, usernames and emails are unique,
/// todos must reference an existing user and users owning todos cannot be
/// deleted, matching the constraints declared for the todo schema.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        // No invariant spans a panic point, so a poisoned lock is still consistent
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert_todo(tables: &mut Tables, new_todo: NewTodo) -> Result<Todo, DatabaseError> {
        check_len("title", &new_todo.title, TITLE_MAX_LEN)?;
        if !tables.users.contains_key(&new_todo.user_id) {
            return Err(DatabaseError::ForeignKeyViolation(format!(
                "user {} does not exist",
                new_todo.user_id
            )));
        }

        tables.last_todo_id += 1;
        let now = Utc::now();
        let todo = Todo {
            id: tables.last_todo_id,
            user_id: new_todo.user_id,
            title: new_todo.title,
            description: new_todo.description.unwrap_or_default(),
            completed: new_todo.completed.unwrap_or(false),
            created_at: now,
            updated_at: now,
        };
        tables.todos.insert(todo.id, todo.clone());
        Ok(todo)
    }
}

#[async_trait]
impl TodoStore for MemoryStore {
    async fn list_todos(&self) -> Result<Vec<Todo>, DatabaseError> {
        Ok(self.tables().todos.values().cloned().collect())
    }

    async fn list_todos_with_owner(&self) -> Result<Vec<TodoWithOwner>, DatabaseError> {
        let tables = self.tables();
        tables
            .todos
            .values()
            .map(|todo| tables.with_owner(todo))
            .collect()
    }

    async fn find_todo(&self, id: i32) -> Result<Option<Todo>, DatabaseError> {
        Ok(self.tables().todos.get(&id).cloned())
    }

    async fn find_todo_with_owner(&self, id: i32) -> Result<Option<TodoWithOwner>, DatabaseError> {
        let tables = self.tables();
        tables
            .todos
            .get(&id)
            .map(|todo| tables.with_owner(todo))
            .transpose()
    }

    async fn create_todo(&self, new_todo: NewTodo) -> Result<Todo, DatabaseError> {
        let mut tables = self.tables();
        Self::insert_todo(&mut tables, new_todo)
    }

    async fn create_todo_with_owner(
        &self,
        new_todo: NewTodo,
    ) -> Result<TodoWithOwner, DatabaseError> {
        let mut tables = self.tables();
        let todo = Self::insert_todo(&mut tables, new_todo)?;
        tables.with_owner(&todo)
    }

    async fn update_todo(&self, id: i32, patch: TodoPatch) -> Result<Todo, DatabaseError> {
        let mut tables = self.tables();
        let todo = tables
            .todos
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::NotFound(format!("Todo not found: {}", id)))?;

        if patch.is_empty() {
            return Ok(todo.clone());
        }
        if let Some(title) = &patch.title {
            check_len("title", title, TITLE_MAX_LEN)?;
        }
        if let Some(title) = patch.title {
            todo.title = title;
        }
        if let Some(description) = patch.description {
            todo.description = description;
        }
        if let Some(completed) = patch.completed {
            todo.completed = completed;
        }
        todo.updated_at = Utc::now().max(todo.created_at);

        Ok(todo.clone())
    }

    async fn delete_todo(&self, id: i32) -> Result<(), DatabaseError> {
        self.tables()
            .todos
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DatabaseError::NotFound(format!("Todo not found: {}", id)))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn list_users(&self) -> Result<Vec<User>, DatabaseError> {
        Ok(self.tables().users.values().cloned().collect())
    }

    async fn find_user(&self, id: i32) -> Result<Option<User>, DatabaseError> {
        Ok(self.tables().users.get(&id).cloned())
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, DatabaseError> {
        check_len("username", &new_user.username, USERNAME_MAX_LEN)?;
        check_len("email", &new_user.email, EMAIL_MAX_LEN)?;
        if let Some(full_name) = &new_user.full_name {
            check_len("full_name", full_name, FULL_NAME_MAX_LEN)?;
        }

        let mut tables = self.tables();
        tables.check_unique_user(None, &new_user.username, &new_user.email)?;

        tables.last_user_id += 1;
        let user = User {
            id: tables.last_user_id,
            username: new_user.username,
            email: new_user.email,
            full_name: new_user.full_name.unwrap_or_default(),
            is_active: new_user.is_active.unwrap_or(true),
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: i32, patch: UserPatch) -> Result<User, DatabaseError> {
        let mut tables = self.tables();
        let current = tables
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| DatabaseError::NotFound(format!("User not found: {}", id)))?;

        if let Some(email) = &patch.email {
            check_len("email", email, EMAIL_MAX_LEN)?;
            tables.check_unique_user(Some(id), &current.username, email)?;
        }
        if let Some(full_name) = &patch.full_name {
            check_len("full_name", full_name, FULL_NAME_MAX_LEN)?;
        }

        let user = User {
            email: patch.email.unwrap_or(current.email),
            full_name: patch.full_name.unwrap_or(current.full_name),
            is_active: patch.is_active.unwrap_or(current.is_active),
            ..current
        };
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    async fn delete_user(&self, id: i32) -> Result<(), DatabaseError> {
        let mut tables = self.tables();
        if !tables.users.contains_key(&id) {
            return Err(DatabaseError::NotFound(format!("User not found: {}", id)));
        }
        if tables.todos.values().any(|todo| todo.user_id == id) {
            return Err(DatabaseError::ForeignKeyViolation(format!(
                "user {} still owns todos",
                id
            )));
        }
        tables.users.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with_user() -> (MemoryStore, User) {
        let store = MemoryStore::new();
        let user = store
            .create_user(NewUser {
                username: "ada".to_string(),
                email: "ada@example.com".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        (store, user)
    }

    fn new_todo(user_id: i32, title: &str) -> NewTodo {
        NewTodo {
            user_id,
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_user_defaults() {
        let (_, user) = store_with_user().await;
        assert_eq!(user.id, 1);
        assert_eq!(user.full_name, "");
        assert!(user.is_active);
    }

    #[tokio::test]
    async fn test_create_then_get_uses_defaults() {
        let (store, user) = store_with_user().await;
        let created = store.create_todo(new_todo(user.id, "x")).await.unwrap();

        let fetched = store.find_todo(created.id).await.unwrap().unwrap();
        assert!(!fetched.completed);
        assert_eq!(fetched.title, "x");
        assert_eq!(fetched.description, "");
        assert_eq!(fetched.updated_at, fetched.created_at);
    }

    #[tokio::test]
    async fn test_partial_update_keeps_other_fields() {
        let (store, user) = store_with_user().await;
        let created = store.create_todo(new_todo(user.id, "keep me")).await.unwrap();

        let updated = store
            .update_todo(
                created.id,
                TodoPatch {
                    completed: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.title, "keep me");
        assert!(updated.completed);
        assert!(updated.updated_at >= updated.created_at);
    }

    #[tokio::test]
    async fn test_update_refreshes_updated_at() {
        let (store, user) = store_with_user().await;
        let created = store.create_todo(new_todo(user.id, "tick")).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let updated = store
            .update_todo(
                created.id,
                TodoPatch {
                    title: Some("tock".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(updated.updated_at > created.updated_at);
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn test_values_longer_than_columns_are_rejected() {
        let (store, user) = store_with_user().await;

        let todo = store.create_todo(new_todo(user.id, &"a".repeat(256))).await;
        let user_result = store
            .create_user(NewUser {
                username: "u".repeat(81),
                email: "long@example.com".to_string(),
                ..Default::default()
            })
            .await;

        assert!(matches!(todo, Err(DatabaseError::ValueTooLong(_))));
        assert!(matches!(user_result, Err(DatabaseError::ValueTooLong(_))));
        assert!(store.list_todos().await.unwrap().is_empty());
        assert_eq!(store.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_then_get_is_not_found() {
        let (store, user) = store_with_user().await;
        let created = store.create_todo(new_todo(user.id, "gone")).await.unwrap();

        store.delete_todo(created.id).await.unwrap();
        assert!(store.find_todo(created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_id_does_not_mutate() {
        let (store, user) = store_with_user().await;
        let created = store.create_todo(new_todo(user.id, "stay")).await.unwrap();
        let before = store.list_todos().await.unwrap();

        let update = store
            .update_todo(
                created.id + 100,
                TodoPatch {
                    title: Some("changed".to_string()),
                    ..Default::default()
                },
            )
            .await;
        let delete = store.delete_todo(created.id + 100).await;

        assert!(matches!(update, Err(DatabaseError::NotFound(_))));
        assert!(matches!(delete, Err(DatabaseError::NotFound(_))));
        assert_eq!(store.list_todos().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_todo_requires_existing_user() {
        let store = MemoryStore::new();
        let result = store.create_todo(new_todo(42, "orphan")).await;
        assert!(matches!(result, Err(DatabaseError::ForeignKeyViolation(_))));
        assert!(store.list_todos().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_username_and_email_rejected() {
        let (store, _) = store_with_user().await;

        let same_name = store
            .create_user(NewUser {
                username: "ada".to_string(),
                email: "other@example.com".to_string(),
                ..Default::default()
            })
            .await;
        let same_email = store
            .create_user(NewUser {
                username: "other".to_string(),
                email: "ada@example.com".to_string(),
                ..Default::default()
            })
            .await;

        assert!(matches!(same_name, Err(DatabaseError::DuplicateKey(_))));
        assert!(matches!(same_email, Err(DatabaseError::DuplicateKey(_))));
    }

    #[tokio::test]
    async fn test_delete_user_with_todos_is_restricted() {
        let (store, user) = store_with_user().await;
        store.create_todo(new_todo(user.id, "owned")).await.unwrap();

        let result = store.delete_user(user.id).await;
        assert!(matches!(result, Err(DatabaseError::ForeignKeyViolation(_))));
        assert!(store.find_user(user.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_joined_read_embeds_owner() {
        let (store, user) = store_with_user().await;
        let created = store
            .create_todo_with_owner(NewTodo {
                user_id: user.id,
                title: "joined".to_string(),
                description: Some("with owner".to_string()),
                completed: Some(true),
            })
            .await
            .unwrap();

        assert_eq!(created.owner.username, "ada");
        assert_eq!(created.todo.description, "with owner");

        let listed = store.list_todos_with_owner().await.unwrap();
        assert_eq!(listed, vec![created]);
    }
}
