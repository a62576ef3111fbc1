// Integration tests against a live PostgreSQL instance
//
// Connection settings come from the usual layers, so `DB_HOST`, `DB_PORT`,
// `DB_NAME`, `DB_USER` and `DB_PASSWORD` point the tests at a database.
// Run with: cargo test -p integration-tests -- --ignored

use common::config::Settings;
use common::db::{DbPool, PgStore, SchemaInitializer, SchemaVariant, Store, TodoStore, UserStore};
use common::errors::DatabaseError;
use common::models::{NewTodo, NewUser, TodoPatch};
use common::retry::ExponentialBackoff;

/// Connect with a short backoff so a missing database fails quickly
async fn setup_test_db() -> DbPool {
    let settings = Settings::load().expect("Failed to load settings");
    let strategy = ExponentialBackoff::with_config(3, 1, 2, 0.0);

    DbPool::connect_with_strategy(&settings.database, &strategy)
        .await
        .expect("Failed to connect to test database")
}

async fn setup_store() -> PgStore {
    let db_pool = setup_test_db().await;
    SchemaInitializer::new(db_pool.pool().clone())
        .ensure(SchemaVariant::Todo)
        .await
        .expect("Failed to create todo schema");
    PgStore::new(db_pool)
}

/// Usernames and emails unique per run, since the tables are shared
fn unique_user(prefix: &str) -> NewUser {
    let suffix = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    NewUser {
        username: format!("{}_{}", prefix, suffix),
        email: format!("{}_{}@example.com", prefix, suffix),
        ..Default::default()
    }
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_connect_and_health_check() {
    let db_pool = setup_test_db().await;

    db_pool.health_check().await.expect("Health check failed");
    assert!(db_pool.size() >= 1);

    db_pool.close().await;
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_schema_initialization_is_idempotent() {
    let db_pool = setup_test_db().await;
    let initializer = SchemaInitializer::new(db_pool.pool().clone());

    for variant in [SchemaVariant::Todo, SchemaVariant::Airline] {
        initializer.ensure(variant).await.expect("First run failed");
        let first = initializer.existing_tables(variant).await.unwrap();

        initializer.ensure(variant).await.expect("Second run failed");
        let second = initializer.existing_tables(variant).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), variant.tables().len());
    }
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_todo_lifecycle() {
    let store = setup_store().await;
    let user = store.create_user(unique_user("lifecycle")).await.unwrap();

    let created = store
        .create_todo(NewTodo {
            user_id: user.id,
            title: "x".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(!created.completed);
    assert_eq!(created.created_at, created.updated_at);

    let fetched = store.find_todo(created.id).await.unwrap().unwrap();
    assert_eq!(fetched, created);

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
    assert_eq!(updated.title, "x");
    assert!(updated.completed);
    assert!(updated.updated_at >= updated.created_at);

    let joined = store.find_todo_with_owner(created.id).await.unwrap().unwrap();
    assert_eq!(joined.owner.id, user.id);
    assert_eq!(joined.owner.username, user.username);

    store.delete_todo(created.id).await.unwrap();
    assert!(store.find_todo(created.id).await.unwrap().is_none());

    store.delete_user(user.id).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_update_refreshes_updated_at() {
    let store = setup_store().await;
    let user = store.create_user(unique_user("refresh")).await.unwrap();
    let created = store
        .create_todo(NewTodo {
            user_id: user.id,
            title: "before".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    // Separate statement, separate transaction, later now()
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let updated = store
        .update_todo(
            created.id,
            TodoPatch {
                title: Some("after".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(updated.updated_at > created.updated_at);
    assert_eq!(updated.created_at, created.created_at);

    let reread = store.find_todo(created.id).await.unwrap().unwrap();
    assert_eq!(reread.updated_at, updated.updated_at);

    store.delete_todo(created.id).await.unwrap();
    store.delete_user(user.id).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_values_longer_than_columns_are_rejected() {
    let store = setup_store().await;
    let user = store.create_user(unique_user("width")).await.unwrap();

    let todo = store
        .create_todo(NewTodo {
            user_id: user.id,
            title: "a".repeat(300),
            ..Default::default()
        })
        .await;
    assert!(matches!(todo, Err(DatabaseError::ValueTooLong(_))));

    let long_name = NewUser {
        username: "u".repeat(81),
        ..unique_user("width")
    };
    let created = store.create_user(long_name).await;
    assert!(matches!(created, Err(DatabaseError::ValueTooLong(_))));

    store.delete_user(user.id).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_missing_ids_and_constraints() {
    let store = setup_store().await;

    let orphan = store
        .create_todo(NewTodo {
            user_id: i32::MAX,
            title: "orphan".to_string(),
            ..Default::default()
        })
        .await;
    assert!(matches!(orphan, Err(DatabaseError::ForeignKeyViolation(_))));

    let missing = store.delete_todo(i32::MAX).await;
    assert!(matches!(missing, Err(DatabaseError::NotFound(_))));

    let new_user = unique_user("dup");
    let user = store.create_user(new_user.clone()).await.unwrap();
    let duplicate = store.create_user(new_user).await;
    assert!(matches!(duplicate, Err(DatabaseError::DuplicateKey(_))));

    let todo = store
        .create_todo_with_owner(NewTodo {
            user_id: user.id,
            title: "owned".to_string(),
            description: Some("blocks delete".to_string()),
            completed: None,
        })
        .await
        .unwrap();
    let restricted = store.delete_user(user.id).await;
    assert!(matches!(restricted, Err(DatabaseError::ForeignKeyViolation(_))));

    store.delete_todo(todo.todo.id).await.unwrap();
    store.delete_user(user.id).await.unwrap();
    assert!(store.health_check().await.is_ok());
}
