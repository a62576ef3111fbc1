// Property-based tests for the data access layer and configuration layering

use common::config::Settings;
use common::db::{MemoryStore, TodoStore, UserStore};
use common::errors::DatabaseError;
use common::models::{NewTodo, NewUser, TodoPatch};
use proptest::prelude::*;
use std::collections::HashMap;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

async fn store_with_owner() -> (MemoryStore, i32) {
    let store = MemoryStore::new();
    let user = store
        .create_user(NewUser {
            username: "owner".to_string(),
            email: "owner@example.com".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    (store, user.id)
}

/// *For any* title and completion flag, a created todo reads back unchanged
/// with `completed` defaulting to false and equal timestamps.
#[test]
fn property_create_then_get() {
    proptest!(|(
        title in "[a-zA-Z0-9 ]{1,40}",
        completed in proptest::option::of(any::<bool>())
    )| {
        let rt = runtime();
        rt.block_on(async {
            let (store, user_id) = store_with_owner().await;
            let created = store
                .create_todo(NewTodo {
                    user_id,
                    title: title.clone(),
                    description: None,
                    completed,
                })
                .await
                .unwrap();

            let fetched = store.find_todo(created.id).await.unwrap().unwrap();
            prop_assert_eq!(&fetched.title, &title);
            prop_assert_eq!(fetched.completed, completed.unwrap_or(false));
            prop_assert_eq!(fetched.created_at, fetched.updated_at);
            Ok(())
        })?;
    });
}

/// *For any* patch, fields absent from it keep their previous values and
/// `updated_at` never precedes `created_at`.
#[test]
fn property_partial_update_preserves_absent_fields() {
    proptest!(|(
        title in proptest::option::of("[a-z]{1,20}"),
        description in proptest::option::of("[a-z ]{0,40}"),
        completed in proptest::option::of(any::<bool>())
    )| {
        let rt = runtime();
        rt.block_on(async {
            let (store, user_id) = store_with_owner().await;
            let original = store
                .create_todo(NewTodo {
                    user_id,
                    title: "original".to_string(),
                    description: Some("before".to_string()),
                    completed: Some(false),
                })
                .await
                .unwrap();

            let patch = TodoPatch {
                title: title.clone(),
                description: description.clone(),
                completed,
            };
            let updated = store.update_todo(original.id, patch).await.unwrap();

            prop_assert_eq!(updated.title, title.unwrap_or(original.title));
            prop_assert_eq!(updated.description, description.unwrap_or(original.description));
            prop_assert_eq!(updated.completed, completed.unwrap_or(original.completed));
            prop_assert!(updated.updated_at >= updated.created_at);
            Ok(())
        })?;
    });
}

/// *For any* id that was never issued, update and delete report not-found
/// and leave the table untouched.
#[test]
fn property_missing_ids_do_not_mutate() {
    proptest!(|(offset in 1i32..10_000)| {
        let rt = runtime();
        rt.block_on(async {
            let (store, user_id) = store_with_owner().await;
            let todo = store
                .create_todo(NewTodo {
                    user_id,
                    title: "stay".to_string(),
                    ..Default::default()
                })
                .await
                .unwrap();
            let before = store.list_todos().await.unwrap();
            let missing = todo.id + offset;

            let update = store
                .update_todo(missing, TodoPatch { completed: Some(true), ..Default::default() })
                .await;
            let delete = store.delete_todo(missing).await;

            prop_assert!(matches!(update, Err(DatabaseError::NotFound(_))));
            prop_assert!(matches!(delete, Err(DatabaseError::NotFound(_))));
            prop_assert_eq!(store.list_todos().await.unwrap(), before);
            Ok(())
        })?;
    });
}

/// *For any* legacy `DB_PORT`/`PORT` pair, the plain variables win over defaults.
#[test]
fn property_legacy_ports_override_defaults() {
    proptest!(|(db_port in 1u16..=u16::MAX, http_port in 1u16..=u16::MAX)| {
        let env: HashMap<&str, String> = HashMap::from([
            ("DB_PORT", db_port.to_string()),
            ("PORT", http_port.to_string()),
        ]);

        let settings = Settings::load_with_env("does-not-exist", |key| env.get(key).cloned())
            .unwrap();

        prop_assert_eq!(settings.database.port, db_port);
        prop_assert_eq!(settings.server.port, http_port);
        prop_assert_eq!(settings.database.host.as_str(), "postgres");
        prop_assert!(settings.validate().is_ok());
    });
}
