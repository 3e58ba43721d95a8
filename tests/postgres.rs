//! Store tests against a real Postgres. Run with
//! `DATABASE_URL=postgres://... cargo test -- --ignored`.

use std::collections::HashSet;
use std::sync::Arc;

use dotenv::dotenv;
use sqlx::PgPool;
use taskforge_accounts::models::{Task, TaskInput, UserInput};
use taskforge_accounts::store::{AccountStore, PgStore, TaskStore};
use taskforge_accounts::{AccountService, AccountSettings, AppError};

async fn service() -> (AccountService, PgStore) {
    dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");
    let pool = PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to test DB");
    let store = PgStore::new(pool);
    store.migrate().await.expect("migrations failed");

    let settings = AccountSettings {
        jwt_secret: "pg-test-secret".into(),
        bcrypt_cost: 4,
        token_ttl_hours: None,
    };
    (AccountService::new(Arc::new(store.clone()), &settings), store)
}

async fn cleanup_user(store: &PgStore, email: &str) {
    if let Ok(Some(user)) = store.find_user_by_email(email).await {
        let _ = store.delete_user_cascade(user.id).await;
    }
}

fn input(email: &str) -> UserInput {
    UserInput {
        name: None,
        age: Some(20),
        email: email.into(),
        password: "qwerty123".into(),
    }
}

#[ignore]
#[actix_rt::test]
async fn test_pg_unique_email_after_normalization() {
    let (svc, store) = service().await;
    cleanup_user(&store, "pg-unique@example.com").await;

    svc.validate_and_persist(input("PG-Unique@example.com"))
        .await
        .unwrap();
    let second = svc.validate_and_persist(input("pg-unique@example.com")).await;
    assert!(matches!(second, Err(AppError::UniquenessError(_))));

    cleanup_user(&store, "pg-unique@example.com").await;
}

#[ignore]
#[actix_rt::test]
async fn test_pg_concurrent_tokens_are_all_kept() {
    let (svc, store) = service().await;
    cleanup_user(&store, "pg-tokens@example.com").await;
    let user = svc
        .validate_and_persist(input("pg-tokens@example.com"))
        .await
        .unwrap();

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let svc = svc.clone();
            let user = user.clone();
            actix_rt::spawn(async move { svc.generate_auth_token(&user).await })
        })
        .collect();
    let mut issued = HashSet::new();
    for handle in handles {
        issued.insert(handle.await.unwrap().unwrap());
    }

    let stored = store.find_user(user.id).await.unwrap().unwrap();
    let persisted: HashSet<String> = stored.tokens.into_iter().collect();
    assert_eq!(persisted, issued);

    cleanup_user(&store, "pg-tokens@example.com").await;
}

#[ignore]
#[actix_rt::test]
async fn test_pg_delete_account_cascades() {
    let (svc, store) = service().await;
    cleanup_user(&store, "pg-cascade@example.com").await;
    let user = svc
        .validate_and_persist(input("pg-cascade@example.com"))
        .await
        .unwrap();
    for i in 0..3 {
        let task = Task::new(
            TaskInput {
                description: format!("pg task {}", i),
                completed: false,
            },
            user.id,
        );
        store.insert_task(task).await.unwrap();
    }

    svc.delete_account(&user).await.unwrap();

    assert!(store.tasks_owned_by(user.id).await.unwrap().is_empty());
    assert!(store.find_user(user.id).await.unwrap().is_none());
}

#[ignore]
#[actix_rt::test]
async fn test_pg_delete_many_removes_only_that_creator() {
    let (svc, store) = service().await;
    cleanup_user(&store, "pg-many@example.com").await;
    cleanup_user(&store, "pg-other@example.com").await;
    let owner = svc
        .validate_and_persist(input("pg-many@example.com"))
        .await
        .unwrap();
    let other = svc
        .validate_and_persist(input("pg-other@example.com"))
        .await
        .unwrap();
    for creator in [owner.id, owner.id, other.id] {
        let task = Task::new(
            TaskInput {
                description: "pg bulk".into(),
                completed: false,
            },
            creator,
        );
        store.insert_task(task).await.unwrap();
    }

    assert_eq!(store.delete_many(owner.id).await.unwrap(), 2);
    assert_eq!(store.delete_many(owner.id).await.unwrap(), 0);
    assert_eq!(store.tasks_owned_by(other.id).await.unwrap().len(), 1);

    cleanup_user(&store, "pg-many@example.com").await;
    cleanup_user(&store, "pg-other@example.com").await;
}
