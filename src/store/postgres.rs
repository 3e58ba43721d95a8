use async_trait::async_trait;
use log::{debug, error};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use super::{AccountStore, TaskStore};
use crate::error::AppError;
use crate::models::{NewUser, ProfileChanges, Task, User};

const USER_COLUMNS: &str =
    "id, name, age, email, password, tokens, avatar, created_at, updated_at";
const TASK_COLUMNS: &str = "id, description, completed, creator_id, created_at, updated_at";

/// Postgres-backed store. Email uniqueness comes from the `users_email_key`
/// index; token appends use `array_append` so they never race; account
/// deletion runs in a transaction.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the bundled migrations.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("migration failed: {}", e)))
    }

    async fn update_returning(&self, sql: &str, id: Uuid, arg: Option<&str>) -> Result<User, AppError> {
        let query = sqlx::query_as::<_, User>(sql).bind(id);
        let query = match arg {
            Some(value) => query.bind(value.to_string()),
            None => query,
        };
        query
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))
    }
}

/// Deletes every task created by `creator_id`. Runs on the pool for
/// `delete_many` and inside the transaction for the account cascade.
async fn delete_tasks_of<'e, E>(executor: E, creator_id: Uuid) -> Result<u64, AppError>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM tasks WHERE creator_id = $1")
        .bind(creator_id)
        .execute(executor)
        .await
        .map_err(|e| {
            error!("task cleanup for user {} failed: {}", creator_id, e);
            AppError::CascadeError(e.to_string())
        })?;
    Ok(result.rows_affected())
}

#[async_trait]
impl AccountStore for PgStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, AppError> {
        let sql = format!(
            "INSERT INTO users (id, name, age, email, password) VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            USER_COLUMNS
        );
        let created = sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.name)
            .bind(user.age)
            .bind(&user.email)
            .bind(&user.password_hash)
            .fetch_one(&self.pool)
            .await?;
        Ok(created)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_with_token(&self, id: Uuid, token: &str) -> Result<Option<User>, AppError> {
        let sql = format!(
            "SELECT {} FROM users WHERE id = $1 AND $2 = ANY(tokens)",
            USER_COLUMNS
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> Result<User, AppError> {
        let sql = format!(
            "UPDATE users SET name = COALESCE($2, name), age = COALESCE($3, age), \
             email = COALESCE($4, email), password = COALESCE($5, password), updated_at = now() \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(changes.name)
            .bind(changes.age)
            .bind(changes.email)
            .bind(changes.password_hash)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))
    }

    async fn push_token(&self, id: Uuid, token: &str) -> Result<User, AppError> {
        let sql = format!(
            "UPDATE users SET tokens = array_append(tokens, $2), updated_at = now() \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        self.update_returning(&sql, id, Some(token)).await
    }

    async fn remove_token(&self, id: Uuid, token: &str) -> Result<User, AppError> {
        let sql = format!(
            "UPDATE users SET tokens = array_remove(tokens, $2), updated_at = now() \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        self.update_returning(&sql, id, Some(token)).await
    }

    async fn clear_tokens(&self, id: Uuid) -> Result<User, AppError> {
        let sql = format!(
            "UPDATE users SET tokens = '{{}}', updated_at = now() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        self.update_returning(&sql, id, None).await
    }

    async fn set_avatar(&self, id: Uuid, avatar: Option<Vec<u8>>) -> Result<User, AppError> {
        let sql = format!(
            "UPDATE users SET avatar = $2, updated_at = now() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(avatar)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))
    }

    async fn delete_user_cascade(&self, id: Uuid) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await?;

        let removed = delete_tasks_of(&mut *tx, id).await?;

        let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if deleted == 0 {
            // dropping `tx` rolls back the task removal
            return Err(AppError::NotFound("User not found".into()));
        }

        tx.commit().await?;
        debug!("deleted user {} and {} tasks", id, removed);
        Ok(removed)
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn insert_task(&self, task: Task) -> Result<Task, AppError> {
        let sql = format!(
            "INSERT INTO tasks (id, description, completed, creator_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            TASK_COLUMNS
        );
        Ok(sqlx::query_as::<_, Task>(&sql)
            .bind(task.id)
            .bind(&task.description)
            .bind(task.completed)
            .bind(task.creator_id)
            .bind(task.created_at)
            .bind(task.updated_at)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn tasks_owned_by(&self, creator_id: Uuid) -> Result<Vec<Task>, AppError> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE creator_id = $1 ORDER BY created_at DESC",
            TASK_COLUMNS
        );
        Ok(sqlx::query_as::<_, Task>(&sql)
            .bind(creator_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn delete_many(&self, creator_id: Uuid) -> Result<u64, AppError> {
        delete_tasks_of(&self.pool, creator_id).await
    }
}
