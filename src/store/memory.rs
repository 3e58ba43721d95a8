use std::collections::HashMap;
#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{AccountStore, TaskStore};
use crate::error::AppError;
use crate::models::{NewUser, ProfileChanges, Task, User};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    tasks: Vec<Task>,
}

/// In-process store. Every operation runs under one lock, which gives the
/// same guarantees the Postgres store gets from its unique index and
/// transactions.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    #[cfg(test)]
    fail_task_cleanup: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user_count(&self) -> usize {
        self.state.lock().await.users.len()
    }

    /// Makes the next cascades fail at the task-removal step.
    #[cfg(test)]
    pub(crate) fn fail_task_cleanup(&self, fail: bool) {
        self.fail_task_cleanup.store(fail, Ordering::SeqCst);
    }

    #[cfg(test)]
    fn task_cleanup_fails(&self) -> bool {
        self.fail_task_cleanup.load(Ordering::SeqCst)
    }

    #[cfg(not(test))]
    fn task_cleanup_fails(&self) -> bool {
        false
    }

    /// Removes every task created by `creator_id`. Shared by `delete_many`
    /// and the account cascade; the caller already holds the lock.
    fn remove_tasks_of(&self, state: &mut State, creator_id: Uuid) -> Result<u64, AppError> {
        if self.task_cleanup_fails() {
            return Err(AppError::CascadeError(format!(
                "could not remove tasks of user {}",
                creator_id
            )));
        }
        let before = state.tasks.len();
        state.tasks.retain(|t| t.creator_id != creator_id);
        Ok((before - state.tasks.len()) as u64)
    }
}

fn user_mut(state: &mut State, id: Uuid) -> Result<&mut User, AppError> {
    state
        .users
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

fn email_taken(state: &State, email: &str, except: Option<Uuid>) -> bool {
    state
        .users
        .values()
        .any(|u| u.email == email && Some(u.id) != except)
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, AppError> {
        let mut state = self.state.lock().await;
        if email_taken(&state, &user.email, None) {
            return Err(AppError::UniquenessError("email".into()));
        }

        let now = Utc::now();
        let record = User {
            id: Uuid::new_v4(),
            name: user.name,
            age: user.age,
            email: user.email,
            password: user.password_hash,
            tokens: Vec::new(),
            avatar: None,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_with_token(&self, id: Uuid, token: &str) -> Result<Option<User>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .get(&id)
            .filter(|u| u.holds_token(token))
            .cloned())
    }

    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> Result<User, AppError> {
        let mut state = self.state.lock().await;
        if let Some(email) = &changes.email {
            if email_taken(&state, email, Some(id)) {
                return Err(AppError::UniquenessError("email".into()));
            }
        }

        let user = user_mut(&mut state, id)?;
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(age) = changes.age {
            user.age = age;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(hash) = changes.password_hash {
            user.password = hash;
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn push_token(&self, id: Uuid, token: &str) -> Result<User, AppError> {
        let mut state = self.state.lock().await;
        let user = user_mut(&mut state, id)?;
        user.tokens.push(token.to_string());
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn remove_token(&self, id: Uuid, token: &str) -> Result<User, AppError> {
        let mut state = self.state.lock().await;
        let user = user_mut(&mut state, id)?;
        user.tokens.retain(|t| t != token);
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn clear_tokens(&self, id: Uuid) -> Result<User, AppError> {
        let mut state = self.state.lock().await;
        let user = user_mut(&mut state, id)?;
        user.tokens.clear();
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn set_avatar(&self, id: Uuid, avatar: Option<Vec<u8>>) -> Result<User, AppError> {
        let mut state = self.state.lock().await;
        let user = user_mut(&mut state, id)?;
        user.avatar = avatar;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn delete_user_cascade(&self, id: Uuid) -> Result<u64, AppError> {
        let mut state = self.state.lock().await;
        if !state.users.contains_key(&id) {
            return Err(AppError::NotFound("User not found".into()));
        }
        let removed = self.remove_tasks_of(&mut state, id)?;
        state.users.remove(&id);
        Ok(removed)
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn insert_task(&self, task: Task) -> Result<Task, AppError> {
        let mut state = self.state.lock().await;
        state.tasks.push(task.clone());
        Ok(task)
    }

    async fn tasks_owned_by(&self, creator_id: Uuid) -> Result<Vec<Task>, AppError> {
        let state = self.state.lock().await;
        let mut tasks: Vec<Task> = state
            .tasks
            .iter()
            .filter(|t| t.creator_id == creator_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    async fn delete_many(&self, creator_id: Uuid) -> Result<u64, AppError> {
        let mut state = self.state.lock().await;
        self.remove_tasks_of(&mut state, creator_id)
    }
}
