//! Document store seams.
//!
//! The account service never talks to a database directly; it goes through
//! [`AccountStore`] for user records and [`TaskStore`] for the tasks users own.
//! Two implementations exist: [`PgStore`] on Postgres and [`MemoryStore`].

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{NewUser, ProfileChanges, Task, User};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Persistence contract for user records.
///
/// Implementations own email uniqueness: two concurrent inserts (or updates)
/// with the same email must leave at most one winner, and the loser gets
/// `AppError::UniquenessError`.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Stores a new user, assigning its id and timestamps.
    async fn insert_user(&self, user: NewUser) -> Result<User, AppError>;

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError>;

    /// Exact match on the already-normalized email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// The user with `id`, but only if `token` is still in its token sequence.
    async fn find_user_with_token(&self, id: Uuid, token: &str) -> Result<Option<User>, AppError>;

    /// Applies the set fields of `changes` and bumps `updated_at`.
    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> Result<User, AppError>;

    /// Appends `token` to the user's sequence as a single atomic write, so
    /// concurrent appends for one user never overwrite each other.
    async fn push_token(&self, id: Uuid, token: &str) -> Result<User, AppError>;

    /// Removes every occurrence of `token` from the user's sequence.
    async fn remove_token(&self, id: Uuid, token: &str) -> Result<User, AppError>;

    async fn clear_tokens(&self, id: Uuid) -> Result<User, AppError>;

    /// Replaces (`Some`) or clears (`None`) the avatar.
    async fn set_avatar(&self, id: Uuid, avatar: Option<Vec<u8>>) -> Result<User, AppError>;

    /// Deletes every task whose creator is `id`, then the user, as one unit.
    ///
    /// Returns the number of tasks removed. If task removal fails the user is
    /// left untouched and `AppError::CascadeError` is returned.
    async fn delete_user_cascade(&self, id: Uuid) -> Result<u64, AppError>;
}

/// The slice of task persistence the account service relies on.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert_task(&self, task: Task) -> Result<Task, AppError>;

    /// All tasks created by `creator_id`, newest first.
    async fn tasks_owned_by(&self, creator_id: Uuid) -> Result<Vec<Task>, AppError>;

    /// Bulk delete by owner. Returns the number of tasks removed.
    async fn delete_many(&self, creator_id: Uuid) -> Result<u64, AppError>;
}

/// A store that holds both collections, as the account service needs.
pub trait Store: AccountStore + TaskStore {}

impl<T: AccountStore + TaskStore> Store for T {}
