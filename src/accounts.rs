//! The account service: registration, credential checks, session tokens,
//! profile changes and account deletion.
//!
//! Every step that a schema framework would run implicitly (trimming,
//! defaulting, validating, hashing before save, removing tasks before the
//! user) is an explicit call inside the operation that needs it.

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::auth::{hash_password, verify_password, TokenKeys};
use crate::error::{AppError, AuthFailure};
use crate::models::user::{normalize_email, normalize_name, validate_age, validate_password};
use crate::models::{NewUser, ProfileChanges, PublicUser, Task, User, UserInput, UserUpdate};
use crate::store::Store;

// Login attempts for unknown emails are verified against a digest of this.
const UNKNOWN_USER_PASSWORD: &str = "no-such-account";

/// Largest avatar accepted, in bytes.
pub const MAX_AVATAR_BYTES: usize = 1_000_000;

/// Everything the service needs from configuration.
#[derive(Debug, Clone)]
pub struct AccountSettings {
    pub jwt_secret: String,
    pub bcrypt_cost: u32,
    pub token_ttl_hours: Option<i64>,
}

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn Store>,
    keys: TokenKeys,
    bcrypt_cost: u32,
    unknown_user_digest: Arc<OnceCell<String>>,
}

impl AccountService {
    pub fn new(store: Arc<dyn Store>, settings: &AccountSettings) -> Self {
        Self {
            store,
            keys: TokenKeys::new(&settings.jwt_secret, settings.token_ttl_hours),
            bcrypt_cost: settings.bcrypt_cost,
            unknown_user_digest: Arc::new(OnceCell::new()),
        }
    }

    /// Validates and normalizes a registration, hashes the password and stores the user.
    ///
    /// Nothing is written unless every field passes. Email collisions are
    /// decided by the store, so concurrent registrations cannot both win.
    pub async fn validate_and_persist(&self, input: UserInput) -> Result<User, AppError> {
        let age = validate_age(input.age.unwrap_or(0))?;
        let email = normalize_email(&input.email)?;
        let password = validate_password(&input.password)?;
        let name = normalize_name(input.name.as_deref())?;

        let password_hash = self.hash(&password).await?;
        let user = self
            .store
            .insert_user(NewUser {
                name,
                age,
                email,
                password_hash,
            })
            .await?;

        info!("registered user {}", user.id);
        Ok(user)
    }

    /// Registers a user and issues their first session token.
    pub async fn register(&self, input: UserInput) -> Result<(User, String), AppError> {
        let user = self.validate_and_persist(input).await?;
        let token = self.generate_auth_token(&user).await?;
        Ok((user, token))
    }

    /// Looks a user up by email and checks the password against the stored digest.
    ///
    /// The two failure reasons stay distinct in the returned `AuthFailure` for
    /// logging; `AppError`'s HTTP rendering does not tell them apart.
    pub async fn find_by_credentials(&self, email: &str, password: &str) -> Result<User, AppError> {
        let email = email.trim().to_lowercase();
        let user = match self.store.find_user_by_email(&email).await? {
            Some(user) => user,
            None => {
                let digest = self
                    .unknown_user_digest
                    .get_or_try_init(|| self.hash(UNKNOWN_USER_PASSWORD))
                    .await?;
                self.verify(password, digest).await?;
                warn!("login rejected: {}", AuthFailure::UserNotFound);
                return Err(AppError::AuthError(AuthFailure::UserNotFound));
            }
        };

        if !self.verify(password, &user.password).await? {
            warn!("login rejected for user {}: {}", user.id, AuthFailure::InvalidCredentials);
            return Err(AppError::AuthError(AuthFailure::InvalidCredentials));
        }
        Ok(user)
    }

    /// Checks credentials and issues a new session token.
    pub async fn login(&self, email: &str, password: &str) -> Result<(User, String), AppError> {
        let user = self.find_by_credentials(email, password).await?;
        let token = self.generate_auth_token(&user).await?;
        info!("user {} logged in", user.id);
        Ok((user, token))
    }

    /// Signs a token for `user` and appends it to the stored token sequence.
    ///
    /// The append is a single store-side write, so concurrent logins for the
    /// same user each keep their token.
    pub async fn generate_auth_token(&self, user: &User) -> Result<String, AppError> {
        let token = self.keys.generate_token(user.id)?;
        self.store.push_token(user.id, &token).await?;
        debug!("issued token for user {}", user.id);
        Ok(token)
    }

    /// The external view of `user`: no password digest, tokens or avatar.
    pub fn serialize_for_exposure(&self, user: &User) -> PublicUser {
        user.to_public()
    }

    /// Resolves a bearer token to its user. The token must verify and must
    /// still be in the user's token sequence.
    pub async fn authenticate(&self, token: &str) -> Result<User, AppError> {
        let claims = self.keys.verify_token(token)?;
        self.store
            .find_user_with_token(claims.sub, token)
            .await?
            .ok_or_else(|| AppError::Unauthorized("token is not active".into()))
    }

    /// Revokes one session token.
    pub async fn logout(&self, user: &User, token: &str) -> Result<User, AppError> {
        let user = self.store.remove_token(user.id, token).await?;
        info!("user {} logged out", user.id);
        Ok(user)
    }

    /// Revokes every session token of `user`.
    pub async fn logout_all(&self, user: &User) -> Result<User, AppError> {
        let user = self.store.clear_tokens(user.id).await?;
        info!("user {} logged out of all sessions", user.id);
        Ok(user)
    }

    /// Applies profile changes with the same rules as registration. The
    /// password is re-hashed only when a new one is supplied.
    pub async fn update_profile(&self, user: &User, update: UserUpdate) -> Result<User, AppError> {
        if update.is_empty() {
            return Err(AppError::BadRequest("No updates supplied".into()));
        }

        let mut changes = ProfileChanges::default();
        if let Some(age) = update.age {
            changes.age = Some(validate_age(age)?);
        }
        if let Some(email) = update.email.as_deref() {
            changes.email = Some(normalize_email(email)?);
        }
        if let Some(password) = update.password.as_deref() {
            let password = validate_password(password)?;
            changes.password_hash = Some(self.hash(&password).await?);
        }
        if let Some(name) = update.name.as_deref() {
            changes.name = Some(normalize_name(Some(name))?);
        }

        self.store.update_profile(user.id, changes).await
    }

    /// Deletes the user together with every task they created.
    ///
    /// Both removals happen in one store operation; if the tasks cannot be
    /// removed the user is kept and `CascadeError` is returned.
    pub async fn delete_account(&self, user: &User) -> Result<(), AppError> {
        let removed = self.store.delete_user_cascade(user.id).await?;
        info!("deleted user {} with {} tasks", user.id, removed);
        Ok(())
    }

    /// Tasks created by `user_id`, newest first.
    pub async fn tasks_owned_by(&self, user_id: Uuid) -> Result<Vec<Task>, AppError> {
        self.store.tasks_owned_by(user_id).await
    }

    pub async fn set_avatar(&self, user: &User, bytes: Vec<u8>) -> Result<User, AppError> {
        if bytes.is_empty() {
            return Err(AppError::validation("avatar", "Please upload an image"));
        }
        if bytes.len() > MAX_AVATAR_BYTES {
            return Err(AppError::validation("avatar", "Avatar must be at most 1 MB"));
        }
        self.store.set_avatar(user.id, Some(bytes)).await
    }

    pub async fn remove_avatar(&self, user: &User) -> Result<User, AppError> {
        self.store.set_avatar(user.id, None).await
    }

    /// The avatar bytes of `user_id`, or `NotFound` if the user or avatar is missing.
    pub async fn avatar_of(&self, user_id: Uuid) -> Result<Vec<u8>, AppError> {
        self.store
            .find_user(user_id)
            .await?
            .and_then(|u| u.avatar)
            .ok_or_else(|| AppError::NotFound("Avatar not found".into()))
    }

    // bcrypt is CPU-bound by design; keep it off the async workers.
    async fn hash(&self, password: &str) -> Result<String, AppError> {
        let password = password.to_string();
        let cost = self.bcrypt_cost;
        tokio::task::spawn_blocking(move || hash_password(&password, cost))
            .await
            .map_err(|e| AppError::InternalServerError(format!("hashing task failed: {}", e)))?
    }

    async fn verify(&self, password: &str, digest: &str) -> Result<bool, AppError> {
        let password = password.to_string();
        let digest = digest.to_string();
        tokio::task::spawn_blocking(move || verify_password(&password, &digest))
            .await
            .map_err(|e| AppError::InternalServerError(format!("verify task failed: {}", e)))?
    }
}
