use actix_web::{delete, get, patch, post, web, HttpResponse, Responder};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    accounts::AccountService,
    auth::{AuthMiddleware, AuthResponse, AuthenticatedUser, LoginRequest},
    error::AppError,
    models::{UserInput, UserUpdate},
};

/// Register a new user
///
/// Creates the account and returns it together with a first session token.
///
/// ## Responses:
/// - `201 Created`: `AuthResponse` with the sanitized user and token.
/// - `409 Conflict`: the email is already registered.
/// - `422 Unprocessable Entity`: a field failed validation.
#[post("")]
pub async fn register(
    accounts: web::Data<AccountService>,
    input: web::Json<UserInput>,
) -> Result<impl Responder, AppError> {
    let (user, token) = accounts.register(input.into_inner()).await?;
    Ok(HttpResponse::Created().json(AuthResponse {
        user: accounts.serialize_for_exposure(&user),
        token,
    }))
}

/// Login user
///
/// Checks the credentials and issues an additional session token.
/// Unknown email and wrong password produce the same `401` response.
#[post("/login")]
pub async fn login(
    accounts: web::Data<AccountService>,
    login_data: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    let mut login_data = login_data.into_inner();
    login_data.email = login_data.email.trim().to_lowercase();
    login_data.validate()?;

    let (user, token) = accounts
        .login(&login_data.email, &login_data.password)
        .await?;
    Ok(HttpResponse::Ok().json(AuthResponse {
        user: accounts.serialize_for_exposure(&user),
        token,
    }))
}

/// Revokes the token used for this request.
#[post("/logout", wrap = "AuthMiddleware")]
pub async fn logout(
    accounts: web::Data<AccountService>,
    auth: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    accounts.logout(&auth.user, &auth.token).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Logged out" })))
}

/// Revokes every token of the authenticated user.
#[post("/logoutAll", wrap = "AuthMiddleware")]
pub async fn logout_all(
    accounts: web::Data<AccountService>,
    auth: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    accounts.logout_all(&auth.user).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Logged out of all sessions" })))
}

#[get("/me", wrap = "AuthMiddleware")]
pub async fn me(
    accounts: web::Data<AccountService>,
    auth: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    Ok(HttpResponse::Ok().json(accounts.serialize_for_exposure(&auth.user)))
}

/// Updates the authenticated user's profile.
///
/// Only `name`, `age`, `email` and `password` are accepted; any other key
/// fails deserialization with `400 Bad Request`.
#[patch("/me", wrap = "AuthMiddleware")]
pub async fn update_me(
    accounts: web::Data<AccountService>,
    auth: AuthenticatedUser,
    update: web::Json<UserUpdate>,
) -> Result<impl Responder, AppError> {
    let user = accounts
        .update_profile(&auth.user, update.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(accounts.serialize_for_exposure(&user)))
}

/// Deletes the authenticated user and every task they created.
#[delete("/me", wrap = "AuthMiddleware")]
pub async fn delete_me(
    accounts: web::Data<AccountService>,
    auth: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    accounts.delete_account(&auth.user).await?;
    Ok(HttpResponse::Ok().json(accounts.serialize_for_exposure(&auth.user)))
}

#[get("/me/tasks", wrap = "AuthMiddleware")]
pub async fn my_tasks(
    accounts: web::Data<AccountService>,
    auth: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let tasks = accounts.tasks_owned_by(auth.user.id).await?;
    Ok(HttpResponse::Ok().json(tasks))
}

/// Stores the raw request body as the user's avatar.
#[post("/me/avatar", wrap = "AuthMiddleware")]
pub async fn upload_avatar(
    accounts: web::Data<AccountService>,
    auth: AuthenticatedUser,
    body: web::Bytes,
) -> Result<impl Responder, AppError> {
    accounts.set_avatar(&auth.user, body.to_vec()).await?;
    Ok(HttpResponse::Ok().finish())
}

#[delete("/me/avatar", wrap = "AuthMiddleware")]
pub async fn delete_avatar(
    accounts: web::Data<AccountService>,
    auth: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    accounts.remove_avatar(&auth.user).await?;
    Ok(HttpResponse::Ok().finish())
}

/// Serves a user's avatar. Public: avatars are not credentials.
#[get("/{id}/avatar")]
pub async fn get_avatar(
    accounts: web::Data<AccountService>,
    user_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let bytes = accounts.avatar_of(user_id.into_inner()).await?;
    Ok(HttpResponse::Ok()
        .content_type("application/octet-stream")
        .body(bytes))
}
