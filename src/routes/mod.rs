pub mod health;
pub mod users;

use actix_web::web;

use crate::accounts::MAX_AVATAR_BYTES;

/// Registers the `/users` routes. Public routes come first so the
/// method-guarded resources resolve before the `/me` ones.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::PayloadConfig::new(MAX_AVATAR_BYTES + 1)).service(
        web::scope("/users")
            .service(users::register)
            .service(users::login)
            .service(users::get_avatar)
            .service(users::logout)
            .service(users::logout_all)
            .service(users::me)
            .service(users::update_me)
            .service(users::delete_me)
            .service(users::my_tasks)
            .service(users::upload_avatar)
            .service(users::delete_avatar),
    );
}
