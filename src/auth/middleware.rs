use std::rc::Rc;

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use log::debug;

use crate::accounts::AccountService;
use crate::auth::extractors::AuthenticatedUser;
use crate::error::AppError;

/// Requires a `Bearer` token on every request it wraps.
///
/// The token is resolved through [`AccountService::authenticate`], so it must
/// both verify and still be held by its user. On success the user and the raw
/// token are stored in the request extensions for [`AuthenticatedUser`].
pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let token = req
                .headers()
                .get("Authorization")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(|value| value.trim().to_string())
                .ok_or_else(|| AppError::Unauthorized("Missing token".into()))?;

            let accounts = req
                .app_data::<web::Data<AccountService>>()
                .cloned()
                .ok_or_else(|| {
                    AppError::InternalServerError("AccountService is not registered".into())
                })?;

            let user = accounts.authenticate(&token).await.map_err(|e| {
                debug!("rejected bearer token: {}", e);
                e
            })?;
            req.extensions_mut().insert(AuthenticatedUser { user, token });

            service.call(req).await
        })
    }
}
