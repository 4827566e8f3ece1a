use actix_web::{web, FromRequest, HttpMessage};
use common::{Actor, AppError, Role};
use futures_util::future::LocalBoxFuture;
use std::future::{ready, Ready};
use uuid::Uuid;

use crate::error::HttpApiError;
use crate::state::AppState;

/// Claims of a verified access token, placed in request extensions by the
/// JWT middleware.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
}

impl FromRequest for AuthUser {
    type Error = HttpApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &actix_web::HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        if let Some(ext) = req.extensions().get::<AuthUser>() {
            return ready(Ok(ext.clone()));
        }
        ready(Err(HttpApiError::MissingCredentials))
    }
}

/// The token's user, reloaded from storage so deactivated accounts are
/// refused even while their access token is still valid.
#[derive(Debug, Clone, Copy)]
pub struct CurrentActor(pub Actor);

impl FromRequest for CurrentActor {
    type Error = HttpApiError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &actix_web::HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        let user = req.extensions().get::<AuthUser>().cloned();
        let state = req.app_data::<web::Data<AppState>>().cloned();
        Box::pin(async move {
            let user = user.ok_or(HttpApiError::MissingCredentials)?;
            let state = state.ok_or(HttpApiError::App(AppError::Internal))?;
            let actor = state.accounts.resolve_actor(user.user_id).await?;
            Ok(CurrentActor(actor))
        })
    }
}
