pub mod error;
pub mod extractors;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod schemas;
pub mod state;

use actix_web::{error::InternalError, web, App, ResponseError};
use common::AppError;

use crate::error::HttpApiError;

fn bad_request(message: String) -> actix_web::Error {
    let err = HttpApiError::BadRequest(message);
    let resp = err.error_response();
    InternalError::from_response(err, resp).into()
}

fn not_found() -> actix_web::Error {
    let err = HttpApiError::App(AppError::NotFound);
    let resp = err.error_response();
    InternalError::from_response(err, resp).into()
}

pub fn create_app(
    state: state::AppState,
) -> App<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(web::Data::new(state))
        .app_data(web::JsonConfig::default().error_handler(|err, _| bad_request(err.to_string())))
        .app_data(web::PathConfig::default().error_handler(|_, _| not_found()))
        .app_data(web::QueryConfig::default().error_handler(|err, _| bad_request(err.to_string())))
        .service(routes::index)
        .service(routes::auth::register)
        .service(routes::auth::login)
        .service(routes::auth::refresh)
        .service(routes::auth::logout)
        .service(routes::doctors::list)
        .service(routes::doctors::create)
        .service(routes::doctors::available)
        .service(routes::doctors::get)
        .service(routes::doctors::replace)
        .service(routes::doctors::update)
        .service(routes::doctors::remove)
        .service(routes::patients::list)
        .service(routes::patients::create)
        .service(routes::patients::doctors)
        .service(routes::patients::get)
        .service(routes::patients::replace)
        .service(routes::patients::update)
        .service(routes::patients::remove)
        .service(routes::mappings::list)
        .service(routes::mappings::create)
        .service(routes::mappings::for_patient)
        .service(routes::mappings::get)
        .service(routes::mappings::replace)
        .service(routes::mappings::update)
        .service(routes::mappings::remove)
        .default_service(web::to(|| async {
            HttpApiError::App(AppError::NotFound).error_response()
        }))
        .wrap(middleware::JwtAuth)
}
