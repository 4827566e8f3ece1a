pub mod auth;
pub mod doctors;
pub mod mappings;
pub mod patients;

use actix_web::{get, HttpResponse};
use common::{AppError, Page, PageRequest};
use serde_json::json;

use crate::error::HttpApiError;

pub(crate) fn page_of<T>(items: Vec<T>, request: PageRequest) -> Result<Page<T>, HttpApiError> {
    common::paginate(items, request).map_err(|e| match e {
        AppError::NotFound => HttpApiError::InvalidPage,
        other => HttpApiError::App(other),
    })
}

#[get("/")]
pub async fn index() -> HttpResponse {
    crate::response::ok(
        "Welcome to Healthcare Backend API",
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "auth": {
                    "register": "/api/auth/register",
                    "login": "/api/auth/login",
                    "token_refresh": "/api/auth/token/refresh",
                    "logout": "/api/auth/logout",
                },
                "doctors": {
                    "list_create": "/api/doctors",
                    "available": "/api/doctors/available",
                    "detail": "/api/doctors/{id}",
                },
                "patients": {
                    "list_create": "/api/patients",
                    "detail": "/api/patients/{id}",
                    "doctors": "/api/patients/{id}/doctors",
                },
                "mappings": {
                    "list_create": "/api/mappings",
                    "patient_doctors": "/api/mappings/patient/{patient_id}",
                    "detail": "/api/mappings/{id}",
                },
            },
        }),
    )
}
