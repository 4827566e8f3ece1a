//! The `{success, message, errors, data}` envelope every endpoint returns.

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use common::FieldError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    pub fields: Vec<FieldError>,
}

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub message: String,
    pub errors: Option<ErrorBody>,
    pub data: Option<T>,
}

pub fn ok<T: Serialize>(message: &str, data: T) -> HttpResponse {
    with_status(StatusCode::OK, message, data)
}

pub fn created<T: Serialize>(message: &str, data: T) -> HttpResponse {
    with_status(StatusCode::CREATED, message, data)
}

pub fn no_content() -> HttpResponse {
    HttpResponse::NoContent().finish()
}

fn with_status<T: Serialize>(status: StatusCode, message: &str, data: T) -> HttpResponse {
    HttpResponse::build(status).json(Envelope {
        success: true,
        message: message.to_string(),
        errors: None,
        data: Some(data),
    })
}

pub fn failure(
    status: StatusCode,
    code: &'static str,
    message: String,
    fields: Vec<FieldError>,
) -> HttpResponse {
    HttpResponse::build(status).json(Envelope::<()> {
        success: false,
        message: message.clone(),
        errors: Some(ErrorBody {
            code,
            message,
            fields,
        }),
        data: None,
    })
}
