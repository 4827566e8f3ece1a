use actix_web::{delete, get, patch, post, put, web, HttpResponse};
use common::{DoctorPatch, PageRequest};
use uuid::Uuid;

use super::page_of;
use crate::error::HttpApiError;
use crate::extractors::CurrentActor;
use crate::response;
use crate::schemas::{DoctorCreateInput, DoctorListItem, DoctorOut, DoctorUpdateInput};
use crate::state::AppState;

#[get("/api/doctors")]
pub async fn list(
    data: web::Data<AppState>,
    _actor: CurrentActor,
    page: web::Query<PageRequest>,
) -> Result<HttpResponse, HttpApiError> {
    let doctors = data.accounts.list_doctors().await?;
    let page = page_of(doctors.iter().collect(), page.into_inner())?.map(DoctorListItem::from);
    Ok(response::ok("Doctors retrieved successfully", page))
}

#[get("/api/doctors/available")]
pub async fn available(
    data: web::Data<AppState>,
    _actor: CurrentActor,
    page: web::Query<PageRequest>,
) -> Result<HttpResponse, HttpApiError> {
    let doctors = data.accounts.list_available_doctors().await?;
    let page = page_of(doctors.iter().collect(), page.into_inner())?.map(DoctorListItem::from);
    Ok(response::ok("Available doctors retrieved successfully", page))
}

#[post("/api/doctors")]
pub async fn create(
    data: web::Data<AppState>,
    CurrentActor(actor): CurrentActor,
    body: web::Json<DoctorCreateInput>,
) -> Result<HttpResponse, HttpApiError> {
    let doctor = data
        .accounts
        .create_doctor(&actor, body.into_inner().into())
        .await?;
    Ok(response::created(
        "Doctor created successfully",
        DoctorOut::from(&doctor),
    ))
}

#[get("/api/doctors/{id}")]
pub async fn get(
    data: web::Data<AppState>,
    _actor: CurrentActor,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, HttpApiError> {
    let doctor = data.accounts.retrieve_doctor(path.into_inner()).await?;
    Ok(response::ok(
        "Doctor retrieved successfully",
        DoctorOut::from(&doctor),
    ))
}

async fn apply_update(
    data: &AppState,
    actor: CurrentActor,
    id: Uuid,
    patch: DoctorPatch,
) -> Result<HttpResponse, HttpApiError> {
    let doctor = data.accounts.update_doctor(&actor.0, id, patch).await?;
    Ok(response::ok(
        "Doctor updated successfully",
        DoctorOut::from(&doctor),
    ))
}

#[put("/api/doctors/{id}")]
pub async fn replace(
    data: web::Data<AppState>,
    actor: CurrentActor,
    path: web::Path<Uuid>,
    body: web::Json<DoctorUpdateInput>,
) -> Result<HttpResponse, HttpApiError> {
    let input = body.into_inner();
    input.require_full()?;
    apply_update(&data, actor, path.into_inner(), input.into()).await
}

#[patch("/api/doctors/{id}")]
pub async fn update(
    data: web::Data<AppState>,
    actor: CurrentActor,
    path: web::Path<Uuid>,
    body: web::Json<DoctorUpdateInput>,
) -> Result<HttpResponse, HttpApiError> {
    apply_update(&data, actor, path.into_inner(), body.into_inner().into()).await
}

#[delete("/api/doctors/{id}")]
pub async fn remove(
    data: web::Data<AppState>,
    CurrentActor(actor): CurrentActor,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, HttpApiError> {
    data.accounts
        .soft_delete_doctor(&actor, path.into_inner())
        .await?;
    Ok(response::no_content())
}
