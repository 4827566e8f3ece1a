use actix_web::{delete, get, patch, post, put, web, HttpResponse};
use common::PageRequest;
use uuid::Uuid;

use super::page_of;
use crate::error::HttpApiError;
use crate::extractors::CurrentActor;
use crate::response;
use crate::schemas::{AssignmentInput, NotesInput, PatientDoctorsOut};
use crate::state::AppState;

#[get("/api/mappings")]
pub async fn list(
    data: web::Data<AppState>,
    _actor: CurrentActor,
    page: web::Query<PageRequest>,
) -> Result<HttpResponse, HttpApiError> {
    let mappings = data.accounts.list_assignments().await?;
    let page = page_of(mappings, page.into_inner())?;
    Ok(response::ok("Mappings retrieved successfully", page))
}

#[post("/api/mappings")]
pub async fn create(
    data: web::Data<AppState>,
    CurrentActor(actor): CurrentActor,
    body: web::Json<AssignmentInput>,
) -> Result<HttpResponse, HttpApiError> {
    let new = body.into_inner().into_new()?;
    let assignment = data.accounts.assign(&actor, new).await?;
    Ok(response::created(
        "Doctor assigned to patient successfully",
        assignment,
    ))
}

#[get("/api/mappings/patient/{patient_id}")]
pub async fn for_patient(
    data: web::Data<AppState>,
    _actor: CurrentActor,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, HttpApiError> {
    let (patient, doctors) = data.accounts.list_for_patient(path.into_inner()).await?;
    Ok(response::ok(
        "Assigned doctors retrieved successfully",
        PatientDoctorsOut::new(&patient, &doctors),
    ))
}

#[get("/api/mappings/{id}")]
pub async fn get(
    data: web::Data<AppState>,
    _actor: CurrentActor,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, HttpApiError> {
    let assignment = data.accounts.retrieve_assignment(path.into_inner()).await?;
    Ok(response::ok("Mapping retrieved successfully", assignment))
}

async fn apply_notes(
    data: web::Data<AppState>,
    CurrentActor(actor): CurrentActor,
    path: web::Path<Uuid>,
    body: web::Json<NotesInput>,
) -> Result<HttpResponse, HttpApiError> {
    let assignment = data
        .accounts
        .update_notes(&actor, path.into_inner(), body.into_inner().notes)
        .await?;
    Ok(response::ok("Mapping updated successfully", assignment))
}

#[put("/api/mappings/{id}")]
pub async fn replace(
    data: web::Data<AppState>,
    actor: CurrentActor,
    path: web::Path<Uuid>,
    body: web::Json<NotesInput>,
) -> Result<HttpResponse, HttpApiError> {
    apply_notes(data, actor, path, body).await
}

#[patch("/api/mappings/{id}")]
pub async fn update(
    data: web::Data<AppState>,
    actor: CurrentActor,
    path: web::Path<Uuid>,
    body: web::Json<NotesInput>,
) -> Result<HttpResponse, HttpApiError> {
    apply_notes(data, actor, path, body).await
}

#[delete("/api/mappings/{id}")]
pub async fn remove(
    data: web::Data<AppState>,
    CurrentActor(actor): CurrentActor,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, HttpApiError> {
    data.accounts.unassign(&actor, path.into_inner()).await?;
    Ok(response::no_content())
}
