use actix_web::{delete, get, patch, post, put, web, HttpResponse};
use common::PageRequest;
use uuid::Uuid;

use super::page_of;
use crate::error::HttpApiError;
use crate::extractors::CurrentActor;
use crate::response;
use crate::schemas::{
    PatientCreateInput, PatientDoctorsOut, PatientListItem, PatientOut, PatientUpdateInput,
};
use crate::state::AppState;

#[get("/api/patients")]
pub async fn list(
    data: web::Data<AppState>,
    CurrentActor(actor): CurrentActor,
    page: web::Query<PageRequest>,
) -> Result<HttpResponse, HttpApiError> {
    let patients = data.accounts.list_patients(&actor).await?;
    let page = page_of(patients.iter().collect(), page.into_inner())?.map(PatientListItem::from);
    Ok(response::ok("Patients retrieved successfully", page))
}

#[post("/api/patients")]
pub async fn create(
    data: web::Data<AppState>,
    CurrentActor(actor): CurrentActor,
    body: web::Json<PatientCreateInput>,
) -> Result<HttpResponse, HttpApiError> {
    let patient = data
        .accounts
        .create_patient(&actor, body.into_inner().into())
        .await?;
    Ok(response::created(
        "Patient created successfully",
        PatientOut::from(&patient),
    ))
}

#[get("/api/patients/{id}")]
pub async fn get(
    data: web::Data<AppState>,
    CurrentActor(actor): CurrentActor,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, HttpApiError> {
    let patient = data
        .accounts
        .retrieve_patient(&actor, path.into_inner())
        .await?;
    Ok(response::ok(
        "Patient retrieved successfully",
        PatientOut::from(&patient),
    ))
}

// PUT and PATCH share one handler: every patient field is optional.
async fn apply_update(
    data: web::Data<AppState>,
    CurrentActor(actor): CurrentActor,
    path: web::Path<Uuid>,
    body: web::Json<PatientUpdateInput>,
) -> Result<HttpResponse, HttpApiError> {
    let patient = data
        .accounts
        .update_patient(&actor, path.into_inner(), body.into_inner().into())
        .await?;
    Ok(response::ok(
        "Patient updated successfully",
        PatientOut::from(&patient),
    ))
}

#[put("/api/patients/{id}")]
pub async fn replace(
    data: web::Data<AppState>,
    actor: CurrentActor,
    path: web::Path<Uuid>,
    body: web::Json<PatientUpdateInput>,
) -> Result<HttpResponse, HttpApiError> {
    apply_update(data, actor, path, body).await
}

#[patch("/api/patients/{id}")]
pub async fn update(
    data: web::Data<AppState>,
    actor: CurrentActor,
    path: web::Path<Uuid>,
    body: web::Json<PatientUpdateInput>,
) -> Result<HttpResponse, HttpApiError> {
    apply_update(data, actor, path, body).await
}

#[delete("/api/patients/{id}")]
pub async fn remove(
    data: web::Data<AppState>,
    CurrentActor(actor): CurrentActor,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, HttpApiError> {
    data.accounts
        .soft_delete_patient(&actor, path.into_inner())
        .await?;
    Ok(response::no_content())
}

#[get("/api/patients/{id}/doctors")]
pub async fn doctors(
    data: web::Data<AppState>,
    CurrentActor(actor): CurrentActor,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, HttpApiError> {
    let (patient, doctors) = data
        .accounts
        .doctors_for_patient(&actor, path.into_inner())
        .await?;
    Ok(response::ok(
        "Assigned doctors retrieved successfully",
        PatientDoctorsOut::new(&patient.user, &doctors),
    ))
}
