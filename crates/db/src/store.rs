use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Assignment, Doctor, DoctorProfile, Patient, PatientProfile, User};
use uuid::Uuid;

use crate::error::DbResult;

/// Persisted refresh token. Only the fingerprint of the token is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshRecord {
    pub user_id: Uuid,
    pub jti: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

/// Storage for accounts, profiles, assignments and refresh tokens.
///
/// Every method is one atomic unit of work: multi-row writes either commit
/// completely or not at all, and uniqueness (email, licence number, active
/// assignment pair) is enforced inside that unit, surfacing as
/// [`DbError::Unique`](crate::DbError::Unique).
///
/// `find_*` methods ignore `is_active`; `list_active_*` methods filter on it.
/// `update_*` methods never write `is_active` and only touch rows that are
/// still active, returning `false` when nothing changed. Only `deactivate_*`
/// clears the flag.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_user(&self, id: Uuid) -> DbResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> DbResult<Option<User>>;

    /// Insert a user, plus its patient profile when given.
    async fn insert_user(&self, user: &User, patient: Option<&PatientProfile>) -> DbResult<()>;

    async fn deactivate_user(&self, id: Uuid, at: DateTime<Utc>) -> DbResult<()>;

    /// Whether any doctor, active or not, other than `except` holds `license`.
    async fn license_exists(&self, license: &str, except: Option<Uuid>) -> DbResult<bool>;

    async fn insert_doctor(&self, user: &User, profile: &DoctorProfile) -> DbResult<()>;

    async fn find_doctor(&self, id: Uuid) -> DbResult<Option<Doctor>>;

    async fn find_doctor_profile_by_user(&self, user_id: Uuid) -> DbResult<Option<DoctorProfile>>;

    /// Active doctors, newest first.
    async fn list_active_doctors(&self, available_only: bool) -> DbResult<Vec<Doctor>>;

    /// Write back the editable fields of an active profile and its user.
    async fn update_doctor(&self, doctor: &Doctor) -> DbResult<bool>;

    /// Soft-delete an active profile and deactivate its user together.
    async fn deactivate_doctor(&self, id: Uuid, at: DateTime<Utc>) -> DbResult<bool>;

    async fn find_patient(&self, id: Uuid) -> DbResult<Option<Patient>>;

    /// Active patients created by `creator`, newest first.
    async fn list_active_patients_created_by(&self, creator: Uuid) -> DbResult<Vec<Patient>>;

    async fn update_patient(&self, patient: &Patient) -> DbResult<bool>;

    async fn deactivate_patient(&self, id: Uuid, at: DateTime<Utc>) -> DbResult<bool>;

    async fn insert_assignment(&self, assignment: &Assignment) -> DbResult<()>;

    async fn find_assignment(&self, id: Uuid) -> DbResult<Option<Assignment>>;

    async fn update_assignment_notes(
        &self,
        id: Uuid,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> DbResult<bool>;

    async fn deactivate_assignment(&self, id: Uuid, at: DateTime<Utc>) -> DbResult<bool>;

    /// Active assignments, optionally for one patient, newest first.
    async fn list_active_assignments(&self, patient_id: Option<Uuid>) -> DbResult<Vec<Assignment>>;

    async fn insert_refresh(&self, record: &RefreshRecord) -> DbResult<()>;

    async fn find_refresh(&self, jti: &str) -> DbResult<Option<RefreshRecord>>;

    /// Revoke an unrevoked token, returning how many records changed.
    async fn revoke_refresh(&self, jti: &str) -> DbResult<u64>;
}
