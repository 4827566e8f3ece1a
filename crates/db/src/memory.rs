//! In-memory [`AccountStore`] used by tests and `DATABASE_URL=memory`.
//!
//! Each unit of work runs under one write lock, so the uniqueness checks and
//! the writes they guard cannot interleave with another request.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::record::sort_newest_first;
use common::{
    Assignment, Doctor, DoctorProfile, Patient, PatientProfile, SoftDeletable, User,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{DbError, DbResult, UniqueKey};
use crate::store::{AccountStore, RefreshRecord};

#[derive(Debug, Default)]
struct State {
    users: Vec<User>,
    doctors: Vec<DoctorProfile>,
    patients: Vec<PatientProfile>,
    assignments: Vec<Assignment>,
    refresh: Vec<RefreshRecord>,
}

impl State {
    fn user(&self, id: Uuid) -> Option<&User> {
        self.users.iter().find(|u| u.meta.id == id)
    }

    fn check_new_user(&self, user: &User) -> DbResult<()> {
        if self.users.iter().any(|u| u.email == user.email) {
            return Err(DbError::Unique(UniqueKey::Email));
        }
        Ok(())
    }

    fn check_license(&self, license: &str, except: Option<Uuid>) -> DbResult<()> {
        let taken = self
            .doctors
            .iter()
            .any(|d| d.license_number == license && Some(d.meta.id) != except);
        if taken {
            return Err(DbError::Unique(UniqueKey::LicenseNumber));
        }
        Ok(())
    }

    /// Copy the editable fields onto the stored user, leaving `is_active` and
    /// credentials as they are.
    fn update_user_fields(&mut self, user: &User) -> DbResult<()> {
        let slot = self
            .users
            .iter_mut()
            .find(|u| u.meta.id == user.meta.id)
            .ok_or_else(|| DbError::Corrupt(format!("user {} is missing", user.meta.id)))?;
        slot.name = user.name.clone();
        slot.phone = user.phone.clone();
        slot.date_of_birth = user.date_of_birth;
        slot.gender = user.gender;
        slot.address = user.address.clone();
        slot.meta.updated_at = user.meta.updated_at;
        Ok(())
    }

    fn deactivate_user(&mut self, id: Uuid, at: DateTime<Utc>) {
        if let Some(user) = self.users.iter_mut().find(|u| u.meta.id == id) {
            user.soft_delete(at);
        }
    }

    /// Rejects a row that would become a second active link for its pair.
    fn check_active_pair(&self, assignment: &Assignment) -> DbResult<()> {
        if !assignment.is_active() {
            return Ok(());
        }
        let taken = self.assignments.iter().any(|a| {
            a.is_active()
                && a.meta.id != assignment.meta.id
                && a.patient_id == assignment.patient_id
                && a.doctor_id == assignment.doctor_id
        });
        if taken {
            return Err(DbError::Unique(UniqueKey::ActiveAssignment));
        }
        Ok(())
    }

    fn doctor(&self, profile: &DoctorProfile) -> DbResult<Doctor> {
        let user = self.user(profile.user_id).cloned().ok_or_else(|| {
            DbError::Corrupt(format!("doctor profile {} has no user", profile.meta.id))
        })?;
        Ok(Doctor {
            profile: profile.clone(),
            user,
        })
    }

    fn patient(&self, profile: &PatientProfile) -> DbResult<Patient> {
        let user = self.user(profile.user_id).cloned().ok_or_else(|| {
            DbError::Corrupt(format!("patient profile {} has no user", profile.meta.id))
        })?;
        Ok(Patient {
            profile: profile.clone(),
            user,
        })
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find_user(&self, id: Uuid) -> DbResult<Option<User>> {
        Ok(self.state.read().await.user(id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.email == email).cloned())
    }

    async fn insert_user(&self, user: &User, patient: Option<&PatientProfile>) -> DbResult<()> {
        let mut state = self.state.write().await;
        state.check_new_user(user)?;
        if let Some(profile) = patient {
            if state.patients.iter().any(|p| p.user_id == profile.user_id) {
                return Err(DbError::Unique(UniqueKey::PatientUser));
            }
        }
        state.users.push(user.clone());
        if let Some(profile) = patient {
            state.patients.push(profile.clone());
        }
        Ok(())
    }

    async fn deactivate_user(&self, id: Uuid, at: DateTime<Utc>) -> DbResult<()> {
        self.state.write().await.deactivate_user(id, at);
        Ok(())
    }

    async fn license_exists(&self, license: &str, except: Option<Uuid>) -> DbResult<bool> {
        let state = self.state.read().await;
        Ok(state.check_license(license, except).is_err())
    }

    async fn insert_doctor(&self, user: &User, profile: &DoctorProfile) -> DbResult<()> {
        let mut state = self.state.write().await;
        state.check_new_user(user)?;
        state.check_license(&profile.license_number, None)?;
        if state.doctors.iter().any(|d| d.user_id == profile.user_id) {
            return Err(DbError::Unique(UniqueKey::DoctorUser));
        }
        state.users.push(user.clone());
        state.doctors.push(profile.clone());
        Ok(())
    }

    async fn find_doctor(&self, id: Uuid) -> DbResult<Option<Doctor>> {
        let state = self.state.read().await;
        state
            .doctors
            .iter()
            .find(|d| d.meta.id == id)
            .map(|d| state.doctor(d))
            .transpose()
    }

    async fn find_doctor_profile_by_user(&self, user_id: Uuid) -> DbResult<Option<DoctorProfile>> {
        let state = self.state.read().await;
        Ok(state.doctors.iter().find(|d| d.user_id == user_id).cloned())
    }

    async fn list_active_doctors(&self, available_only: bool) -> DbResult<Vec<Doctor>> {
        let state = self.state.read().await;
        let mut profiles: Vec<DoctorProfile> = state
            .doctors
            .iter()
            .filter(|d| d.is_active() && (!available_only || d.is_available))
            .cloned()
            .collect();
        sort_newest_first(&mut profiles);
        profiles.iter().map(|d| state.doctor(d)).collect()
    }

    async fn update_doctor(&self, doctor: &Doctor) -> DbResult<bool> {
        let mut state = self.state.write().await;
        let profile = &doctor.profile;
        state.check_license(&profile.license_number, Some(profile.meta.id))?;
        let Some(index) = state
            .doctors
            .iter()
            .position(|d| d.meta.id == profile.meta.id && d.is_active())
        else {
            return Ok(false);
        };
        state.update_user_fields(&doctor.user)?;
        let stored = &mut state.doctors[index];
        stored.specialization = profile.specialization.clone();
        stored.license_number = profile.license_number.clone();
        stored.experience_years = profile.experience_years;
        stored.is_available = profile.is_available;
        stored.meta.updated_at = profile.meta.updated_at;
        Ok(true)
    }

    async fn deactivate_doctor(&self, id: Uuid, at: DateTime<Utc>) -> DbResult<bool> {
        let mut state = self.state.write().await;
        let Some(stored) = state
            .doctors
            .iter_mut()
            .find(|d| d.meta.id == id && d.is_active())
        else {
            return Ok(false);
        };
        stored.soft_delete(at);
        let user_id = stored.user_id;
        state.deactivate_user(user_id, at);
        Ok(true)
    }

    async fn find_patient(&self, id: Uuid) -> DbResult<Option<Patient>> {
        let state = self.state.read().await;
        state
            .patients
            .iter()
            .find(|p| p.meta.id == id)
            .map(|p| state.patient(p))
            .transpose()
    }

    async fn list_active_patients_created_by(&self, creator: Uuid) -> DbResult<Vec<Patient>> {
        let state = self.state.read().await;
        let mut profiles: Vec<PatientProfile> = state
            .patients
            .iter()
            .filter(|p| p.is_active() && p.created_by == Some(creator))
            .cloned()
            .collect();
        sort_newest_first(&mut profiles);
        profiles.iter().map(|p| state.patient(p)).collect()
    }

    async fn update_patient(&self, patient: &Patient) -> DbResult<bool> {
        let mut state = self.state.write().await;
        let profile = &patient.profile;
        let Some(index) = state
            .patients
            .iter()
            .position(|p| p.meta.id == profile.meta.id && p.is_active())
        else {
            return Ok(false);
        };
        state.update_user_fields(&patient.user)?;
        let stored = &mut state.patients[index];
        stored.blood_group = profile.blood_group;
        stored.medical_history = profile.medical_history.clone();
        stored.emergency_contact = profile.emergency_contact.clone();
        stored.allergies = profile.allergies.clone();
        stored.meta.updated_at = profile.meta.updated_at;
        Ok(true)
    }

    async fn deactivate_patient(&self, id: Uuid, at: DateTime<Utc>) -> DbResult<bool> {
        let mut state = self.state.write().await;
        let Some(stored) = state
            .patients
            .iter_mut()
            .find(|p| p.meta.id == id && p.is_active())
        else {
            return Ok(false);
        };
        stored.soft_delete(at);
        let user_id = stored.user_id;
        state.deactivate_user(user_id, at);
        Ok(true)
    }

    async fn insert_assignment(&self, assignment: &Assignment) -> DbResult<()> {
        let mut state = self.state.write().await;
        state.check_active_pair(assignment)?;
        state.assignments.push(assignment.clone());
        Ok(())
    }

    async fn find_assignment(&self, id: Uuid) -> DbResult<Option<Assignment>> {
        let state = self.state.read().await;
        Ok(state.assignments.iter().find(|a| a.meta.id == id).cloned())
    }

    async fn update_assignment_notes(
        &self,
        id: Uuid,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> DbResult<bool> {
        let mut state = self.state.write().await;
        let Some(stored) = state
            .assignments
            .iter_mut()
            .find(|a| a.meta.id == id && a.is_active())
        else {
            return Ok(false);
        };
        stored.notes = notes.map(str::to_string);
        stored.meta.updated_at = at;
        Ok(true)
    }

    async fn deactivate_assignment(&self, id: Uuid, at: DateTime<Utc>) -> DbResult<bool> {
        let mut state = self.state.write().await;
        let Some(stored) = state
            .assignments
            .iter_mut()
            .find(|a| a.meta.id == id && a.is_active())
        else {
            return Ok(false);
        };
        stored.soft_delete(at);
        Ok(true)
    }

    async fn list_active_assignments(&self, patient_id: Option<Uuid>) -> DbResult<Vec<Assignment>> {
        let state = self.state.read().await;
        let mut rows: Vec<Assignment> = state
            .assignments
            .iter()
            .filter(|a| a.is_active() && patient_id.map_or(true, |p| a.patient_id == p))
            .cloned()
            .collect();
        sort_newest_first(&mut rows);
        Ok(rows)
    }

    async fn insert_refresh(&self, record: &RefreshRecord) -> DbResult<()> {
        let mut state = self.state.write().await;
        if state.refresh.iter().any(|r| r.jti == record.jti) {
            return Err(DbError::Unique(UniqueKey::Other));
        }
        state.refresh.push(record.clone());
        Ok(())
    }

    async fn find_refresh(&self, jti: &str) -> DbResult<Option<RefreshRecord>> {
        let state = self.state.read().await;
        Ok(state.refresh.iter().find(|r| r.jti == jti).cloned())
    }

    async fn revoke_refresh(&self, jti: &str) -> DbResult<u64> {
        let mut state = self.state.write().await;
        let mut affected = 0;
        for record in state.refresh.iter_mut().filter(|r| r.jti == jti && !r.revoked) {
            record.revoked = true;
            affected += 1;
        }
        Ok(affected)
    }
}
