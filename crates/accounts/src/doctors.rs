use chrono::Utc;
use common::{
    normalize, Actor, AppError, AppResult, Doctor, DoctorPatch, DoctorProfile, HasTimestamps,
    RecordMeta, Role, SoftDeletable,
};
use uuid::Uuid;

use crate::identity::{hash, normalize_user_patch, UserFields};
use crate::policy::Operation;
use crate::validation::Checks;
use crate::{Accounts, email_taken, license_taken, storage, write_failure};

const SPECIALIZATION_MAX: usize = 100;
const LICENSE_MAX: usize = 50;

#[derive(Debug, Clone)]
pub struct DoctorFields {
    pub specialization: String,
    pub license_number: String,
    pub experience_years: i32,
    pub is_available: bool,
}

impl Default for DoctorFields {
    fn default() -> Self {
        Self {
            specialization: String::new(),
            license_number: String::new(),
            experience_years: 0,
            is_available: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewDoctor {
    pub user: UserFields,
    pub profile: DoctorFields,
}

impl Accounts {
    /// Create a doctor account and its profile together.
    pub async fn create_doctor(&self, actor: &Actor, new: NewDoctor) -> AppResult<Doctor> {
        self.authorize(
            actor,
            Operation::CreateDoctor,
            "Only administrators can create doctors.",
        )?;
        let NewDoctor {
            user: mut fields,
            profile: mut doctor,
        } = new;

        let mut checks = Checks::new();
        fields.normalize_into(&mut checks);
        checks.password_present(&fields.password);
        doctor.specialization = doctor.specialization.trim().to_string();
        doctor.license_number = normalize::license_number(&doctor.license_number);
        checks.required_text("specialization", &doctor.specialization, SPECIALIZATION_MAX);
        checks.required_text("license_number", &doctor.license_number, LICENSE_MAX);
        checks.experience_years(doctor.experience_years);
        checks.finish()?;

        if self
            .store
            .find_user_by_email(&fields.email)
            .await
            .map_err(storage)?
            .is_some()
        {
            return Err(email_taken());
        }
        if self
            .store
            .license_exists(&doctor.license_number, None)
            .await
            .map_err(storage)?
        {
            return Err(license_taken());
        }

        let password_hash = hash(&fields.password)?;
        let user = fields.into_user(Role::Doctor, password_hash);
        let profile = DoctorProfile {
            meta: RecordMeta::new(),
            user_id: user.meta.id,
            specialization: doctor.specialization,
            license_number: doctor.license_number,
            experience_years: doctor.experience_years,
            is_available: doctor.is_available,
            created_by: Some(actor.id),
        };
        self.store
            .insert_doctor(&user, &profile)
            .await
            .map_err(write_failure)?;

        tracing::info!(doctor = %profile.meta.id, actor = %actor.id, "doctor created");
        Ok(Doctor { profile, user })
    }

    /// An active doctor by profile id.
    pub async fn retrieve_doctor(&self, id: Uuid) -> AppResult<Doctor> {
        self.store
            .find_doctor(id)
            .await
            .map_err(storage)?
            .filter(|d| d.profile.is_active())
            .ok_or(AppError::NotFound)
    }

    pub async fn update_doctor(
        &self,
        actor: &Actor,
        id: Uuid,
        mut patch: DoctorPatch,
    ) -> AppResult<Doctor> {
        let mut doctor = self.retrieve_doctor(id).await?;
        self.authorize(
            actor,
            Operation::UpdateDoctor(&doctor.profile),
            "You can only update doctors you created or your own profile.",
        )?;

        let mut checks = Checks::new();
        normalize_user_patch(&mut patch.user, &mut checks);
        if let Some(s) = patch.specialization.as_mut() {
            *s = s.trim().to_string();
            checks.required_text("specialization", s, SPECIALIZATION_MAX);
        }
        if let Some(license) = patch.license_number.as_mut() {
            *license = normalize::license_number(license);
            checks.required_text("license_number", license, LICENSE_MAX);
        }
        if let Some(years) = patch.experience_years {
            checks.experience_years(years);
        }
        checks.finish()?;

        if let Some(license) = patch.license_number.as_deref() {
            if license != doctor.profile.license_number
                && self
                    .store
                    .license_exists(license, Some(doctor.profile.meta.id))
                    .await
                    .map_err(storage)?
            {
                return Err(license_taken());
            }
        }

        let touches_user = !patch.user.is_empty();
        patch.apply(&mut doctor);
        doctor.profile.touch();
        if touches_user {
            doctor.user.touch();
        }
        // a soft delete that landed after the read wins
        if !self.store.update_doctor(&doctor).await.map_err(write_failure)? {
            return Err(AppError::NotFound);
        }

        tracing::info!(doctor = %id, actor = %actor.id, "doctor updated");
        Ok(doctor)
    }

    /// Deactivate the profile and its account together.
    pub async fn soft_delete_doctor(&self, actor: &Actor, id: Uuid) -> AppResult<()> {
        let doctor = self.retrieve_doctor(id).await?;
        self.authorize(
            actor,
            Operation::DeleteDoctor(&doctor.profile),
            "You can only delete doctors you created.",
        )?;
        let deleted = self
            .store
            .deactivate_doctor(id, Utc::now())
            .await
            .map_err(storage)?;
        if !deleted {
            return Err(AppError::NotFound);
        }

        tracing::info!(doctor = %id, actor = %actor.id, "doctor deleted");
        Ok(())
    }

    /// Active doctors, newest first.
    pub async fn list_doctors(&self) -> AppResult<Vec<Doctor>> {
        self.store.list_active_doctors(false).await.map_err(storage)
    }

    pub async fn list_available_doctors(&self) -> AppResult<Vec<Doctor>> {
        self.store.list_active_doctors(true).await.map_err(storage)
    }
}
