use chrono::Utc;
use common::{
    normalize, Actor, AppError, AppResult, AssignedDoctor, BloodGroup, HasTimestamps, Patient,
    PatientPatch, PatientProfile, RecordMeta, Role, SoftDeletable,
};
use uuid::Uuid;

use crate::identity::{hash, normalize_user_patch, UserFields};
use crate::policy::Operation;
use crate::validation::Checks;
use crate::{Accounts, email_taken, storage, write_failure};

#[derive(Debug, Clone, Default)]
pub struct PatientFields {
    pub blood_group: Option<BloodGroup>,
    pub medical_history: Option<String>,
    pub emergency_contact: Option<String>,
    pub allergies: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewPatient {
    pub user: UserFields,
    pub profile: PatientFields,
}

fn normalize_clinical(patch: &mut PatientPatch, checks: &mut Checks) {
    for field in [&mut patch.medical_history, &mut patch.allergies] {
        if let Some(value) = field.as_mut() {
            *value = normalize::optional_text(value.take());
        }
    }
    if let Some(contact) = patch.emergency_contact.as_mut() {
        *contact = normalize::optional_text(contact.take());
        checks.phone("emergency_contact", contact.as_deref());
    }
}

impl Accounts {
    /// Create a patient account and its profile on behalf of staff.
    pub async fn create_patient(&self, actor: &Actor, new: NewPatient) -> AppResult<Patient> {
        self.authorize(
            actor,
            Operation::CreatePatient,
            "Only administrators and doctors can create patients.",
        )?;
        let NewPatient {
            user: mut fields,
            profile: clinical,
        } = new;

        let mut checks = Checks::new();
        fields.normalize_into(&mut checks);
        checks.password_present(&fields.password);
        let emergency_contact = normalize::optional_text(clinical.emergency_contact);
        checks.phone("emergency_contact", emergency_contact.as_deref());
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

        let password_hash = hash(&fields.password)?;
        let user = fields.into_user(Role::Patient, password_hash);
        let profile = PatientProfile {
            meta: RecordMeta::new(),
            user_id: user.meta.id,
            blood_group: clinical.blood_group,
            medical_history: normalize::optional_text(clinical.medical_history),
            emergency_contact,
            allergies: normalize::optional_text(clinical.allergies),
            created_by: Some(actor.id),
        };
        self.store
            .insert_user(&user, Some(&profile))
            .await
            .map_err(write_failure)?;

        tracing::info!(patient = %profile.meta.id, actor = %actor.id, "patient created");
        Ok(Patient { profile, user })
    }

    /// A patient in the actor's visible set: active and created by the actor.
    pub async fn retrieve_patient(&self, actor: &Actor, id: Uuid) -> AppResult<Patient> {
        self.store
            .find_patient(id)
            .await
            .map_err(storage)?
            .filter(|p| p.profile.is_active() && p.profile.created_by == Some(actor.id))
            .ok_or(AppError::NotFound)
    }

    pub async fn update_patient(
        &self,
        actor: &Actor,
        id: Uuid,
        mut patch: PatientPatch,
    ) -> AppResult<Patient> {
        let mut patient = self.retrieve_patient(actor, id).await?;
        self.authorize(
            actor,
            Operation::UpdatePatient(&patient.profile),
            "You can only update patients you created or your own profile.",
        )?;

        let mut checks = Checks::new();
        normalize_user_patch(&mut patch.user, &mut checks);
        normalize_clinical(&mut patch, &mut checks);
        checks.finish()?;

        let touches_user = !patch.user.is_empty();
        patch.apply(&mut patient);
        patient.profile.touch();
        if touches_user {
            patient.user.touch();
        }
        if !self.store.update_patient(&patient).await.map_err(write_failure)? {
            return Err(AppError::NotFound);
        }

        tracing::info!(patient = %id, actor = %actor.id, "patient updated");
        Ok(patient)
    }

    /// Deactivate the profile and its account together.
    pub async fn soft_delete_patient(&self, actor: &Actor, id: Uuid) -> AppResult<()> {
        let patient = self.retrieve_patient(actor, id).await?;
        self.authorize(
            actor,
            Operation::DeletePatient(&patient.profile),
            "You can only delete patients you created or your own profile.",
        )?;
        let deleted = self
            .store
            .deactivate_patient(id, Utc::now())
            .await
            .map_err(storage)?;
        if !deleted {
            return Err(AppError::NotFound);
        }

        tracing::info!(patient = %id, actor = %actor.id, "patient deleted");
        Ok(())
    }

    /// The actor's visible patients, newest first.
    pub async fn list_patients(&self, actor: &Actor) -> AppResult<Vec<Patient>> {
        self.store
            .list_active_patients_created_by(actor.id)
            .await
            .map_err(storage)
    }

    /// Doctors currently assigned to a visible patient profile.
    pub async fn doctors_for_patient(
        &self,
        actor: &Actor,
        id: Uuid,
    ) -> AppResult<(Patient, Vec<AssignedDoctor>)> {
        let patient = self.retrieve_patient(actor, id).await?;
        let doctors = self.assigned_doctors(patient.user.meta.id).await?;
        Ok((patient, doctors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{accounts, admin, new_patient, registration};
    use common::UserPatch;

    #[tokio::test]
    async fn staff_create_patients_visible_only_to_creator() {
        let accounts = accounts();
        let admin = admin(&accounts).await;
        let patient = accounts
            .create_patient(&admin, new_patient("p@x.com"))
            .await
            .unwrap();
        assert_eq!(patient.user.role, Role::Patient);
        assert_eq!(patient.profile.created_by, Some(admin.id));

        let id = patient.profile.meta.id;
        assert_eq!(accounts.retrieve_patient(&admin, id).await.unwrap().user.email, "p@x.com");
        assert_eq!(accounts.list_patients(&admin).await.unwrap().len(), 1);

        let other = accounts
            .register(registration("o@x.com", "Other One", Role::Admin))
            .await
            .unwrap();
        let other = Actor::from(&other);
        assert_eq!(accounts.retrieve_patient(&other, id).await.unwrap_err(), AppError::NotFound);
        assert!(accounts.list_patients(&other).await.unwrap().is_empty());
        let err = accounts.soft_delete_patient(&other, id).await.unwrap_err();
        assert_eq!(err, AppError::NotFound);
    }

    #[tokio::test]
    async fn patients_cannot_create_patients() {
        let accounts = accounts();
        let user = accounts
            .register(registration("p@x.com", "Pat Ient", Role::Patient))
            .await
            .unwrap();
        let err = accounts
            .create_patient(&Actor::from(&user), new_patient("q@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn update_clears_and_validates_fields() {
        let accounts = accounts();
        let admin = admin(&accounts).await;
        let patient = accounts
            .create_patient(&admin, new_patient("p@x.com"))
            .await
            .unwrap();
        let id = patient.profile.meta.id;

        let bad = PatientPatch {
            emergency_contact: Some(Some("12ab".into())),
            ..Default::default()
        };
        let err = accounts.update_patient(&admin, id, bad).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ref f) if f[0].field == "emergency_contact"));

        let patch = PatientPatch {
            user: UserPatch {
                phone: Some(Some("   ".into())),
                ..Default::default()
            },
            blood_group: Some(Some(BloodGroup::ONegative)),
            allergies: Some(None),
            ..Default::default()
        };
        let updated = accounts.update_patient(&admin, id, patch).await.unwrap();
        assert_eq!(updated.user.phone, None);
        assert_eq!(updated.profile.blood_group, Some(BloodGroup::ONegative));
        assert_eq!(updated.profile.allergies, None);
        assert_eq!(updated.profile.medical_history.as_deref(), Some("Asthma"));
    }

    #[tokio::test]
    async fn soft_delete_deactivates_patient_account() {
        let accounts = accounts();
        let admin = admin(&accounts).await;
        let patient = accounts
            .create_patient(&admin, new_patient("p@x.com"))
            .await
            .unwrap();
        accounts
            .soft_delete_patient(&admin, patient.profile.meta.id)
            .await
            .unwrap();
        assert!(accounts.list_patients(&admin).await.unwrap().is_empty());
        assert_eq!(
            accounts.resolve_actor(patient.user.meta.id).await.unwrap_err(),
            AppError::AccountDisabled
        );
    }

    #[tokio::test]
    async fn deleted_patient_stays_deleted_after_late_edit() {
        let accounts = accounts();
        let admin = admin(&accounts).await;
        let patient = accounts
            .create_patient(&admin, new_patient("p@x.com"))
            .await
            .unwrap();
        let id = patient.profile.meta.id;
        accounts.soft_delete_patient(&admin, id).await.unwrap();

        let patch = PatientPatch {
            allergies: Some(Some("Penicillin".into())),
            ..Default::default()
        };
        let err = accounts.update_patient(&admin, id, patch).await.unwrap_err();
        assert_eq!(err, AppError::NotFound);

        let stored = accounts.store().find_patient(id).await.unwrap().unwrap();
        assert!(!stored.profile.is_active());
        assert!(!stored.user.is_active());
        assert_eq!(stored.profile.allergies, None);
    }
}
