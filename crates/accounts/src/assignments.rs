use chrono::Utc;
use common::{
    normalize, Actor, AppError, AppResult, AssignedDoctor, Assignment, HasTimestamps,
    RecordMeta, Role, SoftDeletable, User,
};
use db::DbError;
use uuid::Uuid;

use crate::policy::Operation;
use crate::{Accounts, already_assigned, storage, write_failure};

#[derive(Debug, Clone)]
pub struct NewAssignment {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub notes: Option<String>,
}

impl Accounts {
    async fn user_with_role(&self, field: &str, id: Uuid, role: Role) -> AppResult<User> {
        let user = self
            .store
            .find_user(id)
            .await
            .map_err(storage)?
            .ok_or_else(|| {
                AppError::validation(field, format!("Invalid pk \"{id}\" - object does not exist."))
            })?;
        if user.role != role {
            return Err(AppError::role_mismatch(
                field,
                format!("Selected user is not a {role}."),
            ));
        }
        Ok(user)
    }

    /// Link a doctor to a patient. At most one active link exists per pair.
    pub async fn assign(&self, actor: &Actor, new: NewAssignment) -> AppResult<Assignment> {
        self.authorize(
            actor,
            Operation::CreateAssignment,
            "You cannot create assignments.",
        )?;
        self.user_with_role("patient", new.patient_id, Role::Patient)
            .await?;
        self.user_with_role("doctor", new.doctor_id, Role::Doctor)
            .await?;

        let existing = self
            .store
            .list_active_assignments(Some(new.patient_id))
            .await
            .map_err(storage)?;
        if existing.iter().any(|a| a.doctor_id == new.doctor_id) {
            return Err(already_assigned());
        }

        let assignment = Assignment {
            meta: RecordMeta::new(),
            patient_id: new.patient_id,
            doctor_id: new.doctor_id,
            notes: normalize::optional_text(new.notes),
            assigned_date: Utc::now().date_naive(),
            created_by: Some(actor.id),
        };
        // a concurrent assign for the same pair loses here on the unique key
        self.store
            .insert_assignment(&assignment)
            .await
            .map_err(write_failure)?;

        tracing::info!(
            assignment = %assignment.meta.id,
            patient = %assignment.patient_id,
            doctor = %assignment.doctor_id,
            actor = %actor.id,
            "doctor assigned"
        );
        Ok(assignment)
    }

    pub async fn retrieve_assignment(&self, id: Uuid) -> AppResult<Assignment> {
        self.store
            .find_assignment(id)
            .await
            .map_err(storage)?
            .filter(|a| a.is_active())
            .ok_or(AppError::NotFound)
    }

    /// Change the notes, the only mutable part of an assignment. `None`
    /// leaves them as they are.
    pub async fn update_notes(
        &self,
        actor: &Actor,
        id: Uuid,
        notes: Option<Option<String>>,
    ) -> AppResult<Assignment> {
        let mut assignment = self.retrieve_assignment(id).await?;
        self.authorize(
            actor,
            Operation::UpdateAssignment(&assignment),
            "You can only update assignments you created.",
        )?;
        let Some(notes) = notes else {
            return Ok(assignment);
        };
        assignment.notes = normalize::optional_text(notes);
        assignment.touch();
        // writes only to a link that is still active
        let updated = self
            .store
            .update_assignment_notes(id, assignment.notes.as_deref(), assignment.meta.updated_at)
            .await
            .map_err(write_failure)?;
        if !updated {
            return Err(AppError::NotFound);
        }
        Ok(assignment)
    }

    /// Soft-delete the link, freeing the pair for reassignment.
    pub async fn unassign(&self, actor: &Actor, id: Uuid) -> AppResult<()> {
        let assignment = self.retrieve_assignment(id).await?;
        self.authorize(
            actor,
            Operation::DeleteAssignment(&assignment),
            "You can only delete assignments you created.",
        )?;
        let removed = self
            .store
            .deactivate_assignment(id, Utc::now())
            .await
            .map_err(storage)?;
        if !removed {
            return Err(AppError::NotFound);
        }

        tracing::info!(assignment = %id, actor = %actor.id, "doctor unassigned");
        Ok(())
    }

    /// Active assignments of an active patient user, with their doctors.
    pub async fn list_for_patient(
        &self,
        patient_id: Uuid,
    ) -> AppResult<(User, Vec<AssignedDoctor>)> {
        let patient = self
            .store
            .find_user(patient_id)
            .await
            .map_err(storage)?
            .filter(|u| u.is_active() && u.role == Role::Patient)
            .ok_or(AppError::NotFound)?;
        let doctors = self.assigned_doctors(patient_id).await?;
        Ok((patient, doctors))
    }

    /// Every active assignment, newest first.
    pub async fn list_assignments(&self) -> AppResult<Vec<Assignment>> {
        self.store
            .list_active_assignments(None)
            .await
            .map_err(storage)
    }

    pub(crate) async fn assigned_doctors(&self, patient_id: Uuid) -> AppResult<Vec<AssignedDoctor>> {
        let assignments = self
            .store
            .list_active_assignments(Some(patient_id))
            .await
            .map_err(storage)?;
        let mut out = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            let doctor = self
                .store
                .find_user(assignment.doctor_id)
                .await
                .map_err(storage)?
                .ok_or_else(|| {
                    storage(DbError::Corrupt(format!(
                        "assignment {} references missing doctor {}",
                        assignment.meta.id, assignment.doctor_id
                    )))
                })?;
            let doctor_profile = self
                .store
                .find_doctor_profile_by_user(doctor.meta.id)
                .await
                .map_err(storage)?;
            out.push(AssignedDoctor {
                assignment,
                doctor,
                doctor_profile,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{accounts, admin, new_doctor, registration};

    async fn pair(accounts: &Accounts) -> (Actor, User, User) {
        let admin = admin(accounts).await;
        let patient = accounts
            .register(registration("a@x.com", "Jane Doe", Role::Patient))
            .await
            .unwrap();
        let doctor = accounts
            .create_doctor(&admin, new_doctor("doc@x.com", "md123"))
            .await
            .unwrap();
        (admin, patient, doctor.user)
    }

    fn link(patient: &User, doctor: &User, notes: &str) -> NewAssignment {
        NewAssignment {
            patient_id: patient.meta.id,
            doctor_id: doctor.meta.id,
            notes: Some(notes.into()),
        }
    }

    #[tokio::test]
    async fn registration_to_reassignment_scenario() {
        let accounts = accounts();
        let (admin, patient, doctor) = pair(&accounts).await;
        let profile = accounts
            .store()
            .find_doctor_profile_by_user(doctor.meta.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(profile.license_number, "MD123");

        let first = accounts
            .assign(&admin, link(&patient, &doctor, "checkup"))
            .await
            .unwrap();
        assert!(first.is_active());
        assert_eq!(first.assigned_date, Utc::now().date_naive());

        let (_, listed) = accounts.list_for_patient(patient.meta.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].doctor.meta.id, doctor.meta.id);
        assert_eq!(listed[0].assignment.notes.as_deref(), Some("checkup"));
        assert_eq!(
            listed[0].doctor_profile.as_ref().map(|p| p.license_number.as_str()),
            Some("MD123")
        );

        let err = accounts
            .assign(&admin, link(&patient, &doctor, "again"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));

        accounts.unassign(&admin, first.meta.id).await.unwrap();
        let gone = accounts.store().find_assignment(first.meta.id).await.unwrap().unwrap();
        assert!(!gone.is_active());
        let (_, listed) = accounts.list_for_patient(patient.meta.id).await.unwrap();
        assert!(listed.is_empty());

        let second = accounts
            .assign(&admin, link(&patient, &doctor, "follow-up"))
            .await
            .unwrap();
        assert_ne!(second.meta.id, first.meta.id);
        assert_eq!(accounts.list_assignments().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn wrong_role_is_rejected_without_writing() {
        let accounts = accounts();
        let (admin, patient, _) = pair(&accounts).await;
        let err = accounts
            .assign(&admin, link(&patient, &patient, "x"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AppError::role_mismatch("doctor", "Selected user is not a doctor.")
        );
        assert!(accounts.list_assignments().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_user_is_a_validation_error() {
        let accounts = accounts();
        let (admin, patient, _) = pair(&accounts).await;
        let new = NewAssignment {
            patient_id: patient.meta.id,
            doctor_id: Uuid::new_v4(),
            notes: None,
        };
        let err = accounts.assign(&admin, new).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ref f) if f[0].field == "doctor"));
    }

    #[tokio::test]
    async fn only_the_creator_changes_an_assignment() {
        let accounts = accounts();
        let (admin, patient, doctor) = pair(&accounts).await;
        let assignment = accounts
            .assign(&admin, link(&patient, &doctor, "checkup"))
            .await
            .unwrap();
        let outsider = Actor::from(&patient);

        let err = accounts
            .update_notes(&outsider, assignment.meta.id, Some(Some("hijack".into())))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        let err = accounts.unassign(&outsider, assignment.meta.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let updated = accounts
            .update_notes(&admin, assignment.meta.id, Some(Some("annual".into())))
            .await
            .unwrap();
        assert_eq!(updated.notes.as_deref(), Some("annual"));
        let stored = accounts.retrieve_assignment(assignment.meta.id).await.unwrap();
        assert_eq!(stored.notes.as_deref(), Some("annual"));
        assert_eq!(stored.assigned_date, assignment.assigned_date);
        assert_eq!(stored.doctor_id, doctor.meta.id);
    }

    #[tokio::test]
    async fn list_for_patient_requires_an_active_patient() {
        let accounts = accounts();
        let (_, patient, doctor) = pair(&accounts).await;
        assert_eq!(
            accounts.list_for_patient(doctor.meta.id).await.unwrap_err(),
            AppError::NotFound
        );
        accounts.deactivate(patient.meta.id).await.unwrap();
        assert_eq!(
            accounts.list_for_patient(patient.meta.id).await.unwrap_err(),
            AppError::NotFound
        );
    }

    #[tokio::test]
    async fn doctors_for_patient_resolves_visible_profile() {
        let accounts = accounts();
        let (admin, patient, doctor) = pair(&accounts).await;
        accounts
            .assign(&admin, link(&patient, &doctor, "checkup"))
            .await
            .unwrap();
        let me = Actor::from(&patient);
        let profile_id = accounts.list_patients(&me).await.unwrap()[0].profile.meta.id;

        let (found, doctors) = accounts.doctors_for_patient(&me, profile_id).await.unwrap();
        assert_eq!(found.user.meta.id, patient.meta.id);
        assert_eq!(doctors.len(), 1);
        assert_eq!(
            accounts.doctors_for_patient(&admin, profile_id).await.unwrap_err(),
            AppError::NotFound
        );
    }

    #[tokio::test]
    async fn replaced_link_cannot_be_edited_or_revived() {
        let accounts = accounts();
        let (admin, patient, doctor) = pair(&accounts).await;
        let old = accounts
            .assign(&admin, link(&patient, &doctor, "checkup"))
            .await
            .unwrap();
        accounts.unassign(&admin, old.meta.id).await.unwrap();
        let current = accounts
            .assign(&admin, link(&patient, &doctor, "follow-up"))
            .await
            .unwrap();

        let err = accounts
            .update_notes(&admin, old.meta.id, Some(Some("late edit".into())))
            .await
            .unwrap_err();
        assert_eq!(err, AppError::NotFound);
        assert_eq!(
            accounts.unassign(&admin, old.meta.id).await.unwrap_err(),
            AppError::NotFound
        );

        let active = accounts.list_assignments().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].meta.id, current.meta.id);
        assert_eq!(active[0].notes.as_deref(), Some("follow-up"));
        let stale = accounts.store().find_assignment(old.meta.id).await.unwrap().unwrap();
        assert!(!stale.is_active());
        assert_eq!(stale.notes.as_deref(), Some("checkup"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn notes_racing_unassign_never_revive_the_link() {
        let accounts = accounts();
        let (admin, patient, doctor) = pair(&accounts).await;
        let assignment = accounts
            .assign(&admin, link(&patient, &doctor, "checkup"))
            .await
            .unwrap();
        let id = assignment.meta.id;

        let editors: Vec<_> = (0..8)
            .map(|i| {
                let accounts = accounts.clone();
                tokio::spawn(async move {
                    accounts
                        .update_notes(&admin, id, Some(Some(format!("edit {i}"))))
                        .await
                })
            })
            .collect();
        accounts.unassign(&admin, id).await.unwrap();
        for editor in editors {
            match editor.await.unwrap() {
                Ok(_) | Err(AppError::NotFound) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        let stored = accounts.store().find_assignment(id).await.unwrap().unwrap();
        assert!(!stored.is_active());
        assert!(accounts.list_assignments().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_assigns_yield_one_link() {
        let accounts = accounts();
        let (admin, patient, doctor) = pair(&accounts).await;

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let accounts = accounts.clone();
                let new = link(&patient, &doctor, &format!("attempt {i}"));
                tokio::spawn(async move { accounts.assign(&admin, new).await })
            })
            .collect();

        let mut created = 0;
        let mut conflicts = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => created += 1,
                Err(AppError::Conflict { .. }) => conflicts += 1,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(conflicts, 7);
        assert_eq!(accounts.list_assignments().await.unwrap().len(), 1);
    }
}
