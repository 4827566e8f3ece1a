//! Authorization decisions. Pure functions of the actor and the target.

use common::{Actor, Assignment, DoctorProfile, PatientProfile, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    fn from_bool(allowed: bool) -> Self {
        if allowed { Decision::Allow } else { Decision::Deny }
    }

    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    CreateDoctor,
    CreatePatient,
    CreateAssignment,
    UpdateDoctor(&'a DoctorProfile),
    DeleteDoctor(&'a DoctorProfile),
    UpdatePatient(&'a PatientProfile),
    DeletePatient(&'a PatientProfile),
    UpdateAssignment(&'a Assignment),
    DeleteAssignment(&'a Assignment),
}

impl Operation<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::CreateDoctor => "create_doctor",
            Operation::CreatePatient => "create_patient",
            Operation::CreateAssignment => "create_assignment",
            Operation::UpdateDoctor(_) => "update_doctor",
            Operation::DeleteDoctor(_) => "delete_doctor",
            Operation::UpdatePatient(_) => "update_patient",
            Operation::DeletePatient(_) => "delete_patient",
            Operation::UpdateAssignment(_) => "update_assignment",
            Operation::DeleteAssignment(_) => "delete_assignment",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Policy {
    /// When off, patient update/delete carries no ownership check.
    pub enforce_patient_ownership: bool,
}

impl Policy {
    pub fn authorize(&self, actor: &Actor, op: Operation<'_>) -> Decision {
        match op {
            Operation::CreateDoctor => Decision::from_bool(actor.role == Role::Admin),
            Operation::CreatePatient => {
                Decision::from_bool(matches!(actor.role, Role::Admin | Role::Doctor))
            }
            Operation::CreateAssignment => Decision::Allow,
            Operation::UpdateDoctor(profile) => Decision::from_bool(
                profile.created_by == Some(actor.id) || profile.user_id == actor.id,
            ),
            Operation::DeleteDoctor(profile) => {
                Decision::from_bool(profile.created_by == Some(actor.id))
            }
            Operation::UpdatePatient(profile) | Operation::DeletePatient(profile) => {
                if self.enforce_patient_ownership {
                    Decision::from_bool(
                        profile.created_by == Some(actor.id) || profile.user_id == actor.id,
                    )
                } else {
                    tracing::debug!(
                        actor = %actor.id,
                        patient = %profile.meta.id,
                        "patient change allowed without ownership check"
                    );
                    Decision::Allow
                }
            }
            Operation::UpdateAssignment(assignment) | Operation::DeleteAssignment(assignment) => {
                Decision::from_bool(assignment.created_by == Some(actor.id))
            }
        }
    }
}
