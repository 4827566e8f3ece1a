//! Account, profile and assignment rules.
//!
//! [`Accounts`] coordinates every multi-entity operation: it loads records
//! from an [`AccountStore`], asks [`policy`] whether the actor may proceed,
//! validates input and hands the resulting writes to the store as a single
//! unit of work.

pub mod assignments;
pub mod doctors;
pub mod identity;
pub mod patients;
pub mod policy;
pub mod sessions;
pub mod validation;

use std::sync::Arc;

use auth::JwtKeys;
use common::{Actor, AppError, AppResult, SoftDeletable};
use db::{AccountStore, DbError, UniqueKey};
use uuid::Uuid;

pub use assignments::NewAssignment;
pub use doctors::{DoctorFields, NewDoctor};
pub use identity::{AuthOutcome, Registration, UserFields};
pub use patients::{NewPatient, PatientFields};
pub use policy::{Decision, Operation, Policy};

#[derive(Clone)]
pub struct AccountsConfig {
    pub jwt: JwtKeys,
    pub access_ttl: i64,
    pub refresh_ttl: i64,
    /// Apply the doctor-style ownership rule to patient update/delete.
    pub enforce_patient_ownership: bool,
}

impl AccountsConfig {
    pub fn new(jwt: JwtKeys) -> Self {
        Self {
            jwt,
            access_ttl: 900,
            refresh_ttl: 60 * 60 * 24 * 7,
            enforce_patient_ownership: false,
        }
    }
}

#[derive(Clone)]
pub struct Accounts {
    store: Arc<dyn AccountStore>,
    config: AccountsConfig,
    policy: Policy,
}

impl Accounts {
    pub fn new(store: Arc<dyn AccountStore>, config: AccountsConfig) -> Self {
        let policy = Policy {
            enforce_patient_ownership: config.enforce_patient_ownership,
        };
        Self {
            store,
            config,
            policy,
        }
    }

    pub fn store(&self) -> &dyn AccountStore {
        self.store.as_ref()
    }

    pub fn jwt_keys(&self) -> &JwtKeys {
        &self.config.jwt
    }

    /// Load the principal behind an authenticated request.
    pub async fn resolve_actor(&self, user_id: Uuid) -> AppResult<Actor> {
        let user = self
            .store
            .find_user(user_id)
            .await
            .map_err(storage)?
            .ok_or(AppError::Unauthorized)?;
        if !user.is_active() {
            return Err(AppError::AccountDisabled);
        }
        Ok(Actor::from(&user))
    }

    fn authorize(&self, actor: &Actor, op: Operation<'_>, denial: &str) -> AppResult<()> {
        match self.policy.authorize(actor, op) {
            Decision::Allow => Ok(()),
            Decision::Deny => {
                tracing::warn!(actor = %actor.id, operation = op.name(), "permission denied");
                Err(AppError::forbidden(denial))
            }
        }
    }
}

/// Storage faults are logged here and surface only as `Internal`.
pub(crate) fn storage(e: DbError) -> AppError {
    tracing::error!(error = %e, "storage failure");
    AppError::Internal
}

/// Map a write failure, turning constraint violations into conflicts.
pub(crate) fn write_failure(e: DbError) -> AppError {
    match e {
        DbError::Unique(UniqueKey::Email) => email_taken(),
        DbError::Unique(UniqueKey::LicenseNumber) => license_taken(),
        DbError::Unique(UniqueKey::ActiveAssignment) => already_assigned(),
        other => storage(other),
    }
}

pub(crate) fn email_taken() -> AppError {
    AppError::conflict("email", "User with this email already exists.")
}

pub(crate) fn license_taken() -> AppError {
    AppError::conflict(
        "license_number",
        "Doctor with this license number already exists.",
    )
}

pub(crate) fn already_assigned() -> AppError {
    AppError::conflict(
        "non_field_errors",
        "This patient is already assigned to this doctor.",
    )
}

#[cfg(test)]
pub(crate) mod testing;
