use chrono::{NaiveDate, Utc};
use common::{
    normalize, AppError, AppResult, Gender, PatientProfile, RecordMeta, Role, SoftDeletable,
    User, UserPatch,
};
use uuid::Uuid;

use crate::validation::Checks;
use crate::{Accounts, email_taken, storage, write_failure};

/// Contact and demographic fields shared by every user-creating flow.
#[derive(Debug, Clone, Default)]
pub struct UserFields {
    pub email: String,
    pub name: String,
    pub password: String,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub address: Option<String>,
}

impl UserFields {
    /// Normalize in place and record every field problem in `checks`.
    pub(crate) fn normalize_into(&mut self, checks: &mut Checks) {
        self.email = normalize::email(&self.email);
        self.name = normalize::name(&self.name);
        self.phone = normalize::optional_text(self.phone.take());
        self.address = normalize::optional_text(self.address.take());
        checks.email(&self.email);
        checks.name(&self.name);
        checks.phone("phone", self.phone.as_deref());
    }

    pub(crate) fn into_user(self, role: Role, password_hash: String) -> User {
        User {
            meta: RecordMeta::new(),
            email: self.email,
            password_hash,
            name: self.name,
            role,
            is_staff: false,
            phone: self.phone,
            date_of_birth: self.date_of_birth,
            gender: self.gender,
            address: self.address,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub user: UserFields,
    pub password_confirm: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub enum AuthOutcome {
    Authenticated(User),
    /// Credentials matched an account that has been deactivated.
    Disabled(User),
    Invalid,
}

pub(crate) fn hash(password: &str) -> AppResult<String> {
    auth::hash_password(password).map_err(|e| {
        tracing::error!(error = %e, "password hashing failed");
        AppError::Internal
    })
}

/// Normalize and validate the user-level half of a profile patch.
pub(crate) fn normalize_user_patch(patch: &mut UserPatch, checks: &mut Checks) {
    if let Some(name) = patch.name.as_mut() {
        *name = normalize::name(name);
        checks.name(name);
    }
    if let Some(phone) = patch.phone.as_mut() {
        *phone = normalize::optional_text(phone.take());
        checks.phone("phone", phone.as_deref());
    }
    if let Some(address) = patch.address.as_mut() {
        *address = normalize::optional_text(address.take());
    }
}

impl Accounts {
    /// Self-service sign-up. A patient registration also creates the
    /// patient's own profile in the same unit of work.
    pub async fn register(&self, registration: Registration) -> AppResult<User> {
        let Registration {
            user: mut fields,
            password_confirm,
            role,
        } = registration;

        let mut checks = Checks::new();
        fields.normalize_into(&mut checks);
        if fields.password != password_confirm {
            checks.push("password", "Password fields didn't match.");
        }
        checks.password_policy(&fields.password, &fields.email);
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
        let user = fields.into_user(role, password_hash);
        let profile = (role == Role::Patient)
            .then(|| PatientProfile::empty(user.meta.id, Some(user.meta.id)));

        self.store
            .insert_user(&user, profile.as_ref())
            .await
            .map_err(write_failure)?;

        tracing::info!(user = %user.meta.id, role = %role, "user registered");
        Ok(user)
    }

    /// Case-insensitive credential check.
    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<AuthOutcome> {
        let email = normalize::email(email);
        let Some(user) = self
            .store
            .find_user_by_email(&email)
            .await
            .map_err(storage)?
        else {
            return Ok(AuthOutcome::Invalid);
        };
        if !auth::verify_password(password, &user.password_hash) {
            return Ok(AuthOutcome::Invalid);
        }
        if !user.is_active() {
            return Ok(AuthOutcome::Disabled(user));
        }
        Ok(AuthOutcome::Authenticated(user))
    }

    /// Switch the account off. Deactivating twice is a no-op.
    pub async fn deactivate(&self, user_id: Uuid) -> AppResult<()> {
        let user = self
            .store
            .find_user(user_id)
            .await
            .map_err(storage)?
            .ok_or(AppError::NotFound)?;
        if !user.is_active() {
            return Ok(());
        }
        self.store
            .deactivate_user(user_id, Utc::now())
            .await
            .map_err(storage)?;
        tracing::info!(user = %user_id, "user deactivated");
        Ok(())
    }
}
