/// Uniqueness constraints the schema enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueKey {
    Email,
    LicenseNumber,
    /// At most one active assignment per (patient, doctor) pair.
    ActiveAssignment,
    DoctorUser,
    PatientUser,
    Other,
}

impl UniqueKey {
    pub fn from_constraint(name: Option<&str>) -> Self {
        match name {
            Some("users_email_key") => Self::Email,
            Some("doctor_profiles_license_number_key") => Self::LicenseNumber,
            Some("unique_active_patient_doctor_assignment") => Self::ActiveAssignment,
            Some("doctor_profiles_user_id_key") => Self::DoctorUser,
            Some("patient_profiles_user_id_key") => Self::PatientUser,
            _ => Self::Other,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DbError {
    #[error("sqlx error: {0}")]
    Sqlx(sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("unique constraint violated: {0:?}")]
    Unique(UniqueKey),

    #[error("stored row is invalid: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return DbError::Unique(UniqueKey::from_constraint(db_err.constraint()));
            }
        }
        DbError::Sqlx(e)
    }
}

impl From<common::UnknownVariant> for DbError {
    fn from(e: common::UnknownVariant) -> Self {
        DbError::Corrupt(e.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;
