//! Request bodies and response shapes.

use accounts::{
    DoctorFields, NewAssignment, NewDoctor, NewPatient, PatientFields, Registration, UserFields,
};
use chrono::{DateTime, NaiveDate, Utc};
use common::{
    AppError, AppResult, AssignedDoctor, BloodGroup, Doctor, DoctorPatch, FieldError, Gender,
    Patient, PatientPatch, Role, User, UserPatch,
};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Tell an explicit `null` (`Some(None)`) apart from an absent field (`None`).
fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

fn required(field: &str) -> FieldError {
    FieldError::new(field, "This field is required.")
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UserInput {
    pub email: String,
    pub name: String,
    pub password: String,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub address: Option<String>,
}

impl From<UserInput> for UserFields {
    fn from(u: UserInput) -> Self {
        UserFields {
            email: u.email,
            name: u.name,
            password: u.password,
            phone: u.phone,
            date_of_birth: u.date_of_birth,
            gender: u.gender,
            address: u.address,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterInput {
    #[serde(flatten)]
    pub user: UserInput,
    #[serde(default)]
    pub password_confirm: String,
    #[serde(default)]
    pub role: Role,
}

impl From<RegisterInput> for Registration {
    fn from(input: RegisterInput) -> Self {
        Registration {
            user: input.user.into(),
            password_confirm: input.password_confirm,
            role: input.role,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RefreshInput {
    pub refresh: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DoctorCreateInput {
    #[serde(flatten)]
    pub user: UserInput,
    #[serde(default)]
    pub specialization: String,
    #[serde(default)]
    pub license_number: String,
    pub experience_years: Option<i32>,
    pub is_available: Option<bool>,
}

impl From<DoctorCreateInput> for NewDoctor {
    fn from(input: DoctorCreateInput) -> Self {
        let defaults = DoctorFields::default();
        NewDoctor {
            user: input.user.into(),
            profile: DoctorFields {
                specialization: input.specialization,
                license_number: input.license_number,
                experience_years: input.experience_years.unwrap_or(defaults.experience_years),
                is_available: input.is_available.unwrap_or(defaults.is_available),
            },
        }
    }
}

/// User-level fields accepted by profile updates.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UserUpdateInput {
    pub name: Option<String>,
    #[serde(deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    pub date_of_birth: Option<Option<NaiveDate>>,
    #[serde(deserialize_with = "double_option")]
    pub gender: Option<Option<Gender>>,
    #[serde(deserialize_with = "double_option")]
    pub address: Option<Option<String>>,
}

impl From<UserUpdateInput> for UserPatch {
    fn from(u: UserUpdateInput) -> Self {
        UserPatch {
            name: u.name,
            phone: u.phone,
            date_of_birth: u.date_of_birth,
            gender: u.gender,
            address: u.address,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DoctorUpdateInput {
    #[serde(flatten)]
    pub user: UserUpdateInput,
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub experience_years: Option<i32>,
    pub is_available: Option<bool>,
}

impl DoctorUpdateInput {
    /// A full replace must carry the required profile fields.
    pub fn require_full(&self) -> AppResult<()> {
        let mut missing = Vec::new();
        if self.specialization.is_none() {
            missing.push(required("specialization"));
        }
        if self.license_number.is_none() {
            missing.push(required("license_number"));
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(missing))
        }
    }
}

impl From<DoctorUpdateInput> for DoctorPatch {
    fn from(input: DoctorUpdateInput) -> Self {
        DoctorPatch {
            user: input.user.into(),
            specialization: input.specialization,
            license_number: input.license_number,
            experience_years: input.experience_years,
            is_available: input.is_available,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PatientCreateInput {
    #[serde(flatten)]
    pub user: UserInput,
    pub blood_group: Option<BloodGroup>,
    pub medical_history: Option<String>,
    pub emergency_contact: Option<String>,
    pub allergies: Option<String>,
}

impl From<PatientCreateInput> for NewPatient {
    fn from(input: PatientCreateInput) -> Self {
        NewPatient {
            user: input.user.into(),
            profile: PatientFields {
                blood_group: input.blood_group,
                medical_history: input.medical_history,
                emergency_contact: input.emergency_contact,
                allergies: input.allergies,
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PatientUpdateInput {
    #[serde(flatten)]
    pub user: UserUpdateInput,
    #[serde(deserialize_with = "double_option")]
    pub blood_group: Option<Option<BloodGroup>>,
    #[serde(deserialize_with = "double_option")]
    pub medical_history: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    pub emergency_contact: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    pub allergies: Option<Option<String>>,
}

impl From<PatientUpdateInput> for PatientPatch {
    fn from(input: PatientUpdateInput) -> Self {
        PatientPatch {
            user: input.user.into(),
            blood_group: input.blood_group,
            medical_history: input.medical_history,
            emergency_contact: input.emergency_contact,
            allergies: input.allergies,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AssignmentInput {
    pub patient: Option<Uuid>,
    pub doctor: Option<Uuid>,
    pub notes: Option<String>,
}

impl AssignmentInput {
    pub fn into_new(self) -> AppResult<NewAssignment> {
        match (self.patient, self.doctor) {
            (Some(patient_id), Some(doctor_id)) => Ok(NewAssignment {
                patient_id,
                doctor_id,
                notes: self.notes,
            }),
            (patient, doctor) => {
                let mut missing = Vec::new();
                if patient.is_none() {
                    missing.push(required("patient"));
                }
                if doctor.is_none() {
                    missing.push(required("doctor"));
                }
                Err(AppError::Validation(missing))
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NotesInput {
    #[serde(deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

#[derive(Debug, Serialize)]
pub struct TokensOut {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Serialize)]
pub struct SessionOut<'a> {
    pub user: &'a User,
    pub tokens: TokensOut,
}

/// Compact user shape used inside lists and assignment details.
#[derive(Debug, Serialize)]
pub struct UserSummary<'a> {
    pub id: Uuid,
    pub email: &'a str,
    pub name: &'a str,
    pub full_name: &'a str,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl<'a> From<&'a User> for UserSummary<'a> {
    fn from(u: &'a User) -> Self {
        UserSummary {
            id: u.meta.id,
            email: &u.email,
            name: &u.name,
            full_name: &u.name,
            role: u.role,
            is_active: u.meta.is_active,
            created_at: u.meta.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DoctorOut<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user: &'a User,
    pub full_name: &'a str,
    pub specialization: &'a str,
    pub license_number: &'a str,
    pub experience_years: i32,
    pub is_available: bool,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'a> From<&'a Doctor> for DoctorOut<'a> {
    fn from(d: &'a Doctor) -> Self {
        let p = &d.profile;
        DoctorOut {
            id: p.meta.id,
            user_id: p.user_id,
            user: &d.user,
            full_name: &d.user.name,
            specialization: &p.specialization,
            license_number: &p.license_number,
            experience_years: p.experience_years,
            is_available: p.is_available,
            is_active: p.meta.is_active,
            created_by: p.created_by,
            created_at: p.meta.created_at,
            updated_at: p.meta.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DoctorListItem<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: &'a str,
    pub email: &'a str,
    pub phone: Option<&'a str>,
    pub full_name: &'a str,
    pub specialization: &'a str,
    pub is_available: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl<'a> From<&'a Doctor> for DoctorListItem<'a> {
    fn from(d: &'a Doctor) -> Self {
        DoctorListItem {
            id: d.profile.meta.id,
            user_id: d.user.meta.id,
            name: &d.user.name,
            email: &d.user.email,
            phone: d.user.phone.as_deref(),
            full_name: &d.user.name,
            specialization: &d.profile.specialization,
            is_available: d.profile.is_available,
            is_active: d.profile.meta.is_active,
            created_at: d.profile.meta.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PatientOut<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user: &'a User,
    pub full_name: &'a str,
    pub blood_group: Option<BloodGroup>,
    pub medical_history: Option<&'a str>,
    pub emergency_contact: Option<&'a str>,
    pub allergies: Option<&'a str>,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'a> From<&'a Patient> for PatientOut<'a> {
    fn from(p: &'a Patient) -> Self {
        let profile = &p.profile;
        PatientOut {
            id: profile.meta.id,
            user_id: profile.user_id,
            user: &p.user,
            full_name: &p.user.name,
            blood_group: profile.blood_group,
            medical_history: profile.medical_history.as_deref(),
            emergency_contact: profile.emergency_contact.as_deref(),
            allergies: profile.allergies.as_deref(),
            is_active: profile.meta.is_active,
            created_by: profile.created_by,
            created_at: profile.meta.created_at,
            updated_at: profile.meta.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PatientListItem<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: &'a str,
    pub full_name: &'a str,
    pub email: &'a str,
    pub phone: Option<&'a str>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub blood_group: Option<BloodGroup>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl<'a> From<&'a Patient> for PatientListItem<'a> {
    fn from(p: &'a Patient) -> Self {
        PatientListItem {
            id: p.profile.meta.id,
            user_id: p.user.meta.id,
            name: &p.user.name,
            full_name: &p.user.name,
            email: &p.user.email,
            phone: p.user.phone.as_deref(),
            date_of_birth: p.user.date_of_birth,
            gender: p.user.gender,
            blood_group: p.profile.blood_group,
            is_active: p.profile.meta.is_active,
            created_at: p.profile.meta.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DoctorProfileSummary<'a> {
    pub id: Uuid,
    pub specialization: &'a str,
    pub license_number: &'a str,
    pub experience_years: i32,
    pub is_available: bool,
}

#[derive(Debug, Serialize)]
pub struct AssignedDoctorOut<'a> {
    pub id: Uuid,
    pub doctor: UserSummary<'a>,
    pub doctor_profile: Option<DoctorProfileSummary<'a>>,
    pub notes: Option<&'a str>,
    pub assigned_date: NaiveDate,
    pub is_active: bool,
}

impl<'a> From<&'a AssignedDoctor> for AssignedDoctorOut<'a> {
    fn from(a: &'a AssignedDoctor) -> Self {
        AssignedDoctorOut {
            id: a.assignment.meta.id,
            doctor: UserSummary::from(&a.doctor),
            doctor_profile: a.doctor_profile.as_ref().map(|p| DoctorProfileSummary {
                id: p.meta.id,
                specialization: &p.specialization,
                license_number: &p.license_number,
                experience_years: p.experience_years,
                is_available: p.is_available,
            }),
            notes: a.assignment.notes.as_deref(),
            assigned_date: a.assignment.assigned_date,
            is_active: a.assignment.meta.is_active,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PatientDoctorsOut<'a> {
    pub patient: &'a str,
    pub patient_id: Uuid,
    pub count: usize,
    pub assigned_doctors: Vec<AssignedDoctorOut<'a>>,
}

impl<'a> PatientDoctorsOut<'a> {
    pub fn new(patient: &'a User, doctors: &'a [AssignedDoctor]) -> Self {
        PatientDoctorsOut {
            patient: &patient.name,
            patient_id: patient.meta.id,
            count: doctors.len(),
            assigned_doctors: doctors.iter().map(AssignedDoctorOut::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_and_absent_fields_differ() {
        let input: PatientUpdateInput =
            serde_json::from_value(json!({"allergies": null, "blood_group": "B+"})).unwrap();
        assert_eq!(input.allergies, Some(None));
        assert_eq!(input.medical_history, None);
        assert_eq!(input.blood_group, Some(Some(BloodGroup::BPositive)));
    }

    #[test]
    fn full_doctor_update_needs_profile_fields() {
        let input: DoctorUpdateInput =
            serde_json::from_value(json!({"specialization": "Oncology"})).unwrap();
        let AppError::Validation(fields) = input.require_full().unwrap_err() else {
            panic!("expected validation error");
        };
        assert_eq!(fields, vec![required("license_number")]);
    }

    #[test]
    fn registration_defaults_to_patient() {
        let input: RegisterInput = serde_json::from_value(json!({
            "email": "a@x.com",
            "name": "Jane Doe",
            "password": "pw",
            "password_confirm": "pw",
            "gender": "F"
        }))
        .unwrap();
        let reg = Registration::from(input);
        assert_eq!(reg.role, Role::Patient);
        assert_eq!(reg.user.gender, Some(Gender::Female));
    }

    #[test]
    fn assignment_requires_both_users() {
        let input: AssignmentInput = serde_json::from_value(json!({"notes": "x"})).unwrap();
        let AppError::Validation(fields) = input.into_new().unwrap_err() else {
            panic!("expected validation error");
        };
        assert_eq!(fields.len(), 2);
    }
}
