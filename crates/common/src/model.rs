use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::{impl_record, RecordMeta};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown {kind} value: {value:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),* $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),*];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),*
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)*
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Doctor,
    #[default]
    Patient,
}

string_enum!(Role, "role", {
    Admin => "admin",
    Doctor => "doctor",
    Patient => "patient",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
    #[serde(rename = "O")]
    Other,
}

string_enum!(Gender, "gender", {
    Male => "M",
    Female => "F",
    Other => "O",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BloodGroup {
    #[serde(rename = "A+")]
    APositive,
    #[serde(rename = "A-")]
    ANegative,
    #[serde(rename = "B+")]
    BPositive,
    #[serde(rename = "B-")]
    BNegative,
    #[serde(rename = "AB+")]
    AbPositive,
    #[serde(rename = "AB-")]
    AbNegative,
    #[serde(rename = "O+")]
    OPositive,
    #[serde(rename = "O-")]
    ONegative,
}

string_enum!(BloodGroup, "blood group", {
    APositive => "A+",
    ANegative => "A-",
    BPositive => "B+",
    BNegative => "B-",
    AbPositive => "AB+",
    AbNegative => "AB-",
    OPositive => "O+",
    ONegative => "O-",
});

/// Account record. Never hard-deleted; `meta.is_active` is the login switch.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub role: Role,
    pub is_staff: bool,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorProfile {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub user_id: Uuid,
    pub specialization: String,
    pub license_number: String,
    pub experience_years: i32,
    pub is_available: bool,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientProfile {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub user_id: Uuid,
    pub blood_group: Option<BloodGroup>,
    pub medical_history: Option<String>,
    pub emergency_contact: Option<String>,
    pub allergies: Option<String>,
    pub created_by: Option<Uuid>,
}

impl PatientProfile {
    /// Empty clinical profile for `user_id`.
    pub fn empty(user_id: Uuid, created_by: Option<Uuid>) -> Self {
        Self {
            meta: RecordMeta::new(),
            user_id,
            blood_group: None,
            medical_history: None,
            emergency_contact: None,
            allergies: None,
            created_by,
        }
    }
}

/// Link stating that `doctor_id` currently treats `patient_id`.
///
/// `patient_id`, `doctor_id` and `assigned_date` never change after creation.
#[derive(Debug, Clone, Serialize)]
pub struct Assignment {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub notes: Option<String>,
    pub assigned_date: NaiveDate,
    pub created_by: Option<Uuid>,
}

impl_record!(User, DoctorProfile, PatientProfile, Assignment);

/// A doctor profile together with its owning user.
#[derive(Debug, Clone)]
pub struct Doctor {
    pub profile: DoctorProfile,
    pub user: User,
}

/// A patient profile together with its owning user.
#[derive(Debug, Clone)]
pub struct Patient {
    pub profile: PatientProfile,
    pub user: User,
}

/// An active assignment resolved with the assigned doctor.
#[derive(Debug, Clone)]
pub struct AssignedDoctor {
    pub assignment: Assignment,
    pub doctor: User,
    pub doctor_profile: Option<DoctorProfile>,
}

/// The authenticated principal an operation runs on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self {
            id: user.meta.id,
            role: user.role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_round_trip_through_text() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), *role);
        }
        for group in BloodGroup::ALL {
            assert_eq!(group.as_str().parse::<BloodGroup>().unwrap(), *group);
        }
        assert_eq!("F".parse::<Gender>().unwrap(), Gender::Female);
    }

    #[test]
    fn unknown_role_is_rejected() {
        let err = "superuser".parse::<Role>().unwrap_err();
        assert_eq!(err.kind, "role");
    }

    #[test]
    fn serde_names_match_text_form() {
        assert_eq!(serde_json::to_string(&BloodGroup::AbNegative).unwrap(), "\"AB-\"");
        assert_eq!(serde_json::to_string(&Role::Doctor).unwrap(), "\"doctor\"");
        let g: Gender = serde_json::from_str("\"O\"").unwrap();
        assert_eq!(g, Gender::Other);
    }

    #[test]
    fn user_json_hides_password_hash() {
        let user = User {
            meta: RecordMeta::new(),
            email: "a@x.com".into(),
            password_hash: "secret".into(),
            name: "Jane Doe".into(),
            role: Role::Patient,
            is_staff: false,
            phone: None,
            date_of_birth: None,
            gender: None,
            address: None,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["is_active"], true);
    }
}
