//! Typed partial updates.
//!
//! Each field is applied by name. `Option<Option<T>>` fields distinguish
//! "leave as is" (`None`) from "clear" (`Some(None)`).

use chrono::NaiveDate;

use crate::model::{BloodGroup, Doctor, Gender, Patient, User};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub name: Option<String>,
    pub phone: Option<Option<String>>,
    pub date_of_birth: Option<Option<NaiveDate>>,
    pub gender: Option<Option<Gender>>,
    pub address: Option<Option<String>>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.phone.is_none()
            && self.date_of_birth.is_none()
            && self.gender.is_none()
            && self.address.is_none()
    }

    pub fn apply(self, user: &mut User) {
        if let Some(name) = self.name {
            user.name = name;
        }
        if let Some(phone) = self.phone {
            user.phone = phone;
        }
        if let Some(dob) = self.date_of_birth {
            user.date_of_birth = dob;
        }
        if let Some(gender) = self.gender {
            user.gender = gender;
        }
        if let Some(address) = self.address {
            user.address = address;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DoctorPatch {
    pub user: UserPatch,
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub experience_years: Option<i32>,
    pub is_available: Option<bool>,
}

impl DoctorPatch {
    pub fn apply(self, doctor: &mut Doctor) {
        self.user.apply(&mut doctor.user);
        let profile = &mut doctor.profile;
        if let Some(specialization) = self.specialization {
            profile.specialization = specialization;
        }
        if let Some(license_number) = self.license_number {
            profile.license_number = license_number;
        }
        if let Some(years) = self.experience_years {
            profile.experience_years = years;
        }
        if let Some(available) = self.is_available {
            profile.is_available = available;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientPatch {
    pub user: UserPatch,
    pub blood_group: Option<Option<BloodGroup>>,
    pub medical_history: Option<Option<String>>,
    pub emergency_contact: Option<Option<String>>,
    pub allergies: Option<Option<String>>,
}

impl PatientPatch {
    pub fn apply(self, patient: &mut Patient) {
        self.user.apply(&mut patient.user);
        let profile = &mut patient.profile;
        if let Some(group) = self.blood_group {
            profile.blood_group = group;
        }
        if let Some(history) = self.medical_history {
            profile.medical_history = history;
        }
        if let Some(contact) = self.emergency_contact {
            profile.emergency_contact = contact;
        }
        if let Some(allergies) = self.allergies {
            profile.allergies = allergies;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PatientProfile, Role};
    use crate::record::RecordMeta;

    fn patient() -> Patient {
        let user = User {
            meta: RecordMeta::new(),
            email: "p@x.com".into(),
            password_hash: String::new(),
            name: "Pat".into(),
            role: Role::Patient,
            is_staff: false,
            phone: Some("+123456789".into()),
            date_of_birth: None,
            gender: Some(Gender::Female),
            address: None,
        };
        let profile = PatientProfile::empty(user.meta.id, Some(user.meta.id));
        Patient { profile, user }
    }

    #[test]
    fn untouched_fields_are_kept() {
        let mut p = patient();
        PatientPatch {
            allergies: Some(Some("penicillin".into())),
            ..Default::default()
        }
        .apply(&mut p);
        assert_eq!(p.profile.allergies.as_deref(), Some("penicillin"));
        assert_eq!(p.user.phone.as_deref(), Some("+123456789"));
        assert_eq!(p.user.gender, Some(Gender::Female));
    }

    #[test]
    fn explicit_none_clears() {
        let mut p = patient();
        let patch = PatientPatch {
            user: UserPatch {
                phone: Some(None),
                gender: Some(None),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(!patch.user.is_empty());
        patch.apply(&mut p);
        assert_eq!(p.user.phone, None);
        assert_eq!(p.user.gender, None);
        assert_eq!(p.user.name, "Pat");
    }
}
