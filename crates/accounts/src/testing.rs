use std::sync::Arc;

use auth::JwtKeys;
use common::{Actor, Role};
use db::MemoryStore;

use crate::{
    Accounts, AccountsConfig, DoctorFields, NewDoctor, NewPatient, PatientFields, Registration,
    UserFields,
};

pub const PASSWORD: &str = "Str0ng-Passw0rd";

pub fn accounts() -> Accounts {
    let config = AccountsConfig::new(JwtKeys::from_secret("test-secret"));
    Accounts::new(Arc::new(MemoryStore::new()), config)
}

pub fn user_fields(email: &str, name: &str) -> UserFields {
    UserFields {
        email: email.into(),
        name: name.into(),
        password: PASSWORD.into(),
        ..Default::default()
    }
}

pub fn registration(email: &str, name: &str, role: Role) -> Registration {
    Registration {
        user: user_fields(email, name),
        password_confirm: PASSWORD.into(),
        role,
    }
}

pub async fn admin(accounts: &Accounts) -> Actor {
    let user = accounts
        .register(registration("admin@x.com", "Site Admin", Role::Admin))
        .await
        .unwrap();
    Actor::from(&user)
}

pub fn new_doctor(email: &str, license: &str) -> NewDoctor {
    NewDoctor {
        user: user_fields(email, "Doc Tor"),
        profile: DoctorFields {
            specialization: "Cardiology".into(),
            license_number: license.into(),
            experience_years: 5,
            is_available: true,
        },
    }
}

pub fn new_patient(email: &str) -> NewPatient {
    NewPatient {
        user: user_fields(email, "Pat Ient"),
        profile: PatientFields {
            medical_history: Some("Asthma".into()),
            emergency_contact: Some("+1234567890".into()),
            ..Default::default()
        },
    }
}
