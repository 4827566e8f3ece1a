use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::{
    Assignment, BloodGroup, Doctor, DoctorProfile, Gender, Patient, PatientProfile, RecordMeta,
    User,
};
use sqlx::{PgConnection, PgPool, postgres::PgPoolOptions};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::store::{AccountStore, RefreshRecord};

#[derive(Debug, Clone)]
pub struct Db(pub PgPool);

pub async fn connect(database_url: &str, max: u32) -> Result<Db, DbError> {
    let pool = PgPoolOptions::new()
        .max_connections(max)
        .connect(database_url)
        .await?;
    Ok(Db(pool))
}

pub async fn migrate(db: &Db) -> Result<(), DbError> {
    sqlx::migrate!("./migrations").run(&db.0).await?;
    tracing::info!("database migrations applied");
    Ok(())
}

// ==== Rows ====

const USER_COLUMNS: &str = "id, email, password_hash, name, role, is_active, is_staff, \
     phone, date_of_birth, gender, address, created_at, updated_at";
const DOCTOR_COLUMNS: &str = "id, user_id, specialization, license_number, experience_years, \
     is_available, is_active, created_by, created_at, updated_at";
const PATIENT_COLUMNS: &str = "id, user_id, blood_group, medical_history, emergency_contact, \
     allergies, is_active, created_by, created_at, updated_at";
const ASSIGNMENT_COLUMNS: &str = "id, patient_id, doctor_id, notes, assigned_date, is_active, \
     created_by, created_at, updated_at";

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = DbError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            meta: RecordMeta {
                id: row.id,
                is_active: row.is_active,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            email: row.email,
            password_hash: row.password_hash,
            name: row.name,
            role: row.role.parse()?,
            is_staff: row.is_staff,
            phone: row.phone,
            date_of_birth: row.date_of_birth,
            gender: row.gender.as_deref().map(str::parse::<Gender>).transpose()?,
            address: row.address,
        })
    }
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct DoctorRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub specialization: String,
    pub license_number: String,
    pub experience_years: i32,
    pub is_available: bool,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DoctorRow> for DoctorProfile {
    fn from(row: DoctorRow) -> Self {
        DoctorProfile {
            meta: RecordMeta {
                id: row.id,
                is_active: row.is_active,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            user_id: row.user_id,
            specialization: row.specialization,
            license_number: row.license_number,
            experience_years: row.experience_years,
            is_available: row.is_available,
            created_by: row.created_by,
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct PatientRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub blood_group: Option<String>,
    pub medical_history: Option<String>,
    pub emergency_contact: Option<String>,
    pub allergies: Option<String>,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PatientRow> for PatientProfile {
    type Error = DbError;

    fn try_from(row: PatientRow) -> Result<Self, Self::Error> {
        Ok(PatientProfile {
            meta: RecordMeta {
                id: row.id,
                is_active: row.is_active,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            user_id: row.user_id,
            blood_group: row
                .blood_group
                .as_deref()
                .map(str::parse::<BloodGroup>)
                .transpose()?,
            medical_history: row.medical_history,
            emergency_contact: row.emergency_contact,
            allergies: row.allergies,
            created_by: row.created_by,
        })
    }
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct AssignmentRow {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub notes: Option<String>,
    pub assigned_date: NaiveDate,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AssignmentRow> for Assignment {
    fn from(row: AssignmentRow) -> Self {
        Assignment {
            meta: RecordMeta {
                id: row.id,
                is_active: row.is_active,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            patient_id: row.patient_id,
            doctor_id: row.doctor_id,
            notes: row.notes,
            assigned_date: row.assigned_date,
            created_by: row.created_by,
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RefreshRow {
    pub id: i64,
    pub user_id: Uuid,
    pub jti: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

impl From<RefreshRow> for RefreshRecord {
    fn from(row: RefreshRow) -> Self {
        RefreshRecord {
            user_id: row.user_id,
            jti: row.jti,
            token_hash: row.token_hash,
            expires_at: row.expires_at,
            revoked: row.revoked,
            created_at: row.created_at,
        }
    }
}

// ==== Users ====

async fn insert_user_row(conn: &mut PgConnection, user: &User) -> DbResult<()> {
    sqlx::query(
        r#"INSERT INTO users (
               id, email, password_hash, name, role, is_active, is_staff,
               phone, date_of_birth, gender, address, created_at, updated_at
           )
           VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)"#,
    )
    .bind(user.meta.id)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.name)
    .bind(user.role.as_str())
    .bind(user.meta.is_active)
    .bind(user.is_staff)
    .bind(&user.phone)
    .bind(user.date_of_birth)
    .bind(user.gender.map(|g| g.as_str()))
    .bind(&user.address)
    .bind(user.meta.created_at)
    .bind(user.meta.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn update_user_row(conn: &mut PgConnection, user: &User) -> DbResult<()> {
    sqlx::query(
        r#"UPDATE users
           SET name=$2, phone=$3, date_of_birth=$4, gender=$5, address=$6, updated_at=$7
           WHERE id=$1"#,
    )
    .bind(user.meta.id)
    .bind(&user.name)
    .bind(&user.phone)
    .bind(user.date_of_birth)
    .bind(user.gender.map(|g| g.as_str()))
    .bind(&user.address)
    .bind(user.meta.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Deactivate the owner of a profile row that was just soft-deleted.
async fn deactivate_owner(
    conn: &mut PgConnection,
    user_id: Option<Uuid>,
    at: DateTime<Utc>,
) -> DbResult<bool> {
    let Some(user_id) = user_id else {
        return Ok(false);
    };
    sqlx::query("UPDATE users SET is_active=FALSE, updated_at=$2 WHERE id=$1")
        .bind(user_id)
        .bind(at)
        .execute(&mut *conn)
        .await?;
    Ok(true)
}

async fn users_by_ids(db: &Db, ids: &[Uuid]) -> DbResult<HashMap<Uuid, User>> {
    let rows = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"
    ))
    .bind(ids)
    .fetch_all(&db.0)
    .await?;
    rows.into_iter()
        .map(|row| User::try_from(row).map(|u| (u.meta.id, u)))
        .collect()
}

fn owner<'a>(users: &'a HashMap<Uuid, User>, user_id: Uuid) -> DbResult<&'a User> {
    users
        .get(&user_id)
        .ok_or_else(|| DbError::Corrupt(format!("profile references missing user {user_id}")))
}

// ==== Profiles ====

async fn insert_patient_row(conn: &mut PgConnection, profile: &PatientProfile) -> DbResult<()> {
    sqlx::query(
        r#"INSERT INTO patient_profiles (
               id, user_id, blood_group, medical_history, emergency_contact, allergies,
               is_active, created_by, created_at, updated_at
           )
           VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)"#,
    )
    .bind(profile.meta.id)
    .bind(profile.user_id)
    .bind(profile.blood_group.map(|b| b.as_str()))
    .bind(&profile.medical_history)
    .bind(&profile.emergency_contact)
    .bind(&profile.allergies)
    .bind(profile.meta.is_active)
    .bind(profile.created_by)
    .bind(profile.meta.created_at)
    .bind(profile.meta.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn doctors_with_users(db: &Db, rows: Vec<DoctorRow>) -> DbResult<Vec<Doctor>> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.user_id).collect();
    let users = users_by_ids(db, &ids).await?;
    rows.into_iter()
        .map(|row| {
            let user = owner(&users, row.user_id)?.clone();
            Ok(Doctor {
                profile: row.into(),
                user,
            })
        })
        .collect()
}

async fn patients_with_users(db: &Db, rows: Vec<PatientRow>) -> DbResult<Vec<Patient>> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.user_id).collect();
    let users = users_by_ids(db, &ids).await?;
    rows.into_iter()
        .map(|row| {
            let user = owner(&users, row.user_id)?.clone();
            Ok(Patient {
                profile: row.try_into()?,
                user,
            })
        })
        .collect()
}

#[async_trait]
impl AccountStore for Db {
    async fn find_user(&self, id: Uuid) -> DbResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id=$1"
        ))
        .bind(id)
        .fetch_optional(&self.0)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email=$1"
        ))
        .bind(email)
        .fetch_optional(&self.0)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn insert_user(&self, user: &User, patient: Option<&PatientProfile>) -> DbResult<()> {
        let mut tx = self.0.begin().await?;
        insert_user_row(&mut tx, user).await?;
        if let Some(profile) = patient {
            insert_patient_row(&mut tx, profile).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn deactivate_user(&self, id: Uuid, at: DateTime<Utc>) -> DbResult<()> {
        sqlx::query("UPDATE users SET is_active=FALSE, updated_at=$2 WHERE id=$1")
            .bind(id)
            .bind(at)
            .execute(&self.0)
            .await?;
        Ok(())
    }

    async fn license_exists(&self, license: &str, except: Option<Uuid>) -> DbResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"SELECT EXISTS(
                   SELECT 1 FROM doctor_profiles
                   WHERE license_number=$1 AND ($2::uuid IS NULL OR id <> $2)
               )"#,
        )
        .bind(license)
        .bind(except)
        .fetch_one(&self.0)
        .await?;
        Ok(exists)
    }

    async fn insert_doctor(&self, user: &User, profile: &DoctorProfile) -> DbResult<()> {
        let mut tx = self.0.begin().await?;
        insert_user_row(&mut tx, user).await?;
        sqlx::query(
            r#"INSERT INTO doctor_profiles (
                   id, user_id, specialization, license_number, experience_years,
                   is_available, is_active, created_by, created_at, updated_at
               )
               VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)"#,
        )
        .bind(profile.meta.id)
        .bind(profile.user_id)
        .bind(&profile.specialization)
        .bind(&profile.license_number)
        .bind(profile.experience_years)
        .bind(profile.is_available)
        .bind(profile.meta.is_active)
        .bind(profile.created_by)
        .bind(profile.meta.created_at)
        .bind(profile.meta.updated_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn find_doctor(&self, id: Uuid) -> DbResult<Option<Doctor>> {
        let row = sqlx::query_as::<_, DoctorRow>(&format!(
            "SELECT {DOCTOR_COLUMNS} FROM doctor_profiles WHERE id=$1"
        ))
        .bind(id)
        .fetch_optional(&self.0)
        .await?;
        match row {
            Some(row) => Ok(doctors_with_users(self, vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn find_doctor_profile_by_user(&self, user_id: Uuid) -> DbResult<Option<DoctorProfile>> {
        let row = sqlx::query_as::<_, DoctorRow>(&format!(
            "SELECT {DOCTOR_COLUMNS} FROM doctor_profiles WHERE user_id=$1"
        ))
        .bind(user_id)
        .fetch_optional(&self.0)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn list_active_doctors(&self, available_only: bool) -> DbResult<Vec<Doctor>> {
        let rows = sqlx::query_as::<_, DoctorRow>(&format!(
            "SELECT {DOCTOR_COLUMNS} FROM doctor_profiles
             WHERE is_active AND (NOT $1 OR is_available)
             ORDER BY created_at DESC"
        ))
        .bind(available_only)
        .fetch_all(&self.0)
        .await?;
        doctors_with_users(self, rows).await
    }

    async fn update_doctor(&self, doctor: &Doctor) -> DbResult<bool> {
        let profile = &doctor.profile;
        let mut tx = self.0.begin().await?;
        let res = sqlx::query(
            r#"UPDATE doctor_profiles
               SET specialization=$2, license_number=$3, experience_years=$4,
                   is_available=$5, updated_at=$6
               WHERE id=$1 AND is_active"#,
        )
        .bind(profile.meta.id)
        .bind(&profile.specialization)
        .bind(&profile.license_number)
        .bind(profile.experience_years)
        .bind(profile.is_available)
        .bind(profile.meta.updated_at)
        .execute(&mut *tx)
        .await?;
        if res.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }
        update_user_row(&mut tx, &doctor.user).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn deactivate_doctor(&self, id: Uuid, at: DateTime<Utc>) -> DbResult<bool> {
        let mut tx = self.0.begin().await?;
        let user_id: Option<Uuid> = sqlx::query_scalar(
            r#"UPDATE doctor_profiles SET is_active=FALSE, updated_at=$2
               WHERE id=$1 AND is_active
               RETURNING user_id"#,
        )
        .bind(id)
        .bind(at)
        .fetch_optional(&mut *tx)
        .await?;
        let changed = deactivate_owner(&mut tx, user_id, at).await?;
        tx.commit().await?;
        Ok(changed)
    }

    async fn find_patient(&self, id: Uuid) -> DbResult<Option<Patient>> {
        let row = sqlx::query_as::<_, PatientRow>(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patient_profiles WHERE id=$1"
        ))
        .bind(id)
        .fetch_optional(&self.0)
        .await?;
        match row {
            Some(row) => Ok(patients_with_users(self, vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_active_patients_created_by(&self, creator: Uuid) -> DbResult<Vec<Patient>> {
        let rows = sqlx::query_as::<_, PatientRow>(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patient_profiles
             WHERE is_active AND created_by=$1
             ORDER BY created_at DESC"
        ))
        .bind(creator)
        .fetch_all(&self.0)
        .await?;
        patients_with_users(self, rows).await
    }

    async fn update_patient(&self, patient: &Patient) -> DbResult<bool> {
        let profile = &patient.profile;
        let mut tx = self.0.begin().await?;
        let res = sqlx::query(
            r#"UPDATE patient_profiles
               SET blood_group=$2, medical_history=$3, emergency_contact=$4,
                   allergies=$5, updated_at=$6
               WHERE id=$1 AND is_active"#,
        )
        .bind(profile.meta.id)
        .bind(profile.blood_group.map(|b| b.as_str()))
        .bind(&profile.medical_history)
        .bind(&profile.emergency_contact)
        .bind(&profile.allergies)
        .bind(profile.meta.updated_at)
        .execute(&mut *tx)
        .await?;
        if res.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }
        update_user_row(&mut tx, &patient.user).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn deactivate_patient(&self, id: Uuid, at: DateTime<Utc>) -> DbResult<bool> {
        let mut tx = self.0.begin().await?;
        let user_id: Option<Uuid> = sqlx::query_scalar(
            r#"UPDATE patient_profiles SET is_active=FALSE, updated_at=$2
               WHERE id=$1 AND is_active
               RETURNING user_id"#,
        )
        .bind(id)
        .bind(at)
        .fetch_optional(&mut *tx)
        .await?;
        let changed = deactivate_owner(&mut tx, user_id, at).await?;
        tx.commit().await?;
        Ok(changed)
    }

    async fn insert_assignment(&self, assignment: &Assignment) -> DbResult<()> {
        sqlx::query(
            r#"INSERT INTO patient_doctor_assignments (
                   id, patient_id, doctor_id, notes, assigned_date, is_active,
                   created_by, created_at, updated_at
               )
               VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)"#,
        )
        .bind(assignment.meta.id)
        .bind(assignment.patient_id)
        .bind(assignment.doctor_id)
        .bind(&assignment.notes)
        .bind(assignment.assigned_date)
        .bind(assignment.meta.is_active)
        .bind(assignment.created_by)
        .bind(assignment.meta.created_at)
        .bind(assignment.meta.updated_at)
        .execute(&self.0)
        .await?;
        Ok(())
    }

    async fn find_assignment(&self, id: Uuid) -> DbResult<Option<Assignment>> {
        let row = sqlx::query_as::<_, AssignmentRow>(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM patient_doctor_assignments WHERE id=$1"
        ))
        .bind(id)
        .fetch_optional(&self.0)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn update_assignment_notes(
        &self,
        id: Uuid,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> DbResult<bool> {
        let res = sqlx::query(
            r#"UPDATE patient_doctor_assignments
               SET notes=$2, updated_at=$3
               WHERE id=$1 AND is_active"#,
        )
        .bind(id)
        .bind(notes)
        .bind(at)
        .execute(&self.0)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn deactivate_assignment(&self, id: Uuid, at: DateTime<Utc>) -> DbResult<bool> {
        let res = sqlx::query(
            r#"UPDATE patient_doctor_assignments
               SET is_active=FALSE, updated_at=$2
               WHERE id=$1 AND is_active"#,
        )
        .bind(id)
        .bind(at)
        .execute(&self.0)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_active_assignments(&self, patient_id: Option<Uuid>) -> DbResult<Vec<Assignment>> {
        let rows = sqlx::query_as::<_, AssignmentRow>(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM patient_doctor_assignments
             WHERE is_active AND ($1::uuid IS NULL OR patient_id=$1)
             ORDER BY created_at DESC"
        ))
        .bind(patient_id)
        .fetch_all(&self.0)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_refresh(&self, record: &RefreshRecord) -> DbResult<()> {
        sqlx::query(
            r#"INSERT INTO refresh_tokens (user_id, jti, token_hash, expires_at, revoked, created_at)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(record.user_id)
        .bind(&record.jti)
        .bind(&record.token_hash)
        .bind(record.expires_at)
        .bind(record.revoked)
        .bind(record.created_at)
        .execute(&self.0)
        .await?;
        Ok(())
    }

    async fn find_refresh(&self, jti: &str) -> DbResult<Option<RefreshRecord>> {
        let row = sqlx::query_as::<_, RefreshRow>("SELECT * FROM refresh_tokens WHERE jti=$1")
            .bind(jti)
            .fetch_optional(&self.0)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn revoke_refresh(&self, jti: &str) -> DbResult<u64> {
        let res = sqlx::query("UPDATE refresh_tokens SET revoked=true WHERE jti=$1 AND NOT revoked")
            .bind(jti)
            .execute(&self.0)
            .await?;
        Ok(res.rows_affected())
    }
}
