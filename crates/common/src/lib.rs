pub mod error;
pub mod model;
pub mod normalize;
pub mod page;
pub mod patch;
pub mod record;

pub use error::{AppError, AppResult, FieldError};
pub use model::{
    Actor, AssignedDoctor, Assignment, BloodGroup, Doctor, DoctorProfile, Gender, Patient,
    PatientProfile, Role, UnknownVariant, User,
};
pub use page::{Page, PageRequest, paginate};
pub use patch::{DoctorPatch, PatientPatch, UserPatch};
pub use record::{HasIdentity, HasTimestamps, Record, RecordMeta, SoftDeletable};
