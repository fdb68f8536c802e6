pub mod drive;
pub mod student;
pub mod user;

pub use drive::VaccinationDrive;
pub use student::{Student, VaccinationStatus};
pub use user::{User, UserSummary};
