//! Business rules guarding mutations of drives and student vaccination state.
//! Everything here is pure: callers supply `today` and persist the result.

pub mod drive;
pub mod vaccination;

pub use drive::{normalize_classes, validate_drive, validate_drive_update, DriveCandidate, DriveRejection, NewDrive};
pub use vaccination::{vaccinate, VaccinateRequest, VaccinationPatch, VaccinationRejection};

/// Dates cross the API as `YYYY-MM-DD`
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse_date(raw: &str) -> Option<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}
