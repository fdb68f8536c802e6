use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::parse_date;
use crate::database::models::{Student, VaccinationStatus};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaccinationRejection {
    #[error("not found")]
    NotFound,

    #[error("already vaccinated")]
    AlreadyVaccinated,

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid date format, expected YYYY-MM-DD")]
    InvalidDate,
}

/// Body of a vaccinate call
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VaccinateRequest {
    #[serde(default)]
    pub vaccine_name: Option<String>,
    #[serde(default)]
    pub date_of_vaccination: Option<String>,
}

impl VaccinateRequest {
    pub fn parse(&self) -> Result<(String, NaiveDate), VaccinationRejection> {
        let vaccine_name = self
            .vaccine_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(VaccinationRejection::MissingField("vaccine_name"))?;
        let raw_date = self
            .date_of_vaccination
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(VaccinationRejection::MissingField("date_of_vaccination"))?;
        let date = parse_date(raw_date).ok_or(VaccinationRejection::InvalidDate)?;
        Ok((vaccine_name.to_string(), date))
    }
}

/// The fields written by the Unvaccinated -> Vaccinated transition
#[derive(Debug, Clone, Serialize)]
pub struct VaccinationPatch {
    pub is_vaccinated: bool,
    pub vaccine_name: String,
    pub date_of_vaccination: NaiveDate,
}

impl VaccinationPatch {
    pub fn of(student: &Student) -> Option<Self> {
        match student.status() {
            VaccinationStatus::Vaccinated { vaccine_name, date } => Some(Self {
                is_vaccinated: true,
                vaccine_name,
                date_of_vaccination: date,
            }),
            VaccinationStatus::NotVaccinated => None,
        }
    }
}

/// One-shot transition into the vaccinated state. A student already flagged
/// as vaccinated is rejected rather than overwritten.
pub fn vaccinate(
    student: Option<&Student>,
    vaccine_name: &str,
    date: NaiveDate,
) -> Result<Student, VaccinationRejection> {
    let student = student.ok_or(VaccinationRejection::NotFound)?;
    if student.is_vaccinated {
        return Err(VaccinationRejection::AlreadyVaccinated);
    }

    let mut updated = student.clone();
    updated.is_vaccinated = true;
    updated.vaccine_name = Some(vaccine_name.to_string());
    updated.date_of_vaccination = Some(date);
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    #[test]
    fn transition_sets_all_fields() {
        let student = Student::new("Asha", "5", "S-001");
        let updated = vaccinate(Some(&student), "MMR", date()).unwrap();
        assert!(updated.is_vaccinated);
        assert_eq!(updated.vaccine_name.as_deref(), Some("MMR"));
        assert_eq!(updated.date_of_vaccination, Some(date()));
        assert!(updated.is_consistent());
        assert_eq!(updated.student_id, student.student_id);
    }

    #[test]
    fn second_call_rejects_and_leaves_state_alone() {
        let student = Student::new("Asha", "5", "S-001");
        let once = vaccinate(Some(&student), "MMR", date()).unwrap();
        let snapshot = once.clone();

        let later = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
        assert_eq!(
            vaccinate(Some(&once), "Polio", later),
            Err(VaccinationRejection::AlreadyVaccinated)
        );
        assert_eq!(once, snapshot);
    }

    #[test]
    fn missing_student_is_not_found() {
        assert_eq!(vaccinate(None, "MMR", date()), Err(VaccinationRejection::NotFound));
    }

    #[test]
    fn request_parsing() {
        let ok = VaccinateRequest {
            vaccine_name: Some(" MMR ".to_string()),
            date_of_vaccination: Some("2025-03-14".to_string()),
        };
        assert_eq!(ok.parse().unwrap(), ("MMR".to_string(), date()));

        let missing = VaccinateRequest {
            vaccine_name: Some("MMR".to_string()),
            date_of_vaccination: None,
        };
        assert_eq!(missing.parse(), Err(VaccinationRejection::MissingField("date_of_vaccination")));

        let bad = VaccinateRequest {
            vaccine_name: Some("MMR".to_string()),
            date_of_vaccination: Some("14-03-2025".to_string()),
        };
        assert_eq!(bad.parse(), Err(VaccinationRejection::InvalidDate));
    }

    #[test]
    fn patch_only_for_vaccinated_students() {
        let student = Student::new("Asha", "5", "S-001");
        assert!(VaccinationPatch::of(&student).is_none());
        let updated = vaccinate(Some(&student), "MMR", date()).unwrap();
        let patch = VaccinationPatch::of(&updated).unwrap();
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            serde_json::json!({"is_vaccinated": true, "vaccine_name": "MMR", "date_of_vaccination": "2025-03-14"})
        );
    }
}
