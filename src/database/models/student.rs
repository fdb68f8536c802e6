use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::{Collection, Model};

/// Student record. Records written by older seed scripts use `username`
/// for the display name; it is read as `name` and written back as `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredStudent")]
pub struct Student {
    pub id: Uuid,
    pub name: String,
    pub class_grade: String,
    pub student_id: String,
    pub is_vaccinated: bool,
    pub vaccine_name: Option<String>,
    pub date_of_vaccination: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Student as found in the store. A renamed legacy record holds both
/// `name` and `username`; `name` is the current one.
#[derive(Deserialize)]
struct StoredStudent {
    id: Uuid,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    username: Option<String>,
    class_grade: String,
    student_id: String,
    #[serde(default)]
    is_vaccinated: bool,
    #[serde(default)]
    vaccine_name: Option<String>,
    #[serde(default)]
    date_of_vaccination: Option<NaiveDate>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl TryFrom<StoredStudent> for Student {
    type Error = &'static str;

    fn try_from(stored: StoredStudent) -> Result<Self, Self::Error> {
        let name = stored.name.or(stored.username).ok_or("missing field `name`")?;
        Ok(Self {
            id: stored.id,
            name,
            class_grade: stored.class_grade,
            student_id: stored.student_id,
            is_vaccinated: stored.is_vaccinated,
            vaccine_name: stored.vaccine_name,
            date_of_vaccination: stored.date_of_vaccination,
            created_at: stored.created_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaccinationStatus {
    NotVaccinated,
    Vaccinated {
        vaccine_name: String,
        date: NaiveDate,
    },
}

impl Student {
    pub fn new(name: impl Into<String>, class_grade: impl Into<String>, student_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            class_grade: class_grade.into(),
            student_id: student_id.into(),
            is_vaccinated: false,
            vaccine_name: None,
            date_of_vaccination: None,
            created_at: Some(Utc::now()),
        }
    }

    /// Vaccination state as a single value; a flag without details reads as not vaccinated
    pub fn status(&self) -> VaccinationStatus {
        match (self.is_vaccinated, &self.vaccine_name, self.date_of_vaccination) {
            (true, Some(vaccine_name), Some(date)) => VaccinationStatus::Vaccinated {
                vaccine_name: vaccine_name.clone(),
                date,
            },
            _ => VaccinationStatus::NotVaccinated,
        }
    }

    /// `is_vaccinated` implies both details are present
    pub fn is_consistent(&self) -> bool {
        !self.is_vaccinated || (self.vaccine_name.is_some() && self.date_of_vaccination.is_some())
    }
}

impl Model for Student {
    const COLLECTION: Collection = Collection::Students;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_legacy_username_field() {
        let student: Student = serde_json::from_value(json!({
            "id": Uuid::new_v4().to_string(),
            "username": "Asha",
            "class_grade": "5",
            "student_id": "S-001"
        }))
        .unwrap();
        assert_eq!(student.name, "Asha");
        assert!(!student.is_vaccinated);
        assert_eq!(student.status(), VaccinationStatus::NotVaccinated);
        assert!(student.is_consistent());
    }

    #[test]
    fn current_name_wins_over_legacy_username() {
        let student: Student = serde_json::from_value(json!({
            "id": Uuid::new_v4().to_string(),
            "username": "Asha",
            "name": "Asha K",
            "class_grade": "5",
            "student_id": "S-001"
        }))
        .unwrap();
        assert_eq!(student.name, "Asha K");

        let value = serde_json::to_value(&student).unwrap();
        assert!(value.get("username").is_none());
    }

    #[test]
    fn nameless_record_is_rejected() {
        let result = serde_json::from_value::<Student>(json!({
            "id": Uuid::new_v4().to_string(),
            "class_grade": "5",
            "student_id": "S-001"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn status_reflects_details() {
        let mut student = Student::new("Ravi", "6", "S-002");
        student.is_vaccinated = true;
        assert!(!student.is_consistent());

        student.vaccine_name = Some("MMR".to_string());
        student.date_of_vaccination = NaiveDate::from_ymd_opt(2025, 3, 1);
        assert!(student.is_consistent());
        assert!(matches!(student.status(), VaccinationStatus::Vaccinated { .. }));

        let value = serde_json::to_value(&student).unwrap();
        assert_eq!(value["date_of_vaccination"], "2025-03-01");
    }
}
