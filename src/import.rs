//! CSV readers for the bulk student upload and the seed command.
//!
//! Rows that fail to parse or fail a record rule are skipped and reported;
//! only a missing header column rejects the whole file.

use std::io::Read;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::Role;
use crate::database::models::{Student, VaccinationDrive};
use crate::rules::{normalize_classes, parse_date};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("missing column: {0}")]
    MissingColumn(&'static str),

    #[error("unreadable CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Why a single row was not imported
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowRejection {
    #[error("line {line}: unparseable row")]
    Unparseable { line: u64 },

    #[error("missing {0}")]
    MissingField(&'static str),

    #[error("invalid date '{0}'")]
    InvalidDate(String),

    #[error("invalid value for {field}: '{value}'")]
    InvalidValue { field: &'static str, value: String },

    #[error("vaccinated without vaccine name and date")]
    IncompleteVaccination,
}

/// Parsed rows in file order; each is either a record or the reason it was skipped
pub struct CsvRows<T> {
    pub rows: Vec<Result<T, RowRejection>>,
}

/// Read every row of `input`, requiring each column group to be present in
/// the header. A group lists accepted spellings of one column.
pub fn read_rows<T, R>(input: R, columns: &[(&'static str, &[&str])]) -> Result<CsvRows<T>, ImportError>
where
    T: DeserializeOwned,
    R: Read,
{
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(input);

    let headers = reader.headers()?.clone();
    for (name, spellings) in columns {
        if !headers.iter().any(|h| spellings.contains(&h)) {
            return Err(ImportError::MissingColumn(name));
        }
    }

    let rows = reader
        .deserialize::<T>()
        .map(|row| {
            row.map_err(|e| RowRejection::Unparseable {
                line: e.position().map(|p| p.line()).unwrap_or_default(),
            })
        })
        .collect();
    Ok(CsvRows { rows })
}

fn required(value: Option<String>, field: &'static str) -> Result<String, RowRejection> {
    value.filter(|s| !s.is_empty()).ok_or(RowRejection::MissingField(field))
}

fn flag(value: Option<&str>) -> bool {
    value.map(|s| s.eq_ignore_ascii_case("true")).unwrap_or(false)
}

/// Student row. Files exported by older tooling name the column `username`.
#[derive(Debug, Clone, Deserialize)]
pub struct StudentRow {
    #[serde(default, alias = "username")]
    pub name: Option<String>,
    #[serde(default)]
    pub class_grade: Option<String>,
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub is_vaccinated: Option<String>,
    #[serde(default)]
    pub vaccine_name: Option<String>,
    #[serde(default)]
    pub date_of_vaccination: Option<String>,
}

impl StudentRow {
    pub const COLUMNS: &'static [(&'static str, &'static [&'static str])] = &[
        ("name", &["name", "username"]),
        ("class_grade", &["class_grade"]),
        ("student_id", &["student_id"]),
    ];

    /// Unvaccinated student as created by the bulk upload; vaccination columns are ignored
    pub fn into_new_student(self) -> Result<Student, RowRejection> {
        Ok(Student::new(
            required(self.name, "name")?,
            required(self.class_grade, "class_grade")?,
            required(self.student_id, "student_id")?,
        ))
    }

    /// Student as loaded by the seed command, vaccination columns included
    pub fn into_seeded_student(self) -> Result<Student, RowRejection> {
        let is_vaccinated = flag(self.is_vaccinated.as_deref());
        let vaccine_name = self.vaccine_name.clone().filter(|s| !s.is_empty());
        let date_of_vaccination = match self.date_of_vaccination.as_deref().filter(|s| !s.is_empty()) {
            Some(raw) => Some(parse_date(raw).ok_or_else(|| RowRejection::InvalidDate(raw.to_string()))?),
            None => None,
        };

        let mut student = self.into_new_student()?;
        student.is_vaccinated = is_vaccinated;
        student.vaccine_name = vaccine_name;
        student.date_of_vaccination = date_of_vaccination;
        if !student.is_consistent() {
            return Err(RowRejection::IncompleteVaccination);
        }
        Ok(student)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DriveRow {
    #[serde(default)]
    pub vaccine_name: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub available_doses: Option<String>,
    #[serde(default)]
    pub classes: Option<String>,
    #[serde(default)]
    pub is_completed: Option<String>,
}

impl DriveRow {
    pub const COLUMNS: &'static [(&'static str, &'static [&'static str])] = &[
        ("vaccine_name", &["vaccine_name"]),
        ("date", &["date"]),
        ("available_doses", &["available_doses"]),
        ("classes", &["classes"]),
    ];

    /// Drive as loaded by the seed command. Historical drives are allowed
    /// here, so the lead-time rules do not apply.
    pub fn into_drive(self) -> Result<VaccinationDrive, RowRejection> {
        let vaccine_name = required(self.vaccine_name, "vaccine_name")?;
        let raw_date = required(self.date, "date")?;
        let date = parse_date(&raw_date).ok_or(RowRejection::InvalidDate(raw_date))?;

        let raw_doses = required(self.available_doses, "available_doses")?;
        let available_doses = raw_doses.parse::<u32>().map_err(|_| RowRejection::InvalidValue {
            field: "available_doses",
            value: raw_doses.clone(),
        })?;

        let raw_classes = required(self.classes, "classes")?;
        let trimmed = raw_classes.trim_start_matches('[').trim_end_matches(']');
        let classes = normalize_classes(&Value::String(trimmed.to_string())).map_err(|_| RowRejection::InvalidValue {
            field: "classes",
            value: raw_classes.clone(),
        })?;

        Ok(VaccinationDrive {
            id: Uuid::new_v4(),
            vaccine_name,
            date,
            available_doses,
            classes,
            is_completed: flag(self.is_completed.as_deref()),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserRow {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// A user row that passed checks; the password is still plain text
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub role: Role,
}

impl UserRow {
    pub const COLUMNS: &'static [(&'static str, &'static [&'static str])] = &[
        ("username", &["username"]),
        ("password", &["password"]),
        ("role", &["role"]),
    ];

    pub fn into_new_user(self) -> Result<NewUser, RowRejection> {
        let username = required(self.username, "username")?;
        let password = required(self.password, "password")?;
        let raw_role = required(self.role, "role")?;
        let role = raw_role
            .to_ascii_lowercase()
            .parse::<Role>()
            .map_err(|_| RowRejection::InvalidValue { field: "role", value: raw_role })?;
        Ok(NewUser { username, password, role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_rows_accept_either_name_column() {
        let csv = "username,class_grade,student_id\nAsha,5,S-001\n,6,S-002\nRavi,6,S-003\n";
        let rows: CsvRows<StudentRow> = read_rows(csv.as_bytes(), StudentRow::COLUMNS).unwrap();
        let students: Vec<_> = rows.rows.into_iter().map(|r| r.and_then(StudentRow::into_new_student)).collect();

        assert_eq!(students.len(), 3);
        assert_eq!(students[0].as_ref().unwrap().name, "Asha");
        assert_eq!(students[1].as_ref().unwrap_err(), &RowRejection::MissingField("name"));
        assert!(!students[2].as_ref().unwrap().is_vaccinated);
    }

    #[test]
    fn missing_column_rejects_the_file() {
        let csv = "name,student_id\nAsha,S-001\n";
        let result = read_rows::<StudentRow, _>(csv.as_bytes(), StudentRow::COLUMNS);
        assert!(matches!(result, Err(ImportError::MissingColumn("class_grade"))));
    }

    #[test]
    fn seeded_students_keep_the_vaccination_invariant() {
        let csv = "name,class_grade,student_id,is_vaccinated,vaccine_name,date_of_vaccination\n\
                   Asha,5,S-001,True,MMR,2025-02-10\n\
                   Ravi,5,S-002,true,,\n\
                   Meera,6,S-003,false,,\n\
                   Kabir,6,S-004,true,MMR,10/02/2025\n";
        let rows: CsvRows<StudentRow> = read_rows(csv.as_bytes(), StudentRow::COLUMNS).unwrap();
        let (students, rejected): (Vec<_>, Vec<_>) = rows
            .rows
            .into_iter()
            .map(|r| r.and_then(StudentRow::into_seeded_student))
            .partition(Result::is_ok);
        let students: Vec<Student> = students.into_iter().flatten().collect();
        let rejected: Vec<RowRejection> = rejected.into_iter().filter_map(Result::err).collect();

        assert_eq!(students.len(), 2);
        assert!(students[0].is_vaccinated);
        assert!(!students[1].is_vaccinated);
        assert_eq!(
            rejected,
            vec![
                RowRejection::IncompleteVaccination,
                RowRejection::InvalidDate("10/02/2025".to_string())
            ]
        );
    }

    #[test]
    fn drive_rows_parse_bracketed_classes() {
        let csv = "vaccine_name,date,available_doses,classes,is_completed\n\
                   BCG,2024-11-02,40,\"[5,6]\",TRUE\n\
                   Polio,2025-13-01,10,7,false\n\
                   MMR,2025-08-20,x,7,false\n";
        let rows: CsvRows<DriveRow> = read_rows(csv.as_bytes(), DriveRow::COLUMNS).unwrap();
        let drives: Vec<_> = rows.rows.into_iter().map(|r| r.and_then(DriveRow::into_drive)).collect();

        let first = drives[0].as_ref().unwrap();
        assert_eq!(first.classes.iter().cloned().collect::<Vec<_>>(), vec!["5", "6"]);
        assert!(first.is_completed);
        assert_eq!(drives[1].as_ref().unwrap_err(), &RowRejection::InvalidDate("2025-13-01".to_string()));
        assert!(matches!(
            drives[2].as_ref().unwrap_err(),
            RowRejection::InvalidValue { field: "available_doses", .. }
        ));
    }

    #[test]
    fn user_rows_require_known_roles() {
        let csv = "username,password,role\nnurse,secret,Admin\nclerk,secret,guest\n";
        let rows: CsvRows<UserRow> = read_rows(csv.as_bytes(), UserRow::COLUMNS).unwrap();
        let users: Vec<_> = rows.rows.into_iter().map(|r| r.and_then(UserRow::into_new_user)).collect();

        assert_eq!(users[0].as_ref().unwrap().role, Role::Admin);
        assert!(matches!(users[1].as_ref().unwrap_err(), RowRejection::InvalidValue { field: "role", .. }));
    }
}
