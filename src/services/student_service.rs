use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::{parse_id, ServiceError};
use crate::database::models::Student;
use crate::database::{DocumentStore, Repository, StoreError};
use crate::filter::Filter;
use crate::import::{read_rows, StudentRow};
use crate::rules::{vaccinate, VaccinateRequest, VaccinationPatch, VaccinationRejection};

/// Optional listing filters, taken from the query string
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudentQuery {
    pub class_grade: Option<String>,
    pub is_vaccinated: Option<bool>,
}

impl StudentQuery {
    fn to_filter(&self) -> Filter {
        let mut filter = Filter::all();
        if let Some(class_grade) = &self.class_grade {
            filter = filter.eq("class_grade", class_grade.as_str());
        }
        match self.is_vaccinated {
            Some(true) => filter.eq("is_vaccinated", true),
            // Records without the flag count as unvaccinated
            Some(false) => filter.ne("is_vaccinated", true),
            None => filter,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewStudentRequest {
    #[serde(default, alias = "username")]
    pub name: Option<String>,
    #[serde(default)]
    pub class_grade: Option<String>,
    #[serde(default)]
    pub student_id: Option<String>,
}

// Distinguishes an explicit null from an absent field
fn explicit<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Option<String>>, D::Error> {
    Option::<String>::deserialize(deserializer).map(Some)
}

/// The only student fields a general update may touch. Vaccination fields
/// are excluded: they change only through `vaccinate`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StudentPatch {
    #[serde(default, alias = "username", deserialize_with = "explicit")]
    pub name: Option<Option<String>>,
    #[serde(default, deserialize_with = "explicit")]
    pub class_grade: Option<Option<String>>,
    #[serde(default, deserialize_with = "explicit")]
    pub student_id: Option<Option<String>>,
}

impl StudentPatch {
    fn into_document(self) -> Result<Map<String, Value>, ServiceError> {
        let mut document = Map::new();
        for (field, value) in [
            ("name", self.name),
            ("class_grade", self.class_grade),
            ("student_id", self.student_id),
        ] {
            let Some(value) = value else { continue };
            match value.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                Some(v) => {
                    document.insert(field.to_string(), Value::String(v.to_string()));
                }
                None => {
                    return Err(ServiceError::validation(format!("{} cannot be null or empty", field)));
                }
            }
        }
        if document.is_empty() {
            return Err(ServiceError::validation("No updatable fields supplied"));
        }
        Ok(document)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkImportReport {
    pub added: usize,
    pub skipped: usize,
}

pub struct StudentService {
    students: Repository<Student>,
}

impl StudentService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            students: Repository::new(store),
        }
    }

    pub async fn list(&self, query: &StudentQuery) -> Result<Vec<Student>, ServiceError> {
        Ok(self.students.select_any(&query.to_filter()).await?)
    }

    pub async fn get(&self, raw_id: &str) -> Result<Student, ServiceError> {
        let id = parse_id(raw_id, "student")?;
        self.students
            .select_one(&Filter::by_id(id))
            .await?
            .ok_or_else(|| ServiceError::NotFound("Student not found".to_string()))
    }

    pub async fn add(&self, request: &NewStudentRequest) -> Result<Student, ServiceError> {
        let field = |value: &Option<String>, name: &'static str| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .ok_or_else(|| ServiceError::invalid_field(name, format!("{} is required", name)))
        };
        let student_id = field(&request.student_id, "student_id")?;
        let name = field(&request.name, "name")?;
        let class_grade = field(&request.class_grade, "class_grade")?;

        let student = Student::new(name, class_grade, student_id);
        match self.students.insert(&student).await {
            Ok(_) => {
                info!("Added student {}", student.student_id);
                Ok(student)
            }
            Err(StoreError::Duplicate { .. }) => Err(ServiceError::Conflict(
                "Student with this ID already exists".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Import students from CSV. Incomplete rows and rows whose student_id
    /// already exists are skipped and counted.
    pub async fn bulk_import(&self, csv: &[u8]) -> Result<BulkImportReport, ServiceError> {
        let rows = read_rows::<StudentRow, _>(csv, StudentRow::COLUMNS)?;
        let mut report = BulkImportReport::default();

        for row in rows.rows {
            let student = match row.and_then(StudentRow::into_new_student) {
                Ok(student) => student,
                Err(reason) => {
                    warn!("Skipping CSV row: {}", reason);
                    report.skipped += 1;
                    continue;
                }
            };
            match self.students.insert(&student).await {
                Ok(_) => report.added += 1,
                Err(StoreError::Duplicate { .. }) => report.skipped += 1,
                Err(e) => return Err(e.into()),
            }
        }

        info!("Bulk import added {} students, skipped {}", report.added, report.skipped);
        Ok(report)
    }

    pub async fn update(&self, raw_id: &str, patch: StudentPatch) -> Result<Student, ServiceError> {
        let id = parse_id(raw_id, "student")?;
        let document = patch.into_document()?;

        let matched = match self.students.update(&Filter::by_id(id), &document).await {
            Ok(matched) => matched,
            Err(StoreError::Duplicate { .. }) => {
                return Err(ServiceError::Conflict("Student with this ID already exists".to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        if matched == 0 {
            return Err(ServiceError::NotFound("Student not found".to_string()));
        }

        info!("Updated student {}", id);
        self.get(raw_id).await
    }

    /// Move a student into the vaccinated state. The write is conditional on
    /// the student still being unvaccinated, so of two racing calls exactly
    /// one succeeds.
    pub async fn vaccinate(&self, raw_id: &str, request: &VaccinateRequest) -> Result<Student, ServiceError> {
        let id = parse_id(raw_id, "student")?;
        let (vaccine_name, date) = request.parse()?;

        let current = self.students.select_one(&Filter::by_id(id)).await?;
        let updated = vaccinate(current.as_ref(), &vaccine_name, date)?;
        let patch = VaccinationPatch::of(&updated)
            .ok_or_else(|| ServiceError::Internal("vaccination produced an incomplete record".to_string()))?;

        let guard = Filter::by_id(id).ne("is_vaccinated", true);
        if self.students.update(&guard, &patch).await? == 0 {
            // Lost a race, or the student vanished in between
            let rejection = match self.students.select_one(&Filter::by_id(id)).await? {
                Some(_) => VaccinationRejection::AlreadyVaccinated,
                None => VaccinationRejection::NotFound,
            };
            warn!("Vaccination of {} rejected: {}", id, rejection);
            return Err(rejection.into());
        }

        info!("Student {} vaccinated with {}", updated.student_id, vaccine_name);
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{Collection, MemoryStore};
    use serde_json::json;

    fn service() -> StudentService {
        StudentService::new(Arc::new(MemoryStore::new()))
    }

    async fn add(service: &StudentService, student_id: &str) -> Student {
        service
            .add(&NewStudentRequest {
                name: Some("Asha".to_string()),
                class_grade: Some("5".to_string()),
                student_id: Some(student_id.to_string()),
            })
            .await
            .unwrap()
    }

    fn shot() -> VaccinateRequest {
        VaccinateRequest {
            vaccine_name: Some("MMR".to_string()),
            date_of_vaccination: Some("2025-03-14".to_string()),
        }
    }

    #[tokio::test]
    async fn add_rejects_duplicates_and_missing_ids() {
        let service = service();
        add(&service, "S-001").await;

        let dup = service
            .add(&NewStudentRequest {
                name: Some("Other".to_string()),
                class_grade: Some("6".to_string()),
                student_id: Some("S-001".to_string()),
            })
            .await;
        assert!(matches!(dup, Err(ServiceError::Conflict(_))));

        let missing = service.add(&NewStudentRequest::default()).await;
        assert!(matches!(missing, Err(ServiceError::Validation { field: Some("student_id"), .. })));
    }

    #[tokio::test]
    async fn vaccinate_once_then_reject() {
        let service = service();
        let student = add(&service, "S-001").await;
        let id = student.id.to_string();

        let vaccinated = service.vaccinate(&id, &shot()).await.unwrap();
        assert!(vaccinated.is_vaccinated);

        let again = service.vaccinate(&id, &shot()).await;
        assert!(matches!(again, Err(ServiceError::Conflict(ref m)) if m == "Already vaccinated"));

        let stored = service.get(&id).await.unwrap();
        assert_eq!(stored.vaccine_name.as_deref(), Some("MMR"));
        assert_eq!(stored.date_of_vaccination, vaccinated.date_of_vaccination);
    }

    #[tokio::test]
    async fn vaccinate_unknown_student() {
        let service = service();
        let missing = service.vaccinate(&uuid::Uuid::new_v4().to_string(), &shot()).await;
        assert!(matches!(missing, Err(ServiceError::NotFound(_))));

        let bad_id = service.vaccinate("not-an-id", &shot()).await;
        assert!(matches!(bad_id, Err(ServiceError::Validation { .. })));
    }

    #[tokio::test]
    async fn patch_whitelist() {
        let service = service();
        let student = add(&service, "S-001").await;
        add(&service, "S-002").await;
        let id = student.id.to_string();

        let patch: StudentPatch = serde_json::from_value(json!({"class_grade": "6B"})).unwrap();
        let updated = service.update(&id, patch).await.unwrap();
        assert_eq!(updated.class_grade, "6B");
        assert_eq!(updated.name, "Asha");

        assert!(serde_json::from_value::<StudentPatch>(json!({"is_vaccinated": true})).is_err());

        let null_id: StudentPatch = serde_json::from_value(json!({"student_id": null})).unwrap();
        assert!(matches!(service.update(&id, null_id).await, Err(ServiceError::Validation { .. })));

        let empty: StudentPatch = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(service.update(&id, empty).await, Err(ServiceError::Validation { .. })));

        let clash: StudentPatch = serde_json::from_value(json!({"student_id": "S-002"})).unwrap();
        assert!(matches!(service.update(&id, clash).await, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn bulk_import_counts_skips() {
        let service = service();
        add(&service, "S-001").await;

        let csv = "username,class_grade,student_id\nAsha,5,S-001\nRavi,5,S-002\nMeera,,S-003\nKabir,6,S-004\n";
        let report = service.bulk_import(csv.as_bytes()).await.unwrap();
        assert_eq!(report, BulkImportReport { added: 2, skipped: 2 });

        let all = service.list(&StudentQuery::default()).await.unwrap();
        assert_eq!(all.len(), 3);

        let sixth = service
            .list(&StudentQuery {
                class_grade: Some("6".to_string()),
                is_vaccinated: Some(false),
            })
            .await
            .unwrap();
        assert_eq!(sixth.len(), 1);
        assert_eq!(sixth[0].student_id, "S-004");
    }

    #[tokio::test]
    async fn renaming_a_legacy_record_keeps_the_collection_readable() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let service = StudentService::new(store.clone());
        add(&service, "S-001").await;

        let legacy = json!({"username": "Ravi", "class_grade": "6", "student_id": "S-002"});
        let Value::Object(document) = legacy else { unreachable!() };
        let id = store.insert_one(Collection::Students, document).await.unwrap();

        let patch: StudentPatch = serde_json::from_value(json!({"name": "Ravi K"})).unwrap();
        let renamed = service.update(&id.to_string(), patch).await.unwrap();
        assert_eq!(renamed.name, "Ravi K");

        let all = service.list(&StudentQuery::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().any(|s| s.id == id && s.name == "Ravi K"));
    }
}
