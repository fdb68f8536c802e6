use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ServiceError;
use crate::database::models::{Student, VaccinationDrive};
use crate::database::{DocumentStore, Repository};
use crate::filter::{Filter, FilterOp};

/// Dashboard figures for administrators
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSummary {
    pub total_students: u64,
    pub vaccinated_students: u64,
    pub percent_vaccinated: f64,
    /// Drives not yet completed
    pub total_drives: usize,
    /// Doses across drives not yet completed
    pub available_doses: u64,
    pub upcoming_drives: Vec<VaccinationDrive>,
}

#[derive(Debug, Deserialize)]
struct DriveStock {
    #[serde(default)]
    is_completed: bool,
    #[serde(default)]
    available_doses: u32,
}

pub struct AnalyticsService {
    students: Repository<Student>,
    drives: Repository<VaccinationDrive>,
}

impl AnalyticsService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            students: Repository::new(store.clone()),
            drives: Repository::new(store),
        }
    }

    pub async fn summary(&self, today: NaiveDate) -> Result<AnalyticsSummary, ServiceError> {
        let total_students = self.students.count(&Filter::all()).await?;
        let vaccinated_students = self.students.count(&Filter::all().eq("is_vaccinated", true)).await?;

        let stock: Vec<DriveStock> = self
            .drives
            .select_projected(&Filter::all(), &["is_completed", "available_doses"])
            .await?;
        let open: Vec<&DriveStock> = stock.iter().filter(|d| !d.is_completed).collect();

        let upcoming = Filter::all().with("date", FilterOp::Gte, Value::String(today.to_string()))?;
        let mut upcoming_drives = self.drives.select_any(&upcoming).await?;
        upcoming_drives.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.vaccine_name.cmp(&b.vaccine_name)));

        Ok(AnalyticsSummary {
            total_students,
            vaccinated_students,
            percent_vaccinated: percent(vaccinated_students, total_students),
            total_drives: open.len(),
            available_doses: open.iter().map(|d| u64::from(d.available_doses)).sum(),
            upcoming_drives,
        })
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 10_000.0).round() / 100.0
}
