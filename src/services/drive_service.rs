use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;
use uuid::Uuid;

use super::{parse_id, ServiceError};
use crate::database::models::VaccinationDrive;
use crate::database::{DocumentStore, Repository};
use crate::filter::Filter;
use crate::rules::{validate_drive, validate_drive_update, DriveCandidate};

pub struct DriveService {
    drives: Repository<VaccinationDrive>,
}

impl DriveService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            drives: Repository::new(store),
        }
    }

    pub async fn list(&self) -> Result<Vec<VaccinationDrive>, ServiceError> {
        Ok(self.drives.select_any(&Filter::all()).await?)
    }

    pub async fn create(&self, candidate: &DriveCandidate, today: NaiveDate) -> Result<VaccinationDrive, ServiceError> {
        let drive = validate_drive(candidate, today)?.into_drive(Uuid::new_v4());
        self.drives.insert(&drive).await?;
        info!("Created {} drive on {}", drive.vaccine_name, drive.date);
        Ok(drive)
    }

    pub async fn update(
        &self,
        raw_id: &str,
        candidate: &DriveCandidate,
        today: NaiveDate,
    ) -> Result<VaccinationDrive, ServiceError> {
        let id = parse_id(raw_id, "drive")?;
        let existing = self
            .drives
            .select_one(&Filter::by_id(id))
            .await?
            .ok_or_else(|| ServiceError::NotFound("Drive not found".to_string()))?;

        let drive = validate_drive_update(candidate, &existing, today)?.into_drive(id);
        if self.drives.update(&Filter::by_id(id), &drive).await? == 0 {
            return Err(ServiceError::NotFound("Drive not found".to_string()));
        }
        info!("Updated drive {}", id);
        Ok(drive)
    }

    pub async fn delete(&self, raw_id: &str) -> Result<Uuid, ServiceError> {
        let id = parse_id(raw_id, "drive")?;
        if self.drives.delete(&Filter::by_id(id)).await? == 0 {
            return Err(ServiceError::NotFound("Drive not found".to_string()));
        }
        info!("Deleted drive {}", id);
        Ok(id)
    }
}
