use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::{Collection, Model};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaccinationDrive {
    pub id: Uuid,
    pub vaccine_name: String,
    pub date: NaiveDate,
    pub available_doses: u32,
    pub classes: BTreeSet<String>,
    #[serde(default)]
    pub is_completed: bool,
}

impl Model for VaccinationDrive {
    const COLLECTION: Collection = Collection::VaccinationDrives;
}
