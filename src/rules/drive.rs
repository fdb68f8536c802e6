use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::parse_date;
use crate::database::models::VaccinationDrive;

/// A drive must be scheduled at least this many days ahead
pub const MIN_LEAD_DAYS: i64 = 16;

/// Drive fields as submitted by a client, before any checking
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DriveCandidate {
    #[serde(default)]
    pub vaccine_name: Option<String>,
    #[serde(default)]
    pub date: Option<Value>,
    #[serde(default)]
    pub available_doses: Option<Value>,
    #[serde(default)]
    pub classes: Option<Value>,
    #[serde(default)]
    pub is_completed: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriveRejection {
    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid date format, expected YYYY-MM-DD")]
    InvalidDateFormat,

    #[error("must be at least 16 days ahead")]
    TooSoon,

    #[error("past drives must be marked completed")]
    PastNotCompleted,

    #[error("available_doses must be a non-negative integer")]
    InvalidDoses,

    #[error("classes must list at least one class")]
    InvalidClasses,
}

impl DriveRejection {
    pub fn field(&self) -> &'static str {
        match self {
            DriveRejection::MissingField(field) => field,
            DriveRejection::InvalidDateFormat | DriveRejection::TooSoon => "date",
            DriveRejection::PastNotCompleted => "is_completed",
            DriveRejection::InvalidDoses => "available_doses",
            DriveRejection::InvalidClasses => "classes",
        }
    }
}

/// A drive that passed validation, ready to persist
#[derive(Debug, Clone, PartialEq)]
pub struct NewDrive {
    pub vaccine_name: String,
    pub date: NaiveDate,
    pub available_doses: u32,
    pub classes: BTreeSet<String>,
    pub is_completed: bool,
}

impl NewDrive {
    pub fn into_drive(self, id: uuid::Uuid) -> VaccinationDrive {
        VaccinationDrive {
            id,
            vaccine_name: self.vaccine_name,
            date: self.date,
            available_doses: self.available_doses,
            classes: self.classes,
            is_completed: self.is_completed,
        }
    }
}

struct Required<'a> {
    vaccine_name: &'a str,
    date: &'a Value,
    available_doses: &'a Value,
    classes: &'a Value,
}

fn require(candidate: &DriveCandidate) -> Result<Required<'_>, DriveRejection> {
    let vaccine_name = candidate
        .vaccine_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(DriveRejection::MissingField("vaccine_name"))?;
    Ok(Required {
        vaccine_name,
        date: present(&candidate.date).ok_or(DriveRejection::MissingField("date"))?,
        available_doses: present(&candidate.available_doses).ok_or(DriveRejection::MissingField("available_doses"))?,
        classes: present(&candidate.classes).ok_or(DriveRejection::MissingField("classes"))?,
    })
}

fn present(value: &Option<Value>) -> Option<&Value> {
    value.as_ref().filter(|v| !v.is_null())
}

fn parse_drive_date(value: &Value) -> Result<NaiveDate, DriveRejection> {
    value.as_str().and_then(parse_date).ok_or(DriveRejection::InvalidDateFormat)
}

fn check_window(date: NaiveDate, is_completed: bool, today: NaiveDate) -> Result<(), DriveRejection> {
    let lead = (date - today).num_days();
    if lead > 0 && lead < MIN_LEAD_DAYS {
        return Err(DriveRejection::TooSoon);
    }
    if lead < 0 && !is_completed {
        return Err(DriveRejection::PastNotCompleted);
    }
    Ok(())
}

fn normalize_doses(value: &Value) -> Result<u32, DriveRejection> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
    .ok_or(DriveRejection::InvalidDoses)
}

/// Comma-separated text or a JSON array into a set of trimmed class labels
pub fn normalize_classes(value: &Value) -> Result<BTreeSet<String>, DriveRejection> {
    let labels: BTreeSet<String> = match value {
        Value::String(s) => s.split(',').map(|part| part.trim().to_string()).collect(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.trim().to_string()),
                Value::Number(n) => Ok(n.to_string()),
                _ => Err(DriveRejection::InvalidClasses),
            })
            .collect::<Result<_, _>>()?,
        Value::Number(n) => BTreeSet::from([n.to_string()]),
        _ => return Err(DriveRejection::InvalidClasses),
    };

    let labels: BTreeSet<String> = labels.into_iter().filter(|label| !label.is_empty()).collect();
    if labels.is_empty() {
        return Err(DriveRejection::InvalidClasses);
    }
    Ok(labels)
}

/// Validate a new drive against `today`. Checks run in a fixed order and the
/// first failure wins: required fields, date format, lead time, past
/// completion, then doses and classes.
pub fn validate_drive(candidate: &DriveCandidate, today: NaiveDate) -> Result<NewDrive, DriveRejection> {
    let required = require(candidate)?;
    let date = parse_drive_date(required.date)?;
    let is_completed = candidate.is_completed.unwrap_or(false);
    check_window(date, is_completed, today)?;

    Ok(NewDrive {
        vaccine_name: required.vaccine_name.to_string(),
        date,
        available_doses: normalize_doses(required.available_doses)?,
        classes: normalize_classes(required.classes)?,
        is_completed,
    })
}

/// Validate a partial update of `existing`. Omitted fields keep their stored
/// values. The lead-time and completion rules only apply when the date moves
/// or a past drive is being reopened.
pub fn validate_drive_update(
    candidate: &DriveCandidate,
    existing: &VaccinationDrive,
    today: NaiveDate,
) -> Result<NewDrive, DriveRejection> {
    let merged = DriveCandidate {
        vaccine_name: candidate
            .vaccine_name
            .clone()
            .or_else(|| Some(existing.vaccine_name.clone())),
        date: candidate
            .date
            .clone()
            .or_else(|| Some(Value::String(existing.date.to_string()))),
        available_doses: candidate
            .available_doses
            .clone()
            .or_else(|| Some(Value::from(existing.available_doses))),
        classes: candidate
            .classes
            .clone()
            .or_else(|| Some(Value::from(existing.classes.iter().cloned().collect::<Vec<_>>()))),
        is_completed: candidate.is_completed.or(Some(existing.is_completed)),
    };

    let required = require(&merged)?;
    let date = parse_drive_date(required.date)?;
    let is_completed = merged.is_completed.unwrap_or(false);

    let reopened = candidate.is_completed == Some(false) && date < today;
    if date != existing.date || reopened {
        check_window(date, is_completed, today)?;
    }

    Ok(NewDrive {
        vaccine_name: required.vaccine_name.to_string(),
        date,
        available_doses: normalize_doses(required.available_doses)?,
        classes: normalize_classes(required.classes)?,
        is_completed,
    })
}
