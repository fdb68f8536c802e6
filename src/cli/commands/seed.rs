use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Subcommand;
use serde::Serialize;
use serde_json::json;

use super::persistent_store;
use crate::auth::password::hash_password;
use crate::cli::utils::{output_success, output_warnings};
use crate::cli::OutputFormat;
use crate::database::models::{Student, User, VaccinationDrive};
use crate::database::{Repository, StoreError};
use crate::import::{read_rows, CsvRows, DriveRow, StudentRow, UserRow};

#[derive(Subcommand)]
pub enum SeedCommands {
    #[command(about = "Load accounts from a username,password,role CSV")]
    Users {
        #[arg(help = "CSV file")]
        file: PathBuf,
    },

    #[command(about = "Load students, including vaccination columns")]
    Students {
        #[arg(help = "CSV file")]
        file: PathBuf,
    },

    #[command(about = "Load drives; historical dates are allowed")]
    Drives {
        #[arg(help = "CSV file")]
        file: PathBuf,
    },
}

#[derive(Debug, Default, Serialize)]
pub struct SeedReport {
    pub inserted: usize,
    pub skipped: usize,
    pub warnings: Vec<String>,
}

impl SeedReport {
    fn skip(&mut self, reason: impl ToString) {
        self.skipped += 1;
        self.warnings.push(reason.to_string());
    }
}

fn open(path: &Path) -> anyhow::Result<File> {
    File::open(path).with_context(|| format!("cannot open {}", path.display()))
}

pub async fn handle(cmd: SeedCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let store = persistent_store().await?;

    let (what, result) = match cmd {
        SeedCommands::Users { file } => {
            let rows: CsvRows<UserRow> = read_rows(open(&file)?, UserRow::COLUMNS)?;
            ("users", seed_users(Repository::new(store.clone()), rows).await)
        }
        SeedCommands::Students { file } => {
            let rows: CsvRows<StudentRow> = read_rows(open(&file)?, StudentRow::COLUMNS)?;
            ("students", seed_students(Repository::new(store.clone()), rows).await)
        }
        SeedCommands::Drives { file } => {
            let rows: CsvRows<DriveRow> = read_rows(open(&file)?, DriveRow::COLUMNS)?;
            ("drives", seed_drives(Repository::new(store.clone()), rows).await)
        }
    };
    store.close().await;

    let report = result?;
    output_warnings(&output_format, &report.warnings);
    output_success(
        &output_format,
        &format!("Seeded {} {} ({} skipped)", report.inserted, what, report.skipped),
        Some(json!({ "report": report })),
    )
}

async fn insert_or_skip<T: crate::database::Model>(
    repo: &Repository<T>,
    record: &T,
    label: &str,
    report: &mut SeedReport,
) -> anyhow::Result<()> {
    match repo.insert(record).await {
        Ok(_) => report.inserted += 1,
        Err(StoreError::Duplicate { key, .. }) => report.skip(format!("{}: duplicate {}", label, key)),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

pub async fn seed_users(repo: Repository<User>, rows: CsvRows<UserRow>) -> anyhow::Result<SeedReport> {
    let mut report = SeedReport::default();
    for row in rows.rows {
        match row.and_then(UserRow::into_new_user) {
            Ok(new_user) => {
                let user = User::new(new_user.username, hash_password(&new_user.password)?, new_user.role);
                insert_or_skip(&repo, &user, &user.username, &mut report).await?;
            }
            Err(reason) => report.skip(reason),
        }
    }
    Ok(report)
}

pub async fn seed_students(repo: Repository<Student>, rows: CsvRows<StudentRow>) -> anyhow::Result<SeedReport> {
    let mut report = SeedReport::default();
    for row in rows.rows {
        match row.and_then(StudentRow::into_seeded_student) {
            Ok(student) => insert_or_skip(&repo, &student, &student.student_id, &mut report).await?,
            Err(reason) => report.skip(reason),
        }
    }
    Ok(report)
}

pub async fn seed_drives(repo: Repository<VaccinationDrive>, rows: CsvRows<DriveRow>) -> anyhow::Result<SeedReport> {
    let mut report = SeedReport::default();
    for row in rows.rows {
        match row.and_then(DriveRow::into_drive) {
            Ok(drive) => insert_or_skip(&repo, &drive, &drive.vaccine_name, &mut report).await?,
            Err(reason) => report.skip(reason),
        }
    }
    Ok(report)
}
