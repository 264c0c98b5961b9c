use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc, NaiveDate};
use regex::Regex;

use shared_models::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub blood_type: Option<String>,
    pub allergies: Option<String>,
    pub medical_history: Option<String>,
    pub emergency_contact: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        self.date_of_birth.and_then(|dob| today.years_since(dob))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DoctorLink {
    pub doctor_id: i64,
}

/// A patient row as returned with its embedded `doctor_patients` links.
#[derive(Debug, Clone, Deserialize)]
pub struct PatientRow {
    #[serde(flatten)]
    pub patient: Patient,
    #[serde(default)]
    pub doctor_patients: Vec<DoctorLink>,
}

impl PatientRow {
    pub fn is_linked_to(&self, doctor_id: i64) -> bool {
        self.doctor_patients.iter().any(|link| link.doctor_id == doctor_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePatientRequest {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub blood_type: Option<String>,
    pub allergies: Option<String>,
    pub medical_history: Option<String>,
    pub emergency_contact: Option<String>,
}

impl CreatePatientRequest {
    pub fn validate(&self, today: NaiveDate) -> Result<(), PatientError> {
        if self.name.trim().is_empty() {
            return Err(PatientError::ValidationError("name is required".to_string()));
        }
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        if let Some(dob) = self.date_of_birth {
            validate_date_of_birth(dob, today)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePatientRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub blood_type: Option<String>,
    pub allergies: Option<String>,
    pub medical_history: Option<String>,
    pub emergency_contact: Option<String>,
}

impl UpdatePatientRequest {
    pub fn validate(&self, today: NaiveDate) -> Result<(), PatientError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(PatientError::ValidationError("name cannot be empty".to_string()));
            }
        }
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        if let Some(dob) = self.date_of_birth {
            validate_date_of_birth(dob, today)?;
        }
        Ok(())
    }
}

/// What removing a patient from a doctor's list did to the shared record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatientRemoval {
    /// No other doctor was linked, so the record itself was deleted.
    Deleted,
    /// Only the caller's link was dropped; other doctors keep the record.
    Unlinked,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientSearchQuery {
    pub search: Option<String>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

static EMAIL_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$"));

fn validate_email(email: &str) -> Result<(), PatientError> {
    let email_regex = EMAIL_PATTERN
        .as_ref()
        .map_err(|e| PatientError::ValidationError(e.to_string()))?;

    if email.len() > 254 || !email_regex.is_match(email) {
        return Err(PatientError::ValidationError(format!("invalid email: {}", email)));
    }
    Ok(())
}

fn validate_date_of_birth(dob: NaiveDate, today: NaiveDate) -> Result<(), PatientError> {
    if dob > today {
        return Err(PatientError::InvalidDateOfBirth);
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum PatientError {
    #[error("Patient not found")]
    NotFound,

    #[error("Access denied to patient {0}")]
    AccessDenied(i64),

    #[error("Invalid date of birth")]
    InvalidDateOfBirth,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl From<PatientError> for AppError {
    fn from(error: PatientError) -> Self {
        match error {
            PatientError::NotFound => AppError::NotFound("Patient not found".to_string()),
            PatientError::AccessDenied(_) => AppError::Forbidden("Access denied".to_string()),
            PatientError::InvalidDateOfBirth => AppError::ValidationError("Invalid date of birth".to_string()),
            PatientError::ValidationError(msg) => AppError::ValidationError(msg),
            PatientError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}
