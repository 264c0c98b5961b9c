use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use shared_models::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: i64,
    pub auth_user_id: String,
    pub email: Option<String>,
    pub full_name: String,
    pub specialty: Option<String>,
    pub license_number: Option<String>,
    pub phone: Option<String>,
    pub clinic_name: Option<String>,
    pub clinic_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Doctor {
    /// Name as printed on documents, e.g. "Dr. Jane Doe".
    pub fn display_name(&self) -> String {
        if self.full_name.starts_with("Dr.") || self.full_name.starts_with("Dr ") {
            self.full_name.clone()
        } else {
            format!("Dr. {}", self.full_name)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardDoctorRequest {
    pub full_name: String,
    pub specialty: Option<String>,
    pub license_number: Option<String>,
    pub phone: Option<String>,
    pub clinic_name: Option<String>,
    pub clinic_address: Option<String>,
}

impl OnboardDoctorRequest {
    pub fn validate(&self) -> Result<(), DoctorError> {
        if self.full_name.trim().is_empty() {
            return Err(DoctorError::ValidationError("full_name is required".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDoctorRequest {
    pub full_name: Option<String>,
    pub specialty: Option<String>,
    pub license_number: Option<String>,
    pub phone: Option<String>,
    pub clinic_name: Option<String>,
    pub clinic_address: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum DoctorError {
    #[error("Doctor profile not found for user {0}")]
    NotOnboarded(String),

    #[error("Doctor profile already exists")]
    AlreadyOnboarded,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl From<DoctorError> for AppError {
    fn from(error: DoctorError) -> Self {
        match error {
            DoctorError::NotOnboarded(user_id) => AppError::OnboardingRequired(user_id),
            DoctorError::AlreadyOnboarded => AppError::Conflict("Doctor profile already exists".to_string()),
            DoctorError::ValidationError(msg) => AppError::ValidationError(msg),
            DoctorError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}
