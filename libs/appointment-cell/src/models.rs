// libs/appointment-cell/src/models.rs
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc, NaiveDate};
use std::fmt;

use patient_cell::models::PatientError;
use shared_models::error::AppError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    pub doctor_id: i64,
    pub patient_id: i64,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    pub status: Option<StoredStatus>,
    pub duration_minutes: Option<i32>,
    pub notes: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub confirmed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Embedded by `select=*,patients(id,name)` on list and detail reads.
    #[serde(
        default,
        rename(deserialize = "patients", serialize = "patient"),
        skip_serializing_if = "Option::is_none"
    )]
    pub patient: Option<PatientSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientSummary {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl AppointmentStatus {
    /// Whether an appointment in this status takes its slot.
    pub fn occupies_slot(self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status as read back from the store. The column is free text, so rows
/// written outside this API may hold values beyond the closed set; those
/// are kept verbatim and still hold their slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredStatus {
    Known(AppointmentStatus),
    Other(String),
}

impl StoredStatus {
    pub fn occupies_slot(&self) -> bool {
        match self {
            StoredStatus::Known(status) => status.occupies_slot(),
            StoredStatus::Other(_) => true,
        }
    }
}

impl From<AppointmentStatus> for StoredStatus {
    fn from(status: AppointmentStatus) -> Self {
        StoredStatus::Known(status)
    }
}

/// The two columns availability needs from an appointment row.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SlotOccupancy {
    pub scheduled_at: Option<DateTime<Utc>>,
    pub status: Option<StoredStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotAvailability {
    pub time: String,
    pub available: bool,
}

// ==============================================================================
// REQUEST/QUERY MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: i64,
    pub date: NaiveDate,
    /// Clinic-local "HH:mm".
    pub time: String,
    pub reason: Option<String>,
    pub duration_minutes: Option<i32>,
    pub notes: Option<String>,
    pub location: Option<String>,
    pub status: Option<AppointmentStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub patient_id: Option<i64>,
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    pub reason: Option<String>,
    pub duration_minutes: Option<i32>,
    pub notes: Option<String>,
    pub location: Option<String>,
    pub status: Option<AppointmentStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentListQuery {
    pub date: Option<NaiveDate>,
    pub status: Option<AppointmentStatus>,
    pub patient_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
}

pub const DEFAULT_DURATION_MINUTES: i32 = 30;

pub fn validate_duration(duration_minutes: Option<i32>) -> Result<(), AppointmentError> {
    match duration_minutes {
        Some(minutes) if !(1..=24 * 60).contains(&minutes) => Err(AppointmentError::ValidationError(
            format!("duration_minutes must be between 1 and 1440, got {}", minutes),
        )),
        _ => Ok(()),
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Access denied to appointment {0}")]
    AccessDenied(i64),

    #[error("Invalid appointment time: {0}")]
    InvalidTime(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Patient(#[from] PatientError),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl From<AppointmentError> for AppError {
    fn from(error: AppointmentError) -> Self {
        match error {
            AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
            AppointmentError::AccessDenied(_) => AppError::Forbidden("Access denied".to_string()),
            AppointmentError::InvalidTime(msg) => AppError::ValidationError(msg),
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::Patient(e) => AppError::from(e),
            AppointmentError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_is_a_closed_lowercase_enum() {
        assert_eq!(serde_json::to_value(AppointmentStatus::Cancelled).unwrap(), json!("cancelled"));
        assert_eq!(
            serde_json::from_value::<AppointmentStatus>(json!("confirmed")).unwrap(),
            AppointmentStatus::Confirmed
        );
        assert!(serde_json::from_value::<AppointmentStatus>(json!("Cancelled ")).is_err());
        assert!(serde_json::from_value::<AppointmentStatus>(json!("rescheduled")).is_err());
    }

    #[test]
    fn only_cancelled_frees_the_slot() {
        assert!(AppointmentStatus::Pending.occupies_slot());
        assert!(AppointmentStatus::Confirmed.occupies_slot());
        assert!(!AppointmentStatus::Cancelled.occupies_slot());
    }

    #[test]
    fn stored_status_keeps_unknown_values_verbatim() {
        let known: StoredStatus = serde_json::from_value(json!("cancelled")).unwrap();
        assert_eq!(known, StoredStatus::Known(AppointmentStatus::Cancelled));
        assert!(!known.occupies_slot());

        let other: StoredStatus = serde_json::from_value(json!("no-show")).unwrap();
        assert_eq!(other, StoredStatus::Other("no-show".to_string()));
        assert!(other.occupies_slot());
        assert_eq!(serde_json::to_value(&other).unwrap(), json!("no-show"));
    }

    #[test]
    fn appointment_with_unlisted_status_still_decodes() {
        let appointment: Appointment = serde_json::from_value(json!({
            "id": 3,
            "doctor_id": 1,
            "patient_id": 2,
            "scheduled_at": "2024-01-15T11:00:00+00:00",
            "reason": null,
            "status": "completed",
            "duration_minutes": 30,
            "notes": null,
            "location": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })).unwrap();

        assert_eq!(appointment.status, Some(StoredStatus::Other("completed".to_string())));
        assert_eq!(serde_json::to_value(&appointment).unwrap()["status"], "completed");
    }

    #[test]
    fn embedded_patient_is_renamed_on_output() {
        let appointment: Appointment = serde_json::from_value(json!({
            "id": 1,
            "doctor_id": 1,
            "patient_id": 2,
            "scheduled_at": "2024-01-15T10:00:00+00:00",
            "reason": null,
            "status": "pending",
            "duration_minutes": 30,
            "notes": null,
            "location": null,
            "confirmed": false,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z",
            "patients": { "id": 2, "name": "Ann Smith" }
        })).unwrap();

        let out = serde_json::to_value(&appointment).unwrap();
        assert_eq!(out["patient"]["name"], "Ann Smith");
        assert!(out.get("patients").is_none());
    }

    #[test]
    fn durations_must_be_positive_and_within_a_day() {
        assert!(validate_duration(None).is_ok());
        assert!(validate_duration(Some(15)).is_ok());
        assert!(validate_duration(Some(0)).is_err());
        assert!(validate_duration(Some(2000)).is_err());
    }
}
