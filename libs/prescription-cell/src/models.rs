use serde::{Deserialize, Deserializer, Serialize};
use chrono::{DateTime, Utc};

use appointment_cell::models::AppointmentError;
use doctor_cell::models::DoctorError;
use patient_cell::models::PatientError;
use shared_models::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub id: i64,
    pub doctor_id: i64,
    pub patient_id: i64,
    pub appointment_id: Option<i64>,
    pub diagnosis: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Embedded by `select=*,prescription_items(*)`.
    #[serde(default, alias = "prescription_items")]
    pub items: Vec<PrescriptionItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrescriptionItem {
    pub id: i64,
    pub prescription_id: i64,
    pub drug_name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: Option<String>,
    pub instructions: Option<String>,
}

/// One line of a prescription as submitted by the form. Items are always
/// written as a complete batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrescriptionItemInput {
    pub drug_name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: Option<String>,
    pub instructions: Option<String>,
}

impl PrescriptionItemInput {
    fn validate(&self, position: usize) -> Result<(), PrescriptionError> {
        for (field, value) in [
            ("drug_name", &self.drug_name),
            ("dosage", &self.dosage),
            ("frequency", &self.frequency),
        ] {
            if value.trim().is_empty() {
                return Err(PrescriptionError::ValidationError(
                    format!("item {}: {} is required", position + 1, field),
                ));
            }
        }
        Ok(())
    }
}

fn validate_items(items: &[PrescriptionItemInput]) -> Result<(), PrescriptionError> {
    if items.is_empty() {
        return Err(PrescriptionError::ValidationError(
            "a prescription needs at least one item".to_string(),
        ));
    }
    items.iter().enumerate().try_for_each(|(i, item)| item.validate(i))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePrescriptionRequest {
    pub patient_id: i64,
    pub appointment_id: Option<i64>,
    pub diagnosis: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<PrescriptionItemInput>,
}

impl CreatePrescriptionRequest {
    pub fn validate(&self) -> Result<(), PrescriptionError> {
        validate_items(&self.items)
    }
}

/// Omitted fields are left unchanged and an explicit `null` clears the
/// stored value. When `items` is present it replaces the whole item list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePrescriptionRequest {
    #[serde(default, deserialize_with = "present")]
    pub appointment_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "present")]
    pub diagnosis: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub notes: Option<Option<String>>,
    pub items: Option<Vec<PrescriptionItemInput>>,
}

/// `Some(None)` for an explicit `null`; absent fields fall back to `None`
/// through `#[serde(default)]`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl UpdatePrescriptionRequest {
    pub fn validate(&self) -> Result<(), PrescriptionError> {
        match &self.items {
            Some(items) => validate_items(items),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrescriptionListQuery {
    pub patient_id: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum PrescriptionError {
    #[error("Prescription not found")]
    NotFound,

    #[error("Access denied to prescription {0}")]
    AccessDenied(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Patient(#[from] PatientError),

    #[error(transparent)]
    Appointment(#[from] AppointmentError),

    #[error(transparent)]
    Doctor(#[from] DoctorError),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl From<PrescriptionError> for AppError {
    fn from(error: PrescriptionError) -> Self {
        match error {
            PrescriptionError::NotFound => AppError::NotFound("Prescription not found".to_string()),
            PrescriptionError::AccessDenied(_) => AppError::Forbidden("Access denied".to_string()),
            PrescriptionError::ValidationError(msg) => AppError::ValidationError(msg),
            PrescriptionError::Patient(e) => AppError::from(e),
            PrescriptionError::Appointment(e) => AppError::from(e),
            PrescriptionError::Doctor(e) => AppError::from(e),
            PrescriptionError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn item(drug: &str, dosage: &str, frequency: &str) -> PrescriptionItemInput {
        PrescriptionItemInput {
            drug_name: drug.to_string(),
            dosage: dosage.to_string(),
            frequency: frequency.to_string(),
            duration: None,
            instructions: None,
        }
    }

    fn request(items: Vec<PrescriptionItemInput>) -> CreatePrescriptionRequest {
        CreatePrescriptionRequest {
            patient_id: 2,
            appointment_id: None,
            diagnosis: Some("Sinusitis".to_string()),
            notes: None,
            items,
        }
    }

    #[test]
    fn at_least_one_item_is_required() {
        assert_matches!(request(vec![]).validate(), Err(PrescriptionError::ValidationError(_)));
        assert!(request(vec![item("Amoxicillin", "500 mg", "3 times daily")]).validate().is_ok());
    }

    #[test]
    fn blank_item_fields_name_the_position() {
        let err = request(vec![
            item("Amoxicillin", "500 mg", "3 times daily"),
            item("Ibuprofen", " ", "as needed"),
        ]).validate().unwrap_err();

        assert_eq!(err.to_string(), "Validation error: item 2: dosage is required");
    }

    #[test]
    fn update_without_items_keeps_the_batch() {
        assert!(UpdatePrescriptionRequest::default().validate().is_ok());

        let emptied = UpdatePrescriptionRequest {
            items: Some(vec![]),
            ..Default::default()
        };
        assert!(emptied.validate().is_err());
    }

    #[test]
    fn update_tells_null_apart_from_absent() {
        let request: UpdatePrescriptionRequest = serde_json::from_value(serde_json::json!({
            "appointment_id": null,
            "notes": "Review in a week"
        })).unwrap();

        assert_eq!(request.appointment_id, Some(None));
        assert_eq!(request.diagnosis, None);
        assert_eq!(request.notes, Some(Some("Review in a week".to_string())));
        assert!(request.items.is_none());
    }

    #[test]
    fn embedded_items_deserialize_from_postgrest_name() {
        let prescription: Prescription = serde_json::from_value(serde_json::json!({
            "id": 1,
            "doctor_id": 1,
            "patient_id": 2,
            "appointment_id": null,
            "diagnosis": null,
            "notes": null,
            "created_at": "2024-01-15T10:30:00Z",
            "updated_at": "2024-01-15T10:30:00Z",
            "prescription_items": [{
                "id": 11,
                "prescription_id": 1,
                "drug_name": "Amoxicillin",
                "dosage": "500 mg",
                "frequency": "3 times daily",
                "duration": null,
                "instructions": null
            }]
        })).unwrap();

        assert_eq!(prescription.items.len(), 1);
        assert_eq!(serde_json::to_value(&prescription).unwrap()["items"][0]["drug_name"], "Amoxicillin");
    }
}
