use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use chrono::{FixedOffset, NaiveDate, Utc};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::identity::DoctorContext;

use crate::models::{
    Patient, PatientRow, CreatePatientRequest, UpdatePatientRequest, PatientSearchQuery, PatientError,
    PatientRemoval,
};

const DEFAULT_PAGE_SIZE: i32 = 50;
const MAX_PAGE_SIZE: i32 = 200;

pub struct PatientService {
    supabase: SupabaseClient,
    clinic_offset: FixedOffset,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            clinic_offset: config.clinic_offset(),
        }
    }

    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.clinic_offset).date_naive()
    }

    /// Patients linked to the calling doctor, optionally filtered by a
    /// name/email search term.
    pub async fn list_patients(
        &self,
        ctx: &DoctorContext,
        query: PatientSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Patient>, PatientError> {
        debug!("Listing patients for doctor {} with query: {:?}", ctx.doctor_id, query);

        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = query.offset.unwrap_or(0).max(0);

        let mut path = format!(
            "/rest/v1/patients?select=*,doctor_patients!inner(doctor_id)&doctor_patients.doctor_id=eq.{}&order=name.asc&limit={}&offset={}",
            ctx.doctor_id, limit, offset
        );

        if let Some(term) = query.search.as_deref().map(sanitize_search_term).filter(|t| !t.is_empty()) {
            let encoded = urlencoding::encode(&term);
            path.push_str(&format!("&or=(name.ilike.*{}*,email.ilike.*{}*)", encoded, encoded));
        }

        let rows: Vec<PatientRow> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        Ok(rows.into_iter()
            .filter(|row| row.is_linked_to(ctx.doctor_id))
            .map(|row| row.patient)
            .collect())
    }

    /// Fetches a patient and fails closed unless the calling doctor is
    /// linked to it. Missing rows and foreign rows are different errors.
    pub async fn ensure_owned(
        &self,
        ctx: &DoctorContext,
        patient_id: i64,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        let path = format!(
            "/rest/v1/patients?select=*,doctor_patients(doctor_id)&id=eq.{}",
            patient_id
        );
        let rows: Vec<PatientRow> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        let row = rows.into_iter().next().ok_or(PatientError::NotFound)?;

        if !row.is_linked_to(ctx.doctor_id) {
            warn!("Doctor {} denied access to patient {}", ctx.doctor_id, patient_id);
            return Err(PatientError::AccessDenied(patient_id));
        }

        Ok(row.patient)
    }

    pub async fn get_patient(
        &self,
        ctx: &DoctorContext,
        patient_id: i64,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        debug!("Fetching patient {} for doctor {}", patient_id, ctx.doctor_id);
        self.ensure_owned(ctx, patient_id, auth_token).await
    }

    /// Inserts the patient and its `doctor_patients` link in one
    /// transaction through the `create_patient_for_doctor` function.
    pub async fn create_patient(
        &self,
        ctx: &DoctorContext,
        request: CreatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        request.validate(self.today())?;

        debug!("Creating patient for doctor {}", ctx.doctor_id);

        let patient_data = json!({
            "name": request.name.trim(),
            "email": request.email,
            "phone": request.phone,
            "date_of_birth": request.date_of_birth.map(|d| d.format("%Y-%m-%d").to_string()),
            "gender": request.gender,
            "address": request.address,
            "blood_type": request.blood_type,
            "allergies": request.allergies,
            "medical_history": request.medical_history,
            "emergency_contact": request.emergency_contact
        });

        let patient: Patient = self.supabase.rpc(
            "create_patient_for_doctor",
            auth_token,
            json!({
                "p_doctor_id": ctx.doctor_id,
                "p_patient": patient_data
            }),
        ).await?;

        info!("Patient {} created for doctor {}", patient.id, ctx.doctor_id);
        Ok(patient)
    }

    pub async fn update_patient(
        &self,
        ctx: &DoctorContext,
        patient_id: i64,
        request: UpdatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        request.validate(self.today())?;
        self.ensure_owned(ctx, patient_id, auth_token).await?;

        debug!("Updating patient {} for doctor {}", patient_id, ctx.doctor_id);

        let mut update_data = serde_json::Map::new();

        if let Some(name) = request.name {
            update_data.insert("name".to_string(), json!(name.trim()));
        }
        if let Some(email) = request.email {
            update_data.insert("email".to_string(), json!(email));
        }
        if let Some(phone) = request.phone {
            update_data.insert("phone".to_string(), json!(phone));
        }
        if let Some(date_of_birth) = request.date_of_birth {
            update_data.insert("date_of_birth".to_string(), json!(date_of_birth.format("%Y-%m-%d").to_string()));
        }
        if let Some(gender) = request.gender {
            update_data.insert("gender".to_string(), json!(gender));
        }
        if let Some(address) = request.address {
            update_data.insert("address".to_string(), json!(address));
        }
        if let Some(blood_type) = request.blood_type {
            update_data.insert("blood_type".to_string(), json!(blood_type));
        }
        if let Some(allergies) = request.allergies {
            update_data.insert("allergies".to_string(), json!(allergies));
        }
        if let Some(medical_history) = request.medical_history {
            update_data.insert("medical_history".to_string(), json!(medical_history));
        }
        if let Some(emergency_contact) = request.emergency_contact {
            update_data.insert("emergency_contact".to_string(), json!(emergency_contact));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let result: Vec<Patient> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(update_data)),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        result.into_iter().next().ok_or(PatientError::NotFound)
    }

    /// Drops the caller's `doctor_patients` link. The patient row is deleted
    /// in the same transaction only when no other doctor is still linked.
    pub async fn delete_patient(
        &self,
        ctx: &DoctorContext,
        patient_id: i64,
        auth_token: &str,
    ) -> Result<PatientRemoval, PatientError> {
        self.ensure_owned(ctx, patient_id, auth_token).await?;

        let record_deleted: bool = self.supabase.rpc(
            "delete_patient_for_doctor",
            auth_token,
            json!({
                "p_patient_id": patient_id,
                "p_doctor_id": ctx.doctor_id
            }),
        ).await?;

        if record_deleted {
            info!("Patient {} deleted by doctor {}", patient_id, ctx.doctor_id);
            Ok(PatientRemoval::Deleted)
        } else {
            info!("Doctor {} unlinked shared patient {}", ctx.doctor_id, patient_id);
            Ok(PatientRemoval::Unlinked)
        }
    }
}

/// PostgREST treats these as filter syntax inside `or=(...)`.
fn sanitize_search_term(term: &str) -> String {
    term.chars()
        .filter(|c| !matches!(c, ',' | '(' | ')' | '*' | '%'))
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_terms_lose_filter_syntax() {
        assert_eq!(sanitize_search_term(" ann,(smith)* "), "annsmith");
        assert_eq!(sanitize_search_term("o'brien"), "o'brien");
        assert_eq!(sanitize_search_term("()"), "");
    }
}
