use chrono::FixedOffset;
use reqwest::Method;
use serde_json::json;
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::identity::DoctorContext;
use appointment_cell::services::AppointmentService;
use doctor_cell::services::DoctorService;
use patient_cell::services::PatientService;

use crate::models::{
    CreatePrescriptionRequest, Prescription, PrescriptionError, PrescriptionListQuery,
    UpdatePrescriptionRequest,
};
use crate::services::pdf::{render_prescription_pdf, PrescriptionDocument};

const PRESCRIPTION_SELECT: &str = "*,prescription_items(*)";

pub struct PrescriptionService {
    supabase: SupabaseClient,
    patients: PatientService,
    appointments: AppointmentService,
    doctors: DoctorService,
    clinic_offset: FixedOffset,
}

impl PrescriptionService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            patients: PatientService::new(config),
            appointments: AppointmentService::new(config),
            doctors: DoctorService::new(config),
            clinic_offset: config.clinic_offset(),
        }
    }

    pub async fn list_prescriptions(
        &self,
        ctx: &DoctorContext,
        query: PrescriptionListQuery,
        auth_token: &str,
    ) -> Result<Vec<Prescription>, PrescriptionError> {
        debug!("Listing prescriptions for doctor {}", ctx.doctor_id);

        let mut path = format!(
            "/rest/v1/prescriptions?select={}&doctor_id=eq.{}",
            PRESCRIPTION_SELECT, ctx.doctor_id
        );
        if let Some(patient_id) = query.patient_id {
            path.push_str(&format!("&patient_id=eq.{}", patient_id));
        }
        path.push_str("&order=created_at.desc");

        let prescriptions: Vec<Prescription> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        Ok(prescriptions.into_iter()
            .filter(|prescription| ctx.owns(prescription.doctor_id))
            .collect())
    }

    pub async fn get_prescription(
        &self,
        ctx: &DoctorContext,
        prescription_id: i64,
        auth_token: &str,
    ) -> Result<Prescription, PrescriptionError> {
        let path = format!(
            "/rest/v1/prescriptions?select={}&id=eq.{}",
            PRESCRIPTION_SELECT, prescription_id
        );
        let result: Vec<Prescription> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        let prescription = result.into_iter().next().ok_or(PrescriptionError::NotFound)?;

        if !ctx.owns(prescription.doctor_id) {
            warn!("Doctor {} denied access to prescription {}", ctx.doctor_id, prescription_id);
            return Err(PrescriptionError::AccessDenied(prescription_id));
        }

        Ok(prescription)
    }

    /// Inserts the prescription and its items in one transaction through
    /// the `create_prescription` function, then reads the result back.
    pub async fn create_prescription(
        &self,
        ctx: &DoctorContext,
        request: CreatePrescriptionRequest,
        auth_token: &str,
    ) -> Result<Prescription, PrescriptionError> {
        request.validate()?;

        self.patients.ensure_owned(ctx, request.patient_id, auth_token).await?;
        if let Some(appointment_id) = request.appointment_id {
            self.ensure_appointment_matches(ctx, appointment_id, request.patient_id, auth_token).await?;
        }

        let prescription_id: i64 = self.supabase.rpc(
            "create_prescription",
            auth_token,
            json!({
                "p_doctor_id": ctx.doctor_id,
                "p_patient_id": request.patient_id,
                "p_appointment_id": request.appointment_id,
                "p_diagnosis": request.diagnosis,
                "p_notes": request.notes,
                "p_items": request.items
            }),
        ).await?;

        info!("Prescription {} created by doctor {}", prescription_id, ctx.doctor_id);
        self.get_prescription(ctx, prescription_id, auth_token).await
    }

    /// Updates the provided fields and, when `items` is given, swaps the
    /// whole item batch in the same transaction.
    pub async fn update_prescription(
        &self,
        ctx: &DoctorContext,
        prescription_id: i64,
        request: UpdatePrescriptionRequest,
        auth_token: &str,
    ) -> Result<Prescription, PrescriptionError> {
        request.validate()?;
        let existing = self.get_prescription(ctx, prescription_id, auth_token).await?;

        if let Some(Some(appointment_id)) = request.appointment_id {
            if existing.appointment_id != Some(appointment_id) {
                self.ensure_appointment_matches(ctx, appointment_id, existing.patient_id, auth_token).await?;
            }
        }

        let (appointment_id, clear_appointment) = split_update(request.appointment_id);
        let (diagnosis, clear_diagnosis) = split_update(request.diagnosis);
        let (notes, clear_notes) = split_update(request.notes);

        self.supabase.rpc_void(
            "update_prescription",
            auth_token,
            json!({
                "p_prescription_id": prescription_id,
                "p_doctor_id": ctx.doctor_id,
                "p_appointment_id": appointment_id,
                "p_diagnosis": diagnosis,
                "p_notes": notes,
                "p_items": request.items,
                "p_clear_appointment": clear_appointment,
                "p_clear_diagnosis": clear_diagnosis,
                "p_clear_notes": clear_notes
            }),
        ).await?;

        debug!("Prescription {} updated", prescription_id);
        self.get_prescription(ctx, prescription_id, auth_token).await
    }

    /// Deletes items then the prescription inside one function call, so a
    /// failure leaves both in place.
    pub async fn delete_prescription(
        &self,
        ctx: &DoctorContext,
        prescription_id: i64,
        auth_token: &str,
    ) -> Result<(), PrescriptionError> {
        self.get_prescription(ctx, prescription_id, auth_token).await?;

        self.supabase.rpc_void(
            "delete_prescription",
            auth_token,
            json!({
                "p_prescription_id": prescription_id,
                "p_doctor_id": ctx.doctor_id
            }),
        ).await?;

        info!("Prescription {} deleted by doctor {}", prescription_id, ctx.doctor_id);
        Ok(())
    }

    pub async fn export_pdf(
        &self,
        ctx: &DoctorContext,
        prescription_id: i64,
        auth_token: &str,
    ) -> Result<Vec<u8>, PrescriptionError> {
        let prescription = self.get_prescription(ctx, prescription_id, auth_token).await?;
        let doctor = self.doctors.get_profile(ctx, auth_token).await?;
        let patient = self.patients.ensure_owned(ctx, prescription.patient_id, auth_token).await?;

        let document = PrescriptionDocument::new(&doctor, &patient, &prescription, self.clinic_offset);
        Ok(render_prescription_pdf(&document))
    }

    async fn ensure_appointment_matches(
        &self,
        ctx: &DoctorContext,
        appointment_id: i64,
        patient_id: i64,
        auth_token: &str,
    ) -> Result<(), PrescriptionError> {
        let appointment = self.appointments.get_appointment(ctx, appointment_id, auth_token).await?;
        if appointment.patient_id != patient_id {
            return Err(PrescriptionError::ValidationError(format!(
                "appointment {} belongs to a different patient",
                appointment_id
            )));
        }
        Ok(())
    }
}

/// New value for a nullable column plus whether it is being cleared.
fn split_update<T>(field: Option<Option<T>>) -> (Option<T>, bool) {
    match field {
        None => (None, false),
        Some(None) => (None, true),
        Some(Some(value)) => (Some(value), false),
    }
}
