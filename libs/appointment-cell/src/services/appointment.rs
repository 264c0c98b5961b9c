// libs/appointment-cell/src/services/appointment.rs
use chrono::{FixedOffset, NaiveDate, NaiveTime, SecondsFormat, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::identity::DoctorContext;
use patient_cell::services::PatientService;

use crate::models::{
    Appointment, AppointmentError, AppointmentListQuery, AppointmentStatus,
    CreateAppointmentRequest, UpdateAppointmentRequest, DEFAULT_DURATION_MINUTES,
    validate_duration,
};
use crate::services::availability::{day_bounds, parse_slot_time, scheduled_at};

const APPOINTMENT_SELECT: &str = "*,patients(id,name)";

pub struct AppointmentService {
    supabase: SupabaseClient,
    patients: PatientService,
    clinic_offset: FixedOffset,
}

impl AppointmentService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            patients: PatientService::new(config),
            clinic_offset: config.clinic_offset(),
        }
    }

    pub async fn list_appointments(
        &self,
        ctx: &DoctorContext,
        query: AppointmentListQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Listing appointments for doctor {} with query: {:?}", ctx.doctor_id, query);

        let mut query_parts = vec![
            format!("select={}", APPOINTMENT_SELECT),
            format!("doctor_id=eq.{}", ctx.doctor_id),
        ];

        if let Some(date) = query.date {
            let (start, end) = day_bounds(date, self.clinic_offset);
            query_parts.push(format!("scheduled_at=gte.{}", start.to_rfc3339_opts(SecondsFormat::Secs, true)));
            query_parts.push(format!("scheduled_at=lt.{}", end.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        if let Some(status) = query.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        if let Some(patient_id) = query.patient_id {
            query_parts.push(format!("patient_id=eq.{}", patient_id));
        }
        query_parts.push("order=scheduled_at.asc.nullslast".to_string());

        let path = format!("/rest/v1/appointments?{}", query_parts.join("&"));
        let appointments: Vec<Appointment> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        Ok(appointments.into_iter()
            .filter(|appointment| ctx.owns(appointment.doctor_id))
            .collect())
    }

    /// Re-fetches the row and fails closed when it belongs to another doctor.
    pub async fn get_appointment(
        &self,
        ctx: &DoctorContext,
        appointment_id: i64,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?select={}&id=eq.{}",
            APPOINTMENT_SELECT, appointment_id
        );
        let result: Vec<Appointment> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        let appointment = result.into_iter().next().ok_or(AppointmentError::NotFound)?;

        if !ctx.owns(appointment.doctor_id) {
            warn!("Doctor {} denied access to appointment {}", ctx.doctor_id, appointment_id);
            return Err(AppointmentError::AccessDenied(appointment_id));
        }

        Ok(appointment)
    }

    /// Books an appointment. Two bookings for the same doctor and slot can
    /// both succeed; nothing here serialises them.
    pub async fn create_appointment(
        &self,
        ctx: &DoctorContext,
        request: CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let time = parse_slot_time(&request.time)?;
        validate_duration(request.duration_minutes)?;

        self.patients.ensure_owned(ctx, request.patient_id, auth_token).await?;

        let status = request.status.unwrap_or(AppointmentStatus::Pending);
        let at = scheduled_at(request.date, time, self.clinic_offset);
        let now = Utc::now().to_rfc3339();

        let appointment_data = json!({
            "doctor_id": ctx.doctor_id,
            "patient_id": request.patient_id,
            "scheduled_at": at.to_rfc3339(),
            "reason": request.reason,
            "status": status,
            "duration_minutes": request.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES),
            "notes": request.notes,
            "location": request.location,
            "confirmed": status == AppointmentStatus::Confirmed,
            "created_at": now,
            "updated_at": now
        });

        let result: Vec<Appointment> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/appointments",
            Some(auth_token),
            Some(appointment_data),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let appointment = result.into_iter().next()
            .ok_or_else(|| AppointmentError::Database(anyhow::anyhow!("Failed to create appointment")))?;

        info!("Appointment {} booked for doctor {} at {}", appointment.id, ctx.doctor_id, at);
        Ok(appointment)
    }

    pub async fn update_appointment(
        &self,
        ctx: &DoctorContext,
        appointment_id: i64,
        request: UpdateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        validate_duration(request.duration_minutes)?;
        let existing = self.get_appointment(ctx, appointment_id, auth_token).await?;

        let mut update_data = serde_json::Map::new();

        if let Some(patient_id) = request.patient_id {
            if patient_id != existing.patient_id {
                self.patients.ensure_owned(ctx, patient_id, auth_token).await?;
            }
            update_data.insert("patient_id".to_string(), json!(patient_id));
        }

        if request.date.is_some() || request.time.is_some() {
            let at = self.reschedule_target(&existing, request.date, request.time.as_deref())?;
            update_data.insert("scheduled_at".to_string(), json!(at.to_rfc3339()));
        }

        if let Some(reason) = request.reason {
            update_data.insert("reason".to_string(), json!(reason));
        }
        if let Some(duration) = request.duration_minutes {
            update_data.insert("duration_minutes".to_string(), json!(duration));
        }
        if let Some(notes) = request.notes {
            update_data.insert("notes".to_string(), json!(notes));
        }
        if let Some(location) = request.location {
            update_data.insert("location".to_string(), json!(location));
        }
        if let Some(status) = request.status {
            update_data.insert("status".to_string(), json!(status));
            update_data.insert("confirmed".to_string(), json!(status == AppointmentStatus::Confirmed));
        }

        self.patch(ctx, appointment_id, update_data, auth_token).await
    }

    pub async fn update_status(
        &self,
        ctx: &DoctorContext,
        appointment_id: i64,
        status: AppointmentStatus,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        self.get_appointment(ctx, appointment_id, auth_token).await?;

        let mut update_data = serde_json::Map::new();
        update_data.insert("status".to_string(), json!(status));
        update_data.insert("confirmed".to_string(), json!(status == AppointmentStatus::Confirmed));

        let appointment = self.patch(ctx, appointment_id, update_data, auth_token).await?;
        info!("Appointment {} is now {}", appointment_id, status);
        Ok(appointment)
    }

    pub async fn cancel_appointment(
        &self,
        ctx: &DoctorContext,
        appointment_id: i64,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        self.update_status(ctx, appointment_id, AppointmentStatus::Cancelled, auth_token).await
    }

    pub async fn delete_appointment(
        &self,
        ctx: &DoctorContext,
        appointment_id: i64,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        self.get_appointment(ctx, appointment_id, auth_token).await?;

        let path = format!(
            "/rest/v1/appointments?id=eq.{}&doctor_id=eq.{}",
            appointment_id, ctx.doctor_id
        );
        self.supabase.execute(Method::DELETE, &path, Some(auth_token), None).await?;

        info!("Appointment {} deleted by doctor {}", appointment_id, ctx.doctor_id);
        Ok(())
    }

    async fn patch(
        &self,
        ctx: &DoctorContext,
        appointment_id: i64,
        mut update_data: serde_json::Map<String, Value>,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!(
            "/rest/v1/appointments?id=eq.{}&doctor_id=eq.{}&select={}",
            appointment_id, ctx.doctor_id, APPOINTMENT_SELECT
        );
        let result: Vec<Appointment> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(update_data)),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        result.into_iter().next().ok_or(AppointmentError::NotFound)
    }

    /// New timestamp from a partial date/time change. The missing half is
    /// taken from the current schedule, read on the clinic's clock.
    fn reschedule_target(
        &self,
        existing: &Appointment,
        date: Option<NaiveDate>,
        time: Option<&str>,
    ) -> Result<chrono::DateTime<Utc>, AppointmentError> {
        let current = existing.scheduled_at.map(|at| at.with_timezone(&self.clinic_offset).naive_local());

        let date = date
            .or_else(|| current.map(|c| c.date()))
            .ok_or_else(|| AppointmentError::ValidationError("date is required for an unscheduled appointment".to_string()))?;

        let time: NaiveTime = match time {
            Some(value) => parse_slot_time(value)?,
            None => current
                .map(|c| c.time())
                .ok_or_else(|| AppointmentError::ValidationError("time is required for an unscheduled appointment".to_string()))?,
        };

        Ok(scheduled_at(date, time, self.clinic_offset))
    }
}
