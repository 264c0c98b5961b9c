use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use chrono::Utc;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;
use shared_models::identity::DoctorContext;

use crate::models::{Doctor, DoctorError, OnboardDoctorRequest, UpdateDoctorRequest};

pub struct DoctorService {
    supabase: SupabaseClient,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn find_by_auth_user(
        &self,
        auth_user_id: &str,
        auth_token: &str,
    ) -> Result<Option<Doctor>, DoctorError> {
        debug!("Looking up doctor for auth user: {}", auth_user_id);

        let path = format!(
            "/rest/v1/doctors?auth_user_id=eq.{}&limit=1",
            urlencoding::encode(auth_user_id)
        );
        let result: Vec<Doctor> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        Ok(result.into_iter().next())
    }

    /// Maps the session's subject to the internal doctor id. A valid
    /// session without a doctor row has not finished onboarding.
    pub async fn resolve_context(
        &self,
        user: &User,
        auth_token: &str,
    ) -> Result<DoctorContext, DoctorError> {
        match self.find_by_auth_user(&user.id, auth_token).await? {
            Some(doctor) => Ok(DoctorContext::new(doctor.id, user.id.clone())),
            None => {
                warn!("No doctor profile for auth user {}", user.id);
                Err(DoctorError::NotOnboarded(user.id.clone()))
            }
        }
    }

    pub async fn onboard(
        &self,
        user: &User,
        request: OnboardDoctorRequest,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        request.validate()?;

        if self.find_by_auth_user(&user.id, auth_token).await?.is_some() {
            return Err(DoctorError::AlreadyOnboarded);
        }

        let now = Utc::now().to_rfc3339();
        let doctor_data = json!({
            "auth_user_id": user.id,
            "email": user.email,
            "full_name": request.full_name.trim(),
            "specialty": request.specialty,
            "license_number": request.license_number,
            "phone": request.phone,
            "clinic_name": request.clinic_name,
            "clinic_address": request.clinic_address,
            "created_at": now,
            "updated_at": now
        });

        let result: Vec<Doctor> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/doctors",
            Some(auth_token),
            Some(doctor_data),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let doctor = result.into_iter().next()
            .ok_or_else(|| DoctorError::Database(anyhow::anyhow!("Failed to create doctor profile")))?;

        info!("Doctor {} onboarded for auth user {}", doctor.id, user.id);
        Ok(doctor)
    }

    pub async fn get_profile(
        &self,
        ctx: &DoctorContext,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        let path = format!("/rest/v1/doctors?id=eq.{}&limit=1", ctx.doctor_id);
        let result: Vec<Doctor> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        result.into_iter().next()
            .ok_or_else(|| DoctorError::NotOnboarded(ctx.auth_user_id.clone()))
    }

    pub async fn update_profile(
        &self,
        ctx: &DoctorContext,
        request: UpdateDoctorRequest,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        debug!("Updating doctor profile: {}", ctx.doctor_id);

        let mut update_data = serde_json::Map::new();

        if let Some(full_name) = request.full_name {
            if full_name.trim().is_empty() {
                return Err(DoctorError::ValidationError("full_name cannot be empty".to_string()));
            }
            update_data.insert("full_name".to_string(), json!(full_name.trim()));
        }
        if let Some(specialty) = request.specialty {
            update_data.insert("specialty".to_string(), json!(specialty));
        }
        if let Some(license_number) = request.license_number {
            update_data.insert("license_number".to_string(), json!(license_number));
        }
        if let Some(phone) = request.phone {
            update_data.insert("phone".to_string(), json!(phone));
        }
        if let Some(clinic_name) = request.clinic_name {
            update_data.insert("clinic_name".to_string(), json!(clinic_name));
        }
        if let Some(clinic_address) = request.clinic_address {
            update_data.insert("clinic_address".to_string(), json!(clinic_address));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        // Both ids must match the caller
        let path = format!(
            "/rest/v1/doctors?id=eq.{}&auth_user_id=eq.{}",
            ctx.doctor_id,
            urlencoding::encode(&ctx.auth_user_id)
        );
        let result: Vec<Doctor> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(update_data)),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        result.into_iter().next()
            .ok_or_else(|| DoctorError::NotOnboarded(ctx.auth_user_id.clone()))
    }
}
