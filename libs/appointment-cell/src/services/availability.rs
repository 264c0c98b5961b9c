// libs/appointment-cell/src/services/availability.rs
use std::collections::BTreeSet;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use reqwest::Method;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::identity::DoctorContext;

use crate::models::{AppointmentError, SlotAvailability, SlotOccupancy, StoredStatus};

pub const SLOT_STEP_MINUTES: i64 = 15;
const GRID_START: (u32, u32) = (9, 0);
const GRID_END: (u32, u32) = (18, 0);

/// Start times of the daily booking grid, 09:00 through 18:00 inclusive.
pub fn slot_grid() -> Vec<NaiveTime> {
    let (Some(start), Some(end)) = (
        NaiveTime::from_hms_opt(GRID_START.0, GRID_START.1, 0),
        NaiveTime::from_hms_opt(GRID_END.0, GRID_END.1, 0),
    ) else {
        return Vec::new();
    };

    let mut slots = Vec::new();
    let mut current = start;
    while current <= end {
        slots.push(current);
        current += Duration::minutes(SLOT_STEP_MINUTES);
    }
    slots
}

pub fn format_slot(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Parses a strict 24-hour "HH:mm" string.
pub fn parse_slot_time(value: &str) -> Result<NaiveTime, AppointmentError> {
    let trimmed = value.trim();
    if trimmed.len() != 5 {
        return Err(AppointmentError::InvalidTime(format!("expected HH:mm, got '{}'", value)));
    }
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .map_err(|_| AppointmentError::InvalidTime(format!("expected HH:mm, got '{}'", value)))
}

/// Converts a clinic-local wall-clock moment to UTC.
pub fn clinic_local_to_utc(local: NaiveDateTime, offset: FixedOffset) -> DateTime<Utc> {
    (local - Duration::seconds(offset.local_minus_utc() as i64)).and_utc()
}

pub fn scheduled_at(date: NaiveDate, time: NaiveTime, offset: FixedOffset) -> DateTime<Utc> {
    clinic_local_to_utc(date.and_time(time), offset)
}

/// Half-open UTC interval covering `date` on the clinic's clock:
/// `[local 00:00, next local 00:00)`.
pub fn day_bounds(date: NaiveDate, offset: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = scheduled_at(date, NaiveTime::default(), offset);
    (start, start + Duration::days(1))
}

/// Clinic-local "HH:mm" of every appointment that holds its slot. Rows
/// without a timestamp, without a status, or cancelled are skipped.
pub fn booked_times(rows: &[SlotOccupancy], offset: FixedOffset) -> Vec<String> {
    rows.iter()
        .filter(|row| row.status.as_ref().is_some_and(StoredStatus::occupies_slot))
        .filter_map(|row| row.scheduled_at)
        .map(|at| at.with_timezone(&offset).format("%H:%M").to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// The grid with a slot marked unavailable iff its string equals a booked
/// time. Appointments spanning a slot without starting on it do not block it.
pub fn slot_board(booked: &[String]) -> Vec<SlotAvailability> {
    slot_grid()
        .into_iter()
        .map(format_slot)
        .map(|time| SlotAvailability {
            available: !booked.contains(&time),
            time,
        })
        .collect()
}

fn postgrest_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub struct AvailabilityService {
    supabase: SupabaseClient,
    clinic_offset: FixedOffset,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            clinic_offset: config.clinic_offset(),
        }
    }

    pub async fn booked_times_for(
        &self,
        ctx: &DoctorContext,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<String>, AppointmentError> {
        let (start, end) = day_bounds(date, self.clinic_offset);
        debug!("Fetching booked slots for doctor {} between {} and {}", ctx.doctor_id, start, end);

        let path = format!(
            "/rest/v1/appointments?select=scheduled_at,status&doctor_id=eq.{}&scheduled_at=gte.{}&scheduled_at=lt.{}&status=neq.cancelled",
            ctx.doctor_id,
            postgrest_timestamp(start),
            postgrest_timestamp(end),
        );

        let rows: Vec<SlotOccupancy> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        Ok(booked_times(&rows, self.clinic_offset))
    }

    pub async fn slot_board_for(
        &self,
        ctx: &DoctorContext,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<SlotAvailability>, AppointmentError> {
        let booked = self.booked_times_for(ctx, date, auth_token).await?;
        Ok(slot_board(&booked))
    }
}
