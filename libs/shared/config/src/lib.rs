use std::env;

use chrono::{FixedOffset, Offset, Utc};
use tracing::warn;

const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    /// Offset of the clinic's wall clock from UTC. Day bounds and "HH:mm"
    /// slot strings are computed in this offset.
    pub clinic_utc_offset_minutes: i32,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            clinic_utc_offset_minutes: parse_offset_minutes(env::var("CLINIC_UTC_OFFSET_MINUTES").ok()),
            port: parse_port(env::var("PORT").ok()),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn clinic_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.clinic_utc_offset_minutes * 60)
            .unwrap_or_else(|| {
                warn!("Clinic offset {} minutes out of range, using UTC", self.clinic_utc_offset_minutes);
                Utc.fix()
            })
    }
}

fn parse_offset_minutes(raw: Option<String>) -> i32 {
    match raw {
        None => 0,
        Some(value) => match value.trim().parse::<i32>() {
            // FixedOffset accepts strictly less than a day
            Ok(minutes) if minutes.abs() < 24 * 60 => minutes,
            _ => {
                warn!("CLINIC_UTC_OFFSET_MINUTES={} is invalid, using 0", value);
                0
            }
        },
    }
}

fn parse_port(raw: Option<String>) -> u16 {
    match raw {
        None => DEFAULT_PORT,
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!("PORT={} is invalid, using {}", value, DEFAULT_PORT);
            DEFAULT_PORT
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_offset(minutes: i32) -> AppConfig {
        AppConfig {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "anon".to_string(),
            supabase_jwt_secret: "secret".to_string(),
            clinic_utc_offset_minutes: minutes,
            port: DEFAULT_PORT,
        }
    }

    #[test]
    fn offset_parsing_falls_back_to_utc() {
        assert_eq!(parse_offset_minutes(None), 0);
        assert_eq!(parse_offset_minutes(Some("120".into())), 120);
        assert_eq!(parse_offset_minutes(Some("-330".into())), -330);
        assert_eq!(parse_offset_minutes(Some("abc".into())), 0);
        assert_eq!(parse_offset_minutes(Some("1440".into())), 0);
    }

    #[test]
    fn port_parsing() {
        assert_eq!(parse_port(None), 3000);
        assert_eq!(parse_port(Some("8080".into())), 8080);
        assert_eq!(parse_port(Some("not-a-port".into())), 3000);
    }

    #[test]
    fn clinic_offset_uses_minutes() {
        assert_eq!(config_with_offset(60).clinic_offset().local_minus_utc(), 3600);
        assert_eq!(config_with_offset(-300).clinic_offset().local_minus_utc(), -18000);
    }

    #[test]
    fn configured_requires_supabase_settings() {
        let mut config = config_with_offset(0);
        assert!(config.is_configured());
        config.supabase_jwt_secret.clear();
        assert!(!config.is_configured());
    }
}
