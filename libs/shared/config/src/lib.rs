use std::env;
use std::str::FromStr;

use chrono::{Duration, FixedOffset, Offset, Utc};
use tracing::warn;

const DEFAULT_TOKEN_TTL_HOURS: i64 = 168;
const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;
const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    /// Offset in which appointment dates and times are written.
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
            supabase_service_key: env::var("SUPABASE_SERVICE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_KEY not set, using empty value");
                    String::new()
                }),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("JWT_SECRET not set, every token will be rejected");
                    String::new()
                }),
            token_ttl_hours: parse_or("TOKEN_TTL_HOURS", DEFAULT_TOKEN_TTL_HOURS),
            clinic_utc_offset_minutes: parse_or("CLINIC_UTC_OFFSET_MINUTES", 0),
            port: parse_or("PORT", DEFAULT_PORT),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_service_key.is_empty()
            && !self.jwt_secret.is_empty()
    }

    /// Session token lifetime. Values outside one hour to one year use the default.
    pub fn token_ttl(&self) -> Duration {
        if (1..=MAX_TOKEN_TTL_HOURS).contains(&self.token_ttl_hours) {
            return Duration::hours(self.token_ttl_hours);
        }
        warn!(
            "TOKEN_TTL_HOURS={} is out of range, using {}",
            self.token_ttl_hours, DEFAULT_TOKEN_TTL_HOURS
        );
        Duration::hours(DEFAULT_TOKEN_TTL_HOURS)
    }

    /// Falls back to UTC when the configured offset is out of range.
    pub fn clinic_offset(&self) -> FixedOffset {
        self.clinic_utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| {
                warn!(
                    "CLINIC_UTC_OFFSET_MINUTES={} is out of range, using UTC",
                    self.clinic_utc_offset_minutes
                );
                Utc.fix()
            })
    }
}

fn parse_or<T: FromStr + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_offset(minutes: i32) -> AppConfig {
        AppConfig {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_service_key: "key".to_string(),
            jwt_secret: "secret".to_string(),
            token_ttl_hours: DEFAULT_TOKEN_TTL_HOURS,
            clinic_utc_offset_minutes: minutes,
            port: DEFAULT_PORT,
        }
    }

    #[test]
    fn test_clinic_offset() {
        assert_eq!(config_with_offset(120).clinic_offset().local_minus_utc(), 7200);
        assert_eq!(config_with_offset(-300).clinic_offset().local_minus_utc(), -18000);
    }

    #[test]
    fn test_out_of_range_offset_falls_back_to_utc() {
        assert_eq!(config_with_offset(24 * 60).clinic_offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_token_ttl_rejects_out_of_range_hours() {
        let mut config = config_with_offset(0);
        config.token_ttl_hours = 12;
        assert_eq!(config.token_ttl(), Duration::hours(12));

        for hours in [0, -5, MAX_TOKEN_TTL_HOURS + 1, i64::MAX] {
            config.token_ttl_hours = hours;
            assert_eq!(config.token_ttl(), Duration::hours(DEFAULT_TOKEN_TTL_HOURS));
        }
    }

    #[test]
    fn test_is_configured() {
        let mut config = config_with_offset(0);
        assert!(config.is_configured());
        config.jwt_secret.clear();
        assert!(!config.is_configured());
    }
}
