use crate::engine::classify::ShiftRules;
use chrono::NaiveTime;
use dotenvy::dotenv;
use std::env;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,

    // Shift rules
    pub shift_late_cutoff: NaiveTime,
    pub half_day_under_minutes: i64,

    // Rate limiting
    pub rate_transition_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            server_addr: env::var("SERVER_ADDR").expect("SERVER_ADDR must be set"),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),

            shift_late_cutoff: NaiveTime::parse_from_str(
                &env::var("SHIFT_LATE_CUTOFF").unwrap_or_else(|_| "09:15:00".to_string()),
                "%H:%M:%S",
            )
            .expect("SHIFT_LATE_CUTOFF must be HH:MM:SS"),
            half_day_under_minutes: env::var("HALF_DAY_UNDER_MINUTES")
                .unwrap_or_else(|_| "240".to_string()) // default 4 hours
                .parse()
                .unwrap(),

            rate_transition_per_min: env::var("RATE_TRANSITION_PER_MIN")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap(),
            rate_protected_per_min: env::var("RATE_PROTECTED_PER_MIN")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap(),

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api/v1".to_string()),
        }
    }

    pub fn shift_rules(&self) -> ShiftRules {
        ShiftRules {
            late_cutoff: self.shift_late_cutoff,
            half_day_under_minutes: self.half_day_under_minutes,
        }
    }
}
