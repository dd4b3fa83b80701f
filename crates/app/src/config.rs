//! Process configuration loaded from environment variables.

use std::net::SocketAddr;
use std::str::FromStr;

use booking::BookingSettings;
use chrono::Duration;
use domain::ReferralPolicy;

/// One-time codes live at most a day.
const MAX_OTP_TTL_SECONDS: i64 = 24 * 60 * 60;
/// Referral rewards stay redeemable for at most ten years.
const MAX_REWARD_VALID_DAYS: i64 = 3650;
/// A slot never spans more than one day.
const MAX_SLOT_MINUTES: i64 = 24 * 60;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Some(LogFormat::Pretty),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// Host configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `DATABASE_URL`: Postgres connection string (unset: in-memory store)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `5`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `pretty` or `json` (default: `pretty`)
/// - `METRICS_ADDR`: Prometheus listener (default: `0.0.0.0:9000`)
/// - `REFERRAL_THRESHOLD`: invitations per reward (default: `5`)
/// - `REFERRAL_REWARD_PERCENT`: reward size (default: `20`)
/// - `REFERRAL_REWARD_VALID_DAYS`: reward lifetime (unset: never expires)
/// - `OTP_TTL_SECONDS`: one-time code lifetime (default: `180`)
/// - `DEFAULT_SLOT_MINUTES`: slot length for start-only bookings (default: `30`)
/// - `MAX_CONFLICT_RETRIES`: re-reads after a lost write race (default: `10`)
///
/// Unparsable or out-of-range values fall back to the default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub log_level: String,
    pub log_format: LogFormat,
    pub metrics_addr: SocketAddr,
    pub referral_threshold: u32,
    pub referral_reward_percent: u8,
    pub referral_reward_valid_days: Option<i64>,
    pub otp_ttl_seconds: i64,
    pub default_slot_minutes: i64,
    pub max_conflict_retries: u32,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let lookup = &lookup as &dyn Fn(&str) -> Option<String>;

        Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            database_max_connections: parsed(lookup, "DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .and_then(|f| LogFormat::parse(&f))
                .unwrap_or(defaults.log_format),
            metrics_addr: parsed(lookup, "METRICS_ADDR").unwrap_or(defaults.metrics_addr),
            referral_threshold: parsed(lookup, "REFERRAL_THRESHOLD")
                .filter(|t| *t > 0)
                .unwrap_or(defaults.referral_threshold),
            referral_reward_percent: parsed(lookup, "REFERRAL_REWARD_PERCENT")
                .filter(|p| (1..=100).contains(p))
                .unwrap_or(defaults.referral_reward_percent),
            referral_reward_valid_days: parsed(lookup, "REFERRAL_REWARD_VALID_DAYS")
                .filter(|d| (1..=MAX_REWARD_VALID_DAYS).contains(d)),
            otp_ttl_seconds: parsed(lookup, "OTP_TTL_SECONDS")
                .filter(|s| (1..=MAX_OTP_TTL_SECONDS).contains(s))
                .unwrap_or(defaults.otp_ttl_seconds),
            default_slot_minutes: parsed(lookup, "DEFAULT_SLOT_MINUTES")
                .filter(|m| (1..=MAX_SLOT_MINUTES).contains(m))
                .unwrap_or(defaults.default_slot_minutes),
            max_conflict_retries: parsed(lookup, "MAX_CONFLICT_RETRIES")
                .unwrap_or(defaults.max_conflict_retries),
        }
    }

    /// Returns the tunables the booking services run with.
    pub fn booking_settings(&self) -> BookingSettings {
        BookingSettings {
            referral: ReferralPolicy {
                threshold: self.referral_threshold,
                reward_percent: self.referral_reward_percent,
                reward_validity: self.referral_reward_valid_days.map(Duration::days),
            },
            otp_ttl: Duration::seconds(self.otp_ttl_seconds),
            default_slot: Duration::minutes(self.default_slot_minutes),
            max_conflict_retries: self.max_conflict_retries,
        }
    }
}

fn parsed<T: FromStr>(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|value| value.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            database_max_connections: 5,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], 9000)),
            referral_threshold: 5,
            referral_reward_percent: 20,
            referral_reward_valid_days: None,
            otp_ttl_seconds: 180,
            default_slot_minutes: 30,
            max_conflict_retries: 10,
        }
    }
}
