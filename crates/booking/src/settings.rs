use chrono::Duration;
use domain::ReferralPolicy;

/// Tunables shared by every booking service.
#[derive(Debug, Clone)]
pub struct BookingSettings {
    pub referral: ReferralPolicy,
    /// Lifetime of an issued one-time code.
    pub otp_ttl: Duration,
    /// Slot length used when a reservation is booked by start time only.
    pub default_slot: Duration,
    /// Re-read attempts after a lost compare-and-set before giving up.
    pub max_conflict_retries: u32,
}

impl Default for BookingSettings {
    fn default() -> Self {
        Self {
            referral: ReferralPolicy::default(),
            otp_ttl: Duration::minutes(3),
            default_slot: Duration::minutes(30),
            max_conflict_retries: 10,
        }
    }
}
